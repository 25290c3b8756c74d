use axum::{
    extract::State,
    http::{Method, Request, StatusCode},
    middleware::Next,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::state::{AppState, ResiliencyState};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CircuitState {
    Closed,   // Normal operation
    Open,     // Gateway failing, reject fast
    HalfOpen, // Probing
}

pub struct CircuitBreaker {
    pub name: String,
    pub state: RwLock<CircuitState>,
    pub failure_count: AtomicUsize,
    pub failure_threshold: usize,
    pub reset_timeout: Duration,
    pub last_failure: RwLock<Option<Instant>>,
}

impl CircuitBreaker {
    pub fn new(name: &str, threshold: usize, timeout: Duration) -> Self {
        Self {
            name: name.to_string(),
            state: RwLock::new(CircuitState::Closed),
            failure_count: AtomicUsize::new(0),
            failure_threshold: threshold,
            reset_timeout: timeout,
            last_failure: RwLock::new(None),
        }
    }

    pub async fn current(&self) -> CircuitState {
        *self.state.read().await
    }

    /// `false` while open and still inside the reset timeout
    pub async fn check(&self) -> bool {
        let state = *self.state.read().await;
        match state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let last_fail = *self.last_failure.read().await;
                match last_fail {
                    Some(instant) if instant.elapsed() > self.reset_timeout => {
                        *self.state.write().await = CircuitState::HalfOpen;
                        tracing::info!("Circuit Breaker [{}] moving to Half-Open", self.name);
                        true
                    }
                    _ => false,
                }
            }
        }
    }

    pub async fn record_success(&self) {
        let mut state = self.state.write().await;
        if *state == CircuitState::HalfOpen {
            *state = CircuitState::Closed;
            tracing::info!("Circuit Breaker [{}] recovered to Closed", self.name);
        }
        self.failure_count.store(0, Ordering::SeqCst);
    }

    pub async fn record_failure(&self) {
        let count = self.failure_count.fetch_add(1, Ordering::SeqCst) + 1;
        let mut state = self.state.write().await;

        if count >= self.failure_threshold || *state == CircuitState::HalfOpen {
            *state = CircuitState::Open;
            *self.last_failure.write().await = Some(Instant::now());
            tracing::error!("Circuit Breaker [{}] TRIPPED to Open. Failures: {}", self.name, count);
        }
    }
}

/// Routes that call out to a payment gateway
fn circuit_for<'a>(
    resiliency: &'a ResiliencyState,
    method: &Method,
    path: &str,
) -> Option<&'a CircuitBreaker> {
    if path.starts_with("/v1/webhooks/") {
        return Some(&resiliency.webhook_cb);
    }
    if *method != Method::POST || !path.starts_with("/v1/bookings") {
        return None;
    }
    let path = path.trim_end_matches('/');
    if path == "/v1/bookings" || path.ends_with("/pay") || path.ends_with("/cancel") {
        Some(&resiliency.payment_cb)
    } else {
        None
    }
}

pub async fn circuit_breaker_middleware(
    State(state): State<AppState>,
    req: Request<axum::body::Body>,
    next: Next,
) -> impl IntoResponse {
    let path = req.uri().path().to_string();
    let Some(cb) = circuit_for(&state.resiliency, req.method(), &path) else {
        return next.run(req).await.into_response();
    };

    if !cb.check().await {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": format!("Circuit Breaker [{}] is OPEN", cb.name) })),
        )
            .into_response();
    }

    let response = next.run(req).await;

    if response.status().is_server_error() {
        cb.record_failure().await;
    } else {
        cb.record_success().await;
    }

    response.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_trips_after_threshold_and_recovers() {
        let cb = CircuitBreaker::new("test", 2, Duration::from_millis(20));
        assert!(cb.check().await);

        cb.record_failure().await;
        assert_eq!(cb.current().await, CircuitState::Closed);
        cb.record_failure().await;
        assert_eq!(cb.current().await, CircuitState::Open);
        assert!(!cb.check().await);

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(cb.check().await);
        assert_eq!(cb.current().await, CircuitState::HalfOpen);

        cb.record_success().await;
        assert_eq!(cb.current().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_half_open_failure_reopens() {
        let cb = CircuitBreaker::new("test", 1, Duration::from_millis(1));
        cb.record_failure().await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(cb.check().await);

        cb.record_failure().await;
        assert_eq!(cb.current().await, CircuitState::Open);
    }

    #[test]
    fn test_circuit_selection_by_path() {
        let resiliency = ResiliencyState::default();
        let name = |method: Method, path: &str| {
            circuit_for(&resiliency, &method, path).map(|cb| cb.name.clone())
        };
        assert_eq!(name(Method::POST, "/v1/webhooks/stripe").as_deref(), Some("webhooks"));
        assert_eq!(name(Method::POST, "/v1/bookings/abc/pay").as_deref(), Some("payments"));
        assert_eq!(name(Method::POST, "/v1/bookings/abc/cancel").as_deref(), Some("payments"));
        // Creating a booking opens a gateway intent
        assert_eq!(name(Method::POST, "/v1/bookings").as_deref(), Some("payments"));
        assert!(name(Method::GET, "/v1/bookings").is_none());
        assert!(name(Method::GET, "/v1/bookings/abc").is_none());
        assert!(name(Method::POST, "/v1/quotes").is_none());
    }
}
