use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use std::time::Instant;

use crate::state::AppState;

pub struct Metrics {
    registry: Registry,
    pub bookings_total: IntCounterVec,
    pub payments_total: IntCounterVec,
    pub http_requests_total: IntCounterVec,
    pub http_request_duration: HistogramVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let bookings_total = IntCounterVec::new(
            Opts::new("airpark_bookings_total", "Booking operations by outcome"),
            &["outcome"],
        )?;
        let payments_total = IntCounterVec::new(
            Opts::new("airpark_payments_total", "Payment attempts by method and outcome"),
            &["method", "outcome"],
        )?;
        let http_requests_total = IntCounterVec::new(
            Opts::new("airpark_http_requests_total", "HTTP responses by status code"),
            &["status"],
        )?;
        let http_request_duration = HistogramVec::new(
            HistogramOpts::new("airpark_http_request_duration_seconds", "HTTP request latency"),
            &["method"],
        )?;

        registry.register(Box::new(bookings_total.clone()))?;
        registry.register(Box::new(payments_total.clone()))?;
        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration.clone()))?;

        Ok(Self {
            registry,
            bookings_total,
            payments_total,
            http_requests_total,
            http_request_duration,
        })
    }

    pub fn booking(&self, outcome: &str) {
        self.bookings_total.with_label_values(&[outcome]).inc();
    }

    pub fn payment(&self, method: &str, outcome: &str) {
        self.payments_total.with_label_values(&[method, outcome]).inc();
    }

    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

pub async fn track_http_metrics(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let method = req.method().to_string();
    let started = Instant::now();

    let response = next.run(req).await;

    state
        .metrics
        .http_request_duration
        .with_label_values(&[method.as_str()])
        .observe(started.elapsed().as_secs_f64());
    state
        .metrics
        .http_requests_total
        .with_label_values(&[response.status().as_str()])
        .inc();
    response
}

/// GET /metrics
pub async fn metrics_handler(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(body) => ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body).into_response(),
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
