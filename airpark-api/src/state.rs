use std::sync::Arc;
use std::time::Duration;

use airpark_booking::{BookingService, Repositories};
use airpark_store::RedisClient;

use crate::metrics::Metrics;
use crate::middleware::resiliency::CircuitBreaker;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
}

/// One breaker per outbound dependency
pub struct ResiliencyState {
    pub payment_cb: CircuitBreaker,
    pub webhook_cb: CircuitBreaker,
}

impl Default for ResiliencyState {
    fn default() -> Self {
        Self {
            payment_cb: CircuitBreaker::new("payments", 5, Duration::from_secs(30)),
            webhook_cb: CircuitBreaker::new("webhooks", 5, Duration::from_secs(30)),
        }
    }
}

#[derive(Clone, Default)]
pub struct WebhookConfig {
    /// Empty: Stripe signatures are not checked (mock provider)
    pub stripe_secret: String,
    /// How long a processed event id is remembered
    pub dedupe_ttl_seconds: u64,
}

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<BookingService>,
    pub repos: Repositories,
    pub redis: Option<Arc<RedisClient>>,
    pub auth: AuthConfig,
    pub webhooks: WebhookConfig,
    pub rate_limit_per_minute: i64,
    pub resiliency: Arc<ResiliencyState>,
    pub metrics: Arc<Metrics>,
}
