use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    /// Absent: no rate limiting, webhooks are not de-duplicated across instances
    pub redis: Option<RedisConfig>,
    /// Absent: events are dropped
    pub kafka: Option<KafkaConfig>,
    pub auth: AuthConfig,
    #[serde(default)]
    pub business_rules: BusinessRules,
    pub payments: PaymentsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    #[serde(default)]
    pub booking_fee_pence: i64,
    #[serde(default = "default_invoice_due_days")]
    pub invoice_due_days: i64,
    #[serde(default = "default_pending_ttl")]
    pub pending_payment_ttl_minutes: i64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_housekeeping_interval")]
    pub housekeeping_interval_seconds: u64,
}

fn default_invoice_due_days() -> i64 { 30 }
fn default_pending_ttl() -> i64 { 30 }
fn default_currency() -> String { "GBP".to_string() }
fn default_housekeeping_interval() -> u64 { 60 }

impl Default for BusinessRules {
    fn default() -> Self {
        Self {
            booking_fee_pence: 0,
            invoice_due_days: default_invoice_due_days(),
            pending_payment_ttl_minutes: default_pending_ttl(),
            currency: default_currency(),
            housekeeping_interval_seconds: default_housekeeping_interval(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expiration_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: i64,
}

fn default_rate_limit() -> i64 { 120 }

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentProvider {
    /// In-process gateways, nothing leaves the machine
    Mock,
    /// Stripe for cards, PayPal for PayPal
    Live,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PaymentsConfig {
    pub provider: PaymentProvider,
    #[serde(default)]
    pub stripe_secret_key: String,
    #[serde(default)]
    pub stripe_webhook_secret: String,
    #[serde(default)]
    pub paypal_client_id: String,
    #[serde(default)]
    pub paypal_client_secret: String,
    #[serde(default)]
    pub paypal_base_url: String,
    #[serde(default)]
    pub paypal_return_url: String,
    #[serde(default)]
    pub paypal_cancel_url: String,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Developer overrides, not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. `AIRPARK_DATABASE__URL=postgres://...`
            .add_source(config::Environment::with_prefix("AIRPARK").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
