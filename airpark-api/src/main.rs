use std::net::SocketAddr;
use std::sync::Arc;

use airpark_api::{
    app,
    metrics::Metrics,
    state::{AppState, AuthConfig, ResiliencyState, WebhookConfig},
    worker,
};
use airpark_booking::gateways::{PayPalAdapter, PayPalConfig, StripeAdapter};
use airpark_booking::{BookingPolicy, BookingService, MockPaymentAdapter, PaymentOrchestrator};
use airpark_core::events::EventPublisher;
use airpark_core::payment::PaymentAdapter;
use airpark_store::app_config::{Config, PaymentProvider};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Processed webhook ids are remembered for a day
const WEBHOOK_DEDUPE_TTL_SECONDS: u64 = 86_400;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "airpark_api=debug,tower_http=debug,axum::rejection=trace".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().expect("Failed to load config");
    tracing::info!("Starting AirPark API on port {}", config.server.port);

    // Postgres
    let db = airpark_store::DbClient::new(&config.database.url)
        .await
        .expect("Failed to connect to Postgres");
    db.migrate().await.expect("Failed to run migrations");
    let rules = db
        .fetch_business_rules(config.business_rules.clone())
        .await
        .expect("Failed to load business rules");
    let repos = airpark_store::postgres_repositories(&db);

    // Redis (optional)
    let (redis, rate_limit_per_minute) = match &config.redis {
        Some(redis_config) => {
            let client = airpark_store::RedisClient::new(&redis_config.url)
                .await
                .expect("Failed to connect to Redis");
            (Some(Arc::new(client)), redis_config.rate_limit_per_minute)
        }
        None => {
            tracing::warn!("Redis not configured: rate limiting disabled");
            (None, 0)
        }
    };

    // Kafka (optional)
    let events: Arc<dyn EventPublisher> = match &config.kafka {
        Some(kafka_config) => Arc::new(
            airpark_store::EventProducer::new(&kafka_config.brokers)
                .expect("Failed to create Kafka producer"),
        ),
        None => {
            tracing::warn!("Kafka not configured: domain events are dropped");
            Arc::new(airpark_store::NoopPublisher)
        }
    };

    // Payment gateways
    let payments = &config.payments;
    let (card, paypal) = match payments.provider {
        PaymentProvider::Mock => {
            tracing::warn!("Using mock payment gateways");
            let card: Arc<dyn PaymentAdapter> = Arc::new(MockPaymentAdapter::new("mock_card"));
            let paypal: Arc<dyn PaymentAdapter> = Arc::new(MockPaymentAdapter::new("mock_paypal"));
            (card, paypal)
        }
        PaymentProvider::Live => {
            let card: Arc<dyn PaymentAdapter> =
                Arc::new(StripeAdapter::new(payments.stripe_secret_key.clone()));
            let paypal: Arc<dyn PaymentAdapter> = Arc::new(PayPalAdapter::new(PayPalConfig {
                client_id: payments.paypal_client_id.clone(),
                client_secret: payments.paypal_client_secret.clone(),
                base_url: payments.paypal_base_url.clone(),
                return_url: payments.paypal_return_url.clone(),
                cancel_url: payments.paypal_cancel_url.clone(),
            }));
            (card, paypal)
        }
    };
    let orchestrator = Arc::new(PaymentOrchestrator::new(card, paypal));

    let policy = BookingPolicy {
        booking_fee_pence: rules.booking_fee_pence,
        invoice_due_days: rules.invoice_due_days,
        pending_payment_ttl_minutes: rules.pending_payment_ttl_minutes,
        currency: rules.currency.clone(),
    };
    let service = Arc::new(BookingService::new(repos.clone(), orchestrator, events, policy));

    // Housekeeping
    tokio::spawn(worker::start_housekeeping_worker(
        service.clone(),
        rules.housekeeping_interval_seconds,
    ));

    let app_state = AppState {
        service,
        repos,
        redis,
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            expiration: config.auth.jwt_expiration_seconds,
        },
        webhooks: WebhookConfig {
            stripe_secret: match payments.provider {
                PaymentProvider::Live => payments.stripe_webhook_secret.clone(),
                PaymentProvider::Mock => String::new(),
            },
            dedupe_ttl_seconds: WEBHOOK_DEDUPE_TTL_SECONDS,
        },
        rate_limit_per_minute,
        resiliency: Arc::new(ResiliencyState::default()),
        metrics: Arc::new(Metrics::new().expect("Failed to register metrics")),
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.expect("Failed to bind listener");
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .expect("Server error");
}
