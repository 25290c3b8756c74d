use async_trait::async_trait;
use serde::Serialize;

/// Outbound domain event bus (Kafka in production)
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(
        &self,
        topic: &str,
        key: &str,
        payload: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Serialize and publish, logging instead of failing. A broker outage never fails the caller.
pub async fn publish_json<T: Serialize>(
    publisher: &dyn EventPublisher,
    topic: &str,
    key: &str,
    event: &T,
) {
    let payload = match serde_json::to_string(event) {
        Ok(p) => p,
        Err(e) => {
            tracing::error!("Failed to serialize event for {}: {}", topic, e);
            return;
        }
    };

    if let Err(e) = publisher.publish(topic, key, &payload).await {
        tracing::warn!("Event publish to {} failed for key {}: {}", topic, key, e);
    }
}
