use redis::RedisResult;
use tracing::debug;

#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
}

impl RedisClient {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client })
    }

    /// Fixed-window counter. `true` while the caller is under `limit`.
    pub async fn check_rate_limit(
        &self,
        key: &str,
        limit: i64,
        window_seconds: i64,
    ) -> RedisResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let (count,): (i64,) = redis::pipe()
            .atomic()
            .incr(key, 1)
            .expire(key, window_seconds)
            .ignore()
            .query_async(&mut conn)
            .await?;

        Ok(count <= limit)
    }

    /// Claim a webhook event id. `false` means another delivery already claimed it.
    pub async fn claim_webhook_event(
        &self,
        provider: &str,
        event_id: &str,
        ttl_seconds: u64,
    ) -> RedisResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = format!("webhook:{}:{}", provider, event_id);

        // SET NX: only the first delivery wins
        let result: Option<String> = redis::cmd("SET")
            .arg(&key)
            .arg("1")
            .arg("NX")
            .arg("EX")
            .arg(ttl_seconds)
            .query_async(&mut conn)
            .await?;

        if result.is_none() {
            debug!("Webhook {} already processed", key);
        }
        Ok(result.is_some())
    }

    /// Give a claim back so the provider's retry is processed
    pub async fn release_webhook_event(&self, provider: &str, event_id: &str) -> RedisResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = format!("webhook:{}:{}", provider, event_id);
        redis::cmd("DEL").arg(&key).query_async(&mut conn).await
    }
}
