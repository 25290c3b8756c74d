use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::time::Duration;
use tracing::info;

use crate::app_config::BusinessRules;

#[derive(Clone)]
pub struct DbClient {
    pub pool: Pool<Postgres>,
}

#[derive(sqlx::FromRow)]
struct RuleRow {
    rule_key: String,
    rule_value: Value,
}

impl DbClient {
    pub async fn new(connection_string: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(connection_string)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("../migrations").run(&self.pool).await?;
        info!("Migrations completed successfully.");
        Ok(())
    }

    /// Overlay rows of the `business_rules` table (`{"value": ...}`) on the file defaults
    pub async fn fetch_business_rules(
        &self,
        defaults: BusinessRules,
    ) -> Result<BusinessRules, sqlx::Error> {
        let rows = sqlx::query_as::<_, RuleRow>("SELECT rule_key, rule_value FROM business_rules")
            .fetch_all(&self.pool)
            .await?;

        let mut rules = defaults;
        for row in rows {
            apply_rule(&mut rules, &row.rule_key, &row.rule_value);
        }
        Ok(rules)
    }
}

fn apply_rule(rules: &mut BusinessRules, key: &str, raw: &Value) {
    let Some(v) = raw.get("value") else {
        return;
    };

    match key {
        "booking_fee_pence" => {
            if let Some(n) = v.as_i64().filter(|n| *n >= 0) {
                rules.booking_fee_pence = n;
            }
        }
        "invoice_due_days" => {
            if let Some(n) = v.as_i64().filter(|n| *n > 0) {
                rules.invoice_due_days = n;
            }
        }
        "pending_payment_ttl_minutes" => {
            if let Some(n) = v.as_i64().filter(|n| *n > 0) {
                rules.pending_payment_ttl_minutes = n;
            }
        }
        "currency" => {
            if let Some(s) = v.as_str() {
                rules.currency = s.to_uppercase();
            }
        }
        "housekeeping_interval_seconds" => {
            if let Some(n) = v.as_u64().filter(|n| *n > 0) {
                rules.housekeeping_interval_seconds = n;
            }
        }
        other => tracing::debug!("Ignoring unknown business rule {}", other),
    }
}
