use airpark_catalog::{ParkingSlot, SlotStatus, Tariff};
use airpark_core::repository::{ParkingSlotRepository, TariffRepository};
use airpark_core::RepoResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

pub struct StoreTariffRepository {
    pool: PgPool,
}

impl StoreTariffRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct TariffRow {
    id: Uuid,
    kind: String,
    name: String,
    description: Option<String>,
    daily_rate_pence: i64,
    service_fee_pence: i64,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<TariffRow> for Tariff {
    type Error = airpark_core::RepoError;

    fn try_from(row: TariffRow) -> Result<Self, Self::Error> {
        Ok(Tariff {
            id: row.id,
            kind: row.kind.parse()?,
            name: row.name,
            description: row.description,
            daily_rate_pence: row.daily_rate_pence,
            service_fee_pence: row.service_fee_pence,
            is_active: row.is_active,
            created_at: row.created_at,
        })
    }
}

const TARIFF_COLUMNS: &str =
    "id, kind, name, description, daily_rate_pence, service_fee_pence, is_active, created_at";

#[async_trait]
impl TariffRepository for StoreTariffRepository {
    async fn create_tariff(&self, tariff: &Tariff) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO tariffs (id, kind, name, description, daily_rate_pence, service_fee_pence,
                                 is_active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(tariff.id)
        .bind(tariff.kind.as_str())
        .bind(&tariff.name)
        .bind(&tariff.description)
        .bind(tariff.daily_rate_pence)
        .bind(tariff.service_fee_pence)
        .bind(tariff.is_active)
        .bind(tariff.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_tariff(&self, id: Uuid) -> RepoResult<Option<Tariff>> {
        let row = sqlx::query_as::<_, TariffRow>(&format!(
            "SELECT {} FROM tariffs WHERE id = $1",
            TARIFF_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Tariff::try_from).transpose()
    }

    async fn list_tariffs(&self, active_only: bool) -> RepoResult<Vec<Tariff>> {
        let rows = sqlx::query_as::<_, TariffRow>(&format!(
            r#"
            SELECT {}
            FROM tariffs
            WHERE ($1 = FALSE OR is_active)
            ORDER BY daily_rate_pence + service_fee_pence, name
            "#,
            TARIFF_COLUMNS
        ))
        .bind(active_only)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Tariff::try_from).collect()
    }

    async fn update_tariff(&self, tariff: &Tariff) -> RepoResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE tariffs
            SET kind = $2, name = $3, description = $4, daily_rate_pence = $5,
                service_fee_pence = $6, is_active = $7
            WHERE id = $1
            "#,
        )
        .bind(tariff.id)
        .bind(tariff.kind.as_str())
        .bind(&tariff.name)
        .bind(&tariff.description)
        .bind(tariff.daily_rate_pence)
        .bind(tariff.service_fee_pence)
        .bind(tariff.is_active)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_tariff(&self, id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM tariffs WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

pub struct StoreParkingSlotRepository {
    pool: PgPool,
}

impl StoreParkingSlotRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct SlotRow {
    id: Uuid,
    number: i32,
    zone: Option<String>,
    status: String,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SlotRow> for ParkingSlot {
    type Error = airpark_core::RepoError;

    fn try_from(row: SlotRow) -> Result<Self, Self::Error> {
        Ok(ParkingSlot {
            id: row.id,
            number: row.number,
            zone: row.zone,
            status: row.status.parse()?,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl ParkingSlotRepository for StoreParkingSlotRepository {
    async fn create_slot(&self, slot: &ParkingSlot) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO parking_slots (id, number, zone, status, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(slot.id)
        .bind(slot.number)
        .bind(&slot.zone)
        .bind(slot.status.as_str())
        .bind(slot.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_slot(&self, id: Uuid) -> RepoResult<Option<ParkingSlot>> {
        let row = sqlx::query_as::<_, SlotRow>(
            "SELECT id, number, zone, status, updated_at FROM parking_slots WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(ParkingSlot::try_from).transpose()
    }

    async fn list_slots(&self) -> RepoResult<Vec<ParkingSlot>> {
        let rows = sqlx::query_as::<_, SlotRow>(
            "SELECT id, number, zone, status, updated_at FROM parking_slots ORDER BY number",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(ParkingSlot::try_from).collect()
    }

    async fn rename_slot(
        &self,
        id: Uuid,
        number: i32,
        zone: Option<String>,
    ) -> RepoResult<Option<ParkingSlot>> {
        let row = sqlx::query_as::<_, SlotRow>(
            r#"
            UPDATE parking_slots SET number = $2, zone = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING id, number, zone, status, updated_at
            "#,
        )
        .bind(id)
        .bind(number)
        .bind(zone)
        .fetch_optional(&self.pool)
        .await?;
        row.map(ParkingSlot::try_from).transpose()
    }

    async fn delete_slot(&self, id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM parking_slots WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn reserve_first_available(&self) -> RepoResult<Option<ParkingSlot>> {
        let mut tx = self.pool.begin().await?;

        // SKIP LOCKED: concurrent bookings each take a different slot
        let candidate: Option<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT id FROM parking_slots
            WHERE status = 'AVAILABLE'
            ORDER BY number
            LIMIT 1
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .fetch_optional(&mut *tx)
        .await?;

        let Some((id,)) = candidate else {
            tx.rollback().await?;
            return Ok(None);
        };

        let row = sqlx::query_as::<_, SlotRow>(
            r#"
            UPDATE parking_slots SET status = 'RESERVED', updated_at = NOW()
            WHERE id = $1
            RETURNING id, number, zone, status, updated_at
            "#,
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(ParkingSlot::try_from(row)?))
    }

    async fn set_status(&self, id: Uuid, status: SlotStatus) -> RepoResult<Option<ParkingSlot>> {
        let row = sqlx::query_as::<_, SlotRow>(
            r#"
            UPDATE parking_slots SET status = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, number, zone, status, updated_at
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.map(ParkingSlot::try_from).transpose()
    }

    async fn max_number(&self) -> RepoResult<Option<i32>> {
        let (max,): (Option<i32>,) = sqlx::query_as("SELECT MAX(number) FROM parking_slots")
            .fetch_one(&self.pool)
            .await?;
        Ok(max)
    }
}
