use airpark_core::fleet::Vehicle;
use airpark_core::repository::VehicleRepository;
use airpark_core::RepoResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

pub struct StoreVehicleRepository {
    pool: PgPool,
}

impl StoreVehicleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct VehicleRow {
    id: Uuid,
    owner_id: Uuid,
    registration: String,
    make: String,
    model: String,
    colour: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<VehicleRow> for Vehicle {
    fn from(row: VehicleRow) -> Self {
        Vehicle {
            id: row.id,
            owner_id: row.owner_id,
            registration: row.registration,
            make: row.make,
            model: row.model,
            colour: row.colour,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl VehicleRepository for StoreVehicleRepository {
    async fn create_vehicle(&self, vehicle: &Vehicle) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO vehicles (id, owner_id, registration, make, model, colour, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(vehicle.id)
        .bind(vehicle.owner_id)
        .bind(&vehicle.registration)
        .bind(&vehicle.make)
        .bind(&vehicle.model)
        .bind(&vehicle.colour)
        .bind(vehicle.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_vehicle(&self, id: Uuid) -> RepoResult<Option<Vehicle>> {
        let row = sqlx::query_as::<_, VehicleRow>(
            r#"
            SELECT id, owner_id, registration, make, model, colour, created_at
            FROM vehicles
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Vehicle::from))
    }

    async fn list_vehicles(&self, owner_id: Uuid) -> RepoResult<Vec<Vehicle>> {
        let rows = sqlx::query_as::<_, VehicleRow>(
            r#"
            SELECT id, owner_id, registration, make, model, colour, created_at
            FROM vehicles WHERE owner_id = $1 ORDER BY created_at
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Vehicle::from).collect())
    }

    async fn update_vehicle(&self, vehicle: &Vehicle) -> RepoResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE vehicles
            SET registration = $2, make = $3, model = $4, colour = $5
            WHERE id = $1
            "#,
        )
        .bind(vehicle.id)
        .bind(&vehicle.registration)
        .bind(&vehicle.make)
        .bind(&vehicle.model)
        .bind(&vehicle.colour)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_vehicle(&self, id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM vehicles WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
