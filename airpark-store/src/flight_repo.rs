use airpark_core::flight::Flight;
use airpark_core::repository::FlightRepository;
use airpark_core::RepoResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

pub struct StoreFlightRepository {
    pool: PgPool,
}

impl StoreFlightRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct FlightRow {
    id: Uuid,
    owner_id: Uuid,
    outbound_flight_number: String,
    departure_at: DateTime<Utc>,
    return_flight_number: String,
    return_at: DateTime<Utc>,
    destination: String,
    created_at: DateTime<Utc>,
}

impl From<FlightRow> for Flight {
    fn from(row: FlightRow) -> Self {
        Flight {
            id: row.id,
            owner_id: row.owner_id,
            outbound_flight_number: row.outbound_flight_number,
            departure_at: row.departure_at,
            return_flight_number: row.return_flight_number,
            return_at: row.return_at,
            destination: row.destination,
            created_at: row.created_at,
        }
    }
}

const FLIGHT_COLUMNS: &str = "id, owner_id, outbound_flight_number, departure_at, \
    return_flight_number, return_at, destination, created_at";

#[async_trait]
impl FlightRepository for StoreFlightRepository {
    async fn create_flight(&self, flight: &Flight) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO flights (id, owner_id, outbound_flight_number, departure_at,
                                 return_flight_number, return_at, destination, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(flight.id)
        .bind(flight.owner_id)
        .bind(&flight.outbound_flight_number)
        .bind(flight.departure_at)
        .bind(&flight.return_flight_number)
        .bind(flight.return_at)
        .bind(&flight.destination)
        .bind(flight.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_flight(&self, id: Uuid) -> RepoResult<Option<Flight>> {
        let row = sqlx::query_as::<_, FlightRow>(&format!(
            "SELECT {} FROM flights WHERE id = $1",
            FLIGHT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Flight::from))
    }

    async fn list_flights(&self, owner_id: Uuid) -> RepoResult<Vec<Flight>> {
        let rows = sqlx::query_as::<_, FlightRow>(&format!(
            "SELECT {} FROM flights WHERE owner_id = $1 ORDER BY departure_at",
            FLIGHT_COLUMNS
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Flight::from).collect())
    }

    async fn update_flight(&self, flight: &Flight) -> RepoResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE flights
            SET outbound_flight_number = $2, departure_at = $3, return_flight_number = $4,
                return_at = $5, destination = $6
            WHERE id = $1
            "#,
        )
        .bind(flight.id)
        .bind(&flight.outbound_flight_number)
        .bind(flight.departure_at)
        .bind(&flight.return_flight_number)
        .bind(flight.return_at)
        .bind(&flight.destination)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_flight(&self, id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM flights WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
