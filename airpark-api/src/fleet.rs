use airpark_core::fleet::{Vehicle, VehicleInput};
use airpark_core::flight::{Flight, FlightInput};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::get,
    Extension, Json, Router,
};
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::auth::{auth_middleware, Claims};
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/v1/vehicles", get(list_vehicles).post(create_vehicle))
        .route(
            "/v1/vehicles/{id}",
            get(get_vehicle).put(update_vehicle).delete(delete_vehicle),
        )
        .route("/v1/flights", get(list_flights).post(create_flight))
        .route(
            "/v1/flights/{id}",
            get(get_flight).put(update_flight).delete(delete_flight),
        )
        .route_layer(from_fn_with_state(state, auth_middleware))
}

// ============================================================================
// Vehicles
// ============================================================================

async fn owned_vehicle(state: &AppState, owner_id: Uuid, id: Uuid) -> Result<Vehicle, AppError> {
    state
        .repos
        .vehicles
        .get_vehicle(id)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .filter(|v| v.owner_id == owner_id)
        .ok_or_else(|| AppError::NotFoundError("Vehicle not found".to_string()))
}

async fn ensure_unique_registration(state: &AppState, vehicle: &Vehicle) -> Result<(), AppError> {
    let taken = state
        .repos
        .vehicles
        .list_vehicles(vehicle.owner_id)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .iter()
        .any(|v| v.id != vehicle.id && v.registration == vehicle.registration);
    if taken {
        return Err(AppError::ConflictError(format!(
            "Vehicle {} is already registered",
            vehicle.registration
        )));
    }
    Ok(())
}

/// GET /v1/vehicles
async fn list_vehicles(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<Vehicle>>, AppError> {
    let vehicles = state
        .repos
        .vehicles
        .list_vehicles(claims.user_id()?)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;
    Ok(Json(vehicles))
}

/// POST /v1/vehicles
async fn create_vehicle(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(input): Json<VehicleInput>,
) -> Result<(StatusCode, Json<Vehicle>), AppError> {
    let vehicle = input.into_vehicle(claims.user_id()?)?;
    ensure_unique_registration(&state, &vehicle).await?;

    state
        .repos
        .vehicles
        .create_vehicle(&vehicle)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;
    Ok((StatusCode::CREATED, Json(vehicle)))
}

/// GET /v1/vehicles/{id}
async fn get_vehicle(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vehicle>, AppError> {
    Ok(Json(owned_vehicle(&state, claims.user_id()?, id).await?))
}

/// PUT /v1/vehicles/{id}
async fn update_vehicle(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(input): Json<VehicleInput>,
) -> Result<Json<Vehicle>, AppError> {
    let existing = owned_vehicle(&state, claims.user_id()?, id).await?;
    let updated = input.apply_to(&existing)?;
    ensure_unique_registration(&state, &updated).await?;

    state
        .repos
        .vehicles
        .update_vehicle(&updated)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;
    Ok(Json(updated))
}

/// DELETE /v1/vehicles/{id}
///
/// Vehicles on any booking are kept for the booking history.
async fn delete_vehicle(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let owner_id = claims.user_id()?;
    let vehicle = owned_vehicle(&state, owner_id, id).await?;

    let in_use = state
        .repos
        .bookings
        .list_bookings_for_user(owner_id)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .iter()
        .any(|b| b.vehicle_ids.contains(&vehicle.id));
    if in_use {
        return Err(AppError::ConflictError("Vehicle is part of a booking".to_string()));
    }

    state
        .repos
        .vehicles
        .delete_vehicle(vehicle.id)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Flights
// ============================================================================

async fn owned_flight(state: &AppState, owner_id: Uuid, id: Uuid) -> Result<Flight, AppError> {
    state
        .repos
        .flights
        .get_flight(id)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .filter(|f| f.owner_id == owner_id)
        .ok_or_else(|| AppError::NotFoundError("Flight not found".to_string()))
}

/// GET /v1/flights
async fn list_flights(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<Flight>>, AppError> {
    let flights = state
        .repos
        .flights
        .list_flights(claims.user_id()?)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;
    Ok(Json(flights))
}

/// POST /v1/flights
async fn create_flight(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(input): Json<FlightInput>,
) -> Result<(StatusCode, Json<Flight>), AppError> {
    let flight = input.into_flight(claims.user_id()?)?;
    state
        .repos
        .flights
        .create_flight(&flight)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;
    Ok((StatusCode::CREATED, Json(flight)))
}

/// GET /v1/flights/{id}
async fn get_flight(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<Flight>, AppError> {
    Ok(Json(owned_flight(&state, claims.user_id()?, id).await?))
}

/// PUT /v1/flights/{id}
///
/// Existing bookings keep the dates they were priced with.
async fn update_flight(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(input): Json<FlightInput>,
) -> Result<Json<Flight>, AppError> {
    let existing = owned_flight(&state, claims.user_id()?, id).await?;
    let updated = input.apply_to(&existing)?;
    state
        .repos
        .flights
        .update_flight(&updated)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;
    Ok(Json(updated))
}

/// DELETE /v1/flights/{id}
async fn delete_flight(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let owner_id = claims.user_id()?;
    let flight = owned_flight(&state, owner_id, id).await?;

    let in_use = state
        .repos
        .bookings
        .list_bookings_for_user(owner_id)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .iter()
        .any(|b| b.flight_id == flight.id);
    if in_use {
        return Err(AppError::ConflictError("Flight is part of a booking".to_string()));
    }

    state
        .repos
        .flights
        .delete_flight(flight.id)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;
    Ok(StatusCode::NO_CONTENT)
}
