use airpark_booking::{
    receivables_summary, Booking, BookingFilter, Invoice, InvoiceStatus, ReceivablesSummary,
    UpdateBooking,
};
use airpark_catalog::{NewTariff, OccupancySummary, ParkingSlot, Tariff};
use airpark_core::identity::{Role, User};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::auth::{admin_auth_middleware, staff_auth_middleware, Claims};
use crate::state::AppState;

/// Largest batch `POST /v1/admin/slots/bulk` accepts
pub const MAX_BULK_SLOTS: i32 = 500;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ScheduleQuery {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct InvoiceQuery {
    pub status: Option<InvoiceStatus>,
}

#[derive(Debug, Serialize)]
pub struct InvoiceListResponse {
    pub invoices: Vec<Invoice>,
    pub summary: ReceivablesSummary,
}

#[derive(Debug, Deserialize)]
pub struct CreateSlotRequest {
    pub number: i32,
    pub zone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BulkSlotsRequest {
    pub count: i32,
    pub zone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSlotRequest {
    pub number: Option<i32>,
    pub zone: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OccupancyResponse {
    #[serde(flatten)]
    pub summary: OccupancySummary,
    pub utilisation: f64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub role: Role,
}

pub fn routes(state: AppState) -> Router<AppState> {
    let staff = Router::new()
        // Bookings
        .route("/v1/admin/bookings", get(list_bookings))
        .route(
            "/v1/admin/bookings/{id}",
            get(get_booking).put(update_booking).delete(delete_booking),
        )
        .route("/v1/admin/bookings/{id}/check-in", post(check_in))
        .route("/v1/admin/bookings/{id}/check-out", post(check_out))
        .route("/v1/admin/bookings/{id}/cash-payment", post(record_cash_payment))
        .route("/v1/admin/bookings/{id}/cancel", post(cancel_booking))
        .route("/v1/admin/schedule", get(schedule))
        // Tariffs
        .route("/v1/admin/tariffs", get(list_tariffs).post(create_tariff))
        .route("/v1/admin/tariffs/{id}", put(update_tariff).delete(delete_tariff))
        // Slots
        .route("/v1/admin/slots", get(list_slots).post(create_slot))
        .route("/v1/admin/slots/bulk", post(bulk_create_slots))
        .route("/v1/admin/slots/occupancy", get(occupancy))
        .route("/v1/admin/slots/{id}", put(update_slot).delete(delete_slot))
        // Invoices
        .route("/v1/admin/invoices", get(list_invoices))
        .route("/v1/admin/invoices/{id}/mark-paid", post(mark_invoice_paid))
        .route_layer(from_fn_with_state(state.clone(), staff_auth_middleware));

    let admin = Router::new()
        .route("/v1/admin/users", get(list_users))
        .route("/v1/admin/users/{id}/role", put(update_role))
        .route_layer(from_fn_with_state(state, admin_auth_middleware));

    staff.merge(admin)
}

/// Every booking, for reference checks before deleting catalog rows
async fn all_bookings(state: &AppState) -> Result<Vec<Booking>, AppError> {
    Ok(state.service.list_bookings(&BookingFilter::default()).await?)
}

// ============================================================================
// Bookings
// ============================================================================

/// GET /v1/admin/bookings
async fn list_bookings(
    State(state): State<AppState>,
    Query(filter): Query<BookingFilter>,
) -> Result<Json<Vec<Booking>>, AppError> {
    Ok(Json(state.service.list_bookings(&filter).await?))
}

/// GET /v1/admin/bookings/{id}
async fn get_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.service.get_booking(&claims.actor()?, id).await?))
}

/// PUT /v1/admin/bookings/{id}
async fn update_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateBooking>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.service.update_booking(id, req).await?))
}

/// DELETE /v1/admin/bookings/{id}
async fn delete_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.service.delete_booking(id).await?;
    state.metrics.booking("deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/admin/bookings/{id}/check-in
async fn check_in(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    let booking = state.service.check_in(id).await?;
    state.metrics.booking("checked_in");
    Ok(Json(booking))
}

/// POST /v1/admin/bookings/{id}/check-out
async fn check_out(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    let booking = state.service.check_out(id).await?;
    state.metrics.booking("completed");
    Ok(Json(booking))
}

/// POST /v1/admin/bookings/{id}/cash-payment
async fn record_cash_payment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    let booking = state.service.record_cash_payment(id).await?;
    state.metrics.payment("CASH", "succeeded");
    Ok(Json(booking))
}

/// POST /v1/admin/bookings/{id}/cancel
async fn cancel_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    let booking = state.service.cancel_booking(&claims.actor()?, id).await?;
    state.metrics.booking("cancelled");
    Ok(Json(booking))
}

/// GET /v1/admin/schedule?from&to
async fn schedule(
    State(state): State<AppState>,
    Query(query): Query<ScheduleQuery>,
) -> Result<Json<Vec<Booking>>, AppError> {
    Ok(Json(state.service.schedule(query.from, query.to).await?))
}

// ============================================================================
// Tariffs
// ============================================================================

async fn load_tariff(state: &AppState, id: Uuid) -> Result<Tariff, AppError> {
    state
        .repos
        .tariffs
        .get_tariff(id)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .ok_or_else(|| AppError::NotFoundError("Tariff not found".to_string()))
}

/// GET /v1/admin/tariffs
async fn list_tariffs(State(state): State<AppState>) -> Result<Json<Vec<Tariff>>, AppError> {
    let tariffs = state
        .repos
        .tariffs
        .list_tariffs(false)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;
    Ok(Json(tariffs))
}

/// POST /v1/admin/tariffs
async fn create_tariff(
    State(state): State<AppState>,
    Json(req): Json<NewTariff>,
) -> Result<(StatusCode, Json<Tariff>), AppError> {
    let tariff = req.into_tariff()?;
    state
        .repos
        .tariffs
        .create_tariff(&tariff)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    tracing::info!("Tariff {} created ({})", tariff.name, tariff.kind.as_str());
    Ok((StatusCode::CREATED, Json(tariff)))
}

/// PUT /v1/admin/tariffs/{id}
///
/// Existing bookings keep the price they were quoted.
async fn update_tariff(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<NewTariff>,
) -> Result<Json<Tariff>, AppError> {
    let existing = load_tariff(&state, id).await?;
    let updated = req.apply_to(&existing)?;
    state
        .repos
        .tariffs
        .update_tariff(&updated)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;
    Ok(Json(updated))
}

/// DELETE /v1/admin/tariffs/{id}
///
/// Tariffs with bookings can only be deactivated.
async fn delete_tariff(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let tariff = load_tariff(&state, id).await?;
    if all_bookings(&state).await?.iter().any(|b| b.tariff_id == tariff.id) {
        return Err(AppError::ConflictError(format!(
            "Tariff {} has bookings; deactivate it instead",
            tariff.name
        )));
    }

    state
        .repos
        .tariffs
        .delete_tariff(tariff.id)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Slots
// ============================================================================

async fn list_all_slots(state: &AppState) -> Result<Vec<ParkingSlot>, AppError> {
    state
        .repos
        .slots
        .list_slots()
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))
}

async fn ensure_number_free(
    state: &AppState,
    number: i32,
    except: Option<Uuid>,
) -> Result<(), AppError> {
    let taken = list_all_slots(state)
        .await?
        .iter()
        .any(|s| s.number == number && Some(s.id) != except);
    if taken {
        return Err(AppError::ConflictError(format!("Slot {} already exists", number)));
    }
    Ok(())
}

/// GET /v1/admin/slots
async fn list_slots(State(state): State<AppState>) -> Result<Json<Vec<ParkingSlot>>, AppError> {
    Ok(Json(list_all_slots(&state).await?))
}

/// POST /v1/admin/slots
async fn create_slot(
    State(state): State<AppState>,
    Json(req): Json<CreateSlotRequest>,
) -> Result<(StatusCode, Json<ParkingSlot>), AppError> {
    let slot = ParkingSlot::new(req.number, req.zone)?;
    ensure_number_free(&state, slot.number, None).await?;

    state
        .repos
        .slots
        .create_slot(&slot)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;
    Ok((StatusCode::CREATED, Json(slot)))
}

/// POST /v1/admin/slots/bulk
///
/// Appends `count` slots numbered after the current highest.
async fn bulk_create_slots(
    State(state): State<AppState>,
    Json(req): Json<BulkSlotsRequest>,
) -> Result<(StatusCode, Json<Vec<ParkingSlot>>), AppError> {
    if !(1..=MAX_BULK_SLOTS).contains(&req.count) {
        return Err(AppError::ValidationError(format!(
            "count must be between 1 and {}",
            MAX_BULK_SLOTS
        )));
    }

    let highest = state
        .repos
        .slots
        .max_number()
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .unwrap_or(0);
    let out_of_range = || {
        AppError::ValidationError(format!("slot numbers past {} are out of range", highest))
    };
    let start = highest.checked_add(1).ok_or_else(out_of_range)?;
    let last = start.checked_add(req.count - 1).ok_or_else(out_of_range)?;

    let mut created = Vec::with_capacity(req.count as usize);
    for number in start..=last {
        let slot = ParkingSlot::new(number, req.zone.clone())?;
        state
            .repos
            .slots
            .create_slot(&slot)
            .await
            .map_err(|e| AppError::InternalServerError(e.to_string()))?;
        created.push(slot);
    }

    tracing::info!("Added slots {}..={}", start, last);
    Ok((StatusCode::CREATED, Json(created)))
}

/// PUT /v1/admin/slots/{id}
///
/// Number and zone only; status follows the bookings.
async fn update_slot(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateSlotRequest>,
) -> Result<Json<ParkingSlot>, AppError> {
    let slot = state
        .repos
        .slots
        .get_slot(id)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .ok_or_else(|| AppError::NotFoundError("Slot not found".to_string()))?;

    let number = match req.number {
        Some(number) => {
            // Re-validate through the constructor
            ParkingSlot::new(number, None)?;
            ensure_number_free(&state, number, Some(slot.id)).await?;
            number
        }
        None => slot.number,
    };
    let zone = req.zone.or(slot.zone);

    let renamed = state
        .repos
        .slots
        .rename_slot(id, number, zone)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .ok_or_else(|| AppError::NotFoundError("Slot not found".to_string()))?;
    Ok(Json(renamed))
}

/// DELETE /v1/admin/slots/{id}
async fn delete_slot(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let slot = state
        .repos
        .slots
        .get_slot(id)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .ok_or_else(|| AppError::NotFoundError("Slot not found".to_string()))?;

    if slot.status != airpark_catalog::SlotStatus::Available {
        return Err(AppError::ConflictError(format!(
            "Slot {} is {}",
            slot.number,
            slot.status.as_str()
        )));
    }
    if all_bookings(&state).await?.iter().any(|b| b.parking_slot_id == slot.id) {
        return Err(AppError::ConflictError(format!("Slot {} has booking history", slot.number)));
    }

    state
        .repos
        .slots
        .delete_slot(slot.id)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /v1/admin/slots/occupancy
async fn occupancy(State(state): State<AppState>) -> Result<Json<OccupancyResponse>, AppError> {
    let summary = OccupancySummary::from_slots(&list_all_slots(&state).await?);
    let utilisation = summary.utilisation();
    Ok(Json(OccupancyResponse { summary, utilisation }))
}

// ============================================================================
// Invoices
// ============================================================================

/// GET /v1/admin/invoices?status
async fn list_invoices(
    State(state): State<AppState>,
    Query(query): Query<InvoiceQuery>,
) -> Result<Json<InvoiceListResponse>, AppError> {
    let invoices = state.service.list_invoices(query.status).await?;
    let summary = receivables_summary(&invoices, Utc::now());
    Ok(Json(InvoiceListResponse { invoices, summary }))
}

/// POST /v1/admin/invoices/{id}/mark-paid
async fn mark_invoice_paid(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Invoice>, AppError> {
    let invoice = state.service.mark_invoice_paid(id).await?;
    state.metrics.payment("INVOICE", "succeeded");
    Ok(Json(invoice))
}

// ============================================================================
// Users (admin only)
// ============================================================================

/// GET /v1/admin/users
async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<User>>, AppError> {
    let users = state
        .repos
        .users
        .list_users()
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;
    Ok(Json(users))
}

/// PUT /v1/admin/users/{id}/role
async fn update_role(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateRoleRequest>,
) -> Result<Json<User>, AppError> {
    if claims.user_id()? == id {
        return Err(AppError::ConflictError("Admins cannot change their own role".to_string()));
    }

    let updated = state
        .repos
        .users
        .update_role(id, req.role)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;
    if !updated {
        return Err(AppError::NotFoundError("User not found".to_string()));
    }

    let user = state
        .repos
        .users
        .get_user(id)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .ok_or_else(|| AppError::NotFoundError("User not found".to_string()))?;

    tracing::info!("User {} is now {}", user.id, user.role.as_str());
    Ok(Json(user))
}
