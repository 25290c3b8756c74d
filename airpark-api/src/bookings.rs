use airpark_booking::{Booking, BookingCreated, BookingError, CreateBooking, Invoice, QuoteRequest};
use airpark_catalog::{Quote, Tariff};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::{get, post},
    Extension, Json, Router,
};
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::auth::{auth_middleware, Claims};
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    let customer = Router::new()
        .route("/v1/quotes", post(quote))
        .route("/v1/bookings", get(list_bookings).post(create_booking))
        .route("/v1/bookings/{id}", get(get_booking))
        .route("/v1/bookings/{id}/pay", post(pay_booking))
        .route("/v1/bookings/{id}/cancel", post(cancel_booking))
        .route("/v1/invoices", get(list_invoices))
        .route_layer(from_fn_with_state(state, auth_middleware));

    Router::new()
        .route("/v1/tariffs", get(list_tariffs))
        .merge(customer)
}

/// Outcome label for booking/payment counters
fn outcome_of(err: &BookingError) -> &'static str {
    match err {
        BookingError::NoSlotAvailable => "no_slot",
        BookingError::PaymentDeclined(_) => "declined",
        BookingError::Gateway(_) => "gateway_error",
        BookingError::Validation(_) | BookingError::Pricing(_) => "invalid",
        _ => "error",
    }
}

/// GET /v1/tariffs
async fn list_tariffs(State(state): State<AppState>) -> Result<Json<Vec<Tariff>>, AppError> {
    let tariffs = state
        .repos
        .tariffs
        .list_tariffs(true)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;
    Ok(Json(tariffs))
}

/// POST /v1/quotes
async fn quote(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<QuoteRequest>,
) -> Result<Json<Quote>, AppError> {
    let quote = state.service.quote(&claims.actor()?, &req).await?;
    Ok(Json(quote))
}

/// POST /v1/bookings
async fn create_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateBooking>,
) -> Result<(StatusCode, Json<BookingCreated>), AppError> {
    let requested = req.payment_method;
    match state.service.create_booking(&claims.actor()?, req).await {
        Ok(created) => {
            state.metrics.booking("created");
            Ok((StatusCode::CREATED, Json(created)))
        }
        Err(e) => {
            state.metrics.booking(outcome_of(&e));
            if requested.uses_gateway() {
                state.metrics.payment(requested.as_str(), outcome_of(&e));
            }
            Err(e.into())
        }
    }
}

/// GET /v1/bookings
async fn list_bookings(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<Booking>>, AppError> {
    Ok(Json(state.service.list_my_bookings(&claims.actor()?).await?))
}

/// GET /v1/bookings/{id}
async fn get_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.service.get_booking(&claims.actor()?, id).await?))
}

/// POST /v1/bookings/{id}/pay
async fn pay_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    match state.service.pay_booking(&claims.actor()?, id).await {
        Ok(booking) => {
            let outcome = booking.payment_status.as_str().to_lowercase();
            state.metrics.payment(booking.payment_method.as_str(), &outcome);
            Ok(Json(booking))
        }
        Err(e) => {
            if matches!(e, BookingError::PaymentDeclined(_) | BookingError::Gateway(_)) {
                state.metrics.payment("GATEWAY", outcome_of(&e));
            }
            Err(e.into())
        }
    }
}

/// POST /v1/bookings/{id}/cancel
async fn cancel_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    let booking = state.service.cancel_booking(&claims.actor()?, id).await?;
    state.metrics.booking("cancelled");
    Ok(Json(booking))
}

/// GET /v1/invoices
async fn list_invoices(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<Invoice>>, AppError> {
    Ok(Json(state.service.list_my_invoices(&claims.actor()?).await?))
}
