use airpark_booking::BookingError;
use airpark_catalog::{InventoryError, PricingError, TariffError};
use airpark_core::CoreError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

#[derive(Debug)]
pub enum AppError {
    AuthenticationError(String),
    AuthorizationError(String),
    ValidationError(String),
    NotFoundError(String),
    ConflictError(String),
    PaymentRequired(String),
    BadGateway(String),
    InternalServerError(String),
    Anyhow(anyhow::Error),
}

impl AppError {
    fn status_and_message(self) -> (StatusCode, String) {
        match self {
            AppError::AuthenticationError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::AuthorizationError(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::ConflictError(msg) => (StatusCode::CONFLICT, msg),
            AppError::PaymentRequired(msg) => (StatusCode::PAYMENT_REQUIRED, msg),
            AppError::BadGateway(msg) => {
                tracing::warn!("Upstream failure: {}", msg);
                (StatusCode::BAD_GATEWAY, msg)
            }
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {:#}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = self.status_and_message();

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<BookingError> for AppErrorKind {
    fn from(err: BookingError) -> Self {
        let message = err.to_string();
        AppErrorKind(match err {
            BookingError::NotFound(_) => AppError::NotFoundError(message),
            BookingError::Validation(_) => AppError::ValidationError(message),
            BookingError::Forbidden(_) => AppError::AuthorizationError(message),
            BookingError::InvalidTransition { .. }
            | BookingError::Conflict(_)
            | BookingError::NoSlotAvailable => AppError::ConflictError(message),
            BookingError::PaymentDeclined(_) => AppError::PaymentRequired(message),
            BookingError::Gateway(_) => AppError::BadGateway(message),
            BookingError::Pricing(e) => AppErrorKind::from(e).0,
            BookingError::Inventory(e) => AppErrorKind::from(e).0,
            BookingError::Repository(e) => AppError::InternalServerError(e.to_string()),
        })
    }
}

impl From<CoreError> for AppErrorKind {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        AppErrorKind(match err {
            CoreError::ValidationError(_) => AppError::ValidationError(message),
            CoreError::NotFound(_) => AppError::NotFoundError(message),
            CoreError::Conflict(_) => AppError::ConflictError(message),
            CoreError::IdentityError(_) => AppError::AuthenticationError(message),
            CoreError::InternalError(_) => AppError::InternalServerError(message),
        })
    }
}

impl From<PricingError> for AppErrorKind {
    fn from(err: PricingError) -> Self {
        AppErrorKind(AppError::ValidationError(err.to_string()))
    }
}

impl From<TariffError> for AppErrorKind {
    fn from(err: TariffError) -> Self {
        AppErrorKind(AppError::ValidationError(err.to_string()))
    }
}

impl From<InventoryError> for AppErrorKind {
    fn from(err: InventoryError) -> Self {
        let message = err.to_string();
        AppErrorKind(match err {
            InventoryError::InvalidTransition { .. } => AppError::ConflictError(message),
            _ => AppError::ValidationError(message),
        })
    }
}

/// Typed mapping for domain errors; everything else becomes a 500
struct AppErrorKind(AppError);

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        let err = err.into();
        let err = match err.downcast::<BookingError>() {
            Ok(e) => return AppErrorKind::from(e).0,
            Err(err) => err,
        };
        let err = match err.downcast::<CoreError>() {
            Ok(e) => return AppErrorKind::from(e).0,
            Err(err) => err,
        };
        let err = match err.downcast::<TariffError>() {
            Ok(e) => return AppErrorKind::from(e).0,
            Err(err) => err,
        };
        let err = match err.downcast::<InventoryError>() {
            Ok(e) => return AppErrorKind::from(e).0,
            Err(err) => err,
        };
        let err = match err.downcast::<PricingError>() {
            Ok(e) => return AppErrorKind::from(e).0,
            Err(err) => err,
        };
        Self::Anyhow(err)
    }
}
