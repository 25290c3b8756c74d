use airpark_catalog::{InventoryError, PricingError};
use airpark_core::CoreError;

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not allowed: {0}")]
    Forbidden(String),

    #[error("No parking slots available")]
    NoSlotAvailable,

    #[error("Payment declined: {0}")]
    PaymentDeclined(String),

    #[error("Payment gateway error: {0}")]
    Gateway(String),

    #[error(transparent)]
    Pricing(#[from] PricingError),

    #[error(transparent)]
    Inventory(#[from] InventoryError),

    #[error("Repository error: {0}")]
    Repository(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl From<CoreError> for BookingError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ValidationError(msg) => BookingError::Validation(msg),
            CoreError::NotFound(msg) => BookingError::NotFound(msg),
            CoreError::Conflict(msg) => BookingError::Conflict(msg),
            CoreError::IdentityError(msg) => BookingError::Forbidden(msg),
            CoreError::InternalError(msg) => BookingError::Repository(msg.into()),
        }
    }
}

pub type BookingResult<T> = Result<T, BookingError>;
