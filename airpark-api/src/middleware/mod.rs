pub mod auth;
pub mod resiliency;

pub use auth::{admin_auth_middleware, auth_middleware, staff_auth_middleware, Claims};
