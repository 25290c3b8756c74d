use airpark_core::identity::{normalize_email, verify_password, NewUser, User};
use airpark_shared::Masked;
use axum::{
    extract::State,
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::middleware::auth::{auth_middleware, issue_token, Claims};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

pub fn routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/v1/auth/me", get(me))
        .route_layer(from_fn_with_state(state, auth_middleware));

    Router::new()
        .route("/v1/auth/register", post(register))
        .route("/v1/auth/login", post(login))
        .merge(protected)
}

/// POST /v1/auth/register
async fn register(
    State(state): State<AppState>,
    Json(req): Json<NewUser>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let email = normalize_email(&req.email)?;
    let existing = state
        .repos
        .users
        .find_by_email(&email)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;
    if existing.is_some() {
        return Err(AppError::ConflictError("E-mail already registered".to_string()));
    }

    let user = req.into_user()?;
    state
        .repos
        .users
        .create_user(&user)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    tracing::info!("Registered {} customer {}", user.customer_type.as_str(), Masked(&user.email));
    let token = issue_token(&user, &state.auth)?;
    Ok((StatusCode::CREATED, Json(AuthResponse { token, user })))
}

/// POST /v1/auth/login
async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let invalid = || AppError::AuthenticationError("Invalid e-mail or password".to_string());

    let email = normalize_email(&req.email).map_err(|_| invalid())?;
    let user = state
        .repos
        .users
        .find_by_email(&email)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .ok_or_else(invalid)?;

    if !verify_password(&req.password, &user.password_hash) {
        tracing::warn!("Failed login for {}", Masked(&email));
        return Err(invalid());
    }

    let token = issue_token(&user, &state.auth)?;
    Ok(Json(AuthResponse { token, user }))
}

/// GET /v1/auth/me
async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<User>, AppError> {
    let user = state
        .repos
        .users
        .get_user(claims.user_id()?)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .ok_or_else(|| AppError::NotFoundError("User not found".to_string()))?;
    Ok(Json(user))
}
