use airpark_booking::Actor;
use airpark_core::identity::{CustomerType, Role, User};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::{AppState, AuthConfig};

// ============================================================================
// JWT Claims
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub role: Role,
    pub customer_type: CustomerType,
    pub exp: usize,
}

impl Claims {
    pub fn for_user(user: &User, expiration_seconds: u64) -> Self {
        Self {
            sub: user.id.to_string(),
            email: user.email.clone(),
            role: user.role,
            customer_type: user.customer_type,
            exp: (Utc::now() + Duration::seconds(expiration_seconds as i64)).timestamp() as usize,
        }
    }

    pub fn user_id(&self) -> Result<Uuid, AppError> {
        Uuid::parse_str(&self.sub)
            .map_err(|_| AppError::AuthenticationError("Malformed subject".to_string()))
    }

    pub fn actor(&self) -> Result<Actor, AppError> {
        Ok(Actor::new(self.user_id()?, self.role))
    }
}

pub fn issue_token(user: &User, auth: &AuthConfig) -> Result<String, AppError> {
    let claims = Claims::for_user(user, auth.expiration);
    encode(&Header::default(), &claims, &EncodingKey::from_secret(auth.secret.as_bytes()))
        .map_err(|e| AppError::InternalServerError(format!("Token encoding failed: {}", e)))
}

fn claims_from_request(req: &Request, auth: &AuthConfig) -> Result<Claims, AppError> {
    // 1. Extract token from Authorization header
    let auth_header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::AuthenticationError("Missing bearer token".to_string()))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::AuthenticationError("Missing bearer token".to_string()))?;

    // 2. Decode and validate JWT
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(auth.secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::AuthenticationError("Invalid or expired token".to_string()))?;

    Ok(token_data.claims)
}

// ============================================================================
// Authentication Middleware
// ============================================================================

/// Any signed-in user
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let claims = claims_from_request(&req, &state.auth)?;

    // 3. Inject claims into request extensions
    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

/// STAFF or ADMIN
pub async fn staff_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let claims = claims_from_request(&req, &state.auth)?;

    // 3. Check role
    if !claims.role.is_staff() {
        return Err(AppError::AuthorizationError("Staff access required".to_string()));
    }

    // 4. Inject claims
    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

/// ADMIN only
pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let claims = claims_from_request(&req, &state.auth)?;

    if claims.role != Role::Admin {
        return Err(AppError::AuthorizationError("Admin access required".to_string()));
    }

    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}
