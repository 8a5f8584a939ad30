//! Registration and login

use crate::{
    auth::{hash_password, issue_token, verify_password, AuthUser},
    error::{ApiError, ApiResult},
    AppState,
};
use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use farmchain_core::{Role, User, UserProfile};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: String,

    #[validate(email)]
    pub email: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,

    /// Role wire tag (FARMER, DISTRIBUTOR, RETAILER, CONSUMER)
    pub role: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,

    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserProfile,
}

/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    req.validate()?;

    let role = Role::from_str(&req.role)
        .ok_or_else(|| ApiError::BadRequest(format!("Unknown role: {}", req.role)))?;

    let user = User {
        id: Uuid::new_v4(),
        name: req.name,
        email: req.email.to_lowercase(),
        password_hash: hash_password(&req.password)?,
        role,
        created_at: Utc::now(),
    };

    state.storage.create_user(&user)?;

    tracing::info!(user_id = %user.id, role = %user.role, "User registered");

    let token = issue_token(&state.config.auth, &user)?;
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: user.profile(),
        }),
    ))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    req.validate()?;

    // Same error for unknown email and wrong password
    let invalid = || ApiError::Unauthenticated("Invalid email or password".to_string());

    let user = state
        .storage
        .get_user_by_email(&req.email.to_lowercase())?
        .ok_or_else(invalid)?;

    if !verify_password(&req.password, &user.password_hash) {
        return Err(invalid());
    }

    let token = issue_token(&state.config.auth, &user)?;
    Ok(Json(AuthResponse {
        token,
        user: user.profile(),
    }))
}

/// GET /api/auth/me
pub async fn me(AuthUser(user): AuthUser) -> Json<UserProfile> {
    Json(user.profile())
}
