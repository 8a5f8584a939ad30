//! Authentication: password hashing, JWT issuance, request extractors
//!
//! Passwords are hashed with Argon2id (PHC format, salt included). Tokens
//! are signed with HS256 and carry the user ID and role; the extractor
//! still re-reads the user from storage so a stale role claim never wins.

use crate::{error::ApiError, AppState};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use farmchain_core::{AuthConfig, User};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Header carrying the admin token for gated endpoints
pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Payload stored in a JWT token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: Uuid,
    /// Role wire tag at issuance time (informational; storage is authoritative)
    pub role: String,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// Hash a password using Argon2id
///
/// Returns the PHC-formatted hash string that includes the salt and
/// parameters.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            ApiError::Core(farmchain_core::Error::Internal(format!(
                "Failed to hash password: {e}"
            )))
        })
}

/// Verify a password against a stored PHC hash
pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Issue a signed token for an authenticated user
pub fn issue_token(auth: &AuthConfig, user: &User) -> Result<String, ApiError> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| {
            ApiError::Core(farmchain_core::Error::Internal(format!(
                "System time error: {e}"
            )))
        })?
        .as_secs();

    let claims = Claims {
        sub: user.id,
        role: user.role.as_str().to_string(),
        iat: now,
        exp: now + auth.token_expiry_secs,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(auth.jwt_secret.as_bytes()),
    )
    .map_err(|e| {
        ApiError::Core(farmchain_core::Error::Internal(format!(
            "Failed to sign token: {e}"
        )))
    })
}

/// Decode and validate a token, returning its claims
pub fn decode_token(auth: &AuthConfig, token: &str) -> Result<Claims, ApiError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(auth.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| ApiError::Unauthenticated("Invalid or expired token".to_string()))
}

/// Authenticated user, extracted from the `Authorization: Bearer` header
///
/// The user record is loaded from storage on every request; a token whose
/// user no longer exists is rejected.
pub struct AuthUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Unauthenticated("Missing authorization header".to_string()))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::Unauthenticated("Expected bearer token".to_string()))?;

        let claims = decode_token(&state.config.auth, token)?;

        let user = state
            .storage
            .get_user(claims.sub)
            .map_err(|_| ApiError::Unauthenticated("Unknown user".to_string()))?;

        Ok(AuthUser(user))
    }
}

/// Gate an endpoint behind the configured admin token
///
/// With no token configured the endpoint is closed, not open.
pub fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(expected) = state.config.auth.admin_token.as_deref() else {
        return Err(ApiError::Forbidden("Admin access not configured".to_string()));
    };

    let provided = headers
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok());

    if provided == Some(expected) {
        Ok(())
    } else {
        Err(ApiError::Forbidden("Admin token required".to_string()))
    }
}
