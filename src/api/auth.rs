use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::{request::Parts, HeaderMap, StatusCode},
    Json,
};
use rand::Rng;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use subtle::ConstantTimeEq;

use crate::db::{AuthSession, LoginRequest, LoginResponse, User, UserResponse, UserRole};
use crate::AppState;

use super::error::ApiError;
use super::extract::ApiJson;

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2.hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against a hash
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Generate a random token
fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();
    hex::encode(bytes)
}

/// Hash a token for storage
pub(crate) fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Extract the bearer token from request headers
fn extract_token(headers: &HeaderMap) -> Option<String> {
    let header = headers.get("Authorization").and_then(|h| h.to_str().ok())?;
    header
        .strip_prefix("Bearer ")
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

/// Issue a new login token for a user
pub(crate) async fn issue_token(state: &AppState, user: &User) -> Result<String, ApiError> {
    let token = generate_token();
    let expires_at = (chrono::Utc::now()
        + chrono::Duration::hours(state.config.auth.token_ttl_hours))
    .to_rfc3339_opts(chrono::SecondsFormat::Millis, true);

    AuthSession::create(&state.db, &user.id, &hash_token(&token), &expires_at).await?;
    Ok(token)
}

/// Login endpoint
///
/// POST /api/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let email = request.email.trim().to_lowercase();

    let user = state
        .users
        .find_by_email(&email)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid credentials"))?;

    if !verify_password(&request.password, &user.password_hash) {
        tracing::warn!(email = %email, "Failed login attempt");
        return Err(ApiError::unauthorized("Invalid credentials"));
    }

    if !user.is_active() {
        return Err(ApiError::forbidden("Account is suspended"));
    }

    let token = issue_token(&state, &user).await?;
    tracing::info!(user_id = %user.id, role = %user.role, "User logged in");

    Ok(Json(LoginResponse {
        token,
        user: UserResponse::from(user),
    }))
}

/// Revoke the token used for this request
///
/// POST /api/auth/logout
pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let token = extract_token(&headers).ok_or_else(|| ApiError::unauthorized("Missing token"))?;
    AuthSession::revoke(&state.db, &hash_token(&token)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/auth/me
pub async fn me(user: User) -> Json<UserResponse> {
    Json(UserResponse::from(user))
}

/// Get the current user from a token
pub async fn get_current_user(state: &AppState, token: &str) -> Result<User, ApiError> {
    let token_hash = hash_token(token);
    let session = AuthSession::find_valid(&state.db, &token_hash)
        .await?
        .filter(|s| bool::from(s.token_hash.as_bytes().ct_eq(token_hash.as_bytes())))
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired token"))?;

    let user = state
        .users
        .find_by_id(&session.user_id)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired token"))?;

    if !user.is_active() {
        return Err(ApiError::forbidden("Account is suspended"));
    }

    Ok(user)
}

/// Require that the current user has at least the specified role
pub fn require_role(user: &User, required: UserRole) -> Result<(), ApiError> {
    if !user.role_enum().has_at_least(required) {
        return Err(ApiError::forbidden(format!(
            "This action requires {} role or higher",
            required
        )));
    }
    Ok(())
}

/// Extractor for getting the current authenticated user from a request
#[async_trait]
impl FromRequestParts<Arc<AppState>> for User {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_token(&parts.headers)
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;
        get_current_user(state, &token).await
    }
}
