use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::db::{CreateUserRequest, User, UserResponse, UserRole};
use crate::directory::NewUser;
use crate::AppState;

use super::auth::{hash_password, require_role};
use super::error::{ApiError, ValidationErrorBuilder};
use super::extract::ApiJson;
use super::validation::{validate_email, validate_name, validate_password, validate_wallet_balance};

/// GET /api/users
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    user: User,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    require_role(&user, UserRole::Admin)?;
    let users = state.users.list().await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// POST /api/users
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    user: User,
    ApiJson(req): ApiJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    require_role(&user, UserRole::Admin)?;

    let email = req.email.trim().to_lowercase();
    let name = req.name.trim();
    let wallet_balance = req.wallet_balance.unwrap_or(0.0);

    let mut errors = ValidationErrorBuilder::new();
    errors.check("email", validate_email(&email));
    errors.check("name", validate_name(name));
    errors.check("password", validate_password(&req.password));
    errors.check("wallet_balance", validate_wallet_balance(wallet_balance));
    let role = match req.role.as_deref() {
        None => Some(UserRole::Customer),
        Some(raw) => match raw.parse::<UserRole>() {
            Ok(role) => Some(role),
            Err(e) => {
                errors.add("role", e);
                None
            }
        },
    };
    errors.finish()?;
    let role = role.unwrap_or(UserRole::Customer);

    if state.users.find_by_email(&email).await?.is_some() {
        return Err(ApiError::conflict("A user with this email already exists"));
    }

    let password_hash = hash_password(&req.password)
        .map_err(|e| ApiError::internal(format!("Failed to hash password: {}", e)))?;

    let created = state
        .users
        .create(NewUser {
            email: &email,
            name,
            password_hash: &password_hash,
            role,
            wallet_balance,
        })
        .await?;

    tracing::info!(user_id = %created.id, role = %role, created_by = %user.id, "User created");

    Ok((StatusCode::CREATED, Json(created.into())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{read_json, request, seed_user, test_state};
    use axum::http::Method;
    use serde_json::json;

    #[tokio::test]
    async fn test_admin_manages_users() {
        let state = test_state().await;
        let (_, admin) = seed_user(&state, "a@example.com", UserRole::Admin).await;
        let (_, operator) = seed_user(&state, "o@example.com", UserRole::Operator).await;
        let app = crate::api::create_router(state.clone());

        let (status, _) = read_json(&app, request(Method::GET, "/api/users", Some(&operator), None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let body = json!({
            "email": "New@Example.com",
            "name": "New Customer",
            "password": "a-long-password",
            "wallet_balance": 20.0
        });
        let (status, created) = read_json(&app, request(Method::POST, "/api/users", Some(&admin), Some(body.clone()))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["email"], "new@example.com");
        assert_eq!(created["role"], "customer");
        assert_eq!(created["wallet_balance"], 20.0);

        let (status, _) = read_json(&app, request(Method::POST, "/api/users", Some(&admin), Some(body))).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let stored = state.users.find_by_email("new@example.com").await.unwrap().unwrap();
        assert_ne!(stored.password_hash, "a-long-password");
        assert!(stored.password_hash.starts_with("$argon2"));

        let (status, list) = read_json(&app, request(Method::GET, "/api/users", Some(&admin), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list.as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_create_user_validation() {
        let state = test_state().await;
        let (_, admin) = seed_user(&state, "a@example.com", UserRole::Admin).await;
        let app = crate::api::create_router(state);

        let body = json!({
            "email": "bad",
            "name": "",
            "password": "short",
            "role": "superuser",
            "wallet_balance": -5.0
        });
        let (status, body) = read_json(&app, request(Method::POST, "/api/users", Some(&admin), Some(body))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let details = body["error"]["details"].as_object().unwrap();
        for field in ["email", "name", "password", "role", "wallet_balance"] {
            assert!(details.contains_key(field), "missing {}", field);
        }
    }
}
