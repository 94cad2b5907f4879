//! Shared fixtures for handler and model tests.

use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use lazy_static::lazy_static;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceExt;

use crate::api::auth::{hash_password, issue_token};
use crate::config::Config;
use crate::db::{
    init_in_memory, NewParkingSession, ParkingSession, ParkingSpace, User,
    UserRole, VehicleType,
};
use crate::AppState;

lazy_static! {
    /// Hashing is slow, so each role's fixture password is hashed once
    static ref PASSWORD_HASHES: HashMap<UserRole, String> = [
        UserRole::Customer,
        UserRole::Operator,
        UserRole::Admin,
    ]
    .into_iter()
    .map(|role| (role, hash_password(&fixture_password(role)).unwrap()))
    .collect();
}

/// Password of every fixture user with this role
pub fn fixture_password(role: UserRole) -> String {
    format!("{}-password", role)
}

pub async fn test_state() -> Arc<AppState> {
    test_state_with(Config::default()).await
}

pub async fn test_state_with(config: Config) -> Arc<AppState> {
    let db = init_in_memory().await.unwrap();
    Arc::new(AppState::new(config, db))
}

/// Create an active user and log them in. Returns the user and a bearer token.
pub async fn seed_user(state: &AppState, email: &str, role: UserRole) -> (User, String) {
    let user = User::create(&state.db, email, "Fixture User", &PASSWORD_HASHES[&role], role, 0.0)
        .await
        .unwrap();
    let token = issue_token(state, &user).await.unwrap();
    (user, token)
}

pub async fn seed_space(state: &AppState, number: &str) -> ParkingSpace {
    ParkingSpace::create(&state.db, number, None, VehicleType::Car.as_str())
        .await
        .unwrap()
}

/// Park a car in `space_number` (created if missing) at `entry_time`
pub async fn seed_session(
    state: &AppState,
    space_number: &str,
    plate: &str,
    entry_time: &str,
) -> ParkingSession {
    let space = match ParkingSpace::get_by_number(&state.db, space_number).await.unwrap() {
        Some(space) => space,
        None => seed_space(state, space_number).await,
    };
    let vehicle_id = uuid::Uuid::new_v4().to_string();

    ParkingSession::create(
        &state.db,
        &NewParkingSession {
            space_id: &space.id,
            vehicle_id: &vehicle_id,
            plate,
            vehicle_type: VehicleType::Car,
            entry_time,
            entry_photo: None,
        },
    )
    .await
    .unwrap()
}

pub fn request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, headers, bytes.to_vec())
}

/// Send a request and parse the body as JSON (`Null` when empty)
pub async fn read_json(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let (status, _, body) = send(app, request).await;
    if body.is_empty() {
        return (status, Value::Null);
    }
    let value = serde_json::from_slice(&body).unwrap_or_else(|e| {
        panic!("non-JSON body ({}): {}", e, String::from_utf8_lossy(&body))
    });
    (status, value)
}

pub async fn read_text(app: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, String) {
    let (status, headers, body) = send(app, request).await;
    (status, headers, String::from_utf8(body).unwrap())
}

