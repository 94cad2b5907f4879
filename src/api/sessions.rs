use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::db::{
    now_timestamp, AlertKind, Alert, CreateSessionRequest, ExitSessionRequest, FinishedStay,
    NewParkingSession, ParkingSession, ParkingSessionResponse, ParkingSpace, PaySessionRequest,
    PaymentMethod, SessionStats, SessionStatus, User, UserRole, VehicleType, SESSION_PAGE_SIZE,
};
use crate::AppState;

use super::auth::require_role;
use super::error::{ApiError, ValidationErrorBuilder};
use super::extract::{ApiJson, ApiQuery};
use super::validation::{normalize_plate, validate_plate, validate_space_number, validate_uuid};

#[derive(Debug, Deserialize)]
pub struct ListSessionsQuery {
    pub status: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionListResponse {
    pub sessions: Vec<ParkingSessionResponse>,
}

/// Parse an optional status filter; blank means no filter
pub(crate) fn parse_status_filter(raw: Option<&str>) -> Result<Option<SessionStatus>, ApiError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|e: String| ApiError::validation_field("status", e)),
    }
}

async fn load_session(state: &AppState, id: &str) -> Result<ParkingSession, ApiError> {
    if let Err(e) = validate_uuid(id, "session_id") {
        return Err(ApiError::validation_field("id", e));
    }

    ParkingSession::get_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Session not found"))
}

fn ensure_transition(session: &ParkingSession, next: SessionStatus) -> Result<(), ApiError> {
    let current = session
        .status_enum()
        .ok_or_else(|| ApiError::internal(format!("Unknown stored status: {}", session.status)))?;

    if !current.can_transition_to(next) {
        return Err(ApiError::conflict(format!(
            "Cannot move session from {} to {}",
            current, next
        )));
    }
    Ok(())
}

/// List the most recent sessions
///
/// GET /api/sessions?status=<s>
pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
    user: User,
    ApiQuery(query): ApiQuery<ListSessionsQuery>,
) -> Result<Json<SessionListResponse>, ApiError> {
    require_role(&user, UserRole::Operator)?;
    let status = parse_status_filter(query.status.as_deref())?;

    let sessions = ParkingSession::list_recent(&state.db, status, SESSION_PAGE_SIZE).await?;

    Ok(Json(SessionListResponse {
        sessions: sessions.into_iter().map(Into::into).collect(),
    }))
}

/// GET /api/sessions/:id
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
) -> Result<Json<ParkingSessionResponse>, ApiError> {
    require_role(&user, UserRole::Operator)?;
    let session = load_session(&state, &id).await?;
    Ok(Json(session.into()))
}

/// Record a vehicle entering a space
///
/// POST /api/sessions
pub async fn create_session(
    State(state): State<Arc<AppState>>,
    user: User,
    ApiJson(req): ApiJson<CreateSessionRequest>,
) -> Result<(StatusCode, Json<ParkingSessionResponse>), ApiError> {
    require_role(&user, UserRole::Operator)?;

    let plate = normalize_plate(&req.plate);
    let space_number = req.space_number.trim();

    let mut errors = ValidationErrorBuilder::new();
    errors.check("plate", validate_plate(&plate));
    errors.check("space_number", validate_space_number(space_number));
    let vehicle_type = match req.vehicle_type.parse::<VehicleType>() {
        Ok(vt) => Some(vt),
        Err(e) => {
            errors.add("vehicle_type", e);
            None
        }
    };
    errors.finish()?;
    let vehicle_type = vehicle_type.ok_or_else(|| ApiError::internal("vehicle type missing"))?;

    let space = ParkingSpace::get_by_number(&state.db, space_number)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Space {} not found", space_number)))?;

    if ParkingSpace::is_occupied(&state.db, &space.id).await? {
        return Err(ApiError::conflict(format!("Space {} is occupied", space.number)));
    }

    if ParkingSession::find_active_by_plate(&state.db, &plate)
        .await?
        .is_some()
    {
        return Err(ApiError::conflict(format!(
            "Vehicle {} already has an active session",
            plate
        )));
    }

    let vehicle_id = req
        .vehicle_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let entry_time = now_timestamp();

    let session = ParkingSession::create(
        &state.db,
        &NewParkingSession {
            space_id: &space.id,
            vehicle_id: &vehicle_id,
            plate: &plate,
            vehicle_type,
            entry_time: &entry_time,
            entry_photo: req.entry_photo.as_deref(),
        },
    )
    .await?;

    tracing::info!(
        session_id = %session.id,
        plate = %session.plate,
        space = %session.space_number,
        "Vehicle entered"
    );
    Alert::record(
        &state.db,
        AlertKind::Success,
        &format!("Vehicle {} entered space {}", session.plate, session.space_number),
    )
    .await;

    Ok((StatusCode::CREATED, Json(session.into())))
}

/// Minutes between entry and exit, never negative
fn stay_minutes(entry_time: &str, exit: DateTime<Utc>) -> Result<i64, ApiError> {
    let entry = DateTime::parse_from_rfc3339(entry_time)
        .map_err(|e| ApiError::internal(format!("Invalid stored entry time: {}", e)))?;
    Ok((exit - entry.with_timezone(&Utc)).num_minutes().max(0))
}

/// Record a vehicle leaving and bill the stay
///
/// POST /api/sessions/:id/exit
pub async fn exit_session(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
    body: Option<Json<ExitSessionRequest>>,
) -> Result<Json<ParkingSessionResponse>, ApiError> {
    require_role(&user, UserRole::Operator)?;
    let req = body.map(|Json(r)| r).unwrap_or_default();

    let session = load_session(&state, &id).await?;
    ensure_transition(&session, SessionStatus::Finished)?;

    let vehicle_type = session.vehicle_type_enum().ok_or_else(|| {
        ApiError::internal(format!("Unknown stored vehicle type: {}", session.vehicle_type))
    })?;

    let exit = Utc::now();
    let duration_minutes = stay_minutes(&session.entry_time, exit)?;
    let amount = state.config.pricing.amount_for(vehicle_type, duration_minutes);
    let exit_time = exit.to_rfc3339_opts(chrono::SecondsFormat::Millis, true);

    let stay = FinishedStay {
        exit_time: &exit_time,
        duration_minutes,
        amount,
        exit_photo: req.exit_photo.as_deref(),
    };
    if !ParkingSession::finish(&state.db, &session.id, &stay).await? {
        return Err(ApiError::conflict("Session is no longer active"));
    }

    tracing::info!(session_id = %session.id, duration_minutes, amount, "Vehicle exited");
    Alert::record(
        &state.db,
        AlertKind::Success,
        &format!(
            "Vehicle {} left space {} ({:.2} due)",
            session.plate, session.space_number, amount
        ),
    )
    .await;

    let updated = load_session(&state, &session.id).await?;
    Ok(Json(updated.into()))
}

/// Settle a finished session. Customers may only pay from their own
/// wallet; every other method is collected by an operator at the booth.
///
/// POST /api/sessions/:id/pay
pub async fn pay_session(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<PaySessionRequest>,
) -> Result<Json<ParkingSessionResponse>, ApiError> {
    if req.payment_method != PaymentMethod::Wallet {
        require_role(&user, UserRole::Operator)?;
    }

    let session = load_session(&state, &id).await?;
    ensure_transition(&session, SessionStatus::Paid)?;

    let amount = session
        .amount
        .ok_or_else(|| ApiError::internal("Finished session has no amount"))?;

    let mut tx = state.db.begin().await?;

    if req.payment_method == PaymentMethod::Wallet
        && !User::debit_wallet(&mut tx, &user.id, amount).await?
    {
        return Err(ApiError::bad_request("Insufficient wallet balance"));
    }

    if !ParkingSession::mark_paid(&mut tx, &session.id, req.payment_method).await? {
        return Err(ApiError::conflict("Session is no longer awaiting payment"));
    }

    tx.commit().await?;

    tracing::info!(
        session_id = %session.id,
        method = req.payment_method.as_str(),
        amount,
        "Session paid"
    );
    Alert::record(
        &state.db,
        AlertKind::Success,
        &format!("Payment of {:.2} received for {}", amount, session.plate),
    )
    .await;

    let updated = load_session(&state, &session.id).await?;
    Ok(Json(updated.into()))
}

/// Dashboard counters
///
/// GET /api/stats
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    user: User,
) -> Result<Json<SessionStats>, ApiError> {
    require_role(&user, UserRole::Admin)?;
    let stats = ParkingSession::stats(&state.db).await?;
    Ok(Json(stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{read_json, request, seed_session, seed_space, seed_user, test_state};
    use axum::http::Method;
    use serde_json::json;

    #[test]
    fn test_parse_status_filter() {
        assert_eq!(parse_status_filter(None).unwrap(), None);
        assert_eq!(parse_status_filter(Some("")).unwrap(), None);
        assert_eq!(
            parse_status_filter(Some("finished")).unwrap(),
            Some(SessionStatus::Finished)
        );
        assert!(parse_status_filter(Some("parked")).is_err());
    }

    #[test]
    fn test_stay_minutes() {
        let exit = DateTime::parse_from_rfc3339("2024-05-01T10:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(stay_minutes("2024-05-01T09:00:00.000Z", exit).unwrap(), 90);
        assert_eq!(stay_minutes("2024-05-01T11:00:00.000Z", exit).unwrap(), 0);
        assert!(stay_minutes("yesterday", exit).is_err());
    }

    #[tokio::test]
    async fn test_list_returns_ten_most_recent() {
        let state = test_state().await;
        let (_, token) = seed_user(&state, "op@example.com", UserRole::Operator).await;
        for i in 0..12 {
            seed_session(
                &state,
                &format!("S{:02}", i),
                &format!("PL{:02}", i),
                &format!("2024-05-01T{:02}:00:00.000Z", i),
            )
            .await;
        }
        let app = crate::api::create_router(state);

        let (status, body) = read_json(&app, request(Method::GET, "/api/sessions", Some(&token), None)).await;
        assert_eq!(status, StatusCode::OK);

        let sessions = body["sessions"].as_array().unwrap();
        assert_eq!(sessions.len(), 10);
        assert_eq!(sessions[0]["vehicle"]["plate"], "PL11");
        assert_eq!(sessions[9]["vehicle"]["plate"], "PL02");
        let times: Vec<&str> = sessions.iter().map(|s| s["entry_time"].as_str().unwrap()).collect();
        assert!(times.windows(2).all(|w| w[0] >= w[1]));
        assert_eq!(sessions[0]["space"]["number"], "S11");
    }

    #[tokio::test]
    async fn test_list_filters_by_status() {
        let state = test_state().await;
        let (_, token) = seed_user(&state, "op@example.com", UserRole::Operator).await;
        let first = seed_session(&state, "A1", "AAA1", "2024-05-01T08:00:00.000Z").await;
        seed_session(&state, "A2", "AAA2", "2024-05-01T09:00:00.000Z").await;
        let app = crate::api::create_router(state.clone());

        let (status, _) = read_json(
            &app,
            request(Method::POST, &format!("/api/sessions/{}/exit", first.id), Some(&token), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = read_json(&app, request(Method::GET, "/api/sessions?status=finished", Some(&token), None)).await;
        let sessions = body["sessions"].as_array().unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0]["status"], "finished");

        let (status, body) = read_json(&app, request(Method::GET, "/api/sessions?status=parked", Some(&token), None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "validation_error");
    }

    #[tokio::test]
    async fn test_role_enforcement() {
        let state = test_state().await;
        let (_, customer) = seed_user(&state, "c@example.com", UserRole::Customer).await;
        let (_, operator) = seed_user(&state, "o@example.com", UserRole::Operator).await;
        let app = crate::api::create_router(state);

        let (status, _) = read_json(&app, request(Method::GET, "/api/sessions", None, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = read_json(&app, request(Method::GET, "/api/sessions", Some(&customer), None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["code"], "forbidden");

        let (status, _) = read_json(&app, request(Method::GET, "/api/stats", Some(&operator), None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_stats_counts_each_status() {
        let state = test_state().await;
        let (_, admin) = seed_user(&state, "a@example.com", UserRole::Admin).await;
        let mut ids = Vec::new();
        for i in 0..5 {
            let s = seed_session(
                &state,
                &format!("B{}", i),
                &format!("STAT{}", i),
                &format!("2024-05-01T0{}:00:00.000Z", i),
            )
            .await;
            ids.push(s.id);
        }
        let app = crate::api::create_router(state.clone());

        for id in &ids[..3] {
            let (status, _) = read_json(
                &app,
                request(Method::POST, &format!("/api/sessions/{}/exit", id), Some(&admin), None),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
        }
        let (status, _) = read_json(
            &app,
            request(
                Method::POST,
                &format!("/api/sessions/{}/pay", ids[0]),
                Some(&admin),
                Some(json!({"payment_method": "cash"})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = read_json(&app, request(Method::GET, "/api/stats", Some(&admin), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"total": 5, "active": 2, "completed": 2, "paid": 1}));
    }

    #[tokio::test]
    async fn test_stats_failure_is_a_database_error() {
        let state = test_state().await;
        let (_, admin) = seed_user(&state, "a@example.com", UserRole::Admin).await;
        sqlx::query("DROP TABLE parking_sessions").execute(&state.db).await.unwrap();
        let app = crate::api::create_router(state);

        let (status, body) = read_json(&app, request(Method::GET, "/api/stats", Some(&admin), None)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["code"], "database_error");
        assert!(body["message"].as_str().unwrap().contains("parking_sessions"));
    }

    #[tokio::test]
    async fn test_entry_rejects_occupied_space_and_duplicate_plate() {
        let state = test_state().await;
        let (_, token) = seed_user(&state, "op@example.com", UserRole::Operator).await;
        seed_space(&state, "C1").await;
        seed_space(&state, "C2").await;
        let app = crate::api::create_router(state.clone());

        let (status, body) = read_json(
            &app,
            request(
                Method::POST,
                "/api/sessions",
                Some(&token),
                Some(json!({"plate": "gr 1234", "vehicle_type": "car", "space_number": "C1"})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["vehicle"]["plate"], "GR 1234");
        assert_eq!(body["vehicle"]["type"], "car");
        assert_eq!(body["space"]["number"], "C1");
        assert_eq!(body["status"], "active");
        assert!(body["exit_time"].is_null());

        let (status, _) = read_json(
            &app,
            request(
                Method::POST,
                "/api/sessions",
                Some(&token),
                Some(json!({"plate": "XY 99", "vehicle_type": "car", "space_number": "C1"})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = read_json(
            &app,
            request(
                Method::POST,
                "/api/sessions",
                Some(&token),
                Some(json!({"plate": "GR 1234", "vehicle_type": "car", "space_number": "C2"})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = read_json(
            &app,
            request(
                Method::POST,
                "/api/sessions",
                Some(&token),
                Some(json!({"plate": "XY 99", "vehicle_type": "car", "space_number": "Z9"})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = read_json(
            &app,
            request(
                Method::POST,
                "/api/sessions",
                Some(&token),
                Some(json!({"plate": "!!", "vehicle_type": "boat", "space_number": "C2"})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"]["details"]["plate"].is_array());
        assert!(body["error"]["details"]["vehicle_type"].is_array());

        let alerts = Alert::list_recent(&state.db, 10).await.unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, "success");
    }

    #[tokio::test]
    async fn test_exit_bills_per_started_hour() {
        let state = test_state().await;
        let (_, token) = seed_user(&state, "op@example.com", UserRole::Operator).await;
        let entry = (Utc::now() - chrono::Duration::minutes(61))
            .to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        let session = seed_session(&state, "D1", "TRK1", &entry).await;
        let app = crate::api::create_router(state.clone());

        let (status, body) = read_json(
            &app,
            request(
                Method::POST,
                &format!("/api/sessions/{}/exit", session.id),
                Some(&token),
                Some(json!({"exit_photo": "exit.jpg"})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "finished");
        assert_eq!(body["duration"], 61);
        // two started hours of a car at 2.00
        assert_eq!(body["amount"], 4.0);
        assert_eq!(body["photos"]["exit"], "exit.jpg");
        assert!(body["exit_time"].is_string());
    }

    #[tokio::test]
    async fn test_illegal_transitions_are_rejected() {
        let state = test_state().await;
        let (_, token) = seed_user(&state, "op@example.com", UserRole::Operator).await;
        let session = seed_session(&state, "E1", "ILL1", "2024-05-01T08:00:00.000Z").await;
        let app = crate::api::create_router(state.clone());
        let exit_uri = format!("/api/sessions/{}/exit", session.id);
        let pay_uri = format!("/api/sessions/{}/pay", session.id);
        let cash = json!({"payment_method": "cash"});

        // active -> paid skips finished
        let (status, _) = read_json(&app, request(Method::POST, &pay_uri, Some(&token), Some(cash.clone()))).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = read_json(&app, request(Method::POST, &exit_uri, Some(&token), None)).await;
        assert_eq!(status, StatusCode::OK);

        // finished -> finished
        let (status, _) = read_json(&app, request(Method::POST, &exit_uri, Some(&token), None)).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = read_json(&app, request(Method::POST, &pay_uri, Some(&token), Some(cash.clone()))).await;
        assert_eq!(status, StatusCode::OK);

        // paid is terminal
        let (status, _) = read_json(&app, request(Method::POST, &pay_uri, Some(&token), Some(cash))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        let (status, _) = read_json(&app, request(Method::POST, &exit_uri, Some(&token), None)).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_wallet_payment_debits_caller() {
        let state = test_state().await;
        let (_, operator) = seed_user(&state, "op@example.com", UserRole::Operator).await;
        let (customer, customer_token) = seed_user(&state, "c@example.com", UserRole::Customer).await;
        sqlx::query("UPDATE users SET wallet_balance = 5.0 WHERE id = ?")
            .bind(&customer.id)
            .execute(&state.db)
            .await
            .unwrap();

        let entry = (Utc::now() - chrono::Duration::minutes(30))
            .to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        let cheap = seed_session(&state, "F1", "WAL1", &entry).await;
        let entry = (Utc::now() - chrono::Duration::minutes(150))
            .to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        let pricey = seed_session(&state, "F2", "WAL2", &entry).await;
        let app = crate::api::create_router(state.clone());

        for id in [&cheap.id, &pricey.id] {
            let (status, _) = read_json(
                &app,
                request(Method::POST, &format!("/api/sessions/{}/exit", id), Some(&operator), None),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
        }

        let wallet = json!({"payment_method": "wallet"});
        let (status, body) = read_json(
            &app,
            request(
                Method::POST,
                &format!("/api/sessions/{}/pay", cheap.id),
                Some(&customer_token),
                Some(wallet.clone()),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["payment_method"], "wallet");

        let balance = User::get_by_id(&state.db, &customer.id).await.unwrap().unwrap().wallet_balance;
        assert_eq!(balance, 3.0);

        // 3 started hours at 2.00 exceeds the remaining 3.00
        let (status, body) = read_json(
            &app,
            request(
                Method::POST,
                &format!("/api/sessions/{}/pay", pricey.id),
                Some(&customer_token),
                Some(wallet),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["message"], "Insufficient wallet balance");

        let still = ParkingSession::get_by_id(&state.db, &pricey.id).await.unwrap().unwrap();
        assert_eq!(still.status_enum(), Some(SessionStatus::Finished));
        let balance = User::get_by_id(&state.db, &customer.id).await.unwrap().unwrap().wallet_balance;
        assert_eq!(balance, 3.0);
    }

    #[tokio::test]
    async fn test_booth_payments_require_operator() {
        let state = test_state().await;
        let (_, operator) = seed_user(&state, "op@example.com", UserRole::Operator).await;
        let (_, customer) = seed_user(&state, "c@example.com", UserRole::Customer).await;
        let session = seed_session(&state, "G1", "OTHER1", "2024-05-01T08:00:00.000Z").await;
        let app = crate::api::create_router(state.clone());

        let (status, _) = read_json(
            &app,
            request(Method::POST, &format!("/api/sessions/{}/exit", session.id), Some(&operator), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let pay_uri = format!("/api/sessions/{}/pay", session.id);
        for method in ["cash", "card", "mobile_money"] {
            let (status, body) = read_json(
                &app,
                request(
                    Method::POST,
                    &pay_uri,
                    Some(&customer),
                    Some(json!({"payment_method": method})),
                ),
            )
            .await;
            assert_eq!(status, StatusCode::FORBIDDEN, "{}", method);
            assert_eq!(body["error"]["code"], "forbidden");
        }
        let still = ParkingSession::get_by_id(&state.db, &session.id).await.unwrap().unwrap();
        assert_eq!(still.status_enum(), Some(SessionStatus::Finished));

        let (status, body) = read_json(
            &app,
            request(Method::POST, &pay_uri, Some(&operator), Some(json!({"payment_method": "cash"}))),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "paid");
    }

    #[tokio::test]
    async fn test_malformed_input_uses_error_envelope() {
        let state = test_state().await;
        let (_, operator) = seed_user(&state, "op@example.com", UserRole::Operator).await;
        let session = seed_session(&state, "H1", "BAD1", "2024-05-01T08:00:00.000Z").await;
        let app = crate::api::create_router(state);

        let (status, body) = read_json(
            &app,
            request(
                Method::POST,
                &format!("/api/sessions/{}/pay", session.id),
                Some(&operator),
                Some(json!({"payment_method": "cheque"})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "validation_error");
        assert!(body["error"]["details"]["body"][0]
            .as_str()
            .unwrap()
            .contains("cheque"));

        let (status, body) = read_json(
            &app,
            request(Method::POST, "/api/sessions", Some(&operator), Some(json!({"plate": 42}))),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "validation_error");
    }

    #[tokio::test]
    async fn test_get_session_not_found() {
        let state = test_state().await;
        let (_, token) = seed_user(&state, "op@example.com", UserRole::Operator).await;
        let app = crate::api::create_router(state);

        let uri = format!("/api/sessions/{}", uuid::Uuid::new_v4());
        let (status, body) = read_json(&app, request(Method::GET, &uri, Some(&token), None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "not_found");

        let (status, _) = read_json(&app, request(Method::GET, "/api/sessions/nope", Some(&token), None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
