use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::db::{
    Alert, CreateAlertRequest, User, UserRole, DEFAULT_ALERT_LIMIT, MAX_ALERT_LIMIT,
};
use crate::AppState;

use super::auth::require_role;
use super::error::ApiError;
use super::extract::{ApiJson, ApiQuery};
use super::validation::{validate_alert_message, validate_uuid};

#[derive(Debug, Deserialize)]
pub struct ListAlertsQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AlertListResponse {
    pub alerts: Vec<Alert>,
}

/// Most recent alerts first. Listing never marks anything read.
///
/// GET /api/alerts?limit=<n>
pub async fn list_alerts(
    State(state): State<Arc<AppState>>,
    _user: User,
    ApiQuery(query): ApiQuery<ListAlertsQuery>,
) -> Result<Json<AlertListResponse>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_ALERT_LIMIT);
    if !(1..=MAX_ALERT_LIMIT).contains(&limit) {
        return Err(ApiError::validation_field(
            "limit",
            format!("limit must be between 1 and {}", MAX_ALERT_LIMIT),
        ));
    }

    let alerts = Alert::list_recent(&state.db, limit).await?;
    Ok(Json(AlertListResponse { alerts }))
}

/// POST /api/alerts
pub async fn create_alert(
    State(state): State<Arc<AppState>>,
    user: User,
    ApiJson(req): ApiJson<CreateAlertRequest>,
) -> Result<(StatusCode, Json<Alert>), ApiError> {
    require_role(&user, UserRole::Operator)?;

    let message = req.message.trim();
    if let Err(e) = validate_alert_message(message) {
        return Err(ApiError::validation_field("message", e));
    }

    let alert = Alert::create(&state.db, req.kind, message).await?;
    tracing::info!(alert_id = %alert.id, kind = %req.kind, user_id = %user.id, "Alert raised");

    Ok((StatusCode::CREATED, Json(alert)))
}

/// POST /api/alerts/:id/read
pub async fn mark_alert_read(
    State(state): State<Arc<AppState>>,
    _user: User,
    Path(id): Path<String>,
) -> Result<Json<Alert>, ApiError> {
    if let Err(e) = validate_uuid(&id, "alert_id") {
        return Err(ApiError::validation_field("id", e));
    }

    if !Alert::mark_read(&state.db, &id).await? {
        return Err(ApiError::not_found("Alert not found"));
    }

    let alert = Alert::get_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("Alert not found"))?;
    Ok(Json(alert))
}
