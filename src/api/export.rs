//! Session report export.
//!
//! CSV is rendered in-process. PDF and Excel need an external renderer that
//! this server does not ship, so those formats fail with 422 and leave an
//! error alert behind.

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::db::{Alert, AlertKind, ExportFilter, ParkingSession, User, UserRole};
use crate::AppState;

use super::auth::require_role;
use super::error::{ApiError, ValidationErrorBuilder};
use super::extract::ApiQuery;
use super::sessions::parse_status_filter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Pdf,
    Excel,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Pdf => "pdf",
            ExportFormat::Excel => "excel",
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "pdf" => Ok(ExportFormat::Pdf),
            "excel" | "xlsx" => Ok(ExportFormat::Excel),
            _ => Err(format!("Unsupported export format: {}", s)),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ExportQuery {
    pub format: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub status: Option<String>,
}

/// One line of the CSV report
#[derive(Debug, Serialize)]
struct ExportRow<'a> {
    id: &'a str,
    plate: &'a str,
    vehicle_type: &'a str,
    space: &'a str,
    entry_time: &'a str,
    exit_time: Option<&'a str>,
    status: &'a str,
    duration_minutes: Option<i64>,
    amount: Option<f64>,
    payment_method: Option<&'a str>,
}

impl<'a> From<&'a ParkingSession> for ExportRow<'a> {
    fn from(s: &'a ParkingSession) -> Self {
        Self {
            id: &s.id,
            plate: &s.plate,
            vehicle_type: &s.vehicle_type,
            space: &s.space_number,
            entry_time: &s.entry_time,
            exit_time: s.exit_time.as_deref(),
            status: &s.status,
            duration_minutes: s.duration_minutes,
            amount: s.amount,
            payment_method: s.payment_method.as_deref(),
        }
    }
}

fn parse_date(raw: Option<&str>) -> Result<Option<NaiveDate>, String> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(value) => NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| format!("Invalid date '{}', expected YYYY-MM-DD", value)),
    }
}

/// Validate the query into a format and a filter
fn parse_query(query: &ExportQuery) -> Result<(ExportFormat, ExportFilter), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    let format = match query.format.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        None => Some(ExportFormat::Csv),
        Some(raw) => match raw.parse::<ExportFormat>() {
            Ok(format) => Some(format),
            Err(e) => {
                errors.add("format", e);
                None
            }
        },
    };

    let start_date = match parse_date(query.start_date.as_deref()) {
        Ok(date) => date,
        Err(e) => {
            errors.add("start_date", e);
            None
        }
    };
    let end_date = match parse_date(query.end_date.as_deref()) {
        Ok(date) => date,
        Err(e) => {
            errors.add("end_date", e);
            None
        }
    };

    if let (Some(start), Some(end)) = (start_date, end_date) {
        if start > end {
            errors.add("end_date", "End date must not be before start date");
        }
    }

    let status = match parse_status_filter(query.status.as_deref()) {
        Ok(status) => status,
        Err(e) => {
            errors.add("status", e.message());
            None
        }
    };

    errors.finish()?;
    let format = format.ok_or_else(|| ApiError::internal("export format missing"))?;

    Ok((
        format,
        ExportFilter {
            start_date,
            end_date,
            status,
        },
    ))
}

/// Render sessions as CSV with a header row
pub fn render_csv(sessions: &[ParkingSession]) -> Result<Vec<u8>, csv::Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for session in sessions {
        writer.serialize(ExportRow::from(session))?;
    }
    writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))
}

/// GET /api/sessions/export?format=&start_date=&end_date=&status=
pub async fn export_sessions(
    State(state): State<Arc<AppState>>,
    user: User,
    ApiQuery(query): ApiQuery<ExportQuery>,
) -> Result<Response, ApiError> {
    require_role(&user, UserRole::Operator)?;
    let (format, filter) = parse_query(&query)?;

    if format != ExportFormat::Csv {
        let message = format!(
            "Export to {} failed: no {} renderer is configured",
            format.as_str(),
            format.as_str()
        );
        tracing::warn!(format = format.as_str(), user_id = %user.id, "Export format unavailable");
        Alert::record(&state.db, AlertKind::Error, &message).await;
        return Err(ApiError::unprocessable(message));
    }

    let sessions = ParkingSession::list_for_export(&state.db, &filter).await?;
    let body = render_csv(&sessions).map_err(|e| {
        tracing::error!(error = %e, "Failed to render CSV export");
        ApiError::internal(format!("Failed to render export: {}", e))
    })?;

    tracing::info!(rows = sessions.len(), "Exported sessions");

    let filename = format!(
        "attachment; filename=\"sessions-{}.csv\"",
        chrono::Utc::now().format("%Y%m%d")
    );
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, filename),
        ],
        body,
    )
        .into_response())
}
