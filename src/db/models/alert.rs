//! Alert models for dashboard notifications.

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::db::now_timestamp;

/// Alerts returned when the caller does not ask for a count
pub const DEFAULT_ALERT_LIMIT: i64 = 3;
pub const MAX_ALERT_LIMIT: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Success,
    Warning,
    Error,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::Success => "success",
            AlertKind::Warning => "warning",
            AlertKind::Error => "error",
        }
    }
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Alert {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    pub timestamp: String,
    pub read: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateAlertRequest {
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub message: String,
}

impl Alert {
    pub async fn create(db: &SqlitePool, kind: AlertKind, message: &str) -> Result<Alert, sqlx::Error> {
        Self::create_at(db, kind, message, &now_timestamp()).await
    }

    pub async fn create_at(
        db: &SqlitePool,
        kind: AlertKind,
        message: &str,
        timestamp: &str,
    ) -> Result<Alert, sqlx::Error> {
        let id = uuid::Uuid::new_v4().to_string();

        sqlx::query("INSERT INTO alerts (id, kind, message, timestamp, read) VALUES (?, ?, ?, ?, 0)")
            .bind(&id)
            .bind(kind.as_str())
            .bind(message)
            .bind(timestamp)
            .execute(db)
            .await?;

        Self::get_by_id(db, &id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn get_by_id(db: &SqlitePool, id: &str) -> Result<Option<Alert>, sqlx::Error> {
        sqlx::query_as("SELECT id, kind, message, timestamp, read FROM alerts WHERE id = ?")
            .bind(id)
            .fetch_optional(db)
            .await
    }

    /// Most recent alerts first. Reading never changes the `read` flag.
    pub async fn list_recent(db: &SqlitePool, limit: i64) -> Result<Vec<Alert>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, kind, message, timestamp, read FROM alerts ORDER BY timestamp DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(db)
        .await
    }

    /// Returns false when no alert has this id
    pub async fn mark_read(db: &SqlitePool, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE alerts SET read = 1 WHERE id = ?")
            .bind(id)
            .execute(db)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Record a system event without failing the request that raised it
    pub async fn record(db: &SqlitePool, kind: AlertKind, message: &str) {
        if let Err(e) = Self::create(db, kind, message).await {
            tracing::warn!(error = %e, "Failed to record alert");
        }
    }
}
