//! Parking session models.
//!
//! A parking session is one vehicle's stay in one space, from entry to
//! payment. Rows are never deleted; status only moves forward through the
//! transition table in [`SessionStatus::can_transition_to`].

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection, SqlitePool};

use crate::db::now_timestamp;

/// Sessions returned by a list query
pub const SESSION_PAGE_SIZE: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VehicleType {
    Car,
    Truck,
    Motorcycle,
}

impl VehicleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleType::Car => "car",
            VehicleType::Truck => "truck",
            VehicleType::Motorcycle => "motorcycle",
        }
    }
}

impl std::fmt::Display for VehicleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for VehicleType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "car" => Ok(VehicleType::Car),
            "truck" => Ok(VehicleType::Truck),
            "motorcycle" => Ok(VehicleType::Motorcycle),
            _ => Err(format!("Unknown vehicle type: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Finished,
    Paid,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Finished => "finished",
            SessionStatus::Paid => "paid",
        }
    }

    /// The only legal moves are active -> finished and finished -> paid.
    pub fn can_transition_to(&self, next: SessionStatus) -> bool {
        matches!(
            (self, next),
            (SessionStatus::Active, SessionStatus::Finished)
                | (SessionStatus::Finished, SessionStatus::Paid)
        )
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(SessionStatus::Active),
            "finished" => Ok(SessionStatus::Finished),
            "paid" => Ok(SessionStatus::Paid),
            _ => Err(format!("Unknown session status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    MobileMoney,
    Wallet,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::MobileMoney => "mobile_money",
            PaymentMethod::Wallet => "wallet",
        }
    }
}

/// Flat session row with the space number resolved by join
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ParkingSession {
    pub id: String,
    pub vehicle_id: String,
    pub plate: String,
    pub vehicle_type: String,
    pub space_id: String,
    pub space_number: String,
    pub entry_time: String,
    pub exit_time: Option<String>,
    pub status: String,
    pub amount: Option<f64>,
    pub payment_method: Option<String>,
    pub entry_photo: Option<String>,
    pub exit_photo: Option<String>,
    pub duration_minutes: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VehicleInfo {
    pub id: String,
    pub plate: String,
    #[serde(rename = "type")]
    pub vehicle_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpaceRef {
    pub id: String,
    pub number: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionPhotos {
    pub entry: Option<String>,
    pub exit: Option<String>,
}

/// Response format for parking sessions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParkingSessionResponse {
    pub id: String,
    pub vehicle: VehicleInfo,
    pub space: SpaceRef,
    pub entry_time: String,
    pub exit_time: Option<String>,
    pub status: String,
    pub amount: Option<f64>,
    pub payment_method: Option<String>,
    pub photos: SessionPhotos,
    /// Length of the stay in minutes, set on exit
    pub duration: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<ParkingSession> for ParkingSessionResponse {
    fn from(s: ParkingSession) -> Self {
        Self {
            id: s.id,
            vehicle: VehicleInfo {
                id: s.vehicle_id,
                plate: s.plate,
                vehicle_type: s.vehicle_type,
            },
            space: SpaceRef {
                id: s.space_id,
                number: s.space_number,
            },
            entry_time: s.entry_time,
            exit_time: s.exit_time,
            status: s.status,
            amount: s.amount,
            payment_method: s.payment_method,
            photos: SessionPhotos {
                entry: s.entry_photo,
                exit: s.exit_photo,
            },
            duration: s.duration_minutes,
            created_at: s.created_at,
            updated_at: s.updated_at,
        }
    }
}

/// Session counts; `completed` counts finished sessions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    pub total: i64,
    pub active: i64,
    pub completed: i64,
    pub paid: i64,
}

/// Filters accepted by the export query. Dates are inclusive and compared
/// against the entry time in UTC.
#[derive(Debug, Clone, Default)]
pub struct ExportFilter {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub status: Option<SessionStatus>,
}

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub plate: String,
    pub vehicle_type: String,
    pub space_number: String,
    /// Existing vehicle identifier; a new one is generated when absent
    pub vehicle_id: Option<String>,
    pub entry_photo: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExitSessionRequest {
    pub exit_photo: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PaySessionRequest {
    pub payment_method: PaymentMethod,
}

/// Values written when a vehicle enters
pub struct NewParkingSession<'a> {
    pub space_id: &'a str,
    pub vehicle_id: &'a str,
    pub plate: &'a str,
    pub vehicle_type: VehicleType,
    pub entry_time: &'a str,
    pub entry_photo: Option<&'a str>,
}

/// Values written when a vehicle leaves
pub struct FinishedStay<'a> {
    pub exit_time: &'a str,
    pub duration_minutes: i64,
    pub amount: f64,
    pub exit_photo: Option<&'a str>,
}

const SELECT_SESSIONS: &str = r#"
    SELECT s.id, s.vehicle_id, s.plate, s.vehicle_type, s.space_id, sp.number AS space_number,
           s.entry_time, s.exit_time, s.status, s.amount, s.payment_method,
           s.entry_photo, s.exit_photo, s.duration_minutes, s.created_at, s.updated_at
    FROM parking_sessions s
    JOIN parking_spaces sp ON sp.id = s.space_id
"#;

impl ParkingSession {
    pub fn status_enum(&self) -> Option<SessionStatus> {
        self.status.parse().ok()
    }

    pub fn vehicle_type_enum(&self) -> Option<VehicleType> {
        self.vehicle_type.parse().ok()
    }

    /// Record a vehicle entry
    pub async fn create(
        db: &SqlitePool,
        new: &NewParkingSession<'_>,
    ) -> Result<ParkingSession, sqlx::Error> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = now_timestamp();

        sqlx::query(
            r#"
            INSERT INTO parking_sessions (id, vehicle_id, plate, vehicle_type, space_id, entry_time, status, entry_photo, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, 'active', ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(new.vehicle_id)
        .bind(new.plate)
        .bind(new.vehicle_type.as_str())
        .bind(new.space_id)
        .bind(new.entry_time)
        .bind(new.entry_photo)
        .bind(&now)
        .bind(&now)
        .execute(db)
        .await?;

        Self::get_by_id(db, &id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn get_by_id(db: &SqlitePool, id: &str) -> Result<Option<ParkingSession>, sqlx::Error> {
        sqlx::query_as(&format!("{} WHERE s.id = ?", SELECT_SESSIONS))
            .bind(id)
            .fetch_optional(db)
            .await
    }

    /// The active session for a plate, if the vehicle is still parked
    pub async fn find_active_by_plate(
        db: &SqlitePool,
        plate: &str,
    ) -> Result<Option<ParkingSession>, sqlx::Error> {
        sqlx::query_as(&format!(
            "{} WHERE s.plate = ? AND s.status = 'active'",
            SELECT_SESSIONS
        ))
        .bind(plate)
        .fetch_optional(db)
        .await
    }

    /// Most recent sessions first, optionally restricted to one status
    pub async fn list_recent(
        db: &SqlitePool,
        status: Option<SessionStatus>,
        limit: i64,
    ) -> Result<Vec<ParkingSession>, sqlx::Error> {
        let status = status.map(|s| s.as_str());
        sqlx::query_as(&format!(
            "{} WHERE (? IS NULL OR s.status = ?) ORDER BY s.entry_time DESC LIMIT ?",
            SELECT_SESSIONS
        ))
        .bind(status)
        .bind(status)
        .bind(limit)
        .fetch_all(db)
        .await
    }

    /// Every session matching an export filter, most recent first
    pub async fn list_for_export(
        db: &SqlitePool,
        filter: &ExportFilter,
    ) -> Result<Vec<ParkingSession>, sqlx::Error> {
        let start = filter.start_date.map(day_start);
        let end = filter
            .end_date
            .and_then(|d| d.succ_opt())
            .map(day_start);
        let status = filter.status.map(|s| s.as_str());

        let rows = sqlx::query_as(&format!(
            r#"{}
            WHERE (? IS NULL OR s.entry_time >= ?)
              AND (? IS NULL OR s.entry_time < ?)
              AND (? IS NULL OR s.status = ?)
            ORDER BY s.entry_time DESC"#,
            SELECT_SESSIONS
        ))
        .bind(start.clone())
        .bind(start)
        .bind(end.clone())
        .bind(end)
        .bind(status)
        .bind(status)
        .fetch_all(db)
        .await?;

        Ok(rows)
    }

    /// Counts per status, each from its own query
    pub async fn stats(db: &SqlitePool) -> Result<SessionStats, sqlx::Error> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM parking_sessions")
            .fetch_one(db)
            .await?;

        Ok(SessionStats {
            total,
            active: Self::count_with_status(db, SessionStatus::Active).await?,
            completed: Self::count_with_status(db, SessionStatus::Finished).await?,
            paid: Self::count_with_status(db, SessionStatus::Paid).await?,
        })
    }

    async fn count_with_status(db: &SqlitePool, status: SessionStatus) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM parking_sessions WHERE status = ?")
            .bind(status.as_str())
            .fetch_one(db)
            .await
    }

    /// Move an active session to finished. Returns false if the session was
    /// no longer active when the update ran.
    pub async fn finish(
        db: &SqlitePool,
        id: &str,
        stay: &FinishedStay<'_>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE parking_sessions
            SET status = 'finished', exit_time = ?, duration_minutes = ?, amount = ?,
                exit_photo = COALESCE(?, exit_photo), updated_at = ?
            WHERE id = ? AND status = 'active'
            "#,
        )
        .bind(stay.exit_time)
        .bind(stay.duration_minutes)
        .bind(stay.amount)
        .bind(stay.exit_photo)
        .bind(now_timestamp())
        .bind(id)
        .execute(db)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Move a finished session to paid inside the caller's transaction.
    /// Returns false if the session was no longer finished.
    pub async fn mark_paid(
        conn: &mut SqliteConnection,
        id: &str,
        method: PaymentMethod,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE parking_sessions
            SET status = 'paid', payment_method = ?, updated_at = ?
            WHERE id = ? AND status = 'finished'
            "#,
        )
        .bind(method.as_str())
        .bind(now_timestamp())
        .bind(id)
        .execute(conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

fn day_start(date: NaiveDate) -> String {
    format!("{}T00:00:00.000Z", date.format("%Y-%m-%d"))
}
