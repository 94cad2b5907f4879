//! Parking space models.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

use crate::db::now_timestamp;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ParkingSpace {
    pub id: String,
    pub number: String,
    pub floor: Option<String>,
    pub vehicle_type: String,
    pub created_at: String,
}

/// Space with its current occupancy for list views
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ParkingSpaceWithOccupancy {
    pub id: String,
    pub number: String,
    pub floor: Option<String>,
    pub vehicle_type: String,
    pub occupied: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateSpaceRequest {
    pub number: String,
    pub floor: Option<String>,
    /// Defaults to `car`
    pub vehicle_type: Option<String>,
}

impl ParkingSpace {
    pub async fn create(
        db: &SqlitePool,
        number: &str,
        floor: Option<&str>,
        vehicle_type: &str,
    ) -> Result<ParkingSpace, sqlx::Error> {
        let id = uuid::Uuid::new_v4().to_string();

        sqlx::query(
            "INSERT INTO parking_spaces (id, number, floor, vehicle_type, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(number)
        .bind(floor)
        .bind(vehicle_type)
        .bind(now_timestamp())
        .execute(db)
        .await?;

        Self::get_by_number(db, number)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn get_by_number(
        db: &SqlitePool,
        number: &str,
    ) -> Result<Option<ParkingSpace>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM parking_spaces WHERE number = ?")
            .bind(number)
            .fetch_optional(db)
            .await
    }

    pub async fn list_with_occupancy(
        db: &SqlitePool,
    ) -> Result<Vec<ParkingSpaceWithOccupancy>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT sp.id, sp.number, sp.floor, sp.vehicle_type,
                   EXISTS (
                       SELECT 1 FROM parking_sessions ps
                       WHERE ps.space_id = sp.id AND ps.status = 'active'
                   ) AS occupied
            FROM parking_spaces sp
            ORDER BY sp.number ASC
            "#,
        )
        .fetch_all(db)
        .await
    }

    /// Whether an active session currently holds this space
    pub async fn is_occupied(db: &SqlitePool, id: &str) -> Result<bool, sqlx::Error> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM parking_sessions WHERE space_id = ? AND status = 'active'",
        )
        .bind(id)
        .fetch_one(db)
        .await?;
        Ok(count > 0)
    }
}
