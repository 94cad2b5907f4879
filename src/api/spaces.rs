use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::db::{
    CreateSpaceRequest, ParkingSpace, ParkingSpaceWithOccupancy, User, UserRole, VehicleType,
};
use crate::AppState;

use super::auth::require_role;
use super::error::{ApiError, ValidationErrorBuilder};
use super::extract::ApiJson;
use super::validation::validate_space_number;

/// GET /api/spaces
pub async fn list_spaces(
    State(state): State<Arc<AppState>>,
    _user: User,
) -> Result<Json<Vec<ParkingSpaceWithOccupancy>>, ApiError> {
    let spaces = ParkingSpace::list_with_occupancy(&state.db).await?;
    Ok(Json(spaces))
}

/// POST /api/spaces
pub async fn create_space(
    State(state): State<Arc<AppState>>,
    user: User,
    ApiJson(req): ApiJson<CreateSpaceRequest>,
) -> Result<(StatusCode, Json<ParkingSpace>), ApiError> {
    require_role(&user, UserRole::Admin)?;

    let number = req.number.trim();
    let floor = req
        .floor
        .as_deref()
        .map(str::trim)
        .filter(|f| !f.is_empty());

    let mut errors = ValidationErrorBuilder::new();
    errors.check("number", validate_space_number(number));
    if floor.is_some_and(|f| f.len() > 16) {
        errors.add("floor", "Floor is too long (max 16 characters)");
    }
    let vehicle_type = match req.vehicle_type.as_deref() {
        None => Some(VehicleType::Car),
        Some(raw) => match raw.parse::<VehicleType>() {
            Ok(vt) => Some(vt),
            Err(e) => {
                errors.add("vehicle_type", e);
                None
            }
        },
    };
    errors.finish()?;
    let vehicle_type = vehicle_type.unwrap_or(VehicleType::Car);

    if ParkingSpace::get_by_number(&state.db, number).await?.is_some() {
        return Err(ApiError::conflict(format!("Space {} already exists", number)));
    }

    let space = ParkingSpace::create(&state.db, number, floor, vehicle_type.as_str()).await?;
    tracing::info!(space_id = %space.id, number = %space.number, "Parking space created");

    Ok((StatusCode::CREATED, Json(space)))
}
