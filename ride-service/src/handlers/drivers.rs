//! Driver profile endpoints: availability toggle and location updates.

use axum::{extract::State, Json};
use serde::Deserialize;
use service_core::error::AppError;

use crate::middleware::ActorContext;
use crate::models::{Driver, Role};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct AvailabilityRequest {
    pub is_available: bool,
}

#[derive(Debug, Deserialize)]
pub struct LocationRequest {
    /// [longitude, latitude], GeoJSON order.
    pub coordinates: [f64; 2],
}

pub async fn set_availability(
    State(state): State<AppState>,
    actor: ActorContext,
    Json(payload): Json<AvailabilityRequest>,
) -> Result<Json<Driver>, AppError> {
    let actor = actor.require(Role::Driver)?;

    let driver = state
        .db
        .set_driver_availability(actor.user_id, payload.is_available)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Driver details not found")))?;

    Ok(Json(driver))
}

pub async fn set_location(
    State(state): State<AppState>,
    actor: ActorContext,
    Json(payload): Json<LocationRequest>,
) -> Result<Json<Driver>, AppError> {
    let actor = actor.require(Role::Driver)?;

    let [lng, lat] = payload.coordinates;
    if lng.abs() > 180.0 || lat.abs() > 90.0 {
        return Err(AppError::Validation(anyhow::anyhow!(
            "Coordinates out of range"
        )));
    }

    let driver = state
        .db
        .set_driver_location(actor.user_id, lng, lat)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Driver details not found")))?;

    Ok(Json(driver))
}
