//! Ride lifecycle endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use uuid::Uuid;

use crate::middleware::ActorContext;
use crate::models::{Ride, Role};
use crate::services::RideRequest;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct RideRequested {
    #[serde(flatten)]
    pub ride: Ride,
    /// Approved, available drivers near the pickup at request time.
    pub nearby_drivers: usize,
}

#[derive(Debug, Deserialize, Default)]
pub struct CancelRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RateRequest {
    pub rating: i16,
}

#[derive(Debug, Deserialize)]
pub struct RideListQuery {
    pub rider_id: Option<Uuid>,
    pub driver_id: Option<Uuid>,
    pub status: Option<crate::models::RideStatus>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

pub async fn request_ride(
    State(state): State<AppState>,
    actor: ActorContext,
    Json(payload): Json<RideRequest>,
) -> Result<(StatusCode, Json<RideRequested>), AppError> {
    let actor = actor.require(Role::Rider)?;

    let (ride, nearby_drivers) = state.rides.request_ride(actor.user_id, payload).await?;

    Ok((
        StatusCode::CREATED,
        Json(RideRequested {
            ride,
            nearby_drivers,
        }),
    ))
}

pub async fn accept_ride(
    State(state): State<AppState>,
    actor: ActorContext,
    Path(ride_id): Path<Uuid>,
) -> Result<Json<Ride>, AppError> {
    let actor = actor.require(Role::Driver)?;
    let ride = state.rides.accept_ride(ride_id, actor.user_id).await?;
    Ok(Json(ride))
}

pub async fn start_ride(
    State(state): State<AppState>,
    actor: ActorContext,
    Path(ride_id): Path<Uuid>,
) -> Result<Json<Ride>, AppError> {
    let actor = actor.require(Role::Driver)?;
    let ride = state.rides.start_ride(ride_id, actor.user_id).await?;
    Ok(Json(ride))
}

pub async fn complete_ride(
    State(state): State<AppState>,
    actor: ActorContext,
    Path(ride_id): Path<Uuid>,
) -> Result<Json<Ride>, AppError> {
    let actor = actor.require(Role::Driver)?;
    let ride = state.rides.complete_ride(ride_id, actor.user_id).await?;
    Ok(Json(ride))
}

pub async fn cancel_ride(
    State(state): State<AppState>,
    actor: ActorContext,
    Path(ride_id): Path<Uuid>,
    payload: Option<Json<CancelRequest>>,
) -> Result<Json<Ride>, AppError> {
    let reason = payload.and_then(|Json(p)| p.reason);
    let ride = state.rides.cancel_ride(ride_id, actor, reason).await?;
    Ok(Json(ride))
}

pub async fn rate_ride(
    State(state): State<AppState>,
    actor: ActorContext,
    Path(ride_id): Path<Uuid>,
    Json(payload): Json<RateRequest>,
) -> Result<Json<Ride>, AppError> {
    let ride = state
        .rides
        .rate_ride(ride_id, actor, payload.rating)
        .await?;
    Ok(Json(ride))
}

/// Ride details, visible to the rider, the assigned driver, and admins.
pub async fn get_ride(
    State(state): State<AppState>,
    actor: ActorContext,
    Path(ride_id): Path<Uuid>,
) -> Result<Json<Ride>, AppError> {
    let ride = state
        .db
        .get_ride(ride_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Ride not found")))?;

    let allowed = match actor.role {
        Role::Admin => true,
        Role::Rider => ride.rider_id == actor.user_id,
        Role::Driver => {
            let driver = state.db.get_driver_by_user(actor.user_id).await?;
            driver.is_some_and(|d| ride.driver_id == Some(d.driver_id))
        }
    };
    if !allowed {
        return Err(AppError::Authorization(anyhow::anyhow!(
            "You are not authorized to view this ride"
        )));
    }

    Ok(Json(ride))
}

/// Ride history. Riders and drivers see their own rides; admins may filter
/// by rider or driver.
pub async fn list_rides(
    State(state): State<AppState>,
    actor: ActorContext,
    Query(query): Query<RideListQuery>,
) -> Result<Json<Vec<Ride>>, AppError> {
    let limit = query.limit.clamp(1, 100);
    let offset = query.offset.max(0);

    let (rider_id, driver_id) = match actor.role {
        Role::Rider => (Some(actor.user_id), None),
        Role::Driver => {
            let driver = state
                .db
                .get_driver_by_user(actor.user_id)
                .await?
                .ok_or_else(|| {
                    AppError::NotFound(anyhow::anyhow!("Driver details not found"))
                })?;
            (None, Some(driver.driver_id))
        }
        Role::Admin => (query.rider_id, query.driver_id),
    };

    let rides = state
        .db
        .list_rides(rider_id, driver_id, query.status, limit, offset)
        .await?;
    Ok(Json(rides))
}
