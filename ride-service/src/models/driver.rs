//! Driver entity, referenced (not owned) by the ride core.
//!
//! Matching reads `is_approved`/`is_available`/location; ride transitions
//! flip availability (accept locks it, complete/cancel release it) and
//! maintain the ride counters.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Driver {
    pub driver_id: Uuid,
    pub user_id: Uuid,
    pub vehicle_type: String,
    pub license_plate: String,
    pub is_approved: bool,
    pub is_available: bool,
    pub location_lng: Option<f64>,
    pub location_lat: Option<f64>,
    pub rating: Decimal,
    pub total_ratings: i32,
    pub completed_rides: i32,
    pub cancelled_rides: i32,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}
