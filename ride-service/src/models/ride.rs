//! Ride entity and its lifecycle enums.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Ride lifecycle status.
///
/// requested → accepted → ongoing → completed, with cancellation allowed from
/// any non-terminal state. `completed` and `cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "ride_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RideStatus {
    Requested,
    Accepted,
    Ongoing,
    Completed,
    Cancelled,
}

impl RideStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Requested => "requested",
            Self::Accepted => "accepted",
            Self::Ongoing => "ongoing",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for RideStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How the rider pays for the trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_method", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cash,
    Wallet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
}

/// Which party cancelled a ride. Admin cancellations are recorded as `system`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "cancel_actor", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CancelActor {
    Rider,
    Driver,
    System,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Ride {
    pub ride_id: Uuid,
    pub rider_id: Uuid,
    pub driver_id: Option<Uuid>,
    pub status: RideStatus,
    pub pickup_name: String,
    pub pickup_lng: f64,
    pub pickup_lat: f64,
    pub dropoff_name: String,
    pub dropoff_lng: f64,
    pub dropoff_lat: f64,
    pub distance_km: Decimal,
    pub duration_minutes: i32,
    pub fare: Decimal,
    pub commission_amount: Decimal,
    pub driver_amount: Decimal,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub rider_rating: Option<i16>,
    pub driver_rating: Option<i16>,
    pub cancellation_reason: Option<String>,
    pub cancelled_by: Option<CancelActor>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

/// A named point on the map, as submitted by the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    /// [longitude, latitude], GeoJSON order.
    pub coordinates: [f64; 2],
}

impl Location {
    pub fn lng(&self) -> f64 {
        self.coordinates[0]
    }

    pub fn lat(&self) -> f64 {
        self.coordinates[1]
    }

    pub fn is_valid(&self) -> bool {
        !self.name.trim().is_empty()
            && self.lng().abs() <= 180.0
            && self.lat().abs() <= 90.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(RideStatus::Completed.is_terminal());
        assert!(RideStatus::Cancelled.is_terminal());
        assert!(!RideStatus::Requested.is_terminal());
        assert!(!RideStatus::Accepted.is_terminal());
        assert!(!RideStatus::Ongoing.is_terminal());
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&RideStatus::Requested).unwrap(),
            "\"requested\""
        );
        assert_eq!(
            serde_json::to_string(&PaymentMethod::Wallet).unwrap(),
            "\"wallet\""
        );
    }

    #[test]
    fn location_bounds() {
        let good = Location {
            name: "Campus gate".to_string(),
            coordinates: [3.3792, 6.5244],
        };
        assert!(good.is_valid());

        let bad = Location {
            name: "Nowhere".to_string(),
            coordinates: [200.0, 6.5],
        };
        assert!(!bad.is_valid());
    }
}
