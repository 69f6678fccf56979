//! Driver matching: geospatial lookup of eligible drivers near a pickup
//! point.
//!
//! Side-effect free by design. The service only returns candidates ordered
//! nearest-first; claiming a ride is the state machine's job, so two
//! overlapping searches can safely see the same drivers. An empty result is
//! a valid outcome, not an error.

use crate::config::MatchingConfig;
use crate::models::Driver;
use crate::services::database::Database;
use service_core::error::AppError;

/// Meters per degree of latitude (and of longitude at the equator).
const METERS_PER_DEGREE: f64 = 111_320.0;

/// A candidate driver with their distance to the pickup point.
#[derive(Debug, Clone)]
pub struct DriverCandidate {
    pub driver: Driver,
    pub distance_m: f64,
}

#[derive(Clone)]
pub struct MatchingService {
    radius_m: f64,
    max_candidates: usize,
}

impl MatchingService {
    pub fn new(config: &MatchingConfig) -> Self {
        Self {
            radius_m: config.max_driver_distance_m,
            max_candidates: config.max_candidates,
        }
    }

    /// Find approved, available drivers within the search radius of the
    /// pickup point, nearest first, capped at the configured limit.
    pub async fn find_nearby(
        &self,
        db: &Database,
        pickup_lng: f64,
        pickup_lat: f64,
    ) -> Result<Vec<DriverCandidate>, AppError> {
        // Cheap bounding-box prefilter in SQL; exact haversine ranking below.
        let lat_delta = self.radius_m / METERS_PER_DEGREE;
        let lng_scale = pickup_lat.to_radians().cos().max(0.01);
        let lng_delta = self.radius_m / (METERS_PER_DEGREE * lng_scale);

        let drivers = sqlx::query_as::<_, Driver>(
            r#"
            SELECT * FROM drivers
            WHERE is_available
              AND is_approved
              AND location_lat BETWEEN $1 AND $2
              AND location_lng BETWEEN $3 AND $4
            "#,
        )
        .bind(pickup_lat - lat_delta)
        .bind(pickup_lat + lat_delta)
        .bind(pickup_lng - lng_delta)
        .bind(pickup_lng + lng_delta)
        .fetch_all(db.pool())
        .await?;

        Ok(rank_candidates(
            drivers,
            pickup_lng,
            pickup_lat,
            self.radius_m,
            self.max_candidates,
        ))
    }
}

/// Filter drivers to the search radius and order them nearest first.
fn rank_candidates(
    drivers: Vec<Driver>,
    pickup_lng: f64,
    pickup_lat: f64,
    radius_m: f64,
    cap: usize,
) -> Vec<DriverCandidate> {
    let mut candidates: Vec<DriverCandidate> = drivers
        .into_iter()
        .filter_map(|driver| {
            let (lng, lat) = match (driver.location_lng, driver.location_lat) {
                (Some(lng), Some(lat)) => (lng, lat),
                _ => return None,
            };
            let distance_m = haversine_m(pickup_lng, pickup_lat, lng, lat);
            (distance_m <= radius_m).then_some(DriverCandidate { driver, distance_m })
        })
        .collect();

    candidates.sort_by(|a, b| a.distance_m.total_cmp(&b.distance_m));
    candidates.truncate(cap);
    candidates
}

/// Great-circle distance between two (lng, lat) points in meters.
fn haversine_m(lng1: f64, lat1: f64, lng2: f64, lat2: f64) -> f64 {
    let (lat1, lon1) = (lat1.to_radians(), lng1.to_radians());
    let (lat2, lon2) = (lat2.to_radians(), lng2.to_radians());
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let sin_dlat = (dlat * 0.5).sin();
    let sin_dlon = (dlon * 0.5).sin();
    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlon * sin_dlon;
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    6_371_000.0 * c
}
