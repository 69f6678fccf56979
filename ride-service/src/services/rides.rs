//! The ride lifecycle state machine.
//!
//! Owns every status transition and its guards. Transitions that touch more
//! than one record run in a single database transaction; the accept claim is
//! a conditional update so two drivers racing for the same ride cannot both
//! win.

use crate::middleware::ActorContext;
use crate::models::{
    CancelActor, Driver, Location, PaymentMethod, Ride, RideStatus, Role,
};
use crate::services::database::Database;
use crate::services::fare::FareCalculator;
use crate::services::ledger::LedgerService;
use crate::services::matching::MatchingService;
use crate::services::metrics::{RIDE_TRANSITIONS_TOTAL, SETTLEMENTS_TOTAL};
use rust_decimal::Decimal;
use serde::Deserialize;
use service_core::error::AppError;
use sqlx::{Postgres, Transaction as SqlxTransaction};
use tracing::instrument;
use uuid::Uuid;

/// A rider's trip request.
#[derive(Debug, Clone, Deserialize)]
pub struct RideRequest {
    pub pickup_location: Location,
    pub dropoff_location: Location,
    /// Trip distance in kilometers.
    pub distance: Decimal,
    /// Estimated duration in minutes.
    pub duration: i32,
    pub payment_method: PaymentMethod,
}

#[derive(Clone)]
pub struct RideService {
    db: Database,
    fare: FareCalculator,
    matching: MatchingService,
    ledger: LedgerService,
}

impl RideService {
    pub fn new(
        db: Database,
        fare: FareCalculator,
        matching: MatchingService,
        ledger: LedgerService,
    ) -> Self {
        Self {
            db,
            fare,
            matching,
            ledger,
        }
    }

    /// Create a ride in `requested` state and count nearby candidates.
    ///
    /// Wallet rides get a fast-feedback balance check here; the balance is
    /// re-validated at settlement time regardless, since it may change while
    /// the ride is underway.
    #[instrument(skip(self, request), fields(rider_id = %rider_id))]
    pub async fn request_ride(
        &self,
        rider_id: Uuid,
        request: RideRequest,
    ) -> Result<(Ride, usize), AppError> {
        if request.distance <= Decimal::ZERO {
            return Err(AppError::Validation(anyhow::anyhow!(
                "Distance must be positive"
            )));
        }
        if request.duration <= 0 {
            return Err(AppError::Validation(anyhow::anyhow!(
                "Duration must be positive"
            )));
        }
        if !request.pickup_location.is_valid() || !request.dropoff_location.is_valid() {
            return Err(AppError::Validation(anyhow::anyhow!(
                "Pickup and dropoff locations must have a name and valid coordinates"
            )));
        }

        let quote = self.fare.quote(request.distance);

        if request.payment_method == PaymentMethod::Wallet {
            let wallet = self
                .db
                .get_wallet(rider_id)
                .await?
                .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Wallet not found")))?;
            if wallet.balance < quote.fare {
                return Err(AppError::Payment(anyhow::anyhow!(
                    "Insufficient wallet balance"
                )));
            }
        }

        let ride = sqlx::query_as::<_, Ride>(
            r#"
            INSERT INTO rides
                (ride_id, rider_id, pickup_name, pickup_lng, pickup_lat,
                 dropoff_name, dropoff_lng, dropoff_lat, distance_km,
                 duration_minutes, fare, commission_amount, driver_amount,
                 payment_method)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(rider_id)
        .bind(&request.pickup_location.name)
        .bind(request.pickup_location.lng())
        .bind(request.pickup_location.lat())
        .bind(&request.dropoff_location.name)
        .bind(request.dropoff_location.lng())
        .bind(request.dropoff_location.lat())
        .bind(request.distance)
        .bind(request.duration)
        .bind(quote.fare)
        .bind(quote.commission)
        .bind(quote.driver_amount)
        .bind(request.payment_method)
        .fetch_one(self.db.pool())
        .await?;

        let candidates = self
            .matching
            .find_nearby(
                &self.db,
                request.pickup_location.lng(),
                request.pickup_location.lat(),
            )
            .await?;

        RIDE_TRANSITIONS_TOTAL
            .with_label_values(&["requested"])
            .inc();
        tracing::info!(
            ride_id = %ride.ride_id,
            fare = %ride.fare,
            candidates = candidates.len(),
            "Ride requested"
        );

        Ok((ride, candidates.len()))
    }

    /// Driver claims a requested ride.
    ///
    /// The claim is a conditional update on `status = 'requested'`: only the
    /// first concurrent accept succeeds, the loser observes the new status
    /// and gets a conflict.
    #[instrument(skip(self), fields(ride_id = %ride_id, driver_user_id = %driver_user_id))]
    pub async fn accept_ride(
        &self,
        ride_id: Uuid,
        driver_user_id: Uuid,
    ) -> Result<Ride, AppError> {
        let driver = self
            .db
            .get_driver_by_user(driver_user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Driver details not found")))?;

        if !driver.is_approved {
            return Err(AppError::Authorization(anyhow::anyhow!(
                "Driver is not approved yet"
            )));
        }

        let mut tx = self.db.pool().begin().await?;

        let claimed = sqlx::query_as::<_, Ride>(
            r#"
            UPDATE rides
            SET status = 'accepted', driver_id = $2, updated_utc = now()
            WHERE ride_id = $1 AND status = 'requested'
            RETURNING *
            "#,
        )
        .bind(ride_id)
        .bind(driver.driver_id)
        .fetch_optional(&mut *tx)
        .await?;

        let ride = match claimed {
            Some(ride) => ride,
            None => {
                // Lost the claim (or the ride never existed): report why.
                let current = sqlx::query_as::<_, Ride>("SELECT * FROM rides WHERE ride_id = $1")
                    .bind(ride_id)
                    .fetch_optional(&mut *tx)
                    .await?;
                return match current {
                    Some(r) => Err(AppError::Conflict(anyhow::anyhow!(
                        "Ride is already {}",
                        r.status
                    ))),
                    None => Err(AppError::NotFound(anyhow::anyhow!("Ride not found"))),
                };
            }
        };

        sqlx::query(
            "UPDATE drivers SET is_available = FALSE, updated_utc = now() WHERE driver_id = $1",
        )
        .bind(driver.driver_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        RIDE_TRANSITIONS_TOTAL.with_label_values(&["accepted"]).inc();
        tracing::info!(ride_id = %ride.ride_id, driver_id = %driver.driver_id, "Ride accepted");

        Ok(ride)
    }

    /// Assigned driver starts the trip.
    #[instrument(skip(self), fields(ride_id = %ride_id, driver_user_id = %driver_user_id))]
    pub async fn start_ride(
        &self,
        ride_id: Uuid,
        driver_user_id: Uuid,
    ) -> Result<Ride, AppError> {
        let mut tx = self.db.pool().begin().await?;

        let ride = lock_ride(&mut tx, ride_id).await?;
        if ride.status != RideStatus::Accepted {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Ride cannot be started. Current status: {}",
                ride.status
            )));
        }
        let driver = require_assigned_driver(&mut tx, &ride, driver_user_id, "start").await?;

        let ride = sqlx::query_as::<_, Ride>(
            r#"
            UPDATE rides
            SET status = 'ongoing', start_time = now(), updated_utc = now()
            WHERE ride_id = $1
            RETURNING *
            "#,
        )
        .bind(ride_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        RIDE_TRANSITIONS_TOTAL.with_label_values(&["ongoing"]).inc();
        tracing::info!(ride_id = %ride.ride_id, driver_id = %driver.driver_id, "Ride started");

        Ok(ride)
    }

    /// Assigned driver completes the trip; settlement happens in the same
    /// database transaction. A settlement failure (insufficient balance)
    /// rolls the transition back entirely and the ride stays ongoing.
    #[instrument(skip(self), fields(ride_id = %ride_id, driver_user_id = %driver_user_id))]
    pub async fn complete_ride(
        &self,
        ride_id: Uuid,
        driver_user_id: Uuid,
    ) -> Result<Ride, AppError> {
        let mut tx = self.db.pool().begin().await?;

        let ride = lock_ride(&mut tx, ride_id).await?;
        if ride.status != RideStatus::Ongoing {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Ride cannot be completed. Current status: {}",
                ride.status
            )));
        }
        let driver = require_assigned_driver(&mut tx, &ride, driver_user_id, "complete").await?;

        let ride = sqlx::query_as::<_, Ride>(
            r#"
            UPDATE rides
            SET status = 'completed', payment_status = 'paid',
                end_time = now(), updated_utc = now()
            WHERE ride_id = $1
            RETURNING *
            "#,
        )
        .bind(ride_id)
        .fetch_one(&mut *tx)
        .await?;

        let method = match ride.payment_method {
            PaymentMethod::Wallet => "wallet",
            PaymentMethod::Cash => "cash",
        };

        if let Err(e) = self.ledger.settle_ride(&mut tx, &ride, driver.user_id).await {
            SETTLEMENTS_TOTAL
                .with_label_values(&[method, "aborted"])
                .inc();
            return Err(e);
        }

        sqlx::query(
            r#"
            UPDATE drivers
            SET is_available = TRUE, completed_rides = completed_rides + 1,
                updated_utc = now()
            WHERE driver_id = $1
            "#,
        )
        .bind(driver.driver_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        RIDE_TRANSITIONS_TOTAL
            .with_label_values(&["completed"])
            .inc();
        SETTLEMENTS_TOTAL.with_label_values(&[method, "ok"]).inc();
        tracing::info!(ride_id = %ride.ride_id, "Ride completed and settled");

        Ok(ride)
    }

    /// Cancel a non-terminal ride. Riders may cancel their own rides,
    /// drivers the rides assigned to them, admins any ride (recorded as
    /// `system`).
    #[instrument(skip(self, actor), fields(ride_id = %ride_id, user_id = %actor.user_id))]
    pub async fn cancel_ride(
        &self,
        ride_id: Uuid,
        actor: ActorContext,
        reason: Option<String>,
    ) -> Result<Ride, AppError> {
        let mut tx = self.db.pool().begin().await?;

        let ride = lock_ride(&mut tx, ride_id).await?;
        if ride.status.is_terminal() {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Ride cannot be cancelled. Current status: {}",
                ride.status
            )));
        }

        let cancelled_by = match actor.role {
            Role::Rider => {
                if ride.rider_id != actor.user_id {
                    return Err(AppError::Authorization(anyhow::anyhow!(
                        "You are not authorized to cancel this ride"
                    )));
                }
                CancelActor::Rider
            }
            Role::Driver => {
                let driver = fetch_driver_by_user(&mut tx, actor.user_id).await?;
                match driver {
                    Some(ref d) if ride.driver_id == Some(d.driver_id) => {
                        sqlx::query(
                            r#"
                            UPDATE drivers
                            SET cancelled_rides = cancelled_rides + 1, updated_utc = now()
                            WHERE driver_id = $1
                            "#,
                        )
                        .bind(d.driver_id)
                        .execute(&mut *tx)
                        .await?;
                        CancelActor::Driver
                    }
                    _ => {
                        return Err(AppError::Authorization(anyhow::anyhow!(
                            "You are not authorized to cancel this ride"
                        )))
                    }
                }
            }
            Role::Admin => CancelActor::System,
        };

        // A driver reference only exists in post-claim states; cancelling
        // clears it, so remember who to release first.
        let assigned_driver_id = ride.driver_id;

        let ride = sqlx::query_as::<_, Ride>(
            r#"
            UPDATE rides
            SET status = 'cancelled', driver_id = NULL, cancellation_reason = $2,
                cancelled_by = $3, updated_utc = now()
            WHERE ride_id = $1
            RETURNING *
            "#,
        )
        .bind(ride_id)
        .bind(reason.unwrap_or_else(|| "No reason provided".to_string()))
        .bind(cancelled_by)
        .fetch_one(&mut *tx)
        .await?;

        if let Some(driver_id) = assigned_driver_id {
            sqlx::query(
                "UPDATE drivers SET is_available = TRUE, updated_utc = now() WHERE driver_id = $1",
            )
            .bind(driver_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        RIDE_TRANSITIONS_TOTAL
            .with_label_values(&["cancelled"])
            .inc();
        tracing::info!(
            ride_id = %ride.ride_id,
            cancelled_by = ?cancelled_by,
            "Ride cancelled"
        );

        Ok(ride)
    }

    /// Rate a completed ride, once per party. A rider rating also folds into
    /// the driver's running average.
    #[instrument(skip(self, actor), fields(ride_id = %ride_id, user_id = %actor.user_id))]
    pub async fn rate_ride(
        &self,
        ride_id: Uuid,
        actor: ActorContext,
        rating: i16,
    ) -> Result<Ride, AppError> {
        if !(1..=5).contains(&rating) {
            return Err(AppError::Validation(anyhow::anyhow!(
                "Invalid rating. Must be between 1 and 5"
            )));
        }

        let mut tx = self.db.pool().begin().await?;

        let ride = lock_ride(&mut tx, ride_id).await?;
        if ride.status != RideStatus::Completed {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Only completed rides can be rated"
            )));
        }

        let is_rider = ride.rider_id == actor.user_id;
        let assigned_driver = match actor.role {
            Role::Driver => fetch_driver_by_user(&mut tx, actor.user_id)
                .await?
                .filter(|d| ride.driver_id == Some(d.driver_id)),
            _ => None,
        };

        let ride = if is_rider {
            if ride.rider_rating.is_some() {
                return Err(AppError::Conflict(anyhow::anyhow!(
                    "You have already rated this ride"
                )));
            }

            // Fold the new rating into the driver's running average.
            if let Some(driver_id) = ride.driver_id {
                sqlx::query(
                    r#"
                    UPDATE drivers
                    SET rating = ROUND((rating * total_ratings + $2) / (total_ratings + 1), 2),
                        total_ratings = total_ratings + 1,
                        updated_utc = now()
                    WHERE driver_id = $1
                    "#,
                )
                .bind(driver_id)
                .bind(Decimal::from(rating))
                .execute(&mut *tx)
                .await?;
            }

            sqlx::query_as::<_, Ride>(
                r#"
                UPDATE rides SET rider_rating = $2, updated_utc = now()
                WHERE ride_id = $1
                RETURNING *
                "#,
            )
            .bind(ride_id)
            .bind(rating)
            .fetch_one(&mut *tx)
            .await?
        } else if assigned_driver.is_some() {
            if ride.driver_rating.is_some() {
                return Err(AppError::Conflict(anyhow::anyhow!(
                    "You have already rated this ride"
                )));
            }

            sqlx::query_as::<_, Ride>(
                r#"
                UPDATE rides SET driver_rating = $2, updated_utc = now()
                WHERE ride_id = $1
                RETURNING *
                "#,
            )
            .bind(ride_id)
            .bind(rating)
            .fetch_one(&mut *tx)
            .await?
        } else {
            return Err(AppError::Authorization(anyhow::anyhow!(
                "You are not authorized to rate this ride"
            )));
        };

        tx.commit().await?;

        Ok(ride)
    }
}

/// Lock a ride row for the duration of the enclosing transaction.
async fn lock_ride(
    tx: &mut SqlxTransaction<'_, Postgres>,
    ride_id: Uuid,
) -> Result<Ride, AppError> {
    sqlx::query_as::<_, Ride>("SELECT * FROM rides WHERE ride_id = $1 FOR UPDATE")
        .bind(ride_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Ride not found")))
}

async fn fetch_driver_by_user(
    tx: &mut SqlxTransaction<'_, Postgres>,
    user_id: Uuid,
) -> Result<Option<Driver>, AppError> {
    let driver = sqlx::query_as::<_, Driver>("SELECT * FROM drivers WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(&mut **tx)
        .await?;

    Ok(driver)
}

/// Resolve the acting driver and require them to be the one assigned to the
/// ride.
async fn require_assigned_driver(
    tx: &mut SqlxTransaction<'_, Postgres>,
    ride: &Ride,
    driver_user_id: Uuid,
    action: &str,
) -> Result<Driver, AppError> {
    fetch_driver_by_user(tx, driver_user_id)
        .await?
        .filter(|d| ride.driver_id == Some(d.driver_id))
        .ok_or_else(|| {
            AppError::Authorization(anyhow::anyhow!(
                "You are not authorized to {} this ride",
                action
            ))
        })
}
