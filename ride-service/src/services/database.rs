//! Database connection pool and shared record lookups.
//!
//! Multi-record financial postings (settlement, reconciliation, top-up) do
//! not live here: they run inside explicit sqlx transactions owned by the
//! ledger, ride, and reconciler services so their writes commit or roll back
//! as one unit.

use crate::models::{Driver, Ride, RideStatus, Transaction, User, Wallet};
use crate::services::metrics::DB_QUERY_DURATION;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "ride-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::Database(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::Database(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    pub async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT user_id, first_name, last_name, email, phone, role, created_utc, updated_utc
            FROM users
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn get_ride(&self, ride_id: Uuid) -> Result<Option<Ride>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_ride"])
            .start_timer();

        let ride = sqlx::query_as::<_, Ride>("SELECT * FROM rides WHERE ride_id = $1")
            .bind(ride_id)
            .fetch_optional(&self.pool)
            .await?;

        timer.observe_duration();

        Ok(ride)
    }

    /// Ride history for a rider or a driver, newest first.
    pub async fn list_rides(
        &self,
        rider_id: Option<Uuid>,
        driver_id: Option<Uuid>,
        status: Option<RideStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Ride>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_rides"])
            .start_timer();

        let rides = sqlx::query_as::<_, Ride>(
            r#"
            SELECT * FROM rides
            WHERE ($1::uuid IS NULL OR rider_id = $1)
              AND ($2::uuid IS NULL OR driver_id = $2)
              AND ($3::ride_status IS NULL OR status = $3)
            ORDER BY created_utc DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(rider_id)
        .bind(driver_id)
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        timer.observe_duration();

        Ok(rides)
    }

    pub async fn get_driver_by_user(&self, user_id: Uuid) -> Result<Option<Driver>, AppError> {
        let driver = sqlx::query_as::<_, Driver>("SELECT * FROM drivers WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(driver)
    }

    pub async fn set_driver_availability(
        &self,
        user_id: Uuid,
        is_available: bool,
    ) -> Result<Option<Driver>, AppError> {
        let driver = sqlx::query_as::<_, Driver>(
            r#"
            UPDATE drivers
            SET is_available = $2, updated_utc = now()
            WHERE user_id = $1
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(is_available)
        .fetch_optional(&self.pool)
        .await?;

        Ok(driver)
    }

    pub async fn set_driver_location(
        &self,
        user_id: Uuid,
        lng: f64,
        lat: f64,
    ) -> Result<Option<Driver>, AppError> {
        let driver = sqlx::query_as::<_, Driver>(
            r#"
            UPDATE drivers
            SET location_lng = $2, location_lat = $3, updated_utc = now()
            WHERE user_id = $1
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(lng)
        .bind(lat)
        .fetch_optional(&self.pool)
        .await?;

        Ok(driver)
    }

    pub async fn get_wallet(&self, user_id: Uuid) -> Result<Option<Wallet>, AppError> {
        let wallet = sqlx::query_as::<_, Wallet>("SELECT * FROM wallets WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(wallet)
    }

    /// Transaction history for a user, newest first.
    pub async fn list_transactions(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Transaction>, AppError> {
        let transactions = sqlx::query_as::<_, Transaction>(
            r#"
            SELECT * FROM transactions
            WHERE user_id = $1
            ORDER BY created_utc DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(transactions)
    }
}
