//! Common test utilities for ride-service integration tests.
//!
//! Tests need a PostgreSQL server: set `TEST_DATABASE_URL` to a superuser
//! connection string (any database). Each spawned app gets its own freshly
//! created database, so tests are isolated and can run in parallel. When the
//! variable is unset the tests skip themselves.

#![allow(dead_code)]

use reqwest::Method;
use ride_service::config::{
    Config, DatabaseConfig, MatchingConfig, ServerConfig, SquadConfig, TariffConfig,
};
use ride_service::startup::Application;
use rust_decimal::Decimal;
use secrecy::Secret;
use sqlx::{Connection, Executor, PgConnection, PgPool};
use std::sync::Once;
use uuid::Uuid;

pub const TEST_SECRET_HASH: &str = "test_secret_hash";

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,ride_service=debug,sqlx=warn")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub struct TestApp {
    pub address: String,
    pub pool: PgPool,
    pub client: reqwest::Client,
}

impl TestApp {
    /// Spawn the application against a fresh database, or `None` when
    /// `TEST_DATABASE_URL` is not set.
    pub async fn spawn() -> Option<TestApp> {
        init_tracing();

        let base_url = match std::env::var("TEST_DATABASE_URL") {
            Ok(url) => url,
            Err(_) => {
                eprintln!("TEST_DATABASE_URL not set, skipping integration test");
                return None;
            }
        };

        let db_name = format!("ride_test_{}", Uuid::new_v4().simple());
        let mut conn = PgConnection::connect(&base_url)
            .await
            .expect("Failed to connect to postgres");
        conn.execute(format!(r#"CREATE DATABASE "{}""#, db_name).as_str())
            .await
            .expect("Failed to create test database");

        let (server, _) = base_url
            .rsplit_once('/')
            .expect("TEST_DATABASE_URL must contain a database path");
        let database_url = format!("{}/{}", server, db_name);

        let config = Config {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
            },
            database: DatabaseConfig {
                url: Secret::new(database_url),
                max_connections: 4,
                min_connections: 1,
            },
            tariff: TariffConfig {
                base_fare: Decimal::from(200),
                price_per_km: Decimal::from(100),
                commission_pct: Decimal::from(10),
            },
            matching: MatchingConfig {
                max_driver_distance_m: 5000.0,
                max_candidates: 10,
            },
            squad: SquadConfig {
                api_key: Secret::new(String::new()),
                api_url: "https://api.squadco.com".to_string(),
                secret_hash: Secret::new(TEST_SECRET_HASH.to_string()),
            },
            service_name: "ride-service-test".to_string(),
        };

        let app = Application::build(config)
            .await
            .expect("Failed to build application");
        let address = format!("http://127.0.0.1:{}", app.port());
        let pool = app.state().db.pool().clone();

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        Some(TestApp {
            address,
            pool,
            client: reqwest::Client::new(),
        })
    }

    /// Request builder with actor headers attached.
    pub fn request(&self, method: Method, path: &str, user_id: Uuid, role: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.address, path))
            .header("x-user-id", user_id.to_string())
            .header("x-user-role", role)
    }

    pub fn get(&self, path: &str, user_id: Uuid, role: &str) -> reqwest::RequestBuilder {
        self.request(Method::GET, path, user_id, role)
    }

    pub fn post(&self, path: &str, user_id: Uuid, role: &str) -> reqwest::RequestBuilder {
        self.request(Method::POST, path, user_id, role)
    }

    pub fn patch(&self, path: &str, user_id: Uuid, role: &str) -> reqwest::RequestBuilder {
        self.request(Method::PATCH, path, user_id, role)
    }

    pub async fn seed_user(&self, role: &str) -> Uuid {
        let user_id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO users (user_id, first_name, last_name, email, phone, role)
            VALUES ($1, 'Test', 'User', $2, '+2348000000000', $3::user_role)
            "#,
        )
        .bind(user_id)
        .bind(format!("{}@test.example", user_id))
        .bind(role)
        .execute(&self.pool)
        .await
        .expect("Failed to seed user");
        user_id
    }

    /// Seed an approved, available driver at the given position.
    pub async fn seed_driver(&self, user_id: Uuid, lng: f64, lat: f64) -> Uuid {
        let driver_id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO drivers
                (driver_id, user_id, vehicle_type, license_plate, is_approved,
                 is_available, location_lng, location_lat)
            VALUES ($1, $2, 'sedan', $3, TRUE, TRUE, $4, $5)
            "#,
        )
        .bind(driver_id)
        .bind(user_id)
        .bind(&Uuid::new_v4().to_string()[..12])
        .bind(lng)
        .bind(lat)
        .execute(&self.pool)
        .await
        .expect("Failed to seed driver");
        driver_id
    }

    pub async fn seed_wallet(&self, user_id: Uuid, balance: Decimal) {
        sqlx::query(
            r#"
            INSERT INTO wallets (wallet_id, user_id, balance)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(balance)
        .execute(&self.pool)
        .await
        .expect("Failed to seed wallet");
    }

    pub async fn wallet_balance(&self, user_id: Uuid) -> Decimal {
        sqlx::query_scalar("SELECT balance FROM wallets WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .expect("Failed to read wallet balance")
    }

    /// A full rider + funded wallet, and a driver near the default pickup.
    pub async fn seed_ride_parties(&self) -> RideParties {
        let rider_id = self.seed_user("rider").await;
        self.seed_wallet(rider_id, Decimal::from(5000)).await;

        let driver_user_id = self.seed_user("driver").await;
        let driver_id = self.seed_driver(driver_user_id, 3.3792, 6.5244).await;
        self.seed_wallet(driver_user_id, Decimal::ZERO).await;

        RideParties {
            rider_id,
            driver_user_id,
            driver_id,
        }
    }
}

pub struct RideParties {
    pub rider_id: Uuid,
    pub driver_user_id: Uuid,
    pub driver_id: Uuid,
}

/// Canonical ride request payload: 10 km trip near the default driver.
pub fn ride_request_body(payment_method: &str) -> serde_json::Value {
    serde_json::json!({
        "pickup_location": { "name": "Campus gate", "coordinates": [3.3792, 6.5244] },
        "dropoff_location": { "name": "City center", "coordinates": [3.4215, 6.4698] },
        "distance": "10",
        "duration": 25,
        "payment_method": payment_method
    })
}

/// Drive a ride through request → accept → start, returning the ride id.
pub async fn setup_ongoing_ride(
    app: &TestApp,
    parties: &RideParties,
    payment_method: &str,
) -> Uuid {
    let response = app
        .post("/rides", parties.rider_id, "rider")
        .json(&ride_request_body(payment_method))
        .send()
        .await
        .expect("request_ride failed");
    assert_eq!(response.status(), 201, "ride request should succeed");
    let ride: serde_json::Value = response.json().await.expect("invalid ride json");
    let ride_id: Uuid = ride["ride_id"]
        .as_str()
        .expect("missing ride_id")
        .parse()
        .expect("invalid ride_id");

    let response = app
        .post(
            &format!("/rides/{}/accept", ride_id),
            parties.driver_user_id,
            "driver",
        )
        .send()
        .await
        .expect("accept_ride failed");
    assert_eq!(response.status(), 200, "accept should succeed");

    let response = app
        .post(
            &format!("/rides/{}/start", ride_id),
            parties.driver_user_id,
            "driver",
        )
        .send()
        .await
        .expect("start_ride failed");
    assert_eq!(response.status(), 200, "start should succeed");

    ride_id
}

/// HMAC-SHA512 signature over a webhook body, hex encoded, using the test
/// secret.
pub fn sign_webhook(body: &str) -> String {
    use hmac::{Hmac, Mac};
    use sha2::Sha512;

    let mut mac = Hmac::<Sha512>::new_from_slice(TEST_SECRET_HASH.as_bytes())
        .expect("HMAC accepts any key length");
    mac.update(body.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}
