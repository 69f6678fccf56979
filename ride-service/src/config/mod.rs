use anyhow::Result;
use dotenvy::dotenv;
use rust_decimal::Decimal;
use secrecy::Secret;
use serde::Deserialize;
use std::env;

#[derive(Deserialize, Clone, Debug)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub tariff: TariffConfig,
    pub matching: MatchingConfig,
    pub squad: SquadConfig,
    pub service_name: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Clone, Debug)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    pub max_connections: u32,
    pub min_connections: u32,
}

/// Fare tariff, injected into the fare calculator so it is never read from
/// ambient state. Amounts are in the platform currency's major unit.
#[derive(Deserialize, Clone, Debug)]
pub struct TariffConfig {
    pub base_fare: Decimal,
    pub price_per_km: Decimal,
    pub commission_pct: Decimal,
}

#[derive(Deserialize, Clone, Debug)]
pub struct MatchingConfig {
    /// Search radius around the pickup point, in meters.
    pub max_driver_distance_m: f64,
    /// Cap on the number of candidates returned.
    pub max_candidates: usize,
}

/// Squad payment gateway credentials and webhook secret.
#[derive(Deserialize, Clone, Debug)]
pub struct SquadConfig {
    pub api_key: Secret<String>,
    pub api_url: String,
    pub secret_hash: Secret<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let host = env::var("RIDE_SERVICE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("RIDE_SERVICE_PORT")
            .unwrap_or_else(|_| "3005".to_string())
            .parse()?;

        let db_url = env::var("RIDE_DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("RIDE_DATABASE_URL must be set"))?;
        let max_connections = env::var("RIDE_DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()?;
        let min_connections = env::var("RIDE_DATABASE_MIN_CONNECTIONS")
            .unwrap_or_else(|_| "1".to_string())
            .parse()?;

        let base_fare: Decimal = env::var("BASE_FARE")
            .unwrap_or_else(|_| "200".to_string())
            .parse()?;
        let price_per_km: Decimal = env::var("PRICE_PER_KM")
            .unwrap_or_else(|_| "100".to_string())
            .parse()?;
        let commission_pct: Decimal = env::var("COMMISSION_PERCENTAGE")
            .unwrap_or_else(|_| "10".to_string())
            .parse()?;

        let max_driver_distance_m = env::var("MAX_DRIVER_DISTANCE")
            .unwrap_or_else(|_| "5000".to_string())
            .parse()?;
        let max_candidates = env::var("MAX_DRIVER_CANDIDATES")
            .unwrap_or_else(|_| "10".to_string())
            .parse()?;

        let squad_api_key = env::var("SQUAD_API_KEY").unwrap_or_default();
        let squad_api_url =
            env::var("SQUAD_API_URL").unwrap_or_else(|_| "https://api.squadco.com".to_string());
        let squad_secret_hash = env::var("SQUAD_SECRET_HASH").unwrap_or_default();

        Ok(Self {
            server: ServerConfig { host, port },
            database: DatabaseConfig {
                url: Secret::new(db_url),
                max_connections,
                min_connections,
            },
            tariff: TariffConfig {
                base_fare,
                price_per_km,
                commission_pct,
            },
            matching: MatchingConfig {
                max_driver_distance_m,
                max_candidates,
            },
            squad: SquadConfig {
                api_key: Secret::new(squad_api_key),
                api_url: squad_api_url,
                secret_hash: Secret::new(squad_secret_hash),
            },
            service_name: "ride-service".to_string(),
        })
    }
}
