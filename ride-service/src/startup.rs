//! Application startup and lifecycle management.

use crate::config::Config;
use crate::handlers;
use crate::services::{
    Database, FareCalculator, LedgerService, MatchingService, PaymentReconciler, RideService,
    SquadClient, WalletService,
};
use axum::{
    routing::{get, patch, post},
    Router,
};
use secrecy::ExposeSecret;
use service_core::error::AppError;
use service_core::middleware::tracing::request_id_middleware;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Config,
    pub rides: RideService,
    pub wallets: WalletService,
    pub reconciler: PaymentReconciler,
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application: connect, migrate, wire services, bind.
    pub async fn build(config: Config) -> Result<Self, AppError> {
        crate::services::metrics::init_metrics();

        let db = Database::new(
            config.database.url.expose_secret(),
            config.database.max_connections,
            config.database.min_connections,
        )
        .await?;
        db.run_migrations().await?;

        let gateway = SquadClient::new(config.squad.clone());
        if gateway.is_configured() {
            tracing::info!("Squad gateway client initialized");
        } else {
            tracing::warn!("Squad credentials not configured, virtual account funding disabled");
        }

        let fare = FareCalculator::new(&config.tariff);
        let matching = MatchingService::new(&config.matching);
        let rides = RideService::new(db.clone(), fare, matching, LedgerService);
        let wallets = WalletService::new(db.clone(), gateway.clone());
        let reconciler = PaymentReconciler::new(db.clone(), gateway);

        let state = AppState {
            db,
            config: config.clone(),
            rides,
            wallets,
            reconciler,
        };

        // Port 0 binds a random port for tests.
        let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
            .parse()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Invalid bind address: {}", e)))?;
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(port = port, "Ride service listening");

        Ok(Self {
            port,
            listener,
            state,
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Get the application state.
    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let router = build_router(self.state);
        axum::serve(self.listener, router).await
    }
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics_endpoint))
        .route("/rides", post(handlers::rides::request_ride))
        .route("/rides", get(handlers::rides::list_rides))
        .route("/rides/:ride_id", get(handlers::rides::get_ride))
        .route("/rides/:ride_id/accept", post(handlers::rides::accept_ride))
        .route("/rides/:ride_id/start", post(handlers::rides::start_ride))
        .route(
            "/rides/:ride_id/complete",
            post(handlers::rides::complete_ride),
        )
        .route("/rides/:ride_id/cancel", post(handlers::rides::cancel_ride))
        .route("/rides/:ride_id/rate", post(handlers::rides::rate_ride))
        .route("/wallet/balance", get(handlers::wallet::get_balance))
        .route(
            "/wallet/transactions",
            get(handlers::wallet::list_transactions),
        )
        .route("/wallet/provision", post(handlers::wallet::provision_wallet))
        .route("/wallet/admin/topup", post(handlers::wallet::admin_topup))
        .route(
            "/drivers/availability",
            patch(handlers::drivers::set_availability),
        )
        .route("/drivers/location", patch(handlers::drivers::set_location))
        .route("/webhooks/squad", post(handlers::webhook::squad_webhook))
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
