// FarmChain Gateway Service - HTTP entry point
// Exposes the supply chain ledger, mock blockchain, and trace views as a JSON API

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use farmchain_core::{Config, Ledger, Metrics, MockChain, Storage};
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

mod auth;
mod error;
mod handlers;

use error::ApiError;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub storage: Arc<Storage>,
    pub ledger: Arc<Ledger>,
    pub mockchain: Arc<MockChain>,
    pub metrics: Metrics,
}

impl AppState {
    /// Open storage and wire up the ledger and mock chain
    pub fn build(config: Config) -> anyhow::Result<Self> {
        let metrics = Metrics::new()?;
        let storage = Arc::new(Storage::open(&config)?);
        let ledger = Arc::new(Ledger::new(Arc::clone(&storage), metrics.clone()));
        let mockchain = Arc::new(MockChain::new(
            Arc::clone(&storage),
            config.mockchain.clone(),
            metrics.clone(),
        ));

        Ok(Self {
            config: Arc::new(config),
            storage,
            ledger,
            mockchain,
            metrics,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

// Health check endpoint
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "farmchain-gateway",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// Prometheus metrics endpoint
async fn metrics_handler(State(state): State<AppState>) -> Result<String, ApiError> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&state.metrics.registry().gather(), &mut buffer)
        .map_err(|e| {
            ApiError::Core(farmchain_core::Error::Internal(format!(
                "Failed to export metrics: {e}"
            )))
        })?;

    String::from_utf8(buffer).map_err(|e| {
        ApiError::Core(farmchain_core::Error::Internal(format!(
            "Metrics not valid UTF-8: {e}"
        )))
    })
}

/// Build the application router
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .route("/api/auth/register", post(handlers::auth::register))
        .route("/api/auth/login", post(handlers::auth::login))
        .route("/api/auth/me", get(handlers::auth::me))
        .route(
            "/api/batches",
            post(handlers::batches::create).get(handlers::batches::list),
        )
        .route(
            "/api/batches/:batch_id",
            get(handlers::batches::get).put(handlers::batches::update),
        )
        .route("/api/batches/:batch_id/trace", get(handlers::batches::trace))
        .route(
            "/api/events/:batch_id/events",
            post(handlers::events::append).get(handlers::events::list),
        )
        .route("/api/events/:batch_id/verify", post(handlers::events::verify))
        .route(
            "/api/mock/tx",
            post(handlers::mockchain::submit).get(handlers::mockchain::list),
        )
        .route("/api/mock/tx/:tx_hash", get(handlers::mockchain::status))
        .route(
            "/api/mock/tx/:tx_hash/confirm",
            post(handlers::mockchain::confirm),
        )
        .layer(cors)
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_target(false)
        .init();

    let config = Config::from_env()?;
    info!("Starting {} gateway", config.service_name);
    let bind_addr = config.http_listen_addr.clone();

    let state = AppState::build(config)?;
    let router = app(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Gateway listening on {}", bind_addr);
    info!("   POST /api/auth/register        - Register a user");
    info!("   POST /api/auth/login           - Log in");
    info!("   POST /api/batches              - Create a batch (farmer)");
    info!("   GET  /api/batches/:id/trace    - Public trace view");
    info!("   POST /api/events/:id/events    - Append a custody event");
    info!("   POST /api/mock/tx              - Submit a mock transaction");
    info!("   GET  /api/health               - Health check");
    info!("   GET  /metrics                  - Prometheus metrics");

    axum::serve(listener, router).await?;

    Ok(())
}
