//! Pose Cloud Backend Server
//!
//! Serves pose-category predictions from the active classifier and lets
//! the classifier be hot-swapped at runtime without downtime.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                       POSE CLOUD                           │
//! ├────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐   ┌──────────────┐   ┌───────────────────┐  │
//! │  │  API      │   │  Engine      │   │  Version Registry │  │
//! │  │  Gateway  │──▶│  (features + │◀──│  + History Ledger │  │
//! │  │  (Axum)   │   │  model slot) │   │  (SQLite)         │  │
//! │  └───────────┘   └──────────────┘   └───────────────────┘  │
//! └────────────────────────────────────────────────────────────┘
//! ```

mod config;
mod db;
mod engine;
mod error;
mod handlers;
mod models;

use anyhow::Context;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use engine::artifact::{ArtifactLoader, DiskArtifactStore};
use engine::ActiveSlot;

pub use error::{AppError, AppResult};

/// Uploaded model artifacts can run to tens of megabytes.
const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = config::Config::from_env();

    // Initialize logging
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "pose_cloud=debug,tower_http=debug".into());
    if config.is_production() {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!("Pose Cloud Server starting...");

    // Initialize database pool
    let pool = db::create_pool(&config.database_url)
        .await
        .context("failed to create database pool")?;

    // Run migrations
    tracing::info!("Running database migrations...");
    db::run_migrations(&pool)
        .await
        .context("failed to run migrations")?;

    let artifacts = Arc::new(
        DiskArtifactStore::new(&config.model_dir).context("failed to prepare model directory")?,
    );
    let slot = Arc::new(ActiveSlot::empty());

    // Seed the serving slot from the latest recorded version, if any.
    match models::ModelVersion::latest(&pool)
        .await
        .context("failed to query latest model version")?
    {
        Some(version) => {
            let loader: Arc<dyn ArtifactLoader> = artifacts.clone();
            match engine::swap::activate(&slot, loader, version.activation_spec()).await {
                Ok(()) => tracing::info!("serving model version {}", version.id),
                Err(e) => tracing::warn!(
                    "startup activation of version {} failed: {e}; predictions unavailable until the next successful upgrade",
                    version.id
                ),
            }
        }
        None => tracing::warn!(
            "no model versions recorded; predictions unavailable until the first upload"
        ),
    }

    // Build application state
    let state = AppState {
        pool,
        config: config.clone(),
        engine: slot,
        artifacts,
    };

    // Build router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("failed to bind listen address")?;
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pool: sqlx::SqlitePool,
    pub config: config::Config,
    pub engine: Arc<ActiveSlot>,
    pub artifacts: Arc<DiskArtifactStore>,
}

/// Create the main router with all routes
fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::check))
        .route("/api/v1/predict", post(handlers::predict::predict))
        .route("/api/v1/model/update", post(handlers::model::update))
        .route("/api/v1/model/current", get(handlers::model::current))
        .route("/api/v1/history", get(handlers::history::list))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
