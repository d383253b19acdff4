mod assessment;
mod backend_client;
mod config;
mod errors;
mod journey;
mod models;
mod persistence;
mod routes;
mod scoring;
mod state;
mod wizard;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::assessment::AssessmentService;
use crate::backend_client::BackendClient;
use crate::config::Config;
use crate::journey::ProjectTracker;
use crate::persistence::{FileStore, PersistenceSync, SyncQueue};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Assessment API v{}", env!("CARGO_PKG_VERSION"));

    // Local progress store
    let store = Arc::new(FileStore::open(&config.storage_dir)?);
    info!("Local store at {}", config.storage_dir.display());

    // Recommendations backend
    let backend = Arc::new(BackendClient::new(&config.backend_url)?);
    info!("Backend client initialized ({})", config.backend_url);

    // Background push worker
    let queue = SyncQueue::spawn(backend.clone(), config.retry_policy());

    let mut service = AssessmentService::new(PersistenceSync::new(store, queue.clone()), backend);
    service.mount().await;

    // Build app state
    let state = AppState {
        assessment: Arc::new(Mutex::new(service)),
        sync: queue,
        projects: Arc::new(ProjectTracker::new()),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the frontend host is fixed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
