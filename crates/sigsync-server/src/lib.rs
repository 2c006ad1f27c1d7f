//! Sigsync HTTP API Server
//!
//! Serves the signature editor front end and a JSON API over the offline-first
//! sync coordinator. Template operations always answer from the local tier
//! when the remote store is away; the response says whether the change was
//! synced.

use axum::{Router, extract::DefaultBodyLimit, response::Json, routing::get};
use serde_json::{Value, json};
use sigsync::{FileKeyValueStore, SyncCoordinator};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

pub mod config;
pub mod error;
pub mod models;
pub mod routes;

pub use config::ServerConfig;
pub use error::{ApiError, Result};

/// Coordinator over the on-disk local tier
pub type Coordinator = SyncCoordinator<FileKeyValueStore>;

/// Main application state
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<Coordinator>,
    pub config: ServerConfig,
}

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    let static_files = ServeDir::new(&state.config.static_dir);

    Router::new()
        // Health check
        .route("/health", get(health_check))
        // API routes
        .nest("/api", api_routes())
        // Editor front end
        .fallback_service(static_files)
        // Middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(DefaultBodyLimit::max(2 * 1024 * 1024)), // inline images make signatures large
        )
        .with_state(state)
}

/// API routes
fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/templates", routes::templates::router())
        .nest("/preview", routes::preview::router())
        .nest("/sync", routes::sync::router())
}

/// Health check endpoint
async fn health_check() -> Result<Json<Value>> {
    Ok(Json(json!({
        "status": "healthy",
        "service": "sigsync-server",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": time::OffsetDateTime::now_utc()
    })))
}
