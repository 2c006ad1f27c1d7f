//! Sigsync server binary

use sigsync::{FileKeyValueStore, SyncConfig, SyncCoordinator, remote_channel};
use sigsync_server::{ApiError, AppState, Result, ServerConfig, create_router};
use std::net::SocketAddr;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "sigsync_server=debug,sigsync=debug,tower_http=debug".to_string()),
        )
        .init();

    // Load configuration
    let config = ServerConfig::from_env()?;
    let sync_config = SyncConfig::from_env()?;
    info!("Starting Sigsync Server on {}", config.bind_address());

    let local = FileKeyValueStore::new(&config.data_dir)?;
    info!("Local templates stored in {}", config.data_dir.display());

    // The remote client is handed over once connected; the coordinator waits
    // for it up to the configured ready timeout
    let (provider, readiness) = remote_channel();
    match config.database_url.clone() {
        Some(database_url) => {
            tokio::spawn(async move {
                match sigsync_store::connect(&database_url).await {
                    Ok(store) => provider.provide(store),
                    Err(e) => error!("Remote store unavailable, running local-only: {}", e),
                }
            });
        }
        None => {
            info!("DATABASE_URL not set, running local-only");
            drop(provider);
        }
    }

    let coordinator = SyncCoordinator::create(local, readiness, sync_config).await?;
    coordinator.spawn_flush_worker();

    let state = AppState {
        coordinator: coordinator.clone(),
        config: config.clone(),
    };
    let app = create_router(state);

    // Start server
    let addr: SocketAddr = config
        .bind_address()
        .parse()
        .map_err(|_| ApiError::Config(format!("Invalid HOST value: {}", config.host)))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    coordinator.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
