//! Sync status routes

use crate::{
    AppState,
    error::Result,
    models::{RejectedList, SyncStatus},
};
use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use sigsync::FlushReport;
use tracing::info;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(status))
        .route("/flush", post(flush))
        .route("/rejected", get(rejected))
}

async fn status(State(state): State<AppState>) -> Result<Json<SyncStatus>> {
    Ok(Json(current_status(&state, None).await?))
}

/// Probe if needed and flush the outbox now
async fn flush(State(state): State<AppState>) -> Result<Json<SyncStatus>> {
    if !state.coordinator.connectivity().is_online() {
        state.coordinator.refresh_connectivity().await;
    }
    let report = state.coordinator.flush_outbox().await?;
    info!(
        "Manual flush: ran {}, {} applied, {} retained",
        report.ran, report.applied, report.retained
    );

    Ok(Json(current_status(&state, Some(report)).await?))
}

async fn rejected(State(state): State<AppState>) -> Result<Json<RejectedList>> {
    Ok(Json(RejectedList {
        entries: state.coordinator.rejected().await?,
    }))
}

async fn current_status(state: &AppState, flush: Option<FlushReport>) -> Result<SyncStatus> {
    Ok(SyncStatus {
        connectivity: state.coordinator.connectivity(),
        pending: state.coordinator.pending().await.len(),
        rejected: state.coordinator.rejected().await?.len(),
        flush,
    })
}
