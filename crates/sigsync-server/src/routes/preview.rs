//! Preview routes

use crate::{
    AppState,
    models::{PreviewRequest, StarterTemplate},
};
use axum::{
    Json, Router,
    response::Html,
    routing::{get, post},
};
use sigsync::document::{DEFAULT_TEMPLATE, preview_document};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(preview))
        .route("/starter", get(starter))
}

/// Wrap editor content for the preview pane
async fn preview(Json(request): Json<PreviewRequest>) -> Html<String> {
    Html(preview_document(&request.content))
}

async fn starter() -> Json<StarterTemplate> {
    Json(StarterTemplate {
        content: DEFAULT_TEMPLATE,
    })
}
