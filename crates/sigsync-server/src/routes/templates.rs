//! Template management routes

use crate::{
    AppState,
    error::{ApiError, Result},
    models::SaveTemplateRequest,
    routes::{outcome_status, report},
};
use axum::{
    Json, Router,
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
};
use sigsync::{
    Action, FailureReason, Outcome, Report, TemplateName,
    document::{export_document, export_file_name},
};
use tracing::{debug, info};

/// Create template routes
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_templates).post(save_template))
        .route("/{name}", get(get_template).delete(delete_template))
        .route("/{name}/export", get(export_template))
}

/// List all templates ordered by name
async fn list_templates(State(state): State<AppState>) -> Response {
    debug!("Listing templates");
    report(Action::LoadAll, state.coordinator.load_all_templates().await)
}

/// Create or replace a template
async fn save_template(
    State(state): State<AppState>,
    Json(request): Json<SaveTemplateRequest>,
) -> Result<Response> {
    let name = TemplateName::new(request.name)?;
    info!("Saving template: {}", name);

    let outcome = state
        .coordinator
        .save_template(name, request.content, request.category, request.tags)
        .await;
    Ok(report(Action::Save, outcome))
}

async fn get_template(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Response> {
    let name = TemplateName::new(name)?;
    debug!("Getting template: {}", name);

    Ok(report(Action::Load, state.coordinator.load_template(&name).await))
}

async fn delete_template(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Response> {
    let name = TemplateName::new(name)?;
    info!("Deleting template: {}", name);

    let outcome = state.coordinator.delete_template(&name).await;
    let body = Report::<()>::status_only(Action::Delete, &outcome);
    Ok((outcome_status(&outcome), Json(body)).into_response())
}

/// Download a template as a standalone XHTML file
async fn export_template(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Response> {
    let name = TemplateName::new(name)?;
    debug!("Exporting template: {}", name);

    let record = match state.coordinator.load_template(&name).await {
        Outcome::Synced(record) | Outcome::LocalOnly(record) => record,
        Outcome::Failed(FailureReason::NotFound) => {
            return Err(ApiError::template_not_found(name.as_str()));
        }
        Outcome::Failed(FailureReason::LocalStorage(e)) => return Err(ApiError::Internal(e)),
    };

    let document = export_document(name.as_str(), &record.content);
    Ok((
        [
            (header::CONTENT_TYPE, "text/html; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, content_disposition(name.as_str())),
        ],
        document,
    )
        .into_response())
}

fn content_disposition(name: &str) -> String {
    let file_name = export_file_name(name);
    if file_name.chars().all(|c| c.is_ascii_graphic() || c == ' ') {
        format!("attachment; filename=\"{}\"", file_name)
    } else {
        format!(
            "attachment; filename*=UTF-8''{}",
            urlencoding::encode(&file_name)
        )
    }
}
