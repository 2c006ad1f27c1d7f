//! HTTP route handlers

pub mod preview;
pub mod sync;
pub mod templates;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use sigsync::{Action, FailureReason, Outcome, Report};

/// HTTP status matching an operation outcome
pub(crate) fn outcome_status<T>(outcome: &Outcome<T>) -> StatusCode {
    match outcome.failure() {
        None => StatusCode::OK,
        Some(FailureReason::NotFound) => StatusCode::NOT_FOUND,
        Some(FailureReason::LocalStorage(_)) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Render an outcome as a `Report` body with the matching status code
pub(crate) fn report<T: Serialize>(action: Action, outcome: Outcome<T>) -> Response {
    let status = outcome_status(&outcome);
    (status, Json(Report::new(action, outcome))).into_response()
}
