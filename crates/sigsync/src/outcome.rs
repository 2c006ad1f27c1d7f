//! Results of coordinator operations

use serde::Serialize;
use std::fmt;

use crate::error::LocalStoreError;

/// Which coordinator operation produced an [`Outcome`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Save,
    Load,
    LoadAll,
    Delete,
}

/// Why an operation produced no data
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "code", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    /// Absent from both the local cache and the remote store
    NotFound,
    /// The local tier failed; there is nothing left to fall back to
    LocalStorage(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::NotFound => f.write_str("not found"),
            FailureReason::LocalStorage(detail) => write!(f, "local storage failed: {}", detail),
        }
    }
}

impl From<LocalStoreError> for FailureReason {
    fn from(e: LocalStoreError) -> Self {
        FailureReason::LocalStorage(e.to_string())
    }
}

/// Result of a coordinator operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    /// Applied to (or read from) the remote store
    Synced(T),
    /// Served by the local cache only; writes are queued for the remote store
    LocalOnly(T),
    Failed(FailureReason),
}

impl<T> Outcome<T> {
    pub fn is_success(&self) -> bool {
        !matches!(self, Outcome::Failed(_))
    }

    pub fn is_synced(&self) -> bool {
        matches!(self, Outcome::Synced(_))
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            Outcome::Synced(data) | Outcome::LocalOnly(data) => Some(data),
            Outcome::Failed(_) => None,
        }
    }

    pub fn into_data(self) -> Option<T> {
        match self {
            Outcome::Synced(data) | Outcome::LocalOnly(data) => Some(data),
            Outcome::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        match self {
            Outcome::Failed(reason) => Some(reason),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Synced(data) => Outcome::Synced(f(data)),
            Outcome::LocalOnly(data) => Outcome::LocalOnly(f(data)),
            Outcome::Failed(reason) => Outcome::Failed(reason),
        }
    }

    /// Human readable status line for the editor
    pub fn status(&self, action: Action) -> String {
        let text = match (self, action) {
            (Outcome::Failed(FailureReason::NotFound), Action::LoadAll) => "No templates found",
            (Outcome::Failed(FailureReason::NotFound), _) => "Template not found",
            (Outcome::Failed(FailureReason::LocalStorage(detail)), _) => {
                return format!("Local storage failed: {}", detail);
            }
            (Outcome::Synced(_), Action::Save) => "Template saved",
            (Outcome::LocalOnly(_), Action::Save) => "Saved locally only",
            (Outcome::Synced(_), Action::Load) => "Template loaded",
            (Outcome::LocalOnly(_), Action::Load) => "Local version loaded",
            (Outcome::Synced(_), Action::LoadAll) => "Templates loaded",
            (Outcome::LocalOnly(_), Action::LoadAll) => "Local templates loaded",
            (Outcome::Synced(_), Action::Delete) => "Template deleted",
            (Outcome::LocalOnly(_), Action::Delete) => "Deleted locally",
        };
        text.to_string()
    }
}

/// Serializable `{success, data?, status}` view of an [`Outcome`]
#[derive(Debug, Clone, Serialize)]
pub struct Report<T> {
    pub success: bool,
    /// True when the remote store confirmed the operation
    pub synced: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<FailureReason>,
}

impl<T> Report<T> {
    pub fn new(action: Action, outcome: Outcome<T>) -> Self {
        let status = outcome.status(action);
        let success = outcome.is_success();
        let synced = outcome.is_synced();
        let reason = outcome.failure().cloned();
        Self {
            success,
            synced,
            data: outcome.into_data(),
            status,
            reason,
        }
    }
}

impl Report<()> {
    /// A report that never carries data, used for deletes
    pub fn status_only<T>(action: Action, outcome: &Outcome<T>) -> Self {
        Self {
            success: outcome.is_success(),
            synced: outcome.is_synced(),
            data: None,
            status: outcome.status(action),
            reason: outcome.failure().cloned(),
        }
    }
}
