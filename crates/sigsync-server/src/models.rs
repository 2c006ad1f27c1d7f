//! API models for requests and responses

use serde::{Deserialize, Serialize};
use sigsync::{Connectivity, FlushReport, RejectedEntry};

/// Body of `POST /api/templates`
#[derive(Debug, Deserialize)]
pub struct SaveTemplateRequest {
    pub name: String,
    pub content: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Body of `POST /api/preview`
#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    pub content: String,
}

/// Markup a new signature starts from
#[derive(Debug, Serialize)]
pub struct StarterTemplate {
    pub content: &'static str,
}

/// Sync state shown next to the editor
#[derive(Debug, Serialize)]
pub struct SyncStatus {
    pub connectivity: Connectivity,
    pub pending: usize,
    pub rejected: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flush: Option<FlushReport>,
}

/// Dead-lettered outbox entries
#[derive(Debug, Serialize)]
pub struct RejectedList {
    pub entries: Vec<RejectedEntry>,
}
