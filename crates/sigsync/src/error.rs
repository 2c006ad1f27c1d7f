//! Error types for the sigsync library
//!
//! Errors are split by the tier they come from. Local storage failures are
//! fatal to an operation because there is no tier below the local cache.
//! Remote failures are recoverable: the coordinator falls back to local data
//! or queues the write for a later flush.

use thiserror::Error;

/// Main error type for the sigsync library
#[derive(Error, Debug)]
pub enum SigsyncError {
    /// Template-related errors (naming, construction)
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    /// Failures of the local key/value tier
    #[error("Local storage error: {0}")]
    Local(#[from] LocalStoreError),

    /// Failures of the remote table store
    #[error("Remote store error: {0}")]
    Remote(#[from] RemoteError),

    /// Configuration and initialization errors
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Template-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("Template name must not be empty")]
    EmptyName,

    #[error("Template content is required")]
    MissingContent,
}

/// Errors of the local key/value tier
///
/// Quota exhaustion surfaces as [`LocalStoreError::Io`] from the file backend.
#[derive(Error, Debug)]
pub enum LocalStoreError {
    #[error("IO error on key {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt payload under key {key}: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("Serialization failed for key {key}: {reason}")]
    Serialization { key: String, reason: String },

    #[error("Local store lock poisoned")]
    Poisoned,
}

impl LocalStoreError {
    pub fn io(key: &str, source: std::io::Error) -> Self {
        Self::Io {
            key: key.to_string(),
            source,
        }
    }

    pub fn corrupt(key: &str, reason: impl ToString) -> Self {
        Self::Corrupt {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn serialization(key: &str, reason: impl ToString) -> Self {
        Self::Serialization {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Errors reported by a remote store
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("Remote store unavailable: {0}")]
    Unavailable(String),

    #[error("Remote call timed out")]
    Timeout,

    #[error("Remote store refused credentials: {0}")]
    Unauthorized(String),

    /// The store understood the request and refused it (schema or constraint violation)
    #[error("Remote store rejected the operation: {0}")]
    Rejected(String),

    #[error("Row not found: {0}")]
    NotFound(String),

    #[error("Remote backend error: {0}")]
    Backend(String),
}

impl RemoteError {
    /// Whether retrying the same operation can never succeed
    pub fn is_permanent(&self) -> bool {
        matches!(self, RemoteError::Rejected(_))
    }

    /// Whether the store itself could not be reached
    pub fn is_connectivity(&self) -> bool {
        matches!(self, RemoteError::Unavailable(_) | RemoteError::Timeout)
    }
}

/// Result type for sigsync operations
pub type Result<T> = std::result::Result<T, SigsyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_rejections_are_permanent() {
        assert!(RemoteError::Rejected("bad column".into()).is_permanent());
        assert!(!RemoteError::Timeout.is_permanent());
        assert!(!RemoteError::Unavailable("down".into()).is_permanent());
        assert!(!RemoteError::Unauthorized("jwt expired".into()).is_permanent());
        assert!(!RemoteError::NotFound("sig1".into()).is_permanent());
    }

    #[test]
    fn test_local_error_display_names_the_key() {
        let err = LocalStoreError::corrupt("emailTemplates", "expected value at line 1");
        assert_eq!(
            err.to_string(),
            "Corrupt payload under key emailTemplates: expected value at line 1"
        );
    }
}
