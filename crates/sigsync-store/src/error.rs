//! Error types for the SQL backends

use sigsync::RemoteError;
use thiserror::Error;

/// Failures while opening a store or preparing its schema
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Invalid database URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to connect: {0}")]
    Connection(String),

    #[error("Failed to prepare schema: {0}")]
    Schema(String),

    /// No backend compiled in for the URL scheme
    #[error("Unsupported database URL scheme: {0}")]
    UnsupportedScheme(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

impl From<StoreError> for sigsync::SigsyncError {
    fn from(err: StoreError) -> Self {
        sigsync::SigsyncError::Config(err.to_string())
    }
}

/// Classify a driver error the way the sync coordinator cares about
///
/// Constraint violations can never succeed on retry and map to
/// [`RemoteError::Rejected`]; anything that looks like the database being out
/// of reach maps to a connectivity error.
#[cfg(any(feature = "sqlite", feature = "postgres"))]
pub(crate) fn remote_error(err: sqlx::Error) -> RemoteError {
    use sqlx::error::ErrorKind;

    match err {
        sqlx::Error::PoolTimedOut => RemoteError::Timeout,
        sqlx::Error::Io(e) => RemoteError::Unavailable(e.to_string()),
        sqlx::Error::Tls(e) => RemoteError::Unavailable(e.to_string()),
        sqlx::Error::PoolClosed | sqlx::Error::WorkerCrashed => {
            RemoteError::Unavailable(err.to_string())
        }
        sqlx::Error::RowNotFound => RemoteError::NotFound(err.to_string()),
        sqlx::Error::Database(db) => {
            // 28000/28P01: invalid authorization / password
            if matches!(db.code().as_deref(), Some("28000") | Some("28P01")) {
                return RemoteError::Unauthorized(db.message().to_string());
            }
            match db.kind() {
                ErrorKind::UniqueViolation
                | ErrorKind::ForeignKeyViolation
                | ErrorKind::NotNullViolation
                | ErrorKind::CheckViolation => RemoteError::Rejected(db.message().to_string()),
                _ => RemoteError::Backend(db.message().to_string()),
            }
        }
        other => RemoteError::Backend(other.to_string()),
    }
}
