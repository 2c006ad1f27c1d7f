//! # Sigsync Store
//!
//! SQL implementations of the sigsync [`RemoteStore`]. Each backend owns a
//! single `templates` table keyed by template name:
//!
//! | column       | meaning                          |
//! |--------------|----------------------------------|
//! | `name`       | primary key, upsert target       |
//! | `content`    | signature markup                 |
//! | `category`   | free-form grouping               |
//! | `tags`       | list of labels                   |
//! | `updated_at` | last local modification          |
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use sigsync::{RemoteStore, TemplateRecord};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = sigsync_store::connect("sqlite:./data/sigsync.db").await?;
//! store.probe().await?;
//!
//! let record = TemplateRecord::builder("work").content("<b>Regards</b>").build()?;
//! store.upsert(&record).await?;
//! # Ok(())
//! # }
//! ```

pub mod error;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use error::{Result, StoreError};
pub use sigsync::RemoteStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteTemplateStore;

#[cfg(feature = "postgres")]
pub use postgres::PostgresTemplateStore;

use sigsync::SharedRemote;
use std::sync::Arc;
use tracing::info;

/// Open the backend matching the scheme of `database_url`
pub async fn connect(database_url: &str) -> Result<SharedRemote> {
    let scheme = database_url
        .split_once(':')
        .map(|(scheme, _)| scheme)
        .ok_or_else(|| StoreError::InvalidUrl(database_url.to_string()))?;

    let store: SharedRemote = match scheme {
        #[cfg(feature = "sqlite")]
        "sqlite" => Arc::new(SqliteTemplateStore::new(database_url).await?),
        #[cfg(feature = "postgres")]
        "postgres" | "postgresql" => Arc::new(PostgresTemplateStore::from_url(database_url).await?),
        other => return Err(StoreError::UnsupportedScheme(other.to_string())),
    };

    info!("Connected to {} remote store", store.backend());
    Ok(store)
}
