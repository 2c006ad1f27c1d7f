//! Sigsync keeps email signature templates in a local cache and mirrors every
//! change to a remote table store, queueing writes in a durable outbox while
//! the store is out of reach.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sigsync::{MemoryKeyValueStore, MemoryRemoteStore, RemoteReadiness, SyncConfig, SyncCoordinator, TemplateName};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let remote = Arc::new(MemoryRemoteStore::new());
//! let coordinator = SyncCoordinator::create(
//!     MemoryKeyValueStore::new(),
//!     RemoteReadiness::ready(remote),
//!     SyncConfig::default(),
//! )
//! .await?;
//! coordinator.spawn_flush_worker();
//!
//! let outcome = coordinator
//!     .save_template(TemplateName::new("work")?, "<b>Regards</b>", None, vec![])
//!     .await;
//! println!("{}", outcome.status(sigsync::Action::Save));
//!
//! coordinator.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod connectivity;
pub mod coordinator;
pub mod document;
pub mod error;
pub mod outbox;
pub mod outcome;
pub mod remote;
pub mod storage;
pub mod template;
mod worker;

pub use cache::LocalCache;
pub use config::SyncConfig;
pub use connectivity::Connectivity;
pub use coordinator::{EntryOutcome, FlushReport, SyncCoordinator};
pub use error::{LocalStoreError, RemoteError, Result, SigsyncError, TemplateError};
pub use outbox::{Operation, Outbox, OutboxEntry, RejectedEntry};
pub use outcome::{Action, FailureReason, Outcome, Report};
pub use remote::{
    AppliedOp, MemoryRemoteStore, RemoteProvider, RemoteReadiness, RemoteStore, SharedRemote,
    remote_channel,
};
pub use storage::{KeyValueStore, MemoryKeyValueStore};
pub use template::{DEFAULT_CATEGORY, TemplateBuilder, TemplateName, TemplateRecord};

#[cfg(feature = "fs")]
pub use storage::FileKeyValueStore;

/// Get the library version
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
