//! Remote table store abstraction
//!
//! The remote side is an opaque table addressed by template name. Anything
//! that can select, upsert on `name` and delete by `name` can back it; see the
//! `sigsync-store` crate for SQL implementations.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::error::RemoteError;
use crate::template::{TemplateName, TemplateRecord};

mod memory;

pub use memory::{AppliedOp, MemoryRemoteStore};

/// Remote table of template records keyed by name
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Minimal bounded read used to decide whether the store is reachable
    async fn probe(&self) -> Result<(), RemoteError>;

    /// Select the row for `name`
    async fn fetch(&self, name: &TemplateName) -> Result<Option<TemplateRecord>, RemoteError>;

    /// Select every row, ordered by name
    async fn list(&self) -> Result<Vec<TemplateRecord>, RemoteError>;

    /// Insert or update the row keyed on `record.name`, returning the stored row
    async fn upsert(&self, record: &TemplateRecord) -> Result<TemplateRecord, RemoteError>;

    /// Delete the row for `name`; deleting a missing row succeeds
    async fn delete(&self, name: &TemplateName) -> Result<(), RemoteError>;

    /// Backend name for logs
    fn backend(&self) -> &'static str;
}

pub type SharedRemote = Arc<dyn RemoteStore>;

/// Create the handshake pair through which a remote client is handed over
/// once it has been constructed
pub fn remote_channel() -> (RemoteProvider, RemoteReadiness) {
    let (tx, rx) = watch::channel(None);
    (RemoteProvider { tx }, RemoteReadiness { rx })
}

/// Sending half of the remote handshake
#[derive(Debug)]
pub struct RemoteProvider {
    tx: watch::Sender<Option<SharedRemote>>,
}

impl RemoteProvider {
    /// Publish the remote client to whoever awaits readiness
    pub fn provide(self, remote: SharedRemote) {
        // No receiver left means the coordinator is gone; nothing to hand over
        let _ = self.tx.send(Some(remote));
    }
}

/// Receiving half of the remote handshake
#[derive(Debug, Clone)]
pub struct RemoteReadiness {
    rx: watch::Receiver<Option<SharedRemote>>,
}

impl RemoteReadiness {
    /// A remote that is available immediately
    pub fn ready(remote: SharedRemote) -> Self {
        let (tx, rx) = watch::channel(Some(remote));
        drop(tx);
        Self { rx }
    }

    /// No remote at all; the coordinator stays offline
    pub fn unavailable() -> Self {
        let (tx, rx) = watch::channel(None);
        drop(tx);
        Self { rx }
    }

    /// Wait for the remote client, giving up after `timeout` or when the
    /// provider is dropped without publishing one
    pub async fn wait(mut self, timeout: Duration) -> Option<SharedRemote> {
        let ready = tokio::time::timeout(timeout, self.rx.wait_for(Option::is_some)).await;
        match ready {
            Ok(Ok(remote)) => remote.clone(),
            _ => None,
        }
    }
}

impl std::fmt::Debug for dyn RemoteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RemoteStore({})", self.backend())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ready_resolves_immediately() {
        let remote: SharedRemote = Arc::new(MemoryRemoteStore::new());
        let readiness = RemoteReadiness::ready(remote);
        assert!(readiness.wait(Duration::from_millis(10)).await.is_some());
    }

    #[tokio::test]
    async fn test_unavailable_resolves_to_none_without_waiting() {
        let readiness = RemoteReadiness::unavailable();
        assert!(readiness.wait(Duration::from_secs(3600)).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_provider_is_awaited() {
        let (provider, readiness) = remote_channel();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1500)).await;
            provider.provide(Arc::new(MemoryRemoteStore::new()));
        });

        let remote = readiness.wait(Duration::from_secs(5)).await;
        assert_eq!(remote.map(|r| r.backend()), Some("memory"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_times_out() {
        let (_provider, readiness) = remote_channel();
        assert!(readiness.wait(Duration::from_secs(5)).await.is_none());
    }
}
