use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use super::RemoteStore;
use crate::error::RemoteError;
use crate::template::{TemplateName, TemplateRecord};

/// A successful write observed by [`MemoryRemoteStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppliedOp {
    Upsert { name: String, content: String },
    Delete { name: String },
}

type UpsertHook = Box<dyn Fn(&TemplateRecord) -> TemplateRecord + Send + Sync>;

/// In-memory remote store for testing and development
///
/// Availability can be switched off to simulate a lost connection, and
/// individual names can be scripted to fail. An upsert hook stands in for
/// columns the database fills in itself.
pub struct MemoryRemoteStore {
    rows: Mutex<BTreeMap<String, TemplateRecord>>,
    online: AtomicBool,
    failures: Mutex<HashMap<String, RemoteError>>,
    applied: Mutex<Vec<AppliedOp>>,
    probes: AtomicUsize,
    on_upsert: Mutex<Option<UpsertHook>>,
}

impl Default for MemoryRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(BTreeMap::new()),
            online: AtomicBool::new(true),
            failures: Mutex::new(HashMap::new()),
            applied: Mutex::new(Vec::new()),
            probes: AtomicUsize::new(0),
            on_upsert: Mutex::new(None),
        }
    }

    /// Rewrite every upserted record before it is stored and returned
    pub fn on_upsert<F>(&self, hook: F)
    where
        F: Fn(&TemplateRecord) -> TemplateRecord + Send + Sync + 'static,
    {
        if let Ok(mut slot) = self.on_upsert.lock() {
            *slot = Some(Box::new(hook));
        }
    }

    /// Simulate connectivity loss or recovery
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Make every operation on `name` fail with `error` until cleared
    pub fn fail_for(&self, name: &str, error: RemoteError) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.insert(name.to_string(), error);
        }
    }

    pub fn clear_failure(&self, name: &str) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.remove(name);
        }
    }

    /// Rows currently stored, ordered by name
    pub fn rows(&self) -> Vec<TemplateRecord> {
        self.rows
            .lock()
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn row(&self, name: &str) -> Option<TemplateRecord> {
        self.rows.lock().ok().and_then(|rows| rows.get(name).cloned())
    }

    /// Insert a row directly, bypassing the log and failure scripting
    pub fn seed(&self, record: TemplateRecord) {
        if let Ok(mut rows) = self.rows.lock() {
            rows.insert(record.name.as_str().to_string(), record);
        }
    }

    /// Successful writes in the order they were applied
    pub fn applied(&self) -> Vec<AppliedOp> {
        self.applied
            .lock()
            .map(|applied| applied.clone())
            .unwrap_or_default()
    }

    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    fn check(&self, name: Option<&str>) -> Result<(), RemoteError> {
        if !self.online.load(Ordering::SeqCst) {
            return Err(RemoteError::Unavailable("memory store offline".into()));
        }
        if let Some(name) = name {
            let failures = self
                .failures
                .lock()
                .map_err(|_| RemoteError::Backend("Lock poisoned".into()))?;
            if let Some(error) = failures.get(name) {
                return Err(error.clone());
            }
        }
        Ok(())
    }

    fn record_applied(&self, op: AppliedOp) -> Result<(), RemoteError> {
        self.applied
            .lock()
            .map_err(|_| RemoteError::Backend("Lock poisoned".into()))?
            .push(op);
        Ok(())
    }
}

impl std::fmt::Debug for MemoryRemoteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryRemoteStore")
            .field("rows", &self.rows)
            .field("online", &self.online)
            .field("probes", &self.probes)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn probe(&self) -> Result<(), RemoteError> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        self.check(None)
    }

    async fn fetch(&self, name: &TemplateName) -> Result<Option<TemplateRecord>, RemoteError> {
        self.check(Some(name.as_str()))?;
        let rows = self
            .rows
            .lock()
            .map_err(|_| RemoteError::Backend("Lock poisoned".into()))?;
        Ok(rows.get(name.as_str()).cloned())
    }

    async fn list(&self) -> Result<Vec<TemplateRecord>, RemoteError> {
        self.check(None)?;
        let rows = self
            .rows
            .lock()
            .map_err(|_| RemoteError::Backend("Lock poisoned".into()))?;
        Ok(rows.values().cloned().collect())
    }

    async fn upsert(&self, record: &TemplateRecord) -> Result<TemplateRecord, RemoteError> {
        self.check(Some(record.name.as_str()))?;
        let stored = {
            let hook = self
                .on_upsert
                .lock()
                .map_err(|_| RemoteError::Backend("Lock poisoned".into()))?;
            match hook.as_ref() {
                Some(hook) => hook(record),
                None => record.clone(),
            }
        };
        {
            let mut rows = self
                .rows
                .lock()
                .map_err(|_| RemoteError::Backend("Lock poisoned".into()))?;
            rows.insert(stored.name.as_str().to_string(), stored.clone());
        }
        self.record_applied(AppliedOp::Upsert {
            name: record.name.as_str().to_string(),
            content: record.content.clone(),
        })?;
        Ok(stored)
    }

    async fn delete(&self, name: &TemplateName) -> Result<(), RemoteError> {
        self.check(Some(name.as_str()))?;
        {
            let mut rows = self
                .rows
                .lock()
                .map_err(|_| RemoteError::Backend("Lock poisoned".into()))?;
            rows.remove(name.as_str());
        }
        self.record_applied(AppliedOp::Delete {
            name: name.as_str().to_string(),
        })
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, content: &str) -> TemplateRecord {
        TemplateRecord::builder(name).content(content).build().unwrap()
    }

    #[tokio::test]
    async fn test_memory_remote_basic_operations() {
        let remote = MemoryRemoteStore::new();
        let sig = record("sig1", "<b>hi</b>");

        remote.probe().await.unwrap();
        remote.upsert(&sig).await.unwrap();
        remote.upsert(&record("sig1", "<b>bye</b>")).await.unwrap();

        let rows = remote.list().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].content, "<b>bye</b>");

        remote.delete(&sig.name).await.unwrap();
        remote.delete(&sig.name).await.unwrap();
        assert_eq!(remote.fetch(&sig.name).await.unwrap(), None);
        assert_eq!(remote.applied().len(), 4);
    }

    #[tokio::test]
    async fn test_offline_and_scripted_failures() {
        let remote = MemoryRemoteStore::new();
        let sig = record("sig1", "x");

        remote.set_online(false);
        assert!(matches!(
            remote.probe().await,
            Err(RemoteError::Unavailable(_))
        ));
        remote.set_online(true);

        remote.fail_for("sig1", RemoteError::Rejected("schema".into()));
        assert_eq!(
            remote.upsert(&sig).await,
            Err(RemoteError::Rejected("schema".into()))
        );
        assert!(remote.upsert(&record("sig2", "y")).await.is_ok());

        remote.clear_failure("sig1");
        assert!(remote.upsert(&sig).await.is_ok());
        assert_eq!(remote.probe_count(), 1);
    }

    #[tokio::test]
    async fn test_upsert_hook_rewrites_stored_row() {
        let remote = MemoryRemoteStore::new();
        remote.on_upsert(|record| record.clone().with_category("normalized"));

        let stored = remote.upsert(&record("sig1", "x")).await.unwrap();
        assert_eq!(stored.category, "normalized");
        assert_eq!(remote.row("sig1").unwrap().category, "normalized");
    }
}
