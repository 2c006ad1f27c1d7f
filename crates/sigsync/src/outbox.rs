//! Durable FIFO of remote operations waiting to be applied
//!
//! The queue is loaded once when opened and written back whole on every
//! change, so a restart resumes with the same entries in the same order.
//! Entries that a remote store refuses for good are moved to a separate
//! rejected list instead of being retried forever.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::LocalStoreError;
use crate::storage::KeyValueStore;
use crate::template::{TemplateName, TemplateRecord};

/// Storage key of the pending queue
pub const OUTBOX_KEY: &str = "emailTemplatesOutbox";

/// Storage key of entries dropped after a permanent remote error
pub const REJECTED_KEY: &str = "emailTemplatesRejected";

/// A remote operation to replay
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "action", content = "data", rename_all = "lowercase")]
pub enum Operation {
    /// Upsert the record keyed on its name
    Save(TemplateRecord),
    /// Delete by name
    Delete { name: TemplateName },
}

impl Operation {
    pub fn name(&self) -> &TemplateName {
        match self {
            Operation::Save(record) => &record.name,
            Operation::Delete { name } => name,
        }
    }

    pub fn action(&self) -> &'static str {
        match self {
            Operation::Save(_) => "save",
            Operation::Delete { .. } => "delete",
        }
    }
}

/// One queued operation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutboxEntry {
    #[serde(flatten)]
    pub operation: Operation,

    /// When the entry was queued
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,

    /// Failed application attempts so far
    #[serde(default)]
    pub attempts: u32,
}

impl OutboxEntry {
    pub fn new(operation: Operation) -> Self {
        Self {
            operation,
            timestamp: OffsetDateTime::now_utc(),
            attempts: 0,
        }
    }

    pub fn save(record: TemplateRecord) -> Self {
        Self::new(Operation::Save(record))
    }

    pub fn delete(name: TemplateName) -> Self {
        Self::new(Operation::Delete { name })
    }
}

/// An entry removed from the queue after a permanent remote error
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RejectedEntry {
    pub entry: OutboxEntry,
    pub reason: String,
    #[serde(with = "time::serde::rfc3339")]
    pub rejected_at: OffsetDateTime,
}

/// Persistent outbox backed by a [`KeyValueStore`]
#[derive(Debug)]
pub struct Outbox<S: KeyValueStore> {
    store: S,
    entries: Vec<OutboxEntry>,
}

impl<S: KeyValueStore> Outbox<S> {
    /// Load the queue persisted in `store`, or start empty
    pub fn open(store: S) -> Result<Self, LocalStoreError> {
        let entries = load_list(&store, OUTBOX_KEY)?;
        Ok(Self { store, entries })
    }

    /// Append an entry and persist the queue
    pub fn push(&mut self, entry: OutboxEntry) -> Result<(), LocalStoreError> {
        self.entries.push(entry);
        if let Err(e) = self.persist() {
            self.entries.pop();
            return Err(e);
        }
        Ok(())
    }

    /// Take every entry out of the queue without persisting
    ///
    /// Callers hand the survivors back through [`Outbox::replace`].
    pub fn drain(&mut self) -> Vec<OutboxEntry> {
        std::mem::take(&mut self.entries)
    }

    /// Swap in a new queue and persist it
    pub fn replace(&mut self, entries: Vec<OutboxEntry>) -> Result<(), LocalStoreError> {
        self.entries = entries;
        self.persist()
    }

    pub fn entries(&self) -> &[OutboxEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether any queued operation targets `name`
    pub fn has_pending(&self, name: &TemplateName) -> bool {
        self.entries.iter().any(|e| e.operation.name() == name)
    }

    /// The most recent queued operation for `name`
    pub fn latest_for(&self, name: &TemplateName) -> Option<&Operation> {
        self.entries
            .iter()
            .rev()
            .map(|e| &e.operation)
            .find(|op| op.name() == name)
    }

    /// Record permanently refused entries
    pub fn reject(&self, rejected: Vec<RejectedEntry>) -> Result<(), LocalStoreError> {
        if rejected.is_empty() {
            return Ok(());
        }
        let mut all: Vec<RejectedEntry> = load_list(&self.store, REJECTED_KEY)?;
        all.extend(rejected);
        store_list(&self.store, REJECTED_KEY, &all)
    }

    pub fn rejected(&self) -> Result<Vec<RejectedEntry>, LocalStoreError> {
        load_list(&self.store, REJECTED_KEY)
    }

    fn persist(&self) -> Result<(), LocalStoreError> {
        store_list(&self.store, OUTBOX_KEY, &self.entries)
    }
}

fn load_list<S, T>(store: &S, key: &str) -> Result<Vec<T>, LocalStoreError>
where
    S: KeyValueStore,
    T: for<'de> Deserialize<'de>,
{
    match store.get(key)? {
        Some(payload) => {
            serde_json::from_str(&payload).map_err(|e| LocalStoreError::corrupt(key, e))
        }
        None => Ok(Vec::new()),
    }
}

fn store_list<S, T>(store: &S, key: &str, items: &[T]) -> Result<(), LocalStoreError>
where
    S: KeyValueStore,
    T: Serialize,
{
    let payload =
        serde_json::to_string(items).map_err(|e| LocalStoreError::serialization(key, e))?;
    store.set(key, &payload)
}
