//! Sync coordinator: local-first writes mirrored to the remote store
//!
//! Every mutation is written to the local cache and appended to the outbox
//! before the remote store is touched, so a crash or a lost connection never
//! drops a write. When the remote store is reachable the outbox is flushed
//! right away; otherwise the entry waits for the background flush.
//!
//! All state changes go through one async mutex. Remote calls happen while it
//! is held, which keeps the outbox FIFO and the cache read-modify-write
//! sequences single-writer. Probes are the exception: once offline, a user
//! operation only schedules a probe in the background and carries on.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, Weak};

use serde::Serialize;
use time::OffsetDateTime;
use tokio::sync::{Mutex, watch};
use tracing::{debug, error, info, warn};

use crate::cache::LocalCache;
use crate::config::SyncConfig;
use crate::connectivity::{self, Connectivity};
use crate::error::{LocalStoreError, RemoteError, Result};
use crate::outbox::{Operation, Outbox, OutboxEntry, RejectedEntry};
use crate::outcome::{FailureReason, Outcome};
use crate::remote::{RemoteReadiness, SharedRemote};
use crate::storage::KeyValueStore;
use crate::template::{TemplateName, TemplateRecord};
use crate::worker::FlushWorker;

/// What happened to one outbox entry during a flush pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryOutcome {
    /// Applied remotely; carries the stored row for saves
    Applied(Option<TemplateRecord>),
    /// Kept for the next pass
    Retained,
    /// Moved to the rejected list after a permanent error
    Rejected,
}

/// Summary of a flush pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FlushReport {
    /// False when the pass was skipped because the store is not online
    pub ran: bool,
    pub applied: usize,
    pub retained: usize,
    pub rejected: usize,
    #[serde(skip)]
    outcomes: Vec<EntryOutcome>,
}

impl FlushReport {
    fn skipped() -> Self {
        Self::default()
    }

    /// Per-entry results, in the order the entries were queued
    pub fn outcomes(&self) -> &[EntryOutcome] {
        &self.outcomes
    }
}

struct State<S: KeyValueStore> {
    cache: LocalCache<Arc<S>>,
    outbox: Outbox<Arc<S>>,
}

/// Offline-first template storage with an outbox mirrored to a remote store
pub struct SyncCoordinator<S: KeyValueStore> {
    state: Mutex<State<S>>,
    remote: Option<SharedRemote>,
    connectivity: watch::Sender<Connectivity>,
    config: SyncConfig,
    worker: StdMutex<Option<FlushWorker>>,
    reprobing: AtomicBool,
    me: Weak<Self>,
}

impl<S: KeyValueStore> SyncCoordinator<S> {
    /// Open the local tier, wait for the remote client and probe it once
    ///
    /// The remote handshake is bounded by `ready_timeout` and the probe by
    /// `probe_attempts`; if either gives up the coordinator starts offline.
    pub async fn create(
        local: S,
        readiness: RemoteReadiness,
        config: SyncConfig,
    ) -> Result<Arc<Self>> {
        let local = Arc::new(local);
        let outbox = Outbox::open(local.clone())?;
        let cache = LocalCache::new(local);

        if !outbox.is_empty() {
            info!("Resuming with {} queued remote operation(s)", outbox.len());
        }

        let remote = readiness.wait(config.ready_timeout).await;
        let initial = match &remote {
            Some(remote) => {
                connectivity::probe_with_retry(
                    remote.as_ref(),
                    config.probe_attempts,
                    config.probe_interval,
                    config.probe_timeout,
                )
                .await
            }
            None => {
                warn!("No remote store became available, running local-only");
                Connectivity::Offline
            }
        };
        info!("Sync coordinator ready, connectivity: {}", initial);

        let (connectivity, _) = watch::channel(initial);
        Ok(Arc::new_cyclic(|me| Self {
            state: Mutex::new(State { cache, outbox }),
            remote,
            connectivity,
            config,
            worker: StdMutex::new(None),
            reprobing: AtomicBool::new(false),
            me: me.clone(),
        }))
    }

    /// Last known connectivity, without probing
    pub fn connectivity(&self) -> Connectivity {
        *self.connectivity.borrow()
    }

    /// Observe connectivity changes, e.g. to drive a status indicator
    pub fn subscribe(&self) -> watch::Receiver<Connectivity> {
        self.connectivity.subscribe()
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Snapshot of the queued operations
    pub async fn pending(&self) -> Vec<OutboxEntry> {
        self.state.lock().await.outbox.entries().to_vec()
    }

    /// Entries dropped after a permanent remote error
    pub async fn rejected(&self) -> Result<Vec<RejectedEntry>> {
        Ok(self.state.lock().await.outbox.rejected()?)
    }

    /// Probe the remote store now, regardless of the last known state
    pub async fn refresh_connectivity(&self) -> Connectivity {
        let state = match &self.remote {
            Some(remote) => connectivity::probe(remote.as_ref(), self.config.probe_timeout).await,
            None => Connectivity::Offline,
        };
        self.set_connectivity(state);
        state
    }

    /// Save a template locally and mirror it to the remote store
    ///
    /// Never fails because of the remote side: the result is
    /// [`Outcome::LocalOnly`] when the remote write did not happen now.
    pub async fn save_template(
        &self,
        name: TemplateName,
        content: impl Into<String>,
        category: Option<String>,
        tags: Vec<String>,
    ) -> Outcome<TemplateRecord> {
        let mut record = TemplateRecord::new(name, content).with_tags(tags);
        if let Some(category) = category {
            record = record.with_category(category);
        }
        debug!("Saving template {}", record.name);

        let mut state = self.state.lock().await;
        let previous = match state.cache.get(&record.name) {
            Ok(previous) => previous,
            Err(e) => {
                error!("Failed to read template {} locally: {}", record.name, e);
                return Outcome::Failed(e.into());
            }
        };
        if let Err(e) = state.cache.put(&record.name, &record) {
            error!("Failed to save template {} locally: {}", record.name, e);
            return Outcome::Failed(e.into());
        }
        if let Err(e) = state.outbox.push(OutboxEntry::save(record.clone())) {
            error!("Failed to queue template {}: {}", record.name, e);
            restore_cached(&state, &record.name, previous);
            return Outcome::Failed(e.into());
        }

        if self.check_connection().await.is_online() {
            match self.flush_locked(&mut state).await {
                Ok(report) => {
                    if let Some(EntryOutcome::Applied(Some(stored))) = report.outcomes.last() {
                        return Outcome::Synced(stored.clone());
                    }
                }
                Err(e) => return Outcome::Failed(e.into()),
            }
        }

        warn!("Template {} saved locally only", record.name);
        Outcome::LocalOnly(record)
    }

    /// Load one template, preferring a fresh remote copy
    pub async fn load_template(&self, name: &TemplateName) -> Outcome<TemplateRecord> {
        let state = self.state.lock().await;
        let local = match state.cache.get(name) {
            Ok(local) => local,
            Err(e) => {
                error!("Failed to read template {} locally: {}", name, e);
                return Outcome::Failed(e.into());
            }
        };

        // A queued operation means the local copy is newer than the remote one
        if !state.outbox.has_pending(name) && self.check_connection().await.is_online() {
            if let Some(remote) = &self.remote {
                match remote.fetch(name).await {
                    Ok(Some(record)) => {
                        if let Err(e) = state.cache.put(name, &record) {
                            warn!("Failed to refresh local copy of {}: {}", name, e);
                        }
                        return Outcome::Synced(record);
                    }
                    Ok(None) => debug!("Template {} not in remote store", name),
                    Err(e) => self.remote_failed("load", &e),
                }
            }
        }

        match local {
            Some(record) => Outcome::LocalOnly(record),
            None => Outcome::Failed(FailureReason::NotFound),
        }
    }

    /// Load every template, preferring the remote list ordered by name
    pub async fn load_all_templates(&self) -> Outcome<Vec<TemplateRecord>> {
        let state = self.state.lock().await;

        if self.check_connection().await.is_online() {
            if let Some(remote) = &self.remote {
                match remote.list().await {
                    Ok(rows) => match merge_remote_rows(&state, rows) {
                        Ok(merged) => return Outcome::Synced(merged),
                        Err(e) => {
                            error!("Failed to refresh local templates: {}", e);
                            return Outcome::Failed(e.into());
                        }
                    },
                    Err(e) => self.remote_failed("list", &e),
                }
            }
        }

        match state.cache.get_all() {
            Ok(records) => Outcome::LocalOnly(records),
            Err(e) => {
                error!("Failed to read local templates: {}", e);
                Outcome::Failed(e.into())
            }
        }
    }

    /// Delete a template locally and mirror the delete remotely
    pub async fn delete_template(&self, name: &TemplateName) -> Outcome<()> {
        debug!("Deleting template {}", name);

        let mut state = self.state.lock().await;
        let previous = match state.cache.get(name) {
            Ok(previous) => previous,
            Err(e) => {
                error!("Failed to read template {} locally: {}", name, e);
                return Outcome::Failed(e.into());
            }
        };
        if let Err(e) = state.cache.remove(name) {
            error!("Failed to delete template {} locally: {}", name, e);
            return Outcome::Failed(e.into());
        }
        if let Err(e) = state.outbox.push(OutboxEntry::delete(name.clone())) {
            error!("Failed to queue delete of {}: {}", name, e);
            restore_cached(&state, name, previous);
            return Outcome::Failed(e.into());
        }

        if self.check_connection().await.is_online() {
            match self.flush_locked(&mut state).await {
                Ok(report) => {
                    if let Some(EntryOutcome::Applied(_)) = report.outcomes.last() {
                        return Outcome::Synced(());
                    }
                }
                Err(e) => return Outcome::Failed(e.into()),
            }
        }

        warn!("Template {} deleted locally only", name);
        Outcome::LocalOnly(())
    }

    /// Apply queued operations in FIFO order
    ///
    /// Only runs when the last known connectivity is online. Entries that fail
    /// stay queued in their original order and block later entries for the
    /// same template name, so a name never sees an older write applied after a
    /// newer one.
    pub async fn flush_outbox(&self) -> Result<FlushReport> {
        if !self.connectivity().is_online() {
            return Ok(FlushReport::skipped());
        }
        let mut state = self.state.lock().await;
        Ok(self.flush_locked(&mut state).await?)
    }

    /// Flush only when there is something queued and the store is online
    pub(crate) async fn flush_if_pending(&self) -> Result<Option<FlushReport>> {
        if !self.connectivity().is_online() {
            return Ok(None);
        }
        let mut state = self.state.lock().await;
        if state.outbox.is_empty() {
            return Ok(None);
        }
        Ok(Some(self.flush_locked(&mut state).await?))
    }

    /// Start the periodic background flush
    pub fn spawn_flush_worker(self: &Arc<Self>) {
        let mut worker = match self.worker.lock() {
            Ok(worker) => worker,
            Err(poisoned) => poisoned.into_inner(),
        };
        if worker.is_none() {
            *worker = Some(FlushWorker::spawn(
                Arc::downgrade(self),
                self.config.flush_interval,
            ));
        }
    }

    /// Stop the background flush and wait for it to finish
    pub async fn shutdown(&self) {
        let worker = match self.worker.lock() {
            Ok(mut worker) => worker.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(worker) = worker {
            worker.stop().await;
        }
        let state = self.state.lock().await;
        info!(
            "Sync coordinator stopped with {} queued operation(s)",
            state.outbox.len()
        );
    }

    /// Connectivity for a user operation
    ///
    /// Only an uninitialized state is probed inline. Offline is reported as
    /// is, with a probe scheduled in the background.
    async fn check_connection(&self) -> Connectivity {
        match self.connectivity() {
            Connectivity::Online => Connectivity::Online,
            Connectivity::Offline => {
                self.schedule_reprobe();
                Connectivity::Offline
            }
            Connectivity::Uninitialized => self.refresh_connectivity().await,
        }
    }

    /// Probe the remote store in a background task, at most one at a time
    ///
    /// A successful probe marks the coordinator online and flushes the
    /// outbox. A failed one leaves the state alone.
    fn schedule_reprobe(&self) {
        let Some(remote) = self.remote.clone() else {
            return;
        };
        if self.reprobing.swap(true, Ordering::AcqRel) {
            return;
        }

        let coordinator = self.me.clone();
        let timeout = self.config.probe_timeout;
        tokio::spawn(async move {
            let state = connectivity::probe(remote.as_ref(), timeout).await;
            let Some(coordinator) = coordinator.upgrade() else {
                return;
            };
            if state.is_online() {
                coordinator.resume_online().await;
            }
            coordinator.reprobing.store(false, Ordering::Release);
        });
    }

    async fn resume_online(&self) {
        let mut state = self.state.lock().await;
        self.set_connectivity(Connectivity::Online);
        if state.outbox.is_empty() {
            return;
        }
        if let Err(e) = self.flush_locked(&mut state).await {
            error!("Failed to flush outbox after reconnecting: {}", e);
        }
    }

    fn set_connectivity(&self, state: Connectivity) {
        let previous = self.connectivity.send_replace(state);
        if previous != state {
            info!("Connectivity changed: {} -> {}", previous, state);
        }
    }

    fn remote_failed(&self, operation: &str, e: &RemoteError) {
        warn!("Remote {} failed: {}", operation, e);
        if e.is_connectivity() {
            self.set_connectivity(Connectivity::Offline);
        }
    }

    async fn flush_locked(
        &self,
        state: &mut State<S>,
    ) -> std::result::Result<FlushReport, LocalStoreError> {
        let Some(remote) = &self.remote else {
            return Ok(FlushReport::skipped());
        };

        let entries = state.outbox.drain();
        let last_index: HashMap<TemplateName, usize> = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.operation.name().clone(), i))
            .collect();

        let mut report = FlushReport {
            ran: true,
            ..FlushReport::default()
        };
        let mut retained = Vec::new();
        let mut rejected = Vec::new();
        let mut blocked: HashSet<TemplateName> = HashSet::new();
        let mut unreachable = false;

        for (index, mut entry) in entries.into_iter().enumerate() {
            let name = entry.operation.name().clone();
            if unreachable || blocked.contains(&name) {
                retained.push((index, entry));
                report.outcomes.push(EntryOutcome::Retained);
                continue;
            }

            match apply(remote.as_ref(), &entry.operation).await {
                Ok(stored) => {
                    debug!("Applied queued {} of {}", entry.operation.action(), name);
                    // Write back remote-confirmed fields unless a later entry supersedes them
                    if let Some(stored) = &stored {
                        if last_index.get(&name) == Some(&index) {
                            if let Err(e) = state.cache.put(&name, stored) {
                                warn!("Failed to write back confirmed {}: {}", name, e);
                            }
                        }
                    }
                    report.applied += 1;
                    report.outcomes.push(EntryOutcome::Applied(stored));
                }
                Err(e) if e.is_permanent() => {
                    warn!(
                        "Dropping queued {} of {} after permanent error: {}",
                        entry.operation.action(),
                        name,
                        e
                    );
                    entry.attempts += 1;
                    rejected.push((
                        index,
                        RejectedEntry {
                            entry,
                            reason: e.to_string(),
                            rejected_at: OffsetDateTime::now_utc(),
                        },
                    ));
                    report.rejected += 1;
                    report.outcomes.push(EntryOutcome::Rejected);
                }
                Err(e) => {
                    warn!(
                        "Queued {} of {} failed, keeping it for retry: {}",
                        entry.operation.action(),
                        name,
                        e
                    );
                    if e.is_connectivity() {
                        self.set_connectivity(Connectivity::Offline);
                        unreachable = true;
                    }
                    entry.attempts += 1;
                    blocked.insert(name);
                    retained.push((index, entry));
                    report.outcomes.push(EntryOutcome::Retained);
                }
            }
        }

        // The rejected list is written before the outbox shrinks; if it
        // cannot be written the entries stay queued instead
        if !rejected.is_empty() {
            let dead: Vec<RejectedEntry> = rejected.iter().map(|(_, r)| r.clone()).collect();
            if let Err(e) = state.outbox.reject(dead) {
                error!("Failed to record rejected entries, keeping them queued: {}", e);
                for (index, rejected) in rejected {
                    report.outcomes[index] = EntryOutcome::Retained;
                    retained.push((index, rejected.entry));
                }
                retained.sort_by_key(|(index, _)| *index);
                report.rejected = 0;
            }
        }

        report.retained = retained.len();
        state
            .outbox
            .replace(retained.into_iter().map(|(_, entry)| entry).collect())?;

        if report.applied > 0 || report.rejected > 0 {
            info!(
                "Outbox flush: {} applied, {} retained, {} rejected",
                report.applied, report.retained, report.rejected
            );
        }
        Ok(report)
    }
}

/// Put back the cached value that an unqueued write replaced
fn restore_cached<S: KeyValueStore>(
    state: &State<S>,
    name: &TemplateName,
    previous: Option<TemplateRecord>,
) {
    let restored = match previous {
        Some(record) => state.cache.put(name, &record),
        None => state.cache.remove(name),
    };
    if let Err(e) = restored {
        error!("Failed to restore local copy of {}: {}", name, e);
    }
}

async fn apply(
    remote: &dyn crate::remote::RemoteStore,
    operation: &Operation,
) -> std::result::Result<Option<TemplateRecord>, RemoteError> {
    match operation {
        Operation::Save(record) => remote.upsert(record).await.map(Some),
        Operation::Delete { name } => remote.delete(name).await.map(|_| None),
    }
}

/// Refresh the cache from remote rows, keeping records with queued
/// operations at their local state
fn merge_remote_rows<S: KeyValueStore>(
    state: &State<S>,
    rows: Vec<TemplateRecord>,
) -> std::result::Result<Vec<TemplateRecord>, LocalStoreError> {
    let mut merged = Vec::with_capacity(rows.len());
    let mut seen = HashSet::new();

    for row in rows {
        seen.insert(row.name.clone());
        match state.outbox.latest_for(&row.name) {
            Some(Operation::Save(local)) => merged.push(local.clone()),
            Some(Operation::Delete { .. }) => {}
            None => {
                state.cache.put(&row.name, &row)?;
                merged.push(row);
            }
        }
    }

    for entry in state.outbox.entries() {
        if let Operation::Save(record) = &entry.operation {
            if seen.insert(record.name.clone()) {
                if let Some(Operation::Save(latest)) = state.outbox.latest_for(&record.name) {
                    merged.push(latest.clone());
                }
            }
        }
    }

    merged.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(merged)
}

impl<S: KeyValueStore> std::fmt::Debug for SyncCoordinator<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncCoordinator")
            .field("remote", &self.remote.as_ref().map(|r| r.backend()))
            .field("connectivity", &self.connectivity())
            .field("config", &self.config)
            .finish()
    }
}
