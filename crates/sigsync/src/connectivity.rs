//! Reachability of the remote store

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::debug;

use crate::remote::RemoteStore;

/// Last known reachability of the remote store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connectivity {
    /// No probe has completed yet
    Uninitialized,
    Online,
    Offline,
}

impl Connectivity {
    pub fn is_online(self) -> bool {
        self == Connectivity::Online
    }
}

impl fmt::Display for Connectivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Connectivity::Uninitialized => "uninitialized",
            Connectivity::Online => "online",
            Connectivity::Offline => "offline",
        };
        f.write_str(label)
    }
}

/// Issue one bounded read against `remote`
///
/// Never fails: transport errors, auth errors and timeouts all collapse to
/// [`Connectivity::Offline`].
pub async fn probe(remote: &dyn RemoteStore, timeout: Duration) -> Connectivity {
    match tokio::time::timeout(timeout, remote.probe()).await {
        Ok(Ok(())) => Connectivity::Online,
        Ok(Err(e)) => {
            debug!("Probe of {} failed: {}", remote.backend(), e);
            Connectivity::Offline
        }
        Err(_) => {
            debug!("Probe of {} timed out after {:?}", remote.backend(), timeout);
            Connectivity::Offline
        }
    }
}

/// Probe up to `attempts` times, sleeping `interval` between failures
pub async fn probe_with_retry(
    remote: &dyn RemoteStore,
    attempts: u32,
    interval: Duration,
    timeout: Duration,
) -> Connectivity {
    for attempt in 1..=attempts.max(1) {
        if probe(remote, timeout).await.is_online() {
            return Connectivity::Online;
        }
        if attempt < attempts {
            debug!("Probe attempt {}/{} failed, retrying", attempt, attempts);
            tokio::time::sleep(interval).await;
        }
    }
    Connectivity::Offline
}
