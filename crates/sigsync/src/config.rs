//! Coordinator configuration

use crate::error::{Result, SigsyncError};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Timing knobs of the sync coordinator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Period of the background outbox flush
    pub flush_interval: Duration,

    /// Startup probe attempts before settling on offline
    pub probe_attempts: u32,

    /// Pause between failed startup probes
    pub probe_interval: Duration,

    /// Upper bound for a single probe
    pub probe_timeout: Duration,

    /// How long to wait for the remote client to be handed over
    pub ready_timeout: Duration,
}

impl SyncConfig {
    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            flush_interval: Duration::from_secs(env_u64(
                "SYNC_FLUSH_INTERVAL_SECS",
                defaults.flush_interval.as_secs(),
            )?),
            probe_attempts: env_parse("SYNC_PROBE_ATTEMPTS", defaults.probe_attempts)?,
            probe_interval: Duration::from_millis(env_u64(
                "SYNC_PROBE_INTERVAL_MS",
                defaults.probe_interval.as_millis() as u64,
            )?),
            probe_timeout: Duration::from_millis(env_u64(
                "SYNC_PROBE_TIMEOUT_MS",
                defaults.probe_timeout.as_millis() as u64,
            )?),
            ready_timeout: Duration::from_millis(env_u64(
                "SYNC_READY_TIMEOUT_MS",
                defaults.ready_timeout.as_millis() as u64,
            )?),
        })
    }

    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    pub fn with_probe_attempts(mut self, attempts: u32, interval: Duration) -> Self {
        self.probe_attempts = attempts;
        self.probe_interval = interval;
        self
    }

    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            flush_interval: Duration::from_secs(30),
            probe_attempts: 10,
            probe_interval: Duration::from_millis(500),
            probe_timeout: Duration::from_secs(5),
            ready_timeout: Duration::from_secs(5),
        }
    }
}

fn env_u64(key: &str, default: u64) -> Result<u64> {
    env_parse(key, default)
}

fn env_parse<T: FromStr>(key: &str, default: T) -> Result<T> {
    match std::env::var(key) {
        Ok(value) => parse_value(key, &value),
        Err(_) => Ok(default),
    }
}

/// Parse a setting, rejecting values that do not fit the target type
fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| SigsyncError::Config(format!("Invalid {} value: {}", key, value)))
}
