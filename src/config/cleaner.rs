use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use super::CleanerConfig;
use crate::Error;
use crate::Result;

/// Forced reclamation pass settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PeriodicGcConfig {
    /// Interval between forced reclamation passes (seconds).
    /// Bounds how long an unreachable-but-undetected resource can stay alive
    /// on the cluster when nothing else triggers a pass.
    #[serde(default = "default_periodic_gc_interval")]
    pub interval_in_secs: u64,
}

impl Default for PeriodicGcConfig {
    fn default() -> Self {
        Self {
            interval_in_secs: default_periodic_gc_interval(),
        }
    }
}

impl PeriodicGcConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_in_secs)
    }

    pub(super) fn validate(&self) -> Result<()> {
        if self.interval_in_secs == 0 {
            return Err(Error::Config(ConfigError::Message(
                "periodic_gc.interval_in_secs must be greater than 0".into(),
            )));
        }
        Ok(())
    }
}

fn default_periodic_gc_interval() -> u64 {
    // 30 minutes
    30 * 60
}

/// Whether cleanup calls wait for collaborator acknowledgment
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BlockingConfig {
    /// Applies to cached partitions, broadcasts and accumulators
    #[serde(default = "default_blocking")]
    pub default: bool,

    /// Shuffle cleanup fans out to every storage owner, so it does not block by default
    #[serde(default)]
    pub shuffle: bool,
}

impl Default for BlockingConfig {
    fn default() -> Self {
        Self {
            default: default_blocking(),
            shuffle: false,
        }
    }
}

fn default_blocking() -> bool {
    true
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DispatcherConfig {
    /// Upper bound on how long the dispatcher waits for the queue before
    /// re-checking for a stop request (milliseconds)
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_in_ms: u64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            poll_timeout_in_ms: default_poll_timeout_ms(),
        }
    }
}

impl DispatcherConfig {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_in_ms)
    }

    pub(super) fn validate(&self) -> Result<()> {
        if self.poll_timeout_in_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "dispatcher.poll_timeout_in_ms must be at least 1ms".into(),
            )));
        }
        Ok(())
    }
}

fn default_poll_timeout_ms() -> u64 {
    100
}

/// Effective cleanup policy handed to the cleaner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policy {
    pub force_collect_interval: Duration,
    pub block_default: bool,
    pub block_shuffle: bool,
}

impl Default for Policy {
    fn default() -> Self {
        CleanerConfig::default().policy()
    }
}
