//! Configuration management module for the resource cleaner.
//!
//! Provides hierarchical configuration loading and validation with:
//! - Default values as code base
//! - Environment variable overrides
//! - Configuration file support
//! - Component-wise validation
mod cleaner;
use std::fmt::Debug;

pub use cleaner::*;
use std::env;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Result;

/// Main configuration container for the cleaner and its background tasks
///
/// Combines all subsystem configurations with hierarchical override support:
/// 1. Default values from code implementation
/// 2. Configuration file specified by `CONFIG_PATH`
/// 3. Environment variables (highest priority)
#[derive(Serialize, Deserialize, Clone)]
pub struct CleanerConfig {
    /// Master switch. When disabled, nothing registered is ever tracked.
    #[serde(default = "default_reference_tracking")]
    pub reference_tracking: bool,

    /// Whether checkpoint artifacts are tracked for cleanup at all
    #[serde(default)]
    pub clean_checkpoints: bool,

    /// Forced reclamation pass settings
    #[serde(default)]
    pub periodic_gc: PeriodicGcConfig,

    /// Per-kind blocking behaviour of cleanup calls
    #[serde(default)]
    pub blocking: BlockingConfig,

    /// Dispatcher loop settings
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
}

impl Debug for CleanerConfig {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("CleanerConfig")
            .field("reference_tracking", &self.reference_tracking)
            .field("clean_checkpoints", &self.clean_checkpoints)
            .field("periodic_gc", &self.periodic_gc)
            .field("blocking", &self.blocking)
            .finish_non_exhaustive()
    }
}

impl Default for CleanerConfig {
    fn default() -> Self {
        Self {
            reference_tracking: default_reference_tracking(),
            clean_checkpoints: false,
            periodic_gc: PeriodicGcConfig::default(),
            blocking: BlockingConfig::default(),
            dispatcher: DispatcherConfig::default(),
        }
    }
}

impl CleanerConfig {
    /// Loads configuration from hierarchical sources without validation.
    ///
    /// Configuration sources are merged in the following order (later sources override earlier):
    /// 1. Type defaults (lowest priority)
    /// 2. Configuration file from `CONFIG_PATH` environment variable (if set)
    /// 3. Environment variables with `CLEANER__` prefix (highest priority)
    ///
    /// # Note
    /// This method does NOT validate the configuration. Callers MUST call `validate()`
    /// before handing the configuration to a `ContextCleaner`.
    ///
    /// # Examples
    /// ```ignore
    /// std::env::set_var("CLEANER__PERIODIC_GC__INTERVAL_IN_SECS", "60");
    /// let cfg = CleanerConfig::new()?.validate()?;
    /// ```
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var("CONFIG_PATH") {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("CLEANER")
                .separator("__")
                .ignore_empty(true)
                .try_parsing(true),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Applies additional configuration overrides from file without validation.
    ///
    /// Merging order (later sources override earlier):
    /// 1. Current configuration values
    /// 2. New configuration file
    /// 3. Latest environment variables (highest priority)
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("CLEANER")
                    .separator("__")
                    .ignore_empty(true)
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Validates every section and returns the configuration on success.
    pub fn validate(self) -> Result<Self> {
        self.periodic_gc.validate()?;
        self.dispatcher.validate()?;
        Ok(self)
    }

    /// Cleanup policy derived from this configuration
    pub fn policy(&self) -> Policy {
        Policy {
            force_collect_interval: self.periodic_gc.interval(),
            block_default: self.blocking.default,
            block_shuffle: self.blocking.shuffle,
        }
    }
}

fn default_reference_tracking() -> bool {
    true
}
