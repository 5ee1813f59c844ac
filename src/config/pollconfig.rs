// SPDX-License-Identifier: MIT OR Apache-2.0

//! Poller configuration file parser
//!
//! ```yaml
//! wait:
//!   max_attempts: 60
//!   initial_delay_ms: 3000
//!   backoff_factor: 1.0
//! guard:
//!   max_attempts: 3
//!   initial_delay_ms: 1000
//!   backoff_factor: 2.0
//! failure_statuses: [Error, Canceled]
//! diagnostic_severities: [ERROR, INFO]
//! diagnostic_level: warn
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{PollerError, Result};
use crate::events::Severity;
use crate::poller::{PollerConfig, StatusSets, DEFAULT_FAILURE_STATUSES};
use crate::runtime::{LogLevel, RetrySchedule};

/// Path to the config file.
pub const ENV_CONFIG: &str = "RESOURCE_POLLER_CONFIG";
/// Override for `wait.max_attempts`.
pub const ENV_MAX_ATTEMPTS: &str = "RESOURCE_POLLER_MAX_ATTEMPTS";
/// Override for `wait.initial_delay_ms`.
pub const ENV_INITIAL_DELAY_MS: &str = "RESOURCE_POLLER_INITIAL_DELAY_MS";
/// Override for `wait.backoff_factor`.
pub const ENV_BACKOFF_FACTOR: &str = "RESOURCE_POLLER_BACKOFF_FACTOR";

/// A retry schedule as written in the config file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScheduleConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub backoff_factor: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_delay_ms: Option<u64>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self::from(&RetrySchedule::default())
    }
}

impl From<&RetrySchedule> for ScheduleConfig {
    fn from(schedule: &RetrySchedule) -> Self {
        Self {
            max_attempts: schedule.max_attempts(),
            initial_delay_ms: schedule.initial_delay().as_millis() as u64,
            backoff_factor: schedule.backoff_factor(),
            max_delay_ms: schedule.max_delay().map(|d| d.as_millis() as u64),
        }
    }
}

impl ScheduleConfig {
    /// Validate and convert into a boolean-mode [`RetrySchedule`].
    ///
    /// # Errors
    ///
    /// Returns [`PollerError::Config`] for invalid values.
    pub fn to_schedule(&self) -> Result<RetrySchedule> {
        let mut builder = RetrySchedule::builder()
            .max_attempts(self.max_attempts)
            .initial_delay(Duration::from_millis(self.initial_delay_ms))
            .backoff_factor(self.backoff_factor);
        if let Some(max) = self.max_delay_ms {
            builder = builder.max_delay(Duration::from_millis(max));
        }
        builder.build()
    }
}

/// Top-level configuration document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PollConfig {
    /// Schedule for convergence loops.
    pub wait: ScheduleConfig,
    /// Schedule for the consistency guard.
    pub guard: ScheduleConfig,
    /// Statuses treated as hard failures.
    pub failure_statuses: Vec<String>,
    /// Severities kept in diagnostic log excerpts.
    pub diagnostic_severities: Vec<Severity>,
    /// Level at which diagnostics are logged.
    pub diagnostic_level: LogLevel,
}

impl Default for PollConfig {
    fn default() -> Self {
        let poller = PollerConfig::default();
        Self {
            wait: ScheduleConfig::default(),
            guard: ScheduleConfig::from(&poller.guard),
            failure_statuses: DEFAULT_FAILURE_STATUSES
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            diagnostic_severities: poller.diagnostic_severities,
            diagnostic_level: poller.diagnostic_level,
        }
    }
}

impl PollConfig {
    /// Load configuration from the default location, falling back to
    /// defaults when no file exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_default() -> Result<Self> {
        let config_path = Self::default_path()?;
        Self::load_if_exists(&config_path)
    }

    /// Load configuration from a specific path
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read
    /// - The file is malformed YAML
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            PollerError::Config(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML string
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is malformed
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| PollerError::Config(format!("Failed to parse config YAML: {}", e)))
    }

    /// Get the default config file path (`~/.config/resource-poller/config.yaml`)
    ///
    /// # Errors
    ///
    /// Returns an error if the config directory cannot be determined
    pub fn default_path() -> Result<PathBuf> {
        let base = dirs::config_dir().ok_or_else(|| {
            PollerError::Config("Could not determine config directory".to_string())
        })?;

        Ok(base.join("resource-poller").join("config.yaml"))
    }

    /// Get the path to the config file, respecting `RESOURCE_POLLER_CONFIG`
    ///
    /// # Errors
    ///
    /// Returns an error if the config directory cannot be determined when
    /// `RESOURCE_POLLER_CONFIG` is not set
    pub fn config_path() -> Result<PathBuf> {
        if let Ok(env_path) = std::env::var(ENV_CONFIG) {
            Ok(PathBuf::from(env_path))
        } else {
            Self::default_path()
        }
    }

    /// Load from [`config_path`](Self::config_path) and apply environment
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but is invalid, or an override
    /// does not parse.
    pub fn load_with_env() -> Result<Self> {
        let mut config = Self::load_if_exists(Self::config_path()?)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    fn load_if_exists<P: AsRef<Path>>(path: P) -> Result<Self> {
        match fs::metadata(path.as_ref()) {
            Ok(_) => Self::load_from_path(path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(PollerError::Config(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))),
        }
    }

    /// Apply `wait` overrides looked up through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`PollerError::Config`] if a value does not parse.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_MAX_ATTEMPTS) {
            self.wait.max_attempts = parse_override(ENV_MAX_ATTEMPTS, &value)?;
        }
        if let Some(value) = lookup(ENV_INITIAL_DELAY_MS) {
            self.wait.initial_delay_ms = parse_override(ENV_INITIAL_DELAY_MS, &value)?;
        }
        if let Some(value) = lookup(ENV_BACKOFF_FACTOR) {
            self.wait.backoff_factor = parse_override(ENV_BACKOFF_FACTOR, &value)?;
        }
        Ok(())
    }

    /// The convergence schedule.
    ///
    /// # Errors
    ///
    /// Returns [`PollerError::Config`] for invalid values.
    pub fn wait_schedule(&self) -> Result<RetrySchedule> {
        self.wait.to_schedule()
    }

    /// Build the [`PollerConfig`] this document describes.
    ///
    /// # Errors
    ///
    /// Returns [`PollerError::Config`] for an invalid guard schedule.
    pub fn poller_config(&self) -> Result<PollerConfig> {
        Ok(PollerConfig::new()
            .with_guard(self.guard.to_schedule()?)
            .with_diagnostic_severities(self.diagnostic_severities.iter().cloned())
            .with_diagnostic_level(self.diagnostic_level))
    }

    /// Status sets for one wait using the configured failure statuses.
    ///
    /// # Errors
    ///
    /// Same as [`StatusSets::new`] and [`StatusSets::with_failure_statuses`].
    pub fn status_sets<F, A>(
        &self,
        final_statuses: impl IntoIterator<Item = F>,
        accepted_statuses: impl IntoIterator<Item = A>,
    ) -> Result<StatusSets>
    where
        F: Into<String>,
        A: Into<String>,
    {
        StatusSets::new(final_statuses, accepted_statuses)?
            .with_failure_statuses(self.failure_statuses.iter().cloned())
    }
}

fn parse_override<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| PollerError::Config(format!("Invalid value for {key}: {value:?} ({e})")))
}
