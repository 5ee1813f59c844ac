// SPDX-License-Identifier: MIT OR Apache-2.0

//! Level-selectable structured logging.
//!
//! The library only emits `tracing` events; installing a subscriber is left
//! to the application. Diagnostics whose severity is chosen at runtime go
//! through [`emit`], which dispatches to the matching `tracing` macro under
//! the `resource_poller::diagnostics` target.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, trace, warn};

use crate::error::PollerError;

/// Log level selectable from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level - most verbose.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    Info,
    /// Warn level.
    #[default]
    Warn,
    /// Error level - only errors.
    Error,
    /// Disabled - no logging.
    Off,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "TRACE"),
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
            LogLevel::Off => write!(f, "OFF"),
        }
    }
}

impl FromStr for LogLevel {
    type Err = PollerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            "off" | "none" => Ok(LogLevel::Off),
            other => Err(PollerError::Config(format!("unknown log level '{other}'"))),
        }
    }
}

impl LogLevel {
    /// The more severe of two levels; `Off` always wins.
    #[must_use]
    pub fn max(self, other: LogLevel) -> LogLevel {
        if self == LogLevel::Off || other == LogLevel::Off {
            return LogLevel::Off;
        }
        if self.rank() >= other.rank() {
            self
        } else {
            other
        }
    }

    fn rank(self) -> u8 {
        match self {
            LogLevel::Trace => 0,
            LogLevel::Debug => 1,
            LogLevel::Info => 2,
            LogLevel::Warn => 3,
            LogLevel::Error => 4,
            LogLevel::Off => 5,
        }
    }
}

/// Emit `message` for `resource` at `level`.
pub fn emit(level: LogLevel, resource: &str, message: &str) {
    match level {
        LogLevel::Trace => trace!(target: "resource_poller::diagnostics", resource, "{}", message),
        LogLevel::Debug => debug!(target: "resource_poller::diagnostics", resource, "{}", message),
        LogLevel::Info => info!(target: "resource_poller::diagnostics", resource, "{}", message),
        LogLevel::Warn => warn!(target: "resource_poller::diagnostics", resource, "{}", message),
        LogLevel::Error => error!(target: "resource_poller::diagnostics", resource, "{}", message),
        LogLevel::Off => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_display() {
        assert_eq!(LogLevel::Trace.to_string(), "TRACE");
        assert_eq!(LogLevel::Warn.to_string(), "WARN");
        assert_eq!(LogLevel::Off.to_string(), "OFF");
    }

    #[test]
    fn test_log_level_default() {
        assert_eq!(LogLevel::default(), LogLevel::Warn);
    }

    #[test]
    fn test_log_level_parse() {
        assert_eq!("ERROR".parse::<LogLevel>().unwrap(), LogLevel::Error);
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_log_level_max() {
        assert_eq!(LogLevel::Info.max(LogLevel::Error), LogLevel::Error);
        assert_eq!(LogLevel::Error.max(LogLevel::Debug), LogLevel::Error);
        assert_eq!(LogLevel::Off.max(LogLevel::Error), LogLevel::Off);
    }

    #[test]
    fn test_emit_without_subscriber() {
        // no subscriber installed: must be a silent no-op at every level
        for level in [LogLevel::Trace, LogLevel::Info, LogLevel::Error, LogLevel::Off] {
            emit(level, "app-1", "status is Error");
        }
    }
}
