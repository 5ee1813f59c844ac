// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed records of platform events.

use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::PollerError;

/// Event-type labels the platform emits.
///
/// A search pattern of the form `"<label>: <regex>"` is split into an
/// event-type filter and a description regex only when `<label>` is one of
/// these.
pub const KNOWN_EVENT_TYPES: &[&str] = &[
    "status updated",
    "command started",
    "command finished",
    "workflow started",
    "workflow finished",
    "step started",
    "step finished",
    "signals updated",
    "dynamic links updated",
    "job started",
    "job completed",
    "job failed",
];

/// Returns `true` if `label` is one of [`KNOWN_EVENT_TYPES`].
#[must_use]
pub fn is_known_event_type(label: &str) -> bool {
    KNOWN_EVENT_TYPES.contains(&label)
}

// =============================================================================
// Severity
// =============================================================================

/// Severity of an event.
///
/// Parsing ignores case and accepts `WARN` for [`Severity::Warning`].
/// Labels outside the known set are kept, upper-cased, as
/// [`Severity::Other`] so a single unfamiliar event never rejects a batch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
    Other(String),
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Debug => write!(f, "DEBUG"),
            Severity::Info => write!(f, "INFO"),
            Severity::Warning => write!(f, "WARNING"),
            Severity::Error => write!(f, "ERROR"),
            Severity::Other(label) => write!(f, "{label}"),
        }
    }
}

impl FromStr for Severity {
    type Err = PollerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let label = s.trim().to_ascii_uppercase();
        match label.as_str() {
            "" => Err(PollerError::Validation("empty severity".to_string())),
            "DEBUG" => Ok(Severity::Debug),
            "INFO" => Ok(Severity::Info),
            "WARN" | "WARNING" => Ok(Severity::Warning),
            "ERROR" => Ok(Severity::Error),
            _ => Ok(Severity::Other(label)),
        }
    }
}

impl Serialize for Severity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        label.parse().map_err(de::Error::custom)
    }
}

// =============================================================================
// EventLogEntry
// =============================================================================

/// A single platform event.
///
/// Deserializes from the platform's JSON shape, where the event type is
/// carried as `eventTypeText`:
///
/// ```
/// use resource_poller::events::{EventLogEntry, Severity};
///
/// let entry: EventLogEntry = serde_json::from_str(
///     r#"{"time": 1700000000000, "severity": "INFO",
///         "eventTypeText": "status updated", "description": "Running"}"#,
/// ).unwrap();
///
/// assert_eq!(entry.severity, Severity::Info);
/// assert_eq!(entry.to_string(), "status updated: Running");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventLogEntry {
    /// Milliseconds since the epoch.
    #[serde(alias = "time")]
    pub timestamp: i64,
    pub severity: Severity,
    /// Short classification, e.g. "status updated".
    #[serde(alias = "eventTypeText")]
    pub event_type: String,
    #[serde(default)]
    pub description: String,
}

impl EventLogEntry {
    /// Create a new entry.
    #[must_use]
    pub fn new(
        timestamp: i64,
        severity: Severity,
        event_type: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            severity,
            event_type: event_type.into(),
            description: description.into(),
        }
    }
}

/// Renders as `"{event_type}: {description}"`.
impl fmt::Display for EventLogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.event_type, self.description)
    }
}
