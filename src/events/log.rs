// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ordered, filtered views over a batch of events.

use std::fmt;

use regex::Regex;

use super::entry::{is_known_event_type, EventLogEntry, Severity};
use crate::error::{PollerError, Result};

/// Integers above this are treated as timestamps by [`EventLog::lookup`].
pub const TIMESTAMP_THRESHOLD: i64 = 1_000_000_000_000;

// =============================================================================
// LogFilter
// =============================================================================

/// Criteria applied when building an [`EventLog`].
///
/// Bounds are inclusive. An unset criterion keeps every entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogFilter {
    /// Keep only entries with one of these severities.
    pub severities: Option<Vec<Severity>>,
    /// Keep only entries with `timestamp >= start`.
    pub start: Option<i64>,
    /// Keep only entries with `timestamp <= end`.
    pub end: Option<i64>,
}

impl LogFilter {
    /// Create an empty filter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep only entries of the given severity.
    #[must_use]
    pub fn severity(mut self, severity: Severity) -> Self {
        self.severities = Some(vec![severity]);
        self
    }

    /// Keep only entries whose severity is in `severities`.
    #[must_use]
    pub fn severities(mut self, severities: impl IntoIterator<Item = Severity>) -> Self {
        self.severities = Some(severities.into_iter().collect());
        self
    }

    /// Set the inclusive lower bound.
    #[must_use]
    pub fn start(mut self, timestamp: i64) -> Self {
        self.start = Some(timestamp);
        self
    }

    /// Set the inclusive upper bound.
    #[must_use]
    pub fn end(mut self, timestamp: i64) -> Self {
        self.end = Some(timestamp);
        self
    }

    fn accepts(&self, entry: &EventLogEntry) -> bool {
        if let Some(severities) = &self.severities {
            if !severities.contains(&entry.severity) {
                return false;
            }
        }
        if self.start.is_some_and(|start| entry.timestamp < start) {
            return false;
        }
        if self.end.is_some_and(|end| entry.timestamp > end) {
            return false;
        }
        true
    }
}

// =============================================================================
// LogKey
// =============================================================================

/// Key accepted by [`EventLog::get`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKey<'a> {
    /// Position in the sorted log.
    Index(usize),
    /// Exact timestamp; the first entry stamped with it is used.
    Timestamp(i64),
    /// Search pattern, see [`EventLog::find`].
    Pattern(&'a str),
}

/// Values above [`TIMESTAMP_THRESHOLD`] become timestamps, everything else
/// an index. Negative values map to an index that never exists.
impl From<i64> for LogKey<'_> {
    fn from(key: i64) -> Self {
        if key > TIMESTAMP_THRESHOLD {
            LogKey::Timestamp(key)
        } else {
            LogKey::Index(usize::try_from(key).unwrap_or(usize::MAX))
        }
    }
}

impl From<usize> for LogKey<'_> {
    fn from(index: usize) -> Self {
        LogKey::Index(index)
    }
}

impl<'a> From<&'a str> for LogKey<'a> {
    fn from(pattern: &'a str) -> Self {
        LogKey::Pattern(pattern)
    }
}

/// Result of [`EventLog::get`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogItem {
    /// `"{event_type}: {description}"` rendering of an entry.
    Entry(String),
    /// Timestamp of the first entry matching a pattern.
    Timestamp(i64),
}

// =============================================================================
// EventLog
// =============================================================================

/// An ascending, optionally filtered view of events.
///
/// Entries are sorted by timestamp on construction; entries sharing a
/// timestamp keep their original relative order. Filtering never mutates a
/// log, it builds a new one.
///
/// # Example
///
/// ```
/// use resource_poller::events::{EventLog, EventLogEntry, Severity};
///
/// let log = EventLog::new(vec![
///     EventLogEntry::new(300, Severity::Info, "status updated", "Running"),
///     EventLogEntry::new(100, Severity::Info, "status updated", "Requested"),
///     EventLogEntry::new(200, Severity::Info, "status updated", "Executing"),
/// ]);
///
/// assert_eq!(log.by_index(0).as_deref(), Some("status updated: Requested"));
/// assert_eq!(log.find("status updated: Running").unwrap(), vec![300]);
/// assert!(!log.contains("Error"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventLog {
    entries: Vec<EventLogEntry>,
}

impl EventLog {
    /// Build an unfiltered log.
    #[must_use]
    pub fn new(entries: impl IntoIterator<Item = EventLogEntry>) -> Self {
        Self::filtered(entries, &LogFilter::default())
    }

    /// Build a log keeping only the entries `filter` accepts.
    #[must_use]
    pub fn filtered(entries: impl IntoIterator<Item = EventLogEntry>, filter: &LogFilter) -> Self {
        let mut entries: Vec<EventLogEntry> = entries.into_iter().collect();
        // Vec::sort_by_key is stable
        entries.sort_by_key(|e| e.timestamp);
        entries.retain(|e| filter.accepts(e));
        Self { entries }
    }

    /// Parse a JSON array of events as returned by the platform.
    ///
    /// # Errors
    ///
    /// Returns [`PollerError::Validation`] if the document is not an array of
    /// event records.
    pub fn from_json(json: &str) -> Result<Self> {
        let entries: Vec<EventLogEntry> = serde_json::from_str(json)
            .map_err(|e| PollerError::Validation(format!("Failed to parse event log: {e}")))?;
        Ok(Self::new(entries))
    }

    /// A new log with `filter` applied on top of this one.
    #[must_use]
    pub fn filter(&self, filter: &LogFilter) -> Self {
        Self::filtered(self.entries.iter().cloned(), filter)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EventLogEntry> {
        self.entries.iter()
    }

    #[must_use]
    pub fn entries(&self) -> &[EventLogEntry] {
        &self.entries
    }

    /// Rendering of the entry at position `index`.
    #[must_use]
    pub fn by_index(&self, index: usize) -> Option<String> {
        self.entries.get(index).map(ToString::to_string)
    }

    /// Rendering of the first entry stamped exactly `timestamp`.
    #[must_use]
    pub fn by_timestamp(&self, timestamp: i64) -> Option<String> {
        self.entries
            .iter()
            .find(|e| e.timestamp == timestamp)
            .map(ToString::to_string)
    }

    /// Integer lookup that treats values above [`TIMESTAMP_THRESHOLD`] as
    /// timestamps and everything else as an index.
    ///
    /// Prefer [`by_index`](Self::by_index) or
    /// [`by_timestamp`](Self::by_timestamp); this exists for callers that
    /// only have a bare number.
    #[must_use]
    pub fn lookup(&self, key: i64) -> Option<String> {
        match LogKey::from(key) {
            LogKey::Timestamp(ts) => self.by_timestamp(ts),
            LogKey::Index(i) => self.by_index(i),
            LogKey::Pattern(_) => None,
        }
    }

    /// Single accessor over every key kind.
    ///
    /// Indices and timestamps yield the entry rendering, patterns the
    /// timestamp of their first match.
    ///
    /// ```
    /// use resource_poller::events::{EventLog, EventLogEntry, LogItem, Severity};
    ///
    /// let log = EventLog::new(vec![
    ///     EventLogEntry::new(1_700_000_000_100, Severity::Info, "status updated", "Requested"),
    ///     EventLogEntry::new(1_700_000_000_200, Severity::Info, "status updated", "Running"),
    /// ]);
    ///
    /// assert_eq!(log.get(1_usize).unwrap(), LogItem::Entry("status updated: Running".into()));
    /// assert_eq!(log.get("Running").unwrap(), LogItem::Timestamp(1_700_000_000_200));
    /// ```
    ///
    /// # Errors
    ///
    /// [`PollerError::NotFound`] if the index is out of range, no entry
    /// carries the timestamp, or the pattern matches nothing.
    /// [`PollerError::Validation`] for an invalid pattern.
    pub fn get<'k>(&self, key: impl Into<LogKey<'k>>) -> Result<LogItem> {
        match key.into() {
            LogKey::Index(i) => self.by_index(i).map(LogItem::Entry).ok_or_else(|| {
                PollerError::NotFound(format!("index {i} out of range for {} events", self.len()))
            }),
            LogKey::Timestamp(ts) => self
                .by_timestamp(ts)
                .map(LogItem::Entry)
                .ok_or_else(|| PollerError::NotFound(format!("no event at timestamp {ts}"))),
            LogKey::Pattern(pattern) => self.first_timestamp(pattern).map(LogItem::Timestamp),
        }
    }

    /// Timestamp of the first entry matching `pattern` (see [`find`](Self::find)).
    ///
    /// # Errors
    ///
    /// Same as [`find`](Self::find).
    pub fn first_timestamp(&self, pattern: &str) -> Result<i64> {
        let found = self.find(pattern)?;
        found
            .first()
            .copied()
            .ok_or_else(|| not_found(pattern))
    }

    /// Returns `true` if [`find`](Self::find) locates at least one entry.
    #[must_use]
    pub fn contains(&self, pattern: &str) -> bool {
        self.find(pattern).is_ok()
    }

    /// Timestamps of every entry matching `pattern`, ascending.
    ///
    /// A pattern of the form `"<known event type>: <regex>"` matches entries
    /// of that event type whose description matches `<regex>`. Any other
    /// pattern is a description regex tested against every entry.
    ///
    /// # Errors
    ///
    /// [`PollerError::NotFound`] if nothing matches, and
    /// [`PollerError::Validation`] if the regex is invalid.
    pub fn find(&self, pattern: &str) -> Result<Vec<i64>> {
        self.find_with(pattern, None)
    }

    /// Like [`find`](Self::find), restricted to `event_type` when given.
    ///
    /// `description` is the description regex; a `"<known event type>: "`
    /// prefix on it is split off and takes precedence over the explicit
    /// `event_type`.
    ///
    /// # Errors
    ///
    /// Same as [`find`](Self::find).
    pub fn find_with(&self, description: &str, event_type: Option<&str>) -> Result<Vec<i64>> {
        let pattern = description;
        let (event_type, description) = match pattern.split_once(": ") {
            Some((label, rest)) if is_known_event_type(label) => (Some(label), rest),
            _ => (event_type.filter(|t| !t.is_empty()), pattern),
        };

        let regex = Regex::new(description).map_err(|e| {
            PollerError::Validation(format!("invalid pattern '{description}': {e}"))
        })?;

        let found: Vec<i64> = self
            .entries
            .iter()
            .filter(|e| event_type.map_or(true, |t| e.event_type == t))
            .filter(|e| regex.is_match(&e.description))
            .map(|e| e.timestamp)
            .collect();

        if found.is_empty() {
            return Err(not_found(pattern));
        }
        Ok(found)
    }

    /// Sub-log between the first match of `start` and the first match of
    /// `end` after it, both inclusive.
    ///
    /// With neither bound this is a copy of the log.
    ///
    /// # Errors
    ///
    /// [`PollerError::NotFound`] if a bound does not match or the interval
    /// is empty.
    pub fn get_interval(&self, start: Option<&str>, end: Option<&str>) -> Result<EventLog> {
        if start.is_none() && end.is_none() {
            return Ok(self.clone());
        }

        let mut interval = self.clone();
        if let Some(pattern) = start {
            let from = interval.first_timestamp(pattern)?;
            interval = interval.filter(&LogFilter::new().start(from));
        }
        if let Some(pattern) = end {
            let to = interval.first_timestamp(pattern)?;
            interval = interval.filter(&LogFilter::new().end(to));
        }

        if interval.is_empty() {
            return Err(PollerError::NotFound(format!(
                "empty interval between {start:?} and {end:?}"
            )));
        }
        Ok(interval)
    }
}

fn not_found(pattern: &str) -> PollerError {
    PollerError::NotFound(format!("no event matches '{pattern}'"))
}

impl<'a> IntoIterator for &'a EventLog {
    type Item = &'a EventLogEntry;
    type IntoIter = std::slice::Iter<'a, EventLogEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl FromIterator<EventLogEntry> for EventLog {
    fn from_iter<I: IntoIterator<Item = EventLogEntry>>(iter: I) -> Self {
        Self::new(iter)
    }
}

/// One line per entry: `"<timestamp> <SEVERITY> <event type>: <description>"`.
impl fmt::Display for EventLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{} {} {}", entry.timestamp, entry.severity, entry)?;
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
