// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory resources for exercising pollers without a platform.
//!
//! ```
//! use resource_poller::testkit::ScriptedResource;
//!
//! let app = ScriptedResource::new("app")
//!     .statuses(["Requested", "Executing"])
//!     .transport_error("connection reset")
//!     .statuses(["Running"]);
//! assert_eq!(app.reads(), 0);
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::error::{PollerError, Result};
use crate::events::EventLogEntry;
use crate::poller::StatusResource;

#[derive(Debug, Clone)]
enum Step {
    Status(String),
    TransportError(String),
}

/// A [`StatusResource`] that replays a scripted sequence of reads.
///
/// Each status read consumes one scripted step. Once the script runs out,
/// the last status read is returned again.
#[derive(Debug)]
pub struct ScriptedResource {
    name: String,
    script: Mutex<VecDeque<Step>>,
    last_status: Mutex<Option<String>>,
    reads: AtomicUsize,
    log: Vec<EventLogEntry>,
    log_error: Option<String>,
    log_fetches: AtomicUsize,
    last_operation_at: Option<i64>,
    stale_checks: usize,
    freshness_checks: AtomicUsize,
    freshness: Duration,
}

impl ScriptedResource {
    /// Create a resource with an empty script.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            script: Mutex::new(VecDeque::new()),
            last_status: Mutex::new(None),
            reads: AtomicUsize::new(0),
            log: Vec::new(),
            log_error: None,
            log_fetches: AtomicUsize::new(0),
            last_operation_at: None,
            stale_checks: 0,
            freshness_checks: AtomicUsize::new(0),
            freshness: Duration::ZERO,
        }
    }

    /// Append statuses to the script.
    #[must_use]
    pub fn statuses<S: Into<String>>(self, statuses: impl IntoIterator<Item = S>) -> Self {
        {
            let mut script = lock(&self.script);
            script.extend(statuses.into_iter().map(|s| Step::Status(s.into())));
        }
        self
    }

    /// Append a read that fails with a transport error.
    #[must_use]
    pub fn transport_error(self, message: impl Into<String>) -> Self {
        lock(&self.script).push_back(Step::TransportError(message.into()));
        self
    }

    /// Events returned by `fetch_log`.
    #[must_use]
    pub fn with_log(mut self, entries: impl IntoIterator<Item = EventLogEntry>) -> Self {
        self.log = entries.into_iter().collect();
        self
    }

    /// Make `fetch_log` fail with a transport error.
    #[must_use]
    pub fn with_log_error(mut self, message: impl Into<String>) -> Self {
        self.log_error = Some(message.into());
        self
    }

    /// Record an operation started at `timestamp`. The first `stale_checks`
    /// calls to `updated_after` report no update since then.
    #[must_use]
    pub fn with_last_operation(mut self, timestamp: i64, stale_checks: usize) -> Self {
        self.last_operation_at = Some(timestamp);
        self.stale_checks = stale_checks;
        self
    }

    /// Advertised status cache lifetime.
    #[must_use]
    pub fn with_freshness(mut self, freshness: Duration) -> Self {
        self.freshness = freshness;
        self
    }

    /// Number of status reads so far, failed ones included.
    #[must_use]
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of log fetches so far.
    #[must_use]
    pub fn log_fetches(&self) -> usize {
        self.log_fetches.load(Ordering::SeqCst)
    }

    fn next_status(&self) -> Result<String> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let step = lock(&self.script).pop_front();
        let mut last = lock(&self.last_status);
        match step {
            Some(Step::Status(status)) => {
                *last = Some(status.clone());
                Ok(status)
            }
            Some(Step::TransportError(message)) => Err(PollerError::Transport(message)),
            None => last
                .clone()
                .ok_or_else(|| {
                    PollerError::Unknown(format!("no status scripted for {}", self.name))
                }),
        }
    }
}

impl StatusResource for ScriptedResource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn status(&self) -> Result<String> {
        self.next_status()
    }

    fn last_operation_at(&self) -> Option<i64> {
        self.last_operation_at
    }

    async fn updated_after(&self, _timestamp: i64) -> Result<bool> {
        let checks = self.freshness_checks.fetch_add(1, Ordering::SeqCst);
        Ok(checks >= self.stale_checks)
    }

    async fn fetch_log(&self) -> Result<Vec<EventLogEntry>> {
        self.log_fetches.fetch_add(1, Ordering::SeqCst);
        match &self.log_error {
            Some(message) => Err(PollerError::Transport(message.clone())),
            None => Ok(self.log.clone()),
        }
    }

    fn status_freshness(&self) -> Duration {
        self.freshness
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
