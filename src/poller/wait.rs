// SPDX-License-Identifier: MIT OR Apache-2.0

//! Two-phase readiness polling.
//!
//! 1. **Consistency guard.** A status read right after an operation may
//!    still show the previous operation's outcome. A short fixed schedule
//!    waits until the status is not final, or the resource reports an
//!    update after the last operation started. Exhausting the guard is not
//!    an error; polling proceeds regardless.
//! 2. **Convergence.** The caller's schedule drives a boolean-mode retry:
//!    a final status stops it, an accepted status consumes an attempt, and
//!    any other status stops it early.
//!
//! The loop only decides when to stop. Success is decided by one more
//! status read after the loop ends, so a resource that passed through an
//! unexpected status and then recovered is still reported ready.

use std::fmt;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::status::{StatusResource, StatusRole, StatusSets};
use crate::error::{PollerError, Result};
use crate::events::{EventLog, LogFilter, Severity};
use crate::runtime::{emit, retry_bool, LogLevel, RetrySchedule};

// =============================================================================
// PollReport
// =============================================================================

/// How a wait ended, judged from the status read after polling stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The status is final.
    Ready,
    /// The status is a designated hard failure.
    Failed,
    /// The status is still an accepted intermediate one.
    TimedOut,
    /// The status is neither final, accepted nor a hard failure.
    Unexpected,
}

impl fmt::Display for PollOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PollOutcome::Ready => write!(f, "ready"),
            PollOutcome::Failed => write!(f, "failed"),
            PollOutcome::TimedOut => write!(f, "timed out"),
            PollOutcome::Unexpected => write!(f, "unexpected status"),
        }
    }
}

/// Result of a wait.
#[derive(Debug, Clone)]
pub struct PollReport {
    /// Name of the polled resource.
    pub resource: String,
    /// Status read after polling stopped.
    pub status: String,
    pub outcome: PollOutcome,
    /// Event-log excerpt fetched when the wait did not succeed.
    pub diagnostic: Option<EventLog>,
}

impl PollReport {
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.outcome == PollOutcome::Ready
    }
}

// =============================================================================
// Poller
// =============================================================================

/// Settings shared by every wait a [`Poller`] performs.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Schedule of the consistency guard.
    pub guard: RetrySchedule,
    /// Severities kept in the diagnostic log excerpt.
    pub diagnostic_severities: Vec<Severity>,
    /// Level for diagnostics of unsuccessful waits. Hard failures are
    /// raised to at least `Error`.
    pub diagnostic_level: LogLevel,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            guard: Self::default_guard(),
            diagnostic_severities: vec![Severity::Error, Severity::Info],
            diagnostic_level: LogLevel::Warn,
        }
    }
}

impl PollerConfig {
    /// Create a new poller configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Three attempts, one second apart, doubling.
    #[must_use]
    pub fn default_guard() -> RetrySchedule {
        RetrySchedule::exponential(3, Duration::from_secs(1))
    }

    /// Set the consistency guard schedule.
    #[must_use]
    pub fn with_guard(mut self, guard: RetrySchedule) -> Self {
        self.guard = guard;
        self
    }

    /// Set the severities kept in diagnostics.
    #[must_use]
    pub fn with_diagnostic_severities(
        mut self,
        severities: impl IntoIterator<Item = Severity>,
    ) -> Self {
        self.diagnostic_severities = severities.into_iter().collect();
        self
    }

    /// Set the diagnostic log level.
    #[must_use]
    pub fn with_diagnostic_level(mut self, level: LogLevel) -> Self {
        self.diagnostic_level = level;
        self
    }
}

/// Waits for resources to reach a target status.
#[derive(Debug, Clone, Default)]
pub struct Poller {
    config: PollerConfig,
}

impl Poller {
    /// Create a poller with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a poller with custom configuration.
    #[must_use]
    pub fn with_config(config: PollerConfig) -> Self {
        Self { config }
    }

    /// Get the configuration.
    #[must_use]
    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    /// Wait until `resource` reaches one of `final_statuses`.
    ///
    /// Returns `Ok(false)` on timeout or on a non-final status; only errors
    /// raised by the resource itself (or invalid status sets) are returned
    /// as `Err`.
    ///
    /// # Errors
    ///
    /// See [`wait`](Self::wait).
    pub async fn wait_for_status<R, F, A>(
        &self,
        resource: &R,
        final_statuses: impl IntoIterator<Item = F>,
        accepted_statuses: impl IntoIterator<Item = A>,
        schedule: &RetrySchedule,
    ) -> Result<bool>
    where
        R: StatusResource,
        F: Into<String>,
        A: Into<String>,
    {
        let statuses = StatusSets::new(final_statuses, accepted_statuses)?;
        let report = self.wait(resource, &statuses, schedule).await?;
        Ok(report.is_ready())
    }

    /// Wait until `resource` reaches a final status and report how it ended.
    ///
    /// Only the schedule's timing is used; convergence always runs in
    /// boolean mode.
    ///
    /// # Errors
    ///
    /// Any error returned by the resource's status read or staleness check
    /// is propagated unchanged. A failing log fetch is logged and leaves
    /// [`PollReport::diagnostic`] empty.
    pub async fn wait<R: StatusResource>(
        &self,
        resource: &R,
        statuses: &StatusSets,
        schedule: &RetrySchedule,
    ) -> Result<PollReport> {
        self.consistency_guard(resource, statuses).await?;

        let stopped = retry_bool(schedule, move || async move {
            let status = resource.status().await?;
            let role = statuses.classify(&status);
            debug!(
                target: "resource_poller::poll",
                resource = resource.name(),
                status = %status,
                role = ?role,
                "observed status"
            );
            Ok::<_, PollerError>(role != StatusRole::Accepted)
        })
        .await?;

        if !stopped {
            debug!(
                target: "resource_poller::poll",
                resource = resource.name(),
                attempts = schedule.max_attempts(),
                "polling attempts exhausted"
            );
        }

        let status = resource.status().await?;
        let outcome = if statuses.is_final(&status) {
            PollOutcome::Ready
        } else if statuses.is_failure(&status) {
            PollOutcome::Failed
        } else if statuses.classify(&status) == StatusRole::Accepted {
            PollOutcome::TimedOut
        } else {
            PollOutcome::Unexpected
        };

        let diagnostic = match outcome {
            PollOutcome::Ready => {
                info!(
                    target: "resource_poller::poll",
                    resource = resource.name(),
                    status = %status,
                    "resource ready"
                );
                None
            }
            _ => self.diagnose(resource, &status, outcome).await,
        };

        Ok(PollReport {
            resource: resource.name().to_string(),
            status,
            outcome,
            diagnostic,
        })
    }

    async fn consistency_guard<R: StatusResource>(
        &self,
        resource: &R,
        statuses: &StatusSets,
    ) -> Result<()> {
        let guard = &self.config.guard;
        let guard =
            guard.with_initial_delay(guard.initial_delay().max(resource.status_freshness()));
        let since = resource.last_operation_at();

        let settled = retry_bool(&guard, move || async move {
            let status = resource.status().await?;
            if !statuses.is_final(&status) {
                return Ok::<_, PollerError>(true);
            }
            match since {
                Some(timestamp) => resource.updated_after(timestamp).await,
                // nothing to be stale relative to
                None => Ok(true),
            }
        })
        .await?;

        if !settled {
            warn!(
                target: "resource_poller::poll",
                resource = resource.name(),
                "status may predate the last operation, polling anyway"
            );
        }
        Ok(())
    }

    async fn diagnose<R: StatusResource>(
        &self,
        resource: &R,
        status: &str,
        outcome: PollOutcome,
    ) -> Option<EventLog> {
        let level = match outcome {
            PollOutcome::Failed => self.config.diagnostic_level.max(LogLevel::Error),
            _ => self.config.diagnostic_level,
        };

        let entries = match resource.fetch_log().await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(
                    target: "resource_poller::poll",
                    resource = resource.name(),
                    error = %e,
                    "could not fetch event log for diagnostics"
                );
                emit(
                    level,
                    resource.name(),
                    &format!("{} with status '{}'", outcome, status),
                );
                return None;
            }
        };

        let filter =
            LogFilter::new().severities(self.config.diagnostic_severities.iter().cloned());
        let log = EventLog::filtered(entries, &filter);
        emit(
            level,
            resource.name(),
            &format!("{} with status '{}'; events:\n{}", outcome, status, log),
        );
        Some(log)
    }
}

/// [`Poller::wait_for_status`] with the default configuration.
///
/// # Errors
///
/// See [`Poller::wait`].
pub async fn wait_for_status<R, F, A>(
    resource: &R,
    final_statuses: impl IntoIterator<Item = F>,
    accepted_statuses: impl IntoIterator<Item = A>,
    schedule: &RetrySchedule,
) -> Result<bool>
where
    R: StatusResource,
    F: Into<String>,
    A: Into<String>,
{
    Poller::new()
        .wait_for_status(resource, final_statuses, accepted_statuses, schedule)
        .await
}
