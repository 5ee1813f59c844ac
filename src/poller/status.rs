// SPDX-License-Identifier: MIT OR Apache-2.0

//! Status-observable resources and status classification.

use std::collections::BTreeSet;
use std::future::Future;
use std::time::Duration;

use crate::error::{PollerError, Result};
use crate::events::EventLogEntry;

// =============================================================================
// StatusResource
// =============================================================================

/// A remote resource whose status can be observed.
///
/// Implementations live in the HTTP client layer; every method may perform
/// network I/O and report failures as [`PollerError::Transport`] (or any
/// other variant), which the poller propagates unchanged.
pub trait StatusResource: Send + Sync {
    /// Human-readable identifier used in logs.
    fn name(&self) -> &str;

    /// Read the current status.
    fn status(&self) -> impl Future<Output = Result<String>> + Send;

    /// Start time (epoch milliseconds) of the last operation issued against
    /// the resource, if known.
    fn last_operation_at(&self) -> Option<i64> {
        None
    }

    /// Returns `true` if the resource has been updated after `timestamp`.
    ///
    /// Used to tell a status produced by the last operation apart from a
    /// stale one left over from an earlier operation.
    fn updated_after(&self, timestamp: i64) -> impl Future<Output = Result<bool>> + Send;

    /// Fetch the resource's event history.
    fn fetch_log(&self) -> impl Future<Output = Result<Vec<EventLogEntry>>> + Send;

    /// Upper bound on how old a value returned by [`status`](Self::status)
    /// may be. Consecutive reads closer together than this may return the
    /// same cached value.
    fn status_freshness(&self) -> Duration {
        Duration::ZERO
    }
}

// =============================================================================
// StatusSets
// =============================================================================

/// Role a status plays for one wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusRole {
    /// Target state; waiting succeeded.
    Final,
    /// Known intermediate state; keep waiting.
    Accepted,
    /// Anything else; stop waiting.
    Unexpected,
}

/// The final, accepted and hard-failure statuses of one wait.
///
/// ```
/// use resource_poller::poller::{StatusRole, StatusSets};
///
/// let sets = StatusSets::new(["Running"], ["Requested", "Executing"]).unwrap();
/// assert_eq!(sets.classify("Executing"), StatusRole::Accepted);
/// assert_eq!(sets.classify("Error"), StatusRole::Unexpected);
/// assert!(sets.is_failure("Error"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSets {
    final_statuses: BTreeSet<String>,
    accepted_statuses: BTreeSet<String>,
    failure_statuses: BTreeSet<String>,
}

/// Hard-failure statuses used unless overridden.
pub const DEFAULT_FAILURE_STATUSES: &[&str] = &["Error"];

impl StatusSets {
    /// Create the sets for one wait.
    ///
    /// # Errors
    ///
    /// Returns [`PollerError::Config`] if `final_statuses` is empty or shares
    /// a value with `accepted_statuses`.
    pub fn new<F, A>(
        final_statuses: impl IntoIterator<Item = F>,
        accepted_statuses: impl IntoIterator<Item = A>,
    ) -> Result<Self>
    where
        F: Into<String>,
        A: Into<String>,
    {
        let final_statuses: BTreeSet<String> =
            final_statuses.into_iter().map(Into::into).collect();
        let accepted_statuses: BTreeSet<String> =
            accepted_statuses.into_iter().map(Into::into).collect();

        if final_statuses.is_empty() {
            return Err(PollerError::Config(
                "at least one final status is required".to_string(),
            ));
        }
        if let Some(both) = final_statuses.intersection(&accepted_statuses).next() {
            return Err(PollerError::Config(format!(
                "status '{both}' cannot be both final and accepted"
            )));
        }

        Ok(Self {
            final_statuses,
            accepted_statuses,
            failure_statuses: owned(DEFAULT_FAILURE_STATUSES),
        })
    }

    /// Replace the hard-failure statuses.
    ///
    /// # Errors
    ///
    /// Returns [`PollerError::Config`] if a failure status is also final.
    pub fn with_failure_statuses<S: Into<String>>(
        mut self,
        failure_statuses: impl IntoIterator<Item = S>,
    ) -> Result<Self> {
        let failure_statuses: BTreeSet<String> =
            failure_statuses.into_iter().map(Into::into).collect();
        if let Some(both) = self.final_statuses.intersection(&failure_statuses).next() {
            return Err(PollerError::Config(format!(
                "status '{both}' cannot be both final and a failure"
            )));
        }
        self.failure_statuses = failure_statuses;
        Ok(self)
    }

    /// Wait for a launch to reach `Running`.
    #[must_use]
    pub fn running() -> Self {
        Self::preset(&["Running"], &["Requested", "Launching", "Executing", "Unknown"])
    }

    /// Wait for an environment or service to become `Active`.
    #[must_use]
    pub fn active() -> Self {
        Self::preset(&["Active"], &["Requested", "Launching", "Executing", "Unknown"])
    }

    /// Wait for a destroy to complete.
    #[must_use]
    pub fn destroyed() -> Self {
        Self::preset(&["Destroyed"], &["Destroying", "Executing", "Unknown"])
    }

    fn preset(final_statuses: &[&str], accepted_statuses: &[&str]) -> Self {
        Self {
            final_statuses: owned(final_statuses),
            accepted_statuses: owned(accepted_statuses),
            failure_statuses: owned(DEFAULT_FAILURE_STATUSES),
        }
    }

    #[must_use]
    pub fn classify(&self, status: &str) -> StatusRole {
        if self.final_statuses.contains(status) {
            StatusRole::Final
        } else if self.accepted_statuses.contains(status) {
            StatusRole::Accepted
        } else {
            StatusRole::Unexpected
        }
    }

    #[must_use]
    pub fn is_final(&self, status: &str) -> bool {
        self.final_statuses.contains(status)
    }

    #[must_use]
    pub fn is_failure(&self, status: &str) -> bool {
        self.failure_statuses.contains(status)
    }

    pub fn final_statuses(&self) -> impl Iterator<Item = &str> {
        self.final_statuses.iter().map(String::as_str)
    }

    pub fn accepted_statuses(&self) -> impl Iterator<Item = &str> {
        self.accepted_statuses.iter().map(String::as_str)
    }

    pub fn failure_statuses(&self) -> impl Iterator<Item = &str> {
        self.failure_statuses.iter().map(String::as_str)
    }
}

fn owned(list: &[&str]) -> BTreeSet<String> {
    list.iter().map(|s| (*s).to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        let sets = StatusSets::new(["Running"], ["Requested", "Executing"]).unwrap();

        assert_eq!(sets.classify("Running"), StatusRole::Final);
        assert_eq!(sets.classify("Requested"), StatusRole::Accepted);
        assert_eq!(sets.classify("Error"), StatusRole::Unexpected);
        assert_eq!(sets.classify("running"), StatusRole::Unexpected);
    }

    #[test]
    fn test_empty_final_rejected() {
        let result = StatusSets::new(Vec::<String>::new(), ["Requested"]);
        assert!(matches!(result, Err(PollerError::Config(_))));
    }

    #[test]
    fn test_overlap_rejected() {
        let result = StatusSets::new(["Running"], ["Running", "Requested"]);
        assert!(matches!(result, Err(PollerError::Config(_))));

        let result = StatusSets::new(["Running"], ["Requested"])
            .unwrap()
            .with_failure_statuses(["Running"]);
        assert!(matches!(result, Err(PollerError::Config(_))));
    }

    #[test]
    fn test_failure_statuses() {
        let sets = StatusSets::new(["Destroyed"], ["Destroying"]).unwrap();
        assert!(sets.is_failure("Error"));

        let sets = sets.with_failure_statuses(["Error", "Canceled"]).unwrap();
        assert!(sets.is_failure("Canceled"));
        assert_eq!(sets.failure_statuses().count(), 2);
    }

    #[test]
    fn test_presets() {
        assert!(StatusSets::running().is_final("Running"));
        assert_eq!(StatusSets::active().classify("Launching"), StatusRole::Accepted);
        assert_eq!(StatusSets::destroyed().classify("Destroying"), StatusRole::Accepted);
        assert_eq!(StatusSets::destroyed().classify("Running"), StatusRole::Unexpected);
    }
}
