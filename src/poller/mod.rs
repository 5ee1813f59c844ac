// SPDX-License-Identifier: MIT OR Apache-2.0

//! Readiness polling for remote resources.
//!
//! A resource implements [`StatusResource`]; the [`Poller`] observes it
//! until its status reaches a final value, stays in an accepted value past
//! the schedule, or turns into something unexpected.
//!
//! # Example
//!
//! ```
//! use resource_poller::poller::wait_for_status;
//! use resource_poller::runtime::RetrySchedule;
//! use resource_poller::testkit::ScriptedResource;
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> resource_poller::Result<()> {
//! let app = ScriptedResource::new("app").statuses(["Requested", "Running"]);
//! let schedule = RetrySchedule::new(10, Duration::from_millis(1), 1.0)?;
//!
//! let ready = wait_for_status(&app, ["Running"], ["Requested", "Executing"], &schedule).await?;
//! assert!(ready);
//! # Ok(())
//! # }
//! ```
//!
//! Note that the default consistency guard sleeps one second before its
//! first read; use [`PollerConfig::with_guard`] for faster loops.

mod status;
mod wait;

pub use status::{StatusResource, StatusRole, StatusSets, DEFAULT_FAILURE_STATUSES};
pub use wait::{wait_for_status, PollOutcome, PollReport, Poller, PollerConfig};
