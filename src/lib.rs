// SPDX-License-Identifier: MIT OR Apache-2.0

pub mod config;
pub mod error;
pub mod events;
pub mod poller;
pub mod runtime;
pub mod testkit;

pub use error::{AsErrorKind, ErrorKind, PollerError, Result};
pub use events::{EventLog, EventLogEntry, LogFilter, LogItem, LogKey, Severity};
pub use poller::{
    wait_for_status, PollOutcome, PollReport, Poller, PollerConfig, StatusResource, StatusSets,
};
pub use runtime::{retry, ErrorKindSet, RetryMode, RetrySchedule};
