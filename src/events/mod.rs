// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event-log query engine.
//!
//! A resource's event history is fetched as an unordered batch of
//! [`EventLogEntry`] records. [`EventLog`] sorts the batch, filters it by
//! severity and time, looks entries up by regex, and extracts the interval
//! between two matched events. It is purely in-memory.
//!
//! # Example
//!
//! ```
//! use resource_poller::events::{EventLog, EventLogEntry, LogFilter, Severity};
//!
//! let log = EventLog::new(vec![
//!     EventLogEntry::new(30, Severity::Info, "workflow finished", "launch with status 'Failed'"),
//!     EventLogEntry::new(10, Severity::Info, "workflow started", "launch"),
//!     EventLogEntry::new(20, Severity::Error, "step finished", "install failed"),
//! ]);
//!
//! let launch = log
//!     .get_interval(Some("workflow started: launch"), Some("workflow finished: launch"))
//!     .unwrap();
//! let errors = launch.filter(&LogFilter::new().severity(Severity::Error));
//!
//! assert_eq!(errors.by_index(0).as_deref(), Some("step finished: install failed"));
//! ```

mod entry;
mod log;

pub use entry::{is_known_event_type, EventLogEntry, Severity, KNOWN_EVENT_TYPES};
pub use log::{EventLog, LogFilter, LogItem, LogKey, TIMESTAMP_THRESHOLD};
