// SPDX-License-Identifier: MIT OR Apache-2.0

//! Runtime utilities for polling remote resources.
//!
//! This module provides the retry/backoff combinator the poller is built on
//! and the level-selectable logging used for diagnostics.

mod logging;
mod retry;

pub use logging::{emit, LogLevel};
pub use retry::{
    retry, retry_bool, retry_catching, ErrorKindSet, RetryMode, RetryOutcome, RetrySchedule,
    RetryScheduleBuilder,
};
