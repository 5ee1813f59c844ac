// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retry schedules and the backoff combinator.
//!
//! A [`RetrySchedule`] describes how often an action is attempted and how
//! long to sleep before each attempt. Two modes exist:
//!
//! - [`RetryMode::Bool`]: the action's *value* decides. A successful value
//!   (see [`RetryOutcome`]) stops the loop; an unsuccessful one consumes an
//!   attempt. Errors are never retried.
//! - [`RetryMode::Catch`]: the action's *errors* decide. Any `Ok` stops the
//!   loop; errors of a listed [`ErrorKind`] consume an attempt. When the
//!   attempts run out the action is invoked one last time without
//!   interception, so the caller sees the real final error.
//!
//! The delay before every attempt, including the first, is the current
//! delay; it is multiplied by the backoff factor after each failed attempt.
//!
//! # Example
//!
//! ```
//! use resource_poller::runtime::RetrySchedule;
//! use std::time::Duration;
//!
//! let schedule = RetrySchedule::builder()
//!     .max_attempts(5)
//!     .initial_delay(Duration::from_millis(100))
//!     .backoff_factor(2.0)
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(schedule.worst_case_duration(), Duration::from_millis(3100));
//! ```

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{AsErrorKind, ErrorKind, PollerError, Result};
use crate::events::EventLog;

// =============================================================================
// Retry Outcome
// =============================================================================

/// Decides whether a value returned by a boolean-mode action counts as success.
pub trait RetryOutcome {
    /// Returns `true` if the value should stop the retry loop.
    fn is_success(&self) -> bool;
}

impl RetryOutcome for bool {
    fn is_success(&self) -> bool {
        *self
    }
}

impl<T> RetryOutcome for Option<T> {
    fn is_success(&self) -> bool {
        self.is_some()
    }
}

impl<T> RetryOutcome for Vec<T> {
    fn is_success(&self) -> bool {
        !self.is_empty()
    }
}

impl RetryOutcome for () {
    fn is_success(&self) -> bool {
        true
    }
}

impl RetryOutcome for String {
    fn is_success(&self) -> bool {
        !self.is_empty()
    }
}

impl RetryOutcome for EventLog {
    fn is_success(&self) -> bool {
        !self.is_empty()
    }
}

// =============================================================================
// Retry Mode
// =============================================================================

/// Set of error kinds that a catching retry intercepts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorKindSet(Vec<ErrorKind>);

impl ErrorKindSet {
    /// Create a set from a list of kinds.
    #[must_use]
    pub fn new(kinds: impl IntoIterator<Item = ErrorKind>) -> Self {
        kinds.into_iter().collect()
    }

    /// Returns `true` if `kind` is intercepted.
    #[must_use]
    pub fn contains(&self, kind: ErrorKind) -> bool {
        self.0.contains(&kind)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<ErrorKind> for ErrorKindSet {
    fn from_iter<I: IntoIterator<Item = ErrorKind>>(iter: I) -> Self {
        let mut kinds = Vec::new();
        for kind in iter {
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
        Self(kinds)
    }
}

impl<const N: usize> From<[ErrorKind; N]> for ErrorKindSet {
    fn from(kinds: [ErrorKind; N]) -> Self {
        kinds.into_iter().collect()
    }
}

/// How a [`RetrySchedule`] judges an attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RetryMode {
    /// Retry while the action returns an unsuccessful value.
    #[default]
    Bool,
    /// Retry while the action fails with one of the listed error kinds.
    Catch(ErrorKindSet),
}

// =============================================================================
// Retry Schedule
// =============================================================================

/// Immutable description of a retry loop.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrySchedule {
    max_attempts: u32,
    initial_delay: Duration,
    backoff_factor: f64,
    max_delay: Option<Duration>,
    mode: RetryMode,
}

impl RetrySchedule {
    /// Create a boolean-mode schedule.
    ///
    /// # Errors
    ///
    /// Returns [`PollerError::Config`] if `max_attempts` is zero or
    /// `backoff_factor` is below 1 or not finite.
    pub fn new(max_attempts: u32, initial_delay: Duration, backoff_factor: f64) -> Result<Self> {
        Self::builder()
            .max_attempts(max_attempts)
            .initial_delay(initial_delay)
            .backoff_factor(backoff_factor)
            .build()
    }

    /// Create a configuration builder.
    #[must_use]
    pub fn builder() -> RetryScheduleBuilder {
        RetryScheduleBuilder::new()
    }

    /// Boolean-mode schedule doubling the delay after each failed attempt.
    ///
    /// A `max_attempts` of zero is treated as one.
    #[must_use]
    pub fn exponential(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            backoff_factor: 2.0,
            max_delay: None,
            mode: RetryMode::Bool,
        }
    }

    /// Fixed three-second polling for roughly `minutes` minutes.
    ///
    /// Matches the platform convention of twenty polls per minute.
    #[must_use]
    pub fn for_minutes(minutes: u32) -> Self {
        Self {
            max_attempts: minutes.saturating_mul(20).max(1),
            initial_delay: Duration::from_secs(3),
            backoff_factor: 1.0,
            max_delay: None,
            mode: RetryMode::Bool,
        }
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[must_use]
    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    #[must_use]
    pub fn backoff_factor(&self) -> f64 {
        self.backoff_factor
    }

    #[must_use]
    pub fn max_delay(&self) -> Option<Duration> {
        self.max_delay
    }

    #[must_use]
    pub fn mode(&self) -> &RetryMode {
        &self.mode
    }

    /// Same schedule with a different mode.
    ///
    /// # Errors
    ///
    /// Returns [`PollerError::Config`] for a catching mode with no error kinds.
    pub fn with_mode(&self, mode: RetryMode) -> Result<Self> {
        validate_mode(&mode)?;
        Ok(Self {
            mode,
            ..self.clone()
        })
    }

    /// Same schedule starting from a different initial delay.
    #[must_use]
    pub fn with_initial_delay(&self, initial_delay: Duration) -> Self {
        Self {
            initial_delay,
            ..self.clone()
        }
    }

    /// Delay slept before the given 0-indexed attempt.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let mut delay = self.cap(self.initial_delay);
        for _ in 0..attempt {
            delay = self.next_delay(delay);
        }
        delay
    }

    /// Total time slept if every attempt fails.
    ///
    /// This is the wall-clock bound of the loop, excluding the time spent
    /// inside the action itself.
    #[must_use]
    pub fn worst_case_duration(&self) -> Duration {
        let mut total = Duration::ZERO;
        let mut delay = self.cap(self.initial_delay);
        for _ in 0..self.max_attempts {
            total = total.saturating_add(delay);
            delay = self.next_delay(delay);
        }
        total
    }

    fn next_delay(&self, current: Duration) -> Duration {
        let grown = Duration::try_from_secs_f64(current.as_secs_f64() * self.backoff_factor)
            .unwrap_or(Duration::MAX);
        self.cap(grown)
    }

    fn cap(&self, delay: Duration) -> Duration {
        match self.max_delay {
            Some(max) => delay.min(max),
            None => delay,
        }
    }
}

impl Default for RetrySchedule {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_delay: Duration::from_secs(1),
            backoff_factor: 2.0,
            max_delay: None,
            mode: RetryMode::Bool,
        }
    }
}

fn validate_mode(mode: &RetryMode) -> Result<()> {
    match mode {
        RetryMode::Catch(kinds) if kinds.is_empty() => Err(PollerError::Config(
            "catching retry needs at least one error kind".to_string(),
        )),
        _ => Ok(()),
    }
}

/// Builder for [`RetrySchedule`].
#[derive(Debug, Clone)]
pub struct RetryScheduleBuilder {
    max_attempts: u32,
    initial_delay: Duration,
    backoff_factor: f64,
    max_delay: Option<Duration>,
    mode: RetryMode,
}

impl RetryScheduleBuilder {
    /// Create a new builder with defaults.
    #[must_use]
    pub fn new() -> Self {
        let defaults = RetrySchedule::default();
        Self {
            max_attempts: defaults.max_attempts,
            initial_delay: defaults.initial_delay,
            backoff_factor: defaults.backoff_factor,
            max_delay: defaults.max_delay,
            mode: defaults.mode,
        }
    }

    /// Set the number of attempts.
    #[must_use]
    pub fn max_attempts(mut self, max: u32) -> Self {
        self.max_attempts = max;
        self
    }

    /// Set the delay before the first attempt.
    #[must_use]
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the multiplier applied to the delay after each failed attempt.
    #[must_use]
    pub fn backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = factor;
        self
    }

    /// Cap every delay at `max`.
    #[must_use]
    pub fn max_delay(mut self, max: Duration) -> Self {
        self.max_delay = Some(max);
        self
    }

    /// Retry on errors of the given kinds instead of on unsuccessful values.
    #[must_use]
    pub fn catching(mut self, kinds: impl Into<ErrorKindSet>) -> Self {
        self.mode = RetryMode::Catch(kinds.into());
        self
    }

    /// Set the mode explicitly.
    #[must_use]
    pub fn mode(mut self, mode: RetryMode) -> Self {
        self.mode = mode;
        self
    }

    /// Build the schedule.
    ///
    /// # Errors
    ///
    /// Returns [`PollerError::Config`] when `max_attempts` is zero, the
    /// backoff factor is below 1 or not finite, or a catching mode lists
    /// no error kinds.
    pub fn build(self) -> Result<RetrySchedule> {
        if self.max_attempts == 0 {
            return Err(PollerError::Config(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            return Err(PollerError::Config(format!(
                "backoff_factor must be a finite number >= 1, got {}",
                self.backoff_factor
            )));
        }
        validate_mode(&self.mode)?;

        Ok(RetrySchedule {
            max_attempts: self.max_attempts,
            initial_delay: self.initial_delay,
            backoff_factor: self.backoff_factor,
            max_delay: self.max_delay,
            mode: self.mode,
        })
    }
}

impl Default for RetryScheduleBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Combinator
// =============================================================================

/// Per-call loop counters.
#[derive(Debug)]
struct PollState {
    attempts_remaining: u32,
    current_delay: Duration,
}

impl PollState {
    fn new(schedule: &RetrySchedule) -> Self {
        Self {
            attempts_remaining: schedule.max_attempts,
            current_delay: schedule.cap(schedule.initial_delay),
        }
    }

    fn attempt(&self, schedule: &RetrySchedule) -> u32 {
        schedule.max_attempts - self.attempts_remaining + 1
    }

    /// Records a failed attempt. Returns `true` while attempts remain.
    fn consume(&mut self, schedule: &RetrySchedule) -> bool {
        self.current_delay = schedule.next_delay(self.current_delay);
        self.attempts_remaining -= 1;
        self.attempts_remaining > 0
    }
}

/// Run `action` according to the schedule's [`RetryMode`].
///
/// `T` must implement [`RetryOutcome`] because the mode is only known at
/// run time. Actions whose value has no notion of success, and which are
/// only ever retried on errors, can call [`retry_catching`] directly.
pub async fn retry<T, E, F, Fut>(schedule: &RetrySchedule, action: F) -> std::result::Result<T, E>
where
    T: RetryOutcome,
    E: AsErrorKind,
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
{
    match schedule.mode() {
        RetryMode::Bool => retry_bool(schedule, action).await,
        RetryMode::Catch(kinds) => retry_catching(schedule, kinds, action).await,
    }
}

/// Retry while `action` yields an unsuccessful value.
///
/// Returns the first successful value, or the last unsuccessful one once
/// `max_attempts` invocations have been made. Errors propagate immediately.
pub async fn retry_bool<T, E, F, Fut>(
    schedule: &RetrySchedule,
    mut action: F,
) -> std::result::Result<T, E>
where
    T: RetryOutcome,
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
{
    let mut state = PollState::new(schedule);

    loop {
        debug!(
            target: "resource_poller::retry",
            attempt = state.attempt(schedule),
            max_attempts = schedule.max_attempts,
            delay_ms = state.current_delay.as_millis() as u64,
            "waiting before attempt"
        );
        tokio::time::sleep(state.current_delay).await;

        let value = action().await?;
        if value.is_success() {
            return Ok(value);
        }

        if !state.consume(schedule) {
            warn!(
                target: "resource_poller::retry",
                attempts = schedule.max_attempts,
                "retry attempts exhausted"
            );
            return Ok(value);
        }
    }
}

/// Retry while `action` fails with an error whose kind is in `kinds`.
///
/// Any `Ok` value is returned immediately. Errors of other kinds propagate
/// immediately. After `max_attempts` intercepted failures the action runs
/// once more without interception and its result is returned as is.
pub async fn retry_catching<T, E, F, Fut>(
    schedule: &RetrySchedule,
    kinds: &ErrorKindSet,
    mut action: F,
) -> std::result::Result<T, E>
where
    E: AsErrorKind,
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
{
    let mut state = PollState::new(schedule);

    loop {
        debug!(
            target: "resource_poller::retry",
            attempt = state.attempt(schedule),
            max_attempts = schedule.max_attempts,
            delay_ms = state.current_delay.as_millis() as u64,
            "waiting before guarded attempt"
        );
        tokio::time::sleep(state.current_delay).await;

        match action().await {
            Ok(value) => return Ok(value),
            Err(e) if kinds.contains(e.error_kind()) => {
                debug!(
                    target: "resource_poller::retry",
                    kind = ?e.error_kind(),
                    "intercepted error"
                );
                if !state.consume(schedule) {
                    break;
                }
            }
            Err(e) => return Err(e),
        }
    }

    warn!(
        target: "resource_poller::retry",
        attempts = schedule.max_attempts,
        "retry attempts exhausted, running final unguarded attempt"
    );
    action().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn schedule(attempts: u32) -> RetrySchedule {
        RetrySchedule::builder()
            .max_attempts(attempts)
            .initial_delay(Duration::from_millis(100))
            .backoff_factor(2.0)
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_rejects_zero_attempts() {
        let result = RetrySchedule::builder().max_attempts(0).build();
        assert!(matches!(result, Err(PollerError::Config(_))));
    }

    #[test]
    fn test_builder_rejects_shrinking_backoff() {
        let result = RetrySchedule::builder().backoff_factor(0.5).build();
        assert!(matches!(result, Err(PollerError::Config(_))));

        let result = RetrySchedule::builder().backoff_factor(f64::NAN).build();
        assert!(matches!(result, Err(PollerError::Config(_))));
    }

    #[test]
    fn test_builder_rejects_empty_catch() {
        let result = RetrySchedule::builder()
            .mode(RetryMode::Catch(ErrorKindSet::default()))
            .build();
        assert!(matches!(result, Err(PollerError::Config(_))));
    }

    #[test]
    fn test_delay_growth() {
        let s = schedule(4);
        assert_eq!(s.delay_for(0), Duration::from_millis(100));
        assert_eq!(s.delay_for(1), Duration::from_millis(200));
        assert_eq!(s.delay_for(3), Duration::from_millis(800));
        assert_eq!(s.worst_case_duration(), Duration::from_millis(1500));
    }

    #[test]
    fn test_delay_cap() {
        let s = RetrySchedule::builder()
            .max_attempts(5)
            .initial_delay(Duration::from_millis(100))
            .max_delay(Duration::from_millis(250))
            .build()
            .unwrap();
        assert_eq!(s.delay_for(4), Duration::from_millis(250));
        assert_eq!(s.worst_case_duration(), Duration::from_millis(1050));
    }

    #[test]
    fn test_exponential() {
        let s = RetrySchedule::exponential(0, Duration::from_millis(10));
        assert_eq!(s.max_attempts(), 1);
        assert_eq!(s.backoff_factor(), 2.0);
    }

    #[test]
    fn test_for_minutes() {
        let s = RetrySchedule::for_minutes(3);
        assert_eq!(s.max_attempts(), 60);
        assert_eq!(s.worst_case_duration(), Duration::from_secs(180));
    }

    #[test]
    fn test_error_kind_set_dedups() {
        let set = ErrorKindSet::new([ErrorKind::Transport, ErrorKind::Transport]);
        assert_eq!(set, ErrorKindSet::from([ErrorKind::Transport]));
        assert!(set.contains(ErrorKind::Transport));
        assert!(!set.contains(ErrorKind::Api));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bool_success_on_kth_attempt() {
        let calls = Cell::new(0u32);
        let result: Result<bool> = retry_bool(&schedule(5), || {
            calls.set(calls.get() + 1);
            let n = calls.get();
            async move { Ok(n == 3) }
        })
        .await;

        assert!(result.unwrap());
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bool_exhaustion_is_not_an_error() {
        let calls = Cell::new(0u32);
        let start = tokio::time::Instant::now();
        let result: Result<Option<u32>> = retry_bool(&schedule(3), || {
            calls.set(calls.get() + 1);
            async { Ok(None) }
        })
        .await;

        assert_eq!(result.unwrap(), None);
        assert_eq!(calls.get(), 3);
        // 100 + 200 + 400, slept before every attempt including the first
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(700));
        assert!(elapsed < Duration::from_millis(800));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bool_mode_propagates_errors() {
        let calls = Cell::new(0u32);
        let result: Result<bool> = retry_bool(&schedule(5), || {
            calls.set(calls.get() + 1);
            async { Err(PollerError::Transport("connection reset".into())) }
        })
        .await;

        assert!(matches!(result, Err(PollerError::Transport(_))));
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_catch_returns_falsy_value_immediately() {
        let kinds = ErrorKindSet::from([ErrorKind::Transport]);
        let calls = Cell::new(0u32);
        let result: Result<bool> = retry_catching(&schedule(5), &kinds, || {
            calls.set(calls.get() + 1);
            async { Ok(false) }
        })
        .await;

        assert!(!result.unwrap());
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_catch_final_unguarded_success() {
        let kinds = ErrorKindSet::from([ErrorKind::Transport]);
        let calls = Cell::new(0u32);
        let result: Result<&str> = retry_catching(&schedule(3), &kinds, || {
            calls.set(calls.get() + 1);
            let n = calls.get();
            async move {
                if n <= 3 {
                    Err(PollerError::Transport(format!("attempt {n}")))
                } else {
                    Ok("done")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.get(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_catch_final_unguarded_error_is_the_real_one() {
        let kinds = ErrorKindSet::from([ErrorKind::Transport]);
        let calls = Cell::new(0u32);
        let result: Result<()> = retry_catching(&schedule(2), &kinds, || {
            calls.set(calls.get() + 1);
            let n = calls.get();
            async move { Err(PollerError::Transport(format!("attempt {n}"))) }
        })
        .await;

        match result {
            Err(PollerError::Transport(msg)) => assert_eq!(msg, "attempt 3"),
            other => panic!("expected transport error, got {other:?}"),
        }
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_catch_propagates_other_kinds() {
        let kinds = ErrorKindSet::from([ErrorKind::Transport]);
        let calls = Cell::new(0u32);
        let result: Result<()> = retry_catching(&schedule(5), &kinds, || {
            calls.set(calls.get() + 1);
            async { Err(PollerError::Api("forbidden".into())) }
        })
        .await;

        assert!(matches!(result, Err(PollerError::Api(_))));
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_catching_mode_wraps_string_and_log_actions() {
        let catching = schedule(3)
            .with_mode(RetryMode::Catch([ErrorKind::Transport].into()))
            .unwrap();
        let calls = Cell::new(0u32);
        let name: Result<String> = retry(&catching, || {
            calls.set(calls.get() + 1);
            let n = calls.get();
            async move {
                if n == 1 {
                    Err(PollerError::Transport("reset".into()))
                } else {
                    Ok(String::new())
                }
            }
        })
        .await;

        // an empty value is still returned as is in catching mode
        assert_eq!(name.unwrap(), "");
        assert_eq!(calls.get(), 2);

        let log: Result<EventLog> = retry(&catching, || async { Ok(EventLog::default()) }).await;
        assert!(log.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_dispatches_on_mode() {
        let catching = schedule(2)
            .with_mode(RetryMode::Catch([ErrorKind::NotFound].into()))
            .unwrap();
        let calls = Cell::new(0u32);
        let result: Result<bool> = retry(&catching, || {
            calls.set(calls.get() + 1);
            let n = calls.get();
            async move {
                if n == 1 {
                    Err(PollerError::NotFound("not yet".into()))
                } else {
                    Ok(false)
                }
            }
        })
        .await;

        assert!(!result.unwrap());
        assert_eq!(calls.get(), 2);
    }
}
