// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use resource_poller::runtime::retry_catching;
use resource_poller::{
    retry, ErrorKind, ErrorKindSet, EventLog, EventLogEntry, LogFilter, PollOutcome, Poller,
    PollerConfig, PollerError, RetrySchedule, Severity, StatusResource, StatusSets,
};

const LAUNCH_EVENTS: &str = r#"[
    {"time": 1700000004000, "severity": "INFO", "eventTypeText": "status updated", "description": "Running"},
    {"time": 1700000001000, "severity": "INFO", "eventTypeText": "workflow started", "description": "launch"},
    {"time": 1700000000500, "severity": "INFO", "eventTypeText": "status updated", "description": "Requested"},
    {"time": 1700000002000, "severity": "DEBUG", "eventTypeText": "step started", "description": "provision-vms"},
    {"time": 1700000002500, "severity": "INFO", "eventTypeText": "command started", "description": "install"},
    {"time": 1700000003000, "severity": "INFO", "eventTypeText": "workflow finished", "description": "launch with status 'Succeeded'"}
]"#;

/// Stands in for an application instance behind the HTTP client layer.
struct MockInstance {
    statuses: Mutex<Vec<&'static str>>,
    log_json: &'static str,
    flaky_log_fetches: AtomicUsize,
}

impl MockInstance {
    fn new(statuses: &[&'static str], log_json: &'static str) -> Self {
        let mut statuses = statuses.to_vec();
        statuses.reverse();
        Self {
            statuses: Mutex::new(statuses),
            log_json,
            flaky_log_fetches: AtomicUsize::new(0),
        }
    }

    fn with_flaky_log(self, failures: usize) -> Self {
        self.flaky_log_fetches.store(failures, Ordering::SeqCst);
        self
    }
}

impl StatusResource for MockInstance {
    fn name(&self) -> &str {
        "instance-42"
    }

    async fn status(&self) -> resource_poller::Result<String> {
        let mut statuses = self.statuses.lock().unwrap();
        let status = if statuses.len() > 1 {
            statuses.pop().unwrap()
        } else {
            statuses[0]
        };
        Ok(status.to_string())
    }

    async fn updated_after(&self, _timestamp: i64) -> resource_poller::Result<bool> {
        Ok(true)
    }

    async fn fetch_log(&self) -> resource_poller::Result<Vec<EventLogEntry>> {
        let remaining = self.flaky_log_fetches.load(Ordering::SeqCst);
        if remaining > 0 {
            self.flaky_log_fetches.store(remaining - 1, Ordering::SeqCst);
            return Err(PollerError::Transport("502 Bad Gateway".to_string()));
        }
        Ok(EventLog::from_json(self.log_json)?.entries().to_vec())
    }
}

fn fast_poller() -> Poller {
    Poller::with_config(
        PollerConfig::new().with_guard(RetrySchedule::exponential(2, Duration::from_millis(10))),
    )
}

#[tokio::test(start_paused = true)]
async fn test_launch_then_inspect_history() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let instance = MockInstance::new(
        &["Requested", "Executing", "Executing", "Running"],
        LAUNCH_EVENTS,
    );
    let schedule = RetrySchedule::new(10, Duration::from_millis(500), 1.5).unwrap();

    let report = fast_poller()
        .wait(&instance, &StatusSets::running(), &schedule)
        .await
        .unwrap();

    assert!(report.is_ready());
    assert_eq!(report.resource, "instance-42");
    assert!(report.diagnostic.is_none());

    let log = EventLog::new(instance.fetch_log().await.unwrap());
    let launch = log
        .get_interval(
            Some("workflow started: launch"),
            Some("workflow finished: launch with status 'Succeeded'"),
        )
        .unwrap();

    assert_eq!(launch.by_index(0).as_deref(), Some("workflow started: launch"));
    assert_eq!(
        launch.by_index(launch.len() - 1).as_deref(),
        Some("workflow finished: launch with status 'Succeeded'")
    );
    assert!(launch.contains("command started: install"));
    assert!(!launch.contains("status updated: Running"));

    let info = launch.filter(&LogFilter::new().severity(Severity::Info));
    assert_eq!(info.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_failed_launch_reports_diagnostic() {
    const FAILED_EVENTS: &str = r#"[
        {"time": 3, "severity": "ERROR", "eventTypeText": "step finished", "description": "provision-vms failed: quota exceeded"},
        {"time": 1, "severity": "INFO", "eventTypeText": "workflow started", "description": "launch"},
        {"time": 4, "severity": "INFO", "eventTypeText": "status updated", "description": "Error"}
    ]"#;
    let instance = MockInstance::new(&["Requested", "Executing", "Error"], FAILED_EVENTS);

    let report = fast_poller()
        .wait(&instance, &StatusSets::running(), &RetrySchedule::for_minutes(1))
        .await
        .unwrap();

    assert_eq!(report.outcome, PollOutcome::Failed);
    assert_eq!(report.status, "Error");

    let diagnostic = report.diagnostic.expect("diagnostic for a failed wait");
    let errors = diagnostic.filter(&LogFilter::new().severity(Severity::Error));
    assert_eq!(
        errors.by_index(0).as_deref(),
        Some("step finished: provision-vms failed: quota exceeded")
    );
}

#[tokio::test(start_paused = true)]
async fn test_flaky_log_fetch_with_catching_retry() {
    let instance = MockInstance::new(&["Running"], LAUNCH_EVENTS).with_flaky_log(2);
    let schedule = RetrySchedule::builder()
        .max_attempts(3)
        .initial_delay(Duration::from_millis(200))
        .catching([ErrorKind::Transport])
        .build()
        .unwrap();

    let entries = retry(&schedule, || instance.fetch_log()).await.unwrap();
    assert_eq!(entries.len(), 6);
}

#[tokio::test(start_paused = true)]
async fn test_catching_retry_surfaces_final_error() {
    let instance = MockInstance::new(&["Running"], LAUNCH_EVENTS).with_flaky_log(10);
    let schedule = RetrySchedule::new(2, Duration::from_millis(50), 2.0).unwrap();
    let kinds = ErrorKindSet::from([ErrorKind::Transport]);

    let result = retry_catching(&schedule, &kinds, || instance.fetch_log()).await;

    match result {
        Err(PollerError::Transport(msg)) => assert_eq!(msg, "502 Bad Gateway"),
        other => panic!("expected transport error, got {other:?}"),
    }
    // two guarded attempts and one unguarded
    assert_eq!(instance.flaky_log_fetches.load(Ordering::SeqCst), 7);
}
