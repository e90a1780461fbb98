//! Statistics collection and mocha-compatible JSON reporting.
//!
//! The [`StatsCollector`] subscribes to the engine's lifecycle
//! notifications and accumulates one [`TestRecord`] per executed file,
//! with wall-clock timing. The final [`TestReport`] serializes to the
//! mocha JSON reporter shape so existing dashboards can render it.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use async_trait::async_trait;
use serde::Serialize;

use runcheck_engine::{ExecutionFinished, ExecutionListener, ExecutionStarted};
use runcheck_types::{Result, RuncheckError, ValidationError};

// ---------------------------------------------------------------------------
// Report shape
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize)]
pub struct BasicStats {
    pub suites: usize,
    pub tests: usize,
    pub passes: usize,
    pub pending: usize,
    pub failures: usize,
    /// ISO-8601 timestamps.
    pub start: String,
    pub end: String,
    /// Whole-run wall time in milliseconds.
    pub duration: u64,
}

/// The mocha error shape carried by failed tests.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportError {
    pub message: String,
    pub code: String,
    pub expected: String,
    pub actual: String,
    pub generated_message: bool,
}

impl From<&ValidationError> for ReportError {
    fn from(err: &ValidationError) -> Self {
        Self {
            message: err.message.clone(),
            code: err.code.as_str().to_string(),
            expected: err.expected.clone(),
            actual: err.actual.clone(),
            generated_message: true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRecord {
    pub title: String,
    pub full_title: String,
    pub file: String,
    /// Per-test wall time in milliseconds.
    pub duration: u64,
    pub current_retry: u32,
    pub speed: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub err: Option<ReportError>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TestReport {
    pub stats: BasicStats,
    pub tests: Vec<TestRecord>,
    pub pending: Vec<TestRecord>,
    pub failures: Vec<TestRecord>,
    pub passes: Vec<TestRecord>,
}

// ---------------------------------------------------------------------------
// StatsCollector
// ---------------------------------------------------------------------------

struct Inner {
    report: TestReport,
    run_started: Option<Instant>,
    test_started: Option<Instant>,
}

/// Accumulates pass/fail records from lifecycle notifications.
///
/// Cloning yields another handle to the same accumulated state, so a clone
/// can be registered as a listener while the original keeps access to the
/// final report. Notifications arrive from a single logical thread of
/// control; the mutex only guards the handle sharing.
#[derive(Clone)]
pub struct StatsCollector {
    inner: Arc<Mutex<Inner>>,
}

impl StatsCollector {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                report: TestReport {
                    stats: BasicStats {
                        suites: 1,
                        ..BasicStats::default()
                    },
                    ..TestReport::default()
                },
                run_started: None,
                test_started: None,
            })),
        }
    }

    /// Mark the beginning of the whole run.
    pub fn start_measuring(&self) {
        tracing::info!("starting tests");
        let mut inner = self.inner.lock().expect("stats lock");
        inner.run_started = Some(Instant::now());
        inner.report.stats.start = chrono::Utc::now().to_rfc3339();
    }

    /// Mark the end of the whole run and fix the total duration.
    pub fn stop_measuring(&self) {
        let mut inner = self.inner.lock().expect("stats lock");
        let elapsed = inner
            .run_started
            .map(|t| t.elapsed().as_millis() as u64)
            .unwrap_or_default();
        inner.report.stats.end = chrono::Utc::now().to_rfc3339();
        inner.report.stats.duration = elapsed;
        tracing::info!(duration_ms = elapsed, "finished testing");
    }

    /// A copy of the report as accumulated so far.
    pub fn snapshot(&self) -> TestReport {
        self.inner.lock().expect("stats lock").report.clone()
    }

    /// Serialize the report as pretty JSON to `redirect` or, when `None`,
    /// to stdout.
    pub fn write(&self, redirect: Option<&Path>) -> Result<()> {
        let report = self.snapshot();
        let json = serde_json::to_string_pretty(&report)?;
        match redirect {
            Some(path) => {
                std::fs::write(path, json).map_err(RuncheckError::from)?;
                tracing::info!(path = %path.display(), "wrote test report");
            }
            None => println!("{json}"),
        }
        Ok(())
    }
}

impl Default for StatsCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExecutionListener for StatsCollector {
    async fn on_execution_started(&self, _event: &ExecutionStarted) {
        let mut inner = self.inner.lock().expect("stats lock");
        inner.test_started = Some(Instant::now());
    }

    async fn on_execution_finished(&self, event: &ExecutionFinished) {
        let mut inner = self.inner.lock().expect("stats lock");
        let duration = inner
            .test_started
            .take()
            .map(|t| t.elapsed().as_millis() as u64)
            .unwrap_or_default();

        let (title, full_title) = if event.succeeded {
            (
                format!("{}: Passed test", event.language),
                format!(
                    "{}: Passed test with exit code: {} after {} steps",
                    event.language, event.exit_code, event.step_index
                ),
            )
        } else {
            let detail = match (&event.step, &event.validation_error) {
                (Some(step), _) => format!(
                    "with exit code: {} at step {} -> {}",
                    event.exit_code, event.step_index, step
                ),
                (None, Some(err)) => format!("on output validation: {}", err.code),
                (None, None) => format!("with exit code: {}", event.exit_code),
            };
            (
                format!("{}: Failed test", event.language),
                format!("{}: Failed test {detail}", event.language),
            )
        };

        let record = TestRecord {
            title,
            full_title,
            file: event.file.display().to_string(),
            duration,
            // Retries are not supported; fixed for report compatibility.
            current_retry: 1,
            speed: "Standard".to_string(),
            err: event.validation_error.as_ref().map(ReportError::from),
        };

        inner.report.stats.tests += 1;
        if event.succeeded {
            inner.report.stats.passes += 1;
            inner.report.passes.push(record.clone());
        } else {
            inner.report.stats.failures += 1;
            inner.report.failures.push(record.clone());
        }
        inner.report.tests.push(record);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use runcheck_types::{StepConfig, ValidationCode};
    use std::path::PathBuf;

    fn started(file: &str) -> ExecutionStarted {
        ExecutionStarted {
            file: PathBuf::from(file),
            language: "c".into(),
        }
    }

    fn finished_ok(file: &str) -> ExecutionFinished {
        ExecutionFinished {
            file: PathBuf::from(file),
            language: "c".into(),
            succeeded: true,
            step_index: 2,
            step: None,
            exit_code: 0,
            validation_error: None,
        }
    }

    fn finished_failed_step(file: &str) -> ExecutionFinished {
        ExecutionFinished {
            file: PathBuf::from(file),
            language: "c".into(),
            succeeded: false,
            step_index: 1,
            step: Some(StepConfig {
                runtime: "gcc".into(),
                command: "-o {0}".into(),
                args: vec!["FILE_NAME_WEX".into()],
            }),
            exit_code: 2,
            validation_error: None,
        }
    }

    fn finished_failed_validation(file: &str) -> ExecutionFinished {
        ExecutionFinished {
            file: PathBuf::from(file),
            language: "c".into(),
            succeeded: false,
            step_index: 2,
            step: None,
            exit_code: 0,
            validation_error: Some(ValidationError::new(
                ValidationCode::IncorrectResult,
                "Output value does not match expected value",
                "3.14",
                "3.20",
            )),
        }
    }

    #[tokio::test]
    async fn pass_and_fail_records_sorted_into_buckets() {
        let collector = StatsCollector::new();
        collector.start_measuring();

        collector.on_execution_started(&started("a.c")).await;
        collector.on_execution_finished(&finished_ok("a.c")).await;
        collector.on_execution_started(&started("b.c")).await;
        collector
            .on_execution_finished(&finished_failed_step("b.c"))
            .await;

        collector.stop_measuring();
        let report = collector.snapshot();

        assert_eq!(report.stats.suites, 1);
        assert_eq!(report.stats.tests, 2);
        assert_eq!(report.stats.passes, 1);
        assert_eq!(report.stats.failures, 1);
        assert_eq!(report.tests.len(), 2);
        assert_eq!(report.passes.len(), 1);
        assert_eq!(report.failures.len(), 1);
        assert!(!report.stats.start.is_empty());
        assert!(!report.stats.end.is_empty());
    }

    #[tokio::test]
    async fn titles_describe_the_outcome() {
        let collector = StatsCollector::new();
        collector.on_execution_started(&started("a.c")).await;
        collector.on_execution_finished(&finished_ok("a.c")).await;
        collector.on_execution_started(&started("b.c")).await;
        collector
            .on_execution_finished(&finished_failed_step("b.c"))
            .await;

        let report = collector.snapshot();
        assert_eq!(report.passes[0].title, "c: Passed test");
        assert_eq!(
            report.passes[0].full_title,
            "c: Passed test with exit code: 0 after 2 steps"
        );
        assert!(report.failures[0]
            .full_title
            .contains("with exit code: 2 at step 1 -> runtime: gcc"));
    }

    #[tokio::test]
    async fn validation_failure_carries_mocha_error() {
        let collector = StatsCollector::new();
        collector.on_execution_started(&started("a.c")).await;
        collector
            .on_execution_finished(&finished_failed_validation("a.c"))
            .await;

        let report = collector.snapshot();
        let err = report.failures[0].err.as_ref().unwrap();
        assert_eq!(err.code, "ERR_INCORRECT_RESULT");
        assert_eq!(err.expected, "3.14");
        assert_eq!(err.actual, "3.20");
        assert!(err.generated_message);
    }

    #[tokio::test]
    async fn report_serializes_with_mocha_field_names() {
        let collector = StatsCollector::new();
        collector.on_execution_started(&started("a.c")).await;
        collector
            .on_execution_finished(&finished_failed_validation("a.c"))
            .await;

        let json = serde_json::to_string_pretty(&collector.snapshot()).unwrap();
        assert!(json.contains("\"fullTitle\""));
        assert!(json.contains("\"currentRetry\""));
        assert!(json.contains("\"generatedMessage\""));
        assert!(json.contains("\"ERR_INCORRECT_RESULT\""));
        // Passed records have no err field at all.
        let report = collector.snapshot();
        assert!(report.failures[0].err.is_some());
    }

    #[tokio::test]
    async fn write_redirects_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");

        let collector = StatsCollector::new();
        collector.on_execution_started(&started("a.c")).await;
        collector.on_execution_finished(&finished_ok("a.c")).await;
        collector.write(Some(&path)).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed["stats"]["passes"], 1);
        assert_eq!(parsed["passes"][0]["file"], "a.c");
    }

    #[test]
    fn clones_share_state() {
        let collector = StatsCollector::new();
        let handle = collector.clone();
        collector.start_measuring();
        assert!(!handle.snapshot().stats.start.is_empty());
    }
}
