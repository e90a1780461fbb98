//! Pipeline executor — the per-file state machine.
//!
//! For each accepted candidate file the executor resolves and runs the
//! language's steps in order, stopping at the first failure:
//!
//! `Idle → Running(0) → … → {Succeeded, FailedStep, FatalAbort}`
//!
//! On success, the final step's captured stdout is handed to the tolerant
//! comparator; a mismatch downgrades the file result to failed without
//! touching the pipeline state itself. A fatal launch failure (the OS could
//! not start a process at all) aborts the entire run.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use runcheck_config::ConfigRegistry;
use runcheck_types::{
    Disposition, InternalConfig, Result, StepConfig, ValidationCode, ValidationError,
};

use crate::events::{ExecutionFinished, ExecutionListener, ExecutionStarted};
use crate::resolver::CommandResolver;
use crate::runner::StepRunner;
use crate::validate::{missing_expected_values, validate};

/// Terminal result for one candidate file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileResult {
    /// Extension disabled or no language config; not a failure.
    Skipped,
    Passed,
    Failed,
    /// A step's process could not be started; stop the whole run.
    FatalAbort,
}

/// Drives one file at a time through its language's step pipeline and
/// notifies registered listeners of lifecycle transitions.
pub struct PipelineExecutor {
    registry: Arc<ConfigRegistry>,
    resolver: CommandResolver,
    runner: StepRunner,
    output_dir: PathBuf,
    listeners: Vec<Box<dyn ExecutionListener>>,
}

impl PipelineExecutor {
    /// Create an executor whose child processes run inside `output_dir`.
    /// The directory is created if missing.
    pub fn new(registry: Arc<ConfigRegistry>, output_dir: &Path) -> Result<Self> {
        if !output_dir.is_dir() {
            tracing::info!(dir = %output_dir.display(), "creating output directory");
            std::fs::create_dir_all(output_dir)?;
        }

        let internal = &registry.internal;
        let resolver = CommandResolver::new(output_dir);
        let runner = StepRunner::new(
            output_dir,
            internal.show_execution_standard_output,
            internal.show_execution_error_output,
        );

        Ok(Self {
            registry,
            resolver,
            runner,
            output_dir: output_dir.to_path_buf(),
            listeners: Vec::new(),
        })
    }

    /// Register a lifecycle listener. Listeners are invoked sequentially in
    /// registration order.
    pub fn add_listener(&mut self, listener: impl ExecutionListener + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn internal(&self) -> &InternalConfig {
        &self.registry.internal
    }

    /// Entry point per candidate file.
    pub async fn run_file(&self, file: &Path) -> Result<FileResult> {
        let extension = file
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();

        if !self.registry.internal.extension_enabled(extension) {
            tracing::debug!(extension, "skipping extension not enabled for this run");
            return Ok(FileResult::Skipped);
        }
        let Some(language) = self.registry.language_for(extension) else {
            tracing::debug!(extension, "no language config for extension");
            return Ok(FileResult::Skipped);
        };

        self.notify_started(ExecutionStarted {
            file: file.to_path_buf(),
            language: language.language.clone(),
        })
        .await;

        let mut final_stdout = String::new();

        for (index, step) in language.steps.iter().enumerate() {
            let step_index = index + 1;

            let resolved = match self.resolver.resolve_step(step, file) {
                Ok(resolved) => resolved,
                Err(e) => {
                    tracing::error!(
                        file = %file.display(),
                        step = %step,
                        error = %e,
                        "could not resolve command"
                    );
                    // Recovered locally as a failed step.
                    self.notify_failure(file, language.language.clone(), step_index, step, 1, None)
                        .await;
                    return Ok(FileResult::Failed);
                }
            };

            let outcome = self.runner.run(&resolved).await;
            tracing::debug!(step = %step, exit_code = outcome.exit_code, "step finished");

            match outcome.disposition() {
                Disposition::Continue => final_stdout = outcome.stdout,
                Disposition::StopFile => {
                    tracing::warn!(
                        file = %file.display(),
                        step_index,
                        exit_code = outcome.exit_code,
                        "failed execution"
                    );
                    self.notify_failure(
                        file,
                        language.language.clone(),
                        step_index,
                        step,
                        outcome.exit_code,
                        None,
                    )
                    .await;
                    return Ok(FileResult::Failed);
                }
                Disposition::AbortRun => {
                    tracing::error!(
                        file = %file.display(),
                        step_index,
                        "process could not be started, aborting run"
                    );
                    self.notify_failure(
                        file,
                        language.language.clone(),
                        step_index,
                        step,
                        outcome.exit_code,
                        None,
                    )
                    .await;
                    return Ok(FileResult::FatalAbort);
                }
            }
        }

        // All steps succeeded; validation is a distinct concern layered on
        // top of pipeline success. A broken chapter config fails this file,
        // not the run; the started notification is already out and must be
        // paired with a finished one.
        let validation_error = match runcheck_config::chapter_for(file) {
            Ok(Some(chapter)) => validate(&chapter, &final_stdout),
            Ok(None) if self.registry.internal.ignore_missing_expected_values => {
                tracing::debug!(file = %file.display(), "no expected values, skipping validation");
                None
            }
            Ok(None) => Some(missing_expected_values(&file.display().to_string())),
            Err(e) => {
                tracing::error!(file = %file.display(), error = %e, "could not load chapter config");
                Some(ValidationError::new(
                    ValidationCode::MissingExpectedValues,
                    format!("Expected values could not be loaded: {e}"),
                    "a readable chapter config",
                    file.display().to_string(),
                ))
            }
        };

        let step_index = language.steps.len();
        match validation_error {
            None => {
                tracing::info!(file = %file.display(), "verified execution");
                self.notify_finished(ExecutionFinished {
                    file: file.to_path_buf(),
                    language: language.language.clone(),
                    succeeded: true,
                    step_index,
                    step: None,
                    exit_code: 0,
                    validation_error: None,
                })
                .await;
                Ok(FileResult::Passed)
            }
            Some(err) => {
                tracing::warn!(file = %file.display(), error = %err, "output validation failed");
                self.notify_finished(ExecutionFinished {
                    file: file.to_path_buf(),
                    language: language.language.clone(),
                    succeeded: false,
                    step_index,
                    step: None,
                    exit_code: 0,
                    validation_error: Some(err),
                })
                .await;
                Ok(FileResult::Failed)
            }
        }
    }

    /// Delete everything inside the output directory (temporary compilation
    /// artifacts and program output). Called once, after the whole run.
    pub fn clean_output(&self) -> Result<()> {
        for entry in std::fs::read_dir(&self.output_dir)? {
            let path = entry?.path();
            if path.is_dir() {
                std::fs::remove_dir_all(&path)?;
            } else {
                std::fs::remove_file(&path)?;
            }
            tracing::debug!(entry = %path.display(), "removed old output entry");
        }
        Ok(())
    }

    async fn notify_started(&self, event: ExecutionStarted) {
        for listener in &self.listeners {
            listener.on_execution_started(&event).await;
        }
    }

    async fn notify_finished(&self, event: ExecutionFinished) {
        for listener in &self.listeners {
            listener.on_execution_finished(&event).await;
        }
    }

    async fn notify_failure(
        &self,
        file: &Path,
        language: String,
        step_index: usize,
        step: &StepConfig,
        exit_code: i32,
        validation_error: Option<ValidationError>,
    ) {
        self.notify_finished(ExecutionFinished {
            file: file.to_path_buf(),
            language,
            succeeded: false,
            step_index,
            step: Some(step.clone()),
            exit_code,
            validation_error,
        })
        .await;
    }
}
