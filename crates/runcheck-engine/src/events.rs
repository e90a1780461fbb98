//! Execution lifecycle notifications.
//!
//! The executor accepts zero or more [`ExecutionListener`]s and invokes
//! them sequentially, in registration order, from a single logical thread
//! of control. For any one file, `started` always precedes `finished`; no
//! ordering is promised across different files beyond the executor's
//! strictly sequential processing.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Serialize;

use runcheck_types::{StepConfig, ValidationError};

/// Emitted when a candidate file is accepted for execution.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionStarted {
    pub file: PathBuf,
    pub language: String,
}

/// Emitted exactly once per started file, on every terminal transition.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionFinished {
    pub file: PathBuf,
    pub language: String,
    pub succeeded: bool,
    /// 1-based index of the last step attempted.
    pub step_index: usize,
    /// The failing step's descriptor; `None` when all steps succeeded.
    pub step: Option<StepConfig>,
    pub exit_code: i32,
    /// Present when the pipeline succeeded but the output did not match.
    pub validation_error: Option<ValidationError>,
}

#[async_trait]
pub trait ExecutionListener: Send + Sync {
    async fn on_execution_started(&self, event: &ExecutionStarted);
    async fn on_execution_finished(&self, event: &ExecutionFinished);
}
