//! Recursive file discovery feeding the executor.

use std::path::{Path, PathBuf};

use runcheck_types::Result;

use crate::executor::{FileResult, PipelineExecutor};

/// How a walk over the candidate set ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Every candidate was considered.
    Completed,
    /// Stopped early because a file failed and `stopOnExecutionError` is set.
    Stopped,
    /// Stopped because a step's process could not be started at all.
    Aborted,
}

/// Walk `root` depth-first (sorted entries) and run every file whose path
/// contains `filter` through the executor. Short-circuits on fatal aborts
/// and, when configured, on the first failed file.
pub async fn search_and_run(
    executor: &PipelineExecutor,
    root: &Path,
    filter: &str,
) -> Result<RunStatus> {
    let mut entries: Vec<PathBuf> = std::fs::read_dir(root)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .collect();
    entries.sort();

    for entry in entries {
        if entry.is_dir() {
            let status = Box::pin(search_and_run(executor, &entry, filter)).await?;
            if status != RunStatus::Completed {
                return Ok(status);
            }
        } else {
            if !entry.to_string_lossy().contains(filter) {
                continue;
            }
            match executor.run_file(&entry).await? {
                FileResult::FatalAbort => return Ok(RunStatus::Aborted),
                FileResult::Failed if executor.internal().stop_on_execution_error => {
                    return Ok(RunStatus::Stopped)
                }
                _ => {}
            }
        }
    }
    Ok(RunStatus::Completed)
}
