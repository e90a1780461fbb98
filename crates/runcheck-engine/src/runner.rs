//! Step runner: launches one resolved command as a child process.

use std::path::PathBuf;
use std::process::Stdio;

use runcheck_types::{StepOutcome, FATAL_EXIT_CODE};

use crate::resolver::ResolvedStep;

/// Runs resolved steps with the configured output directory as the child's
/// working directory. Some compilers ignore the working directory, which is
/// why the `WORKING_DIR_FULL` token exists alongside this.
pub struct StepRunner {
    working_dir: PathBuf,
    show_stdout: bool,
    show_stderr: bool,
}

impl StepRunner {
    pub fn new(working_dir: impl Into<PathBuf>, show_stdout: bool, show_stderr: bool) -> Self {
        Self {
            working_dir: working_dir.into(),
            show_stdout,
            show_stderr,
        }
    }

    /// Launch the step and block until it terminates. stdout is always
    /// captured; the `show_*` flags only control whether output also
    /// reaches the parent's streams.
    ///
    /// A process the OS refuses to start (bad path, missing interpreter,
    /// permission denial) yields the fatal sentinel exit code instead of an
    /// error.
    pub async fn run(&self, step: &ResolvedStep) -> StepOutcome {
        let mut cmd = tokio::process::Command::new(&step.runtime);
        cmd.args(step.arguments.split_whitespace())
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(if self.show_stderr {
                Stdio::inherit()
            } else {
                Stdio::piped()
            });

        let output = match cmd.output().await {
            Ok(output) => output,
            Err(e) => {
                tracing::error!(
                    runtime = %step.runtime,
                    arguments = %step.arguments,
                    error = %e,
                    "could not execute process"
                );
                return StepOutcome {
                    exit_code: FATAL_EXIT_CODE,
                    stdout: String::new(),
                };
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if self.show_stdout && !stdout.is_empty() {
            print!("{stdout}");
        }

        StepOutcome {
            // A signal-terminated child has no exit code; treat as ordinary failure.
            exit_code: output.status.code().unwrap_or(-1),
            stdout,
        }
    }
}
