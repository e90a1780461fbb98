//! Pipeline execution and tolerant output validation for runcheck.
//!
//! The engine takes a candidate code file plus its language's declarative
//! step list, resolves the step templates into concrete commands, runs them
//! as child processes with captured output, and validates the final step's
//! stdout against the chapter's tolerance-aware expected-value grid.

pub mod events;
pub mod executor;
pub mod resolver;
pub mod runner;
pub mod validate;
pub mod walker;

pub use events::{ExecutionFinished, ExecutionListener, ExecutionStarted};
pub use executor::{FileResult, PipelineExecutor};
pub use resolver::{fill_placeholders, CommandResolver, ResolvedStep, TemplateError};
pub use runner::StepRunner;
pub use validate::validate;
pub use walker::{search_and_run, RunStatus};
