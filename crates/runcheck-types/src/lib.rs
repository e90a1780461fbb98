//! Shared types, errors, and the value-cell model for the runcheck harness.
//!
//! This crate provides the foundational types used across all other runcheck
//! crates:
//! - `RuncheckError` — unified error taxonomy
//! - `LanguageConfig` / `StepConfig` / `InternalConfig` — declarative pipeline
//!   configuration as authored in JSON
//! - `ChapterConfig` / `ValueRow` / `ValueCell` — the tolerance-aware
//!   expected-value grid
//! - `ValidationError` — structured output-mismatch descriptor

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Error taxonomy
// ---------------------------------------------------------------------------

/// Unified error type for all runcheck subsystems.
#[derive(Debug, thiserror::Error)]
pub enum RuncheckError {
    #[error("Config error in {path}: {message}")]
    Config { path: String, message: String },

    #[error("No language config loaded for extension '{extension}'")]
    UnknownExtension { extension: String },

    #[error("Chapter config not found for '{file}'")]
    ChapterNotFound { file: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// A convenience alias for `Result<T, RuncheckError>`.
pub type Result<T> = std::result::Result<T, RuncheckError>;

// ---------------------------------------------------------------------------
// Pipeline configuration — one config per language, one step per command
// ---------------------------------------------------------------------------

/// One pipeline stage: an executable (or magic template) plus a command
/// format string whose positional placeholders are filled from `args`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepConfig {
    pub runtime: String,
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl fmt::Display for StepConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "runtime: {}, command: {}, args: [{}]",
            self.runtime,
            self.command,
            self.args.join(",")
        )
    }
}

/// How to compile and run implementations of one source language.
/// Immutable after load; owned by the registry keyed by `extension`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LanguageConfig {
    pub language: String,
    pub extension: String,
    #[serde(default)]
    pub description: String,
    pub steps: Vec<StepConfig>,
}

// ---------------------------------------------------------------------------
// Internal (run-wide) configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// The `tracing` env-filter directive for this level.
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Run-wide options loaded from `internal.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalConfig {
    #[serde(default = "default_log_level")]
    pub log_level: LogLevel,

    /// Extensions enabled for this run; containing `"all"` means every
    /// extension with a loaded language config.
    #[serde(default = "default_extensions")]
    pub file_extensions: Vec<String>,

    /// Surface child-process stdout live instead of only capturing it.
    #[serde(default)]
    pub show_execution_standard_output: bool,

    /// Let child-process stderr pass through to the parent's error stream.
    #[serde(default)]
    pub show_execution_error_output: bool,

    /// Stop the whole run at the first failed file.
    #[serde(default)]
    pub stop_on_execution_error: bool,

    /// Write the final JSON report here instead of stdout.
    #[serde(default)]
    pub redirect_json_to_file: Option<PathBuf>,

    /// Treat a missing expected-value spec as "skip validation" rather than
    /// a hard failure.
    #[serde(default = "default_true")]
    pub ignore_missing_expected_values: bool,
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

fn default_extensions() -> Vec<String> {
    vec!["all".to_string()]
}

fn default_true() -> bool {
    true
}

impl Default for InternalConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            file_extensions: default_extensions(),
            show_execution_standard_output: false,
            show_execution_error_output: false,
            stop_on_execution_error: false,
            redirect_json_to_file: None,
            ignore_missing_expected_values: true,
        }
    }
}

impl InternalConfig {
    /// Whether files with this extension should be run at all.
    pub fn extension_enabled(&self, extension: &str) -> bool {
        self.file_extensions.iter().any(|e| e == "all")
            || self.file_extensions.iter().any(|e| e == extension)
    }
}

// ---------------------------------------------------------------------------
// Value cells — either-numeric-or-string compared units
// ---------------------------------------------------------------------------

/// Marker prefix for narrative (human-readable) output lines.
pub const NARRATIVE_PREFIX: &str = "[#]";

/// A single compared unit: numeric if the raw text parses as a finite
/// number, otherwise the original text verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ValueCell {
    Number(f64),
    Text(String),
}

impl ValueCell {
    pub fn from_raw(raw: &str) -> Self {
        match raw.parse::<f64>() {
            // `NaN` and `inf` parse as f64 but cannot take part in a
            // tolerance comparison; keep them as text so identical spellings
            // still match.
            Ok(n) if n.is_finite() => ValueCell::Number(n),
            _ => ValueCell::Text(raw.to_string()),
        }
    }

    /// Tolerant equality: both numeric → within `delta`; both text →
    /// identical; mixed kinds are never equal.
    pub fn approx_eq(&self, other: &ValueCell, delta: f64) -> bool {
        match (self, other) {
            (ValueCell::Number(a), ValueCell::Number(b)) => (a - b).abs() <= delta,
            (ValueCell::Text(a), ValueCell::Text(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for ValueCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueCell::Number(n) => write!(f, "{n}"),
            ValueCell::Text(s) => write!(f, "{s}"),
        }
    }
}

/// One parsed row of the expected-value grid. The cell count is fixed at
/// parse time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueRow {
    pub cells: Vec<ValueCell>,
}

impl ValueRow {
    /// Parse one authored row. Returns `None` for narrative lines and lines
    /// with no fields left after trimming.
    pub fn parse(line: &str) -> Option<ValueRow> {
        if is_narrative_line(line) {
            return None;
        }
        let fields = split_value_line(line);
        if fields.is_empty() {
            return None;
        }
        Some(ValueRow {
            cells: fields.iter().map(|f| ValueCell::from_raw(f)).collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Whether a line is narrative text (starts with `[#]` after trimming).
pub fn is_narrative_line(line: &str) -> bool {
    line.trim().starts_with(NARRATIVE_PREFIX)
}

/// Split one line on horizontal tabs, trim each field, and drop fields that
/// become empty. An all-whitespace line yields an empty sequence.
pub fn split_value_line(line: &str) -> Vec<String> {
    line.split('\t')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(String::from)
        .collect()
}

// ---------------------------------------------------------------------------
// Chapter configuration — per-exercise expected results
// ---------------------------------------------------------------------------

/// Expected results for one exercise unit, shared by all per-language
/// implementations under it. The derived `expected_values` grid is computed
/// once from the raw `output_values` rows and never mutated afterward.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterConfig {
    #[serde(default)]
    pub description: String,

    /// Non-negative tolerance for numeric comparison.
    pub delta: f64,

    /// Expected output rows as authored (tab-delimited).
    pub output_values: Vec<String>,

    #[serde(skip)]
    pub expected_values: Vec<ValueRow>,
}

impl ChapterConfig {
    /// Parse a chapter config from JSON and derive the expected-value grid.
    pub fn from_json(raw: &str) -> Result<ChapterConfig> {
        let mut config: ChapterConfig = serde_json::from_str(raw)?;
        if config.delta < 0.0 {
            return Err(RuncheckError::Config {
                path: "chapter".into(),
                message: format!("delta must be non-negative, got {}", config.delta),
            });
        }
        config.derive_expected_values();
        Ok(config)
    }

    /// Compute the derived grid from the raw rows, skipping narrative and
    /// blank rows.
    pub fn derive_expected_values(&mut self) {
        self.expected_values = self
            .output_values
            .iter()
            .filter_map(|line| ValueRow::parse(line))
            .collect();
    }
}

// ---------------------------------------------------------------------------
// Validation errors — structured mismatch descriptors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationCode {
    #[serde(rename = "ERR_TOO_MANY_VALUES")]
    TooManyValues,
    #[serde(rename = "ERR_TOO_FEW_VALUES")]
    TooFewValues,
    #[serde(rename = "ERR_INCORRECT_VALUE_COUNT_LINE")]
    IncorrectValueCountLine,
    #[serde(rename = "ERR_INCORRECT_RESULT")]
    IncorrectResult,
    #[serde(rename = "ERR_MISSING_EXPECTED_VALUES")]
    MissingExpectedValues,
}

impl ValidationCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationCode::TooManyValues => "ERR_TOO_MANY_VALUES",
            ValidationCode::TooFewValues => "ERR_TOO_FEW_VALUES",
            ValidationCode::IncorrectValueCountLine => "ERR_INCORRECT_VALUE_COUNT_LINE",
            ValidationCode::IncorrectResult => "ERR_INCORRECT_RESULT",
            ValidationCode::MissingExpectedValues => "ERR_MISSING_EXPECTED_VALUES",
        }
    }
}

impl fmt::Display for ValidationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured output-mismatch descriptor produced by the tolerant
/// comparator. Absence denotes success.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    pub code: ValidationCode,
    pub message: String,
    pub expected: String,
    pub actual: String,
}

impl ValidationError {
    pub fn new(
        code: ValidationCode,
        message: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} (expected: {}, actual: {})",
            self.code, self.message, self.expected, self.actual
        )
    }
}

// ---------------------------------------------------------------------------
// Step outcomes
// ---------------------------------------------------------------------------

/// Exit code reserved for "the OS could not start the process at all".
/// Distinct from every exit code the configured pipelines produce.
pub const FATAL_EXIT_CODE: i32 = 97;

/// Transient result of running one pipeline step. Consumed immediately by
/// the executor, never persisted.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub exit_code: i32,
    pub stdout: String,
}

/// How the executor should proceed after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Continue,
    StopFile,
    AbortRun,
}

impl StepOutcome {
    pub fn disposition(&self) -> Disposition {
        match self.exit_code {
            0 => Disposition::Continue,
            FATAL_EXIT_CODE => Disposition::AbortRun,
            _ => Disposition::StopFile,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
