//! Error types for the layoffs cleaning pipeline.
//!
//! One enum per layer, converted upward with `From` so `?` works across
//! boundaries:
//!
//! - [`SchemaError`] - Input is missing expected columns
//! - [`CsvError`] - Reading and decoding the raw table
//! - [`RulesError`] - Loading and compiling cleaning rules
//! - [`ParseError`] - Non-conforming cell values found by a stage
//! - [`SnapshotError`] - Checkpoint store failures
//! - [`ConfigError`] - Environment settings
//! - [`PipelineError`] - Top-level orchestration errors
//! - [`ServerError`] - HTTP API errors

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::transform::PipelineStage;

// =============================================================================
// Schema Errors
// =============================================================================

/// The input table does not carry every expected column.
///
/// Raised before any stage executes.
#[derive(Debug, Clone, Error)]
#[error("Schema error: missing column(s) {} (found: {})", missing.join(", "), found.join(", "))]
pub struct SchemaError {
    /// Expected columns absent from the header row.
    pub missing: Vec<String>,
    /// Header row as read.
    pub found: Vec<String>,
}

// =============================================================================
// CSV Reading Errors
// =============================================================================

/// Errors while reading the raw table.
#[derive(Debug, Error)]
pub enum CsvError {
    /// Failed to read file.
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    /// Input could not be decoded to text.
    #[error("Failed to decode input: {0}")]
    Encoding(String),

    /// Malformed CSV structure.
    #[error("Invalid CSV format: {0}")]
    Malformed(#[from] csv::Error),

    /// No header row.
    #[error("CSV file is empty")]
    EmptyFile,

    /// Header row lacks expected columns.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// A cell could not be read as its column type.
    #[error("Line {line}, column '{column}' (value '{value}'): {message}")]
    InvalidCell {
        line: usize,
        column: String,
        value: String,
        message: String,
    },
}

impl CsvError {
    pub fn invalid_cell(
        line: usize,
        column: impl Into<String>,
        value: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        CsvError::InvalidCell {
            line,
            column: column.into(),
            value: value.into(),
            message: message.into(),
        }
    }
}

// =============================================================================
// Rules Errors
// =============================================================================

/// Errors from loading or compiling cleaning rules.
#[derive(Debug, Error)]
pub enum RulesError {
    /// A pattern rule has an invalid regular expression.
    #[error("Invalid pattern in {rule_set} rule #{index}: {message}")]
    InvalidPattern {
        rule_set: String,
        index: usize,
        message: String,
    },

    /// No date formats configured.
    #[error("At least one date format is required")]
    NoDateFormats,

    /// Rules file could not be read.
    #[error("Rules IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Rules file is not valid JSON for the rules format.
    #[error("Rules JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Stage Errors
// =============================================================================

/// A row whose cell did not conform to its expected format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedRow {
    /// Line in the source file (1-based, header is line 1).
    pub line: usize,
    pub column: String,
    pub value: String,
    pub reason: String,
}

impl std::fmt::Display for RejectedRow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "line {} {}='{}' ({})",
            self.line, self.column, self.value, self.reason
        )
    }
}

/// Values that do not conform to the expected format, with the stage that
/// found them and every offending row.
#[derive(Debug, Clone, Error)]
#[error("{stage} failed on {} row(s): {}", rows.len(), preview(rows))]
pub struct ParseError {
    pub stage: PipelineStage,
    pub rows: Vec<RejectedRow>,
}

fn preview(rows: &[RejectedRow]) -> String {
    let mut shown: Vec<String> = rows.iter().take(5).map(|r| r.to_string()).collect();
    if rows.len() > 5 {
        shown.push(format!("... +{}", rows.len() - 5));
    }
    shown.join("; ")
}

// =============================================================================
// Snapshot Errors
// =============================================================================

/// Errors from the checkpoint store.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Run or stage snapshot not found.
    #[error("Snapshot not found: {0}")]
    NotFound(String),

    /// IO error.
    #[error("Snapshot IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("Snapshot JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Config Errors
// =============================================================================

/// Errors from reading environment settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A variable is set to a value of the wrong type.
    #[error("Invalid value for {key}: '{value}'")]
    InvalidValue { key: String, value: String },
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline orchestration errors.
///
/// This is the error type returned by [`crate::transform::pipeline::clean_csv`]
/// and friends.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Reading the raw table failed.
    #[error("CSV error: {0}")]
    Csv(#[from] CsvError),

    /// Rules could not be loaded.
    #[error("Rules error: {0}")]
    Rules(#[from] RulesError),

    /// A stage found non-conforming values.
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Checkpoint store failed.
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    /// JSON serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The input file has a header but no data rows.
    #[error("No rows to clean")]
    EmptyInput,

    /// The cleaned table breaks its invariants.
    #[error("Cleaned table violates {} invariant(s): {}", .0.len(), .0.join("; "))]
    Invariant(Vec<String>),
}

impl PipelineError {
    /// Stage that failed, when the failure belongs to one.
    pub fn stage(&self) -> Option<PipelineStage> {
        match self {
            PipelineError::Parse(e) => Some(e.stage),
            PipelineError::Invariant(_) => Some(PipelineStage::Finalize),
            _ => None,
        }
    }
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Pipeline error.
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Server internal error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for CSV operations.
pub type CsvResult<T> = Result<T, CsvError>;

/// Result type for rules operations.
pub type RulesResult<T> = Result<T, RulesError>;

/// Result type for snapshot operations.
pub type SnapshotResult<T> = Result<T, SnapshotError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;
