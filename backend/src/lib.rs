//! # Layoffs - cleaning pipeline for company layoff datasets
//!
//! Turns a raw layoffs CSV into an analysis-ready table: duplicates removed,
//! categorical values canonicalized, dates parsed, known industry gaps
//! backfilled and rows without any layoff figure pruned.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌───────────┐   ┌──────────┐   ┌──────────┐   ┌─────────┐
//! │ CSV File │──▶│  Dedup   │──▶│ Normalize │──▶│  Nulls   │──▶│ Finalize │──▶│ Cleaned │
//! │(ISO/UTF8)│   │ (ranked) │   │  (rules)  │   │(backfill)│   │(re-rank) │   │  table  │
//! └──────────┘   └──────────┘   └───────────┘   └──────────┘   └──────────┘   └─────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use layoffs::{clean_csv, CleanOptions};
//!
//! let run = clean_csv("layoffs.csv".as_ref(), &CleanOptions::default()).unwrap();
//! println!("{} clean rows", run.table.len());
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Raw and cleaned row types, helper-column wrappers
//! - [`parser`] - CSV reading with auto-detection, CSV writing
//! - [`transform`] - Rules, the four stages and the pipeline
//! - [`validation`] - Row schema and table invariants
//! - [`snapshots`] - Per-stage snapshot store
//! - [`analysis`] - Summary queries over the cleaned table
//! - [`config`] - Environment settings
//! - [`api`] - HTTP API server and log broadcaster

// Core modules
pub mod config;
pub mod error;
pub mod models;

// Parsing
pub mod parser;

// Cleaning
pub mod transform;

// Validation
pub mod validation;

// Snapshots
pub mod snapshots;

// Analysis
pub mod analysis;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ConfigError, CsvError, ParseError, PipelineError, RejectedRow, RulesError, SchemaError,
    ServerError, SnapshotError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{LayoffEvent, RawLayoff, SourceRow, Staged, COLUMNS};

// =============================================================================
// Re-exports - Config
// =============================================================================

pub use config::Settings;

// =============================================================================
// Re-exports - CSV
// =============================================================================

pub use parser::{
    decode_content, detect_delimiter, detect_encoding, parse_bytes_auto, parse_csv_file_auto,
    read_cleaned_csv, read_cleaned_str, to_csv_string, write_csv, write_csv_file, ParseOptions,
    ParseResult,
};

// =============================================================================
// Re-exports - Rules
// =============================================================================

pub use transform::rules::{
    matchers_description, BackfillEntry, CleaningRules, CompiledRules, DatePolicy, Matcher, Rule,
    RuleSet,
};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use transform::{
    clean, clean_bytes, clean_csv, clean_records, clean_with, CleanOptions, CleanOutcome,
    CleanReport, CleanRun, CleanedTable, CsvInfo, PipelineStage, SnapshotSink,
    ValidationSummary,
};

// =============================================================================
// Re-exports - Validation
// =============================================================================

pub use validation::{check_invariants, is_valid, is_valid_event, validate, validate_event};

// =============================================================================
// Re-exports - Snapshots
// =============================================================================

pub use snapshots::{RunInfo, RunRecorder, SnapshotStore, StoredSnapshot};

// =============================================================================
// Re-exports - Analysis
// =============================================================================

pub use analysis::{summarize, Summary};

// =============================================================================
// Re-exports - API
// =============================================================================

pub use api::logs::{log_error, log_info, log_success, log_warning, LOG_BROADCASTER};
pub use api::types::{error_response, CleanResponse};

// Server
pub mod server {
    pub use crate::api::server::{router, start_server};
}
