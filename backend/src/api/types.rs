//! REST API types.
//!
//! `POST /api/clean` answers with the cleaned rows, the per-stage report and
//! the output checks.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::analysis::{summarize, Summary};
use crate::models::LayoffEvent;
use crate::transform::pipeline::{CleanReport, CleanRun};

/// Number of entries in each ranking of the response summary
pub const SUMMARY_TOP_N: usize = 5;

/// Response sent after an upload is cleaned.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanResponse {
    /// Unique job identifier
    pub job_id: String,

    /// Status: "ready", "warning"
    pub status: String,

    /// The cleaned table
    pub events: Vec<LayoffEvent>,

    pub metadata: ResponseMetadata,
}

/// Metadata about the run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    pub total_events: usize,

    /// Snapshot run id, when snapshots were recorded
    pub run_id: Option<String>,

    pub report: CleanReport,

    pub csv_info: CsvMetadata,

    pub validation: ValidationStats,

    pub summary: Summary,
}

/// CSV file metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvMetadata {
    pub encoding: String,
    pub delimiter: String,
    pub row_count: usize,
    pub columns: Vec<String>,
}

/// Validation statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationStats {
    pub skipped: bool,
    pub valid: usize,
    pub invalid: usize,
    pub errors: Vec<ValidationError>,
}

/// A row that failed the schema check
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationError {
    pub record_index: usize,
    pub errors: Vec<String>,
}

impl From<CleanRun> for CleanResponse {
    fn from(run: CleanRun) -> Self {
        let summary = summarize(&run.table, SUMMARY_TOP_N);
        let warning = run.validation.invalid_count > 0 || !run.report.rejected.is_empty();

        CleanResponse {
            job_id: Uuid::new_v4().to_string(),
            status: if warning { "warning" } else { "ready" }.to_string(),
            events: run.table.rows().to_vec(),
            metadata: ResponseMetadata {
                total_events: run.table.len(),
                run_id: run.run_id,
                report: run.report,
                csv_info: CsvMetadata {
                    encoding: run.csv_info.encoding,
                    delimiter: run.csv_info.delimiter.to_string(),
                    row_count: run.csv_info.row_count,
                    columns: run.csv_info.headers,
                },
                validation: ValidationStats {
                    skipped: run.validation.skipped,
                    valid: run.validation.valid_count,
                    invalid: run.validation.invalid_count,
                    errors: run
                        .validation
                        .errors
                        .into_iter()
                        .map(|(idx, errs)| ValidationError {
                            record_index: idx,
                            errors: errs,
                        })
                        .collect(),
                },
                summary,
            },
        }
    }
}

/// Create an error response.
///
/// `stage` names the pipeline stage that failed, when there is one.
pub fn error_response(error: &str, stage: Option<&str>) -> Value {
    json!({
        "jobId": Uuid::new_v4().to_string(),
        "status": "error",
        "error": error,
        "stage": stage,
        "events": [],
        "metadata": {
            "totalEvents": 0,
            "runId": null
        }
    })
}
