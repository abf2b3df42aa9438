//! High-level pipeline API for cleaning a layoffs table.
//!
//! This module combines all steps: reading, deduplication, normalization,
//! null resolution, finalization and validation.
//!
//! # Example
//!
//! ```rust,ignore
//! use layoffs::transform::{clean_csv, CleanOptions};
//! use std::path::Path;
//!
//! let run = clean_csv(Path::new("layoffs.csv"), &CleanOptions::default())?;
//! println!("Kept {} of {} rows", run.report.output_rows, run.report.input_rows);
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

use super::dedup::deduplicate;
use super::finalize::{finalize, CleanedTable};
use super::normalize::{normalize, NormalizeCounts};
use super::nulls::{resolve_nulls, NullCounts};
use super::rules::{CleaningRules, CompiledRules, DatePolicy};
use super::PipelineStage;
use crate::api::logs::{
    log_error, log_error_indent, log_info, log_success, log_warning, log_warning_indent,
};
use crate::error::{PipelineError, PipelineResult, RejectedRow, RulesResult, SnapshotError};
use crate::models::{RawLayoff, SourceRow};
use crate::parser::{parse_bytes_auto, parse_csv_file_auto, ParseOptions, ParseResult};
use crate::snapshots::SnapshotStore;
use crate::validation::{check_invariants, validate_event};

/// Receives the full output of each stage as it completes.
pub trait SnapshotSink {
    fn record(&mut self, stage: PipelineStage, rows: &Value) -> Result<(), SnapshotError>;
}

/// What each stage did during one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanReport {
    pub input_rows: usize,
    pub duplicates_removed: usize,
    pub normalized: NormalizeCounts,
    /// Rows dropped for an unparseable date (skip policy only)
    pub rejected: Vec<RejectedRow>,
    pub nulls: NullCounts,
    /// Rows that became duplicates only after normalization
    pub collapsed: usize,
    pub output_rows: usize,
}

/// Result of [`clean`].
#[derive(Debug, Clone)]
pub struct CleanOutcome {
    pub table: CleanedTable,
    pub report: CleanReport,
}

/// Run the four stages in order.
pub fn clean(
    rows: Vec<SourceRow<RawLayoff>>,
    rules: &CompiledRules,
) -> PipelineResult<CleanOutcome> {
    clean_with(rows, rules, None)
}

/// Clean records that carry no source line numbers.
///
/// Lines are numbered as if the records followed a header row.
pub fn clean_records(
    records: Vec<RawLayoff>,
    rules: &CompiledRules,
) -> PipelineResult<CleanOutcome> {
    clean(SourceRow::numbered(records), rules)
}

/// Run the four stages, handing each stage's output to `sink`.
pub fn clean_with(
    rows: Vec<SourceRow<RawLayoff>>,
    rules: &CompiledRules,
    mut sink: Option<&mut dyn SnapshotSink>,
) -> PipelineResult<CleanOutcome> {
    let mut report = CleanReport {
        input_rows: rows.len(),
        ..CleanReport::default()
    };

    log_info("🔁 Removing duplicates...");
    let dedup = deduplicate(rows);
    report.duplicates_removed = dedup.removed;
    log_success(format!(
        "{} duplicate(s) removed, {} rows left",
        dedup.removed,
        dedup.rows.len()
    ));
    checkpoint(&mut sink, PipelineStage::Dedup, &dedup.rows)?;

    log_info("🧹 Normalizing fields...");
    let normalized = match normalize(dedup.rows, rules) {
        Ok(outcome) => outcome,
        Err(e) => {
            log_error(format!(
                "{} unparseable date(s), aborting (policy: {})",
                e.rows.len(),
                rules.date_policy
            ));
            return Err(e.into());
        }
    };
    print_normalize_counts(&normalized.counts);
    if !normalized.rejected.is_empty() {
        log_warning(format!(
            "{} row(s) skipped for unparseable dates",
            normalized.rejected.len()
        ));
        for row in normalized.rejected.iter().take(5) {
            log_warning_indent(row.to_string(), 1);
        }
    }
    report.normalized = normalized.counts;
    report.rejected = normalized.rejected;
    checkpoint(&mut sink, PipelineStage::Normalize, &normalized.rows)?;

    log_info("🔎 Resolving nulls...");
    let nulls = resolve_nulls(normalized.rows, &rules.backfill);
    log_success(format!("{} industries backfilled", nulls.counts.backfilled));
    if nulls.counts.unresolved > 0 {
        log_warning(format!(
            "{} industries left null (no backfill entry)",
            nulls.counts.unresolved
        ));
    }
    log_success(format!(
        "{} row(s) pruned without layoff figures",
        nulls.counts.pruned
    ));
    report.nulls = nulls.counts;
    checkpoint(&mut sink, PipelineStage::ResolveNulls, &nulls.rows)?;

    log_info("📦 Finalizing...");
    let finalized = finalize(nulls.rows);
    if finalized.collapsed > 0 {
        log_info(format!(
            "{} row(s) collapsed after normalization",
            finalized.collapsed
        ));
    }
    report.collapsed = finalized.collapsed;
    report.output_rows = finalized.table.len();
    checkpoint(&mut sink, PipelineStage::Finalize, &finalized.table)?;
    log_success(format!("{} clean rows", report.output_rows));

    Ok(CleanOutcome {
        table: finalized.table,
        report,
    })
}

fn checkpoint<T: Serialize + ?Sized>(
    sink: &mut Option<&mut dyn SnapshotSink>,
    stage: PipelineStage,
    rows: &T,
) -> PipelineResult<()> {
    if let Some(sink) = sink {
        let value = serde_json::to_value(rows)?;
        sink.record(stage, &value)?;
    }
    Ok(())
}

fn print_normalize_counts(counts: &NormalizeCounts) {
    log_success(format!("{} companies trimmed", counts.companies_trimmed));
    log_success(format!(
        "{} industries rewritten, {} blank industries nulled",
        counts.industries_rewritten, counts.industries_blanked
    ));
    log_success(format!("{} countries rewritten", counts.countries_rewritten));
    log_success(format!(
        "{} dates parsed ({} missing)",
        counts.dates_parsed, counts.dates_missing
    ));
}

// =============================================================================
// File and upload entry points
// =============================================================================

/// Options for a file or upload run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CleanOptions {
    /// Rules file; built-in rules when absent
    pub rules_path: Option<PathBuf>,

    /// Overrides the rules file's date policy
    pub date_policy: Option<DatePolicy>,

    /// Field delimiter; detected when absent
    pub delimiter: Option<char>,

    /// Skip invariant and schema checks on the output
    pub skip_validation: bool,

    /// Persist each stage's output under this directory
    pub snapshot_dir: Option<PathBuf>,
}

impl CleanOptions {
    /// Load the rules file (or the built-in rules) and apply overrides.
    pub fn load_rules(&self) -> RulesResult<CleaningRules> {
        let rules = match &self.rules_path {
            Some(path) => CleaningRules::from_file(path)?,
            None => CleaningRules::default(),
        };
        Ok(match self.date_policy {
            Some(policy) => rules.with_date_policy(policy),
            None => rules,
        })
    }

    /// Reader settings: this run's delimiter and the rules' null tokens.
    pub fn parse_options(&self, rules: &CleaningRules) -> ParseOptions {
        ParseOptions {
            delimiter: self.delimiter,
            null_tokens: rules.null_tokens.clone(),
        }
    }
}

/// Result of a complete file or upload run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanRun {
    pub table: CleanedTable,
    pub report: CleanReport,
    pub validation: ValidationSummary,
    pub csv_info: CsvInfo,
    /// Snapshot run id, when snapshots were recorded
    pub run_id: Option<String>,
}

/// CSV file information
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvInfo {
    pub encoding: String,
    pub delimiter: char,
    pub headers: Vec<String>,
    pub row_count: usize,
}

/// Output checks of one run
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationSummary {
    pub skipped: bool,
    pub valid_count: usize,
    pub invalid_count: usize,
    /// First schema failures as (row index, errors)
    pub errors: Vec<(usize, Vec<String>)>,
}

/// Clean a CSV file.
///
/// 1. Parses the CSV with encoding and delimiter detection
/// 2. Runs the four stages
/// 3. Checks the output invariants and row schema
pub fn clean_csv(path: &Path, options: &CleanOptions) -> PipelineResult<CleanRun> {
    let rules = options.load_rules()?;
    let compiled = rules.compile()?;
    let parse_options = options.parse_options(&rules);

    log_info("📖 Reading CSV file...");
    let parsed = parse_csv_file_auto(path, &parse_options)?;
    let label = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("input");
    clean_parsed(parsed, &compiled, options, label)
}

/// Clean CSV bytes (an upload).
pub fn clean_bytes(bytes: &[u8], options: &CleanOptions) -> PipelineResult<CleanRun> {
    let rules = options.load_rules()?;
    let compiled = rules.compile()?;
    let parse_options = options.parse_options(&rules);

    log_info("📖 Reading uploaded CSV...");
    let parsed = parse_bytes_auto(bytes, &parse_options)?;
    clean_parsed(parsed, &compiled, options, "upload")
}

fn clean_parsed(
    parsed: ParseResult,
    rules: &CompiledRules,
    options: &CleanOptions,
    label: &str,
) -> PipelineResult<CleanRun> {
    log_success(format!("Detected encoding: {}", parsed.encoding));
    log_success(format!(
        "Detected separator: '{}'",
        format_delimiter(parsed.delimiter)
    ));
    log_success(format!("Read {} rows", parsed.rows.len()));

    let csv_info = CsvInfo {
        encoding: parsed.encoding,
        delimiter: parsed.delimiter,
        headers: parsed.headers,
        row_count: parsed.rows.len(),
    };

    if parsed.rows.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let (outcome, run_id) = match &options.snapshot_dir {
        Some(dir) => {
            let store = SnapshotStore::with_dir(dir);
            let mut recorder = store.begin_run(label)?;
            log_info(format!("💾 Recording snapshots as {}", recorder.run_id()));
            let outcome = clean_with(parsed.rows, rules, Some(&mut recorder))?;
            (outcome, Some(recorder.run_id().to_string()))
        }
        None => (clean(parsed.rows, rules)?, None),
    };

    let validation = if options.skip_validation {
        log_info("(validation skipped)");
        ValidationSummary {
            skipped: true,
            valid_count: outcome.table.len(),
            ..ValidationSummary::default()
        }
    } else {
        log_info("✔️  Validating cleaned table...");
        if let Err(violations) = check_invariants(outcome.table.rows(), rules) {
            log_error(format!("{} invariant violation(s)", violations.len()));
            for v in violations.iter().take(3) {
                log_error_indent(v.clone(), 1);
            }
            return Err(PipelineError::Invariant(violations));
        }
        let summary = validate_rows(&outcome.table)?;
        print_validation_summary(&summary);
        summary
    };

    Ok(CleanRun {
        table: outcome.table,
        report: outcome.report,
        validation,
        csv_info,
        run_id,
    })
}

/// Check every row against the layoff event schema.
pub fn validate_rows(table: &CleanedTable) -> PipelineResult<ValidationSummary> {
    let mut summary = ValidationSummary::default();

    for (i, event) in table.iter().enumerate() {
        match validate_event(&serde_json::to_value(event)?) {
            Ok(()) => summary.valid_count += 1,
            Err(errs) => {
                summary.invalid_count += 1;
                if summary.errors.len() < 10 {
                    summary.errors.push((i, errs));
                }
            }
        }
    }

    Ok(summary)
}

fn print_validation_summary(summary: &ValidationSummary) {
    if summary.invalid_count == 0 {
        log_success(format!("All {} rows valid!", summary.valid_count));
    } else {
        log_success(format!("Valid: {}", summary.valid_count));
        log_error(format!("Invalid: {}", summary.invalid_count));
        for (row, errs) in summary.errors.iter().take(3) {
            log_error_indent(format!("Row {}: {}", row, errs.join(", ")), 1);
        }
    }
}

/// Format delimiter for display
fn format_delimiter(d: char) -> &'static str {
    match d {
        ';' => ";",
        ',' => ",",
        '\t' => "TAB",
        '|' => "|",
        _ => "?",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::to_csv_string;
    use chrono::NaiveDate;

    fn raw(company: &str, industry: Option<&str>, total: Option<i64>) -> RawLayoff {
        RawLayoff {
            company: company.into(),
            location: "SF Bay Area".into(),
            industry: industry.map(String::from),
            total_laid_off: total,
            percentage_laid_off: None,
            date: Some("3/6/2023".into()),
            stage: Some("Post-IPO".into()),
            country: "United States".into(),
            funds_raised_millions: Some(100),
        }
    }

    fn rules() -> CompiledRules {
        CompiledRules::builtin()
    }

    #[test]
    fn test_exact_duplicate_removed() {
        let casper = raw("Casper", Some("Retail"), Some(78));
        let outcome = clean_records(vec![casper.clone(), casper], &rules()).unwrap();
        assert_eq!(outcome.table.len(), 1);
        assert_eq!(outcome.report.duplicates_removed, 1);
        assert_eq!(outcome.report.input_rows, 2);
        assert_eq!(outcome.report.output_rows, 1);
    }

    #[test]
    fn test_crypto_industry_canonicalized() {
        let outcome =
            clean_records(vec![raw("Coinbase", Some("Crypto Exchange"), Some(950))], &rules())
                .unwrap();
        assert_eq!(outcome.table.rows()[0].industry.as_deref(), Some("cryptocurrency"));
        assert_eq!(outcome.report.normalized.industries_rewritten, 1);
    }

    #[test]
    fn test_country_trailing_period() {
        let mut row = raw("Stripe", Some("Finance"), Some(1100));
        row.country = "United States.".into();
        let outcome = clean_records(vec![row], &rules()).unwrap();
        assert_eq!(outcome.table.rows()[0].country, "United States");
    }

    #[test]
    fn test_airbnb_backfilled() {
        let outcome = clean_records(vec![raw("Airbnb", Some(""), Some(1900))], &rules()).unwrap();
        assert_eq!(outcome.table.rows()[0].industry.as_deref(), Some("travel"));
        assert_eq!(outcome.report.nulls.backfilled, 1);
    }

    #[test]
    fn test_prune_keeps_sibling() {
        let mut empty = raw("Oda", Some("Food"), None);
        empty.percentage_laid_off = None;
        let mut sibling = raw("Oda", Some("Food"), None);
        sibling.percentage_laid_off = Some("0.18".into());
        sibling.date = Some("11/1/2022".into());

        let outcome = clean_records(vec![empty, sibling], &rules()).unwrap();
        assert_eq!(outcome.table.len(), 1);
        assert_eq!(outcome.table.rows()[0].percentage_laid_off.as_deref(), Some("0.18"));
        assert_eq!(outcome.report.nulls.pruned, 1);
    }

    #[test]
    fn test_date_parsed() {
        let outcome = clean_records(vec![raw("Acme", Some("Retail"), Some(5))], &rules()).unwrap();
        assert_eq!(
            outcome.table.rows()[0].date,
            NaiveDate::from_ymd_opt(2023, 3, 6)
        );
    }

    #[test]
    fn test_bad_date_aborts() {
        let mut row = raw("Acme", Some("Retail"), Some(5));
        row.date = Some("March 6".into());
        let err = clean_records(vec![raw("Oda", None, Some(1)), row], &rules()).unwrap_err();
        assert_eq!(err.stage(), Some(PipelineStage::Normalize));
        match err {
            PipelineError::Parse(e) => {
                assert_eq!(e.rows.len(), 1);
                assert_eq!(e.rows[0].line, 3);
                assert_eq!(e.rows[0].value, "March 6");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_bad_date_skipped() {
        let mut row = raw("Acme", Some("Retail"), Some(5));
        row.date = Some("March 6".into());
        let skip = CleaningRules::default()
            .with_date_policy(DatePolicy::Skip)
            .compile()
            .unwrap();
        let outcome = clean_records(vec![raw("Oda", None, Some(1)), row], &skip).unwrap();
        assert_eq!(outcome.table.len(), 1);
        assert_eq!(outcome.report.rejected.len(), 1);
        assert_eq!(outcome.report.rejected[0].line, 3);
    }

    #[test]
    fn test_whitespace_variant_collapsed() {
        let outcome = clean_records(
            vec![
                raw("Casper", Some("Retail"), Some(78)),
                raw(" Casper ", Some("Retail"), Some(78)),
            ],
            &rules(),
        )
        .unwrap();
        assert_eq!(outcome.table.len(), 1);
        assert_eq!(outcome.report.duplicates_removed, 0);
        assert_eq!(outcome.report.collapsed, 1);
    }

    #[test]
    fn test_empty_input() {
        let outcome = clean(Vec::new(), &rules()).unwrap();
        assert!(outcome.table.is_empty());
        assert_eq!(outcome.report, CleanReport::default());
    }

    #[test]
    fn test_idempotent_over_own_output() {
        let mut us = raw("Stripe", Some("Fin-Tech"), Some(1100));
        us.country = "United States.".into();
        let first = clean_records(
            vec![
                raw(" Casper", Some("Retail"), Some(78)),
                raw("Airbnb", None, Some(1900)),
                us,
            ],
            &rules(),
        )
        .unwrap();

        let csv = to_csv_string(&first.table).unwrap();
        let second = clean_bytes(csv.as_bytes(), &CleanOptions::default()).unwrap();
        assert_eq!(second.table, first.table);
        assert_eq!(second.report.duplicates_removed, 0);
        assert_eq!(second.report.normalized.industries_rewritten, 0);
    }

    #[test]
    fn test_idempotent_in_memory() {
        let mut juul = raw("Juul", Some("  "), None);
        juul.percentage_laid_off = Some("0.3".into());
        let first = clean_records(
            vec![juul, raw("Coinbase", Some("Crypto"), Some(950))],
            &rules(),
        )
        .unwrap();

        let again: Vec<RawLayoff> = first.table.iter().map(RawLayoff::from).collect();
        let second = clean_records(again, &rules()).unwrap();
        assert_eq!(second.table, first.table);
        assert_eq!(second.report.nulls.backfilled, 0);
    }

    #[test]
    fn test_snapshots_recorded() {
        struct Collect(Vec<(PipelineStage, usize)>);
        impl SnapshotSink for Collect {
            fn record(&mut self, stage: PipelineStage, rows: &Value) -> Result<(), SnapshotError> {
                self.0.push((stage, rows.as_array().map_or(0, Vec::len)));
                Ok(())
            }
        }

        let casper = raw("Casper", Some("Retail"), Some(78));
        let mut sink = Collect(Vec::new());
        clean_with(
            SourceRow::numbered(vec![casper.clone(), casper]),
            &rules(),
            Some(&mut sink),
        )
        .unwrap();
        let stages: Vec<PipelineStage> = sink.0.iter().map(|(s, _)| *s).collect();
        assert_eq!(stages, PipelineStage::ALL.to_vec());
        assert_eq!(sink.0[0].1, 1);
    }

    #[test]
    fn test_clean_bytes_end_to_end() {
        let csv = "company,location,industry,total_laid_off,percentage_laid_off,date,stage,country,funds_raised_millions\n\
                   Casper,New York City,Retail,78,NULL,9/14/2022,Post-IPO,United States,339\n\
                   Casper,New York City,Retail,78,NULL,9/14/2022,Post-IPO,United States,339\n\
                   Juul,SF Bay Area,,400,0.3,11/10/2022,Unknown,United States.,1500\n\
                   Ghost,Berlin,Retail,NULL,NULL,1/2/2023,Seed,Germany,NULL\n";
        let run = clean_bytes(csv.as_bytes(), &CleanOptions::default()).unwrap();
        assert_eq!(run.csv_info.row_count, 4);
        assert_eq!(run.table.len(), 2);
        assert_eq!(run.validation.invalid_count, 0);
        assert!(run.run_id.is_none());

        let juul = &run.table.rows()[1];
        assert_eq!(juul.industry.as_deref(), Some("consumer"));
        assert_eq!(juul.country, "United States");
    }

    #[test]
    fn test_not_available_magnitudes_are_pruned() {
        let csv = "company,location,industry,total_laid_off,percentage_laid_off,date,stage,country,funds_raised_millions\n\
                   Ghost,Berlin,Retail,NULL,N/A,1/2/2023,Seed,Germany,NULL\n\
                   Oda,Oslo,Food,70,0.18,11/1/2022,Unknown,Norway,477\n";
        let run = clean_bytes(csv.as_bytes(), &CleanOptions::default()).unwrap();

        let companies: Vec<&str> = run.table.iter().map(|r| r.company.as_str()).collect();
        assert_eq!(companies, vec!["Oda"]);
        assert_eq!(run.report.nulls.pruned, 1);
    }

    #[test]
    fn test_rules_null_tokens_reach_the_reader() {
        let dir = tempfile::tempdir().unwrap();
        let rules_path = dir.path().join("rules.json");
        std::fs::write(&rules_path, r#"{"null_tokens": ["-"]}"#).unwrap();

        let options = CleanOptions {
            rules_path: Some(rules_path),
            delimiter: Some(';'),
            ..CleanOptions::default()
        };
        let parse = options.parse_options(&options.load_rules().unwrap());
        assert_eq!(parse.delimiter, Some(';'));
        assert_eq!(parse.null_tokens, vec!["-".to_string()]);

        let defaults = CleanOptions::default();
        let parse = defaults.parse_options(&defaults.load_rules().unwrap());
        assert_eq!(parse.null_tokens, ParseOptions::default().null_tokens);
    }

    #[test]
    fn test_clean_bytes_header_only() {
        let csv = "company,location,industry,total_laid_off,percentage_laid_off,date,stage,country,funds_raised_millions\n";
        let err = clean_bytes(csv.as_bytes(), &CleanOptions::default()).unwrap_err();
        assert!(matches!(err, PipelineError::EmptyInput));
    }

    #[test]
    fn test_clean_csv_with_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("layoffs.csv");
        std::fs::write(
            &input,
            "company,location,industry,total_laid_off,percentage_laid_off,date,stage,country,funds_raised_millions\n\
             Oda,Oslo,Food,70,0.18,11/1/2022,Unknown,Norway,477\n",
        )
        .unwrap();

        let options = CleanOptions {
            snapshot_dir: Some(dir.path().join("snapshots")),
            ..CleanOptions::default()
        };
        let run = clean_csv(&input, &options).unwrap();
        let run_id = run.run_id.unwrap();
        assert!(run_id.starts_with("layoffs-"));

        let store = SnapshotStore::with_dir(dir.path().join("snapshots"));
        let snapshot = store.load(&run_id, PipelineStage::Finalize).unwrap();
        assert_eq!(snapshot.row_count, 1);
    }
}
