//! Field normalization.
//!
//! Column-scoped rules, independent of each other:
//!
//! | Column    | Rule                                                   |
//! |-----------|--------------------------------------------------------|
//! | company   | trim surrounding whitespace (case untouched)           |
//! | industry  | blank → null, then the industry rule set               |
//! | country   | the country rule set                                   |
//! | date      | text → date using the accepted formats, in order       |
//!
//! No rows are added. Rows are removed only when the date policy is
//! [`DatePolicy::Skip`] and their date does not parse.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use super::rules::{CompiledRules, DatePolicy};
use super::PipelineStage;
use crate::error::{ParseError, RejectedRow};
use crate::models::{LayoffEvent, RawLayoff, Staged, DATE};

/// How many values each rule changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizeCounts {
    pub companies_trimmed: usize,
    pub industries_rewritten: usize,
    pub industries_blanked: usize,
    pub countries_rewritten: usize,
    pub dates_parsed: usize,
    pub dates_missing: usize,
}

/// Result of normalization.
#[derive(Debug)]
pub struct NormalizeOutcome {
    pub rows: Vec<Staged<LayoffEvent>>,
    /// Rows dropped under [`DatePolicy::Skip`]
    pub rejected: Vec<RejectedRow>,
    pub counts: NormalizeCounts,
}

/// Normalize every row.
///
/// Under [`DatePolicy::Abort`] any unparseable date fails the whole stage
/// with a [`ParseError`] listing every offending row.
pub fn normalize(
    rows: Vec<Staged<RawLayoff>>,
    rules: &CompiledRules,
) -> Result<NormalizeOutcome, ParseError> {
    let mut counts = NormalizeCounts::default();
    let mut rejected = Vec::new();
    let mut normalized = Vec::with_capacity(rows.len());

    for row in rows {
        let line = row.line;
        match normalize_row(row.record, rules, &mut counts) {
            Ok(event) => normalized.push(Staged {
                line,
                row_num: row.row_num,
                record: event,
            }),
            Err((value, reason)) => rejected.push(RejectedRow {
                line,
                column: DATE.to_string(),
                value,
                reason,
            }),
        }
    }

    if !rejected.is_empty() && rules.date_policy == DatePolicy::Abort {
        return Err(ParseError {
            stage: PipelineStage::Normalize,
            rows: rejected,
        });
    }

    Ok(NormalizeOutcome {
        rows: normalized,
        rejected,
        counts,
    })
}

/// Normalize one record; on a bad date returns the text and the reason.
fn normalize_row(
    raw: RawLayoff,
    rules: &CompiledRules,
    counts: &mut NormalizeCounts,
) -> Result<LayoffEvent, (String, String)> {
    let date = match raw.date.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        None => {
            counts.dates_missing += 1;
            None
        }
        Some(text) => match parse_date(text, &rules.date_formats) {
            Some(date) => {
                counts.dates_parsed += 1;
                Some(date)
            }
            None => {
                return Err((
                    text.to_string(),
                    format!("expected one of {}", rules.date_formats.join(", ")),
                ))
            }
        },
    };

    let company = normalize_company(&raw.company);
    if company != raw.company {
        counts.companies_trimmed += 1;
    }

    let industry = match raw.industry {
        Some(value) if value.trim().is_empty() => {
            counts.industries_blanked += 1;
            None
        }
        Some(value) => {
            let rewritten = rules.industry.apply(&value);
            if rewritten != value {
                counts.industries_rewritten += 1;
            }
            Some(rewritten)
        }
        None => None,
    };

    let country = rules.country.apply(&raw.country);
    if country != raw.country {
        counts.countries_rewritten += 1;
    }

    Ok(LayoffEvent {
        company,
        location: raw.location,
        industry,
        total_laid_off: raw.total_laid_off,
        percentage_laid_off: raw.percentage_laid_off,
        date,
        stage: raw.stage,
        country,
        funds_raised_millions: raw.funds_raised_millions,
    })
}

/// Trim surrounding whitespace; case is left alone.
pub fn normalize_company(company: &str) -> String {
    company.trim().to_string()
}

/// Parse a date with the first format that accepts the whole text.
///
/// Years below 1000 are rejected: `%Y` happily reads `"23"` as year 23.
pub fn parse_date(text: &str, formats: &[String]) -> Option<NaiveDate> {
    let text = text.trim();
    formats.iter().find_map(|format| {
        NaiveDate::parse_from_str(text, format)
            .ok()
            .filter(|date| date.year() >= 1000)
    })
}
