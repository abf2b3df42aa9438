//! Domain models for the layoffs cleaning pipeline.
//!
//! - [`RawLayoff`] - One row as read from the source table (date still text)
//! - [`LayoffEvent`] - One normalized row (date parsed)
//! - [`SourceRow`] - A row tagged with its source line
//! - [`Staged`] - A row carrying the helper columns used between stages
//!
//! Every field of [`RawLayoff`] and [`LayoffEvent`] is a business-key column,
//! so derived `Eq`/`Hash` on the record is equality across the business key.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// =============================================================================
// Columns
// =============================================================================

pub const COMPANY: &str = "company";
pub const LOCATION: &str = "location";
pub const INDUSTRY: &str = "industry";
pub const TOTAL_LAID_OFF: &str = "total_laid_off";
pub const PERCENTAGE_LAID_OFF: &str = "percentage_laid_off";
pub const DATE: &str = "date";
pub const STAGE: &str = "stage";
pub const COUNTRY: &str = "country";
pub const FUNDS_RAISED_MILLIONS: &str = "funds_raised_millions";

/// Expected columns, in output order.
pub const COLUMNS: [&str; 9] = [
    COMPANY,
    LOCATION,
    INDUSTRY,
    TOTAL_LAID_OFF,
    PERCENTAGE_LAID_OFF,
    DATE,
    STAGE,
    COUNTRY,
    FUNDS_RAISED_MILLIONS,
];

// =============================================================================
// Rows
// =============================================================================

/// A layoff event before normalization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RawLayoff {
    pub company: String,
    pub location: String,
    pub industry: Option<String>,
    pub total_laid_off: Option<i64>,
    pub percentage_laid_off: Option<String>,
    /// `month/day/year` text in the source.
    pub date: Option<String>,
    pub stage: Option<String>,
    pub country: String,
    pub funds_raised_millions: Option<i64>,
}

/// A normalized layoff event: one row of the analysis table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LayoffEvent {
    pub company: String,
    pub location: String,
    pub industry: Option<String>,
    pub total_laid_off: Option<i64>,
    pub percentage_laid_off: Option<String>,
    pub date: Option<NaiveDate>,
    pub stage: Option<String>,
    pub country: String,
    pub funds_raised_millions: Option<i64>,
}

impl LayoffEvent {
    /// Whether the row carries either magnitude field.
    pub fn has_magnitude(&self) -> bool {
        self.total_laid_off.is_some() || !is_blank(self.percentage_laid_off.as_deref())
    }

    /// Whether `industry` is null or blank.
    pub fn industry_missing(&self) -> bool {
        is_blank(self.industry.as_deref())
    }
}

/// Turns a cleaned row back into input form, with the date as ISO text.
impl From<&LayoffEvent> for RawLayoff {
    fn from(event: &LayoffEvent) -> Self {
        RawLayoff {
            company: event.company.clone(),
            location: event.location.clone(),
            industry: event.industry.clone(),
            total_laid_off: event.total_laid_off,
            percentage_laid_off: event.percentage_laid_off.clone(),
            date: event.date.map(|d| d.format("%Y-%m-%d").to_string()),
            stage: event.stage.clone(),
            country: event.country.clone(),
            funds_raised_millions: event.funds_raised_millions,
        }
    }
}

/// Null or whitespace-only.
pub fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |s| s.trim().is_empty())
}

// =============================================================================
// Helper-column wrappers
// =============================================================================

/// A row tagged with the line it was read from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRow<T> {
    /// 1-based line in the source (header is line 1).
    pub line: usize,
    pub record: T,
}

impl<T> SourceRow<T> {
    pub fn new(line: usize, record: T) -> Self {
        Self { line, record }
    }

    /// Tag in-memory records with consecutive lines, as if read below a header.
    pub fn numbered(records: Vec<T>) -> Vec<Self> {
        records
            .into_iter()
            .enumerate()
            .map(|(i, record)| Self::new(i + 2, record))
            .collect()
    }
}

/// A row plus the helper columns that live between the Deduplicator and the
/// Finalizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Staged<T> {
    pub line: usize,
    /// Duplicate rank within the business-key group, starting at 1.
    pub row_num: usize,
    pub record: T,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event() -> LayoffEvent {
        LayoffEvent {
            company: "Casper".into(),
            location: "NYC".into(),
            industry: Some("Consumer".into()),
            total_laid_off: None,
            percentage_laid_off: None,
            date: NaiveDate::from_ymd_opt(2023, 3, 1),
            stage: Some("Post-IPO".into()),
            country: "United States".into(),
            funds_raised_millions: Some(100),
        }
    }

    #[test]
    fn test_magnitude() {
        let mut e = event();
        assert!(!e.has_magnitude());

        e.percentage_laid_off = Some("  ".into());
        assert!(!e.has_magnitude());

        e.percentage_laid_off = Some("0.05".into());
        assert!(e.has_magnitude());

        e.percentage_laid_off = None;
        e.total_laid_off = Some(0);
        assert!(e.has_magnitude());
    }

    #[test]
    fn test_raw_from_event_uses_iso_date() {
        let raw = RawLayoff::from(&event());
        assert_eq!(raw.date.as_deref(), Some("2023-03-01"));
        assert_eq!(raw.company, "Casper");
    }

    #[test]
    fn test_numbered_rows_start_below_header() {
        let rows = SourceRow::numbered(vec!["a", "b"]);
        assert_eq!(rows[0].line, 2);
        assert_eq!(rows[1].line, 3);
    }

    #[test]
    fn test_event_serializes_without_helpers() {
        let value = serde_json::to_value(event()).unwrap();
        let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
        assert_eq!(keys.len(), COLUMNS.len());
        assert_eq!(value["date"], "2023-03-01");
        assert!(value.get("row_num").is_none());
    }
}
