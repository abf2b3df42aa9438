//! Duplicate detection over the business key.
//!
//! Rows are grouped by identical values across all business-key columns; each
//! row gets a rank (`row_num`) within its group in source order, and only the
//! rank-1 row of each group survives.
//!
//! ```text
//! Input rows                       Ranked                  Kept
//! ┌──────────────────────────┐    ┌──────────────┐        ┌──────────────┐
//! │ Casper, NYC, 50, 3/1/23  │ →  │ ... row_num 1│   →    │ Casper ...   │
//! │ Casper, NYC, 50, 3/1/23  │    │ ... row_num 2│        │ Oda ...      │
//! │ Oda, Oslo, 70, 11/1/22   │    │ ... row_num 1│        └──────────────┘
//! └──────────────────────────┘    └──────────────┘
//! ```
//!
//! Null equals null for grouping: `Option` fields compare by value, so fully
//! blank duplicates merge too.

use std::collections::HashMap;
use std::hash::Hash;

use crate::models::{SourceRow, Staged};

/// Result of deduplication.
#[derive(Debug)]
pub struct DedupOutcome<T> {
    /// Rank-1 rows, in source order
    pub rows: Vec<Staged<T>>,
    /// Number of rows discarded as duplicates
    pub removed: usize,
}

/// Assign a duplicate rank to every row, keeping all of them.
pub fn rank_duplicates<T: Eq + Hash>(rows: Vec<SourceRow<T>>) -> Vec<Staged<T>> {
    let mut staged: Vec<Staged<T>> = rows
        .into_iter()
        .map(|row| Staged {
            line: row.line,
            row_num: 0,
            record: row.record,
        })
        .collect();
    assign_ranks(&mut staged);
    staged
}

/// Recompute `row_num` for staged rows over their current record values.
pub fn assign_ranks<T: Eq + Hash>(rows: &mut [Staged<T>]) {
    let ranks: Vec<usize> = {
        let mut seen: HashMap<&T, usize> = HashMap::with_capacity(rows.len());
        rows.iter()
            .map(|row| {
                let count = seen.entry(&row.record).or_insert(0);
                *count += 1;
                *count
            })
            .collect()
    };

    for (row, rank) in rows.iter_mut().zip(ranks) {
        row.row_num = rank;
    }
}

/// Keep rank-1 rows; returns them with the number discarded.
pub fn keep_first<T>(rows: Vec<Staged<T>>) -> (Vec<Staged<T>>, usize) {
    let before = rows.len();
    let kept: Vec<Staged<T>> = rows.into_iter().filter(|row| row.row_num == 1).collect();
    let removed = before - kept.len();
    (kept, removed)
}

/// Rank and discard duplicates in one pass.
pub fn deduplicate<T: Eq + Hash>(rows: Vec<SourceRow<T>>) -> DedupOutcome<T> {
    let (rows, removed) = keep_first(rank_duplicates(rows));
    DedupOutcome { rows, removed }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawLayoff;

    fn casper() -> RawLayoff {
        RawLayoff {
            company: "Casper".into(),
            location: "NYC".into(),
            industry: Some("Consumer".into()),
            total_laid_off: Some(50),
            percentage_laid_off: Some("0.1".into()),
            date: Some("3/1/2023".into()),
            stage: Some("Post-IPO".into()),
            country: "United States".into(),
            funds_raised_millions: Some(100),
        }
    }

    fn blank() -> RawLayoff {
        RawLayoff {
            company: String::new(),
            location: String::new(),
            industry: None,
            total_laid_off: None,
            percentage_laid_off: None,
            date: None,
            stage: None,
            country: String::new(),
            funds_raised_millions: None,
        }
    }

    #[test]
    fn test_identical_rows_collapse_to_one() {
        let rows = SourceRow::numbered(vec![casper(), casper(), casper()]);
        let outcome = deduplicate(rows);

        assert_eq!(outcome.rows.len(), 1);
        assert_eq!(outcome.removed, 2);
        assert_eq!(outcome.rows[0].record, casper());
        assert_eq!(outcome.rows[0].line, 2);
    }

    #[test]
    fn test_ranks_follow_source_order() {
        let mut other = casper();
        other.total_laid_off = Some(51);
        let ranked = rank_duplicates(SourceRow::numbered(vec![
            casper(),
            other.clone(),
            casper(),
            other,
        ]));

        let ranks: Vec<usize> = ranked.iter().map(|r| r.row_num).collect();
        assert_eq!(ranks, vec![1, 1, 2, 2]);
    }

    #[test]
    fn test_any_key_difference_keeps_both() {
        let mut later = casper();
        later.date = Some("3/2/2023".into());
        let mut no_stage = casper();
        no_stage.stage = None;

        let outcome = deduplicate(SourceRow::numbered(vec![casper(), later, no_stage]));
        assert_eq!(outcome.rows.len(), 3);
        assert_eq!(outcome.removed, 0);
    }

    #[test]
    fn test_null_equals_null() {
        let outcome = deduplicate(SourceRow::numbered(vec![blank(), blank()]));
        assert_eq!(outcome.rows.len(), 1);
        assert_eq!(outcome.removed, 1);
    }

    #[test]
    fn test_empty_input() {
        let outcome = deduplicate(Vec::<SourceRow<RawLayoff>>::new());
        assert!(outcome.rows.is_empty());
        assert_eq!(outcome.removed, 0);
    }

    #[test]
    fn test_assign_ranks_reflects_current_values() {
        let mut padded = casper();
        padded.company = "  Casper".into();
        let mut rows = rank_duplicates(SourceRow::numbered(vec![casper(), padded]));
        assert!(rows.iter().all(|r| r.row_num == 1));

        rows[1].record.company = "Casper".into();
        assign_ranks(&mut rows);
        let (kept, removed) = keep_first(rows);
        assert_eq!(kept.len(), 1);
        assert_eq!(removed, 1);
    }
}
