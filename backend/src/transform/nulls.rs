//! Null resolution: industry backfill, then pruning of rows without any
//! magnitude signal.
//!
//! Backfill only resolves `(company, location)` pairs present in the curated
//! table. Anything else stays null: an unresolved industry is a lookup gap,
//! counted but never an error and never coerced to a placeholder.

use serde::{Deserialize, Serialize};

use super::rules::BackfillTable;
use crate::models::{LayoffEvent, Staged};

/// Result of null resolution.
#[derive(Debug)]
pub struct NullOutcome {
    pub rows: Vec<Staged<LayoffEvent>>,
    pub counts: NullCounts,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NullCounts {
    /// Null industries filled from the backfill table
    pub backfilled: usize,
    /// Null industries the table does not cover (lookup gaps)
    pub unresolved: usize,
    /// Rows dropped for having neither magnitude field
    pub pruned: usize,
}

/// Backfill, then prune.
pub fn resolve_nulls(mut rows: Vec<Staged<LayoffEvent>>, table: &BackfillTable) -> NullOutcome {
    let (backfilled, unresolved) = backfill(&mut rows, table);
    let (rows, pruned) = prune(rows);

    NullOutcome {
        rows,
        counts: NullCounts {
            backfilled,
            unresolved,
            pruned,
        },
    }
}

/// Fill null or blank industries from the table.
///
/// Returns `(backfilled, unresolved)`.
pub fn backfill(rows: &mut [Staged<LayoffEvent>], table: &BackfillTable) -> (usize, usize) {
    let mut backfilled = 0;
    let mut unresolved = 0;

    for row in rows.iter_mut().filter(|row| row.record.industry_missing()) {
        let event = &mut row.record;
        match table.lookup(&event.company, &event.location) {
            Some(industry) => {
                event.industry = Some(industry.to_string());
                backfilled += 1;
            }
            None => {
                // Blank and null are the same gap.
                event.industry = None;
                unresolved += 1;
            }
        }
    }

    (backfilled, unresolved)
}

/// Drop rows where both `total_laid_off` and `percentage_laid_off` are
/// null or blank. Returns the kept rows and the number dropped.
pub fn prune(rows: Vec<Staged<LayoffEvent>>) -> (Vec<Staged<LayoffEvent>>, usize) {
    let before = rows.len();
    let kept: Vec<_> = rows
        .into_iter()
        .filter(|row| row.record.has_magnitude())
        .collect();
    let pruned = before - kept.len();
    (kept, pruned)
}
