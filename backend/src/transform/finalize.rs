//! Final stage: settle duplicates, strip helper columns, freeze the table.

use serde::{Serialize, Serializer};
use std::sync::Arc;

use super::dedup::{assign_ranks, keep_first};
use crate::models::{LayoffEvent, Staged};

/// The analysis-ready table.
///
/// Read-only: rows are reachable only through shared references, and clones
/// share the same storage.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanedTable {
    rows: Arc<[LayoffEvent]>,
}

impl CleanedTable {
    pub(crate) fn new(rows: Vec<LayoffEvent>) -> Self {
        Self { rows: rows.into() }
    }

    pub fn rows(&self) -> &[LayoffEvent] {
        &self.rows
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LayoffEvent> {
        self.rows.iter()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl Serialize for CleanedTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.rows().serialize(serializer)
    }
}

impl<'a> IntoIterator for &'a CleanedTable {
    type Item = &'a LayoffEvent;
    type IntoIter = std::slice::Iter<'a, LayoffEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// Result of finalization.
#[derive(Debug)]
pub struct FinalizeOutcome {
    pub table: CleanedTable,
    /// Rows that became identical only after normalization
    pub collapsed: usize,
}

/// Re-rank over the normalized values, keep rank 1, drop helper columns.
///
/// Normalization can turn distinct raw rows into identical ones (`" Casper"`
/// and `"Casper"`), so ranks are recomputed before the helpers go.
pub fn finalize(mut rows: Vec<Staged<LayoffEvent>>) -> FinalizeOutcome {
    assign_ranks(&mut rows);
    let (kept, collapsed) = keep_first(rows);
    let events: Vec<LayoffEvent> = kept.into_iter().map(|row| row.record).collect();

    FinalizeOutcome {
        table: CleanedTable::new(events),
        collapsed,
    }
}
