//! Cleaning pipeline.
//!
//! - `rules`: rule sets, backfill table and date settings
//! - `dedup`: duplicate ranking over the business key
//! - `normalize`: per-column canonicalization and date parsing
//! - `nulls`: industry backfill and magnitude pruning
//! - `finalize`: helper-column removal, read-only table
//! - `pipeline`: the stages composed in order

pub mod dedup;
pub mod finalize;
pub mod normalize;
pub mod nulls;
pub mod pipeline;
pub mod rules;

use serde::{Deserialize, Serialize};

pub use dedup::{deduplicate, rank_duplicates, DedupOutcome};
pub use finalize::{finalize, CleanedTable, FinalizeOutcome};
pub use normalize::{normalize, parse_date, NormalizeCounts, NormalizeOutcome};
pub use nulls::{resolve_nulls, NullCounts, NullOutcome};
pub use pipeline::*;
pub use rules::*;

/// The four stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Dedup,
    Normalize,
    ResolveNulls,
    Finalize,
}

impl PipelineStage {
    pub const ALL: [PipelineStage; 4] = [
        PipelineStage::Dedup,
        PipelineStage::Normalize,
        PipelineStage::ResolveNulls,
        PipelineStage::Finalize,
    ];

    pub fn slug(&self) -> &'static str {
        match self {
            PipelineStage::Dedup => "dedup",
            PipelineStage::Normalize => "normalize",
            PipelineStage::ResolveNulls => "resolve_nulls",
            PipelineStage::Finalize => "finalize",
        }
    }

    /// 1-based position in the pipeline.
    pub fn position(&self) -> usize {
        match self {
            PipelineStage::Dedup => 1,
            PipelineStage::Normalize => 2,
            PipelineStage::ResolveNulls => 3,
            PipelineStage::Finalize => 4,
        }
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.slug() == slug)
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} stage", self.slug())
    }
}
