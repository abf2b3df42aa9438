//! Summary queries over the cleaned table.
//!
//! Rows with a null `total_laid_off` count as events but add nothing to
//! sums and averages. Null industry and null stage are buckets of their
//! own. Rankings break ties by name ascending (the null bucket first).
//! Sums are `i128` so no combination of `i64` row totals can overflow.

use chrono::NaiveDate;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::models::LayoffEvent;
use crate::transform::CleanedTable;

/// Size and time span of the table
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub total_rows: usize,
    pub min_date: Option<NaiveDate>,
    pub max_date: Option<NaiveDate>,
    pub distinct_companies: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyTotal {
    pub company: String,
    pub total_laid_off: i128,
    /// Fraction of the grand total, 0.0 to 1.0
    pub share: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndustryTotal {
    pub industry: Option<String>,
    pub total_laid_off: i128,
    pub share: f64,
}

/// Number of companies of a set that appear under an industry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndustryCount {
    pub industry: Option<String>,
    pub companies: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageSummary {
    pub stage: Option<String>,
    pub events: usize,
    pub total_laid_off: i128,
    /// Mean over events with a known `total_laid_off`
    pub average_laid_off: Option<f64>,
}

/// Every query at once, as printed by `layoffs summary`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub overview: Overview,
    pub top_companies: Vec<CompanyTotal>,
    /// Industry mix of `top_companies`
    pub top_company_industries: Vec<IndustryCount>,
    pub stages: Vec<StageSummary>,
    pub top_industries: Vec<IndustryTotal>,
}

pub fn overview(table: &CleanedTable) -> Overview {
    let dates = table.iter().filter_map(|e| e.date);
    let companies: HashSet<&str> = table.iter().map(|e| e.company.as_str()).collect();

    Overview {
        total_rows: table.len(),
        min_date: dates.clone().min(),
        max_date: dates.max(),
        distinct_companies: companies.len(),
    }
}

/// Sum of every known `total_laid_off`.
pub fn grand_total(table: &CleanedTable) -> i128 {
    table.iter().filter_map(|e| e.total_laid_off).map(i128::from).sum()
}

/// Top `n` companies by summed layoffs.
///
/// Companies without any known `total_laid_off` are not ranked.
pub fn top_companies(table: &CleanedTable, n: usize) -> Vec<CompanyTotal> {
    let grand = grand_total(table);
    let totals = sum_by(table.iter(), |e| e.company.clone());

    ranked(totals, n)
        .into_iter()
        .map(|(company, total)| CompanyTotal {
            company,
            total_laid_off: total,
            share: share(total, grand),
        })
        .collect()
}

/// Top `n` industries by summed layoffs.
pub fn top_industries(table: &CleanedTable, n: usize) -> Vec<IndustryTotal> {
    let grand = grand_total(table);
    let totals = sum_by(table.iter(), |e| e.industry.clone());

    ranked(totals, n)
        .into_iter()
        .map(|(industry, total)| IndustryTotal {
            industry,
            total_laid_off: total,
            share: share(total, grand),
        })
        .collect()
}

/// How many of `companies` appear under each industry.
///
/// A company reported under several industries counts once in each.
pub fn industry_mix(table: &CleanedTable, companies: &[String]) -> Vec<IndustryCount> {
    let wanted: HashSet<&str> = companies.iter().map(String::as_str).collect();
    let mut members: BTreeMap<Option<&str>, BTreeSet<&str>> = BTreeMap::new();

    for event in table.iter().filter(|e| wanted.contains(e.company.as_str())) {
        members
            .entry(event.industry.as_deref())
            .or_default()
            .insert(event.company.as_str());
    }

    let mut counts: Vec<IndustryCount> = members
        .into_iter()
        .map(|(industry, set)| IndustryCount {
            industry: industry.map(String::from),
            companies: set.len(),
        })
        .collect();
    counts.sort_by(|a, b| {
        b.companies
            .cmp(&a.companies)
            .then_with(|| a.industry.cmp(&b.industry))
    });
    counts
}

/// Event count, summed and average layoffs per funding stage, largest
/// total first.
pub fn stage_breakdown(table: &CleanedTable) -> Vec<StageSummary> {
    #[derive(Default)]
    struct Acc {
        events: usize,
        known: usize,
        total: i128,
    }

    let mut stages: BTreeMap<Option<&str>, Acc> = BTreeMap::new();
    for event in table.iter() {
        let acc = stages.entry(event.stage.as_deref()).or_default();
        acc.events += 1;
        if let Some(n) = event.total_laid_off {
            acc.known += 1;
            acc.total += i128::from(n);
        }
    }

    let mut rows: Vec<StageSummary> = stages
        .into_iter()
        .map(|(stage, acc)| StageSummary {
            stage: stage.map(String::from),
            events: acc.events,
            total_laid_off: acc.total,
            average_laid_off: (acc.known > 0).then(|| acc.total as f64 / acc.known as f64),
        })
        .collect();
    rows.sort_by(|a, b| {
        b.total_laid_off
            .cmp(&a.total_laid_off)
            .then_with(|| a.stage.cmp(&b.stage))
    });
    rows
}

/// Run every query, with `top_n` for the rankings.
pub fn summarize(table: &CleanedTable, top_n: usize) -> Summary {
    let top_companies = top_companies(table, top_n);
    let names: Vec<String> = top_companies.iter().map(|c| c.company.clone()).collect();

    Summary {
        overview: overview(table),
        top_company_industries: industry_mix(table, &names),
        top_companies,
        stages: stage_breakdown(table),
        top_industries: top_industries(table, top_n),
    }
}

/// Sum known totals per key; keys with no known total are left out.
fn sum_by<'a, K: Ord>(
    events: impl Iterator<Item = &'a LayoffEvent>,
    key: impl Fn(&LayoffEvent) -> K,
) -> BTreeMap<K, i128> {
    let mut totals = BTreeMap::new();
    for event in events {
        if let Some(n) = event.total_laid_off {
            *totals.entry(key(event)).or_insert(0) += i128::from(n);
        }
    }
    totals
}

/// Largest first, ties by key ascending, first `n`.
fn ranked<K: Ord>(totals: BTreeMap<K, i128>, n: usize) -> Vec<(K, i128)> {
    let mut rows: Vec<(K, i128)> = totals.into_iter().collect();
    rows.sort_by(|a, b| match b.1.cmp(&a.1) {
        Ordering::Equal => a.0.cmp(&b.0),
        other => other,
    });
    rows.truncate(n);
    rows
}

fn share(part: i128, whole: i128) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}
