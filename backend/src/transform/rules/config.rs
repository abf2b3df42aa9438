//! Cleaning rules definition
//!
//! [`CleaningRules`] gathers every tunable of the pipeline: the industry and
//! country rule sets, the industry backfill table, accepted date formats, the
//! date policy and the tokens read as null. The built-in default is the rule
//! set the layoffs dataset was cleaned with; a JSON file can override any
//! section, and sections it omits keep their defaults.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use super::rule::{CompiledRuleSet, Rule, RuleSet};
use crate::error::{RulesError, RulesResult};
use crate::parser::DEFAULT_NULL_TOKENS;

/// What to do with a date that matches none of the accepted formats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatePolicy {
    /// Fail the whole run, listing every offending row
    #[default]
    Abort,
    /// Drop the offending rows and list them in the run report
    Skip,
}

impl std::fmt::Display for DatePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatePolicy::Abort => write!(f, "abort"),
            DatePolicy::Skip => write!(f, "skip"),
        }
    }
}

/// One `(company, location) → industry` backfill entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackfillEntry {
    pub company: String,
    pub location: String,
    pub industry: String,
}

impl BackfillEntry {
    pub fn new(
        company: impl Into<String>,
        location: impl Into<String>,
        industry: impl Into<String>,
    ) -> Self {
        Self {
            company: company.into(),
            location: location.into(),
            industry: industry.into(),
        }
    }
}

/// Complete rule configuration for a cleaning run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleaningRules {
    /// Version of the rules format
    #[serde(default = "default_version")]
    pub version: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Industry rewrite rules, first match wins
    #[serde(default = "default_industry_rules")]
    pub industry: RuleSet,

    /// Country rewrite rules, first match wins
    #[serde(default = "default_country_rules")]
    pub country: RuleSet,

    /// Curated `(company, location) → industry` lookup for null industries
    #[serde(default = "default_industry_backfill")]
    pub industry_backfill: Vec<BackfillEntry>,

    /// chrono formats tried in order when parsing `date`
    #[serde(default = "default_date_formats")]
    pub date_formats: Vec<String>,

    #[serde(default)]
    pub date_policy: DatePolicy,

    /// Cell values read as null (compared case-insensitively)
    #[serde(default = "default_null_tokens")]
    pub null_tokens: Vec<String>,
}

fn default_version() -> String {
    "1.0".to_string()
}

fn default_industry_rules() -> RuleSet {
    RuleSet::new()
        .with(Rule::contains("crypto", "cryptocurrency"))
        .with(Rule::exact("fin-tech", "finance"))
        .with(Rule::exact("recruiting", "hr"))
}

fn default_country_rules() -> RuleSet {
    RuleSet::new().with(Rule::exact("united states.", "United States"))
}

fn default_industry_backfill() -> Vec<BackfillEntry> {
    vec![
        BackfillEntry::new("airbnb", "sf bay area", "travel"),
        BackfillEntry::new("carvana", "phoenix", "transportation"),
        BackfillEntry::new("juul", "sf bay area", "consumer"),
    ]
}

fn default_date_formats() -> Vec<String> {
    vec!["%m/%d/%Y".to_string(), "%Y-%m-%d".to_string()]
}

fn default_null_tokens() -> Vec<String> {
    DEFAULT_NULL_TOKENS.iter().map(|t| t.to_string()).collect()
}

impl Default for CleaningRules {
    fn default() -> Self {
        Self {
            version: default_version(),
            description: "Layoffs dataset cleanup".to_string(),
            industry: default_industry_rules(),
            country: default_country_rules(),
            industry_backfill: default_industry_backfill(),
            date_formats: default_date_formats(),
            date_policy: DatePolicy::default(),
            null_tokens: default_null_tokens(),
        }
    }
}

impl CleaningRules {
    /// Parse rules from a JSON string
    pub fn from_json(json: &str) -> RulesResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load rules from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> RulesResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn with_date_policy(mut self, policy: DatePolicy) -> Self {
        self.date_policy = policy;
        self
    }

    /// Validate patterns and build lookup tables.
    pub fn compile(&self) -> RulesResult<CompiledRules> {
        if self.date_formats.is_empty() {
            return Err(RulesError::NoDateFormats);
        }

        Ok(CompiledRules {
            industry: self.industry.compile("industry")?,
            country: self.country.compile("country")?,
            backfill: BackfillTable::new(&self.industry_backfill),
            date_formats: self.date_formats.clone(),
            date_policy: self.date_policy,
            null_tokens: self.null_tokens.clone(),
        })
    }
}

/// Case-insensitive `(company, location)` lookup.
#[derive(Debug, Clone, Default)]
pub struct BackfillTable {
    entries: HashMap<(String, String), String>,
}

impl BackfillTable {
    /// Later entries override earlier ones for the same key.
    pub fn new(entries: &[BackfillEntry]) -> Self {
        let entries = entries
            .iter()
            .map(|e| (key(&e.company, &e.location), e.industry.clone()))
            .collect();
        Self { entries }
    }

    pub fn lookup(&self, company: &str, location: &str) -> Option<&str> {
        self.entries.get(&key(company, location)).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn key(company: &str, location: &str) -> (String, String) {
    (company.trim().to_lowercase(), location.trim().to_lowercase())
}

/// Rules ready for the stages.
#[derive(Debug, Clone)]
pub struct CompiledRules {
    pub industry: CompiledRuleSet,
    pub country: CompiledRuleSet,
    pub backfill: BackfillTable,
    pub date_formats: Vec<String>,
    pub date_policy: DatePolicy,
    pub null_tokens: Vec<String>,
}

impl CompiledRules {
    /// The built-in rules, compiled.
    pub fn builtin() -> Self {
        CleaningRules::default()
            .compile()
            .expect("Invalid built-in rules")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rules() {
        let rules = CleaningRules::default();
        assert_eq!(rules.industry.len(), 3);
        assert_eq!(rules.country.len(), 1);
        assert_eq!(rules.industry_backfill.len(), 3);
        assert_eq!(rules.date_policy, DatePolicy::Abort);
        assert!(rules.compile().is_ok());
    }

    #[test]
    fn test_missing_sections_keep_defaults() {
        let rules = CleaningRules::from_json(r#"{"date_policy": "skip"}"#).unwrap();
        assert_eq!(rules.date_policy, DatePolicy::Skip);
        assert_eq!(rules.industry, default_industry_rules());
        assert_eq!(rules.null_tokens, vec!["NULL".to_string(), "N/A".to_string()]);
    }

    #[test]
    fn test_override_section() {
        let json = r#"{
            "country": [
                {"match": {"type": "exact", "value": "united states."}, "replacement": "United States"},
                {"match": {"type": "exact", "value": "usa"}, "replacement": "United States"}
            ]
        }"#;
        let compiled = CleaningRules::from_json(json).unwrap().compile().unwrap();
        assert_eq!(compiled.country.apply("USA"), "United States");
    }

    #[test]
    fn test_json_roundtrip_of_defaults() {
        let rules = CleaningRules::default();
        let back = CleaningRules::from_json(&rules.to_json().unwrap()).unwrap();
        assert_eq!(back, rules);
    }

    #[test]
    fn test_no_date_formats_rejected() {
        let rules = CleaningRules {
            date_formats: vec![],
            ..CleaningRules::default()
        };
        assert!(matches!(rules.compile(), Err(RulesError::NoDateFormats)));
    }

    #[test]
    fn test_backfill_lookup_is_case_insensitive() {
        let table = BackfillTable::new(&default_industry_backfill());
        assert_eq!(table.lookup("Airbnb", "SF Bay Area"), Some("travel"));
        assert_eq!(table.lookup(" Carvana ", "Phoenix"), Some("transportation"));
        assert_eq!(table.lookup("Airbnb", "Phoenix"), None);
        assert_eq!(table.lookup("Bally's Interactive", "Providence"), None);
    }

    #[test]
    fn test_builtin_compiles() {
        let rules = CompiledRules::builtin();
        assert_eq!(rules.backfill.len(), 3);
        assert_eq!(rules.industry.apply("Crypto"), "cryptocurrency");
    }
}
