//! Output validation for the cleaned layoffs table.
//!
//! Two complementary checks:
//!
//! ## Row schema
//! Each serialized row is validated against the embedded JSON Schema
//! (Draft 7) `schemas/layoff-event.json`: exact column set, ISO dates,
//! integer magnitudes, trimmed company.
//!
//! ## Table invariants
//! Properties that span rows or depend on the active rules:
//! - no two rows are equal on all nine columns
//! - every row has `total_laid_off` or `percentage_laid_off`
//! - industry and country are fixed points of their rule sets
//! - company carries no surrounding whitespace, industry is never blank
//!
//! # Example
//!
//! ```rust,ignore
//! use serde_json::json;
//! use layoffs::validation::is_valid_event;
//!
//! let row = json!({
//!     "company": "Casper", "location": "New York City", "industry": "Retail",
//!     "total_laid_off": 78, "percentage_laid_off": null, "date": "2022-09-14",
//!     "stage": "Post-IPO", "country": "United States", "funds_raised_millions": 339
//! });
//! assert!(is_valid_event(&row));
//! ```

use jsonschema::Validator;
use once_cell::sync::Lazy;
use serde_json::Value;
use std::collections::HashMap;

use crate::models::LayoffEvent;
use crate::transform::rules::CompiledRules;

/// The layoff event schema, compiled once.
static LAYOFF_EVENT_VALIDATOR: Lazy<Validator> = Lazy::new(|| {
    let schema: Value = serde_json::from_str(include_str!("../../schemas/layoff-event.json"))
        .expect("Invalid embedded schema");
    jsonschema::draft7::new(&schema).expect("Invalid embedded schema")
});

/// Validate a JSON value against a JSON Schema (Draft 7).
///
/// Returns every validation error message on failure.
///
/// # Example
/// ```ignore
/// use serde_json::json;
/// use layoffs::validation::validate;
///
/// let schema = json!({
///     "type": "object",
///     "required": ["company"],
///     "properties": { "company": { "type": "string" } }
/// });
///
/// assert!(validate(&schema, &json!({ "company": "Oda" })).is_ok());
/// assert!(validate(&schema, &json!({ "country": "Norway" })).is_err());
/// ```
pub fn validate(schema: &Value, data: &Value) -> Result<(), Vec<String>> {
    let validator =
        jsonschema::draft7::new(schema).map_err(|e| vec![format!("Invalid schema: {}", e)])?;
    collect_errors(&validator, data)
}

fn collect_errors(validator: &Validator, data: &Value) -> Result<(), Vec<String>> {
    let errors: Vec<String> = validator.iter_errors(data).map(|e| e.to_string()).collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Like [`validate`], without the messages.
pub fn is_valid(schema: &Value, data: &Value) -> bool {
    jsonschema::draft7::is_valid(schema, data)
}

/// Validate one serialized row against the layoff event schema.
pub fn validate_event(data: &Value) -> Result<(), Vec<String>> {
    collect_errors(&LAYOFF_EVENT_VALIDATOR, data)
}

/// Quick check against the layoff event schema.
pub fn is_valid_event(data: &Value) -> bool {
    LAYOFF_EVENT_VALIDATOR.is_valid(data)
}

/// Check the table-level invariants, listing every violation.
///
/// Row numbers in messages are 1-based positions in the table.
pub fn check_invariants(rows: &[LayoffEvent], rules: &CompiledRules) -> Result<(), Vec<String>> {
    let mut violations = Vec::new();
    let mut first_seen: HashMap<&LayoffEvent, usize> = HashMap::with_capacity(rows.len());

    for (i, event) in rows.iter().enumerate() {
        let row = i + 1;

        if let Some(first) = first_seen.insert(event, row) {
            violations.push(format!(
                "row {}: duplicate of row {} ({})",
                row, first, event.company
            ));
        }

        if !event.has_magnitude() {
            violations.push(format!(
                "row {}: neither total_laid_off nor percentage_laid_off is set ({})",
                row, event.company
            ));
        }

        if event.company.trim() != event.company {
            violations.push(format!(
                "row {}: company '{}' has surrounding whitespace",
                row, event.company
            ));
        }

        match event.industry.as_deref() {
            Some(industry) if industry.trim().is_empty() => {
                violations.push(format!("row {}: blank industry instead of null", row));
            }
            Some(industry) if !rules.industry.is_canonical(industry) => {
                violations.push(format!(
                    "row {}: industry '{}' is not canonical (rewrites to '{}')",
                    row,
                    industry,
                    rules.industry.apply(industry)
                ));
            }
            _ => {}
        }

        if !rules.country.is_canonical(&event.country) {
            violations.push(format!(
                "row {}: country '{}' is not canonical (rewrites to '{}')",
                row,
                event.country,
                rules.country.apply(&event.country)
            ));
        }
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::rules::{CleaningRules, Rule, RuleSet};
    use chrono::NaiveDate;
    use serde_json::json;

    fn event(company: &str) -> LayoffEvent {
        LayoffEvent {
            company: company.into(),
            location: "New York City".into(),
            industry: Some("Retail".into()),
            total_laid_off: Some(78),
            percentage_laid_off: None,
            date: NaiveDate::from_ymd_opt(2022, 9, 14),
            stage: Some("Post-IPO".into()),
            country: "United States".into(),
            funds_raised_millions: Some(339),
        }
    }

    #[test]
    fn test_valid_event() {
        let row = serde_json::to_value(event("Casper")).unwrap();
        assert!(is_valid_event(&row));
        assert!(validate_event(&row).is_ok());
    }

    #[test]
    fn test_event_with_nulls() {
        let row = json!({
            "company": "Oda", "location": "Oslo", "industry": null,
            "total_laid_off": null, "percentage_laid_off": "0.18", "date": null,
            "stage": null, "country": "Norway", "funds_raised_millions": null
        });
        assert!(is_valid_event(&row));
    }

    #[test]
    fn test_invalid_events() {
        let mut row = serde_json::to_value(event("Casper")).unwrap();
        row["date"] = json!("3/6/2023");
        assert!(!is_valid_event(&row));

        let mut row = serde_json::to_value(event(" Casper")).unwrap();
        assert!(!is_valid_event(&row));

        row["company"] = json!("Casper");
        row["row_num"] = json!(1);
        assert!(!is_valid_event(&row));

        let mut row = serde_json::to_value(event("Casper")).unwrap();
        row["total_laid_off"] = json!(null);
        let errors = validate_event(&row).unwrap_err();
        assert!(!errors.is_empty());
    }

    #[test]
    fn test_company_with_inner_newline() {
        let row = serde_json::to_value(event("Acme\nHoldings")).unwrap();
        assert!(is_valid_event(&row));
        assert!(check_invariants(&[event("Acme\nHoldings")], &CompiledRules::builtin()).is_ok());

        let row = serde_json::to_value(event("Acme\n")).unwrap();
        assert!(!is_valid_event(&row));
    }

    #[test]
    fn test_shared_validator_matches_ad_hoc_schema() {
        let schema: Value =
            serde_json::from_str(include_str!("../../schemas/layoff-event.json")).unwrap();
        let good = serde_json::to_value(event("Casper")).unwrap();
        let mut bad = good.clone();
        bad["date"] = json!("9/14/2022");

        for _ in 0..3 {
            assert!(validate_event(&good).is_ok());
            assert_eq!(validate_event(&bad), validate(&schema, &bad));
            assert_eq!(is_valid_event(&bad), is_valid(&schema, &bad));
        }
    }

    #[test]
    fn test_clean_table_passes() {
        let rows = vec![event("Casper"), event("Oda")];
        assert!(check_invariants(&rows, &CompiledRules::builtin()).is_ok());
    }

    #[test]
    fn test_invariant_violations_listed() {
        let mut crypto = event("Coinbase");
        crypto.industry = Some("Crypto Exchange".into());
        let mut empty = event(" Ghost");
        empty.total_laid_off = None;
        let mut dotted = event("Stripe");
        dotted.country = "United States.".into();

        let rows = vec![event("Casper"), event("Casper"), crypto, empty, dotted];
        let violations = check_invariants(&rows, &CompiledRules::builtin()).unwrap_err();

        assert_eq!(violations.len(), 5);
        assert!(violations[0].contains("duplicate of row 1"));
        assert!(violations.iter().any(|v| v.contains("cryptocurrency")));
        assert!(violations.iter().any(|v| v.contains("neither")));
        assert!(violations.iter().any(|v| v.contains("whitespace")));
        assert!(violations.iter().any(|v| v.contains("'United States.'")));
    }

    #[test]
    fn test_invariants_follow_active_rules() {
        let mut rules = CleaningRules::default();
        rules.industry = RuleSet::new().with(Rule::exact("retail", "Consumer"));
        let compiled = rules.compile().unwrap();

        let violations = check_invariants(&[event("Casper")], &compiled).unwrap_err();
        assert_eq!(violations.len(), 1);
        assert!(violations[0].contains("'Consumer'"));
    }
}
