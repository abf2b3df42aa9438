//! Ordered rewrite rules for categorical columns.
//!
//! A [`RuleSet`] is a list of `matcher → replacement` rules evaluated in
//! order; the first match wins and unmatched values pass through unchanged.
//! Rule sets are plain data (serde) and are compiled once into a
//! [`CompiledRuleSet`] before a stage runs.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::error::{RulesError, RulesResult};

/// How a rule recognizes a value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Matcher {
    /// Whole value equals `value` (surrounding whitespace ignored)
    Exact { value: String },

    /// Value contains `value`
    Contains { value: String },

    /// Value starts with `value`
    Prefix { value: String },

    /// Value matches the regular expression
    Pattern { regex: String },
}

/// A single rewrite rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(rename = "match")]
    pub matcher: Matcher,

    /// Value written when the matcher fires
    pub replacement: String,

    #[serde(default = "default_case_insensitive")]
    pub case_insensitive: bool,
}

fn default_case_insensitive() -> bool {
    true
}

impl Rule {
    pub fn exact(value: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self::new(Matcher::Exact { value: value.into() }, replacement)
    }

    pub fn contains(value: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self::new(Matcher::Contains { value: value.into() }, replacement)
    }

    pub fn prefix(value: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self::new(Matcher::Prefix { value: value.into() }, replacement)
    }

    pub fn pattern(regex: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self::new(Matcher::Pattern { regex: regex.into() }, replacement)
    }

    fn new(matcher: Matcher, replacement: impl Into<String>) -> Self {
        Self {
            matcher,
            replacement: replacement.into(),
            case_insensitive: true,
        }
    }

    pub fn case_sensitive(mut self) -> Self {
        self.case_insensitive = false;
        self
    }
}

/// Ordered list of rules for one column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleSet {
    pub rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule (lowest priority so far).
    pub fn with(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Validate patterns and fold case once.
    ///
    /// `name` identifies the rule set in error messages.
    pub fn compile(&self, name: &str) -> RulesResult<CompiledRuleSet> {
        let rules = self
            .rules
            .iter()
            .enumerate()
            .map(|(index, rule)| {
                let test = match &rule.matcher {
                    Matcher::Exact { value } => {
                        Test::Exact(fold(value.trim(), rule.case_insensitive))
                    }
                    Matcher::Contains { value } => {
                        Test::Contains(fold(value, rule.case_insensitive))
                    }
                    Matcher::Prefix { value } => Test::Prefix(fold(value, rule.case_insensitive)),
                    Matcher::Pattern { regex } => {
                        let re = RegexBuilder::new(regex)
                            .case_insensitive(rule.case_insensitive)
                            .build()
                            .map_err(|e| RulesError::InvalidPattern {
                                rule_set: name.to_string(),
                                index,
                                message: e.to_string(),
                            })?;
                        Test::Pattern(re)
                    }
                };
                Ok(CompiledRule {
                    test,
                    case_insensitive: rule.case_insensitive,
                    replacement: rule.replacement.clone(),
                })
            })
            .collect::<RulesResult<Vec<_>>>()?;

        Ok(CompiledRuleSet { rules })
    }
}

fn fold(value: &str, case_insensitive: bool) -> String {
    if case_insensitive {
        value.to_lowercase()
    } else {
        value.to_string()
    }
}

#[derive(Debug, Clone)]
enum Test {
    Exact(String),
    Contains(String),
    Prefix(String),
    Pattern(Regex),
}

#[derive(Debug, Clone)]
struct CompiledRule {
    test: Test,
    case_insensitive: bool,
    replacement: String,
}

impl CompiledRule {
    fn matches(&self, value: &str) -> bool {
        let folded = || fold(value, self.case_insensitive);
        match &self.test {
            Test::Exact(expected) => folded().trim() == expected,
            Test::Contains(needle) => folded().contains(needle.as_str()),
            Test::Prefix(prefix) => folded().starts_with(prefix.as_str()),
            // Regexes fold case themselves.
            Test::Pattern(re) => re.is_match(value),
        }
    }
}

/// A rule set ready to apply.
#[derive(Debug, Clone, Default)]
pub struct CompiledRuleSet {
    rules: Vec<CompiledRule>,
}

impl CompiledRuleSet {
    /// Replacement from the first matching rule, if any.
    pub fn rewrite(&self, value: &str) -> Option<&str> {
        self.rules
            .iter()
            .find(|rule| rule.matches(value))
            .map(|rule| rule.replacement.as_str())
    }

    /// The rewritten value, or the input unchanged.
    pub fn apply(&self, value: &str) -> String {
        self.rewrite(value).unwrap_or(value).to_string()
    }

    /// Whether the value is a fixed point of the rule set.
    pub fn is_canonical(&self, value: &str) -> bool {
        self.rewrite(value).map_or(true, |r| r == value)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Get a description of the available matchers
pub fn matchers_description() -> String {
    r#"Available rule matchers:

| Matcher  | Fires when                                  | Parameters        |
|----------|---------------------------------------------|-------------------|
| exact    | Trimmed value equals the parameter          | value: string     |
| contains | Value contains the parameter                | value: string     |
| prefix   | Value starts with the parameter             | value: string     |
| pattern  | Value matches the regular expression        | regex: string     |

Every rule also takes `replacement` (the new value) and an optional
`case_insensitive` flag (default true). Rules are tried in order; the first
match wins; unmatched values are left unchanged.

Example rule set in JSON:
[
  {"match": {"type": "contains", "value": "crypto"}, "replacement": "cryptocurrency"},
  {"match": {"type": "exact", "value": "fin-tech"}, "replacement": "finance"},
  {"match": {"type": "pattern", "regex": "^united states\\.+$"}, "replacement": "United States"}
]"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn industry() -> CompiledRuleSet {
        RuleSet::new()
            .with(Rule::contains("crypto", "cryptocurrency"))
            .with(Rule::exact("fin-tech", "finance"))
            .with(Rule::exact("recruiting", "hr"))
            .compile("industry")
            .unwrap()
    }

    #[test]
    fn test_contains_is_case_insensitive() {
        let rules = industry();
        assert_eq!(rules.apply("Crypto Exchange"), "cryptocurrency");
        assert_eq!(rules.apply("CryptoCurrency"), "cryptocurrency");
        assert_eq!(rules.apply("DeFi crypto"), "cryptocurrency");
    }

    #[test]
    fn test_exact_only_matches_whole_value() {
        let rules = industry();
        assert_eq!(rules.apply("Fin-Tech"), "finance");
        assert_eq!(rules.apply(" recruiting "), "hr");
        assert_eq!(rules.apply("Fin-Tech Lending"), "Fin-Tech Lending");
    }

    #[test]
    fn test_first_match_wins() {
        let rules = RuleSet::new()
            .with(Rule::prefix("fin", "finance"))
            .with(Rule::exact("fin-tech", "fintech"))
            .compile("test")
            .unwrap();
        assert_eq!(rules.apply("fin-tech"), "finance");
    }

    #[test]
    fn test_unmatched_passes_through() {
        assert_eq!(industry().apply("Retail"), "Retail");
        assert_eq!(industry().rewrite("Retail"), None);
    }

    #[test]
    fn test_case_sensitive_rule() {
        let rules = RuleSet::new()
            .with(Rule::exact("HR", "hr").case_sensitive())
            .compile("test")
            .unwrap();
        assert_eq!(rules.apply("HR"), "hr");
        assert_eq!(rules.apply("Hr"), "Hr");
    }

    #[test]
    fn test_pattern_rule() {
        let rules = RuleSet::new()
            .with(Rule::pattern(r"^united states\.+$", "United States"))
            .compile("country")
            .unwrap();
        assert_eq!(rules.apply("United States."), "United States");
        assert_eq!(rules.apply("United States.."), "United States");
        assert_eq!(rules.apply("United Kingdom."), "United Kingdom.");
    }

    #[test]
    fn test_invalid_pattern_is_reported() {
        let err = RuleSet::new()
            .with(Rule::pattern("(", "x"))
            .compile("country")
            .unwrap_err();
        assert!(err.to_string().contains("country rule #0"));
    }

    #[test]
    fn test_canonical_values_are_fixed_points() {
        let rules = industry();
        assert!(rules.is_canonical("cryptocurrency"));
        assert!(rules.is_canonical("finance"));
        assert!(rules.is_canonical("Retail"));
        assert!(!rules.is_canonical("Crypto"));
        assert!(!rules.is_canonical("fin-tech"));
    }

    #[test]
    fn test_rule_json_shape() {
        let json = r#"[{"match": {"type": "exact", "value": "fin-tech"}, "replacement": "finance"}]"#;
        let set: RuleSet = serde_json::from_str(json).unwrap();
        assert_eq!(set.len(), 1);
        assert!(set.rules[0].case_insensitive);
        assert_eq!(set.rules[0], Rule::exact("fin-tech", "finance"));
    }
}
