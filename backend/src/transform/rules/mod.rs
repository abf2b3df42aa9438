//! Cleaning rules
//!
//! - `rule`: ordered `matcher → replacement` rule sets for categorical columns
//! - `config`: the full rule configuration (rule sets, backfill table, date
//!   formats and policy, null tokens) and its compiled form
//!
//! ## Example
//!
//! ```rust,ignore
//! use layoffs::{CleaningRules, DatePolicy};
//!
//! let rules = CleaningRules::from_file("rules.json")?
//!     .with_date_policy(DatePolicy::Skip)
//!     .compile()?;
//!
//! assert_eq!(rules.industry.apply("Crypto Exchange"), "cryptocurrency");
//! ```

pub mod config;
pub mod rule;

pub use config::{BackfillEntry, BackfillTable, CleaningRules, CompiledRules, DatePolicy};
pub use rule::{matchers_description, CompiledRuleSet, Matcher, Rule, RuleSet};
