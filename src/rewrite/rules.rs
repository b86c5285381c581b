//! Ordered literal substitution rules.
//!
//! # Design Decisions
//! - Patterns are plain substrings, never regexes
//! - Rules are an ordered sequence, applied first to last
//! - A ruleset is only accepted if it leaves its own replacements unchanged

use crate::config::RewriteRuleConfig;

/// One `(pattern, replacement)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteRule {
    pattern: String,
    replacement: String,
}

impl RewriteRule {
    pub fn new(pattern: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            replacement: replacement.into(),
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn replacement(&self) -> &str {
        &self.replacement
    }
}

/// Reasons a ruleset is rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RulesetError {
    /// Rule at this index has an empty pattern.
    EmptyPattern(usize),
    /// Rewriting this replacement with the full ruleset changes it again.
    NotIdempotent { replacement: String, rewritten: String },
}

impl std::fmt::Display for RulesetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RulesetError::EmptyPattern(idx) => write!(f, "rewrite rule #{} has an empty pattern", idx),
            RulesetError::NotIdempotent { replacement, rewritten } => write!(
                f,
                "replacement '{}' is rewritten again to '{}'",
                replacement, rewritten
            ),
        }
    }
}

impl std::error::Error for RulesetError {}

/// Immutable, ordered set of substitutions shared by every request.
#[derive(Debug, Clone, Default)]
pub struct RewriteRuleset {
    rules: Vec<RewriteRule>,
}

impl RewriteRuleset {
    /// Build a ruleset, rejecting empty patterns and non-idempotent orderings.
    pub fn new(rules: Vec<RewriteRule>) -> Result<Self, RulesetError> {
        if let Some(idx) = rules.iter().position(|r| r.pattern.is_empty()) {
            return Err(RulesetError::EmptyPattern(idx));
        }

        let ruleset = Self { rules };
        ruleset.check_idempotent()?;
        Ok(ruleset)
    }

    pub fn from_config(rules: &[RewriteRuleConfig]) -> Result<Self, RulesetError> {
        Self::new(
            rules
                .iter()
                .map(|r| RewriteRule::new(r.pattern.clone(), r.replacement.clone()))
                .collect(),
        )
    }

    pub fn rules(&self) -> &[RewriteRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Apply every rule in order, replacing all non-overlapping occurrences.
    pub fn apply(&self, text: &str) -> String {
        let mut out = text.to_string();
        for rule in &self.rules {
            if out.contains(&rule.pattern) {
                out = out.replace(&rule.pattern, &rule.replacement);
            }
        }
        out
    }

    // Catches replacements that re-match a pattern. Matches spanning a
    // replacement and its surrounding text are not detected here.
    fn check_idempotent(&self) -> Result<(), RulesetError> {
        for rule in &self.rules {
            let rewritten = self.apply(&rule.replacement);
            if rewritten != rule.replacement {
                return Err(RulesetError::NotIdempotent {
                    replacement: rule.replacement.clone(),
                    rewritten,
                });
            }
        }
        Ok(())
    }
}
