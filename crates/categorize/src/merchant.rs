use regex::{Regex, RegexBuilder};
use tracing::warn;

use crate::error::ConfigError;
use crate::tables::{RuleTables, StandardizationRule, Standardize};
use crate::util::{collapse_whitespace, fold_accents, strip_punctuation, title_case};

/// Noise removed from an uppercased description before standardization,
/// applied in this order.
const NOISE_PATTERNS: &[&str] = &[
    r"\b(?:PPD|WEB|CCD|TEL)\s*ID:?\s*\S*",
    r"\b(?:ONLINE|ELECTRONIC)\s+PAYMENT\b",
    r"\bBILL\s*PAY\b",
    r"\b(?:ACH|PYMT|PMT|AUTOPAY|AUTO\s+PAY|DEBIT|CREDIT|PAYMENT)\b",
    r"\b(?:REF|TRANS|CONF)\b\s*[#:]?\s*[A-Z0-9]*\d[A-Z0-9]*",
    r"\bACCT\s*\*?\s*\d+",
    r"\bX{2,}\d+\b",
    r"\b(?:\d{4}[\s-]?){3}\d{4}\b",
    r"\b\d{11,}\b",
    r"#\s*\d+",
    r"\bID:?\s*\d+\b",
    r"\b\d{3,4}\b",
];

struct CompiledStandardization {
    regex: Regex,
    priority: i32,
    standardize: Standardize,
}

impl CompiledStandardization {
    fn compile(rule: StandardizationRule) -> Result<Self, ConfigError> {
        let regex = RegexBuilder::new(&rule.pattern)
            .case_insensitive(true)
            .build()
            .map_err(|source| ConfigError::InvalidPattern {
                pattern: rule.pattern.clone(),
                source,
            })?;
        Ok(Self {
            regex,
            priority: rule.priority,
            standardize: rule.standardize,
        })
    }

    fn literal(&self, text: &str) -> Option<&str> {
        match &self.standardize {
            Standardize::Literal(name) if self.regex.is_match(text) => Some(name.as_str()),
            _ => None,
        }
    }

    /// Text a title-case rule keeps: capture group 1, or the whole match.
    fn kept<'t>(&self, text: &'t str) -> Option<&'t str> {
        if self.standardize != Standardize::TitleCase {
            return None;
        }
        let caps = self.regex.captures(text)?;
        caps.get(1).or_else(|| caps.get(0)).map(|m| m.as_str().trim())
    }
}

/// Turns raw bank descriptions into merchant keys.
///
/// Standardization rules are tried highest priority first, then in table
/// order; the first one that matches decides the key.
pub struct MerchantExtractor {
    noise: Vec<Regex>,
    rules: Vec<CompiledStandardization>,
}

impl MerchantExtractor {
    pub fn new(rules: Vec<StandardizationRule>) -> Result<Self, ConfigError> {
        let compiled = rules
            .into_iter()
            .map(CompiledStandardization::compile)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_compiled(compiled))
    }

    fn from_compiled(mut rules: Vec<CompiledStandardization>) -> Self {
        // Stable sort keeps table order inside a priority.
        rules.sort_by(|a, b| b.priority.cmp(&a.priority));
        let noise = NOISE_PATTERNS
            .iter()
            .filter_map(|p| RegexBuilder::new(p).case_insensitive(true).build().ok())
            .collect();
        Self { noise, rules }
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Merchant key for `description`; `""` when there is nothing to key on.
    pub fn extract(&self, description: &str) -> String {
        let upper = fold_accents(description.trim()).to_uppercase();
        if upper.is_empty() {
            return String::new();
        }

        let mut cleaned = upper;
        for re in &self.noise {
            cleaned = re.replace_all(&cleaned, " ").into_owned();
        }
        let cleaned = collapse_whitespace(&cleaned);

        for rule in &self.rules {
            if let Some(name) = rule.literal(&cleaned) {
                return name.to_string();
            }
            if let Some(kept) = rule.kept(&cleaned) {
                // A known chain behind a processor prefix keeps its canonical name.
                return match self.canonical(kept) {
                    Some(name) => name.to_string(),
                    None => title_case(kept),
                };
            }
        }
        strip_punctuation(&cleaned)
    }

    fn canonical(&self, text: &str) -> Option<&str> {
        self.rules.iter().find_map(|rule| rule.literal(text))
    }
}

impl Default for MerchantExtractor {
    /// Built-in standardization table. Patterns that fail to compile are
    /// skipped.
    fn default() -> Self {
        let compiled = RuleTables::default()
            .standardization
            .into_iter()
            .filter_map(|rule| match CompiledStandardization::compile(rule) {
                Ok(c) => Some(c),
                Err(e) => {
                    warn!("Skipping standardization rule: {e}");
                    None
                }
            })
            .collect();
        Self::from_compiled(compiled)
    }
}
