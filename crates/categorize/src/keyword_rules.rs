use budgnudg_core::KeywordRule;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;

/// Outcome of a keyword rule hit; terminal for resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordMatch {
    pub keyword: String,
    pub priority: i32,
    pub category: String,
    pub subcategory: Option<String>,
    pub payoree: Option<String>,
    pub reasoning: String,
}

#[derive(Deserialize)]
struct KeywordRuleFile {
    #[serde(default)]
    rule: Vec<KeywordRule>,
}

/// Internal pairing of a rule with its uppercased keyword.
struct PreparedRule {
    rule: KeywordRule,
    needle: String,
}

pub struct KeywordRuleRegistry {
    rules: Vec<PreparedRule>,
}

impl KeywordRuleRegistry {
    /// Inactive rules and rules with a blank keyword are dropped.
    pub fn new(rules: Vec<KeywordRule>) -> Self {
        let mut prepared: Vec<PreparedRule> = rules
            .into_iter()
            .filter(|r| r.is_active)
            .filter_map(|rule| {
                let needle = rule.keyword.trim().to_uppercase();
                (!needle.is_empty()).then_some(PreparedRule { rule, needle })
            })
            .collect();
        // Highest priority first; stable, so ties keep registration order.
        prepared.sort_by(|a, b| b.rule.priority.cmp(&a.rule.priority));
        Self { rules: prepared }
    }

    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Parses `[[rule]]` tables.
    pub fn from_toml(toml_content: &str) -> Result<Self, ConfigError> {
        let file: KeywordRuleFile = toml::from_str(toml_content)?;
        Ok(Self::new(file.rule))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rules(&self) -> impl Iterator<Item = &KeywordRule> {
        self.rules.iter().map(|p| &p.rule)
    }

    pub fn check(&self, description: &str) -> Option<KeywordMatch> {
        let haystack = description.to_uppercase();
        let hit = self.rules.iter().find(|p| haystack.contains(&p.needle))?;
        let rule = &hit.rule;
        debug!(keyword = %rule.keyword, priority = rule.priority, "Keyword rule matched");
        Some(KeywordMatch {
            keyword: rule.keyword.clone(),
            priority: rule.priority,
            category: rule.category.clone(),
            subcategory: rule.subcategory.clone().filter(|s| !s.trim().is_empty()),
            payoree: rule.payoree.clone().filter(|s| !s.trim().is_empty()),
            reasoning: format!(
                "Matched keyword rule '{}' (priority {})",
                rule.keyword, rule.priority
            ),
        })
    }
}

impl Default for KeywordRuleRegistry {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_is_case_insensitive_substring() {
        let registry = KeywordRuleRegistry::new(vec![
            KeywordRule::new("whole foods", "Food & Dining", 1).with_subcategory("Groceries"),
        ]);
        let m = registry.check("WHOLE FOODS MARKET 123").unwrap();
        assert_eq!(m.category, "Food & Dining");
        assert_eq!(m.subcategory.as_deref(), Some("Groceries"));
        assert!(m.reasoning.contains("whole foods"));
        assert!(registry.check("STARBUCKS").is_none());
    }

    #[test]
    fn highest_priority_wins() {
        let registry = KeywordRuleRegistry::new(vec![
            KeywordRule::new("amazon", "Shopping", 1),
            KeywordRule::new("amazon", "Business", 10),
        ]);
        assert_eq!(registry.check("AMAZON MARKETPLACE").unwrap().category, "Business");
    }

    #[test]
    fn equal_priority_keeps_registration_order() {
        let registry = KeywordRuleRegistry::new(vec![
            KeywordRule::new("prime", "Entertainment", 5),
            KeywordRule::new("amazon", "Shopping", 5),
        ]);
        assert_eq!(
            registry.check("AMAZON PRIME MEMBERSHIP").unwrap().category,
            "Entertainment"
        );
    }

    #[test]
    fn inactive_and_blank_rules_ignored() {
        let mut inactive = KeywordRule::new("github", "Business", 50);
        inactive.is_active = false;
        let registry = KeywordRuleRegistry::new(vec![
            inactive,
            KeywordRule::new("   ", "Anything", 99),
        ]);
        assert!(registry.is_empty());
        assert!(registry.check("GITHUB SUBSCRIPTION").is_none());
    }

    #[test]
    fn payoree_is_carried() {
        let registry = KeywordRuleRegistry::new(vec![
            KeywordRule::new("zelle to maria", "Household", 100)
                .with_subcategory("Childcare")
                .with_payoree("Maria Lopez"),
        ]);
        let m = registry.check("ZELLE TO MARIA 5/3").unwrap();
        assert_eq!(m.payoree.as_deref(), Some("Maria Lopez"));
    }

    #[test]
    fn from_toml_uses_defaults() {
        let registry = KeywordRuleRegistry::from_toml(
            r#"
[[rule]]
keyword = "github"
category = "Business"
subcategory = "Software"

[[rule]]
keyword = "github sponsors"
category = "Gifts & Donations"
priority = 200
"#,
        )
        .unwrap();
        assert_eq!(registry.len(), 2);
        let rules: Vec<_> = registry.rules().collect();
        assert_eq!(rules[0].priority, 200);
        assert_eq!(rules[1].priority, 100);
        assert!(rules[1].is_active);
        assert_eq!(
            registry.check("GITHUB SPONSORS 0042").unwrap().category,
            "Gifts & Donations"
        );
    }
}
