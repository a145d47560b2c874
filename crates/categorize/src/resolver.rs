use budgnudg_core::{LearningKind, LearningStore, Money};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::{RuleCatalog, DEFAULT_CATEGORY, NO_DESCRIPTION};
use crate::keyword_rules::KeywordRuleRegistry;

/// Which layer produced a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DecisionSource {
    Empty,
    Keyword,
    Learned,
    RuleBased,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub category: String,
    pub subcategory: String,
    pub payoree: Option<String>,
    pub reasoning: String,
    pub source: DecisionSource,
    pub merchant_key: String,
}

impl Decision {
    pub fn as_tuple(&self) -> (String, String, String) {
        (
            self.category.clone(),
            self.subcategory.clone(),
            self.reasoning.clone(),
        )
    }
}

/// Keyword rules, then learned associations, then the static catalog.
///
/// Read-only: confirmations are recorded by the caller after it saves.
pub struct CategorizationResolver<'a> {
    catalog: &'a RuleCatalog,
    keywords: &'a KeywordRuleRegistry,
    learning: &'a dyn LearningStore,
}

impl<'a> CategorizationResolver<'a> {
    pub fn new(
        catalog: &'a RuleCatalog,
        keywords: &'a KeywordRuleRegistry,
        learning: &'a dyn LearningStore,
    ) -> Self {
        Self {
            catalog,
            keywords,
            learning,
        }
    }

    pub fn resolve(&self, description: &str, amount: Money) -> Decision {
        if description.trim().is_empty() {
            return Decision {
                category: DEFAULT_CATEGORY.to_string(),
                subcategory: String::new(),
                payoree: None,
                reasoning: NO_DESCRIPTION.to_string(),
                source: DecisionSource::Empty,
                merchant_key: String::new(),
            };
        }

        let merchant_key = self.catalog.extractor().extract(description);

        if let Some(hit) = self.keywords.check(description) {
            return Decision {
                category: hit.category,
                subcategory: hit.subcategory.unwrap_or_default(),
                payoree: hit.payoree,
                reasoning: hit.reasoning,
                source: DecisionSource::Keyword,
                merchant_key,
            };
        }

        let payoree = self
            .learning
            .top_association(LearningKind::Payoree, &merchant_key)
            .map(|a| a.target.name);

        if let Some(learned) = self
            .learning
            .top_association(LearningKind::Subcategory, &merchant_key)
        {
            let count = learned.confirmation_count;
            debug!(merchant = %merchant_key, subcategory = %learned.target.name, count, "Using learned subcategory");
            let plural = if count == 1 { "" } else { "s" };
            // A learned top-level category has no parent and stands for itself.
            let (category, subcategory) = match learned.target.parent {
                Some(parent) => (parent, learned.target.name),
                None => (learned.target.name, String::new()),
            };
            return Decision {
                category,
                subcategory,
                payoree,
                reasoning: format!(
                    "Learned from {count} previous user confirmation{plural} of merchant '{merchant_key}'"
                ),
                source: DecisionSource::Learned,
                merchant_key,
            };
        }

        let suggestion = self.catalog.categorize_with_reasoning(description, amount);
        Decision {
            category: suggestion.category,
            subcategory: suggestion.subcategory,
            payoree,
            reasoning: suggestion.reasoning,
            source: DecisionSource::RuleBased,
            merchant_key,
        }
    }

    pub fn suggest_subcategory(&self, description: &str) -> Option<String> {
        let key = self.catalog.extractor().extract(description);
        if key.is_empty() {
            return None;
        }
        self.learning
            .top_association(LearningKind::Subcategory, &key)
            .map(|a| a.target.name)
    }

    pub fn suggest_payoree(&self, description: &str) -> Option<String> {
        let key = self.catalog.extractor().extract(description);
        if key.is_empty() {
            return None;
        }
        self.learning
            .top_association(LearningKind::Payoree, &key)
            .map(|a| a.target.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use budgnudg_core::{KeywordRule, LearningTarget, MemoryLearningStore};
    use chrono::NaiveDate;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 2).unwrap()
    }

    fn confirm(store: &mut MemoryLearningStore, kind: LearningKind, key: &str, target: LearningTarget, times: u32) {
        for _ in 0..times {
            store.record_confirmation(kind, key, target.clone(), day());
        }
    }

    #[test]
    fn empty_description() {
        let catalog = RuleCatalog::default();
        let keywords = KeywordRuleRegistry::empty();
        let store = MemoryLearningStore::new();
        let resolver = CategorizationResolver::new(&catalog, &keywords, &store);
        let d = resolver.resolve("   ", Money::zero());
        assert_eq!(d.as_tuple(), ("Miscellaneous".into(), "".into(), "No description provided".into()));
        assert_eq!(d.source, DecisionSource::Empty);
    }

    #[test]
    fn learned_subcategory_overrides_catalog() {
        let catalog = RuleCatalog::default();
        let keywords = KeywordRuleRegistry::empty();
        let mut store = MemoryLearningStore::new();
        confirm(
            &mut store,
            LearningKind::Subcategory,
            "Starbucks",
            LearningTarget::new(40, "Client Meals", Some("Work")),
            8,
        );
        let resolver = CategorizationResolver::new(&catalog, &keywords, &store);
        let d = resolver.resolve("STARBUCKS #88 EVANSTON", Money::from_cents(-450));
        assert_eq!(d.category, "Work");
        assert_eq!(d.subcategory, "Client Meals");
        assert_eq!(d.source, DecisionSource::Learned);
        assert!(d.reasoning.contains("8 previous user confirmations"));
    }

    #[test]
    fn learned_payoree_attaches_to_catalog_decision() {
        let catalog = RuleCatalog::default();
        let keywords = KeywordRuleRegistry::empty();
        let mut store = MemoryLearningStore::new();
        confirm(
            &mut store,
            LearningKind::Payoree,
            "Shell",
            LearningTarget::new(5, "Shell Oil", None),
            2,
        );
        let resolver = CategorizationResolver::new(&catalog, &keywords, &store);
        let d = resolver.resolve("SHELL OIL 57442", Money::from_cents(-3800));
        assert_eq!(d.source, DecisionSource::RuleBased);
        assert_eq!(d.subcategory, "Gas");
        assert_eq!(d.payoree.as_deref(), Some("Shell Oil"));
    }

    #[test]
    fn keyword_rule_is_terminal() {
        let catalog = RuleCatalog::default();
        let keywords = KeywordRuleRegistry::new(vec![KeywordRule::new("starbucks", "Business", 100)
            .with_subcategory("Meetings")
            .with_payoree("Starbucks Corp")]);
        let mut store = MemoryLearningStore::new();
        confirm(
            &mut store,
            LearningKind::Subcategory,
            "Starbucks",
            LearningTarget::new(10, "Coffee/Tea", Some("Food & Dining")),
            20,
        );
        let resolver = CategorizationResolver::new(&catalog, &keywords, &store);
        let d = resolver.resolve("STARBUCKS 1234", Money::from_cents(-500));
        assert_eq!(d.category, "Business");
        assert_eq!(d.subcategory, "Meetings");
        assert_eq!(d.payoree.as_deref(), Some("Starbucks Corp"));
        assert_eq!(d.source, DecisionSource::Keyword);
    }

    #[test]
    fn suggestions_are_none_without_data() {
        let catalog = RuleCatalog::default();
        let keywords = KeywordRuleRegistry::empty();
        let store = MemoryLearningStore::new();
        let resolver = CategorizationResolver::new(&catalog, &keywords, &store);
        assert!(resolver.suggest_subcategory("STARBUCKS").is_none());
        assert!(resolver.suggest_payoree("").is_none());
    }
}
