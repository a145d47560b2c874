pub mod catalog;
pub mod confidence;
pub mod config;
pub mod error;
pub mod keyword_rules;
pub mod lookup;
pub mod merchant;
pub mod resolver;
pub mod tables;
pub(crate) mod util;

pub use catalog::{RuleCatalog, Suggestion};
pub use confidence::{band_for, ConfidenceEstimator, ConfidenceReport, ConfidenceSource};
pub use config::CategorizerConfig;
pub use error::ConfigError;
pub use keyword_rules::{KeywordMatch, KeywordRuleRegistry};
pub use lookup::{assign_entities, safe_category_lookup, safe_payoree_lookup, EntityAssignment};
pub use merchant::MerchantExtractor;
pub use resolver::{CategorizationResolver, Decision, DecisionSource};
pub use tables::{
    AmountFilter, MerchantCategory, RuleTables, StandardizationRule, Standardize, TermRule,
    TermTable,
};

use budgnudg_core::{LearningKind, LearningStore, MemoryLearningStore, Money};

/// Everything needed to categorize a batch: the static catalog, a keyword
/// rule snapshot and a learning store.
pub struct Categorizer<L = MemoryLearningStore> {
    catalog: RuleCatalog,
    keywords: KeywordRuleRegistry,
    learning: L,
}

impl<L: LearningStore> Categorizer<L> {
    pub fn new(catalog: RuleCatalog, keywords: KeywordRuleRegistry, learning: L) -> Self {
        Self {
            catalog,
            keywords,
            learning,
        }
    }

    /// Built-in tables, no keyword rules.
    pub fn with_learning(learning: L) -> Self {
        Self::new(RuleCatalog::default(), KeywordRuleRegistry::empty(), learning)
    }

    pub fn catalog(&self) -> &RuleCatalog {
        &self.catalog
    }

    pub fn keywords(&self) -> &KeywordRuleRegistry {
        &self.keywords
    }

    pub fn learning(&self) -> &L {
        &self.learning
    }

    pub fn learning_mut(&mut self) -> &mut L {
        &mut self.learning
    }

    pub fn resolver(&self) -> CategorizationResolver<'_> {
        CategorizationResolver::new(&self.catalog, &self.keywords, &self.learning)
    }

    pub fn estimator(&self) -> ConfidenceEstimator<'_> {
        ConfidenceEstimator::new(self.catalog.extractor(), &self.learning)
    }

    pub fn extract_merchant(&self, description: &str) -> String {
        self.catalog.extractor().extract(description)
    }

    pub fn resolve(&self, description: &str, amount: Money) -> Decision {
        self.resolver().resolve(description, amount)
    }

    pub fn categorize_transaction(&self, description: &str, amount: Money) -> (String, String) {
        let decision = self.resolve(description, amount);
        (decision.category, decision.subcategory)
    }

    /// `(category, subcategory, reasoning)`.
    pub fn categorize_transaction_with_reasoning(
        &self,
        description: &str,
        amount: Money,
    ) -> (String, String, String) {
        self.resolve(description, amount).as_tuple()
    }

    pub fn suggest_subcategory(&self, description: &str) -> Option<String> {
        self.resolver().suggest_subcategory(description)
    }

    pub fn suggest_payoree(&self, description: &str) -> Option<String> {
        self.resolver().suggest_payoree(description)
    }

    pub fn calculate_suggestion_confidence(
        &self,
        description: &str,
        category: &str,
        subcategory: &str,
    ) -> ConfidenceReport {
        self.estimator().calculate(description, category, subcategory)
    }

    /// Confidence for a decision this categorizer produced.
    pub fn assess(&self, decision: &Decision) -> ConfidenceReport {
        match decision.source {
            DecisionSource::Keyword => ConfidenceReport::keyword(),
            DecisionSource::Empty => ConfidenceReport::rule_based_default(),
            // Scored on the association the resolver used, which may be a
            // top-level category with no subcategory name.
            DecisionSource::Learned => self
                .learning
                .top_association(LearningKind::Subcategory, &decision.merchant_key)
                .filter(|a| a.confirmation_count > 0)
                .map(|a| ConfidenceReport::learned(a.confirmation_count))
                .unwrap_or_else(ConfidenceReport::rule_based_default),
            DecisionSource::RuleBased => {
                self.estimator().calculate_for_key(
                    &decision.merchant_key,
                    &decision.category,
                    &decision.subcategory,
                )
            }
        }
    }

    pub fn check_keyword_rules(&self, description: &str) -> Option<KeywordMatch> {
        self.keywords.check(description)
    }
}

impl Default for Categorizer<MemoryLearningStore> {
    fn default() -> Self {
        Self::with_learning(MemoryLearningStore::new())
    }
}
