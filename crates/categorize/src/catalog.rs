use std::collections::HashMap;

use budgnudg_core::Money;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;
use crate::merchant::MerchantExtractor;
use crate::util::fold_accents;
use crate::tables::{AmountFilter, MerchantCategory, RuleTables, TermRule, TermTable};

pub const DEFAULT_CATEGORY: &str = "Miscellaneous";
pub const NO_DESCRIPTION: &str = "No description provided";

/// A catalog answer: names only, never entity ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub category: String,
    pub subcategory: String,
    pub reasoning: String,
}

impl Suggestion {
    fn new(category: &str, subcategory: &str, reasoning: String) -> Self {
        Suggestion {
            category: category.to_string(),
            subcategory: subcategory.to_string(),
            reasoning,
        }
    }

    pub fn into_pair(self) -> (String, String) {
        (self.category, self.subcategory)
    }
}

/// Static merchant and keyword tables giving a default categorization.
pub struct RuleCatalog {
    extractor: MerchantExtractor,
    merchants: HashMap<String, MerchantCategory>,
    term_tables: Vec<TermTable>,
}

impl RuleCatalog {
    pub fn new(tables: RuleTables) -> Result<Self, ConfigError> {
        let extractor = MerchantExtractor::new(tables.standardization)?;
        Ok(Self::assemble(
            extractor,
            tables.merchant_categories,
            tables.term_tables,
        ))
    }

    fn assemble(
        extractor: MerchantExtractor,
        merchant_categories: Vec<MerchantCategory>,
        term_tables: Vec<TermTable>,
    ) -> Self {
        let mut merchants = HashMap::new();
        for entry in merchant_categories {
            // Earlier entries win, so config overrides listed first shadow defaults.
            merchants
                .entry(entry.merchant.to_lowercase())
                .or_insert(entry);
        }
        let term_tables = term_tables
            .into_iter()
            .map(|mut table| {
                for rule in &mut table.rules {
                    rule.terms = rule
                        .terms
                        .iter()
                        .map(|t| t.trim().to_uppercase())
                        .filter(|t| !t.is_empty())
                        .collect();
                }
                table
            })
            .collect();
        Self {
            extractor,
            merchants,
            term_tables,
        }
    }

    pub fn extractor(&self) -> &MerchantExtractor {
        &self.extractor
    }

    pub fn merchant_category(&self, merchant_key: &str) -> Option<&MerchantCategory> {
        self.merchants.get(&merchant_key.to_lowercase())
    }

    pub fn categorize(&self, description: &str, amount: Money) -> (String, String) {
        self.categorize_with_reasoning(description, amount).into_pair()
    }

    pub fn categorize_with_reasoning(&self, description: &str, amount: Money) -> Suggestion {
        if description.trim().is_empty() {
            return Suggestion::new(DEFAULT_CATEGORY, "", NO_DESCRIPTION.to_string());
        }

        let key = self.extractor.extract(description);
        if let Some(entry) = self.merchant_category(&key) {
            debug!(merchant = %key, category = %entry.category, "Catalog merchant match");
            return Suggestion::new(&entry.category, &entry.subcategory, entry.reason.clone());
        }

        let haystack = format!(
            "{} {}",
            fold_accents(description).to_uppercase(),
            key.to_uppercase()
        );
        for table in &self.term_tables {
            for rule in &table.rules {
                if !amount_applies(rule.amount, amount) {
                    continue;
                }
                if let Some(term) = first_term(rule, &haystack) {
                    debug!(domain = %table.domain, term, "Catalog term match");
                    return Suggestion::new(
                        &rule.category,
                        &rule.subcategory,
                        format!("{} (matched '{}')", rule.reason, term),
                    );
                }
            }
        }

        Suggestion::new(
            DEFAULT_CATEGORY,
            "",
            format!("No rule matched merchant '{key}'"),
        )
    }
}

impl Default for RuleCatalog {
    fn default() -> Self {
        let tables = RuleTables::default();
        Self::assemble(
            MerchantExtractor::default(),
            tables.merchant_categories,
            tables.term_tables,
        )
    }
}

fn amount_applies(filter: AmountFilter, amount: Money) -> bool {
    match filter {
        AmountFilter::Any => true,
        AmountFilter::Positive => amount.is_positive(),
        AmountFilter::Negative => amount.is_negative(),
    }
}

fn first_term<'r>(rule: &'r TermRule, haystack: &str) -> Option<&'r str> {
    rule.terms
        .iter()
        .find(|term| contains_at_word_start(haystack, term))
        .map(String::as_str)
}

/// Substring match anchored at the start of a word, so "ATM" does not fire
/// inside "TREATMENT" while "TOLL" still finds "TOLLWAY".
fn contains_at_word_start(haystack: &str, term: &str) -> bool {
    haystack.match_indices(term).any(|(idx, _)| {
        haystack[..idx]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dollars(s: &str) -> Money {
        s.parse().unwrap()
    }

    #[test]
    fn empty_description_is_miscellaneous() {
        let catalog = RuleCatalog::default();
        let s = catalog.categorize_with_reasoning("", Money::zero());
        assert_eq!(s.category, "Miscellaneous");
        assert_eq!(s.subcategory, "");
        assert_eq!(s.reasoning, "No description provided");
        assert_eq!(
            catalog.categorize("  ", Money::zero()),
            ("Miscellaneous".to_string(), String::new())
        );
    }

    #[test]
    fn gas_station_by_merchant() {
        let catalog = RuleCatalog::default();
        assert_eq!(
            catalog.categorize("BP#12345 SKOKIE IL", dollars("45.50")),
            ("Transportation".to_string(), "Gas".to_string())
        );
    }

    #[test]
    fn starbucks_reasoning_names_merchant() {
        let catalog = RuleCatalog::default();
        let s = catalog.categorize_with_reasoning("STARBUCKS #1234 CHICAGO", dollars("-5.75"));
        assert_eq!(s.category, "Food & Dining");
        assert_eq!(s.subcategory, "Coffee/Tea");
        assert!(s.reasoning.contains("Starbucks"));
    }

    #[test]
    fn income_terms_need_positive_amount() {
        let catalog = RuleCatalog::default();
        let credit = catalog.categorize_with_reasoning("ACME CORP DIRECT DEP", dollars("2500.00"));
        assert_eq!(credit.category, "Income");
        assert_eq!(credit.subcategory, "Salary");
        assert!(credit.reasoning.contains("DIRECT DEP"));

        let debit = catalog.categorize("ACME CORP DIRECT DEP", dollars("-2500.00"));
        assert_ne!(debit.0, "Income");
    }

    #[test]
    fn term_tables_apply_in_domain_order() {
        let catalog = RuleCatalog::default();
        // "ATM" sits in the cash table, ahead of dining's "CAFE".
        assert_eq!(
            catalog.categorize("ATM WITHDRAWAL CAFE PLAZA", dollars("-40")).0,
            "Cash & ATM"
        );
        assert_eq!(
            catalog.categorize("LULA CAFE LOGAN SQ", dollars("-32.10")),
            ("Food & Dining".to_string(), "Coffee/Tea".to_string())
        );
    }

    #[test]
    fn terms_only_match_at_word_start() {
        let catalog = RuleCatalog::default();
        let s = catalog.categorize_with_reasoning("ACME WATER TREATMENT SVC", dollars("-80"));
        assert_ne!(s.category, "Cash & ATM");
    }

    #[test]
    fn accented_description_matches_plain_terms() {
        let catalog = RuleCatalog::default();
        let (category, subcategory) = catalog.categorize("Café ☕ ß 12345678901", dollars("-4.50"));
        assert_eq!(category, "Food & Dining");
        assert_eq!(subcategory, "Coffee/Tea");
    }

    #[test]
    fn unknown_merchant_falls_back() {
        let catalog = RuleCatalog::default();
        let s = catalog.categorize_with_reasoning("ZQXV HOLDINGS", dollars("-12"));
        assert_eq!(s.category, "Miscellaneous");
        assert_eq!(s.subcategory, "");
        assert!(s.reasoning.contains("ZQXV HOLDINGS"));
    }

    #[test]
    fn earlier_merchant_entry_shadows_later() {
        let mut tables = RuleTables::default();
        tables.merchant_categories.insert(
            0,
            MerchantCategory {
                merchant: "STARBUCKS".to_string(),
                category: "Work".to_string(),
                subcategory: "Client Meals".to_string(),
                reason: "Starbucks billed to clients".to_string(),
            },
        );
        let catalog = RuleCatalog::new(tables).unwrap();
        assert_eq!(
            catalog.categorize("STARBUCKS 0042", dollars("-6")),
            ("Work".to_string(), "Client Meals".to_string())
        );
    }
}
