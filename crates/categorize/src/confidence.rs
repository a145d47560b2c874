use std::fmt;

use budgnudg_core::{rank_associations, LearnedAssociation, LearningKind, LearningStore};
use serde::{Deserialize, Serialize};

use crate::merchant::MerchantExtractor;

pub const RULE_BASED_CONFIDENCE: f64 = 55.0;
pub const KEYWORD_CONFIDENCE: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConfidenceSource {
    RuleBased,
    Learned,
    Keyword,
}

impl fmt::Display for ConfidenceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfidenceSource::RuleBased => write!(f, "rule-based"),
            ConfidenceSource::Learned => write!(f, "learned"),
            ConfidenceSource::Keyword => write!(f, "keyword"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceReport {
    pub overall_confidence: f64,
    pub source: ConfidenceSource,
    pub learning_count: u32,
    pub subcategory_confidence: f64,
}

impl ConfidenceReport {
    pub fn rule_based_default() -> Self {
        ConfidenceReport {
            overall_confidence: RULE_BASED_CONFIDENCE,
            source: ConfidenceSource::RuleBased,
            learning_count: 0,
            subcategory_confidence: RULE_BASED_CONFIDENCE,
        }
    }

    /// Keyword rules are user mandates, reported at full confidence.
    pub fn keyword() -> Self {
        ConfidenceReport {
            overall_confidence: KEYWORD_CONFIDENCE,
            source: ConfidenceSource::Keyword,
            learning_count: 0,
            subcategory_confidence: KEYWORD_CONFIDENCE,
        }
    }

    pub fn learned(count: u32) -> Self {
        if count == 0 {
            return Self::rule_based_default();
        }
        let (floor, subcategory) = band_for(count);
        ConfidenceReport {
            overall_confidence: (floor + subcategory) / 2.0,
            source: ConfidenceSource::Learned,
            learning_count: count,
            subcategory_confidence: subcategory,
        }
    }
}

/// `(band_floor, subcategory_confidence)` for a confirmation count.
pub fn band_for(count: u32) -> (f64, f64) {
    match count {
        0 => (RULE_BASED_CONFIDENCE, RULE_BASED_CONFIDENCE),
        1 => (50.0, 55.0),
        2..=4 => (65.0, 75.0),
        5..=9 => (75.0, 85.0),
        _ => (85.0, 95.0),
    }
}

pub struct ConfidenceEstimator<'a> {
    extractor: &'a MerchantExtractor,
    learning: &'a dyn LearningStore,
}

impl<'a> ConfidenceEstimator<'a> {
    pub fn new(extractor: &'a MerchantExtractor, learning: &'a dyn LearningStore) -> Self {
        Self {
            extractor,
            learning,
        }
    }

    /// How strongly past confirmations back `suggested_subcategory` for this
    /// description. Never fails; falls back to the rule-based default.
    pub fn calculate(
        &self,
        description: &str,
        suggested_category: &str,
        suggested_subcategory: &str,
    ) -> ConfidenceReport {
        let key = self.extractor.extract(description);
        self.calculate_for_key(&key, suggested_category, suggested_subcategory)
    }

    /// Same as [`calculate`](Self::calculate) for an already extracted key.
    pub fn calculate_for_key(
        &self,
        key: &str,
        suggested_category: &str,
        suggested_subcategory: &str,
    ) -> ConfidenceReport {
        if key.is_empty() || suggested_subcategory.trim().is_empty() {
            return ConfidenceReport::rule_based_default();
        }

        let mut matching: Vec<LearnedAssociation> = self
            .learning
            .associations(LearningKind::Subcategory, key)
            .into_iter()
            .filter(|a| a.confirmation_count > 0 && a.target.name == suggested_subcategory)
            .collect();
        // Same-named subcategories can live under different parents; prefer
        // the one under the suggested category.
        matching.sort_by(|a, b| {
            let a_parent = a.target.parent.as_deref() == Some(suggested_category);
            let b_parent = b.target.parent.as_deref() == Some(suggested_category);
            b_parent.cmp(&a_parent).then_with(|| rank_associations(a, b))
        });

        match matching.first() {
            Some(association) => ConfidenceReport::learned(association.confirmation_count),
            None => ConfidenceReport::rule_based_default(),
        }
    }
}
