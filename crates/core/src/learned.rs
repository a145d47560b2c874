use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

/// The two parallel learned relations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LearningKind {
    Subcategory,
    Payoree,
}

impl fmt::Display for LearningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LearningKind::Subcategory => write!(f, "subcategory"),
            LearningKind::Payoree => write!(f, "payoree"),
        }
    }
}

/// The entity a merchant key has been confirmed against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearningTarget {
    pub id: i64,
    pub name: String,
    /// Parent category name; only meaningful for subcategory targets.
    pub parent: Option<String>,
}

impl LearningTarget {
    pub fn new(id: i64, name: &str, parent: Option<&str>) -> Self {
        LearningTarget {
            id,
            name: name.to_string(),
            parent: parent.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearnedAssociation {
    pub merchant_key: String,
    pub target: LearningTarget,
    pub confirmation_count: u32,
    pub last_confirmed: NaiveDate,
}

/// Ranks associations for the same key: higher count first, then the most
/// recent confirmation, then the lowest target id.
pub fn rank_associations(a: &LearnedAssociation, b: &LearnedAssociation) -> Ordering {
    b.confirmation_count
        .cmp(&a.confirmation_count)
        .then_with(|| b.last_confirmed.cmp(&a.last_confirmed))
        .then_with(|| a.target.id.cmp(&b.target.id))
}

pub trait LearningStore {
    /// Every association recorded for `merchant_key` in the given relation.
    fn associations(&self, kind: LearningKind, merchant_key: &str) -> Vec<LearnedAssociation>;

    /// The strongest association for `merchant_key`, if any.
    fn top_association(&self, kind: LearningKind, merchant_key: &str) -> Option<LearnedAssociation> {
        self.associations(kind, merchant_key)
            .into_iter()
            .filter(|a| a.confirmation_count > 0)
            .min_by(rank_associations)
    }
}

impl<T: LearningStore + ?Sized> LearningStore for &T {
    fn associations(&self, kind: LearningKind, merchant_key: &str) -> Vec<LearnedAssociation> {
        (**self).associations(kind, merchant_key)
    }
}

/// Learned associations held in memory, keyed by relation and merchant key.
#[derive(Debug, Clone, Default)]
pub struct MemoryLearningStore {
    entries: HashMap<(LearningKind, String), Vec<LearnedAssociation>>,
}

impl MemoryLearningStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a stored row as-is, replacing any row for the same target.
    pub fn insert(&mut self, kind: LearningKind, association: LearnedAssociation) {
        let rows = self
            .entries
            .entry((kind, association.merchant_key.clone()))
            .or_default();
        rows.retain(|r| r.target.id != association.target.id);
        rows.push(association);
    }

    /// Reinforces `merchant_key -> target`, creating the row on first use.
    /// Returns the new count; a blank key is ignored and yields 0.
    pub fn record_confirmation(
        &mut self,
        kind: LearningKind,
        merchant_key: &str,
        target: LearningTarget,
        confirmed_on: NaiveDate,
    ) -> u32 {
        if merchant_key.trim().is_empty() {
            return 0;
        }
        let rows = self
            .entries
            .entry((kind, merchant_key.to_string()))
            .or_default();
        match rows.iter_mut().find(|r| r.target.id == target.id) {
            Some(row) => {
                row.confirmation_count = row.confirmation_count.saturating_add(1);
                row.last_confirmed = row.last_confirmed.max(confirmed_on);
                row.target = target;
                row.confirmation_count
            }
            None => {
                rows.push(LearnedAssociation {
                    merchant_key: merchant_key.to_string(),
                    target,
                    confirmation_count: 1,
                    last_confirmed: confirmed_on,
                });
                1
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (LearningKind, &LearnedAssociation)> {
        self.entries
            .iter()
            .flat_map(|((kind, _), rows)| rows.iter().map(move |r| (*kind, r)))
    }
}

impl LearningStore for MemoryLearningStore {
    fn associations(&self, kind: LearningKind, merchant_key: &str) -> Vec<LearnedAssociation> {
        self.entries
            .get(&(kind, merchant_key.to_string()))
            .cloned()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn coffee() -> LearningTarget {
        LearningTarget::new(10, "Coffee/Tea", Some("Food & Dining"))
    }

    #[test]
    fn first_confirmation_creates_row() {
        let mut store = MemoryLearningStore::new();
        let n = store.record_confirmation(LearningKind::Subcategory, "Starbucks", coffee(), date(1));
        assert_eq!(n, 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn repeated_confirmation_increments() {
        let mut store = MemoryLearningStore::new();
        for d in 1..=3 {
            store.record_confirmation(LearningKind::Subcategory, "Starbucks", coffee(), date(d));
        }
        let top = store
            .top_association(LearningKind::Subcategory, "Starbucks")
            .unwrap();
        assert_eq!(top.confirmation_count, 3);
        assert_eq!(top.last_confirmed, date(3));
    }

    #[test]
    fn blank_key_is_ignored() {
        let mut store = MemoryLearningStore::new();
        assert_eq!(
            store.record_confirmation(LearningKind::Payoree, "  ", coffee(), date(1)),
            0
        );
        assert!(store.is_empty());
    }

    #[test]
    fn relations_are_independent() {
        let mut store = MemoryLearningStore::new();
        store.record_confirmation(LearningKind::Payoree, "Starbucks", LearningTarget::new(3, "Starbucks", None), date(1));
        assert!(store
            .top_association(LearningKind::Subcategory, "Starbucks")
            .is_none());
        assert!(store.top_association(LearningKind::Payoree, "Starbucks").is_some());
    }

    #[test]
    fn highest_count_wins() {
        let mut store = MemoryLearningStore::new();
        let dining = LearningTarget::new(11, "Restaurants", Some("Food & Dining"));
        store.record_confirmation(LearningKind::Subcategory, "K", coffee(), date(1));
        store.record_confirmation(LearningKind::Subcategory, "K", dining.clone(), date(2));
        store.record_confirmation(LearningKind::Subcategory, "K", dining, date(3));
        let top = store.top_association(LearningKind::Subcategory, "K").unwrap();
        assert_eq!(top.target.name, "Restaurants");
    }

    #[test]
    fn equal_counts_prefer_most_recent() {
        let mut store = MemoryLearningStore::new();
        let dining = LearningTarget::new(11, "Restaurants", Some("Food & Dining"));
        store.record_confirmation(LearningKind::Subcategory, "K", dining, date(1));
        store.record_confirmation(LearningKind::Subcategory, "K", coffee(), date(9));
        let top = store.top_association(LearningKind::Subcategory, "K").unwrap();
        assert_eq!(top.target.name, "Coffee/Tea");
    }

    #[test]
    fn full_tie_prefers_lowest_target_id() {
        let mut store = MemoryLearningStore::new();
        let dining = LearningTarget::new(11, "Restaurants", Some("Food & Dining"));
        store.record_confirmation(LearningKind::Subcategory, "K", dining, date(5));
        store.record_confirmation(LearningKind::Subcategory, "K", coffee(), date(5));
        let top = store.top_association(LearningKind::Subcategory, "K").unwrap();
        assert_eq!(top.target.id, 10);
    }
}
