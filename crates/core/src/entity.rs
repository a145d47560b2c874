use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CategoryId(pub i64);

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PayoreeId(pub i64);

impl fmt::Display for PayoreeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A category row. Subcategories are categories with a parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub parent_id: Option<CategoryId>,
}

impl Category {
    pub fn new(id: i64, name: &str, parent_id: Option<i64>) -> Self {
        Category {
            id: CategoryId(id),
            name: name.to_string(),
            parent_id: parent_id.map(CategoryId),
        }
    }

    pub fn is_top_level(&self) -> bool {
        self.parent_id.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payoree {
    pub id: PayoreeId,
    pub name: String,
}

impl Payoree {
    pub fn new(id: i64, name: &str) -> Self {
        Payoree {
            id: PayoreeId(id),
            name: name.to_string(),
        }
    }
}

/// Lowercases and reduces a name to alphanumeric words joined by single
/// spaces, so "Joe's  Diner, Inc." and "joes diner inc" compare equal.
pub fn normalize_name(s: &str) -> String {
    s.to_lowercase()
        .replace(['\'', '\u{2019}'], "")
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolverError {
    #[error("Entity backend failure: {0}")]
    Backend(String),
}

/// Read access to the category and payoree tables.
pub trait EntityResolver {
    /// All categories whose name equals `name` exactly.
    fn categories_named(&self, name: &str) -> Result<Vec<Category>, ResolverError>;

    fn category(&self, id: CategoryId) -> Result<Option<Category>, ResolverError>;

    /// Payoree whose name equals `name` exactly.
    fn payoree_named(&self, name: &str) -> Result<Option<Payoree>, ResolverError>;

    /// All payorees whose `normalize_name` form equals `normalized`.
    fn payorees_normalized(&self, normalized: &str) -> Result<Vec<Payoree>, ResolverError>;
}

/// In-memory snapshot of the entity tables.
#[derive(Debug, Clone, Default)]
pub struct EntityIndex {
    categories: Vec<Category>,
    payorees: Vec<Payoree>,
}

impl EntityIndex {
    pub fn new(mut categories: Vec<Category>, mut payorees: Vec<Payoree>) -> Self {
        categories.sort_by_key(|c| c.id);
        payorees.sort_by_key(|p| p.id);
        EntityIndex {
            categories,
            payorees,
        }
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn payorees(&self) -> &[Payoree] {
        &self.payorees
    }
}

impl EntityResolver for EntityIndex {
    fn categories_named(&self, name: &str) -> Result<Vec<Category>, ResolverError> {
        Ok(self
            .categories
            .iter()
            .filter(|c| c.name == name)
            .cloned()
            .collect())
    }

    fn category(&self, id: CategoryId) -> Result<Option<Category>, ResolverError> {
        Ok(self.categories.iter().find(|c| c.id == id).cloned())
    }

    fn payoree_named(&self, name: &str) -> Result<Option<Payoree>, ResolverError> {
        Ok(self.payorees.iter().find(|p| p.name == name).cloned())
    }

    fn payorees_normalized(&self, normalized: &str) -> Result<Vec<Payoree>, ResolverError> {
        Ok(self
            .payorees
            .iter()
            .filter(|p| normalize_name(&p.name) == normalized)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_punctuation_and_case() {
        assert_eq!(normalize_name("Joe's  Diner, Inc."), "joes diner inc");
        assert_eq!(normalize_name("JOES DINER INC"), "joes diner inc");
        assert_eq!(normalize_name("  "), "");
    }

    #[test]
    fn index_finds_all_categories_with_name() {
        let index = EntityIndex::new(
            vec![
                Category::new(2, "Food", Some(1)),
                Category::new(1, "Food", None),
                Category::new(3, "Gas", Some(4)),
            ],
            vec![],
        );
        let found = index.categories_named("Food").unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].id, CategoryId(1));
    }

    #[test]
    fn index_normalized_payoree_match() {
        let index = EntityIndex::new(vec![], vec![Payoree::new(7, "Trader Joe's")]);
        assert!(index.payoree_named("trader joes").unwrap().is_none());
        let found = index.payorees_normalized(&normalize_name("TRADER JOES")).unwrap();
        assert_eq!(found, vec![Payoree::new(7, "Trader Joe's")]);
    }

    #[test]
    fn top_level_flag() {
        assert!(Category::new(1, "Food", None).is_top_level());
        assert!(!Category::new(2, "Groceries", Some(1)).is_top_level());
    }
}
