use serde::{Deserialize, Serialize};

fn default_priority() -> i32 {
    100
}

fn default_active() -> bool {
    true
}

/// A user-authored override: any description containing `keyword`
/// (case-insensitive) is assigned the rule's category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordRule {
    #[serde(default)]
    pub id: Option<i64>,
    pub keyword: String,
    pub category: String,
    #[serde(default)]
    pub subcategory: Option<String>,
    #[serde(default)]
    pub payoree: Option<String>,
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

impl KeywordRule {
    pub fn new(keyword: &str, category: &str, priority: i32) -> Self {
        KeywordRule {
            id: None,
            keyword: keyword.to_string(),
            category: category.to_string(),
            subcategory: None,
            payoree: None,
            priority,
            is_active: true,
        }
    }

    pub fn with_subcategory(mut self, subcategory: &str) -> Self {
        self.subcategory = Some(subcategory.to_string());
        self
    }

    pub fn with_payoree(mut self, payoree: &str) -> Self {
        self.payoree = Some(payoree.to_string());
        self
    }
}
