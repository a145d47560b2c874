use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ConfigError;
use crate::tables::{MerchantCategory, RuleTables, StandardizationRule, TermTable};

/// User rule tables read from TOML.
///
/// ```toml
/// replace_defaults = false
///
/// [[standardization]]
/// pattern = "BLUE\\s*BOTTLE"
/// priority = 10
/// standardize = { literal = "Blue Bottle Coffee" }
///
/// [[merchant_category]]
/// merchant = "Blue Bottle Coffee"
/// category = "Food & Dining"
/// subcategory = "Coffee/Tea"
/// reason = "Blue Bottle identified as coffee roaster"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorizerConfig {
    #[serde(default)]
    pub replace_defaults: bool,
    #[serde(default)]
    pub standardization: Vec<StandardizationRule>,
    #[serde(default)]
    pub merchant_category: Vec<MerchantCategory>,
    #[serde(default)]
    pub term_table: Vec<TermTable>,
}

impl CategorizerConfig {
    pub fn from_toml(toml_content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_content)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&content)?;
        info!(
            path = %path.display(),
            standardization = config.standardization.len(),
            merchants = config.merchant_category.len(),
            term_tables = config.term_table.len(),
            "Loaded categorizer config"
        );
        Ok(config)
    }
}

impl RuleTables {
    /// Config entries go ahead of the built-in ones so they win ties; with
    /// `replace_defaults` the built-ins are dropped entirely.
    pub fn from_config(config: CategorizerConfig) -> Self {
        if config.replace_defaults {
            return RuleTables {
                standardization: config.standardization,
                merchant_categories: config.merchant_category,
                term_tables: config.term_table,
            };
        }
        let defaults = RuleTables::default();
        RuleTables {
            standardization: prepend(config.standardization, defaults.standardization),
            merchant_categories: prepend(config.merchant_category, defaults.merchant_categories),
            term_tables: prepend(config.term_table, defaults.term_tables),
        }
    }
}

fn prepend<T>(mut first: Vec<T>, rest: Vec<T>) -> Vec<T> {
    first.extend(rest);
    first
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::RuleCatalog;
    use crate::tables::Standardize;
    use budgnudg_core::Money;

    const SAMPLE: &str = r#"
[[standardization]]
pattern = "BLUE\\s*BOTTLE"
standardize = { literal = "Blue Bottle Coffee" }

[[standardization]]
pattern = "^PP\\s*\\*\\s*(.+)$"
priority = 5
standardize = "title_case"

[[merchant_category]]
merchant = "Blue Bottle Coffee"
category = "Food & Dining"
subcategory = "Coffee/Tea"
reason = "Blue Bottle identified as coffee roaster"

[[term_table]]
domain = "pets"

[[term_table.rules]]
terms = ["PETSMART", "CHEWY"]
category = "Pets"
subcategory = "Pet Supplies"
reason = "Pet store"
"#;

    #[test]
    fn parses_all_sections() {
        let config = CategorizerConfig::from_toml(SAMPLE).unwrap();
        assert!(!config.replace_defaults);
        assert_eq!(config.standardization.len(), 2);
        assert_eq!(config.standardization[1].priority, 5);
        assert_eq!(config.standardization[1].standardize, Standardize::TitleCase);
        assert_eq!(config.merchant_category[0].merchant, "Blue Bottle Coffee");
        assert_eq!(config.term_table[0].rules[0].terms, vec!["PETSMART", "CHEWY"]);
    }

    #[test]
    fn empty_config_is_valid() {
        let config = CategorizerConfig::from_toml("").unwrap();
        assert_eq!(config, CategorizerConfig::default());
        assert_eq!(RuleTables::from_config(config), RuleTables::default());
    }

    #[test]
    fn config_extends_defaults() {
        let config = CategorizerConfig::from_toml(SAMPLE).unwrap();
        let catalog = RuleCatalog::new(RuleTables::from_config(config)).unwrap();
        let money = Money::from_cents(-650);

        assert_eq!(
            catalog.categorize("BLUE BOTTLE COFFEE OAKLAND", money),
            ("Food & Dining".to_string(), "Coffee/Tea".to_string())
        );
        assert_eq!(catalog.categorize("CHEWY.COM", money).0, "Pets");
        // Built-ins are still there.
        assert_eq!(catalog.categorize("SHELL OIL 5512", money).1, "Gas");
    }

    #[test]
    fn replace_defaults_drops_builtins() {
        let toml = format!("replace_defaults = true\n{SAMPLE}");
        let config = CategorizerConfig::from_toml(&toml).unwrap();
        let tables = RuleTables::from_config(config);
        assert_eq!(tables.standardization.len(), 2);
        let catalog = RuleCatalog::new(tables).unwrap();
        assert_eq!(
            catalog.categorize("SHELL OIL 5512", Money::from_cents(-4000)).0,
            "Miscellaneous"
        );
    }

    #[test]
    fn bad_toml_is_an_error() {
        assert!(matches!(
            CategorizerConfig::from_toml("replace_defaults = 3"),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.toml");
        std::fs::write(&path, SAMPLE).unwrap();
        let config = CategorizerConfig::load(&path).unwrap();
        assert_eq!(config.merchant_category.len(), 1);
    }
}
