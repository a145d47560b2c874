use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::{bail, Context, Result};
use budgnudg_categorize::{
    safe_category_lookup, safe_payoree_lookup, Categorizer, ConfidenceReport, Decision,
    EntityAssignment, KeywordRuleRegistry, RuleCatalog, RuleTables,
};
use budgnudg_core::{
    CategorizationError, KeywordRule, LearningKind, LookupTarget, MemoryLearningStore, Money,
    Payoree,
};
use budgnudg_storage::{
    ConfirmOutcome, Confirmation, DbPool, ImportMode, LearnedPattern, NewTransaction,
    ReferenceImportCounts,
};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{error, info, warn};

pub struct AppState {
    pub db: DbPool,
    pub tables: RuleTables,
}

#[derive(Debug, Serialize)]
pub struct CategorizeOutput {
    pub decision: Decision,
    pub confidence: ConfidenceReport,
    pub transaction_id: Option<i64>,
    pub categorization_error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LookupOutput {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub error: Option<String>,
}

pub struct SaveOptions<'a> {
    pub date: NaiveDate,
    pub prefix: &'a str,
}

impl AppState {
    /// Builds a categorizer over a fresh snapshot of keyword rules and
    /// learned data. A corrupt learned table degrades to an empty store.
    async fn categorizer(&self) -> Result<Categorizer<MemoryLearningStore>> {
        let catalog = RuleCatalog::new(self.tables.clone()).context("building rule catalog")?;
        let rules = budgnudg_storage::get_keyword_rules(&self.db).await?;
        let keywords = KeywordRuleRegistry::new(rules);

        let learning = match budgnudg_storage::load_learning_store(&self.db).await {
            Ok(store) => store,
            Err(e) => {
                error!(
                    code = %e.categorization_error().code(),
                    "Ignoring learned data: {e}"
                );
                MemoryLearningStore::new()
            }
        };
        Ok(Categorizer::new(catalog, keywords, learning))
    }

    pub async fn categorize(
        &self,
        description: &str,
        amount: Money,
        save: Option<SaveOptions<'_>>,
    ) -> Result<CategorizeOutput> {
        let categorizer = self.categorizer().await?;
        let decision = categorizer.resolve(description, amount);
        let confidence = categorizer.assess(&decision);
        info!(
            source = ?decision.source,
            category = %decision.category,
            subcategory = %decision.subcategory,
            confidence = confidence.overall_confidence,
            "Categorized transaction"
        );

        let mut output = CategorizeOutput {
            decision,
            confidence,
            transaction_id: None,
            categorization_error: None,
        };

        if let Some(save) = save {
            let assignment = self.assign(&output.decision, save.prefix).await?;
            let tx = NewTransaction {
                date: save.date,
                description: description.to_string(),
                amount,
                category_id: assignment.category.as_ref().map(|c| c.id),
                subcategory_id: assignment.subcategory.as_ref().map(|c| c.id),
                payoree_id: assignment.payoree.as_ref().map(|p| p.id),
                categorization_error: assignment.error_code(),
            };
            output.transaction_id = Some(budgnudg_storage::insert_transaction(&self.db, &tx).await?);
            output.categorization_error = tx.categorization_error;
        }

        Ok(output)
    }

    /// Resolves decision names against the entity tables. A suggested payoree
    /// that does not exist yet is created rather than reported.
    async fn assign(&self, decision: &Decision, prefix: &str) -> Result<EntityAssignment> {
        if let Some(missing) = budgnudg_storage::check_reference_data(&self.db).await? {
            warn!(code = %missing.code(), "Reference data missing");
            return Ok(EntityAssignment {
                error: Some(missing),
                ..Default::default()
            });
        }

        let index = budgnudg_storage::load_entity_index(&self.db).await?;
        let mut assignment = EntityAssignment::from_decision(&index, prefix, decision);

        let suggested = decision.payoree.as_deref().map(str::trim).unwrap_or_default();
        let lookup_failed = CategorizationError::lookup_failed(prefix, LookupTarget::Payoree);
        if assignment.payoree.is_none()
            && !suggested.is_empty()
            && assignment.error != Some(CategorizationError::DatabaseError)
        {
            let (id, created) = budgnudg_storage::get_or_create_payoree(&self.db, suggested).await?;
            if created {
                info!(payoree = suggested, "Created payoree from suggestion");
            }
            assignment.payoree = Some(Payoree::new(id.0, suggested));
            if assignment.error.as_ref() == Some(&lookup_failed) {
                assignment.error = None;
            }
        }
        Ok(assignment)
    }

    pub async fn lookup_category(&self, name: &str, prefix: &str) -> Result<LookupOutput> {
        let index = budgnudg_storage::load_entity_index(&self.db).await?;
        Ok(match safe_category_lookup(&index, name, prefix) {
            Ok(c) => LookupOutput {
                id: Some(c.id.0),
                name: Some(c.name),
                error: None,
            },
            Err(e) => LookupOutput {
                id: None,
                name: None,
                error: Some(e.code()),
            },
        })
    }

    pub async fn lookup_payoree(&self, name: &str, prefix: &str) -> Result<LookupOutput> {
        let index = budgnudg_storage::load_entity_index(&self.db).await?;
        Ok(match safe_payoree_lookup(&index, name, prefix) {
            Ok(p) => LookupOutput {
                id: Some(p.id.0),
                name: Some(p.name),
                error: None,
            },
            Err(e) => LookupOutput {
                id: None,
                name: None,
                error: Some(e.code()),
            },
        })
    }

    pub async fn confirm(
        &self,
        transaction_id: i64,
        subcategory: Option<&str>,
        payoree: Option<&str>,
        confirmed_on: NaiveDate,
    ) -> Result<ConfirmOutcome> {
        let Some(tx) = budgnudg_storage::get_transaction(&self.db, transaction_id).await? else {
            bail!("transaction {transaction_id} not found");
        };
        let index = budgnudg_storage::load_entity_index(&self.db).await?;

        let (category_id, subcategory_id) = match subcategory {
            Some(name) => {
                let found = safe_category_lookup(&index, name, "USER")?;
                match found.parent_id {
                    Some(parent) => (Some(parent), Some(found.id)),
                    None => (Some(found.id), None),
                }
            }
            None => (tx.category_id, tx.subcategory_id),
        };
        let payoree_id = match payoree {
            Some(name) => Some(safe_payoree_lookup(&index, name, "USER")?.id),
            None => tx.payoree_id,
        };

        let catalog = RuleCatalog::new(self.tables.clone())?;
        let merchant_key = catalog.extractor().extract(&tx.description);

        let outcome = budgnudg_storage::confirm_transaction(
            &self.db,
            &Confirmation {
                transaction_id,
                category_id,
                subcategory_id,
                payoree_id,
                merchant_key,
                confirmed_on,
            },
        )
        .await?;
        Ok(outcome)
    }

    pub async fn error_breakdown(&self) -> Result<Vec<(String, i64)>> {
        Ok(budgnudg_storage::categorization_error_breakdown(&self.db).await?)
    }

    pub async fn patterns(&self, kind: LearningKind, limit: u32) -> Result<Vec<LearnedPattern>> {
        Ok(budgnudg_storage::top_learned_patterns(&self.db, kind, limit).await?)
    }

    pub async fn export_learning(&self, out: Option<&Path>) -> Result<()> {
        let json = budgnudg_storage::export_learning(&self.db).await?.to_json()?;
        match out {
            Some(path) => {
                let mut file = File::create(path)
                    .with_context(|| format!("creating {}", path.display()))?;
                file.write_all(json.as_bytes())?;
                println!("Wrote learning backup to {}", path.display());
            }
            None => println!("{json}"),
        }
        Ok(())
    }

    pub async fn import_learning(&self, path: &Path, mode: ImportMode) -> Result<()> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let summary = budgnudg_storage::import_learning(&self.db, &json, mode)
            .await
            .map_err(|e| {
                error!(code = %e.categorization_error().code(), "Learning import failed: {e}");
                e
            })?;
        println!(
            "Imported {} subcategory patterns, {} payoree patterns and {} keyword rules ({} skipped)",
            summary.subcats, summary.payorees, summary.keyword_rules, summary.skipped
        );
        Ok(())
    }

    pub async fn import_categories(&self, path: &Path) -> Result<ReferenceImportCounts> {
        let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        Ok(budgnudg_storage::import_categories_csv(&self.db, file).await?)
    }

    pub async fn import_payorees(&self, path: &Path) -> Result<ReferenceImportCounts> {
        let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        Ok(budgnudg_storage::import_payorees_csv(&self.db, file).await?)
    }

    pub async fn add_keyword_rule(&self, rule: KeywordRule) -> Result<i64> {
        if rule.keyword.trim().is_empty() {
            bail!("keyword must not be blank");
        }
        let existing = budgnudg_storage::get_keyword_rules(&self.db).await?;
        if existing
            .iter()
            .any(|r| r.is_active && r.keyword.eq_ignore_ascii_case(rule.keyword.trim()))
        {
            bail!("an active rule for keyword '{}' already exists", rule.keyword.trim());
        }
        let rule = KeywordRule {
            keyword: rule.keyword.trim().to_string(),
            ..rule
        };
        Ok(budgnudg_storage::save_keyword_rule(&self.db, &rule).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn state() -> (tempfile::TempDir, AppState) {
        let dir = tempfile::tempdir().unwrap();
        let db = budgnudg_storage::create_db(&dir.path().join("app.db")).await.unwrap();
        let csv = "Category,SubCategory\nFood & Dining,Coffee/Tea\nWork,Client Meals\n";
        budgnudg_storage::import_categories_csv(&db, csv.as_bytes()).await.unwrap();
        budgnudg_storage::import_payorees_csv(&db, "Name\nStarbucks\n".as_bytes())
            .await
            .unwrap();
        (
            dir,
            AppState {
                db,
                tables: RuleTables::default(),
            },
        )
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 8, 1).unwrap()
    }

    #[tokio::test]
    async fn save_then_confirm_feeds_learning() {
        let (_dir, app) = state().await;
        let save = SaveOptions { date: day(), prefix: "AI" };
        let out = app
            .categorize("STARBUCKS #1234 CHICAGO", Money::from_cents(-575), Some(save))
            .await
            .unwrap();
        assert_eq!(out.decision.subcategory, "Coffee/Tea");
        assert_eq!(out.confidence.overall_confidence, 55.0);
        // No payoree suggestion yet.
        assert_eq!(out.categorization_error.as_deref(), Some("AI_NO_PAYOREE_SUGGESTION"));
        let id = out.transaction_id.unwrap();

        for _ in 0..3 {
            app.confirm(id, Some("Client Meals"), Some("Starbucks"), day())
                .await
                .unwrap();
        }

        let out = app
            .categorize("STARBUCKS #99 EVANSTON", Money::from_cents(-610), None)
            .await
            .unwrap();
        assert_eq!(out.decision.category, "Work");
        assert_eq!(out.decision.payoree.as_deref(), Some("Starbucks"));
        assert_eq!(out.confidence.learning_count, 3);
        assert_eq!(out.confidence.overall_confidence, 70.0);
    }

    #[tokio::test]
    async fn keyword_rule_overrides() {
        let (_dir, app) = state().await;
        app.add_keyword_rule(KeywordRule::new("starbucks", "Work", 100).with_subcategory("Client Meals"))
            .await
            .unwrap();
        assert!(app
            .add_keyword_rule(KeywordRule::new("STARBUCKS", "Other", 1))
            .await
            .is_err());

        let out = app
            .categorize("STARBUCKS 1234", Money::from_cents(-500), None)
            .await
            .unwrap();
        assert_eq!(out.decision.subcategory, "Client Meals");
        assert_eq!(out.confidence.overall_confidence, 100.0);
    }

    #[tokio::test]
    async fn missing_reference_data_is_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let db = budgnudg_storage::create_db(&dir.path().join("empty.db")).await.unwrap();
        let app = AppState {
            db,
            tables: RuleTables::default(),
        };
        let save = SaveOptions { date: day(), prefix: "AI" };
        let out = app
            .categorize("SHELL OIL 5512", Money::from_cents(-4000), Some(save))
            .await
            .unwrap();
        assert_eq!(out.categorization_error.as_deref(), Some("CATEGORIES_NOT_IMPORTED"));
        assert_eq!(
            app.error_breakdown().await.unwrap(),
            vec![("CATEGORIES_NOT_IMPORTED".to_string(), 1)]
        );
    }

    #[tokio::test]
    async fn lookup_reports_codes() {
        let (_dir, app) = state().await;
        let hit = app.lookup_category("Coffee/Tea", "X").await.unwrap();
        assert_eq!(hit.name.as_deref(), Some("Coffee/Tea"));
        let miss = app.lookup_payoree("Nobody", "X").await.unwrap();
        assert_eq!(miss.error.as_deref(), Some("X_PAYOREE_LOOKUP_FAILED"));
    }
}
