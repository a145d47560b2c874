//! JSON backup of everything the system has learned: both learned relations
//! and the active keyword rules.

use budgnudg_core::KeywordRule;
use chrono::{NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::SqliteConnection;
use tracing::{info, warn};

use crate::db::{find_category, get_keyword_rules, get_or_create_payoree, save_keyword_rule, DbPool};
use crate::error::StorageError;
use crate::learning::{clear_learning, MAX_CONFIRMATIONS};

pub const BACKUP_VERSION: &str = "1.0";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearnedSubcatEntry {
    pub key: String,
    pub subcategory: String,
    /// Parent category; `None` when the target is itself top-level.
    pub category: Option<String>,
    pub count: u32,
    pub last_seen: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearnedPayoreeEntry {
    pub key: String,
    pub payoree: String,
    pub count: u32,
    pub last_seen: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningBackup {
    pub version: String,
    pub export_date: String,
    pub learned_subcats: Vec<LearnedSubcatEntry>,
    pub learned_payorees: Vec<LearnedPayoreeEntry>,
    pub keyword_rules: Vec<KeywordRule>,
}

impl LearningBackup {
    pub fn to_json(&self) -> Result<String, StorageError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Backup shape checked only at the top level, so one bad entry does not
/// sink the whole import.
#[derive(Deserialize)]
struct RawBackup {
    learned_subcats: Vec<Value>,
    learned_payorees: Vec<Value>,
    keyword_rules: Vec<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportMode {
    /// Add counts onto existing rows.
    Merge,
    /// Clear learned rows and keyword rules first.
    Replace,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub subcats: usize,
    pub payorees: usize,
    pub keyword_rules: usize,
    pub skipped: usize,
}

type SubcatExportRow = (String, String, Option<String>, i64, NaiveDate);
type PayoreeExportRow = (String, String, i64, NaiveDate);

pub async fn export_learning(pool: &DbPool) -> Result<LearningBackup, StorageError> {
    let subcats = sqlx::query_as::<_, SubcatExportRow>(
        r#"
        SELECT l.merchant_key, c.name, p.name, l.confirmation_count, l.last_seen
        FROM learned_subcats l
        JOIN categories c ON c.id = l.subcategory_id
        LEFT JOIN categories p ON p.id = c.parent_id
        ORDER BY l.id
        "#,
    )
    .fetch_all(pool)
    .await?;

    let payorees = sqlx::query_as::<_, PayoreeExportRow>(
        r#"
        SELECT l.merchant_key, p.name, l.confirmation_count, l.last_seen
        FROM learned_payorees l
        JOIN payorees p ON p.id = l.payoree_id
        ORDER BY l.id
        "#,
    )
    .fetch_all(pool)
    .await?;

    let learned_subcats = subcats
        .into_iter()
        .map(|(key, subcategory, category, count, last_seen)| -> Result<_, StorageError> {
            Ok(LearnedSubcatEntry {
                count: export_count(&key, count)?,
                key,
                subcategory,
                category,
                last_seen,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let learned_payorees = payorees
        .into_iter()
        .map(|(key, payoree, count, last_seen)| -> Result<_, StorageError> {
            Ok(LearnedPayoreeEntry {
                count: export_count(&key, count)?,
                key,
                payoree,
                last_seen,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let keyword_rules: Vec<KeywordRule> = get_keyword_rules(pool)
        .await?
        .into_iter()
        .filter(|r| r.is_active)
        .collect();

    info!(
        subcats = learned_subcats.len(),
        payorees = learned_payorees.len(),
        keyword_rules = keyword_rules.len(),
        "Exported learning data"
    );

    Ok(LearningBackup {
        version: BACKUP_VERSION.to_string(),
        export_date: Utc::now().to_rfc3339(),
        learned_subcats,
        learned_payorees,
        keyword_rules,
    })
}

fn export_count(key: &str, count: i64) -> Result<u32, StorageError> {
    u32::try_from(count).map_err(|_| {
        StorageError::CorruptLearningData(format!(
            "merchant '{key}' has confirmation count {count}"
        ))
    })
}

fn entry<T: DeserializeOwned>(value: Value, what: &str) -> Option<T> {
    match serde_json::from_value::<T>(value.clone()) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            warn!("Skipped invalid {what} entry: {value} - {e}");
            None
        }
    }
}

fn has_key(item: &LearnedSubcatEntry) -> bool {
    !item.key.trim().is_empty()
}

/// Imports a JSON backup. A document without the three entry lists is
/// rejected as a whole; individual entries that do not parse or name
/// unknown categories are skipped.
///
/// Everything runs in one transaction: a storage failure part way through
/// leaves the previous learning data and rules in place. Replace mode keeps
/// inactive keyword rules, which exports never carry.
pub async fn import_learning(
    pool: &DbPool,
    json: &str,
    mode: ImportMode,
) -> Result<ImportSummary, StorageError> {
    let raw: RawBackup = serde_json::from_str(json)?;
    let mut summary = ImportSummary::default();
    let mut tx = pool.begin().await?;

    if mode == ImportMode::Replace {
        clear_learning(&mut *tx).await?;
        sqlx::query("DELETE FROM keyword_rules WHERE is_active = 1")
            .execute(&mut *tx)
            .await?;
        info!("Cleared existing learning data for full import");
    }

    for value in raw.learned_subcats {
        let Some(item) = entry::<LearnedSubcatEntry>(value, "subcategory").filter(has_key) else {
            summary.skipped += 1;
            continue;
        };
        let Some(subcategory_id) = resolve_subcategory(&mut *tx, &item).await? else {
            warn!(
                "Skipped subcategory entry for '{}': no category '{}' under '{}'",
                item.key,
                item.subcategory,
                item.category.as_deref().unwrap_or("(top level)")
            );
            summary.skipped += 1;
            continue;
        };
        add_learned(&mut *tx, "learned_subcats", "subcategory_id", &item.key, subcategory_id, item.count, item.last_seen).await?;
        summary.subcats += 1;
    }

    for value in raw.learned_payorees {
        let Some(item) = entry::<LearnedPayoreeEntry>(value, "payoree")
            .filter(|item| !item.key.trim().is_empty() && !item.payoree.trim().is_empty())
        else {
            summary.skipped += 1;
            continue;
        };
        let (payoree_id, _) = get_or_create_payoree(&mut *tx, item.payoree.trim()).await?;
        add_learned(&mut *tx, "learned_payorees", "payoree_id", &item.key, payoree_id.0, item.count, item.last_seen).await?;
        summary.payorees += 1;
    }

    let mut active: Vec<KeywordRule> = get_keyword_rules(&mut *tx)
        .await?
        .into_iter()
        .filter(|r| r.is_active)
        .collect();
    for value in raw.keyword_rules {
        let Some(mut rule) = entry::<KeywordRule>(value, "keyword rule") else {
            summary.skipped += 1;
            continue;
        };
        let duplicate = active.iter().any(|r| {
            r.keyword.eq_ignore_ascii_case(&rule.keyword)
                && r.category == rule.category
                && r.subcategory == rule.subcategory
        });
        if duplicate || rule.keyword.trim().is_empty() {
            continue;
        }
        rule.id = None;
        rule.id = Some(save_keyword_rule(&mut *tx, &rule).await?);
        active.push(rule);
        summary.keyword_rules += 1;
    }

    tx.commit().await?;

    info!(
        subcats = summary.subcats,
        payorees = summary.payorees,
        keyword_rules = summary.keyword_rules,
        skipped = summary.skipped,
        "Import completed"
    );
    Ok(summary)
}

async fn resolve_subcategory(
    conn: &mut SqliteConnection,
    item: &LearnedSubcatEntry,
) -> Result<Option<i64>, sqlx::Error> {
    let parent = match item.category.as_deref() {
        Some(category) => match find_category(&mut *conn, category.trim(), None).await? {
            Some(id) => Some(id),
            None => return Ok(None),
        },
        None => None,
    };
    Ok(find_category(&mut *conn, item.subcategory.trim(), parent)
        .await?
        .map(|id| id.0))
}

/// Adds `count` onto the row for `key`, saturating at the largest count
/// the store can load.
async fn add_learned(
    conn: &mut SqliteConnection,
    table: &str,
    column: &str,
    key: &str,
    target_id: i64,
    count: u32,
    last_seen: NaiveDate,
) -> Result<(), sqlx::Error> {
    sqlx::query(&format!(
        "INSERT INTO {table} (merchant_key, {column}, confirmation_count, last_seen) VALUES (?, ?, ?, ?) \
         ON CONFLICT (merchant_key, {column}) DO UPDATE SET \
         confirmation_count = MIN(confirmation_count + excluded.confirmation_count, {MAX_CONFIRMATIONS}), \
         last_seen = MAX(last_seen, excluded.last_seen)"
    ))
    .bind(key)
    .bind(target_id)
    .bind(count as i64)
    .bind(last_seen)
    .execute(conn)
    .await?;
    Ok(())
}
