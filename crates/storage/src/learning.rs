use budgnudg_core::{LearnedAssociation, LearningKind, LearningTarget, MemoryLearningStore};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::{Acquire, Sqlite};
use tracing::{debug, info};

use crate::db::DbPool;
use crate::error::StorageError;

/// Counts saturate here so they always fit a `u32`.
pub(crate) const MAX_CONFIRMATIONS: i64 = u32::MAX as i64;

/// `(table, target column)` for a learned relation.
fn relation(kind: LearningKind) -> (&'static str, &'static str) {
    match kind {
        LearningKind::Subcategory => ("learned_subcats", "subcategory_id"),
        LearningKind::Payoree => ("learned_payorees", "payoree_id"),
    }
}

/// Reinforces `merchant_key -> target_id` by one. Returns the new count;
/// a blank key is ignored and yields 0.
///
/// Not wrapped in a transaction with the confirmation that triggered it, so
/// two confirmations racing may both read the same count.
pub async fn record_confirmation(
    pool: &DbPool,
    kind: LearningKind,
    merchant_key: &str,
    target_id: i64,
    confirmed_on: NaiveDate,
) -> Result<u32, StorageError> {
    let key = merchant_key.trim();
    if key.is_empty() {
        debug!(%kind, "Skipping learning for blank merchant key");
        return Ok(0);
    }
    let (table, column) = relation(kind);

    sqlx::query(&format!(
        "INSERT INTO {table} (merchant_key, {column}, confirmation_count, last_seen) VALUES (?, ?, 1, ?) \
         ON CONFLICT (merchant_key, {column}) DO UPDATE SET \
         confirmation_count = MIN(confirmation_count + 1, {MAX_CONFIRMATIONS}), \
         last_seen = MAX(last_seen, excluded.last_seen)"
    ))
    .bind(key)
    .bind(target_id)
    .bind(confirmed_on)
    .execute(pool)
    .await?;

    let (count,) = sqlx::query_as::<_, (i64,)>(&format!(
        "SELECT confirmation_count FROM {table} WHERE merchant_key = ? AND {column} = ?"
    ))
    .bind(key)
    .bind(target_id)
    .fetch_one(pool)
    .await?;

    let count = checked_count(key, count)?;
    debug!(%kind, merchant = key, target_id, count, "Recorded confirmation");
    Ok(count)
}

fn checked_count(key: &str, count: i64) -> Result<u32, StorageError> {
    u32::try_from(count).map_err(|_| {
        StorageError::CorruptLearningData(format!(
            "merchant '{key}' has confirmation count {count}"
        ))
    })
}

type SubcatRow = (String, i64, String, Option<String>, i64, NaiveDate);
type PayoreeRow = (String, i64, String, i64, NaiveDate);

async fn subcat_rows(pool: &DbPool) -> Result<Vec<SubcatRow>, sqlx::Error> {
    sqlx::query_as::<_, SubcatRow>(
        r#"
        SELECT l.merchant_key, c.id, c.name, p.name, l.confirmation_count, l.last_seen
        FROM learned_subcats l
        JOIN categories c ON c.id = l.subcategory_id
        LEFT JOIN categories p ON p.id = c.parent_id
        ORDER BY l.id
        "#,
    )
    .fetch_all(pool)
    .await
}

async fn payoree_rows(pool: &DbPool) -> Result<Vec<PayoreeRow>, sqlx::Error> {
    sqlx::query_as::<_, PayoreeRow>(
        r#"
        SELECT l.merchant_key, p.id, p.name, l.confirmation_count, l.last_seen
        FROM learned_payorees l
        JOIN payorees p ON p.id = l.payoree_id
        ORDER BY l.id
        "#,
    )
    .fetch_all(pool)
    .await
}

/// Snapshot of both learned relations for one batch.
pub async fn load_learning_store(pool: &DbPool) -> Result<MemoryLearningStore, StorageError> {
    let mut store = MemoryLearningStore::new();

    for (key, id, name, parent, count, last_seen) in subcat_rows(pool).await? {
        store.insert(
            LearningKind::Subcategory,
            LearnedAssociation {
                confirmation_count: checked_count(&key, count)?,
                target: LearningTarget::new(id, &name, parent.as_deref()),
                merchant_key: key,
                last_confirmed: last_seen,
            },
        );
    }

    for (key, id, name, count, last_seen) in payoree_rows(pool).await? {
        store.insert(
            LearningKind::Payoree,
            LearnedAssociation {
                confirmation_count: checked_count(&key, count)?,
                target: LearningTarget::new(id, &name, None),
                merchant_key: key,
                last_confirmed: last_seen,
            },
        );
    }

    info!(associations = store.len(), "Loaded learned associations");
    Ok(store)
}

/// A learned row flattened for listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearnedPattern {
    pub merchant_key: String,
    pub target: String,
    pub parent: Option<String>,
    pub confirmation_count: u32,
    pub last_confirmed: NaiveDate,
}

/// The `limit` strongest associations of one relation.
pub async fn top_learned_patterns(
    pool: &DbPool,
    kind: LearningKind,
    limit: u32,
) -> Result<Vec<LearnedPattern>, StorageError> {
    let mut patterns = match kind {
        LearningKind::Subcategory => subcat_rows(pool)
            .await?
            .into_iter()
            .map(|(key, _, name, parent, count, last_seen)| -> Result<_, StorageError> {
                Ok(LearnedPattern {
                    confirmation_count: checked_count(&key, count)?,
                    merchant_key: key,
                    target: name,
                    parent,
                    last_confirmed: last_seen,
                })
            })
            .collect::<Result<Vec<LearnedPattern>, _>>()?,
        LearningKind::Payoree => payoree_rows(pool)
            .await?
            .into_iter()
            .map(|(key, _, name, count, last_seen)| -> Result<_, StorageError> {
                Ok(LearnedPattern {
                    confirmation_count: checked_count(&key, count)?,
                    merchant_key: key,
                    target: name,
                    parent: None,
                    last_confirmed: last_seen,
                })
            })
            .collect::<Result<Vec<LearnedPattern>, _>>()?,
    };

    patterns.sort_by(|a, b| {
        b.confirmation_count
            .cmp(&a.confirmation_count)
            .then_with(|| b.last_confirmed.cmp(&a.last_confirmed))
            .then_with(|| a.merchant_key.cmp(&b.merchant_key))
    });
    patterns.truncate(limit as usize);
    Ok(patterns)
}

pub async fn clear_learning<'a, A>(db: A) -> Result<(), sqlx::Error>
where
    A: Acquire<'a, Database = Sqlite>,
{
    let mut conn = db.acquire().await?;
    sqlx::query("DELETE FROM learned_subcats")
        .execute(&mut *conn)
        .await?;
    sqlx::query("DELETE FROM learned_payorees")
        .execute(&mut *conn)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_db, get_or_create_category, get_or_create_payoree};
    use budgnudg_core::LearningStore;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, d).unwrap()
    }

    async fn seeded() -> (tempfile::TempDir, DbPool, i64, i64) {
        let dir = tempfile::tempdir().unwrap();
        let pool = create_db(&dir.path().join("learn.db")).await.unwrap();
        let (food, _) = get_or_create_category(&pool, "Food & Dining", None).await.unwrap();
        let (coffee, _) = get_or_create_category(&pool, "Coffee/Tea", Some(food)).await.unwrap();
        let (starbucks, _) = get_or_create_payoree(&pool, "Starbucks").await.unwrap();
        (dir, pool, coffee.0, starbucks.0)
    }

    #[tokio::test]
    async fn upsert_increments() {
        let (_dir, pool, coffee, _) = seeded().await;
        for (i, d) in [1, 2, 3].into_iter().enumerate() {
            let n = record_confirmation(&pool, LearningKind::Subcategory, "Starbucks", coffee, date(d))
                .await
                .unwrap();
            assert_eq!(n as usize, i + 1);
        }
    }

    #[tokio::test]
    async fn blank_key_not_recorded() {
        let (_dir, pool, coffee, _) = seeded().await;
        let n = record_confirmation(&pool, LearningKind::Subcategory, " ", coffee, date(1))
            .await
            .unwrap();
        assert_eq!(n, 0);
        assert!(load_learning_store(&pool).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn snapshot_carries_parent_and_latest_date() {
        let (_dir, pool, coffee, starbucks) = seeded().await;
        record_confirmation(&pool, LearningKind::Subcategory, "Starbucks", coffee, date(9)).await.unwrap();
        record_confirmation(&pool, LearningKind::Subcategory, "Starbucks", coffee, date(4)).await.unwrap();
        record_confirmation(&pool, LearningKind::Payoree, "Starbucks", starbucks, date(4)).await.unwrap();

        let store = load_learning_store(&pool).await.unwrap();
        let top = store
            .top_association(LearningKind::Subcategory, "Starbucks")
            .unwrap();
        assert_eq!(top.confirmation_count, 2);
        assert_eq!(top.last_confirmed, date(9));
        assert_eq!(top.target.parent.as_deref(), Some("Food & Dining"));

        let payoree = store.top_association(LearningKind::Payoree, "Starbucks").unwrap();
        assert_eq!(payoree.target.name, "Starbucks");
    }

    #[tokio::test]
    async fn negative_count_is_corrupt() {
        let (_dir, pool, coffee, _) = seeded().await;
        sqlx::query(
            "INSERT INTO learned_subcats (merchant_key, subcategory_id, confirmation_count, last_seen) VALUES ('Bad', ?, -3, '2024-01-01')",
        )
        .bind(coffee)
        .execute(&pool)
        .await
        .unwrap();

        let err = load_learning_store(&pool).await.unwrap_err();
        assert!(matches!(err, StorageError::CorruptLearningData(_)));
        assert_eq!(err.categorization_error().code(), "LEARNED_DATA_CORRUPT");
    }

    #[tokio::test]
    async fn top_patterns_sorted_and_limited() {
        let (_dir, pool, coffee, _) = seeded().await;
        for _ in 0..3 {
            record_confirmation(&pool, LearningKind::Subcategory, "Starbucks", coffee, date(1)).await.unwrap();
        }
        record_confirmation(&pool, LearningKind::Subcategory, "Dunkin'", coffee, date(2)).await.unwrap();
        record_confirmation(&pool, LearningKind::Subcategory, "Lula Cafe", coffee, date(3)).await.unwrap();

        let top = top_learned_patterns(&pool, LearningKind::Subcategory, 2).await.unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].merchant_key, "Starbucks");
        assert_eq!(top[0].confirmation_count, 3);
        assert_eq!(top[1].merchant_key, "Lula Cafe");
    }

    #[tokio::test]
    async fn clear_removes_everything() {
        let (_dir, pool, coffee, starbucks) = seeded().await;
        record_confirmation(&pool, LearningKind::Subcategory, "Starbucks", coffee, date(1)).await.unwrap();
        record_confirmation(&pool, LearningKind::Payoree, "Starbucks", starbucks, date(1)).await.unwrap();
        clear_learning(&pool).await.unwrap();
        assert!(load_learning_store(&pool).await.unwrap().is_empty());
    }
}
