use budgnudg_core::{CategoryId, LearningKind, Money, PayoreeId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::db::DbPool;
use crate::error::StorageError;
use crate::learning::record_confirmation;

/// A categorized transaction ready to store. Either the entity ids are set
/// or `categorization_error` says why they are not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    pub date: NaiveDate,
    pub description: String,
    pub amount: Money,
    pub category_id: Option<CategoryId>,
    pub subcategory_id: Option<CategoryId>,
    pub payoree_id: Option<PayoreeId>,
    pub categorization_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredTransaction {
    pub id: i64,
    pub date: NaiveDate,
    pub description: String,
    pub amount: Money,
    pub category_id: Option<CategoryId>,
    pub subcategory_id: Option<CategoryId>,
    pub payoree_id: Option<PayoreeId>,
    pub categorization_error: Option<String>,
}

/// A user's confirmation of how a transaction should be categorized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub transaction_id: i64,
    pub category_id: Option<CategoryId>,
    pub subcategory_id: Option<CategoryId>,
    pub payoree_id: Option<PayoreeId>,
    pub merchant_key: String,
    pub confirmed_on: NaiveDate,
}

/// Confirmation counts after a confirmation was recorded; 0 where nothing
/// was learned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfirmOutcome {
    pub subcategory_count: u32,
    pub payoree_count: u32,
}

pub async fn insert_transaction(pool: &DbPool, tx: &NewTransaction) -> Result<i64, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO transactions (date, description, amount_cents, category_id, subcategory_id, payoree_id, categorization_error) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(tx.date)
    .bind(&tx.description)
    .bind(tx.amount.to_cents())
    .bind(tx.category_id.map(|c| c.0))
    .bind(tx.subcategory_id.map(|c| c.0))
    .bind(tx.payoree_id.map(|p| p.0))
    .bind(&tx.categorization_error)
    .execute(pool)
    .await?;

    if let Some(code) = &tx.categorization_error {
        warn!(code, description = %tx.description, "Stored transaction with categorization error");
    }
    Ok(result.last_insert_rowid())
}

type TransactionRow = (
    i64,
    NaiveDate,
    String,
    i64,
    Option<i64>,
    Option<i64>,
    Option<i64>,
    Option<String>,
);

pub async fn get_transaction(
    pool: &DbPool,
    id: i64,
) -> Result<Option<StoredTransaction>, sqlx::Error> {
    let row = sqlx::query_as::<_, TransactionRow>(
        "SELECT id, date, description, amount_cents, category_id, subcategory_id, payoree_id, categorization_error FROM transactions WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(
        |(id, date, description, cents, category_id, subcategory_id, payoree_id, error)| {
            StoredTransaction {
                id,
                date,
                description,
                amount: Money::from_cents(cents),
                category_id: category_id.map(CategoryId),
                subcategory_id: subcategory_id.map(CategoryId),
                payoree_id: payoree_id.map(PayoreeId),
                categorization_error: error,
            }
        },
    ))
}

/// Saves the confirmed entities, clears any stored error, then feeds both
/// learned relations. The learning writes happen after the update commits
/// and never fail the confirmation.
pub async fn confirm_transaction(
    pool: &DbPool,
    confirmation: &Confirmation,
) -> Result<ConfirmOutcome, StorageError> {
    let result = sqlx::query(
        "UPDATE transactions SET category_id = ?, subcategory_id = ?, payoree_id = ?, categorization_error = NULL WHERE id = ?",
    )
    .bind(confirmation.category_id.map(|c| c.0))
    .bind(confirmation.subcategory_id.map(|c| c.0))
    .bind(confirmation.payoree_id.map(|p| p.0))
    .bind(confirmation.transaction_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(StorageError::UnknownTransaction(confirmation.transaction_id));
    }

    let mut outcome = ConfirmOutcome::default();
    if let Some(subcategory) = confirmation.subcategory_id {
        outcome.subcategory_count =
            learn(pool, LearningKind::Subcategory, confirmation, subcategory.0).await;
    }
    if let Some(payoree) = confirmation.payoree_id {
        outcome.payoree_count = learn(pool, LearningKind::Payoree, confirmation, payoree.0).await;
    }

    info!(
        transaction = confirmation.transaction_id,
        merchant = %confirmation.merchant_key,
        subcategory_count = outcome.subcategory_count,
        payoree_count = outcome.payoree_count,
        "Confirmed transaction"
    );
    Ok(outcome)
}

/// Learning write-back for a confirmation that is already saved. A failure
/// is logged and reported as 0 instead of failing the confirmation.
async fn learn(pool: &DbPool, kind: LearningKind, confirmation: &Confirmation, target_id: i64) -> u32 {
    match record_confirmation(
        pool,
        kind,
        &confirmation.merchant_key,
        target_id,
        confirmation.confirmed_on,
    )
    .await
    {
        Ok(count) => count,
        Err(e) => {
            warn!(
                %kind,
                transaction = confirmation.transaction_id,
                merchant = %confirmation.merchant_key,
                "Could not record learned association: {e}"
            );
            0
        }
    }
}

/// `(code, count)` for every stored error, most frequent first.
pub async fn categorization_error_breakdown(
    pool: &DbPool,
) -> Result<Vec<(String, i64)>, sqlx::Error> {
    sqlx::query_as::<_, (String, i64)>(
        r#"
        SELECT categorization_error, COUNT(*) AS n
        FROM transactions
        WHERE categorization_error IS NOT NULL
        GROUP BY categorization_error
        ORDER BY n DESC, categorization_error
        "#,
    )
    .fetch_all(pool)
    .await
}
