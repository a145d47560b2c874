use budgnudg_core::{
    CategorizationError, Category, CategoryId, EntityIndex, KeywordRule, Payoree, PayoreeId,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Acquire, Executor, Pool, Sqlite};
use std::path::Path;
use tracing::debug;

pub type DbPool = Pool<Sqlite>;

pub async fn create_db(path: &Path) -> Result<DbPool, sqlx::Error> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous = NORMAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA cache_size = -32000")
        .execute(&pool)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS categories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            parent_id INTEGER,
            FOREIGN KEY (parent_id) REFERENCES categories(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS payorees (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS keyword_rules (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            keyword TEXT NOT NULL,
            category TEXT NOT NULL,
            subcategory TEXT,
            payoree TEXT,
            priority INTEGER NOT NULL DEFAULT 100,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS learned_subcats (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            merchant_key TEXT NOT NULL,
            subcategory_id INTEGER NOT NULL,
            confirmation_count INTEGER NOT NULL DEFAULT 0,
            last_seen TEXT NOT NULL,
            UNIQUE (merchant_key, subcategory_id),
            FOREIGN KEY (subcategory_id) REFERENCES categories(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS learned_payorees (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            merchant_key TEXT NOT NULL,
            payoree_id INTEGER NOT NULL,
            confirmation_count INTEGER NOT NULL DEFAULT 0,
            last_seen TEXT NOT NULL,
            UNIQUE (merchant_key, payoree_id),
            FOREIGN KEY (payoree_id) REFERENCES payorees(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS transactions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            date TEXT NOT NULL,
            description TEXT NOT NULL,
            amount_cents INTEGER NOT NULL,
            category_id INTEGER,
            subcategory_id INTEGER,
            payoree_id INTEGER,
            categorization_error TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            FOREIGN KEY (category_id) REFERENCES categories(id) ON DELETE SET NULL,
            FOREIGN KEY (subcategory_id) REFERENCES categories(id) ON DELETE SET NULL,
            FOREIGN KEY (payoree_id) REFERENCES payorees(id) ON DELETE SET NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

// ── Categories & payorees ────────────────────────────────────────────────────

pub async fn get_all_categories(pool: &DbPool) -> Result<Vec<Category>, sqlx::Error> {
    let rows = sqlx::query_as::<_, (i64, String, Option<i64>)>(
        "SELECT id, name, parent_id FROM categories ORDER BY id",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(id, name, parent_id)| Category::new(id, &name, parent_id))
        .collect())
}

pub async fn get_all_payorees(pool: &DbPool) -> Result<Vec<Payoree>, sqlx::Error> {
    let rows = sqlx::query_as::<_, (i64, String)>("SELECT id, name FROM payorees ORDER BY id")
        .fetch_all(pool)
        .await?;

    Ok(rows
        .into_iter()
        .map(|(id, name)| Payoree::new(id, &name))
        .collect())
}

pub async fn find_category<'e, E>(
    executor: E,
    name: &str,
    parent_id: Option<CategoryId>,
) -> Result<Option<CategoryId>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, (i64,)>(
        "SELECT id FROM categories WHERE name = ? AND parent_id IS ? ORDER BY id LIMIT 1",
    )
    .bind(name)
    .bind(parent_id.map(|p| p.0))
    .fetch_optional(executor)
    .await?;

    Ok(row.map(|(id,)| CategoryId(id)))
}

/// Returns the category id and whether it was created. `parent_id IS ?`
/// treats NULL as a value, so top-level names stay unique too.
pub async fn get_or_create_category(
    pool: &DbPool,
    name: &str,
    parent_id: Option<CategoryId>,
) -> Result<(CategoryId, bool), sqlx::Error> {
    if let Some(id) = find_category(pool, name, parent_id).await? {
        return Ok((id, false));
    }

    let result = sqlx::query("INSERT INTO categories (name, parent_id) VALUES (?, ?)")
        .bind(name)
        .bind(parent_id.map(|p| p.0))
        .execute(pool)
        .await?;

    debug!(name, parent = ?parent_id, "Created category");
    Ok((CategoryId(result.last_insert_rowid()), true))
}

pub async fn find_payoree(pool: &DbPool, name: &str) -> Result<Option<PayoreeId>, sqlx::Error> {
    let row = sqlx::query_as::<_, (i64,)>("SELECT id FROM payorees WHERE name = ?")
        .bind(name)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|(id,)| PayoreeId(id)))
}

pub async fn get_or_create_payoree<'a, A>(
    db: A,
    name: &str,
) -> Result<(PayoreeId, bool), sqlx::Error>
where
    A: Acquire<'a, Database = Sqlite>,
{
    let mut conn = db.acquire().await?;
    let result = sqlx::query("INSERT OR IGNORE INTO payorees (name) VALUES (?)")
        .bind(name)
        .execute(&mut *conn)
        .await?;
    let created = result.rows_affected() > 0;

    let (id,) = sqlx::query_as::<_, (i64,)>("SELECT id FROM payorees WHERE name = ?")
        .bind(name)
        .fetch_one(&mut *conn)
        .await?;

    if created {
        debug!(name, "Created payoree");
    }
    Ok((PayoreeId(id), created))
}

/// Snapshot of both entity tables for in-memory lookups.
pub async fn load_entity_index(pool: &DbPool) -> Result<EntityIndex, sqlx::Error> {
    let categories = get_all_categories(pool).await?;
    let payorees = get_all_payorees(pool).await?;
    Ok(EntityIndex::new(categories, payorees))
}

/// `CATEGORIES_NOT_IMPORTED` / `PAYOREES_NOT_IMPORTED` when a batch would
/// have nothing to resolve names against.
pub async fn check_reference_data(
    pool: &DbPool,
) -> Result<Option<CategorizationError>, sqlx::Error> {
    let (categories,) = sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM categories")
        .fetch_one(pool)
        .await?;
    if categories == 0 {
        return Ok(Some(CategorizationError::CategoriesNotImported));
    }

    let (payorees,) = sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM payorees")
        .fetch_one(pool)
        .await?;
    if payorees == 0 {
        return Ok(Some(CategorizationError::PayoreesNotImported));
    }

    Ok(None)
}

// ── Keyword rules ────────────────────────────────────────────────────────────

type KeywordRuleRow = (i64, String, String, Option<String>, Option<String>, i64, i64);

fn keyword_rule_from_row(row: KeywordRuleRow) -> KeywordRule {
    let (id, keyword, category, subcategory, payoree, priority, is_active) = row;
    KeywordRule {
        id: Some(id),
        keyword,
        category,
        subcategory,
        payoree,
        priority: priority as i32,
        is_active: is_active != 0,
    }
}

/// All rules, inactive included, in registration order.
pub async fn get_keyword_rules<'e, E>(executor: E) -> Result<Vec<KeywordRule>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query_as::<_, KeywordRuleRow>(
        "SELECT id, keyword, category, subcategory, payoree, priority, is_active FROM keyword_rules ORDER BY id",
    )
    .fetch_all(executor)
    .await?;

    Ok(rows.into_iter().map(keyword_rule_from_row).collect())
}

/// Inserts a new rule, or updates it in place when `rule.id` is set.
pub async fn save_keyword_rule<'e, E>(executor: E, rule: &KeywordRule) -> Result<i64, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    if let Some(id) = rule.id {
        sqlx::query(
            "UPDATE keyword_rules SET keyword = ?, category = ?, subcategory = ?, payoree = ?, priority = ?, is_active = ? WHERE id = ?",
        )
        .bind(&rule.keyword)
        .bind(&rule.category)
        .bind(&rule.subcategory)
        .bind(&rule.payoree)
        .bind(rule.priority)
        .bind(rule.is_active as i64)
        .bind(id)
        .execute(executor)
        .await?;
        Ok(id)
    } else {
        let result = sqlx::query(
            "INSERT INTO keyword_rules (keyword, category, subcategory, payoree, priority, is_active) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&rule.keyword)
        .bind(&rule.category)
        .bind(&rule.subcategory)
        .bind(&rule.payoree)
        .bind(rule.priority)
        .bind(rule.is_active as i64)
        .execute(executor)
        .await?;
        Ok(result.last_insert_rowid())
    }
}

pub async fn delete_keyword_rule(pool: &DbPool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM keyword_rules WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
