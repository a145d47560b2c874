//! CSV import of the reference tables that lookups resolve against.

use std::io::Read;

use serde::Serialize;
use tracing::{info, warn};

use crate::db::{get_or_create_category, get_or_create_payoree, DbPool};
use crate::error::StorageError;

const LARGE_IMPORT_ROWS: usize = 250;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReferenceImportCounts {
    pub rows: usize,
    pub created: usize,
    pub skipped: usize,
}

fn header_index(headers: &csv::StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|h| h.trim() == name)
}

fn require_headers(headers: &csv::StringRecord, required: &[&str]) -> Result<(), StorageError> {
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|name| header_index(headers, name).is_none())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(StorageError::MissingHeaders(missing.join(", ")))
    }
}

fn field(record: &csv::StringRecord, idx: Option<usize>) -> &str {
    idx.and_then(|i| record.get(i)).unwrap_or_default().trim()
}

fn read_records<R: Read>(
    data: R,
    required: &[&str],
) -> Result<(csv::StringRecord, Vec<csv::StringRecord>), StorageError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(data);
    let headers = reader.headers()?.clone();
    require_headers(&headers, required)?;
    let records = reader.records().collect::<Result<Vec<_>, _>>()?;
    if records.len() > LARGE_IMPORT_ROWS {
        warn!("Large reference import: {} rows", records.len());
    }
    Ok((headers, records))
}

/// Columns `Category` and optional `SubCategory`. Each row makes sure the
/// top-level category exists, then the subcategory under it. `created`
/// counts new subcategories only.
pub async fn import_categories_csv<R: Read>(
    pool: &DbPool,
    data: R,
) -> Result<ReferenceImportCounts, StorageError> {
    let (headers, records) = read_records(data, &["Category"])?;
    let category_col = header_index(&headers, "Category");
    let subcategory_col = header_index(&headers, "SubCategory");

    let mut counts = ReferenceImportCounts {
        rows: records.len(),
        ..Default::default()
    };

    for record in &records {
        let category = field(record, category_col);
        let subcategory = field(record, subcategory_col);
        if category.is_empty() {
            counts.skipped += 1;
            continue;
        }

        let (parent, _) = get_or_create_category(pool, category, None).await?;
        if !subcategory.is_empty() {
            let (_, created) = get_or_create_category(pool, subcategory, Some(parent)).await?;
            if created {
                counts.created += 1;
            }
        }
    }

    info!(
        rows = counts.rows,
        created = counts.created,
        skipped = counts.skipped,
        "Imported categories"
    );
    Ok(counts)
}

/// Column `Name`; one payoree per non-blank row.
pub async fn import_payorees_csv<R: Read>(
    pool: &DbPool,
    data: R,
) -> Result<ReferenceImportCounts, StorageError> {
    let (headers, records) = read_records(data, &["Name"])?;
    let name_col = header_index(&headers, "Name");

    let mut counts = ReferenceImportCounts {
        rows: records.len(),
        ..Default::default()
    };

    for record in &records {
        let name = field(record, name_col);
        if name.is_empty() {
            counts.skipped += 1;
            continue;
        }
        let (_, created) = get_or_create_payoree(pool, name).await?;
        if created {
            counts.created += 1;
        }
    }

    info!(
        rows = counts.rows,
        created = counts.created,
        skipped = counts.skipped,
        "Imported payorees"
    );
    Ok(counts)
}
