//! # Item Repository
//!
//! The item catalog. Rows are inserted once; `sku` and `is_bundle` never change.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use cogs_core::{Item, Money};

#[derive(Debug, sqlx::FromRow)]
struct ItemRow {
    sku: String,
    display_name: String,
    is_bundle: bool,
    default_unit_cost: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<ItemRow> for Item {
    type Error = DbError;

    fn try_from(row: ItemRow) -> DbResult<Self> {
        Ok(Item {
            default_unit_cost: Money::parse("default_unit_cost", &row.default_unit_cost)?,
            sku: row.sku,
            display_name: row.display_name,
            is_bundle: row.is_bundle,
            created_at: row.created_at,
        })
    }
}

const SELECT_ITEM: &str = r#"
    SELECT sku, display_name, is_bundle, default_unit_cost, created_at
    FROM items
"#;

/// Loads one item.
pub async fn find(conn: &mut SqliteConnection, sku: &str) -> DbResult<Option<Item>> {
    let row = sqlx::query_as::<_, ItemRow>(&format!("{SELECT_ITEM} WHERE sku = ?1"))
        .bind(sku)
        .fetch_optional(&mut *conn)
        .await?;

    row.map(Item::try_from).transpose()
}

/// Loads the items among `skus` that exist, in `skus` order.
pub async fn find_many(conn: &mut SqliteConnection, skus: &[String]) -> DbResult<Vec<Item>> {
    let mut items = Vec::with_capacity(skus.len());
    for sku in skus {
        if let Some(item) = find(conn, sku).await? {
            items.push(item);
        }
    }
    Ok(items)
}

/// Inserts a new item.
///
/// A duplicate SKU comes back as `UniqueViolation { field: "sku", value }`.
pub async fn insert(conn: &mut SqliteConnection, item: &Item) -> DbResult<()> {
    debug!(sku = %item.sku, is_bundle = item.is_bundle, "Inserting item");

    sqlx::query(
        r#"
        INSERT INTO items (sku, display_name, is_bundle, default_unit_cost, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
    )
    .bind(&item.sku)
    .bind(&item.display_name)
    .bind(item.is_bundle)
    .bind(item.default_unit_cost.to_string())
    .bind(item.created_at)
    .execute(&mut *conn)
    .await
    .map_err(|e| match DbError::from(e) {
        DbError::UniqueViolation { .. } => DbError::duplicate("sku", item.sku.clone()),
        other => other,
    })?;

    Ok(())
}

/// Repository for item catalog reads.
#[derive(Debug, Clone)]
pub struct ItemRepository {
    pool: SqlitePool,
}

impl ItemRepository {
    /// Creates a new ItemRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ItemRepository { pool }
    }

    /// Gets an item by SKU.
    pub async fn get(&self, sku: &str) -> DbResult<Option<Item>> {
        let mut conn = self.pool.acquire().await?;
        find(&mut conn, sku).await
    }

    /// Lists the whole catalog ordered by SKU.
    pub async fn list(&self) -> DbResult<Vec<Item>> {
        let rows = sqlx::query_as::<_, ItemRow>(&format!("{SELECT_ITEM} ORDER BY sku"))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Item::try_from).collect()
    }

    /// Lists bundle SKUs only.
    pub async fn list_bundles(&self) -> DbResult<Vec<Item>> {
        let rows =
            sqlx::query_as::<_, ItemRow>(&format!("{SELECT_ITEM} WHERE is_bundle = 1 ORDER BY sku"))
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(Item::try_from).collect()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
