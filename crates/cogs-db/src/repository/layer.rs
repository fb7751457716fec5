//! # Receipt Layer Repository
//!
//! Receipt layers are the FIFO ledger. Rows are never deleted; `voided`
//! hides a layer from consumption and on-hand totals.
//!
//! ## Compare-And-Set
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  plan made from:   L1 qty_remaining = 100                               │
//! │                                                                         │
//! │  UPDATE receipt_layers SET qty_remaining = 0                            │
//! │  WHERE id = L1 AND qty_remaining = 100 AND voided = 0                   │
//! │                                                                         │
//! │  1 row  ──► applied                                                     │
//! │  0 rows ──► someone else moved L1 first: WriteConflict, tx rolls back   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use cogs_core::fifo::consumption_order;
use cogs_core::{LayerSource, LayerUpdate, Money, ReceiptLayer};

#[derive(Debug, sqlx::FromRow)]
struct LayerRow {
    id: i64,
    sku: String,
    received_at: DateTime<Utc>,
    qty_received: i64,
    qty_remaining: i64,
    unit_cost: String,
    source_type: LayerSource,
    source_ref: Option<String>,
    voided: bool,
}

impl TryFrom<LayerRow> for ReceiptLayer {
    type Error = DbError;

    fn try_from(row: LayerRow) -> DbResult<Self> {
        Ok(ReceiptLayer {
            unit_cost: Money::parse("unit_cost", &row.unit_cost)?,
            id: row.id,
            sku: row.sku,
            received_at: row.received_at,
            qty_received: row.qty_received,
            qty_remaining: row.qty_remaining,
            source_type: row.source_type,
            source_ref: row.source_ref,
            voided: row.voided,
        })
    }
}

const SELECT_LAYER: &str = r#"
    SELECT id, sku, received_at, qty_received, qty_remaining,
           unit_cost, source_type, source_ref, voided
    FROM receipt_layers
"#;

fn into_layers(rows: Vec<LayerRow>) -> DbResult<Vec<ReceiptLayer>> {
    rows.into_iter().map(ReceiptLayer::try_from).collect()
}

/// A new layer as written by the receiving flow.
#[derive(Debug, Clone)]
pub struct NewLayer<'a> {
    pub sku: &'a str,
    pub received_at: DateTime<Utc>,
    pub qty: i64,
    pub unit_cost: Money,
    pub source_type: LayerSource,
    pub source_ref: Option<&'a str>,
}

/// Inserts a layer with `qty_remaining = qty_received`. Returns its id.
pub async fn insert(conn: &mut SqliteConnection, layer: &NewLayer<'_>) -> DbResult<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO receipt_layers (
            sku, received_at, qty_received, qty_remaining,
            unit_cost, source_type, source_ref, voided, created_at
        ) VALUES (?1, ?2, ?3, ?3, ?4, ?5, ?6, 0, ?7)
        "#,
    )
    .bind(layer.sku)
    .bind(layer.received_at)
    .bind(layer.qty)
    .bind(layer.unit_cost.to_string())
    .bind(layer.source_type)
    .bind(layer.source_ref)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    let id = result.last_insert_rowid();
    debug!(layer_id = id, sku = %layer.sku, qty = layer.qty, "Inserted receipt layer");
    Ok(id)
}

/// Loads one layer.
pub async fn find(conn: &mut SqliteConnection, id: i64) -> DbResult<Option<ReceiptLayer>> {
    let row = sqlx::query_as::<_, LayerRow>(&format!("{SELECT_LAYER} WHERE id = ?1"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    row.map(ReceiptLayer::try_from).transpose()
}

/// Loads the layers with the given ids; missing ids are skipped.
pub async fn find_many(conn: &mut SqliteConnection, ids: &[i64]) -> DbResult<Vec<ReceiptLayer>> {
    let mut layers = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(layer) = find(conn, *id).await? {
            layers.push(layer);
        }
    }
    Ok(layers)
}

/// Layers FIFO may draw from, in consumption order.
pub async fn open_layers(conn: &mut SqliteConnection, sku: &str) -> DbResult<Vec<ReceiptLayer>> {
    let rows = sqlx::query_as::<_, LayerRow>(&format!(
        "{SELECT_LAYER} WHERE sku = ?1 AND voided = 0 AND qty_remaining > 0"
    ))
    .bind(sku)
    .fetch_all(&mut *conn)
    .await?;

    let layers = into_layers(rows)?;
    // Timestamps are TEXT; order on the parsed values.
    Ok(consumption_order(sku, &layers).into_iter().cloned().collect())
}

/// Every layer of `sku`, voided ones included, ordered by `(received_at, id)`.
pub async fn list_for_sku(conn: &mut SqliteConnection, sku: &str) -> DbResult<Vec<ReceiptLayer>> {
    let rows = sqlx::query_as::<_, LayerRow>(&format!("{SELECT_LAYER} WHERE sku = ?1"))
        .bind(sku)
        .fetch_all(&mut *conn)
        .await?;

    let mut layers = into_layers(rows)?;
    layers.sort_by(|a, b| a.received_at.cmp(&b.received_at).then(a.id.cmp(&b.id)));
    Ok(layers)
}

/// Applies one compare-and-set update of `qty_remaining`.
pub async fn apply_update(conn: &mut SqliteConnection, update: &LayerUpdate) -> DbResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE receipt_layers
        SET qty_remaining = ?1
        WHERE id = ?2 AND qty_remaining = ?3 AND voided = 0
        "#,
    )
    .bind(update.new_remaining)
    .bind(update.layer_id)
    .bind(update.expected_remaining)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::conflict(
            "ReceiptLayer",
            update.layer_id.to_string(),
            format!("qty_remaining is no longer {}", update.expected_remaining),
        ));
    }

    Ok(())
}

/// Marks an untouched layer voided. Returns whether a row was voided.
pub async fn void(conn: &mut SqliteConnection, id: i64) -> DbResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE receipt_layers
        SET voided = 1
        WHERE id = ?1 AND voided = 0 AND qty_remaining = qty_received
        "#,
    )
    .bind(id)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Repository for receipt layer reads.
#[derive(Debug, Clone)]
pub struct LayerRepository {
    pool: SqlitePool,
}

impl LayerRepository {
    /// Creates a new LayerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        LayerRepository { pool }
    }

    /// Gets a layer by id.
    pub async fn get(&self, id: i64) -> DbResult<Option<ReceiptLayer>> {
        let mut conn = self.pool.acquire().await?;
        find(&mut conn, id).await
    }

    /// Every layer of a SKU, voided ones included.
    pub async fn list_for_sku(&self, sku: &str) -> DbResult<Vec<ReceiptLayer>> {
        let mut conn = self.pool.acquire().await?;
        list_for_sku(&mut conn, sku).await
    }

    /// Layers FIFO would draw from next, oldest first.
    pub async fn open_layers(&self, sku: &str) -> DbResult<Vec<ReceiptLayer>> {
        let mut conn = self.pool.acquire().await?;
        open_layers(&mut conn, sku).await
    }

    /// Sum of `qty_remaining` over non-voided layers.
    pub async fn on_hand_qty(&self, sku: &str) -> DbResult<i64> {
        let qty: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(qty_remaining), 0)
            FROM receipt_layers
            WHERE sku = ?1 AND voided = 0
            "#,
        )
        .bind(sku)
        .fetch_one(&self.pool)
        .await?;

        Ok(qty)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::TimeZone;
    use cogs_core::Item;

    async fn setup() -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();
        crate::repository::item::insert(
            &mut conn,
            &Item {
                sku: "MUG".to_string(),
                display_name: "Mug".to_string(),
                is_bundle: false,
                default_unit_cost: Money::ZERO,
                created_at: Utc::now(),
            },
        )
        .await
        .unwrap();
        drop(conn);
        db
    }

    fn new_layer(day: u32, qty: i64, cost: i64) -> NewLayer<'static> {
        NewLayer {
            sku: "MUG",
            received_at: Utc.with_ymd_and_hms(2026, 3, day, 9, 0, 0).unwrap(),
            qty,
            unit_cost: Money::from_major(cost),
            source_type: LayerSource::StockIn,
            source_ref: Some("PO-1"),
        }
    }

    #[tokio::test]
    async fn test_open_layers_in_fifo_order() {
        let db = setup().await;
        let mut conn = db.pool().acquire().await.unwrap();

        let late = insert(&mut conn, &new_layer(20, 5, 2)).await.unwrap();
        let early = insert(&mut conn, &new_layer(1, 5, 1)).await.unwrap();

        let open = open_layers(&mut conn, "MUG").await.unwrap();
        assert_eq!(open[0].id, early);
        assert_eq!(open[1].id, late);
        assert_eq!(open[0].qty_remaining, 5);
        assert_eq!(open[0].source_type, LayerSource::StockIn);
        assert_eq!(open[0].source_ref.as_deref(), Some("PO-1"));
    }

    #[tokio::test]
    async fn test_compare_and_set() {
        let db = setup().await;
        let mut conn = db.pool().acquire().await.unwrap();
        let id = insert(&mut conn, &new_layer(1, 10, 1)).await.unwrap();

        let update = LayerUpdate {
            layer_id: id,
            expected_remaining: 10,
            new_remaining: 4,
        };
        apply_update(&mut conn, &update).await.unwrap();

        // Same update again: the row no longer holds 10.
        let err = apply_update(&mut conn, &update).await.unwrap_err();
        assert!(matches!(err, DbError::WriteConflict { .. }));

        assert_eq!(find(&mut conn, id).await.unwrap().unwrap().qty_remaining, 4);
    }

    #[tokio::test]
    async fn test_check_constraint_blocks_overcredit() {
        let db = setup().await;
        let mut conn = db.pool().acquire().await.unwrap();
        let id = insert(&mut conn, &new_layer(1, 10, 1)).await.unwrap();

        let update = LayerUpdate {
            layer_id: id,
            expected_remaining: 10,
            new_remaining: 11,
        };
        let err = apply_update(&mut conn, &update).await.unwrap_err();
        assert!(matches!(err, DbError::CheckViolation { .. }));
    }

    #[tokio::test]
    async fn test_void_only_untouched_layers() {
        let db = setup().await;
        let mut conn = db.pool().acquire().await.unwrap();
        let untouched = insert(&mut conn, &new_layer(1, 10, 1)).await.unwrap();
        let touched = insert(&mut conn, &new_layer(2, 10, 1)).await.unwrap();
        apply_update(
            &mut conn,
            &LayerUpdate {
                layer_id: touched,
                expected_remaining: 10,
                new_remaining: 9,
            },
        )
        .await
        .unwrap();

        assert!(void(&mut conn, untouched).await.unwrap());
        assert!(!void(&mut conn, untouched).await.unwrap());
        assert!(!void(&mut conn, touched).await.unwrap());

        let open = open_layers(&mut conn, "MUG").await.unwrap();
        assert_eq!(open.len(), 1);
        drop(conn);

        assert_eq!(db.layers().on_hand_qty("MUG").await.unwrap(), 9);
        assert_eq!(db.layers().list_for_sku("MUG").await.unwrap().len(), 2);
    }
}
