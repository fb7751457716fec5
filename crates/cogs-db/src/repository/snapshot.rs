//! # Cost Snapshot Repository
//!
//! One row per SKU holding the moving-average position. Writes are
//! compare-and-set on the values the plan was computed from.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};

use crate::error::{DbError, DbResult};
use cogs_core::{CostSnapshot, Money};

#[derive(Debug, sqlx::FromRow)]
struct SnapshotRow {
    sku: String,
    on_hand_qty: i64,
    on_hand_value: String,
}

impl TryFrom<SnapshotRow> for CostSnapshot {
    type Error = DbError;

    fn try_from(row: SnapshotRow) -> DbResult<Self> {
        Ok(CostSnapshot {
            on_hand_value: Money::parse("on_hand_value", &row.on_hand_value)?,
            sku: row.sku,
            on_hand_qty: row.on_hand_qty,
        })
    }
}

/// Loads the snapshot of `sku`, if one was ever written.
pub async fn find(conn: &mut SqliteConnection, sku: &str) -> DbResult<Option<CostSnapshot>> {
    let row = sqlx::query_as::<_, SnapshotRow>(
        "SELECT sku, on_hand_qty, on_hand_value FROM cost_snapshots WHERE sku = ?1",
    )
    .bind(sku)
    .fetch_optional(&mut *conn)
    .await?;

    row.map(CostSnapshot::try_from).transpose()
}

/// Writes `next`, provided the stored row still equals `previous`.
///
/// `previous = None` means no row existed when the plan was made.
pub async fn save(
    conn: &mut SqliteConnection,
    previous: Option<&CostSnapshot>,
    next: &CostSnapshot,
) -> DbResult<()> {
    let now = Utc::now();

    let rows_affected = match previous {
        None => sqlx::query(
            r#"
            INSERT INTO cost_snapshots (sku, on_hand_qty, on_hand_value, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (sku) DO NOTHING
            "#,
        )
        .bind(&next.sku)
        .bind(next.on_hand_qty)
        .bind(next.on_hand_value.to_string())
        .bind(now)
        .execute(&mut *conn)
        .await?
        .rows_affected(),

        Some(previous) => sqlx::query(
            r#"
            UPDATE cost_snapshots
            SET on_hand_qty = ?1, on_hand_value = ?2, updated_at = ?3
            WHERE sku = ?4 AND on_hand_qty = ?5 AND on_hand_value = ?6
            "#,
        )
        .bind(next.on_hand_qty)
        .bind(next.on_hand_value.to_string())
        .bind(now)
        .bind(&next.sku)
        .bind(previous.on_hand_qty)
        .bind(previous.on_hand_value.to_string())
        .execute(&mut *conn)
        .await?
        .rows_affected(),
    };

    if rows_affected == 0 {
        return Err(DbError::conflict(
            "CostSnapshot",
            next.sku.clone(),
            "snapshot changed since it was read",
        ));
    }

    Ok(())
}

/// Repository for snapshot reads.
#[derive(Debug, Clone)]
pub struct SnapshotRepository {
    pool: SqlitePool,
}

impl SnapshotRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SnapshotRepository { pool }
    }

    /// Gets the snapshot of a SKU, or an empty position.
    pub async fn get(&self, sku: &str) -> DbResult<CostSnapshot> {
        let mut conn = self.pool.acquire().await?;
        Ok(find(&mut conn, sku)
            .await?
            .unwrap_or_else(|| CostSnapshot::empty(sku)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use cogs_core::Item;

    #[tokio::test]
    async fn test_save_is_compare_and_set() {
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

        let first = CostSnapshot {
            sku: "MUG".to_string(),
            on_hand_qty: 3,
            on_hand_value: Money::parse("v", "10.000001").unwrap(),
        };
        save(&mut conn, None, &first).await.unwrap();

        // A second "first write" loses.
        assert!(matches!(
            save(&mut conn, None, &first).await,
            Err(DbError::WriteConflict { .. })
        ));

        let second = CostSnapshot {
            on_hand_qty: 1,
            ..first.clone()
        };
        save(&mut conn, Some(&first), &second).await.unwrap();
        assert!(save(&mut conn, Some(&first), &second).await.is_err());

        let stored = find(&mut conn, "MUG").await.unwrap().unwrap();
        assert_eq!(stored, second);
        drop(conn);

        assert_eq!(db.snapshots().get("PLATE").await.unwrap().on_hand_qty, 0);
    }
}
