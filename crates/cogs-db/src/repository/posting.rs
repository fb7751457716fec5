//! Posting guard rows.
//!
//! A row `(order_id, sku, kind)` is written in the same transaction as the
//! allocations it guards. A second writer for the same key hits the primary
//! key instead of double-costing the line. The row also keeps the line
//! quantity it covered, which is what a later return splits against.

use chrono::Utc;
use sqlx::SqliteConnection;

use crate::error::{DbError, DbResult};
use cogs_core::{CostingMethod, PostingKind};

/// Claims `(order_id, sku, kind)` for `qty` units of the line.
///
/// ## Errors
/// - `UniqueViolation { field: "posting", .. }` when the key was already claimed
pub async fn claim(
    conn: &mut SqliteConnection,
    order_id: &str,
    sku: &str,
    kind: PostingKind,
    method: CostingMethod,
    qty: i64,
) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO cogs_postings (order_id, sku, kind, method, qty, posted_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(order_id)
    .bind(sku)
    .bind(kind)
    .bind(method)
    .bind(qty)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await
    .map_err(|e| match DbError::from(e) {
        DbError::UniqueViolation { .. } => {
            DbError::duplicate("posting", format!("{order_id}/{sku}/{kind:?}"))
        }
        other => other,
    })?;

    Ok(())
}

/// Line quantity covered by the `(order_id, sku, kind)` posting, if any.
pub async fn line_qty(
    conn: &mut SqliteConnection,
    order_id: &str,
    sku: &str,
    kind: PostingKind,
) -> DbResult<Option<i64>> {
    let qty = sqlx::query_scalar::<_, i64>(
        "SELECT qty FROM cogs_postings WHERE order_id = ?1 AND sku = ?2 AND kind = ?3",
    )
    .bind(order_id)
    .bind(sku)
    .bind(kind)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(qty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    #[tokio::test]
    async fn test_second_claim_fails() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();

        claim(&mut conn, "SO-1", "MUG", PostingKind::Sale, CostingMethod::Fifo, 4)
            .await
            .unwrap();
        // The reversal side is a separate key.
        claim(&mut conn, "SO-1", "MUG", PostingKind::Reversal, CostingMethod::Fifo, 1)
            .await
            .unwrap();

        let err = claim(&mut conn, "SO-1", "MUG", PostingKind::Sale, CostingMethod::Fifo, 4)
            .await
            .unwrap_err();
        assert!(err.is_unique_violation());
        assert!(err.to_string().contains("SO-1/MUG"));
    }

    #[tokio::test]
    async fn test_line_qty_reads_claimed_quantity() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();

        assert_eq!(line_qty(&mut conn, "SO-1", "BOX", PostingKind::Sale).await.unwrap(), None);

        claim(&mut conn, "SO-1", "BOX", PostingKind::Sale, CostingMethod::Avg, 3)
            .await
            .unwrap();
        assert_eq!(line_qty(&mut conn, "SO-1", "BOX", PostingKind::Sale).await.unwrap(), Some(3));
        assert_eq!(
            line_qty(&mut conn, "SO-1", "BOX", PostingKind::Reversal).await.unwrap(),
            None
        );
    }
}
