//! # Allocation Repository
//!
//! The allocation ledger: append-only rows, one per costed slice of a sale or
//! return. Nothing here updates or deletes a row.
//!
//! ## Lookups
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  for_order_skus(#1001, [COASTER, MUG], Some(Sale))                      │
//! │     idempotency check: were these components already costed?           │
//! │                                                                         │
//! │  for_order_line(#1001, GIFT-BOX, Some(MUG), None)                       │
//! │     reversal input: the line's rows for one component                   │
//! │                                                                         │
//! │  between(from_ms, to_ms)                                                │
//! │     P&L reader: half-open range on shipped_at                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Rows come back in insertion order (SQLite rowid).

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use cogs_core::{CogsAllocation, CostingMethod, Money, PostingKind};

#[derive(Debug, sqlx::FromRow)]
struct AllocationRow {
    id: String,
    order_id: String,
    line_sku: String,
    sku: String,
    shipped_at: DateTime<Utc>,
    method: CostingMethod,
    qty: i64,
    unit_cost_used: String,
    amount: String,
    is_reversal: bool,
    source_layer_id: Option<i64>,
    created_at: DateTime<Utc>,
}

impl TryFrom<AllocationRow> for CogsAllocation {
    type Error = DbError;

    fn try_from(row: AllocationRow) -> DbResult<Self> {
        Ok(CogsAllocation {
            unit_cost_used: Money::parse("unit_cost_used", &row.unit_cost_used)?,
            amount: Money::parse("amount", &row.amount)?,
            id: row.id,
            order_id: row.order_id,
            line_sku: row.line_sku,
            sku: row.sku,
            shipped_at: row.shipped_at,
            method: row.method,
            qty: row.qty,
            is_reversal: row.is_reversal,
            source_layer_id: row.source_layer_id,
            created_at: row.created_at,
        })
    }
}

const SELECT_ALLOCATION: &str = r#"
    SELECT id, order_id, line_sku, sku, shipped_at, method, qty,
           unit_cost_used, amount, is_reversal, source_layer_id, created_at
    FROM cogs_allocations
"#;

fn into_allocations(rows: Vec<AllocationRow>) -> DbResult<Vec<CogsAllocation>> {
    rows.into_iter().map(CogsAllocation::try_from).collect()
}

/// Appends one row.
pub async fn insert(conn: &mut SqliteConnection, allocation: &CogsAllocation) -> DbResult<()> {
    debug!(
        order_id = %allocation.order_id,
        line_sku = %allocation.line_sku,
        sku = %allocation.sku,
        qty = allocation.qty,
        amount = %allocation.amount,
        is_reversal = allocation.is_reversal,
        "Inserting allocation"
    );

    sqlx::query(
        r#"
        INSERT INTO cogs_allocations (
            id, order_id, line_sku, sku, shipped_at, shipped_at_ms, method, qty,
            unit_cost_used, amount, is_reversal, source_layer_id, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
        "#,
    )
    .bind(&allocation.id)
    .bind(&allocation.order_id)
    .bind(&allocation.line_sku)
    .bind(&allocation.sku)
    .bind(allocation.shipped_at)
    .bind(allocation.shipped_at.timestamp_millis())
    .bind(allocation.method)
    .bind(allocation.qty)
    .bind(allocation.unit_cost_used.to_string())
    .bind(allocation.amount.to_string())
    .bind(allocation.is_reversal)
    .bind(allocation.source_layer_id)
    .bind(allocation.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Rows of `order_id` for the given component SKUs, optionally one kind only.
pub async fn for_order_skus(
    conn: &mut SqliteConnection,
    order_id: &str,
    skus: &[String],
    kind: Option<PostingKind>,
) -> DbResult<Vec<CogsAllocation>> {
    if skus.is_empty() {
        return Ok(Vec::new());
    }

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(SELECT_ALLOCATION);
    builder.push(" WHERE order_id = ").push_bind(order_id);

    builder.push(" AND sku IN (");
    let mut separated = builder.separated(", ");
    for sku in skus {
        separated.push_bind(sku);
    }
    separated.push_unseparated(")");

    if let Some(kind) = kind {
        builder
            .push(" AND is_reversal = ")
            .push_bind(kind.is_reversal());
    }

    builder.push(" ORDER BY rowid");

    let rows = builder
        .build_query_as::<AllocationRow>()
        .fetch_all(&mut *conn)
        .await?;

    into_allocations(rows)
}

/// Rows costed for the `line_sku` line of `order_id`, optionally one
/// component and one kind only.
pub async fn for_order_line(
    conn: &mut SqliteConnection,
    order_id: &str,
    line_sku: &str,
    sku: Option<&str>,
    kind: Option<PostingKind>,
) -> DbResult<Vec<CogsAllocation>> {
    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(SELECT_ALLOCATION);
    builder
        .push(" WHERE order_id = ")
        .push_bind(order_id)
        .push(" AND line_sku = ")
        .push_bind(line_sku);

    if let Some(sku) = sku {
        builder.push(" AND sku = ").push_bind(sku);
    }
    if let Some(kind) = kind {
        builder
            .push(" AND is_reversal = ")
            .push_bind(kind.is_reversal());
    }

    builder.push(" ORDER BY rowid");

    let rows = builder
        .build_query_as::<AllocationRow>()
        .fetch_all(&mut *conn)
        .await?;

    into_allocations(rows)
}

/// Every row of an order, sales and reversals, in insertion order.
pub async fn for_order(conn: &mut SqliteConnection, order_id: &str) -> DbResult<Vec<CogsAllocation>> {
    let rows = sqlx::query_as::<_, AllocationRow>(&format!(
        "{SELECT_ALLOCATION} WHERE order_id = ?1 ORDER BY rowid"
    ))
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await?;

    into_allocations(rows)
}

/// Rows with `from <= shipped_at < to`, ordered by `shipped_at`.
pub async fn between(
    conn: &mut SqliteConnection,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> DbResult<Vec<CogsAllocation>> {
    let rows = sqlx::query_as::<_, AllocationRow>(&format!(
        "{SELECT_ALLOCATION} WHERE shipped_at_ms >= ?1 AND shipped_at_ms < ?2 ORDER BY shipped_at_ms, rowid"
    ))
    .bind(from.timestamp_millis())
    .bind(to.timestamp_millis())
    .fetch_all(&mut *conn)
    .await?;

    into_allocations(rows)
}

/// Repository for allocation ledger reads.
#[derive(Debug, Clone)]
pub struct AllocationRepository {
    pool: SqlitePool,
}

impl AllocationRepository {
    /// Creates a new AllocationRepository.
    pub fn new(pool: SqlitePool) -> Self {
        AllocationRepository { pool }
    }

    /// Every row of an order.
    pub async fn for_order(&self, order_id: &str) -> DbResult<Vec<CogsAllocation>> {
        let mut conn = self.pool.acquire().await?;
        for_order(&mut conn, order_id).await
    }

    /// Rows of an order restricted to component SKUs and optionally a kind.
    pub async fn for_order_skus(
        &self,
        order_id: &str,
        skus: &[String],
        kind: Option<PostingKind>,
    ) -> DbResult<Vec<CogsAllocation>> {
        let mut conn = self.pool.acquire().await?;
        for_order_skus(&mut conn, order_id, skus, kind).await
    }

    /// Rows of one order line, optionally one component and kind.
    pub async fn for_order_line(
        &self,
        order_id: &str,
        line_sku: &str,
        sku: Option<&str>,
        kind: Option<PostingKind>,
    ) -> DbResult<Vec<CogsAllocation>> {
        let mut conn = self.pool.acquire().await?;
        for_order_line(&mut conn, order_id, line_sku, sku, kind).await
    }

    /// Rows shipped (or returned) in `[from, to)`.
    pub async fn between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DbResult<Vec<CogsAllocation>> {
        let mut conn = self.pool.acquire().await?;
        between(&mut conn, from, to).await
    }

    /// Total number of rows in the ledger.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cogs_allocations")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
