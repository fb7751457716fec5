//! # Report Reader
//!
//! Read-only queries for the P&L layer. Nothing here takes a SKU lock or
//! opens a write transaction; WAL mode lets these run beside the engine.
//!
//! Daily buckets use the UTC calendar day of `shipped_at` (the return date
//! for reversal rows).

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::debug;

use cogs_core::{CogsAllocation, Money};

use crate::error::DbResult;
use crate::repository::{allocation, layer, snapshot};

/// COGS posted on one UTC day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyCogs {
    pub day: NaiveDate,
    /// Sum of sale rows (positive).
    pub sale_amount: Money,
    /// Sum of reversal rows (negative or zero).
    pub reversal_amount: Money,
    pub net_amount: Money,
    pub net_qty: i64,
}

/// On-hand position of one SKU under both methods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnHand {
    pub sku: String,
    /// Remaining units across non-voided layers.
    pub layer_qty: i64,
    /// Remaining units valued at their layer cost.
    pub layer_value: Money,
    pub avg_qty: i64,
    pub avg_value: Money,
    pub avg_unit_cost: Money,
}

/// Reader over the allocation ledger and stock positions.
#[derive(Debug, Clone)]
pub struct ReportReader {
    pool: SqlitePool,
}

impl ReportReader {
    /// Creates a new ReportReader.
    pub fn new(pool: SqlitePool) -> Self {
        ReportReader { pool }
    }

    /// Every allocation row of an order, sales then reversals as inserted.
    pub async fn allocations_for_order(&self, order_id: &str) -> DbResult<Vec<CogsAllocation>> {
        let mut conn = self.pool.acquire().await?;
        allocation::for_order(&mut conn, order_id).await
    }

    /// Net COGS charged to an order after returns.
    pub async fn net_cogs_for_order(&self, order_id: &str) -> DbResult<Money> {
        let rows = self.allocations_for_order(order_id).await?;
        Ok(rows.iter().map(|row| row.amount).sum())
    }

    /// Rows with `from <= shipped_at < to`.
    pub async fn allocations_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DbResult<Vec<CogsAllocation>> {
        let mut conn = self.pool.acquire().await?;
        allocation::between(&mut conn, from, to).await
    }

    /// COGS per UTC day in `[from, to)`. Days without rows are omitted.
    pub async fn daily_cogs(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DbResult<Vec<DailyCogs>> {
        let rows = self.allocations_between(from, to).await?;
        debug!(rows = rows.len(), %from, %to, "Building daily COGS");

        Ok(fold_daily(&rows))
    }

    /// Current on-hand position of `sku`.
    pub async fn on_hand(&self, sku: &str) -> DbResult<OnHand> {
        let mut conn = self.pool.acquire().await?;

        let layers = layer::list_for_sku(&mut conn, sku).await?;
        let (layer_qty, layer_value) = layers
            .iter()
            .filter(|l| !l.voided)
            .fold((0_i64, Money::ZERO), |(qty, value), l| {
                (
                    qty + l.qty_remaining,
                    value + l.unit_cost.multiply_quantity(l.qty_remaining),
                )
            });

        let position = snapshot::find(&mut conn, sku).await?;
        let (avg_qty, avg_value, avg_unit_cost) = match position {
            Some(s) => (s.on_hand_qty, s.on_hand_value.round_amount(), s.avg_unit_cost()),
            None => (0, Money::ZERO, Money::ZERO),
        };

        Ok(OnHand {
            sku: sku.to_string(),
            layer_qty,
            layer_value: layer_value.round_amount(),
            avg_qty,
            avg_value,
            avg_unit_cost,
        })
    }
}

fn fold_daily(rows: &[CogsAllocation]) -> Vec<DailyCogs> {
    let mut days: BTreeMap<NaiveDate, DailyCogs> = BTreeMap::new();

    for row in rows {
        let day = row.shipped_at.date_naive();
        let entry = days.entry(day).or_insert_with(|| DailyCogs {
            day,
            sale_amount: Money::ZERO,
            reversal_amount: Money::ZERO,
            net_amount: Money::ZERO,
            net_qty: 0,
        });

        if row.is_reversal {
            entry.reversal_amount += row.amount;
        } else {
            entry.sale_amount += row.amount;
        }
        entry.net_amount += row.amount;
        entry.net_qty += row.qty;
    }

    days.into_values().collect()
}
