//! # Domain Types
//!
//! Core domain types used throughout the costing engine.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌──────────────────┐   ┌─────────────────┐      │
//! │  │      Item       │   │ BundleComponent  │   │  ReceiptLayer   │      │
//! │  │  ─────────────  │   │  ──────────────  │   │  ─────────────  │      │
//! │  │  sku (key)      │◄──│  bundle_sku      │   │  id (rowid)     │      │
//! │  │  display_name   │◄──│  component_sku   │   │  received_at    │      │
//! │  │  is_bundle      │   │  qty_per_bundle  │   │  qty_remaining  │      │
//! │  │  default cost   │   └──────────────────┘   │  unit_cost      │      │
//! │  └─────────────────┘                          │  voided         │      │
//! │                                               └────────┬────────┘      │
//! │  ┌─────────────────┐                                   │ source_layer  │
//! │  │  CostSnapshot   │   ┌──────────────────────────────▼─────────┐      │
//! │  │  ─────────────  │   │           CogsAllocation               │      │
//! │  │  on_hand_qty    │   │  order_id, sku (component), method     │      │
//! │  │  on_hand_value  │   │  qty (+sale / -reversal), unit cost    │      │
//! │  │  avg (derived)  │   │  amount, is_reversal                   │      │
//! │  └─────────────────┘   └────────────────────────────────────────┘      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Allocations are append-only: a reversal is a new row, never an edit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;
use uuid::Uuid;

use crate::error::ValidationError;
use crate::money::Money;

// =============================================================================
// Costing Method
// =============================================================================

/// How a component's cost is determined at sale time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "UPPERCASE")]
pub enum CostingMethod {
    /// Oldest receipt layers are consumed first.
    #[default]
    Fifo,
    /// Weighted moving average held in the cost snapshot.
    Avg,
}

impl fmt::Display for CostingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CostingMethod::Fifo => write!(f, "FIFO"),
            CostingMethod::Avg => write!(f, "AVG"),
        }
    }
}

impl FromStr for CostingMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fifo" => Ok(CostingMethod::Fifo),
            "avg" | "average" | "moving_average" => Ok(CostingMethod::Avg),
            other => Err(ValidationError::InvalidFormat {
                field: "method".to_string(),
                reason: format!("unknown costing method '{}', expected fifo or avg", other),
            }),
        }
    }
}

// =============================================================================
// Layer Source
// =============================================================================

/// Where a receipt layer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LayerSource {
    /// Stock counted when the ledger was first seeded.
    OpeningBalance,
    /// A stock-in document from the receiving flow.
    StockIn,
}

// =============================================================================
// Posting Kind
// =============================================================================

/// Which side of the ledger a costing attempt posts to.
///
/// Used as part of the idempotency key `(order_id, sku, kind)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PostingKind {
    Sale,
    Reversal,
}

impl PostingKind {
    #[inline]
    pub const fn is_reversal(&self) -> bool {
        matches!(self, PostingKind::Reversal)
    }
}

// =============================================================================
// Item
// =============================================================================

/// A catalog entry. Identity and the bundle flag never change after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Item {
    /// Stock Keeping Unit - business key.
    pub sku: String,

    /// Name shown on reports.
    pub display_name: String,

    /// Fulfilled by shipping its components; never holds inventory.
    pub is_bundle: bool,

    /// Fallback unit cost for receipts that arrive without one.
    pub default_unit_cost: Money,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Bundle Component
// =============================================================================

/// One row of a bundle definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BundleComponent {
    pub bundle_sku: String,
    pub component_sku: String,
    /// Units of the component shipped per unit of the bundle (> 0).
    pub quantity_per_bundle: i64,
}

/// A component SKU and the quantity a sale or return needs of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ComponentDemand {
    pub sku: String,
    pub qty: i64,
}

// =============================================================================
// Receipt Layer
// =============================================================================

/// A batch of received stock with its own cost (FIFO layer).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReceiptLayer {
    /// Insertion-ordered id; breaks `received_at` ties.
    pub id: i64,
    pub sku: String,
    #[ts(as = "String")]
    pub received_at: DateTime<Utc>,
    pub qty_received: i64,
    pub qty_remaining: i64,
    pub unit_cost: Money,
    pub source_type: LayerSource,
    pub source_ref: Option<String>,
    /// Soft delete: excluded from FIFO consumption and on-hand totals.
    pub voided: bool,
}

impl ReceiptLayer {
    /// Whether FIFO may draw from this layer.
    #[inline]
    pub fn is_available(&self) -> bool {
        !self.voided && self.qty_remaining > 0
    }

    /// Units already drawn by sales (and not credited back).
    #[inline]
    pub fn qty_consumed(&self) -> i64 {
        self.qty_received - self.qty_remaining
    }
}

/// A compare-and-set update of one layer's `qty_remaining`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerUpdate {
    pub layer_id: i64,
    /// Value read when the plan was made; the write fails if it changed.
    pub expected_remaining: i64,
    pub new_remaining: i64,
}

// =============================================================================
// Cost Snapshot
// =============================================================================

/// Running moving-average position of one SKU.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CostSnapshot {
    pub sku: String,
    pub on_hand_qty: i64,
    /// Carried at full precision.
    pub on_hand_value: Money,
}

impl CostSnapshot {
    /// A position with nothing on hand.
    pub fn empty(sku: impl Into<String>) -> Self {
        CostSnapshot {
            sku: sku.into(),
            on_hand_qty: 0,
            on_hand_value: Money::ZERO,
        }
    }

    /// `on_hand_value / on_hand_qty`, rounded to the unit-cost scale.
    ///
    /// Zero when nothing is on hand.
    pub fn avg_unit_cost(&self) -> Money {
        self.on_hand_value
            .per_unit(self.on_hand_qty)
            .round_unit_cost()
    }
}

// =============================================================================
// Allocation Draft
// =============================================================================

/// Output shared by the FIFO and AVG allocators: one costed slice of a demand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationDraft {
    pub sku: String,
    /// Positive for a sale, negative for a reversal.
    pub qty: i64,
    pub unit_cost: Money,
    /// Set for FIFO, `None` for AVG.
    pub source_layer_id: Option<i64>,
}

impl AllocationDraft {
    /// `qty * unit_cost`, rounded to the currency minor unit.
    pub fn amount(&self) -> Money {
        self.unit_cost.multiply_quantity(self.qty).round_amount()
    }
}

// =============================================================================
// COGS Allocation
// =============================================================================

/// One row of the allocation ledger (system of record for COGS reporting).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CogsAllocation {
    /// UUID v4.
    pub id: String,
    pub order_id: String,
    /// SKU of the order line this row was costed for (the bundle for a
    /// bundle line, otherwise the same as `sku`).
    pub line_sku: String,
    /// The component SKU actually costed (never a bundle).
    pub sku: String,
    /// Shipment date for sales, return date for reversals.
    #[ts(as = "String")]
    pub shipped_at: DateTime<Utc>,
    pub method: CostingMethod,
    pub qty: i64,
    pub unit_cost_used: Money,
    pub amount: Money,
    pub is_reversal: bool,
    pub source_layer_id: Option<i64>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl CogsAllocation {
    /// Materializes a draft into a ledger row.
    pub fn from_draft(
        order_id: &str,
        line_sku: &str,
        shipped_at: DateTime<Utc>,
        method: CostingMethod,
        kind: PostingKind,
        draft: &AllocationDraft,
    ) -> Self {
        CogsAllocation {
            id: Uuid::new_v4().to_string(),
            order_id: order_id.to_string(),
            line_sku: line_sku.to_string(),
            sku: draft.sku.clone(),
            shipped_at,
            method,
            qty: draft.qty,
            unit_cost_used: draft.unit_cost,
            amount: draft.amount(),
            is_reversal: kind.is_reversal(),
            source_layer_id: draft.source_layer_id,
            created_at: Utc::now(),
        }
    }
}

// =============================================================================
// Feed Events
// =============================================================================

/// "Order shipped" event from the order feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ShipmentEvent {
    pub order_id: String,
    pub sku: String,
    pub qty: i64,
    #[ts(as = "String")]
    pub shipped_at: DateTime<Utc>,
}

/// Return event from the order feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReturnEvent {
    pub order_id: String,
    pub sku: String,
    pub return_qty: i64,
    #[ts(as = "String")]
    pub return_date: DateTime<Utc>,
}

/// Stock-in event from the receiving flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockReceipt {
    pub sku: String,
    pub qty: i64,
    /// `None` falls back to the item's `default_unit_cost`.
    pub unit_cost: Option<Money>,
    #[ts(as = "String")]
    pub received_at: DateTime<Utc>,
    pub source_type: LayerSource,
    pub source_ref: Option<String>,
}

// =============================================================================
// Costing Outcome
// =============================================================================

/// Result of a shipment or return costing call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CostingOutcome {
    pub order_id: String,
    /// The order-line SKU as received (may be a bundle).
    pub sku: String,
    pub allocations: Vec<CogsAllocation>,
    pub total_amount: Money,
    /// True when an earlier call had already posted these rows.
    pub already_applied: bool,
}

impl CostingOutcome {
    pub fn new(
        order_id: &str,
        sku: &str,
        allocations: Vec<CogsAllocation>,
        already_applied: bool,
    ) -> Self {
        let total_amount = allocations.iter().map(|a| a.amount).sum();
        CostingOutcome {
            order_id: order_id.to_string(),
            sku: sku.to_string(),
            allocations,
            total_amount,
            already_applied,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_costing_method_parse_and_display() {
        assert_eq!("fifo".parse::<CostingMethod>().unwrap(), CostingMethod::Fifo);
        assert_eq!(" AVG ".parse::<CostingMethod>().unwrap(), CostingMethod::Avg);
        assert!("lifo".parse::<CostingMethod>().is_err());
        assert_eq!(CostingMethod::Avg.to_string(), "AVG");
        assert_eq!(CostingMethod::default(), CostingMethod::Fifo);
    }

    #[test]
    fn test_snapshot_average_of_empty_position_is_zero() {
        let snapshot = CostSnapshot::empty("MUG-01");
        assert_eq!(snapshot.avg_unit_cost(), Money::ZERO);
    }

    #[test]
    fn test_snapshot_average() {
        let snapshot = CostSnapshot {
            sku: "MUG-01".to_string(),
            on_hand_qty: 200,
            on_hand_value: Money::from_major(5000),
        };
        assert_eq!(snapshot.avg_unit_cost(), Money::from_major(25));
    }

    #[test]
    fn test_layer_availability() {
        let mut layer = ReceiptLayer {
            id: 1,
            sku: "MUG-01".to_string(),
            received_at: Utc::now(),
            qty_received: 10,
            qty_remaining: 4,
            unit_cost: Money::from_major(3),
            source_type: LayerSource::StockIn,
            source_ref: None,
            voided: false,
        };
        assert!(layer.is_available());
        assert_eq!(layer.qty_consumed(), 6);

        layer.voided = true;
        assert!(!layer.is_available());
    }

    #[test]
    fn test_draft_amount_sign() {
        let sale = AllocationDraft {
            sku: "MUG-01".to_string(),
            qty: 3,
            unit_cost: Money::parse("unit_cost", "0.335").unwrap(),
            source_layer_id: Some(1),
        };
        let reversal = AllocationDraft { qty: -3, ..sale.clone() };
        assert_eq!(sale.amount(), Money::from_minor(100));
        assert_eq!(reversal.amount(), -sale.amount());
    }

    #[test]
    fn test_outcome_total() {
        let now = Utc::now();
        let draft = AllocationDraft {
            sku: "MUG-01".to_string(),
            qty: 2,
            unit_cost: Money::from_major(5),
            source_layer_id: None,
        };
        let row = CogsAllocation::from_draft(
            "SO-1",
            "MUG-01",
            now,
            CostingMethod::Avg,
            PostingKind::Sale,
            &draft,
        );
        let outcome = CostingOutcome::new("SO-1", "MUG-01", vec![row.clone(), row], false);
        assert_eq!(outcome.total_amount, Money::from_major(20));
        assert!(!outcome.allocations[0].is_reversal);
    }
}
