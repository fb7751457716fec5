//! # FIFO Allocator
//!
//! Walks a SKU's receipt layers oldest-first and produces one draft per layer
//! touched.
//!
//! ## Layer Walk
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  allocate_fifo("MUG", 120, layers)                                      │
//! │                                                                         │
//! │  L1  day 1   100 left @ 10   take 100  ──► draft 100 @ 10 (L1)          │
//! │  L2  day 5    50 left @ 15   take  20  ──► draft  20 @ 15 (L2)          │
//! │                                                                         │
//! │  total 1300 • L1 0 left • L2 30 left                                    │
//! │                                                                         │
//! │  Ordering key: (received_at ASC, id ASC)                                │
//! │  Skipped:      voided layers, layers with nothing left                  │
//! │  Shortage:     InsufficientStock, nothing planned                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::{CoreError, CoreResult};
use crate::types::{AllocationDraft, LayerUpdate, ReceiptLayer};
use crate::validation::validate_quantity;

/// Drafts and layer updates for one FIFO draw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FifoPlan {
    pub drafts: Vec<AllocationDraft>,
    pub layer_updates: Vec<LayerUpdate>,
}

/// Layers FIFO may consume, in consumption order.
pub fn consumption_order<'a>(sku: &str, layers: &'a [ReceiptLayer]) -> Vec<&'a ReceiptLayer> {
    let mut open: Vec<&ReceiptLayer> = layers
        .iter()
        .filter(|l| l.sku == sku && l.is_available())
        .collect();
    open.sort_by(|a, b| a.received_at.cmp(&b.received_at).then(a.id.cmp(&b.id)));
    open
}

/// Sum of `qty_remaining` over non-voided layers of `sku`.
pub fn available_qty(sku: &str, layers: &[ReceiptLayer]) -> i64 {
    layers
        .iter()
        .filter(|l| l.sku == sku && !l.voided)
        .map(|l| l.qty_remaining)
        .sum()
}

/// Plans a FIFO draw of `qty` units of `sku`.
///
/// Nothing is mutated; the caller applies `layer_updates` in the same
/// transaction that inserts the drafts.
///
/// ## Errors
/// - `Validation` when `qty <= 0`
/// - `InsufficientStock` when the open layers hold less than `qty`
pub fn allocate_fifo(sku: &str, qty: i64, layers: &[ReceiptLayer]) -> CoreResult<FifoPlan> {
    validate_quantity("qty", qty)?;

    let available = available_qty(sku, layers);
    if available < qty {
        return Err(CoreError::InsufficientStock {
            sku: sku.to_string(),
            requested: qty,
            available,
        });
    }

    let mut still_needed = qty;
    let mut drafts = Vec::new();
    let mut layer_updates = Vec::new();

    for layer in consumption_order(sku, layers) {
        if still_needed == 0 {
            break;
        }

        let taken = layer.qty_remaining.min(still_needed);
        still_needed -= taken;

        drafts.push(AllocationDraft {
            sku: sku.to_string(),
            qty: taken,
            unit_cost: layer.unit_cost,
            source_layer_id: Some(layer.id),
        });
        layer_updates.push(LayerUpdate {
            layer_id: layer.id,
            expected_remaining: layer.qty_remaining,
            new_remaining: layer.qty_remaining - taken,
        });
    }

    // available >= qty was checked above, so the walk always completes.
    debug_assert_eq!(still_needed, 0);

    Ok(FifoPlan {
        drafts,
        layer_updates,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Money;
    use crate::types::LayerSource;
    use chrono::{TimeZone, Utc};

    fn layer(id: i64, day: u32, qty: i64, cost: i64) -> ReceiptLayer {
        ReceiptLayer {
            id,
            sku: "MUG".to_string(),
            received_at: Utc.with_ymd_and_hms(2026, 3, day, 9, 0, 0).unwrap(),
            qty_received: qty,
            qty_remaining: qty,
            unit_cost: Money::from_major(cost),
            source_type: LayerSource::StockIn,
            source_ref: None,
            voided: false,
        }
    }

    #[test]
    fn test_spans_layers_oldest_first() {
        // Listed newest first to prove the allocator sorts.
        let layers = vec![layer(2, 5, 50, 15), layer(1, 1, 100, 10)];

        let plan = allocate_fifo("MUG", 120, &layers).unwrap();

        assert_eq!(plan.drafts.len(), 2);
        assert_eq!(plan.drafts[0].qty, 100);
        assert_eq!(plan.drafts[0].unit_cost, Money::from_major(10));
        assert_eq!(plan.drafts[0].source_layer_id, Some(1));
        assert_eq!(plan.drafts[1].qty, 20);
        assert_eq!(plan.drafts[1].unit_cost, Money::from_major(15));
        assert_eq!(plan.drafts[1].source_layer_id, Some(2));

        let total: Money = plan.drafts.iter().map(|d| d.amount()).sum();
        assert_eq!(total, Money::from_major(1300));

        assert_eq!(plan.layer_updates[0].new_remaining, 0);
        assert_eq!(plan.layer_updates[1].new_remaining, 30);
    }

    #[test]
    fn test_ties_on_received_at_break_by_id() {
        let layers = vec![layer(7, 1, 10, 2), layer(3, 1, 10, 1)];
        let plan = allocate_fifo("MUG", 5, &layers).unwrap();
        assert_eq!(plan.drafts[0].source_layer_id, Some(3));
    }

    #[test]
    fn test_skips_voided_and_empty_layers() {
        let mut voided = layer(1, 1, 100, 1);
        voided.voided = true;
        let mut empty = layer(2, 2, 100, 2);
        empty.qty_remaining = 0;
        let layers = vec![voided, empty, layer(3, 3, 10, 3)];

        assert_eq!(available_qty("MUG", &layers), 10);

        let plan = allocate_fifo("MUG", 10, &layers).unwrap();
        assert_eq!(plan.drafts.len(), 1);
        assert_eq!(plan.drafts[0].source_layer_id, Some(3));
    }

    #[test]
    fn test_shortage_reports_requested_and_available() {
        let layers = vec![layer(1, 1, 30, 10), layer(2, 2, 10, 10)];
        let err = allocate_fifo("MUG", 50, &layers).unwrap_err();
        assert_eq!(
            err,
            CoreError::InsufficientStock {
                sku: "MUG".to_string(),
                requested: 50,
                available: 40,
            }
        );
    }

    #[test]
    fn test_ignores_other_skus() {
        let mut other = layer(1, 1, 100, 1);
        other.sku = "PLATE".to_string();
        assert!(allocate_fifo("MUG", 1, &[other]).is_err());
    }

    #[test]
    fn test_zero_quantity_is_invalid() {
        let layers = vec![layer(1, 1, 10, 1)];
        assert!(matches!(
            allocate_fifo("MUG", 0, &layers),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn test_exact_fit_touches_single_layer() {
        let layers = vec![layer(1, 1, 10, 4), layer(2, 2, 10, 5)];
        let plan = allocate_fifo("MUG", 10, &layers).unwrap();
        assert_eq!(plan.layer_updates.len(), 1);
        assert_eq!(plan.layer_updates[0].expected_remaining, 10);
        assert_eq!(plan.layer_updates[0].new_remaining, 0);
    }
}
