//! # Moving-Average Allocator
//!
//! Costs sales from a SKU's cost snapshot and blends receipts into it.
//!
//! ## Snapshot Arithmetic
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  receive 100 @ 20   qty 100   value 2000   avg 20                       │
//! │  receive 100 @ 30   qty 200   value 5000   avg 25   (weighted blend)    │
//! │  sell     50        qty 150   value 3750   avg 25   (avg unchanged)     │
//! │  return   50 @ 25   qty 200   value 5000   avg 25   (original cost)     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A sale removes `qty * avg` where `avg` is the rounded average read before
//! the sale, and the allocation records that same figure. A return adds back
//! `qty * unit_cost_used`, so sale then full return is exact unless the sale
//! emptied the position; that sale drops the rounding residue, and the return
//! brings back `qty * unit_cost_used` only.

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{AllocationDraft, CostSnapshot};
use crate::validation::validate_quantity;

/// Draft and post-sale snapshot for one AVG draw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvgPlan {
    pub draft: AllocationDraft,
    /// Snapshot after the sale.
    pub snapshot: CostSnapshot,
}

/// Plans an AVG sale of `qty` units from `snapshot`.
///
/// ## Errors
/// - `Validation` when `qty <= 0`
/// - `InsufficientStock` when `on_hand_qty < qty`
pub fn allocate_avg(snapshot: &CostSnapshot, qty: i64) -> CoreResult<AvgPlan> {
    validate_quantity("qty", qty)?;

    if snapshot.on_hand_qty < qty {
        return Err(CoreError::InsufficientStock {
            sku: snapshot.sku.clone(),
            requested: qty,
            available: snapshot.on_hand_qty,
        });
    }

    let avg = snapshot.avg_unit_cost();
    let remaining_qty = snapshot.on_hand_qty - qty;

    // Emptying the position drops any rounding residue with it.
    let remaining_value = if remaining_qty == 0 {
        Money::ZERO
    } else {
        (snapshot.on_hand_value - avg.multiply_quantity(qty)).non_negative()
    };

    Ok(AvgPlan {
        draft: AllocationDraft {
            sku: snapshot.sku.clone(),
            qty,
            unit_cost: avg,
            source_layer_id: None,
        },
        snapshot: CostSnapshot {
            sku: snapshot.sku.clone(),
            on_hand_qty: remaining_qty,
            on_hand_value: remaining_value,
        },
    })
}

/// Blends a receipt of `qty` units at `unit_cost` into the snapshot.
///
/// From an empty position the average becomes exactly `unit_cost`.
pub fn receive_into_snapshot(snapshot: &CostSnapshot, qty: i64, unit_cost: Money) -> CostSnapshot {
    let incoming = unit_cost.multiply_quantity(qty);

    let on_hand_value = if snapshot.on_hand_qty == 0 {
        incoming
    } else {
        snapshot.on_hand_value + incoming
    };

    CostSnapshot {
        sku: snapshot.sku.clone(),
        on_hand_qty: snapshot.on_hand_qty + qty,
        on_hand_value,
    }
}

/// Credits returned units back at the cost they were sold at.
pub fn credit_snapshot(snapshot: &CostSnapshot, qty: i64, unit_cost: Money) -> CostSnapshot {
    CostSnapshot {
        sku: snapshot.sku.clone(),
        on_hand_qty: snapshot.on_hand_qty + qty,
        on_hand_value: snapshot.on_hand_value + unit_cost.multiply_quantity(qty),
    }
}

/// Withdraws a receipt's contribution (voided layer).
///
/// ## Errors
/// - `InsufficientStock` when the snapshot no longer holds `qty` units
pub fn withdraw_from_snapshot(
    snapshot: &CostSnapshot,
    qty: i64,
    unit_cost: Money,
) -> CoreResult<CostSnapshot> {
    if snapshot.on_hand_qty < qty {
        return Err(CoreError::InsufficientStock {
            sku: snapshot.sku.clone(),
            requested: qty,
            available: snapshot.on_hand_qty,
        });
    }

    let on_hand_qty = snapshot.on_hand_qty - qty;
    let on_hand_value = if on_hand_qty == 0 {
        Money::ZERO
    } else {
        (snapshot.on_hand_value - unit_cost.multiply_quantity(qty)).non_negative()
    };

    Ok(CostSnapshot {
        sku: snapshot.sku.clone(),
        on_hand_qty,
        on_hand_value,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn weighted() -> CostSnapshot {
        let s = CostSnapshot::empty("MUG");
        let s = receive_into_snapshot(&s, 100, Money::from_major(20));
        receive_into_snapshot(&s, 100, Money::from_major(30))
    }

    #[test]
    fn test_weighted_blend() {
        let s = weighted();
        assert_eq!(s.on_hand_qty, 200);
        assert_eq!(s.on_hand_value, Money::from_major(5000));
        assert_eq!(s.avg_unit_cost(), Money::from_major(25));
    }

    #[test]
    fn test_sale_uses_current_average_and_keeps_it() {
        let plan = allocate_avg(&weighted(), 50).unwrap();

        assert_eq!(plan.draft.unit_cost, Money::from_major(25));
        assert_eq!(plan.draft.amount(), Money::from_major(1250));
        assert_eq!(plan.draft.source_layer_id, None);
        assert_eq!(plan.snapshot.on_hand_qty, 150);
        assert_eq!(plan.snapshot.on_hand_value, Money::from_major(3750));
        assert_eq!(plan.snapshot.avg_unit_cost(), Money::from_major(25));
    }

    #[test]
    fn test_first_receipt_sets_exact_average() {
        let s = receive_into_snapshot(&CostSnapshot::empty("MUG"), 7, Money::from_minor(1234));
        assert_eq!(s.avg_unit_cost(), Money::from_minor(1234));
    }

    #[test]
    fn test_shortage() {
        let err = allocate_avg(&weighted(), 201).unwrap_err();
        assert_eq!(
            err,
            CoreError::InsufficientStock {
                sku: "MUG".to_string(),
                requested: 201,
                available: 200,
            }
        );
    }

    #[test]
    fn test_selling_everything_clears_residue() {
        // 100 / 3 does not divide evenly.
        let s = receive_into_snapshot(&CostSnapshot::empty("MUG"), 3, Money::parse("c", "33.3333334").unwrap());
        let plan = allocate_avg(&s, 3).unwrap();
        assert_eq!(plan.snapshot.on_hand_qty, 0);
        assert_eq!(plan.snapshot.on_hand_value, Money::ZERO);
    }

    #[test]
    fn test_sale_then_return_restores_snapshot_exactly() {
        let before = weighted();
        let plan = allocate_avg(&before, 37).unwrap();
        let after = credit_snapshot(&plan.snapshot, 37, plan.draft.unit_cost);
        assert_eq!(after, before);
    }

    #[test]
    fn test_uneven_average_round_trip_is_exact() {
        let s = receive_into_snapshot(&CostSnapshot::empty("MUG"), 3, Money::from_major(10));
        let s = receive_into_snapshot(&s, 4, Money::from_major(11));
        // 74 / 7 = 10.571428... rounded to 10.571429
        let plan = allocate_avg(&s, 2).unwrap();
        assert_eq!(plan.draft.unit_cost.to_string(), "10.571429");
        let restored = credit_snapshot(&plan.snapshot, 2, plan.draft.unit_cost);
        assert_eq!(restored, s);
    }

    #[test]
    fn test_sell_out_then_full_return_values_at_cost_used() {
        let s = receive_into_snapshot(&CostSnapshot::empty("MUG"), 1, Money::from_major(1));
        let s = receive_into_snapshot(&s, 2, Money::parse("c", "1.5").unwrap());
        assert_eq!(s.on_hand_value, Money::from_major(4));

        let plan = allocate_avg(&s, 3).unwrap();
        assert_eq!(plan.draft.unit_cost.to_string(), "1.333333");
        assert_eq!(plan.snapshot.on_hand_value, Money::ZERO);

        let restored = credit_snapshot(&plan.snapshot, 3, plan.draft.unit_cost);
        assert_eq!(restored.on_hand_qty, 3);
        assert_eq!(restored.on_hand_value, Money::parse("v", "3.999999").unwrap());
    }

    #[test]
    fn test_withdraw_voided_receipt() {
        let s = weighted();
        let s = withdraw_from_snapshot(&s, 100, Money::from_major(30)).unwrap();
        assert_eq!(s.on_hand_qty, 100);
        assert_eq!(s.avg_unit_cost(), Money::from_major(20));

        assert!(withdraw_from_snapshot(&s, 101, Money::from_major(1)).is_err());
    }
}
