//! # Return Reversal
//!
//! Plans the negative allocations that undo a sale's COGS when goods come
//! back, and the stock credits that go with them.
//!
//! ## Apportionment
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Sale of order #1001:  100 @ 10 from L1,  20 @ 15 from L2               │
//! │                                                                         │
//! │  Return 60 units:                                                       │
//! │     L1 share  60 × 100/120 = 50   ──► -50 @ 10, L1 += 50                │
//! │     L2 share  60 ×  20/120 = 10   ──► -10 @ 15, L2 += 10                │
//! │                                                                         │
//! │  Not a fresh FIFO draw: the credit goes back to the layers the sale     │
//! │  came from, in the sale's proportions, at the sale's unit costs.        │
//! │  Integer remainders go to the largest fractional share, oldest first.   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeMap;

use crate::average::credit_snapshot;
use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{
    AllocationDraft, CogsAllocation, ComponentDemand, CostSnapshot, CostingMethod, LayerUpdate,
    ReceiptLayer,
};
use crate::validation::validate_quantity;

/// Drafts and stock credits for one component's return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReversalPlan {
    /// Negative-quantity drafts.
    pub drafts: Vec<AllocationDraft>,
    /// FIFO layer credits (empty for AVG).
    pub layer_updates: Vec<LayerUpdate>,
    /// Snapshot after the credit (AVG only).
    pub snapshot: Option<CostSnapshot>,
}

/// A costed slice of the original sale that can still be returned.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Source {
    layer_id: Option<i64>,
    unit_cost: Money,
    net_qty: i64,
}

/// Net quantity still recognized as sold: sales minus earlier reversals.
pub fn net_allocated(prior: &[CogsAllocation]) -> i64 {
    prior.iter().map(|a| a.qty).sum::<i64>().max(0)
}

/// Splits `total` across `weights` proportionally with integer shares.
///
/// Shares sum to exactly `total` and never exceed their weight when
/// `total <= sum(weights)`. Remainders go to the largest fractional parts,
/// earliest index first.
pub fn apportion(total: i64, weights: &[i64]) -> Vec<i64> {
    let weight_sum: i64 = weights.iter().sum();
    if weight_sum <= 0 {
        return vec![0; weights.len()];
    }
    if total == weight_sum {
        return weights.to_vec();
    }

    let mut shares = Vec::with_capacity(weights.len());
    let mut remainders = Vec::with_capacity(weights.len());
    for (idx, &w) in weights.iter().enumerate() {
        let scaled = total as i128 * w as i128;
        shares.push((scaled / weight_sum as i128) as i64);
        remainders.push((scaled % weight_sum as i128, idx));
    }

    let mut leftover = total - shares.iter().sum::<i64>();
    remainders.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    for (rem, idx) in remainders {
        if leftover == 0 || rem == 0 {
            break;
        }
        shares[idx] += 1;
        leftover -= 1;
    }

    shares
}

/// Component quantities to reverse when `return_qty` of an order line comes
/// back.
///
/// `sale_rows` are the line's sale rows and `line_qty` the quantity the sale
/// was posted for. Each component gets `sold * return_qty / line_qty`, so a
/// bundle line is reversed through exactly the components its sale costed.
/// Output is sorted by component SKU.
///
/// ## Errors
/// - `AlreadyReversed` when the line has no sale rows or `return_qty`
///   exceeds `line_qty`
/// - `LedgerInconsistent` when a component's sold quantity does not split
///   evenly across the line
pub fn split_return(
    order_id: &str,
    line_sku: &str,
    line_qty: i64,
    return_qty: i64,
    sale_rows: &[CogsAllocation],
) -> CoreResult<Vec<ComponentDemand>> {
    validate_quantity("return_qty", return_qty)?;

    let mut sold: BTreeMap<&str, i64> = BTreeMap::new();
    for row in sale_rows.iter().filter(|a| !a.is_reversal) {
        *sold.entry(row.sku.as_str()).or_insert(0) += row.qty;
    }

    if sold.is_empty() || line_qty <= 0 {
        return Err(CoreError::AlreadyReversed {
            order_id: order_id.to_string(),
            sku: line_sku.to_string(),
            requested: return_qty,
            allocated: 0,
        });
    }
    if return_qty > line_qty {
        return Err(CoreError::AlreadyReversed {
            order_id: order_id.to_string(),
            sku: line_sku.to_string(),
            requested: return_qty,
            allocated: line_qty,
        });
    }

    sold.into_iter()
        .map(|(sku, sold_qty)| {
            let scaled = sold_qty as i128 * return_qty as i128;
            if scaled % line_qty as i128 != 0 {
                return Err(CoreError::LedgerInconsistent {
                    sku: sku.to_string(),
                    reason: format!(
                        "{} units sold on {} line {} do not split over {} line units",
                        sold_qty, order_id, line_sku, line_qty
                    ),
                });
            }
            Ok(ComponentDemand {
                sku: sku.to_string(),
                qty: (scaled / line_qty as i128) as i64,
            })
        })
        .collect()
}

/// Groups the order's rows for one component into returnable sources.
fn returnable_sources(prior: &[CogsAllocation]) -> Vec<Source> {
    let mut sources: Vec<Source> = Vec::new();

    for row in prior.iter().filter(|a| !a.is_reversal) {
        match sources
            .iter_mut()
            .find(|s| s.layer_id == row.source_layer_id && s.unit_cost == row.unit_cost_used)
        {
            Some(source) => source.net_qty += row.qty,
            None => sources.push(Source {
                layer_id: row.source_layer_id,
                unit_cost: row.unit_cost_used,
                net_qty: row.qty,
            }),
        }
    }

    for row in prior.iter().filter(|a| a.is_reversal) {
        if let Some(source) = sources
            .iter_mut()
            .find(|s| s.layer_id == row.source_layer_id && s.unit_cost == row.unit_cost_used)
        {
            // Reversal rows carry negative quantities.
            source.net_qty += row.qty;
        }
    }

    sources.retain(|s| s.net_qty > 0);
    sources
}

/// Plans the reversal of `return_qty` units of component `sku` on `order_id`.
///
/// `prior` holds every allocation row of the order for `sku`. For FIFO,
/// `layers` must contain the layers those rows reference; for AVG,
/// `snapshot` is the SKU's current snapshot (`None` if it has none yet).
///
/// ## Errors
/// - `AlreadyReversed` when `return_qty` exceeds the net allocated quantity
///   (including when nothing was ever allocated)
/// - `MethodMismatch` when the sale was costed with another method
/// - `LedgerInconsistent` when a credit would break a layer's bounds
pub fn plan_reversal(
    order_id: &str,
    sku: &str,
    return_qty: i64,
    method: CostingMethod,
    prior: &[CogsAllocation],
    layers: &[ReceiptLayer],
    snapshot: Option<&CostSnapshot>,
) -> CoreResult<ReversalPlan> {
    validate_quantity("return_qty", return_qty)?;

    let sale_rows: Vec<&CogsAllocation> = prior.iter().filter(|a| !a.is_reversal).collect();
    let Some(first_sale) = sale_rows.first() else {
        return Err(CoreError::AlreadyReversed {
            order_id: order_id.to_string(),
            sku: sku.to_string(),
            requested: return_qty,
            allocated: 0,
        });
    };

    if first_sale.method != method {
        return Err(CoreError::MethodMismatch {
            order_id: order_id.to_string(),
            sku: sku.to_string(),
            recorded: first_sale.method.to_string(),
            requested: method.to_string(),
        });
    }

    let sources = returnable_sources(prior);
    let allocated: i64 = sources.iter().map(|s| s.net_qty).sum();
    if return_qty > allocated {
        return Err(CoreError::AlreadyReversed {
            order_id: order_id.to_string(),
            sku: sku.to_string(),
            requested: return_qty,
            allocated,
        });
    }

    let weights: Vec<i64> = sources.iter().map(|s| s.net_qty).collect();
    let shares = apportion(return_qty, &weights);

    let mut drafts = Vec::new();
    let mut credits: BTreeMap<i64, i64> = BTreeMap::new();
    let mut credited_snapshot = match method {
        CostingMethod::Avg => Some(
            snapshot
                .cloned()
                .unwrap_or_else(|| CostSnapshot::empty(sku)),
        ),
        CostingMethod::Fifo => None,
    };

    for (source, share) in sources.iter().zip(shares) {
        if share == 0 {
            continue;
        }

        drafts.push(AllocationDraft {
            sku: sku.to_string(),
            qty: -share,
            unit_cost: source.unit_cost,
            source_layer_id: source.layer_id,
        });

        match method {
            CostingMethod::Fifo => {
                let layer_id = source.layer_id.ok_or_else(|| CoreError::LedgerInconsistent {
                    sku: sku.to_string(),
                    reason: format!("FIFO allocation on order {} has no source layer", order_id),
                })?;
                *credits.entry(layer_id).or_insert(0) += share;
            }
            CostingMethod::Avg => {
                if let Some(current) = credited_snapshot.as_ref() {
                    credited_snapshot = Some(credit_snapshot(current, share, source.unit_cost));
                }
            }
        }
    }

    let mut layer_updates = Vec::with_capacity(credits.len());
    for (layer_id, credit) in credits {
        let layer = layers
            .iter()
            .find(|l| l.id == layer_id)
            .ok_or_else(|| CoreError::LedgerInconsistent {
                sku: sku.to_string(),
                reason: format!("source layer {} not found", layer_id),
            })?;

        let new_remaining = layer.qty_remaining + credit;
        if new_remaining > layer.qty_received {
            return Err(CoreError::LedgerInconsistent {
                sku: sku.to_string(),
                reason: format!(
                    "crediting {} to layer {} exceeds qty_received {} (remaining {})",
                    credit, layer_id, layer.qty_received, layer.qty_remaining
                ),
            });
        }

        layer_updates.push(LayerUpdate {
            layer_id,
            expected_remaining: layer.qty_remaining,
            new_remaining,
        });
    }

    Ok(ReversalPlan {
        drafts,
        layer_updates,
        snapshot: credited_snapshot,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LayerSource, PostingKind};
    use chrono::Utc;

    fn sale(layer: Option<i64>, qty: i64, cost: i64, method: CostingMethod) -> CogsAllocation {
        let draft = AllocationDraft {
            sku: "MUG".to_string(),
            qty,
            unit_cost: Money::from_major(cost),
            source_layer_id: layer,
        };
        CogsAllocation::from_draft("SO-1", "MUG", Utc::now(), method, PostingKind::Sale, &draft)
    }

    fn layer(id: i64, received: i64, remaining: i64, cost: i64) -> ReceiptLayer {
        ReceiptLayer {
            id,
            sku: "MUG".to_string(),
            received_at: Utc::now(),
            qty_received: received,
            qty_remaining: remaining,
            unit_cost: Money::from_major(cost),
            source_type: LayerSource::StockIn,
            source_ref: None,
            voided: false,
        }
    }

    #[test]
    fn test_apportion_exact_and_proportional() {
        assert_eq!(apportion(120, &[100, 20]), vec![100, 20]);
        assert_eq!(apportion(60, &[100, 20]), vec![50, 10]);
        assert_eq!(apportion(1, &[1, 1]), vec![1, 0]);
        assert_eq!(apportion(2, &[1, 1, 1]), vec![1, 1, 0]);
        assert_eq!(apportion(0, &[5, 5]), vec![0, 0]);

        let shares = apportion(7, &[3, 5, 11]);
        assert_eq!(shares.iter().sum::<i64>(), 7);
        assert!(shares.iter().zip([3, 5, 11]).all(|(s, w)| *s <= w));
    }

    #[test]
    fn test_full_fifo_return_credits_original_layers() {
        let prior = vec![
            sale(Some(1), 100, 10, CostingMethod::Fifo),
            sale(Some(2), 20, 15, CostingMethod::Fifo),
        ];
        let layers = vec![layer(1, 100, 0, 10), layer(2, 50, 30, 15)];

        let plan =
            plan_reversal("SO-1", "MUG", 120, CostingMethod::Fifo, &prior, &layers, None).unwrap();

        assert_eq!(plan.drafts.len(), 2);
        assert_eq!(plan.drafts[0].qty, -100);
        assert_eq!(plan.drafts[1].qty, -20);

        let reversed: Money = plan.drafts.iter().map(|d| d.amount()).sum();
        let original: Money = prior.iter().map(|a| a.amount).sum();
        assert_eq!(reversed, -original);

        assert_eq!(plan.layer_updates[0].new_remaining, 100);
        assert_eq!(plan.layer_updates[1].new_remaining, 50);
        assert!(plan.snapshot.is_none());
    }

    #[test]
    fn test_partial_fifo_return_is_proportional() {
        let prior = vec![
            sale(Some(1), 100, 10, CostingMethod::Fifo),
            sale(Some(2), 20, 15, CostingMethod::Fifo),
        ];
        let layers = vec![layer(1, 100, 0, 10), layer(2, 50, 30, 15)];

        let plan =
            plan_reversal("SO-1", "MUG", 60, CostingMethod::Fifo, &prior, &layers, None).unwrap();

        assert_eq!(plan.drafts[0].qty, -50);
        assert_eq!(plan.drafts[1].qty, -10);
        assert_eq!(plan.layer_updates[0].new_remaining, 50);
        assert_eq!(plan.layer_updates[1].new_remaining, 40);
    }

    #[test]
    fn test_avg_return_uses_original_cost() {
        let prior = vec![sale(None, 50, 25, CostingMethod::Avg)];
        let snapshot = CostSnapshot {
            sku: "MUG".to_string(),
            on_hand_qty: 150,
            on_hand_value: Money::from_major(3750),
        };

        let plan = plan_reversal(
            "SO-1",
            "MUG",
            50,
            CostingMethod::Avg,
            &prior,
            &[],
            Some(&snapshot),
        )
        .unwrap();

        let after = plan.snapshot.unwrap();
        assert_eq!(after.on_hand_qty, 200);
        assert_eq!(after.on_hand_value, Money::from_major(5000));
        assert_eq!(plan.drafts[0].amount(), Money::from_major(-1250));
        assert!(plan.layer_updates.is_empty());
    }

    #[test]
    fn test_return_more_than_sold() {
        let prior = vec![sale(Some(1), 5, 10, CostingMethod::Fifo)];
        let layers = vec![layer(1, 10, 5, 10)];
        let err =
            plan_reversal("SO-1", "MUG", 6, CostingMethod::Fifo, &prior, &layers, None).unwrap_err();
        assert!(matches!(
            err,
            CoreError::AlreadyReversed {
                requested: 6,
                allocated: 5,
                ..
            }
        ));
    }

    #[test]
    fn test_return_without_sale() {
        let err = plan_reversal("SO-1", "MUG", 1, CostingMethod::Fifo, &[], &[], None).unwrap_err();
        assert!(matches!(err, CoreError::AlreadyReversed { allocated: 0, .. }));
    }

    #[test]
    fn test_earlier_reversals_reduce_returnable_quantity() {
        let sold = sale(Some(1), 10, 10, CostingMethod::Fifo);
        let mut reversed = sale(Some(1), -4, 10, CostingMethod::Fifo);
        reversed.is_reversal = true;
        let prior = vec![sold, reversed];
        assert_eq!(net_allocated(&prior), 6);

        let layers = vec![layer(1, 10, 4, 10)];
        assert!(plan_reversal("SO-1", "MUG", 7, CostingMethod::Fifo, &prior, &layers, None).is_err());
        let plan =
            plan_reversal("SO-1", "MUG", 6, CostingMethod::Fifo, &prior, &layers, None).unwrap();
        assert_eq!(plan.layer_updates[0].new_remaining, 10);
    }

    #[test]
    fn test_split_return_follows_sold_components() {
        // 3 boxes of MUG × 1 + TEA × 2, TEA drawn from two layers.
        let mut rows = vec![sale(Some(1), 3, 10, CostingMethod::Fifo)];
        for (layer, qty) in [(2, 4), (3, 2)] {
            let mut tea = sale(Some(layer), qty, 5, CostingMethod::Fifo);
            tea.sku = "TEA".to_string();
            rows.push(tea);
        }

        let demands = split_return("SO-1", "BOX", 3, 2, &rows).unwrap();
        assert_eq!(
            demands,
            vec![
                ComponentDemand { sku: "MUG".to_string(), qty: 2 },
                ComponentDemand { sku: "TEA".to_string(), qty: 4 },
            ]
        );

        // A ledger that no longer splits evenly is not guessed at.
        rows.pop();
        let err = split_return("SO-1", "BOX", 3, 2, &rows).unwrap_err();
        assert!(matches!(err, CoreError::LedgerInconsistent { ref sku, .. } if sku == "TEA"));
    }

    #[test]
    fn test_split_return_partial_and_over_return() {
        let rows = vec![sale(Some(1), 6, 10, CostingMethod::Fifo)];

        let demands = split_return("SO-1", "BOX", 2, 1, &rows).unwrap();
        assert_eq!(demands[0].qty, 3);

        let err = split_return("SO-1", "BOX", 2, 3, &rows).unwrap_err();
        assert!(matches!(
            err,
            CoreError::AlreadyReversed {
                requested: 3,
                allocated: 2,
                ..
            }
        ));

        let err = split_return("SO-1", "BOX", 2, 1, &[]).unwrap_err();
        assert!(matches!(err, CoreError::AlreadyReversed { allocated: 0, .. }));
    }

    #[test]
    fn test_method_mismatch() {
        let prior = vec![sale(None, 5, 10, CostingMethod::Avg)];
        let err = plan_reversal("SO-1", "MUG", 5, CostingMethod::Fifo, &prior, &[], None).unwrap_err();
        assert!(matches!(err, CoreError::MethodMismatch { .. }));
    }

    #[test]
    fn test_credit_beyond_received_is_inconsistent() {
        let prior = vec![sale(Some(1), 5, 10, CostingMethod::Fifo)];
        // Layer claims nothing was consumed.
        let layers = vec![layer(1, 10, 10, 10)];
        let err =
            plan_reversal("SO-1", "MUG", 5, CostingMethod::Fifo, &prior, &layers, None).unwrap_err();
        assert!(matches!(err, CoreError::LedgerInconsistent { .. }));
    }
}
