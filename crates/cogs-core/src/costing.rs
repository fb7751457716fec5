//! # Costing Strategy
//!
//! One entry point for both costing methods. The engine loads whatever ledger
//! state the method needs, calls [`allocate`], and persists the mutation.
//!
//! ```text
//! CostingMethod::Fifo + SkuLedger::Layers(..)     ──► fifo::allocate_fifo
//! CostingMethod::Avg  + SkuLedger::Snapshot(..)   ──► average::allocate_avg
//! anything else                                   ──► LedgerInconsistent
//! ```

use crate::average::allocate_avg;
use crate::error::{CoreError, CoreResult};
use crate::fifo::allocate_fifo;
use crate::types::{AllocationDraft, ComponentDemand, CostSnapshot, CostingMethod, LayerUpdate, ReceiptLayer};

/// Ledger state of one component SKU as loaded for a costing method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkuLedger {
    /// Receipt layers of the SKU (FIFO).
    Layers(Vec<ReceiptLayer>),
    /// Moving-average snapshot of the SKU (AVG).
    Snapshot(CostSnapshot),
}

impl SkuLedger {
    /// The ledger shape `method` reads.
    pub fn matches(&self, method: CostingMethod) -> bool {
        matches!(
            (self, method),
            (SkuLedger::Layers(_), CostingMethod::Fifo) | (SkuLedger::Snapshot(_), CostingMethod::Avg)
        )
    }
}

/// What must be written back after a component is costed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerMutation {
    /// Compare-and-set updates of layer `qty_remaining`.
    Layers(Vec<LayerUpdate>),
    /// Replacement snapshot.
    Snapshot(CostSnapshot),
}

/// Drafts plus the ledger mutation for one component demand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentPlan {
    pub sku: String,
    pub drafts: Vec<AllocationDraft>,
    pub mutation: LedgerMutation,
}

/// Costs one component demand with `method` against `ledger`.
pub fn allocate(
    method: CostingMethod,
    demand: &ComponentDemand,
    ledger: &SkuLedger,
) -> CoreResult<ComponentPlan> {
    match (method, ledger) {
        (CostingMethod::Fifo, SkuLedger::Layers(layers)) => {
            let plan = allocate_fifo(&demand.sku, demand.qty, layers)?;
            Ok(ComponentPlan {
                sku: demand.sku.clone(),
                drafts: plan.drafts,
                mutation: LedgerMutation::Layers(plan.layer_updates),
            })
        }
        (CostingMethod::Avg, SkuLedger::Snapshot(snapshot)) => {
            if snapshot.sku != demand.sku {
                return Err(CoreError::LedgerInconsistent {
                    sku: demand.sku.clone(),
                    reason: format!("snapshot belongs to {}", snapshot.sku),
                });
            }
            let plan = allocate_avg(snapshot, demand.qty)?;
            Ok(ComponentPlan {
                sku: demand.sku.clone(),
                drafts: vec![plan.draft],
                mutation: LedgerMutation::Snapshot(plan.snapshot),
            })
        }
        (method, _) => Err(CoreError::LedgerInconsistent {
            sku: demand.sku.clone(),
            reason: format!("ledger state does not fit method {}", method),
        }),
    }
}

/// Costs every component of a shipment, or none of them.
///
/// The first failing component aborts the whole plan, so a bundle short on
/// one component posts nothing for the others.
pub fn plan_shipment(
    method: CostingMethod,
    components: &[(ComponentDemand, SkuLedger)],
) -> CoreResult<Vec<ComponentPlan>> {
    components
        .iter()
        .map(|(demand, ledger)| allocate(method, demand, ledger))
        .collect()
}

// =============================================================================
// Unit Tests
// =============================================================================
