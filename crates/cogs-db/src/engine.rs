//! # Costing Engine
//!
//! Orchestrates every write to the costing ledger: shipments, returns,
//! receipts, and catalog administration.
//!
//! ## Shipment Path
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  apply_cogs_for_order_shipped("#1001", "GIFT-BOX", 2, t, FIFO)          │
//! │                                                                         │
//! │  1. validate input                  qty = 0 ──► Validation             │
//! │  2. resolve bundle (pooled read)    [COASTER×4, MUG×2]                 │
//! │  3. lock SKUs, sorted               GIFT-BOX, COASTER, MUG             │
//! │  4. BEGIN IMMEDIATE (write lock before the first read)                  │
//! │  5. re-resolve; definition moved? ──► WriteConflict                    │
//! │  6. sale rows for #1001 ∩ {COASTER, MUG}?  yes ──► return them          │
//! │  7. load ledgers, plan every component (cogs_core::costing)            │
//! │        any shortage ──► InsufficientStock, nothing written              │
//! │  8. claim posting (#1001, GIFT-BOX, sale, qty 2)                        │
//! │        already claimed ──► return committed rows                        │
//! │  9. layer CAS updates / snapshot CAS, insert allocation rows           │
//! │ 10. COMMIT                                                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every failure drops the transaction before anything is committed, so a
//! failed attempt leaves all stores exactly as they were and can be retried.
//!
//! ## Return Path
//! Returns follow the same steps with `PostingKind::Reversal`, except that
//! the components come from the line's sale rows instead of the bundle's
//! current definition: each component gets `sold * return_qty / line_qty`,
//! where `line_qty` is the quantity on the sale posting.

use std::collections::HashMap;
use std::iter;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use tracing::{debug, info, warn};

use cogs_core::average::{receive_into_snapshot, withdraw_from_snapshot};
use cogs_core::bundle;
use cogs_core::costing::{plan_shipment, LedgerMutation, SkuLedger};
use cogs_core::reversal::{plan_reversal, split_return};
use cogs_core::validation::{
    validate_display_name, validate_order_id, validate_quantity, validate_sku, validate_unit_cost,
};
use cogs_core::{
    BundleComponent, CogsAllocation, ComponentDemand, CoreError, CostSnapshot, CostingMethod,
    CostingOutcome, Item, LayerSource, Money, PostingKind, ReceiptLayer, ReturnEvent,
    ShipmentEvent, StockReceipt, ValidationError,
};

use crate::error::{CostingResult, DbError};
use crate::locks::SkuLocks;
use crate::repository::layer::NewLayer;
use crate::repository::{
    allocation, bundle as bundle_rows, item as item_rows, layer as layer_rows, posting,
    snapshot as snapshot_rows,
};

const MAX_SOURCE_REF_LEN: usize = 128;

/// Write-side entry point of the costing ledger.
///
/// Obtain one from [`Database::costing`](crate::pool::Database::costing); all
/// engines built from the same `Database` share its per-SKU locks.
#[derive(Debug, Clone)]
pub struct CostingEngine {
    pool: SqlitePool,
    locks: Arc<SkuLocks>,
    default_method: CostingMethod,
}

impl CostingEngine {
    /// Creates an engine over `pool`, serializing writers through `locks`.
    pub fn new(pool: SqlitePool, locks: Arc<SkuLocks>) -> Self {
        CostingEngine {
            pool,
            locks,
            default_method: CostingMethod::default(),
        }
    }

    /// Sets the method used by [`ship`](Self::ship) and
    /// [`process_return`](Self::process_return).
    pub fn with_default_method(mut self, method: CostingMethod) -> Self {
        self.default_method = method;
        self
    }

    pub fn default_method(&self) -> CostingMethod {
        self.default_method
    }

    /// Opens a transaction that holds SQLite's write lock from its first
    /// statement. A deferred `BEGIN` would take a read snapshot first and
    /// fail with SQLITE_BUSY when upgrading behind another writer.
    async fn begin_write(&self) -> CostingResult<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin_with("BEGIN IMMEDIATE").await?)
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    /// Registers a catalog item. `sku` and `is_bundle` are fixed from here on.
    ///
    /// ## Errors
    /// - `Validation` for a malformed SKU, empty name, or negative cost
    /// - `Storage(UniqueViolation)` when the SKU exists
    pub async fn register_item(
        &self,
        sku: &str,
        display_name: &str,
        is_bundle: bool,
        default_unit_cost: Money,
    ) -> CostingResult<Item> {
        validate_sku(sku)?;
        validate_display_name(display_name)?;
        validate_unit_cost("default_unit_cost", default_unit_cost)?;

        let item = Item {
            sku: sku.trim().to_string(),
            display_name: display_name.trim().to_string(),
            is_bundle,
            default_unit_cost,
            created_at: Utc::now(),
        };

        let mut conn = self.pool.acquire().await?;
        item_rows::insert(&mut conn, &item).await?;

        info!(sku = %item.sku, is_bundle, "Item registered");
        Ok(item)
    }

    /// Replaces the definition of `bundle_sku` with `components`
    /// (`(component_sku, quantity_per_bundle)` pairs).
    ///
    /// Sales already costed keep their component rows; the new definition
    /// applies to shipments costed after this call.
    pub async fn define_bundle(
        &self,
        bundle_sku: &str,
        components: &[(String, i64)],
    ) -> CostingResult<Vec<BundleComponent>> {
        validate_sku(bundle_sku)?;

        let _guards = self.locks.lock_all([bundle_sku]).await;
        let mut tx = self.begin_write().await?;

        let bundle_item = item_rows::find(&mut *tx, bundle_sku)
            .await?
            .ok_or_else(|| CoreError::UnknownSku(bundle_sku.to_string()))?;

        let skus: Vec<String> = components.iter().map(|(sku, _)| sku.clone()).collect();
        let component_items = item_rows::find_many(&mut *tx, &skus).await?;

        let rows = bundle::validate_definition(&bundle_item, components, &component_items)?;
        bundle_rows::replace(&mut *tx, bundle_sku, &rows).await?;

        tx.commit().await?;

        info!(bundle_sku = %bundle_sku, components = rows.len(), "Bundle defined");
        Ok(rows)
    }

    /// Removes one component from a bundle definition.
    pub async fn remove_component(&self, bundle_sku: &str, component_sku: &str) -> CostingResult<()> {
        let _guards = self.locks.lock_all([bundle_sku]).await;
        let mut conn = self.pool.acquire().await?;

        if !bundle_rows::remove(&mut conn, bundle_sku, component_sku).await? {
            return Err(DbError::not_found(
                "BundleComponent",
                format!("{bundle_sku}/{component_sku}"),
            )
            .into());
        }

        info!(bundle_sku = %bundle_sku, component_sku = %component_sku, "Bundle component removed");
        Ok(())
    }

    // =========================================================================
    // Receiving
    // =========================================================================

    /// Records a receipt: one new FIFO layer plus the moving-average blend,
    /// in one transaction.
    ///
    /// ## Errors
    /// - `UnknownSku` / `BundleNotStockable`
    /// - `Validation` for `qty <= 0` or a negative / over-precise unit cost
    pub async fn receive_stock(&self, receipt: &StockReceipt) -> CostingResult<ReceiptLayer> {
        validate_sku(&receipt.sku)?;
        validate_quantity("qty", receipt.qty)?;
        if let Some(source_ref) = &receipt.source_ref {
            if source_ref.len() > MAX_SOURCE_REF_LEN {
                return Err(ValidationError::TooLong {
                    field: "source_ref".to_string(),
                    max: MAX_SOURCE_REF_LEN,
                }
                .into());
            }
        }

        let _guards = self.locks.lock_all([receipt.sku.as_str()]).await;
        let mut tx = self.begin_write().await?;

        let item = item_rows::find(&mut *tx, &receipt.sku)
            .await?
            .ok_or_else(|| CoreError::UnknownSku(receipt.sku.clone()))?;
        if item.is_bundle {
            return Err(CoreError::BundleNotStockable(item.sku).into());
        }

        let unit_cost = receipt.unit_cost.unwrap_or(item.default_unit_cost);
        validate_unit_cost("unit_cost", unit_cost)?;

        let layer_id = layer_rows::insert(
            &mut *tx,
            &NewLayer {
                sku: &item.sku,
                received_at: receipt.received_at,
                qty: receipt.qty,
                unit_cost,
                source_type: receipt.source_type,
                source_ref: receipt.source_ref.as_deref(),
            },
        )
        .await?;

        let stored = snapshot_rows::find(&mut *tx, &item.sku).await?;
        let current = stored.clone().unwrap_or_else(|| CostSnapshot::empty(&item.sku));
        let next = receive_into_snapshot(&current, receipt.qty, unit_cost);
        snapshot_rows::save(&mut *tx, stored.as_ref(), &next).await?;

        let layer = layer_rows::find(&mut *tx, layer_id)
            .await?
            .ok_or_else(|| DbError::not_found("ReceiptLayer", layer_id.to_string()))?;

        tx.commit().await?;

        info!(
            sku = %layer.sku,
            layer_id,
            qty = layer.qty_received,
            unit_cost = %layer.unit_cost,
            avg_unit_cost = %next.avg_unit_cost(),
            "Stock received"
        );
        Ok(layer)
    }

    /// Seeds the opening balance of a SKU (first stock count).
    pub async fn seed_opening_balance(
        &self,
        sku: &str,
        qty: i64,
        unit_cost: Option<Money>,
        as_of: DateTime<Utc>,
    ) -> CostingResult<ReceiptLayer> {
        self.receive_stock(&StockReceipt {
            sku: sku.to_string(),
            qty,
            unit_cost,
            received_at: as_of,
            source_type: LayerSource::OpeningBalance,
            source_ref: None,
        })
        .await
    }

    /// Voids a receipt entered by mistake.
    ///
    /// Only an untouched layer can be voided; its quantity and value are
    /// withdrawn from the moving-average snapshot as well.
    ///
    /// ## Errors
    /// - `LayerNotVoidable` when already voided, partly consumed, or the
    ///   moving-average position no longer holds the layer's units
    pub async fn void_layer(&self, layer_id: i64) -> CostingResult<ReceiptLayer> {
        let sku = {
            let mut conn = self.pool.acquire().await?;
            layer_rows::find(&mut conn, layer_id)
                .await?
                .ok_or_else(|| DbError::not_found("ReceiptLayer", layer_id.to_string()))?
                .sku
        };

        let _guards = self.locks.lock_all([sku.as_str()]).await;
        let mut tx = self.begin_write().await?;

        let layer = layer_rows::find(&mut *tx, layer_id)
            .await?
            .ok_or_else(|| DbError::not_found("ReceiptLayer", layer_id.to_string()))?;

        if layer.voided {
            return Err(CoreError::LayerNotVoidable {
                layer_id,
                reason: "already voided".to_string(),
            }
            .into());
        }
        if layer.qty_consumed() != 0 {
            return Err(CoreError::LayerNotVoidable {
                layer_id,
                reason: format!(
                    "{} of {} units already consumed",
                    layer.qty_consumed(),
                    layer.qty_received
                ),
            }
            .into());
        }

        let stored = snapshot_rows::find(&mut *tx, &layer.sku).await?;
        let current = stored.clone().unwrap_or_else(|| CostSnapshot::empty(&layer.sku));
        let next = withdraw_from_snapshot(&current, layer.qty_received, layer.unit_cost).map_err(
            |_| CoreError::LayerNotVoidable {
                layer_id,
                reason: format!(
                    "moving-average position holds {} units, layer has {}",
                    current.on_hand_qty, layer.qty_received
                ),
            },
        )?;

        if !layer_rows::void(&mut *tx, layer_id).await? {
            return Err(DbError::conflict(
                "ReceiptLayer",
                layer_id.to_string(),
                "layer changed while voiding",
            )
            .into());
        }
        snapshot_rows::save(&mut *tx, stored.as_ref(), &next).await?;

        tx.commit().await?;

        warn!(layer_id, sku = %layer.sku, qty = layer.qty_received, "Receipt layer voided");
        Ok(ReceiptLayer {
            voided: true,
            ..layer
        })
    }

    // =========================================================================
    // Shipments
    // =========================================================================

    /// Costs a shipped order line and records its allocation rows.
    ///
    /// A bundle line is costed through its components; the rows always name
    /// component SKUs. Calling again for the same order and components
    /// returns the rows already written (`already_applied = true`) and
    /// changes nothing.
    ///
    /// ## Errors
    /// - `Validation` for an empty order id or `qty <= 0`
    /// - `UnknownSku`, `NoComponentsDefined`, `NestedBundle`
    /// - `InsufficientStock` for the first component that is short
    /// - `Storage(WriteConflict)` when another process moved the ledger
    pub async fn apply_cogs_for_order_shipped(
        &self,
        order_id: &str,
        sku: &str,
        qty: i64,
        shipped_at: DateTime<Utc>,
        method: CostingMethod,
    ) -> CostingResult<CostingOutcome> {
        validate_order_id(order_id)?;
        validate_sku(sku)?;
        validate_quantity("qty", qty)?;

        let demands = {
            let mut conn = self.pool.acquire().await?;
            resolve_demands(&mut conn, sku, qty).await?
        };
        let component_skus = bundle::component_skus(&demands);

        let _guards = self
            .locks
            .lock_all(component_skus.iter().cloned().chain(iter::once(sku.to_string())))
            .await;
        let mut tx = self.begin_write().await?;

        let demands = confirm_demands(&mut *tx, sku, qty, &component_skus).await?;

        let existing =
            allocation::for_order_skus(&mut *tx, order_id, &component_skus, Some(PostingKind::Sale))
                .await?;
        if !existing.is_empty() {
            if existing.iter().any(|row| row.method != method) {
                warn!(
                    order_id = %order_id,
                    sku = %sku,
                    requested = %method,
                    "Shipment already costed with another method"
                );
            }
            info!(order_id = %order_id, sku = %sku, rows = existing.len(), "Shipment already costed");
            return Ok(CostingOutcome::new(order_id, sku, existing, true));
        }

        let mut stored_snapshots: HashMap<String, Option<CostSnapshot>> = HashMap::new();
        let mut inputs: Vec<(ComponentDemand, SkuLedger)> = Vec::with_capacity(demands.len());
        for demand in demands {
            let ledger = match method {
                CostingMethod::Fifo => {
                    SkuLedger::Layers(layer_rows::open_layers(&mut *tx, &demand.sku).await?)
                }
                CostingMethod::Avg => {
                    let stored = snapshot_rows::find(&mut *tx, &demand.sku).await?;
                    let current = stored
                        .clone()
                        .unwrap_or_else(|| CostSnapshot::empty(&demand.sku));
                    stored_snapshots.insert(demand.sku.clone(), stored);
                    SkuLedger::Snapshot(current)
                }
            };
            inputs.push((demand, ledger));
        }

        let plans = plan_shipment(method, &inputs).map_err(|err| {
            warn!(order_id = %order_id, sku = %sku, qty, method = %method, error = %err, "Shipment not costed");
            err
        })?;

        if let Err(err) =
            posting::claim(&mut *tx, order_id, sku, PostingKind::Sale, method, qty).await
        {
            if err.is_unique_violation() {
                drop(tx);
                return self
                    .committed_outcome(order_id, sku, &component_skus, PostingKind::Sale)
                    .await;
            }
            return Err(err.into());
        }

        let mut rows = Vec::new();
        for plan in &plans {
            match &plan.mutation {
                LedgerMutation::Layers(updates) => {
                    for update in updates {
                        layer_rows::apply_update(&mut *tx, update).await?;
                    }
                }
                LedgerMutation::Snapshot(next) => {
                    let previous = stored_snapshots.get(&plan.sku).cloned().flatten();
                    snapshot_rows::save(&mut *tx, previous.as_ref(), next).await?;
                }
            }

            for draft in &plan.drafts {
                let row = CogsAllocation::from_draft(
                    order_id,
                    sku,
                    shipped_at,
                    method,
                    PostingKind::Sale,
                    draft,
                );
                allocation::insert(&mut *tx, &row).await?;
                rows.push(row);
            }
        }

        tx.commit().await?;

        let outcome = CostingOutcome::new(order_id, sku, rows, false);
        info!(
            order_id = %order_id,
            sku = %sku,
            qty,
            method = %method,
            rows = outcome.allocations.len(),
            total_amount = %outcome.total_amount,
            "Shipment costed"
        );
        Ok(outcome)
    }

    /// [`apply_cogs_for_order_shipped`](Self::apply_cogs_for_order_shipped)
    /// for a feed event, with the engine's default method.
    pub async fn ship(&self, event: &ShipmentEvent) -> CostingResult<CostingOutcome> {
        self.apply_cogs_for_order_shipped(
            &event.order_id,
            &event.sku,
            event.qty,
            event.shipped_at,
            self.default_method,
        )
        .await
    }

    // =========================================================================
    // Returns
    // =========================================================================

    /// Reverses the COGS of returned units.
    ///
    /// Writes negative rows at the original unit costs and credits stock back
    /// where the sale took it from: the same FIFO layers in the sale's
    /// proportions, or the moving-average snapshot at the original cost.
    /// A bundle line is reversed through the components its sale costed,
    /// whatever the bundle's definition is today.
    /// One reversal per order line; a later call returns the existing
    /// reversal rows (`already_applied = true`).
    ///
    /// ## Errors
    /// - `UnknownSku` when the line was never costed and the SKU is not
    ///   registered
    /// - `AlreadyReversed` when `return_qty` exceeds the quantity the line
    ///   was costed for (or nothing was costed)
    /// - `MethodMismatch` when the sale was costed with the other method
    /// - `LedgerInconsistent` when a credit would overfill a layer
    pub async fn apply_return_reversal(
        &self,
        order_id: &str,
        sku: &str,
        return_qty: i64,
        return_date: DateTime<Utc>,
        method: CostingMethod,
    ) -> CostingResult<CostingOutcome> {
        validate_order_id(order_id)?;
        validate_sku(sku)?;
        validate_quantity("return_qty", return_qty)?;

        let demands = {
            let mut conn = self.pool.acquire().await?;
            sold_components(&mut conn, order_id, sku, return_qty).await?
        };
        let component_skus = bundle::component_skus(&demands);

        let _guards = self
            .locks
            .lock_all(component_skus.iter().cloned().chain(iter::once(sku.to_string())))
            .await;
        let mut tx = self.begin_write().await?;

        let demands = sold_components(&mut *tx, order_id, sku, return_qty).await?;
        if bundle::component_skus(&demands) != component_skus {
            return Err(DbError::conflict(
                "CogsAllocation",
                format!("{order_id}/{sku}"),
                "sale rows changed while waiting for locks",
            )
            .into());
        }

        let existing =
            allocation::for_order_line(&mut *tx, order_id, sku, None, Some(PostingKind::Reversal))
                .await?;
        if !existing.is_empty() {
            info!(order_id = %order_id, sku = %sku, rows = existing.len(), "Return already reversed");
            return Ok(CostingOutcome::new(order_id, sku, existing, true));
        }

        let mut plans = Vec::with_capacity(demands.len());
        for demand in &demands {
            let prior =
                allocation::for_order_line(&mut *tx, order_id, sku, Some(&demand.sku), None).await?;

            let (layers, stored) = match method {
                CostingMethod::Fifo => {
                    let mut layer_ids: Vec<i64> =
                        prior.iter().filter_map(|row| row.source_layer_id).collect();
                    layer_ids.sort_unstable();
                    layer_ids.dedup();
                    (layer_rows::find_many(&mut *tx, &layer_ids).await?, None)
                }
                CostingMethod::Avg => (Vec::new(), snapshot_rows::find(&mut *tx, &demand.sku).await?),
            };

            let plan = plan_reversal(
                order_id,
                &demand.sku,
                demand.qty,
                method,
                &prior,
                &layers,
                stored.as_ref(),
            )
            .map_err(|err| {
                warn!(order_id = %order_id, sku = %demand.sku, error = %err, "Return not reversed");
                err
            })?;

            plans.push((plan, stored));
        }

        if let Err(err) =
            posting::claim(&mut *tx, order_id, sku, PostingKind::Reversal, method, return_qty).await
        {
            if err.is_unique_violation() {
                drop(tx);
                return self
                    .committed_outcome(order_id, sku, &component_skus, PostingKind::Reversal)
                    .await;
            }
            return Err(err.into());
        }

        let mut rows = Vec::new();
        for (plan, stored) in &plans {
            for update in &plan.layer_updates {
                layer_rows::apply_update(&mut *tx, update).await?;
            }
            if let Some(next) = &plan.snapshot {
                snapshot_rows::save(&mut *tx, stored.as_ref(), next).await?;
            }

            for draft in &plan.drafts {
                let row = CogsAllocation::from_draft(
                    order_id,
                    sku,
                    return_date,
                    method,
                    PostingKind::Reversal,
                    draft,
                );
                allocation::insert(&mut *tx, &row).await?;
                rows.push(row);
            }
        }

        tx.commit().await?;

        let outcome = CostingOutcome::new(order_id, sku, rows, false);
        info!(
            order_id = %order_id,
            sku = %sku,
            return_qty,
            method = %method,
            rows = outcome.allocations.len(),
            total_amount = %outcome.total_amount,
            "Return reversed"
        );
        Ok(outcome)
    }

    /// [`apply_return_reversal`](Self::apply_return_reversal) for a feed
    /// event, with the engine's default method.
    pub async fn process_return(&self, event: &ReturnEvent) -> CostingResult<CostingOutcome> {
        self.apply_return_reversal(
            &event.order_id,
            &event.sku,
            event.return_qty,
            event.return_date,
            self.default_method,
        )
        .await
    }

    /// Rows committed by whichever writer claimed the posting first.
    async fn committed_outcome(
        &self,
        order_id: &str,
        sku: &str,
        component_skus: &[String],
        kind: PostingKind,
    ) -> CostingResult<CostingOutcome> {
        let mut conn = self.pool.acquire().await?;
        let rows = match kind {
            PostingKind::Sale => {
                allocation::for_order_skus(&mut conn, order_id, component_skus, Some(kind)).await?
            }
            PostingKind::Reversal => {
                allocation::for_order_line(&mut conn, order_id, sku, None, Some(kind)).await?
            }
        };

        debug!(order_id = %order_id, sku = %sku, ?kind, rows = rows.len(), "Lost posting race");
        Ok(CostingOutcome::new(order_id, sku, rows, true))
    }
}

// =============================================================================
// Bundle Resolution
// =============================================================================

/// Loads `sku` (and its definition, for a bundle) and explodes `qty`.
async fn resolve_demands(
    conn: &mut SqliteConnection,
    sku: &str,
    qty: i64,
) -> CostingResult<Vec<ComponentDemand>> {
    let item = item_rows::find(conn, sku)
        .await?
        .ok_or_else(|| CoreError::UnknownSku(sku.to_string()))?;

    if !item.is_bundle {
        return Ok(bundle::resolve(&item, &[], &[], qty)?);
    }

    let components = bundle_rows::components_of(conn, &item.sku).await?;
    let skus: Vec<String> = components.iter().map(|c| c.component_sku.clone()).collect();
    let component_items = item_rows::find_many(conn, &skus).await?;

    Ok(bundle::resolve(&item, &components, &component_items, qty)?)
}

/// Re-resolves inside the transaction and checks the locked SKU set still
/// covers every component.
async fn confirm_demands(
    conn: &mut SqliteConnection,
    sku: &str,
    qty: i64,
    locked: &[String],
) -> CostingResult<Vec<ComponentDemand>> {
    let demands = resolve_demands(conn, sku, qty).await?;

    if bundle::component_skus(&demands) != locked {
        return Err(DbError::conflict(
            "BundleComponent",
            sku,
            "bundle definition changed while waiting for locks",
        )
        .into());
    }

    Ok(demands)
}

/// Components to reverse for `return_qty` units of the `line_sku` line,
/// taken from the line's sale rows and sale posting.
async fn sold_components(
    conn: &mut SqliteConnection,
    order_id: &str,
    line_sku: &str,
    return_qty: i64,
) -> CostingResult<Vec<ComponentDemand>> {
    let line_qty = posting::line_qty(conn, order_id, line_sku, PostingKind::Sale).await?;

    let sale_rows = match line_qty {
        Some(_) => {
            allocation::for_order_line(conn, order_id, line_sku, None, Some(PostingKind::Sale))
                .await?
        }
        None => {
            if item_rows::find(conn, line_sku).await?.is_none() {
                return Err(CoreError::UnknownSku(line_sku.to_string()).into());
            }
            Vec::new()
        }
    };

    Ok(split_return(
        order_id,
        line_sku,
        line_qty.unwrap_or(0),
        return_qty,
        &sale_rows,
    )?)
}

// =============================================================================
// Unit Tests
// =============================================================================
