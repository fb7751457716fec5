//! # Bundle Resolver
//!
//! Explodes an order-line SKU into the component SKUs that actually carry
//! inventory.
//!
//! ```text
//! GIFT-BOX × 10        components: MUG × 1, COASTER × 2
//!      │
//!      ▼
//! resolve() ──► [ (COASTER, 20), (MUG, 10) ]   sorted by component SKU
//!
//! MUG × 3 (not a bundle)
//!      │
//!      ▼
//! resolve() ──► [ (MUG, 3) ]
//! ```
//!
//! Only one level of explosion exists: a bundle may not contain a bundle.

use std::collections::{BTreeMap, HashSet};

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::types::{BundleComponent, ComponentDemand, Item};
use crate::validation::validate_quantity;
use crate::MAX_LINE_QUANTITY;

/// Expands `qty` units of `item` into component demands.
///
/// `components` are the bundle's definition rows and `component_items` the
/// catalog entries for those components. Both are ignored for a simple item.
///
/// ## Errors
/// - `NoComponentsDefined` when a bundle has no rows
/// - `UnknownSku` when a component is missing from `component_items`
/// - `NestedBundle` when a component is itself a bundle
/// - `Validation(OutOfRange)` when a component's exploded quantity exceeds
///   `MAX_LINE_QUANTITY`
pub fn resolve(
    item: &Item,
    components: &[BundleComponent],
    component_items: &[Item],
    qty: i64,
) -> CoreResult<Vec<ComponentDemand>> {
    validate_quantity("qty", qty)?;

    if !item.is_bundle {
        return Ok(vec![ComponentDemand {
            sku: item.sku.clone(),
            qty,
        }]);
    }

    let rows: Vec<&BundleComponent> = components
        .iter()
        .filter(|c| c.bundle_sku == item.sku)
        .collect();

    if rows.is_empty() {
        return Err(CoreError::NoComponentsDefined {
            bundle_sku: item.sku.clone(),
        });
    }

    // BTreeMap keeps the output ordered by component SKU.
    let mut demands: BTreeMap<&str, i64> = BTreeMap::new();

    for row in rows {
        let component = component_items
            .iter()
            .find(|i| i.sku == row.component_sku)
            .ok_or_else(|| CoreError::UnknownSku(row.component_sku.clone()))?;

        if component.is_bundle || component.sku == item.sku {
            return Err(CoreError::NestedBundle {
                bundle_sku: item.sku.clone(),
                component_sku: component.sku.clone(),
            });
        }

        if row.quantity_per_bundle <= 0 {
            return Err(ValidationError::MustBePositive {
                field: "quantity_per_bundle".to_string(),
            }
            .into());
        }

        let out_of_range = || ValidationError::OutOfRange {
            field: format!("qty of component {}", row.component_sku),
            min: 1,
            max: MAX_LINE_QUANTITY,
        };

        let entry = demands.entry(row.component_sku.as_str()).or_insert(0);
        let required = qty
            .checked_mul(row.quantity_per_bundle)
            .and_then(|required| required.checked_add(*entry))
            .filter(|total| *total <= MAX_LINE_QUANTITY)
            .ok_or_else(out_of_range)?;
        *entry = required;
    }

    Ok(demands
        .into_iter()
        .map(|(sku, qty)| ComponentDemand {
            sku: sku.to_string(),
            qty,
        })
        .collect())
}

/// Sorted, de-duplicated SKUs of a set of demands.
///
/// This is the SKU set the idempotency check and the writer locks work on.
pub fn component_skus(demands: &[ComponentDemand]) -> Vec<String> {
    let mut skus: Vec<String> = demands.iter().map(|d| d.sku.clone()).collect();
    skus.sort();
    skus.dedup();
    skus
}

/// Validates a new definition for `bundle` before it replaces the old rows.
///
/// ## Rules
/// - `bundle` must be flagged as a bundle
/// - at least one component
/// - every component registered, not a bundle, not the bundle itself
/// - each component listed once with `quantity_per_bundle > 0`
pub fn validate_definition(
    bundle: &Item,
    components: &[(String, i64)],
    component_items: &[Item],
) -> CoreResult<Vec<BundleComponent>> {
    if !bundle.is_bundle {
        return Err(ValidationError::InvalidFormat {
            field: "bundle_sku".to_string(),
            reason: format!("{} is not registered as a bundle", bundle.sku),
        }
        .into());
    }

    if components.is_empty() {
        return Err(CoreError::NoComponentsDefined {
            bundle_sku: bundle.sku.clone(),
        });
    }

    let mut seen = HashSet::new();
    let mut rows = Vec::with_capacity(components.len());

    for (component_sku, per_bundle) in components {
        if !seen.insert(component_sku.as_str()) {
            return Err(ValidationError::Duplicate {
                field: "component_sku".to_string(),
                value: component_sku.clone(),
            }
            .into());
        }

        if *per_bundle <= 0 {
            return Err(ValidationError::MustBePositive {
                field: "quantity_per_bundle".to_string(),
            }
            .into());
        }

        let component = component_items
            .iter()
            .find(|i| &i.sku == component_sku)
            .ok_or_else(|| CoreError::UnknownSku(component_sku.clone()))?;

        if component.is_bundle || component.sku == bundle.sku {
            return Err(CoreError::NestedBundle {
                bundle_sku: bundle.sku.clone(),
                component_sku: component.sku.clone(),
            });
        }

        rows.push(BundleComponent {
            bundle_sku: bundle.sku.clone(),
            component_sku: component_sku.clone(),
            quantity_per_bundle: *per_bundle,
        });
    }

    rows.sort_by(|a, b| a.component_sku.cmp(&b.component_sku));
    Ok(rows)
}

// =============================================================================
// Unit Tests
// =============================================================================
