//! # Validation Module
//!
//! Input validation for feed events and catalog administration.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Feed collaborators (import parsers)                          │
//! │  ├── Column mapping, date parsing                                      │
//! │  └── Not our concern                                                    │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Engine entry points                                          │
//! │  └── THIS MODULE: ids, quantities, unit costs                          │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK constraints (qty_remaining bounds, qty_per_bundle > 0)      │
//! │  ├── PRIMARY KEY on (order_id, sku, kind) postings                     │
//! │  └── Foreign keys                                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use cogs_core::validation::{validate_quantity, validate_sku};
//!
//! assert!(validate_sku("MUG-01").is_ok());
//! assert!(validate_quantity("qty", 0).is_err());
//! ```

use crate::error::ValidationError;
use crate::money::Money;
use crate::{MAX_LINE_QUANTITY, MAX_UNIT_COST, UNIT_COST_SCALE};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

const MAX_SKU_LEN: usize = 64;
const MAX_NAME_LEN: usize = 200;
const MAX_ORDER_ID_LEN: usize = 128;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a SKU.
///
/// ## Rules
/// - Must not be empty
/// - At most 64 characters
/// - Letters, digits, hyphens, underscores, dots
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    let sku = sku.trim();

    if sku.is_empty() {
        return Err(ValidationError::Required {
            field: "sku".to_string(),
        });
    }

    if sku.len() > MAX_SKU_LEN {
        return Err(ValidationError::TooLong {
            field: "sku".to_string(),
            max: MAX_SKU_LEN,
        });
    }

    if !sku
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(ValidationError::InvalidFormat {
            field: "sku".to_string(),
            reason: "must contain only letters, numbers, hyphens, underscores, and dots"
                .to_string(),
        });
    }

    Ok(())
}

/// Validates an item display name.
pub fn validate_display_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "display_name".to_string(),
        });
    }

    if name.len() > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: "display_name".to_string(),
            max: MAX_NAME_LEN,
        });
    }

    Ok(())
}

/// Validates an order id coming from a marketplace export.
///
/// Marketplace ids have arbitrary shapes (`#1001`, `114-2233-445`), so only
/// emptiness and length are checked.
pub fn validate_order_id(order_id: &str) -> ValidationResult<()> {
    if order_id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "order_id".to_string(),
        });
    }

    if order_id.len() > MAX_ORDER_ID_LEN {
        return Err(ValidationError::TooLong {
            field: "order_id".to_string(),
            max: MAX_ORDER_ID_LEN,
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity.
///
/// ## Rules
/// - Must be positive (> 0); zero is invalid input, not a silent no-op
/// - Must not exceed `MAX_LINE_QUANTITY`
///
/// ```text
/// ship(order, sku, qty = 0)
///      │
///      ▼
/// validate_quantity("qty", 0) ──► MustBePositive { field: "qty" }
/// ```
pub fn validate_quantity(field: &str, qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }

    if qty > MAX_LINE_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 1,
            max: MAX_LINE_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a unit cost.
///
/// ## Rules
/// - Zero is allowed (free samples, promotional stock)
/// - Negative is not
/// - Must not exceed `MAX_UNIT_COST`
/// - At most `UNIT_COST_SCALE` decimal places, so a single-receipt average
///   reproduces the received cost exactly
pub fn validate_unit_cost(field: &str, cost: Money) -> ValidationResult<()> {
    if cost.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }

    if cost > Money::from_major(MAX_UNIT_COST) {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_UNIT_COST,
        });
    }

    if cost.value().normalize().scale() > UNIT_COST_SCALE {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: format!("at most {} decimal places", UNIT_COST_SCALE),
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_sku() {
        assert!(validate_sku("MUG-01").is_ok());
        assert!(validate_sku("coaster_set.v2").is_ok());

        assert!(validate_sku("").is_err());
        assert!(validate_sku("   ").is_err());
        assert!(validate_sku("has space").is_err());
        assert!(validate_sku(&"A".repeat(100)).is_err());
    }

    #[test]
    fn test_validate_display_name() {
        assert!(validate_display_name("Ceramic Mug 350ml").is_ok());
        assert!(validate_display_name("").is_err());
        assert!(validate_display_name(&"A".repeat(300)).is_err());
    }

    #[test]
    fn test_validate_order_id() {
        assert!(validate_order_id("#1001").is_ok());
        assert!(validate_order_id("114-2233445-0001").is_ok());
        assert!(validate_order_id(" ").is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity("qty", 1).is_ok());
        assert!(validate_quantity("qty", MAX_LINE_QUANTITY).is_ok());

        assert_eq!(
            validate_quantity("qty", 0),
            Err(ValidationError::MustBePositive {
                field: "qty".to_string()
            })
        );
        assert!(validate_quantity("qty", -1).is_err());
        assert!(validate_quantity("qty", MAX_LINE_QUANTITY + 1).is_err());
    }

    #[test]
    fn test_validate_unit_cost() {
        assert!(validate_unit_cost("unit_cost", Money::ZERO).is_ok());
        assert!(validate_unit_cost("unit_cost", Money::from_minor(1099)).is_ok());
        assert!(validate_unit_cost("unit_cost", Money::from_minor(-1)).is_err());

        let too_precise = Money::parse("unit_cost", "1.0000001").unwrap();
        assert!(validate_unit_cost("unit_cost", too_precise).is_err());

        let trailing_zeros = Money::parse("unit_cost", "1.50000000").unwrap();
        assert!(validate_unit_cost("unit_cost", trailing_zeros).is_ok());
        assert!(validate_unit_cost("unit_cost", Money::from_major(MAX_UNIT_COST)).is_ok());
        let huge = Money::parse("unit_cost", "100000000000000000000000").unwrap();
        assert_eq!(
            validate_unit_cost("unit_cost", huge),
            Err(ValidationError::OutOfRange {
                field: "unit_cost".to_string(),
                min: 0,
                max: MAX_UNIT_COST,
            })
        );
    }
}
