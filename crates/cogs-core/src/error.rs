//! # Error Types
//!
//! Domain-specific error types for cogs-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  cogs-core errors (this file)                                          │
//! │  ├── CoreError        - Costing rule violations                        │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  cogs-db errors (separate crate)                                       │
//! │  ├── DbError          - Database operation failures                    │
//! │  └── CostingError     - What engine callers see (Domain | Storage)     │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → CostingError → caller             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (SKU, order, quantities)
//! 3. Every error aborts the whole costing attempt; none leave partial writes

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Costing rule violations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Not enough stock to cost the requested quantity.
    ///
    /// ## When This Occurs
    /// - FIFO: sum of non-voided `qty_remaining` is below the request
    /// - AVG: snapshot `on_hand_qty` is below the request
    ///
    /// ## User Workflow
    /// ```text
    /// Ship order #1001: 10 × GIFT-BOX (= 10 × MUG + 20 × COASTER)
    ///      │
    ///      ▼
    /// COASTER layers hold 12
    ///      │
    ///      ▼
    /// InsufficientStock { sku: "COASTER", requested: 20, available: 12 }
    ///      │
    ///      ▼
    /// Nothing is posted; receive more COASTER stock and retry
    /// ```
    #[error("Insufficient stock for {sku}: requested {requested}, available {available}")]
    InsufficientStock {
        sku: String,
        requested: i64,
        available: i64,
    },

    /// A bundle SKU has no component rows.
    ///
    /// Data-setup error: not retryable until an admin defines the bundle.
    #[error("Bundle {bundle_sku} has no components defined")]
    NoComponentsDefined { bundle_sku: String },

    /// SKU is not registered in the item catalog.
    #[error("Unknown SKU: {0}")]
    UnknownSku(String),

    /// Return exceeds what is still allocated for the order line.
    #[error(
        "Cannot reverse {requested} of {sku} on order {order_id}: only {allocated} allocated"
    )]
    AlreadyReversed {
        order_id: String,
        sku: String,
        requested: i64,
        allocated: i64,
    },

    /// A bundle lists another bundle as a component.
    #[error("Bundle {bundle_sku} cannot contain bundle {component_sku}")]
    NestedBundle {
        bundle_sku: String,
        component_sku: String,
    },

    /// Stock was received against a bundle SKU.
    #[error("{0} is a bundle and cannot hold inventory")]
    BundleNotStockable(String),

    /// A return asked for a different method than the sale was costed with.
    #[error("Order {order_id} {sku} was costed with {recorded}, not {requested}")]
    MethodMismatch {
        order_id: String,
        sku: String,
        recorded: String,
        requested: String,
    },

    /// A receipt layer cannot be voided.
    #[error("Receipt layer {layer_id} cannot be voided: {reason}")]
    LayerNotVoidable { layer_id: i64, reason: String },

    /// Stored ledger rows contradict each other.
    ///
    /// ## When This Occurs
    /// - A reversal would push a layer above its `qty_received`
    /// - An allocation references a layer that no longer exists
    #[error("Ledger inconsistent for {sku}: {reason}")]
    LedgerInconsistent { sku: String, reason: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Whether the same call can succeed later without an admin fix.
    ///
    /// Only a stock shortage clears by itself (after receiving stock).
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::InsufficientStock { .. })
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (e.g., bad decimal, bad SKU characters).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Duplicate value (e.g., the same component listed twice).
    #[error("{field} '{value}' is duplicated")]
    Duplicate { field: String, value: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
