//! # cogs-core: Pure Costing Logic
//!
//! This crate is the **heart** of the inventory costing engine. It contains all
//! costing rules as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Costing Engine Architecture                         │
//! │                                                                         │
//! │  Order feed (shipped / returned)      Receiving feed (stock-in)         │
//! │                │                                │                       │
//! │  ┌─────────────▼────────────────────────────────▼──────────────────┐   │
//! │  │                cogs-db: CostingEngine                            │   │
//! │  │   locks SKUs ─► begins tx ─► loads ledger rows ─► applies plan  │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ rows in, mutations out                │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ cogs-core (THIS CRATE) ★                        │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐  ┌─────────┐  ┌─────────┐  ┌──────────┐          │   │
//! │  │   │ bundle  │  │  fifo   │  │ average │  │ reversal │          │   │
//! │  │   │ resolve │  │ layers  │  │snapshot │  │ apportion│          │   │
//! │  │   └─────────┘  └─────────┘  └─────────┘  └──────────┘          │   │
//! │  │                    costing::allocate (strategy dispatch)        │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO GLOBAL STATE • PURE FUNCTIONS       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Item, ReceiptLayer, CostSnapshot, CogsAllocation, ...)
//! - [`money`] - Decimal money with the rounding policy
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//! - [`bundle`] - Bundle explosion into component demands
//! - [`fifo`] - FIFO layer allocator
//! - [`average`] - Moving-average allocator and stock-in blending
//! - [`reversal`] - Return apportionment against original allocations
//! - [`costing`] - Method dispatch shared by FIFO and AVG
//!
//! ## Example Usage
//!
//! ```rust
//! use cogs_core::average::{allocate_avg, receive_into_snapshot};
//! use cogs_core::money::Money;
//! use cogs_core::types::CostSnapshot;
//!
//! let snapshot = CostSnapshot::empty("MUG-01");
//! let snapshot = receive_into_snapshot(&snapshot, 100, Money::from_major(20));
//! let snapshot = receive_into_snapshot(&snapshot, 100, Money::from_major(30));
//! assert_eq!(snapshot.avg_unit_cost(), Money::from_major(25));
//!
//! let plan = allocate_avg(&snapshot, 50).unwrap();
//! assert_eq!(plan.draft.amount(), Money::from_major(1250));
//! assert_eq!(plan.snapshot.on_hand_qty, 150);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod average;
pub mod bundle;
pub mod costing;
pub mod error;
pub mod fifo;
pub mod money;
pub mod reversal;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Decimal places kept on allocation amounts (currency minor unit).
pub const AMOUNT_SCALE: u32 = 2;

/// Decimal places kept on the derived moving-average unit cost.
///
/// The snapshot value itself is carried at full precision; only the average
/// handed to an allocation is rounded, so sale and return use the same figure.
pub const UNIT_COST_SCALE: u32 = 6;

/// Maximum quantity accepted on a single shipment, return or receipt line.
///
/// Guards against unit-of-measure mistakes in marketplace exports
/// (e.g. grams imported as units).
pub const MAX_LINE_QUANTITY: i64 = 1_000_000;

/// Largest unit cost accepted on a receipt or as an item default.
///
/// With `MAX_LINE_QUANTITY` this keeps every `qty * unit_cost` product and
/// running snapshot value far inside the decimal range.
pub const MAX_UNIT_COST: i64 = 1_000_000_000;
