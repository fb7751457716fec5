//! # cogs-db: Storage Layer and Costing Engine
//!
//! This crate persists the costing ledger in SQLite (sqlx) and owns every
//! transaction boundary. The costing rules themselves live in `cogs-core`.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Costing Data Flow                                │
//! │                                                                         │
//! │  Order feed ("shipped", "returned")     Receiving feed (stock-in)      │
//! │       │                                       │                         │
//! │       ▼                                       ▼                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     cogs-db (THIS CRATE)                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐   │   │
//! │  │   │ CostingEngine │    │  Repositories │    │  Migrations  │   │   │
//! │  │   │  (engine.rs)  │───►│ items         │    │  (embedded)  │   │   │
//! │  │   │ SKU locks     │    │ bundles       │    │              │   │   │
//! │  │   │ transactions  │    │ layers        │    │ 001_costing_ │   │   │
//! │  │   │ idempotency   │    │ snapshots     │    │   schema.sql │   │   │
//! │  │   └───────┬───────┘    │ allocations   │    └──────────────┘   │   │
//! │  │           │            └───────────────┘                        │   │
//! │  │           ▼                     ▲                               │   │
//! │  │     cogs_core (pure)     ReportReader ◄── P&L dashboard        │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite (WAL)                                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Storage and costing error types
//! - [`repository`] - SQL for each ledger table
//! - [`engine`] - Shipment, return, receiving and catalog operations
//! - [`report`] - Read-only P&L queries
//! - [`locks`] - Per-SKU writer serialization
//! - [`config`] - Environment configuration
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cogs_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/costbook.db")).await?;
//!
//! db.costing()
//!     .register_item("MUG", "Ceramic mug", false, Money::from_major(4))
//!     .await?;
//! db.costing()
//!     .seed_opening_balance("MUG", 100, None, as_of)
//!     .await?;
//!
//! let outcome = db
//!     .costing()
//!     .apply_cogs_for_order_shipped("#1001", "MUG", 3, shipped_at, CostingMethod::Fifo)
//!     .await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod engine;
pub mod error;
pub mod locks;
pub mod migrations;
pub mod pool;
pub mod report;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{ConfigError, CostingConfig};
pub use engine::CostingEngine;
pub use error::{CostingError, CostingResult, DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use report::{DailyCogs, OnHand, ReportReader};

// Repository re-exports for convenience
pub use repository::{
    AllocationRepository, BundleRepository, ItemRepository, LayerRepository, SnapshotRepository,
};
