//! # Repository Module
//!
//! SQL for every table of the costing ledger.
//!
//! ## Two Ways In
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Read paths (reports, admin screens)                                   │
//! │       │                                                                 │
//! │       │  db.layers().list_for_sku("MUG")                               │
//! │       ▼                                                                 │
//! │  LayerRepository { pool }  ── acquires a pooled connection             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  layer::list_for_sku(&mut conn, ..)  ◄──┐                              │
//! │                                          │ same SQL                     │
//! │  CostingEngine, inside one transaction ──┘                              │
//! │       layer::open_layers(&mut *tx, ..)                                 │
//! │       layer::apply_update(&mut *tx, ..)                                │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The module-level functions take `&mut SqliteConnection` so the engine can
//! run them on its transaction; the repository structs wrap them for pool use.
//!
//! ## Available Repositories
//!
//! - [`ItemRepository`] - Item catalog
//! - [`BundleRepository`] - Bundle definitions
//! - [`LayerRepository`] - Receipt layers (FIFO)
//! - [`SnapshotRepository`] - Moving-average snapshots
//! - [`AllocationRepository`] - Allocation ledger
//! - `posting` - Idempotency guard rows (engine only)

pub mod allocation;
pub mod bundle;
pub mod item;
pub mod layer;
pub mod posting;
pub mod snapshot;

pub use allocation::AllocationRepository;
pub use bundle::BundleRepository;
pub use item::ItemRepository;
pub use layer::LayerRepository;
pub use snapshot::SnapshotRepository;
