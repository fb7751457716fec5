//! # Per-SKU Writer Locks
//!
//! Serializes writers that touch the same component SKU inside this process.
//!
//! ```text
//! ship(#1, MUG)   ──► lock [MUG]            ──► tx ──► commit ──► release
//! ship(#2, MUG)   ──► lock [MUG]  (waits) ─────────────────────────► tx ...
//! ship(#3, PLATE) ──► lock [PLATE]          ──► tx  (runs in parallel)
//! ship(#4, BOX)   ──► lock [COASTER, MUG]   (sorted: no lock-order cycles)
//! ```
//!
//! Across processes the compare-and-set layer updates and the posting
//! primary key still hold; these locks only avoid pointless conflicts.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

/// Guards held for the duration of one engine call.
#[derive(Debug)]
pub struct SkuGuards {
    skus: Vec<String>,
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl SkuGuards {
    /// The locked SKUs, sorted.
    pub fn skus(&self) -> &[String] {
        &self.skus
    }
}

/// Lazily populated table of one async mutex per SKU.
#[derive(Debug, Default)]
pub struct SkuLocks {
    table: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SkuLocks {
    pub fn new() -> Self {
        SkuLocks::default()
    }

    /// Locks every SKU in `skus`, in sorted order, duplicates ignored.
    pub async fn lock_all<I, S>(&self, skus: I) -> SkuGuards
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut sorted: Vec<String> = skus.into_iter().map(Into::into).collect();
        sorted.sort();
        sorted.dedup();

        let mutexes: Vec<Arc<Mutex<()>>> = {
            let mut table = self.table.lock().await;
            sorted
                .iter()
                .map(|sku| table.entry(sku.clone()).or_default().clone())
                .collect()
        };

        let mut guards = Vec::with_capacity(mutexes.len());
        for mutex in mutexes {
            guards.push(mutex.lock_owned().await);
        }

        SkuGuards {
            skus: sorted,
            _guards: guards,
        }
    }

    /// Number of SKUs that have ever been locked.
    pub async fn len(&self) -> usize {
        self.table.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
