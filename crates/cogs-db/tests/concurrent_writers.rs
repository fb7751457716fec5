//! Writers racing on a file-backed database through several pooled
//! connections, and through two `Database` handles that share no locks
//! (two processes on one file).

use chrono::{DateTime, TimeZone, Utc};
use cogs_core::{CostingMethod, LayerSource, Money, ShipmentEvent, StockReceipt};
use cogs_db::{Database, DbConfig};
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn at(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, day, 9, 0, 0).unwrap()
}

async fn open(dir: &TempDir) -> Database {
    let config = DbConfig::new(dir.path().join("costbook.db")).max_connections(8);
    Database::new(config).await.unwrap()
}

async fn stock(db: &Database, sku: &str, qty: i64, cost: i64) {
    let engine = db.costing();
    engine
        .register_item(sku, &format!("{sku} item"), false, Money::ZERO)
        .await
        .unwrap();
    engine
        .receive_stock(&StockReceipt {
            sku: sku.to_string(),
            qty,
            unit_cost: Some(Money::from_major(cost)),
            received_at: at(1),
            source_type: LayerSource::StockIn,
            source_ref: None,
        })
        .await
        .unwrap();
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn different_skus_ship_in_parallel() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir).await;

    let skus: Vec<String> = (0..8).map(|i| format!("SKU-{i}")).collect();
    for sku in &skus {
        stock(&db, sku, 100, 2).await;
    }

    let mut handles = Vec::new();
    for sku in &skus {
        for order in 0..10 {
            let engine = db.costing();
            let sku = sku.clone();
            handles.push(tokio::spawn(async move {
                engine
                    .apply_cogs_for_order_shipped(
                        &format!("SO-{sku}-{order}"),
                        &sku,
                        5,
                        at(5),
                        CostingMethod::Fifo,
                    )
                    .await
            }));
        }
    }

    for handle in handles {
        let outcome = handle.await.unwrap().unwrap();
        assert!(!outcome.already_applied);
        assert_eq!(outcome.total_amount, Money::from_major(10));
    }

    for sku in &skus {
        assert_eq!(db.layers().on_hand_qty(sku).await.unwrap(), 50);
    }
    assert_eq!(db.allocations().count().await.unwrap(), 80);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn duplicate_shipment_from_two_handles_costs_once() {
    let dir = TempDir::new().unwrap();
    let first = open(&dir).await;
    stock(&first, "C", 10, 4).await;
    let second = open(&dir).await;

    let mut handles = Vec::new();
    for i in 0..8 {
        let engine = if i % 2 == 0 {
            first.costing()
        } else {
            second.costing()
        };
        handles.push(tokio::spawn(async move {
            engine
                .apply_cogs_for_order_shipped("SO-1", "C", 3, at(5), CostingMethod::Fifo)
                .await
        }));
    }

    let mut fresh = 0;
    for handle in handles {
        let outcome = handle.await.unwrap().unwrap();
        assert_eq!(outcome.total_amount, Money::from_major(12));
        if !outcome.already_applied {
            fresh += 1;
        }
    }

    assert_eq!(fresh, 1);
    assert_eq!(first.layers().on_hand_qty("C").await.unwrap(), 7);
    assert_eq!(second.allocations().count().await.unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn one_sku_from_two_handles_never_oversells() {
    let dir = TempDir::new().unwrap();
    let first = open(&dir).await;
    stock(&first, "C", 50, 2).await;
    let second = open(&dir).await;

    let mut handles = Vec::new();
    for i in 0..12 {
        let engine = if i % 2 == 0 {
            first.costing_with(CostingMethod::Avg)
        } else {
            second.costing_with(CostingMethod::Avg)
        };
        handles.push(tokio::spawn(async move {
            engine
                .ship(&ShipmentEvent {
                    order_id: format!("SO-{i}"),
                    sku: "C".to_string(),
                    qty: 5,
                    shipped_at: at(5),
                })
                .await
        }));
    }

    let mut costed = 0;
    let mut short = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => costed += 1,
            Err(err) if err.is_retryable() => short += 1,
            Err(err) => panic!("unexpected error: {err}"),
        }
    }

    assert_eq!(costed, 10);
    assert_eq!(short, 2);

    let snapshot = first.snapshots().get("C").await.unwrap();
    assert_eq!(snapshot.on_hand_qty, 0);
    assert_eq!(snapshot.on_hand_value, Money::ZERO);
    let rows = second.reports().allocations_between(at(1), at(10)).await.unwrap();
    assert_eq!(rows.len(), 10);
    assert_eq!(rows.iter().map(|r| r.amount).sum::<Money>(), Money::from_major(100));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn duplicate_return_from_two_handles_reverses_once() {
    let dir = TempDir::new().unwrap();
    let first = open(&dir).await;
    stock(&first, "C", 20, 3).await;
    first
        .costing()
        .apply_cogs_for_order_shipped("SO-1", "C", 6, at(5), CostingMethod::Fifo)
        .await
        .unwrap();
    let second = open(&dir).await;

    let mut handles = Vec::new();
    for i in 0..6 {
        let engine = if i % 2 == 0 {
            first.costing()
        } else {
            second.costing()
        };
        handles.push(tokio::spawn(async move {
            engine
                .apply_return_reversal("SO-1", "C", 6, at(7), CostingMethod::Fifo)
                .await
        }));
    }

    let mut fresh = 0;
    for handle in handles {
        let outcome = handle.await.unwrap().unwrap();
        assert_eq!(outcome.total_amount, Money::from_major(-18));
        if !outcome.already_applied {
            fresh += 1;
        }
    }

    assert_eq!(fresh, 1);
    assert_eq!(first.layers().on_hand_qty("C").await.unwrap(), 20);
    assert_eq!(second.reports().net_cogs_for_order("SO-1").await.unwrap(), Money::ZERO);
}
