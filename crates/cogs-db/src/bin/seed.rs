//! # Demo Ledger Seeder
//!
//! Builds a small costing ledger for development: a few components, one gift
//! bundle, opening balances and a second receipt, then ships and returns a
//! handful of orders and prints the allocation rows as JSON.
//!
//! ## Usage
//! ```bash
//! # FIFO ledger at ./costbook.db (or COGS_DATABASE_PATH)
//! cargo run -p cogs-db --bin seed
//!
//! # Moving-average ledger at a custom path
//! cargo run -p cogs-db --bin seed -- --db ./data/demo.db --method avg
//! ```
//!
//! Verbosity follows `COGS_LOG` (for example `COGS_LOG=cogs_db=debug`).

use chrono::{Duration, TimeZone, Utc};
use std::env;
use tracing_subscriber::EnvFilter;

use cogs_core::{LayerSource, Money, ReturnEvent, ShipmentEvent, StockReceipt};
use cogs_db::{CostingConfig, Database};

/// (sku, display name, default unit cost in cents)
const COMPONENTS: &[(&str, &str, i64)] = &[
    ("MUG-WHT", "White ceramic mug", 450),
    ("COASTER-CRK", "Cork coaster", 80),
    ("TEA-SAMPLER", "Loose tea sampler", 325),
];

/// (component sku, quantity per bundle)
const GIFT_BOX: &[(&str, i64)] = &[("MUG-WHT", 2), ("COASTER-CRK", 4), ("TEA-SAMPLER", 1)];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = CostingConfig::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.log_filter))
        .init();

    // Parse command line args
    let args: Vec<String> = env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    config.database_path = args[i + 1].clone().into();
                    i += 1;
                }
            }
            "--method" | "-m" => {
                if i + 1 < args.len() {
                    config.default_method = args[i + 1].parse()?;
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Costbook Demo Ledger Seeder");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>        Database file path (default: ./costbook.db)");
                println!("  -m, --method <METHOD>  fifo or avg (default: fifo)");
                println!("  -h, --help             Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("Costbook Demo Ledger Seeder");
    println!("===========================");
    println!("Database: {}", config.database_path.display());
    println!("Method:   {}", config.default_method);
    println!();

    let db = Database::new(config.db_config()).await?;
    let engine = db.costing_with(config.default_method);

    if !db.items().list().await?.is_empty() {
        println!("Database already has items; delete the file to regenerate.");
        return Ok(());
    }

    // Catalog
    for (sku, name, cents) in COMPONENTS {
        engine
            .register_item(sku, name, false, Money::from_minor(*cents))
            .await?;
    }
    engine
        .register_item("GIFT-BOX", "Tea gift box", true, Money::ZERO)
        .await?;
    let definition: Vec<(String, i64)> = GIFT_BOX
        .iter()
        .map(|(sku, qty)| (sku.to_string(), *qty))
        .collect();
    engine.define_bundle("GIFT-BOX", &definition).await?;
    println!("✓ Registered {} components and GIFT-BOX", COMPONENTS.len());

    // Stock
    let opening = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).single().ok_or("bad date")?;
    for (sku, _, _) in COMPONENTS {
        engine.seed_opening_balance(sku, 100, None, opening).await?;
    }
    engine
        .receive_stock(&StockReceipt {
            sku: "MUG-WHT".to_string(),
            qty: 60,
            unit_cost: Some(Money::from_minor(520)),
            received_at: opening + Duration::days(14),
            source_type: LayerSource::StockIn,
            source_ref: Some("PO-0001".to_string()),
        })
        .await?;
    println!("✓ Seeded opening balances and one purchase order");

    // Orders
    let shipments = [
        ("#1001", "MUG-WHT", 3, 20),
        ("#1002", "GIFT-BOX", 5, 21),
        ("#1003", "COASTER-CRK", 12, 22),
        ("#1004", "GIFT-BOX", 10, 25),
    ];
    for (order_id, sku, qty, day) in shipments {
        let outcome = engine
            .ship(&ShipmentEvent {
                order_id: order_id.to_string(),
                sku: sku.to_string(),
                qty,
                shipped_at: opening + Duration::days(day),
            })
            .await?;
        println!(
            "  shipped {order_id} {qty} × {sku}: COGS {}",
            outcome.total_amount
        );
    }

    let returned = engine
        .process_return(&ReturnEvent {
            order_id: "#1002".to_string(),
            sku: "GIFT-BOX".to_string(),
            return_qty: 2,
            return_date: opening + Duration::days(30),
        })
        .await?;
    println!("  returned 2 × GIFT-BOX on #1002: COGS {}", returned.total_amount);

    println!();
    println!("Allocation rows for #1002:");
    let rows = db.reports().allocations_for_order("#1002").await?;
    println!("{}", serde_json::to_string_pretty(&rows)?);

    println!();
    for (sku, _, _) in COMPONENTS {
        let on_hand = db.reports().on_hand(sku).await?;
        println!("{}", serde_json::to_string(&on_hand)?);
    }

    let daily = db
        .reports()
        .daily_cogs(opening, opening + Duration::days(31))
        .await?;
    println!();
    println!("Daily COGS: {}", serde_json::to_string_pretty(&daily)?);

    println!();
    println!("✓ Seed complete!");

    Ok(())
}
