//! # Seed Data Generator
//!
//! Creates a small demo catalog and rings up one sale.
//!
//! ## Usage
//! ```bash
//! # Use kasir.toml from the platform config directory (or defaults)
//! cargo run -p kasir-db --bin seed
//!
//! # Specify database path
//! cargo run -p kasir-db --bin seed -- --db ./data/kasir.db
//!
//! # Specify config file
//! cargo run -p kasir-db --bin seed -- --config ./kasir.toml
//! ```
//!
//! ## Generated Data
//! - Eggs: Pcs / Dozen (12 Pcs) / Box (12 Dozen), two variants, bulk tier at one dozen
//! - Mineral Water: Bottle / Carton (24 Bottle), bulk tier at one carton
//! - One cash sale: 2 Dozen large eggs and 1 Carton of water, printed as JSON

use std::env;
use std::path::PathBuf;

use kasir_core::{
    CartLine, CheckoutRequest, NewProduct, NewVariant, PricingTier, Product, UnitDeclaration,
    VariantAttribute,
};
use kasir_db::{Database, KasirConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut config_path: Option<PathBuf> = None;
    let mut db_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Kasir Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --config <PATH>  Config file (default: platform config dir)");
                println!("  -d, --db <PATH>      Database file path (overrides config)");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    init_tracing();

    let mut config = KasirConfig::load(config_path)?;
    if let Some(path) = db_path {
        config.database.path = path;
    }

    println!("Kasir Seed Data Generator");
    println!("=========================");
    println!("Database: {}", config.database.path.display());
    println!();

    let db = Database::new(config.db_config()).await?;
    println!("✓ Connected to database");

    if db.catalog().variant_id_by_sku("EGG-L-WHT").await?.is_some() {
        println!("⚠ Demo catalog already present");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let eggs = db.catalog().create_product(eggs()).await?;
    println!("✓ Created {} ({} units, {} variants)", eggs.name, eggs.units.len(), eggs.variants.len());

    let water = db.catalog().create_product(water()).await?;
    println!("✓ Created {} ({} units, {} variants)", water.name, water.units.len(), water.variants.len());

    let request = CheckoutRequest::new(
        "cash",
        vec![cart_line(&eggs, 0, "Dozen", 2)?, cart_line(&water, 0, "Carton", 1)?],
    );

    let result = db
        .checkout()
        .retry_backoff(config.checkout.retry_backoff())
        .checkout_with_retry(&request, config.checkout.max_attempts)
        .await?;

    info!(transaction_number = %result.transaction_number, "Demo sale committed");

    println!();
    println!("{}", serde_json::to_string_pretty(&result)?);

    db.close().await;
    Ok(())
}

/// Initializes the tracing subscriber for structured logging.
///
/// `RUST_LOG` overrides the default filter.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,kasir_db=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn eggs() -> NewProduct {
    let tiers = || vec![PricingTier::new(1, 2_500), PricingTier::new(12, 2_200)];

    NewProduct {
        name: "Eggs".into(),
        units: vec![
            UnitDeclaration::base("Pcs"),
            UnitDeclaration::derived("Dozen", 12, "Pcs"),
            UnitDeclaration::derived("Box", 12, "Dozen"),
        ],
        variants: vec![
            NewVariant {
                sku: "EGG-L-WHT".into(),
                attributes: vec![
                    VariantAttribute::new("Size", "Large"),
                    VariantAttribute::new("Color", "White"),
                ],
                tiers: tiers(),
                initial_stock: 720,
            },
            NewVariant {
                sku: "EGG-M-BRN".into(),
                attributes: vec![
                    VariantAttribute::new("Size", "Medium"),
                    VariantAttribute::new("Color", "Brown"),
                ],
                tiers: tiers(),
                initial_stock: 288,
            },
        ],
    }
}

fn water() -> NewProduct {
    NewProduct {
        name: "Mineral Water 600ml".into(),
        units: vec![
            UnitDeclaration::base("Bottle"),
            UnitDeclaration::derived("Carton", 24, "Bottle"),
        ],
        variants: vec![NewVariant {
            sku: "WTR-600".into(),
            attributes: vec![],
            tiers: vec![PricingTier::new(1, 3_500), PricingTier::new(24, 3_000)],
            initial_stock: 240,
        }],
    }
}

fn cart_line(
    product: &Product,
    variant: usize,
    unit: &str,
    quantity: i64,
) -> Result<CartLine, Box<dyn std::error::Error>> {
    let variant = product
        .variants
        .get(variant)
        .ok_or_else(|| format!("{} has no variant {}", product.name, variant))?;
    let unit = product
        .unit_named(unit)
        .ok_or_else(|| format!("{} has no unit {}", product.name, unit))?;

    Ok(CartLine {
        product_id: product.id.clone(),
        variant_id: variant.id.clone(),
        unit_id: unit.id.clone(),
        quantity,
    })
}
