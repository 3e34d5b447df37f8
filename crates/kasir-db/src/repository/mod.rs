//! # Repository Module
//!
//! Database repository implementations for Kasir.
//!
//! ## Two Kinds of Operation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Reads on the pool               Writes on a unit of work               │
//! │  ─────────────────               ────────────────────────               │
//! │  db.catalog().get_product(id)    stock::lock_for_update(&mut *tx, v)    │
//! │  db.stock().level(v)             stock::apply_delta(&mut *tx, v, -24)   │
//! │  db.ledger().balance(v)          ledger::append(&mut *tx, &entry)       │
//! │  db.transactions().get_by_...    transaction::insert(&mut *tx, &res)    │
//! │                                  sequence::next_document_number(...)    │
//! │                                                                         │
//! │  Repository structs own a pool.  Free functions borrow the caller's    │
//! │                                  connection, so one BEGIN ... COMMIT    │
//! │                                  covers every write of a checkout.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`CatalogRepository`](catalog::CatalogRepository) - Products, unit graphs, variants, tiers
//! - [`StockRepository`](stock::StockRepository) - Stock levels in base units
//! - [`LedgerRepository`](ledger::LedgerRepository) - Append-only stock movements
//! - [`TransactionRepository`](transaction::TransactionRepository) - Sales transactions
//! - [`SequenceRepository`](sequence::SequenceRepository) - Document numbers

pub mod catalog;
pub mod ledger;
pub mod sequence;
pub mod stock;
pub mod transaction;

#[cfg(test)]
pub(crate) mod test_support {
    use kasir_core::{NewProduct, NewVariant, PricingTier, UnitDeclaration, VariantAttribute};

    /// Eggs sold by the piece, dozen and box of 144, declared out of order.
    pub fn eggs(sku: &str, initial_stock: i64) -> NewProduct {
        NewProduct {
            name: "Eggs".into(),
            units: vec![
                UnitDeclaration::derived("Box", 12, "Dozen"),
                UnitDeclaration::base("Pcs"),
                UnitDeclaration::derived("Dozen", 12, "Pcs"),
            ],
            variants: vec![NewVariant {
                sku: sku.into(),
                attributes: vec![
                    VariantAttribute::new("Size", "Large"),
                    VariantAttribute::new("Color", "White"),
                ],
                tiers: vec![PricingTier::new(1, 75_000), PricingTier::new(12, 70_000)],
                initial_stock,
            }],
        }
    }

    /// Single-unit product at one flat price.
    pub fn flat(name: &str, sku: &str, price: i64, initial_stock: i64) -> NewProduct {
        NewProduct {
            name: name.into(),
            units: vec![UnitDeclaration::base("Pcs")],
            variants: vec![NewVariant {
                sku: sku.into(),
                attributes: vec![],
                tiers: vec![PricingTier::new(1, price)],
                initial_stock,
            }],
        }
    }
}
