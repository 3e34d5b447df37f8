//! # kasir-core: Pure Business Logic for Kasir
//!
//! This crate is the **heart** of Kasir. It decides how much a customer pays
//! for a quantity expressed in any unit, and what a checkout is allowed to
//! take from stock. Every function here is pure; storage lives in kasir-db.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Kasir Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Callers (till, back office)                  │   │
//! │  │         CheckoutRequest ──►            ◄── CheckoutResult       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 kasir-db (Checkout Engine)                      │   │
//! │  │     unit of work, stock locks, ledger, document sequences       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ kasir-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   units   │  │  pricing  │  │ sequence  │  │ checkout  │  │   │
//! │  │   │ UnitGraph │  │  tiers    │  │ TRX / PO  │  │ rules     │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`units`] - Unit graph resolver (validation, `to_base`, creation order)
//! - [`pricing`] - Tiered price evaluator
//! - [`sequence`] - Document number format and increment rules
//! - [`checkout`] - Request validation, stock reservations, result assembly
//! - [`types`] - Domain types (Product, CheckoutResult, ledger entries)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`error`] - Domain error types and error kinds
//! - [`validation`] - Field-level input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use kasir_core::pricing::{price_line, PricingTier};
//! use kasir_core::units::{UnitDeclaration, UnitGraph};
//!
//! let graph = UnitGraph::resolve(&[
//!     UnitDeclaration::base("Pcs"),
//!     UnitDeclaration::derived("Dozen", 12, "Pcs"),
//! ])
//! .unwrap();
//! let to_base = graph.to_base("Dozen").unwrap();
//!
//! let tiers = [PricingTier::new(1, 75_000), PricingTier::new(12, 70_000)];
//! let line = price_line(&tiers, 2, to_base).unwrap();
//! assert_eq!(line.line_total.amount(), 1_680_000);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod checkout;
pub mod error;
pub mod money;
pub mod pricing;
pub mod sequence;
pub mod types;
pub mod units;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use kasir_core::Money` instead of
// `use kasir_core::money::Money`

pub use error::{CoreError, CoreResult, ErrorKind, ValidationError};
pub use money::Money;
pub use pricing::PricingTier;
pub use sequence::DocumentKind;
pub use types::*;
pub use units::{ResolvedUnit, UnitDeclaration, UnitGraph};

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum lines allowed in a single checkout.
///
/// ## Business Reason
/// Bounds how many stock rows one unit of work can hold locked.
pub const MAX_CART_LINES: usize = 100;
