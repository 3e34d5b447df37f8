//! # Checkout Rules
//!
//! The pure half of checkout. kasir-db owns the unit of work (locks, writes,
//! commit); everything that can be decided without touching storage lives here.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  CheckoutRequest                                                        │
//! │      │                                                                  │
//! │      ▼                                                                  │
//! │  validate_request()     payment allow-list, empty cart, quantities      │
//! │      │                  (no transaction opened yet)                     │
//! │      ▼                                                                  │
//! │  per line (inside the unit of work):                                    │
//! │      lock stock ─► StockReservations::lock()                           │
//! │      LineCatalog::to_base() ─► base_quantity()                          │
//! │      StockReservations::reserve()   fails on insufficient stock         │
//! │      price_cart_line()              tier price, line total              │
//! │      │                                                                  │
//! │      ▼                                                                  │
//! │  StockReservations::decrements()    one per distinct variant            │
//! │  CheckoutResult::assemble()         subtotal, grand total               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::error::{CoreError, CoreResult, PricingError};
use crate::money::Money;
use crate::pricing::{price_line, PricingTier};
use crate::types::{
    variant_label, CartLine, CheckoutLineItem, CheckoutRequest, CheckoutResult, PaymentMethod,
    VariantAttribute,
};
use crate::units::{UnitDeclaration, UnitGraph};
use crate::MAX_CART_LINES;

// =============================================================================
// Request Validation
// =============================================================================

/// Fail-fast checks that run before any lock is taken.
///
/// Order matters: an invalid payment method is reported even for an empty
/// cart.
pub fn validate_request(request: &CheckoutRequest) -> CoreResult<PaymentMethod> {
    let payment_method: PaymentMethod = request.payment_method.parse()?;

    if request.lines.is_empty() {
        return Err(CoreError::EmptyCart);
    }

    if request.lines.len() > MAX_CART_LINES {
        return Err(CoreError::CartTooLarge {
            max: MAX_CART_LINES,
        });
    }

    if let Some(line) = request.lines.iter().position(|l| l.quantity <= 0) {
        return Err(CoreError::NonPositiveQuantity { line });
    }

    Ok(payment_method)
}

// =============================================================================
// Catalog Snapshot
// =============================================================================

/// Everything checkout needs to know about one cart line's catalog entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineCatalog {
    pub product_name: String,
    pub sku: String,
    pub attributes: Vec<VariantAttribute>,
    /// Name of the unit the line was rung up in.
    pub unit_name: String,
    /// Every unit declared for the product.
    pub units: Vec<UnitDeclaration>,
    pub tiers: Vec<PricingTier>,
}

impl LineCatalog {
    /// Resolves the product's unit graph and returns the factor of the
    /// line's unit.
    pub fn to_base(&self) -> CoreResult<i64> {
        let graph = UnitGraph::resolve(&self.units)?;
        graph
            .to_base(&self.unit_name)
            .ok_or_else(|| CoreError::UnitNotFound(self.unit_name.clone()))
    }

    pub fn variant_label(&self) -> String {
        variant_label(&self.attributes)
    }
}

/// `quantity × to_base` for line `line`.
pub fn base_quantity(line: usize, quantity: i64, to_base: i64) -> CoreResult<i64> {
    quantity
        .checked_mul(to_base)
        .ok_or(CoreError::LineOverflow { line })
}

/// Prices one line and freezes its catalog snapshot.
pub fn price_cart_line(
    line: usize,
    id: String,
    cart_line: &CartLine,
    catalog: &LineCatalog,
    to_base: i64,
) -> CoreResult<CheckoutLineItem> {
    let price = price_line(&catalog.tiers, cart_line.quantity, to_base).map_err(|e| match e {
        PricingError::Overflow { .. } => CoreError::LineOverflow { line },
        other => other.into(),
    })?;

    Ok(CheckoutLineItem {
        id,
        product_id: cart_line.product_id.clone(),
        variant_id: cart_line.variant_id.clone(),
        unit_id: cart_line.unit_id.clone(),
        product_name: catalog.product_name.clone(),
        variant_label: catalog.variant_label(),
        sku: catalog.sku.clone(),
        unit_name: catalog.unit_name.clone(),
        quantity: cart_line.quantity,
        to_base,
        base_quantity: price.base_quantity,
        unit_price: price.unit_price,
        line_total: price.line_total,
    })
}

// =============================================================================
// Stock Reservations
// =============================================================================

/// Locked level and running reservation for one variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reservation {
    /// Level read under the lock.
    pub available: i64,
    /// Base units claimed by earlier lines of this checkout.
    pub reserved: i64,
}

/// Per-variant bookkeeping for one checkout.
///
/// Several lines may sell the same variant in different units. The lock is
/// taken once, each line reserves against what is left, and the stock row is
/// decremented once with the total.
#[derive(Debug, Default)]
pub struct StockReservations {
    entries: BTreeMap<String, Reservation>,
}

impl StockReservations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_locked(&self, variant_id: &str) -> bool {
        self.entries.contains_key(variant_id)
    }

    /// Records the level read when the variant's stock row was locked.
    pub fn lock(&mut self, variant_id: impl Into<String>, available: i64) {
        self.entries.entry(variant_id.into()).or_insert(Reservation {
            available,
            reserved: 0,
        });
    }

    pub fn get(&self, variant_id: &str) -> Option<Reservation> {
        self.entries.get(variant_id).copied()
    }

    /// Claims `base_quantity` units for line `line`.
    ///
    /// On shortage the error reports the locked level and the cumulative
    /// request for the variant, including earlier lines.
    pub fn reserve(
        &mut self,
        line: usize,
        variant_id: &str,
        product_name: &str,
        base_quantity: i64,
    ) -> CoreResult<()> {
        let entry = self
            .entries
            .get_mut(variant_id)
            .ok_or_else(|| CoreError::VariantNotFound(variant_id.to_string()))?;

        let requested = entry
            .reserved
            .checked_add(base_quantity)
            .ok_or(CoreError::LineOverflow { line })?;

        if requested > entry.available {
            return Err(CoreError::InsufficientStock {
                product: product_name.to_string(),
                available: entry.available,
                requested,
            });
        }

        entry.reserved = requested;
        Ok(())
    }

    /// `(variant_id, total)` for every variant with something reserved, in
    /// variant id order.
    pub fn decrements(&self) -> impl Iterator<Item = (&str, i64)> + '_ {
        self.entries
            .iter()
            .filter(|(_, r)| r.reserved > 0)
            .map(|(id, r)| (id.as_str(), r.reserved))
    }
}

// =============================================================================
// Result Assembly
// =============================================================================

impl CheckoutResult {
    /// Builds the result from priced lines. `grand_total` equals `subtotal`.
    pub fn assemble(
        id: String,
        transaction_number: String,
        payment_method: PaymentMethod,
        created_at: DateTime<Utc>,
        items: Vec<CheckoutLineItem>,
    ) -> CoreResult<Self> {
        let subtotal = items
            .iter()
            .enumerate()
            .try_fold(Money::zero(), |acc, (line, item)| {
                acc.checked_add(item.line_total)
                    .ok_or(CoreError::LineOverflow { line })
            })?;

        Ok(CheckoutResult {
            id,
            transaction_number,
            payment_method,
            created_at,
            line_count: items.len() as i64,
            items,
            subtotal,
            grand_total: subtotal,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
