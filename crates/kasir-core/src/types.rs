//! # Domain Types
//!
//! Core domain types used throughout Kasir.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │ ProductVariant  │   │   StockLevel    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │──►│  sku (business) │──►│  variant_id     │       │
//! │  │  name           │   │  attributes     │   │  quantity (base)│       │
//! │  │  units[]        │   │  tiers[]        │   └─────────────────┘       │
//! │  └─────────────────┘   └─────────────────┘                             │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │ CheckoutRequest │──►│ CheckoutResult  │──►│StockMovementEntry│      │
//! │  │  payment_method │   │  number, items  │   │  quantity < 0   │       │
//! │  │  lines[]        │   │  totals         │   │  (append-only)  │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business ID: (sku, transaction_number) - human-readable

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::CoreError;
use crate::money::Money;
use crate::pricing::PricingTier;
use crate::units::UnitDeclaration;

// =============================================================================
// Payment Method
// =============================================================================

/// Accepted payment methods. Anything else is rejected at checkout.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    /// Physical cash payment.
    Cash,
    /// Card payment on external terminal.
    Card,
    /// QR code payment (QRIS).
    Qris,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 3] = [PaymentMethod::Cash, PaymentMethod::Card, PaymentMethod::Qris];

    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::Qris => "qris",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = CoreError;

    /// Exact, lowercase match against the allow-list.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PaymentMethod::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| CoreError::InvalidPaymentMethod(s.to_string()))
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Catalog
// =============================================================================

/// A product with its units and sellable variants.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Display name shown to cashier and on receipt.
    pub name: String,

    /// Units in creation order (base first).
    pub units: Vec<ProductUnit>,

    pub variants: Vec<ProductVariant>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Finds a unit by name, ignoring case.
    pub fn unit_named(&self, name: &str) -> Option<&ProductUnit> {
        self.units.iter().find(|u| u.name.eq_ignore_ascii_case(name))
    }
}

/// A persisted unit of measure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductUnit {
    pub id: String,
    pub product_id: String,
    pub name: String,
    pub is_base: bool,
    pub conversion_factor: i64,
    /// Parent unit id; `None` only for the base unit.
    pub converts_to_unit_id: Option<String>,
    /// Denormalized factor to the base unit, written at creation.
    pub to_base: i64,
}

/// One descriptive attribute of a variant, e.g. `Color = Red`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct VariantAttribute {
    pub name: String,
    pub value: String,
}

impl VariantAttribute {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        VariantAttribute {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Receipt label for a variant: attribute values joined by ` / `.
///
/// ## Example
/// ```rust
/// use kasir_core::types::{variant_label, VariantAttribute};
///
/// let attrs = vec![VariantAttribute::new("Color", "Red"), VariantAttribute::new("Size", "L")];
/// assert_eq!(variant_label(&attrs), "Red / L");
/// assert_eq!(variant_label(&[]), "Default");
/// ```
pub fn variant_label(attributes: &[VariantAttribute]) -> String {
    let values: Vec<&str> = attributes
        .iter()
        .map(|a| a.value.trim())
        .filter(|v| !v.is_empty())
        .collect();

    if values.is_empty() {
        "Default".to_string()
    } else {
        values.join(" / ")
    }
}

/// A sellable variant of a product. Stock and prices hang off the variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductVariant {
    pub id: String,
    pub product_id: String,
    /// Stock Keeping Unit - business identifier.
    pub sku: String,
    pub attributes: Vec<VariantAttribute>,
    /// Sorted ascending by `min_quantity`.
    pub tiers: Vec<PricingTier>,
}

impl ProductVariant {
    pub fn label(&self) -> String {
        variant_label(&self.attributes)
    }
}

/// Base units on hand for one variant. Never negative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockLevel {
    pub variant_id: String,
    pub quantity: i64,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a product with its units and variants in one go.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewProduct {
    pub name: String,
    /// Declared units, any order.
    pub units: Vec<UnitDeclaration>,
    pub variants: Vec<NewVariant>,
}

/// Input for one variant of a [`NewProduct`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewVariant {
    pub sku: String,
    #[serde(default)]
    pub attributes: Vec<VariantAttribute>,
    pub tiers: Vec<PricingTier>,
    /// Opening stock in base units.
    #[serde(default)]
    pub initial_stock: i64,
}

// =============================================================================
// Checkout Input
// =============================================================================

/// One line of a checkout request. Not persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartLine {
    pub product_id: String,
    pub variant_id: String,
    pub unit_id: String,
    /// Quantity in the chosen unit, not in base units.
    pub quantity: i64,
}

/// A checkout request as it arrives from the till.
///
/// `payment_method` stays a string here so an unknown method is reported as
/// a checkout validation failure instead of a deserialization error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CheckoutRequest {
    pub payment_method: String,
    pub lines: Vec<CartLine>,
}

impl CheckoutRequest {
    pub fn new(payment_method: impl Into<String>, lines: Vec<CartLine>) -> Self {
        CheckoutRequest {
            payment_method: payment_method.into(),
            lines,
        }
    }
}

// =============================================================================
// Checkout Output
// =============================================================================

/// A sold line.
///
/// Uses snapshot pattern to freeze catalog data at time of sale, so old
/// receipts do not change when products are renamed or re-priced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CheckoutLineItem {
    pub id: String,
    pub product_id: String,
    pub variant_id: String,
    pub unit_id: String,
    /// Product name at time of sale (frozen).
    pub product_name: String,
    /// Variant label at time of sale (frozen).
    pub variant_label: String,
    /// SKU at time of sale (frozen).
    pub sku: String,
    /// Unit name at time of sale (frozen).
    pub unit_name: String,
    /// Quantity in `unit_name`.
    pub quantity: i64,
    pub to_base: i64,
    /// `quantity × to_base`, what left the shelf.
    pub base_quantity: i64,
    /// Price of one `unit_name` (tier price × to_base).
    pub unit_price: Money,
    pub line_total: Money,
}

/// Immutable record of one successful checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CheckoutResult {
    pub id: String,
    /// `TRX-<YEAR>-<NNNNNN>`.
    pub transaction_number: String,
    pub payment_method: PaymentMethod,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    pub items: Vec<CheckoutLineItem>,
    pub subtotal: Money,
    /// Equal to `subtotal` until discounts or taxes exist.
    pub grand_total: Money,
    pub line_count: i64,
}

// =============================================================================
// Stock Movement Ledger
// =============================================================================

/// Why stock moved.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    /// Sold at checkout (negative).
    Sale,
    /// Opening balance when the variant was created (positive).
    Initial,
}

/// An append-only ledger row. Never updated, never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockMovementEntry {
    pub id: String,
    pub variant_id: String,
    pub product_id: String,
    /// Checkout that caused the movement, if any.
    pub transaction_id: Option<String>,
    pub movement_type: MovementType,
    /// Signed base units: negative for sales.
    pub quantity: i64,
    /// Human reference, e.g. the transaction number.
    pub reference: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_method_allow_list() {
        assert_eq!("cash".parse::<PaymentMethod>().unwrap(), PaymentMethod::Cash);
        assert_eq!("card".parse::<PaymentMethod>().unwrap(), PaymentMethod::Card);
        assert_eq!("qris".parse::<PaymentMethod>().unwrap(), PaymentMethod::Qris);

        let err = "bitcoin".parse::<PaymentMethod>().unwrap_err();
        assert_eq!(err.to_string(), "Invalid payment method");
        assert!("CASH".parse::<PaymentMethod>().is_err());
    }

    #[test]
    fn test_payment_method_serde() {
        let json = serde_json::to_string(&PaymentMethod::Qris).unwrap();
        assert_eq!(json, "\"qris\"");
    }

    #[test]
    fn test_variant_label() {
        let attrs = vec![
            VariantAttribute::new("Color", "Red"),
            VariantAttribute::new("Size", " "),
            VariantAttribute::new("Fit", "Slim"),
        ];
        assert_eq!(variant_label(&attrs), "Red / Slim");
        assert_eq!(variant_label(&[]), "Default");
    }
}
