//! # Error Types
//!
//! Domain-specific error types for kasir-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  kasir-core errors (this file)                                         │
//! │  ├── CoreError        - Checkout/domain failures (wraps the rest)      │
//! │  ├── ValidationError  - Field-level input failures                     │
//! │  ├── UnitGraphError   - One variant per unit graph rule                │
//! │  ├── PricingError     - Tier list problems                             │
//! │  └── SequenceError    - Document number problems                       │
//! │                                                                         │
//! │  kasir-db errors (separate crate)                                      │
//! │  ├── DbError          - Database operation failures                    │
//! │  └── CheckoutError    - CoreError | DbError, with ErrorKind            │
//! │                                                                         │
//! │  Flow: UnitGraphError → CoreError → CheckoutError → (code, message)    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Error Kinds
//! Every error maps onto one [`ErrorKind`]. Callers branch on the kind:
//! `Internal` failures are safe to retry, everything else goes back to the
//! operator for correction.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

// =============================================================================
// Error Kind
// =============================================================================

/// Machine-readable failure category.
///
/// Serialized as `VALIDATION`, `CONFLICT`, `NOT_FOUND`, `INTERNAL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Malformed or policy-violating input. Nothing was mutated.
    Validation,
    /// Request conflicts with current state (insufficient stock).
    Conflict,
    /// A referenced product, variant or unit does not exist.
    NotFound,
    /// Storage or infrastructure failure. Safe to retry.
    Internal,
}

impl ErrorKind {
    /// Returns the wire code for this kind.
    pub const fn code(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "VALIDATION",
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Internal => "INTERNAL",
        }
    }

    /// Only infrastructure failures are worth retrying unchanged.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Internal)
    }
}

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These errors represent business rule violations or domain logic failures.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Product cannot be found.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Variant cannot be found (or belongs to another product).
    #[error("Variant not found: {0}")]
    VariantNotFound(String),

    /// Unit cannot be found (or belongs to another product).
    #[error("Unit not found: {0}")]
    UnitNotFound(String),

    /// Insufficient stock to complete sale.
    ///
    /// ## User Workflow
    /// ```text
    /// Checkout line: 2 × Dozen (toBase 12) → 24 base units
    ///      │
    ///      ▼
    /// Locked stock: available=10
    ///      │
    ///      ▼
    /// InsufficientStock { product: "Eggs", available: 10, requested: 24 }
    ///      │
    ///      ▼
    /// Whole checkout rolls back
    /// ```
    #[error("Insufficient stock for {product}: available {available}, requested {requested}")]
    InsufficientStock {
        product: String,
        available: i64,
        requested: i64,
    },

    /// Payment method outside the allow-list.
    #[error("Invalid payment method")]
    InvalidPaymentMethod(String),

    /// Checkout requested with no lines.
    #[error("Cart is empty")]
    EmptyCart,

    /// A line requested zero or a negative quantity.
    #[error("Item quantity must be greater than zero")]
    NonPositiveQuantity { line: usize },

    /// Cart has exceeded maximum allowed lines.
    #[error("Cart cannot have more than {max} lines")]
    CartTooLarge { max: usize },

    /// Quantity or money arithmetic on a line does not fit in 64 bits.
    #[error("Line {line} is too large to price")]
    LineOverflow { line: usize },

    /// Unit declarations are malformed.
    #[error(transparent)]
    UnitGraph(#[from] UnitGraphError),

    /// Pricing tiers are malformed.
    #[error(transparent)]
    Pricing(#[from] PricingError),

    /// Document numbering failed.
    #[error(transparent)]
    Sequence(#[from] SequenceError),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Categorizes this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::ProductNotFound(_)
            | CoreError::VariantNotFound(_)
            | CoreError::UnitNotFound(_) => ErrorKind::NotFound,
            CoreError::InsufficientStock { .. } => ErrorKind::Conflict,
            CoreError::Sequence(_) => ErrorKind::Internal,
            CoreError::InvalidPaymentMethod(_)
            | CoreError::EmptyCart
            | CoreError::NonPositiveQuantity { .. }
            | CoreError::CartTooLarge { .. }
            | CoreError::LineOverflow { .. }
            | CoreError::UnitGraph(_)
            | CoreError::Pricing(_)
            | CoreError::Validation(_) => ErrorKind::Validation,
        }
    }
}

// =============================================================================
// Unit Graph Error
// =============================================================================

/// Unit declaration failures, in the order the rules are checked.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnitGraphError {
    /// Rule 1: a unit has a blank name.
    #[error("unit name is required")]
    EmptyName,

    /// Rule 1: two units share a name (case-insensitive).
    #[error("duplicate unit name: {0}")]
    DuplicateName(String),

    /// Rule 2: zero or several units carry the base flag.
    #[error("exactly one base unit is required")]
    BaseUnitCount { found: usize },

    /// Rule 3: non-base unit without a positive factor.
    #[error("unit {unit} must declare a positive conversion factor")]
    NonPositiveFactor { unit: String },

    /// Rule 3: non-base unit without a converts-to name.
    #[error("unit {unit} must declare the unit it converts to")]
    MissingTarget { unit: String },

    /// Rule 3: converts-to names a unit that was not declared.
    #[error("unit {unit} converts to unknown unit {target}")]
    UnknownTarget { unit: String, target: String },

    /// Rule 4: walking converts-to revisits a unit.
    #[error("circular unit reference detected")]
    CircularReference { unit: String },

    /// The multiplied factor does not fit in 64 bits.
    #[error("conversion factor of unit {unit} is too large")]
    FactorOverflow { unit: String },
}

// =============================================================================
// Pricing Error
// =============================================================================

/// Tier list failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PricingError {
    /// No tiers to pick from.
    #[error("pricing tier list is empty")]
    NoTiers,

    /// First tier does not start at one base unit.
    #[error("first pricing tier must start at quantity 1, found {min_quantity}")]
    FirstTierNotOne { min_quantity: i64 },

    /// Tiers are out of order or repeat a minimum.
    #[error("pricing tiers must be strictly ascending: {current} follows {previous}")]
    NotAscending { previous: i64, current: i64 },

    /// A tier carries a negative price.
    #[error("pricing tier at quantity {min_quantity} has a negative price")]
    NegativePrice { min_quantity: i64 },

    /// Unit price or line total does not fit in 64 bits.
    #[error("price of {quantity} × {to_base} base units is too large")]
    Overflow { quantity: i64, to_base: i64 },
}

// =============================================================================
// Sequence Error
// =============================================================================

/// Document number failures. These fail closed: no number is issued.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SequenceError {
    /// The fixed-width counter for this year is used up.
    #[error("{prefix}-{year} sequence exhausted at {max}")]
    Exhausted { prefix: String, year: i32, max: u32 },

    /// A persisted number could not be parsed.
    #[error("malformed document number: {0}")]
    Malformed(String),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when user input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Invalid format (e.g., invalid UUID, bad SKU characters).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Duplicate value (e.g., duplicate SKU within one product).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
