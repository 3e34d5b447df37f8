//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Tier prices are stored per BASE unit and scaled up:                    │
//! │                                                                         │
//! │    tier price 70,000 × toBase 12   = unit price 840,000                 │
//! │    unit price 840,000 × quantity 2 = line total 1,680,000               │
//! │                                                                         │
//! │  Floats would drift across those multiplications. Integers cannot,     │
//! │  and every multiplication is CHECKED so overflow becomes an error      │
//! │  instead of a wrapped (or panicking) total.                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use kasir_core::money::Money;
//!
//! let tier_price = Money::from_minor(70_000);
//! let unit_price = tier_price.checked_mul(12).unwrap();
//! assert_eq!(unit_price.amount(), 840_000);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};
use ts_rs::TS;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit.
///
/// ## Design Decisions
/// - **i64 (signed)**: room for refunds and adjustments
/// - **Single field tuple struct**: zero-cost abstraction over i64
/// - **No float constructor**: there is no way to build Money from f64
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from the smallest currency unit.
    #[inline]
    pub const fn from_minor(amount: i64) -> Self {
        Money(amount)
    }

    /// Returns the raw amount in the smallest currency unit.
    #[inline]
    pub const fn amount(&self) -> i64 {
        self.0
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Multiplies by a quantity or conversion factor, `None` on overflow.
    ///
    /// ## Example
    /// ```rust
    /// use kasir_core::money::Money;
    ///
    /// let unit_price = Money::from_minor(840_000);
    /// assert_eq!(unit_price.checked_mul(2), Some(Money::from_minor(1_680_000)));
    /// assert_eq!(Money::from_minor(i64::MAX).checked_mul(2), None);
    /// ```
    #[inline]
    pub const fn checked_mul(&self, factor: i64) -> Option<Self> {
        match self.0.checked_mul(factor) {
            Some(v) => Some(Money(v)),
            None => None,
        }
    }

    /// Adds two amounts, `None` on overflow.
    #[inline]
    pub const fn checked_add(&self, other: Money) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(v) => Some(Money(v)),
            None => None,
        }
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Shows the amount with thousands separators, e.g. `1,680,000`.
///
/// ## Note
/// This is for logs and debugging. Receipts format currency in the frontend.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.0.unsigned_abs().to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(ch);
        }
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}", sign, grouped)
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_minor() {
        let money = Money::from_minor(75_000);
        assert_eq!(money.amount(), 75_000);
        assert!(!money.is_zero());
        assert!(!money.is_negative());
    }

    #[test]
    fn test_display_groups_thousands() {
        assert_eq!(Money::from_minor(1_680_000).to_string(), "1,680,000");
        assert_eq!(Money::from_minor(999).to_string(), "999");
        assert_eq!(Money::from_minor(1_000).to_string(), "1,000");
        assert_eq!(Money::from_minor(-30_000).to_string(), "-30,000");
        assert_eq!(Money::zero().to_string(), "0");
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_minor(1000);
        let b = Money::from_minor(500);

        assert_eq!((a + b).amount(), 1500);
        assert_eq!((a - b).amount(), 500);

        let mut c = a;
        c += b;
        assert_eq!(c.amount(), 1500);
    }

    #[test]
    fn test_checked_operations() {
        assert_eq!(
            Money::from_minor(70_000).checked_mul(12),
            Some(Money::from_minor(840_000))
        );
        assert_eq!(Money::from_minor(i64::MAX).checked_mul(2), None);
        assert_eq!(Money::from_minor(i64::MAX).checked_add(Money::from_minor(1)), None);
    }

    #[test]
    fn test_sum() {
        let totals = [Money::from_minor(10_000), Money::from_minor(20_000)];
        let subtotal: Money = totals.iter().sum();
        assert_eq!(subtotal.amount(), 30_000);
    }
}
