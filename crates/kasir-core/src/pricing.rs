//! # Tiered Price Evaluator
//!
//! A variant is priced per BASE unit through ordered quantity tiers:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Tiers: [ {min 1, 75,000}, {min 12, 70,000} ]                           │
//! │                                                                         │
//! │  Request: 2 × Dozen (toBase 12)                                         │
//! │      │                                                                  │
//! │      ▼                                                                  │
//! │  baseQty    = 2 × 12          = 24   → tier {min 12}                    │
//! │  unitPrice  = 70,000 × 12     = 840,000                                 │
//! │  lineTotal  = 2 × 840,000     = 1,680,000                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Tier choice depends on `baseQty`, never on the raw quantity, so the
//! operator's choice of unit cannot dodge a tier boundary.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::PricingError;
use crate::money::Money;

/// Price per base unit from `min_quantity` base units upwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PricingTier {
    pub min_quantity: i64,
    pub price: Money,
}

impl PricingTier {
    pub fn new(min_quantity: i64, price: i64) -> Self {
        PricingTier {
            min_quantity,
            price: Money::from_minor(price),
        }
    }
}

/// Result of pricing one cart line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinePrice {
    pub base_quantity: i64,
    /// Price per base unit of the selected tier.
    pub tier_price: Money,
    /// Price per requested unit (`tier_price × to_base`).
    pub unit_price: Money,
    pub line_total: Money,
}

/// Checks the invariants a stored tier list must satisfy.
///
/// ## Rules
/// - At least one tier
/// - First tier starts at exactly 1 base unit
/// - Minimums strictly ascending (sorted, no duplicates)
/// - No negative prices
pub fn validate_tiers(tiers: &[PricingTier]) -> Result<(), PricingError> {
    let first = tiers.first().ok_or(PricingError::NoTiers)?;
    if first.min_quantity != 1 {
        return Err(PricingError::FirstTierNotOne {
            min_quantity: first.min_quantity,
        });
    }

    for pair in tiers.windows(2) {
        if pair[1].min_quantity <= pair[0].min_quantity {
            return Err(PricingError::NotAscending {
                previous: pair[0].min_quantity,
                current: pair[1].min_quantity,
            });
        }
    }

    if let Some(tier) = tiers.iter().find(|t| t.price.is_negative()) {
        return Err(PricingError::NegativePrice {
            min_quantity: tier.min_quantity,
        });
    }

    Ok(())
}

/// Picks the tier for `base_quantity`.
///
/// The tier with the largest `min_quantity <= base_quantity` wins (inclusive
/// lower bound). If none qualifies the tier with the smallest minimum is
/// used. Input order does not matter.
pub fn select_tier(tiers: &[PricingTier], base_quantity: i64) -> Result<&PricingTier, PricingError> {
    tiers
        .iter()
        .filter(|t| t.min_quantity <= base_quantity)
        .max_by_key(|t| t.min_quantity)
        .or_else(|| tiers.iter().min_by_key(|t| t.min_quantity))
        .ok_or(PricingError::NoTiers)
}

/// Prices `quantity` units of a unit whose factor to base is `to_base`.
pub fn price_line(tiers: &[PricingTier], quantity: i64, to_base: i64) -> Result<LinePrice, PricingError> {
    let overflow = || PricingError::Overflow { quantity, to_base };

    let base_quantity = quantity.checked_mul(to_base).ok_or_else(overflow)?;
    let tier = select_tier(tiers, base_quantity)?;
    let unit_price = tier.price.checked_mul(to_base).ok_or_else(overflow)?;
    let line_total = unit_price.checked_mul(quantity).ok_or_else(overflow)?;

    Ok(LinePrice {
        base_quantity,
        tier_price: tier.price,
        unit_price,
        line_total,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn eggs() -> Vec<PricingTier> {
        vec![PricingTier::new(1, 75_000), PricingTier::new(12, 70_000)]
    }

    #[test]
    fn test_dozen_hits_bulk_tier() {
        let line = price_line(&eggs(), 2, 12).unwrap();
        assert_eq!(line.base_quantity, 24);
        assert_eq!(line.tier_price.amount(), 70_000);
        assert_eq!(line.unit_price.amount(), 840_000);
        assert_eq!(line.line_total.amount(), 1_680_000);
    }

    #[test]
    fn test_boundary_is_inclusive() {
        assert_eq!(select_tier(&eggs(), 11).unwrap().min_quantity, 1);
        assert_eq!(select_tier(&eggs(), 12).unwrap().min_quantity, 12);
        assert_eq!(select_tier(&eggs(), 13).unwrap().min_quantity, 12);
    }

    #[test]
    fn test_same_quantity_different_unit() {
        // 2 pieces stays on the retail tier, 2 dozen does not
        assert_eq!(price_line(&eggs(), 2, 1).unwrap().tier_price.amount(), 75_000);
        assert_eq!(price_line(&eggs(), 2, 12).unwrap().tier_price.amount(), 70_000);
    }

    #[test]
    fn test_fallback_to_smallest_tier() {
        let tiers = vec![PricingTier::new(5, 900), PricingTier::new(10, 800)];
        assert_eq!(select_tier(&tiers, 2).unwrap().min_quantity, 5);
    }

    #[test]
    fn test_unsorted_input() {
        let tiers = vec![
            PricingTier::new(50, 600),
            PricingTier::new(1, 1000),
            PricingTier::new(10, 800),
        ];
        assert_eq!(select_tier(&tiers, 30).unwrap().min_quantity, 10);
    }

    #[test]
    fn test_empty_tiers() {
        assert_eq!(select_tier(&[], 1), Err(PricingError::NoTiers));
        assert_eq!(price_line(&[], 1, 1), Err(PricingError::NoTiers));
    }

    #[test]
    fn test_overflow_is_an_error() {
        let err = price_line(&eggs(), i64::MAX, 12).unwrap_err();
        assert!(matches!(err, PricingError::Overflow { .. }));
    }

    #[test]
    fn test_validate_tiers() {
        assert!(validate_tiers(&eggs()).is_ok());
        assert_eq!(validate_tiers(&[]), Err(PricingError::NoTiers));
        assert_eq!(
            validate_tiers(&[PricingTier::new(2, 100)]),
            Err(PricingError::FirstTierNotOne { min_quantity: 2 })
        );
        assert_eq!(
            validate_tiers(&[
                PricingTier::new(1, 100),
                PricingTier::new(12, 90),
                PricingTier::new(12, 80)
            ]),
            Err(PricingError::NotAscending {
                previous: 12,
                current: 12
            })
        );
        assert_eq!(
            validate_tiers(&[PricingTier::new(1, 100), PricingTier::new(6, 120), PricingTier::new(3, 110)]),
            Err(PricingError::NotAscending {
                previous: 6,
                current: 3
            })
        );
        assert_eq!(
            validate_tiers(&[PricingTier::new(1, -1)]),
            Err(PricingError::NegativePrice { min_quantity: 1 })
        );
    }

    proptest! {
        #[test]
        fn prop_selected_tier_is_largest_qualifying(
            mins in proptest::collection::btree_set(2i64..500, 0..8),
            quantity in 1i64..100,
            to_base in 1i64..20,
        ) {
            let mut tiers = vec![PricingTier::new(1, 1000)];
            tiers.extend(mins.iter().map(|&m| PricingTier::new(m, 1000 - m)));

            let base = quantity * to_base;
            let line = price_line(&tiers, quantity, to_base).unwrap();
            let expected = tiers
                .iter()
                .map(|t| t.min_quantity)
                .filter(|&m| m <= base)
                .max()
                .unwrap();
            let chosen = tiers.iter().find(|t| t.price == line.tier_price).unwrap();
            prop_assert_eq!(chosen.min_quantity, expected);
            prop_assert_eq!(line.line_total.amount(), line.tier_price.amount() * to_base * quantity);
        }
    }
}
