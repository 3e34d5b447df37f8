//! # Document Numbers
//!
//! Year-scoped, zero-padded document identifiers:
//!
//! ```text
//! SalesTransaction   TRX-2026-000001 ... TRX-2026-999999
//! PurchaseOrder      PO-2026-0001    ... PO-2026-9999
//! ```
//!
//! The padding is fixed, so within one year lexicographic order equals
//! numeric order and "greatest persisted number" is a plain `MAX()`.
//! The counter restarts at 1 every calendar year.
//!
//! This module only knows the format. Reading and bumping the persisted
//! counter happens in kasir-db inside the caller's unit of work.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::SequenceError;

/// Kinds of numbered documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    SalesTransaction,
    PurchaseOrder,
}

impl DocumentKind {
    /// Leading segment of the identifier.
    pub const fn prefix(&self) -> &'static str {
        match self {
            DocumentKind::SalesTransaction => "TRX",
            DocumentKind::PurchaseOrder => "PO",
        }
    }

    /// Digits in the trailing sequence segment.
    pub const fn width(&self) -> usize {
        match self {
            DocumentKind::SalesTransaction => 6,
            DocumentKind::PurchaseOrder => 4,
        }
    }

    /// Largest sequence that still fits the width.
    pub const fn max_sequence(&self) -> u32 {
        match self {
            DocumentKind::SalesTransaction => 999_999,
            DocumentKind::PurchaseOrder => 9_999,
        }
    }

    /// `TRX-2026-`, the part shared by every number of that year.
    pub fn year_prefix(&self, year: i32) -> String {
        format!("{}-{}-", self.prefix(), year)
    }

    /// Formats sequence `seq` for `year`.
    ///
    /// ## Example
    /// ```rust
    /// use kasir_core::sequence::DocumentKind;
    ///
    /// assert_eq!(DocumentKind::SalesTransaction.format(2026, 7).unwrap(), "TRX-2026-000007");
    /// assert_eq!(DocumentKind::PurchaseOrder.format(2026, 42).unwrap(), "PO-2026-0042");
    /// ```
    pub fn format(&self, year: i32, seq: u32) -> Result<String, SequenceError> {
        if seq == 0 || seq > self.max_sequence() {
            return Err(SequenceError::Exhausted {
                prefix: self.prefix().to_string(),
                year,
                max: self.max_sequence(),
            });
        }
        Ok(format!("{}{:0width$}", self.year_prefix(year), seq, width = self.width()))
    }

    /// Extracts the sequence from a number issued for `year`.
    pub fn parse(&self, year: i32, number: &str) -> Result<u32, SequenceError> {
        let malformed = || SequenceError::Malformed(number.to_string());

        let digits = number
            .strip_prefix(&self.year_prefix(year))
            .ok_or_else(malformed)?;
        if digits.len() != self.width() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }
        digits.parse().map_err(|_| malformed())
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentKind::SalesTransaction => write!(f, "sales_transaction"),
            DocumentKind::PurchaseOrder => write!(f, "purchase_order"),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_number_of_year() {
        let kind = DocumentKind::SalesTransaction;
        assert_eq!(kind.format(2026, 1).unwrap(), "TRX-2026-000001");
        assert_eq!(DocumentKind::PurchaseOrder.format(2026, 1).unwrap(), "PO-2026-0001");
    }

    #[test]
    fn test_increment() {
        let kind = DocumentKind::SalesTransaction;
        let last = kind.parse(2026, "TRX-2026-000041").unwrap();
        assert_eq!(kind.format(2026, last + 1).unwrap(), "TRX-2026-000042");
    }

    #[test]
    fn test_padding_keeps_lexicographic_order() {
        let kind = DocumentKind::PurchaseOrder;
        let nine = kind.format(2026, 9).unwrap();
        let ten = kind.format(2026, 10).unwrap();
        assert!(nine < ten);
    }

    #[test]
    fn test_exhausted() {
        let kind = DocumentKind::PurchaseOrder;
        assert_eq!(kind.format(2026, 9999).unwrap(), "PO-2026-9999");
        let err = kind.format(2026, 10_000).unwrap_err();
        assert_eq!(
            err,
            SequenceError::Exhausted {
                prefix: "PO".into(),
                year: 2026,
                max: 9999
            }
        );
    }

    #[test]
    fn test_malformed_fails_closed() {
        let kind = DocumentKind::SalesTransaction;
        assert!(kind.parse(2026, "TRX-2025-000001").is_err());
        assert!(kind.parse(2026, "TRX-2026-01").is_err());
        assert!(kind.parse(2026, "TRX-2026-00000a").is_err());
        assert!(kind.parse(2026, "garbage").is_err());
        assert_eq!(kind.parse(2026, "TRX-2026-000123").unwrap(), 123);
    }

    #[test]
    fn test_display_matches_serde() {
        let json = serde_json::to_string(&DocumentKind::PurchaseOrder).unwrap();
        assert_eq!(json, format!("\"{}\"", DocumentKind::PurchaseOrder));
    }
}
