//! # Document Sequence Repository
//!
//! Issues `TRX-<YEAR>-<NNNNNN>` and `PO-<YEAR>-<NNNN>` numbers.
//!
//! ## Counter
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  document_sequences (kind, year) → last_value                          │
//! │                                                                         │
//! │  1. INSERT ... VALUES (kind, year, 1)                                  │
//! │     ON CONFLICT DO UPDATE SET last_value = last_value + 1              │
//! │     RETURNING last_value                                               │
//! │                                                                         │
//! │  2. floor = greatest persisted number for the year (0 if none)         │
//! │                                                                         │
//! │  3. floor >= last_value → UPDATE SET last_value = floor + 1            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The increment is a write, so it takes SQLite's write lock before anything
//! is read and concurrent callers queue on the busy timeout. Increment and
//! read are one statement inside the caller's unit of work, so two checkouts
//! can never be handed the same number. The floor keeps the counter ahead of
//! documents written before the counter existed. A new year starts a new
//! row, so numbering restarts at 1.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbResult, ServiceError};
use kasir_core::error::SequenceError;
use kasir_core::DocumentKind;

/// Repository for document counters.
#[derive(Debug, Clone)]
pub struct SequenceRepository {
    pool: SqlitePool,
}

impl SequenceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SequenceRepository { pool }
    }

    /// Issues the next number in its own transaction.
    ///
    /// Checkout does not use this; it calls [`next_document_number`] on its
    /// own unit of work.
    pub async fn next(&self, kind: DocumentKind, year: i32) -> Result<String, ServiceError> {
        let mut tx = self.pool.begin().await?;
        let number = next_document_number(&mut *tx, kind, year).await?;
        tx.commit().await?;

        info!(kind = %kind, number = %number, "Document number issued");
        Ok(number)
    }

    /// Last sequence issued for `kind` in `year`, if any.
    pub async fn last_issued(&self, kind: DocumentKind, year: i32) -> DbResult<Option<i64>> {
        let value: Option<i64> = sqlx::query_scalar(
            "SELECT last_value FROM document_sequences WHERE kind = ?1 AND year = ?2",
        )
        .bind(kind)
        .bind(year)
        .fetch_optional(&self.pool)
        .await?;

        Ok(value)
    }
}

/// Increments and reads the counter for `(kind, year)` on `conn`.
///
/// Fails closed: a storage error or an unparseable persisted number
/// returns an error and no number is issued.
pub async fn next_document_number(
    conn: &mut SqliteConnection,
    kind: DocumentKind,
    year: i32,
) -> Result<String, ServiceError> {
    let mut value: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO document_sequences (kind, year, last_value)
        VALUES (?1, ?2, 1)
        ON CONFLICT (kind, year) DO UPDATE SET last_value = last_value + 1
        RETURNING last_value
        "#,
    )
    .bind(kind)
    .bind(year)
    .fetch_one(&mut *conn)
    .await?;

    let floor = persisted_floor(conn, kind, year).await?;
    if floor >= value {
        value = sqlx::query_scalar(
            r#"
            UPDATE document_sequences SET last_value = ?3 + 1
            WHERE kind = ?1 AND year = ?2
            RETURNING last_value
            "#,
        )
        .bind(kind)
        .bind(year)
        .bind(floor)
        .fetch_one(&mut *conn)
        .await?;
    }

    let seq = u32::try_from(value).map_err(|_| SequenceError::Exhausted {
        prefix: kind.prefix().to_string(),
        year,
        max: kind.max_sequence(),
    })?;
    let number = kind.format(year, seq)?;

    debug!(kind = %kind, year, floor, number = %number, "Sequence advanced");
    Ok(number)
}

/// Greatest sequence already persisted for the year, read from the
/// documents themselves.
///
/// Runs after the counter row is written, so the caller already holds the
/// write lock.
async fn persisted_floor(
    conn: &mut SqliteConnection,
    kind: DocumentKind,
    year: i32,
) -> Result<i64, ServiceError> {
    let greatest: Option<String> = match kind {
        DocumentKind::SalesTransaction => {
            sqlx::query_scalar(
                "SELECT MAX(transaction_number) FROM sales_transactions WHERE transaction_number LIKE ?1",
            )
            .bind(format!("{}%", kind.year_prefix(year)))
            .fetch_one(&mut *conn)
            .await?
        }
        // Purchase orders are not stored by this crate.
        DocumentKind::PurchaseOrder => None,
    };

    match greatest {
        Some(number) => Ok(i64::from(kind.parse(year, &number)?)),
        None => Ok(0),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use std::time::Duration;

    #[tokio::test]
    async fn test_first_and_following_numbers() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let seq = db.sequences();

        assert_eq!(seq.next(DocumentKind::SalesTransaction, 2026).await.unwrap(), "TRX-2026-000001");
        assert_eq!(seq.next(DocumentKind::SalesTransaction, 2026).await.unwrap(), "TRX-2026-000002");
        assert_eq!(seq.next(DocumentKind::PurchaseOrder, 2026).await.unwrap(), "PO-2026-0001");
        assert_eq!(seq.last_issued(DocumentKind::SalesTransaction, 2026).await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_year_rollover_restarts() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let seq = db.sequences();

        seq.next(DocumentKind::SalesTransaction, 2026).await.unwrap();
        seq.next(DocumentKind::SalesTransaction, 2026).await.unwrap();
        assert_eq!(seq.next(DocumentKind::SalesTransaction, 2027).await.unwrap(), "TRX-2027-000001");
    }

    #[tokio::test]
    async fn test_floor_from_persisted_transactions() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        sqlx::query(
            r#"
            INSERT INTO sales_transactions
                (id, transaction_number, payment_method, subtotal, grand_total, line_count, created_at)
            VALUES ('legacy', 'TRX-2026-000041', 'cash', 0, 0, 0, '2026-01-01T00:00:00Z')
            "#,
        )
        .execute(db.pool())
        .await
        .unwrap();

        let number = db.sequences().next(DocumentKind::SalesTransaction, 2026).await.unwrap();
        assert_eq!(number, "TRX-2026-000042");
    }

    #[tokio::test]
    async fn test_exhausted_fails_closed() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        sqlx::query("INSERT INTO document_sequences (kind, year, last_value) VALUES ('purchase_order', 2026, 9999)")
            .execute(db.pool())
            .await
            .unwrap();

        let err = db.sequences().next(DocumentKind::PurchaseOrder, 2026).await.unwrap_err();
        assert_eq!(err.code(), "INTERNAL");

        // the failed attempt rolled back
        let last = db.sequences().last_issued(DocumentKind::PurchaseOrder, 2026).await.unwrap();
        assert_eq!(last, Some(9999));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_callers_get_distinct_numbers() {
        let dir = tempfile::tempdir().unwrap();
        let config = DbConfig::new(dir.path().join("kasir.db"))
            .max_connections(8)
            .lock_timeout(Duration::from_secs(30));
        let db = Database::new(config).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let seq = db.sequences();
            handles.push(tokio::spawn(async move {
                seq.next(DocumentKind::SalesTransaction, 2026).await
            }));
        }

        let mut numbers = Vec::new();
        for handle in handles {
            numbers.push(handle.await.unwrap().unwrap());
        }
        numbers.sort();

        let expected: Vec<String> = (1..=16).map(|n| format!("TRX-2026-{:06}", n)).collect();
        assert_eq!(numbers, expected);
        assert_eq!(
            db.sequences().last_issued(DocumentKind::SalesTransaction, 2026).await.unwrap(),
            Some(16)
        );
    }
}
