//! # Stock Repository
//!
//! Stock levels per variant, in base units.
//!
//! ## Locking
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  SQLite has no SELECT ... FOR UPDATE. The lock is a write:             │
//! │                                                                         │
//! │    UPDATE stock_levels SET locked_at = ? WHERE variant_id = ?          │
//! │    RETURNING quantity                                                  │
//! │                                                                         │
//! │  The first write of a transaction takes the database write lock and    │
//! │  holds it until COMMIT/ROLLBACK. A second checkout issuing the same    │
//! │  statement waits (busy timeout) and then reads the committed level.    │
//! │                                                                         │
//! │  Checkout A: BEGIN ─ lock(v) ─ ... ─ apply_delta(v,-1) ─ COMMIT         │
//! │  Checkout B: BEGIN ─ lock(v) ......waits...... ─ sees new level        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The lock must be the first statement of the unit of work. A transaction
//! that reads first and writes later cannot wait for the lock in WAL mode.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use kasir_core::StockLevel;

/// Repository for stock level reads.
#[derive(Debug, Clone)]
pub struct StockRepository {
    pool: SqlitePool,
}

impl StockRepository {
    pub fn new(pool: SqlitePool) -> Self {
        StockRepository { pool }
    }

    /// Current level in base units.
    pub async fn level(&self, variant_id: &str) -> DbResult<i64> {
        let quantity: Option<i64> =
            sqlx::query_scalar("SELECT quantity FROM stock_levels WHERE variant_id = ?1")
                .bind(variant_id)
                .fetch_optional(&self.pool)
                .await?;

        quantity.ok_or_else(|| DbError::not_found("Stock level", variant_id))
    }

    /// Full stock row, if the variant has one.
    pub async fn get(&self, variant_id: &str) -> DbResult<Option<StockLevel>> {
        let row = sqlx::query_as::<_, StockRow>(
            r#"
            SELECT variant_id, quantity, updated_at
            FROM stock_levels
            WHERE variant_id = ?1
            "#,
        )
        .bind(variant_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(StockLevel::from))
    }
}

#[derive(sqlx::FromRow)]
struct StockRow {
    variant_id: String,
    quantity: i64,
    updated_at: chrono::DateTime<Utc>,
}

impl From<StockRow> for StockLevel {
    fn from(row: StockRow) -> Self {
        StockLevel {
            variant_id: row.variant_id,
            quantity: row.quantity,
            updated_at: row.updated_at,
        }
    }
}

// =============================================================================
// Unit-of-work operations
// =============================================================================

/// Takes the exclusive lock on a variant's stock row and returns the level.
///
/// `None` if the variant has no stock row. Blocks while another unit of work
/// holds the lock; fails with [`DbError::LockTimeout`] after the busy timeout.
pub async fn lock_for_update(conn: &mut SqliteConnection, variant_id: &str) -> DbResult<Option<i64>> {
    let quantity: Option<i64> = sqlx::query_scalar(
        r#"
        UPDATE stock_levels
        SET locked_at = ?2
        WHERE variant_id = ?1
        RETURNING quantity
        "#,
    )
    .bind(variant_id)
    .bind(Utc::now())
    .fetch_optional(&mut *conn)
    .await?;

    debug!(variant_id = %variant_id, ?quantity, "Stock row locked");
    Ok(quantity)
}

/// Applies a signed change and returns the new level.
///
/// Refuses to take the level below zero.
pub async fn apply_delta(conn: &mut SqliteConnection, variant_id: &str, delta: i64) -> DbResult<i64> {
    let updated: Option<i64> = sqlx::query_scalar(
        r#"
        UPDATE stock_levels
        SET quantity = quantity + ?2, updated_at = ?3
        WHERE variant_id = ?1 AND quantity + ?2 >= 0
        RETURNING quantity
        "#,
    )
    .bind(variant_id)
    .bind(delta)
    .bind(Utc::now())
    .fetch_optional(&mut *conn)
    .await?;

    match updated {
        Some(quantity) => {
            debug!(variant_id = %variant_id, delta, quantity, "Stock level updated");
            Ok(quantity)
        }
        None => {
            let exists: Option<i64> =
                sqlx::query_scalar("SELECT quantity FROM stock_levels WHERE variant_id = ?1")
                    .bind(variant_id)
                    .fetch_optional(&mut *conn)
                    .await?;

            match exists {
                Some(quantity) => Err(DbError::CheckViolation {
                    message: format!(
                        "stock for {} would go negative: {} {:+}",
                        variant_id, quantity, delta
                    ),
                }),
                None => Err(DbError::not_found("Stock level", variant_id)),
            }
        }
    }
}

/// Creates the stock row for a new variant.
pub async fn insert_level(conn: &mut SqliteConnection, variant_id: &str, quantity: i64) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO stock_levels (variant_id, quantity, locked_at, updated_at)
        VALUES (?1, ?2, NULL, ?3)
        "#,
    )
    .bind(variant_id)
    .bind(quantity)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::test_support::flat;
    use kasir_core::ErrorKind;

    #[tokio::test]
    async fn test_lock_reads_level() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = db.catalog().create_product(flat("Widget", "W-1", 100, 8)).await.unwrap();
        let variant_id = &product.variants[0].id;

        let mut tx = db.pool().begin().await.unwrap();
        assert_eq!(lock_for_update(&mut *tx, variant_id).await.unwrap(), Some(8));
        assert_eq!(lock_for_update(&mut *tx, "missing").await.unwrap(), None);
        tx.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn test_apply_delta_refuses_negative() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = db.catalog().create_product(flat("Widget", "W-1", 100, 8)).await.unwrap();
        let variant_id = &product.variants[0].id;

        let mut tx = db.pool().begin().await.unwrap();
        assert_eq!(apply_delta(&mut *tx, variant_id, -5).await.unwrap(), 3);

        let err = apply_delta(&mut *tx, variant_id, -4).await.unwrap_err();
        assert!(matches!(err, DbError::CheckViolation { .. }));

        let err = apply_delta(&mut *tx, "missing", -1).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        tx.commit().await.unwrap();

        assert_eq!(db.stock().level(variant_id).await.unwrap(), 3);
        assert!(db.stock().get("missing").await.unwrap().is_none());
        assert_eq!(db.stock().level("missing").await.unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_table_check_rejects_negative_insert() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = db.catalog().create_product(flat("Widget", "W-1", 100, 0)).await.unwrap();

        sqlx::query("DELETE FROM stock_levels WHERE variant_id = ?1")
            .bind(&product.variants[0].id)
            .execute(db.pool())
            .await
            .unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        let err = insert_level(&mut conn, &product.variants[0].id, -1).await.unwrap_err();
        assert!(matches!(err, DbError::CheckViolation { .. }));
    }
}
