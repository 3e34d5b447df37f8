//! # Stock Movement Ledger
//!
//! Append-only record of every stock change and its cause. There is no
//! update or delete API, and triggers in the schema reject both.
//!
//! ```text
//! variant EGG-L   initial   +144   (product created)
//! variant EGG-L   sale       -24   TRX-2026-000001
//! variant EGG-L   sale        -1   TRX-2026-000002
//!                 ─────────────
//!                 level = 119
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use kasir_core::{MovementType, StockMovementEntry};

/// Repository for ledger reads.
#[derive(Debug, Clone)]
pub struct LedgerRepository {
    pool: SqlitePool,
}

impl LedgerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        LedgerRepository { pool }
    }

    /// All movements of a variant, oldest first.
    pub async fn movements_for_variant(&self, variant_id: &str) -> DbResult<Vec<StockMovementEntry>> {
        let rows = sqlx::query_as::<_, MovementRow>(
            r#"
            SELECT id, variant_id, product_id, transaction_id, movement_type,
                   quantity, reference, created_at
            FROM stock_movements
            WHERE variant_id = ?1
            ORDER BY created_at, rowid
            "#,
        )
        .bind(variant_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(StockMovementEntry::from).collect())
    }

    /// Movements caused by one checkout, in line order.
    pub async fn movements_for_transaction(
        &self,
        transaction_id: &str,
    ) -> DbResult<Vec<StockMovementEntry>> {
        let rows = sqlx::query_as::<_, MovementRow>(
            r#"
            SELECT id, variant_id, product_id, transaction_id, movement_type,
                   quantity, reference, created_at
            FROM stock_movements
            WHERE transaction_id = ?1
            ORDER BY rowid
            "#,
        )
        .bind(transaction_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(StockMovementEntry::from).collect())
    }

    /// Sum of all movements for a variant. Equals the stock level when the
    /// ledger is complete.
    pub async fn balance(&self, variant_id: &str) -> DbResult<i64> {
        let total: Option<i64> =
            sqlx::query_scalar("SELECT SUM(quantity) FROM stock_movements WHERE variant_id = ?1")
                .bind(variant_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(total.unwrap_or(0))
    }
}

#[derive(sqlx::FromRow)]
struct MovementRow {
    id: String,
    variant_id: String,
    product_id: String,
    transaction_id: Option<String>,
    movement_type: MovementType,
    quantity: i64,
    reference: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<MovementRow> for StockMovementEntry {
    fn from(row: MovementRow) -> Self {
        StockMovementEntry {
            id: row.id,
            variant_id: row.variant_id,
            product_id: row.product_id,
            transaction_id: row.transaction_id,
            movement_type: row.movement_type,
            quantity: row.quantity,
            reference: row.reference,
            created_at: row.created_at,
        }
    }
}

/// Appends one entry inside the caller's unit of work.
pub async fn append(conn: &mut SqliteConnection, entry: &StockMovementEntry) -> DbResult<()> {
    debug!(
        variant_id = %entry.variant_id,
        movement_type = ?entry.movement_type,
        quantity = entry.quantity,
        "Appending stock movement"
    );

    sqlx::query(
        r#"
        INSERT INTO stock_movements (
            id, variant_id, product_id, transaction_id, movement_type,
            quantity, reference, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&entry.id)
    .bind(&entry.variant_id)
    .bind(&entry.product_id)
    .bind(&entry.transaction_id)
    .bind(entry.movement_type)
    .bind(entry.quantity)
    .bind(&entry.reference)
    .bind(entry.created_at)
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
    use crate::error::DbError;
    use crate::pool::{Database, DbConfig};
    use crate::repository::test_support::flat;

    #[tokio::test]
    async fn test_append_and_read_back() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = db.catalog().create_product(flat("Widget", "W-1", 500, 10)).await.unwrap();
        let variant_id = &product.variants[0].id;

        let entry = StockMovementEntry {
            id: "mv-1".into(),
            variant_id: variant_id.clone(),
            product_id: product.id.clone(),
            transaction_id: None,
            movement_type: MovementType::Sale,
            quantity: -3,
            reference: Some("TRX-2026-000001".into()),
            created_at: Utc::now(),
        };
        let mut conn = db.pool().acquire().await.unwrap();
        append(&mut conn, &entry).await.unwrap();
        drop(conn);

        let movements = db.ledger().movements_for_variant(variant_id).await.unwrap();
        assert_eq!(movements.len(), 2);
        assert_eq!(movements[0].movement_type, MovementType::Initial);
        assert_eq!(movements[1], entry);
        assert_eq!(db.ledger().balance(variant_id).await.unwrap(), 7);
        assert_eq!(db.ledger().balance("no-such-variant").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_ledger_rejects_update_and_delete() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = db.catalog().create_product(flat("Widget", "W-1", 500, 10)).await.unwrap();
        let variant_id = &product.variants[0].id;

        let err: DbError = sqlx::query("UPDATE stock_movements SET quantity = 0")
            .execute(db.pool())
            .await
            .unwrap_err()
            .into();
        assert!(err.to_string().contains("append-only"));

        let err: DbError = sqlx::query("DELETE FROM stock_movements")
            .execute(db.pool())
            .await
            .unwrap_err()
            .into();
        assert!(err.to_string().contains("append-only"));

        assert_eq!(db.ledger().movements_for_variant(variant_id).await.unwrap().len(), 1);
        assert_eq!(db.ledger().balance(variant_id).await.unwrap(), 10);
    }
}
