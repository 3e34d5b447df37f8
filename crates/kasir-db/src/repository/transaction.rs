//! # Sales Transaction Repository
//!
//! Persisted checkout results.
//!
//! ## Snapshot Pattern
//! Line items carry product name, variant label, SKU and unit name as they
//! were at the moment of sale. Reading a transaction back never joins the
//! catalog, so a receipt printed next year matches the one printed today.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use kasir_core::{CheckoutLineItem, CheckoutResult, Money, PaymentMethod};

/// Repository for sales transaction reads.
#[derive(Debug, Clone)]
pub struct TransactionRepository {
    pool: SqlitePool,
}

impl TransactionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        TransactionRepository { pool }
    }

    /// Gets a transaction by its `TRX-...` number.
    pub async fn get_by_number(&self, number: &str) -> DbResult<Option<CheckoutResult>> {
        let header = sqlx::query_as::<_, TransactionRow>(
            r#"
            SELECT id, transaction_number, payment_method, subtotal, grand_total,
                   line_count, created_at
            FROM sales_transactions
            WHERE transaction_number = ?1
            "#,
        )
        .bind(number)
        .fetch_optional(&self.pool)
        .await?;

        self.with_items(header).await
    }

    /// Gets a transaction by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<CheckoutResult>> {
        let header = sqlx::query_as::<_, TransactionRow>(
            r#"
            SELECT id, transaction_number, payment_method, subtotal, grand_total,
                   line_count, created_at
            FROM sales_transactions
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        self.with_items(header).await
    }

    /// Number of persisted transactions.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales_transactions")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn with_items(&self, header: Option<TransactionRow>) -> DbResult<Option<CheckoutResult>> {
        let Some(header) = header else {
            return Ok(None);
        };

        let items = sqlx::query_as::<_, ItemRow>(
            r#"
            SELECT id, product_id, variant_id, unit_id,
                   product_name, variant_label, sku, unit_name,
                   quantity, to_base, base_quantity, unit_price, line_total
            FROM sales_transaction_items
            WHERE transaction_id = ?1
            ORDER BY line_no
            "#,
        )
        .bind(&header.id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(CheckoutLineItem::from)
        .collect();

        Ok(Some(CheckoutResult {
            id: header.id,
            transaction_number: header.transaction_number,
            payment_method: header.payment_method,
            created_at: header.created_at,
            items,
            subtotal: Money::from_minor(header.subtotal),
            grand_total: Money::from_minor(header.grand_total),
            line_count: header.line_count,
        }))
    }
}

/// Writes the header and one row per line inside the caller's unit of work.
pub async fn insert(conn: &mut SqliteConnection, result: &CheckoutResult) -> DbResult<()> {
    debug!(
        id = %result.id,
        transaction_number = %result.transaction_number,
        lines = result.items.len(),
        "Inserting sales transaction"
    );

    sqlx::query(
        r#"
        INSERT INTO sales_transactions (
            id, transaction_number, payment_method,
            subtotal, grand_total, line_count, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(&result.id)
    .bind(&result.transaction_number)
    .bind(result.payment_method)
    .bind(result.subtotal.amount())
    .bind(result.grand_total.amount())
    .bind(result.line_count)
    .bind(result.created_at)
    .execute(&mut *conn)
    .await?;

    for (line_no, item) in result.items.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO sales_transaction_items (
                id, transaction_id, line_no,
                product_id, variant_id, unit_id,
                product_name, variant_label, sku, unit_name,
                quantity, to_base, base_quantity, unit_price, line_total
            ) VALUES (
                ?1, ?2, ?3,
                ?4, ?5, ?6,
                ?7, ?8, ?9, ?10,
                ?11, ?12, ?13, ?14, ?15
            )
            "#,
        )
        .bind(&item.id)
        .bind(&result.id)
        .bind(line_no as i64)
        .bind(&item.product_id)
        .bind(&item.variant_id)
        .bind(&item.unit_id)
        .bind(&item.product_name)
        .bind(&item.variant_label)
        .bind(&item.sku)
        .bind(&item.unit_name)
        .bind(item.quantity)
        .bind(item.to_base)
        .bind(item.base_quantity)
        .bind(item.unit_price.amount())
        .bind(item.line_total.amount())
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

#[derive(sqlx::FromRow)]
struct TransactionRow {
    id: String,
    transaction_number: String,
    payment_method: PaymentMethod,
    subtotal: i64,
    grand_total: i64,
    line_count: i64,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct ItemRow {
    id: String,
    product_id: String,
    variant_id: String,
    unit_id: String,
    product_name: String,
    variant_label: String,
    sku: String,
    unit_name: String,
    quantity: i64,
    to_base: i64,
    base_quantity: i64,
    unit_price: i64,
    line_total: i64,
}

impl From<ItemRow> for CheckoutLineItem {
    fn from(row: ItemRow) -> Self {
        CheckoutLineItem {
            id: row.id,
            product_id: row.product_id,
            variant_id: row.variant_id,
            unit_id: row.unit_id,
            product_name: row.product_name,
            variant_label: row.variant_label,
            sku: row.sku,
            unit_name: row.unit_name,
            quantity: row.quantity,
            to_base: row.to_base,
            base_quantity: row.base_quantity,
            unit_price: Money::from_minor(row.unit_price),
            line_total: Money::from_minor(row.line_total),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
