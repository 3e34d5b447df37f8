//! # Checkout Engine
//!
//! Turns a [`CheckoutRequest`] into a committed sale, or into nothing at all.
//!
//! ## Unit of Work
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  validate_request()                 no transaction yet                 │
//! │      │                                                                  │
//! │      ▼  BEGIN                                                           │
//! │  for each line:                                                         │
//! │      stock::lock_for_update()       once per distinct variant          │
//! │      catalog::lookup_line()         name, unit graph, tiers            │
//! │      reserve base quantity          InsufficientStock → ROLLBACK       │
//! │      price line                                                         │
//! │      │                                                                  │
//! │      ▼                                                                  │
//! │  stock::apply_delta(-total)         once per distinct variant          │
//! │  sequence::next_document_number()   TRX-2026-000042                     │
//! │  transaction::insert()              header + snapshot lines            │
//! │  ledger::append()                   one sale movement per line         │
//! │      │                                                                  │
//! │      ▼  COMMIT                                                          │
//! │  CheckoutResult                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every step borrows the same connection, so a failure anywhere drops the
//! transaction and nothing is visible to other checkouts. The stock lock is
//! the first statement after BEGIN; two checkouts on the same variant are
//! serialized there and the second sees the first's committed level.

use std::time::Duration;

use chrono::{DateTime, Datelike, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::CheckoutError;
use crate::repository::{catalog, ledger, sequence, stock, transaction};
use kasir_core::checkout::{base_quantity, price_cart_line, validate_request, StockReservations};
use kasir_core::{
    CheckoutRequest, CheckoutResult, CoreError, DocumentKind, MovementType, PaymentMethod,
    StockMovementEntry,
};

const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(50);

/// Runs checkouts against a pool.
#[derive(Debug, Clone)]
pub struct CheckoutService {
    pool: SqlitePool,
    retry_backoff: Duration,
}

impl CheckoutService {
    pub fn new(pool: SqlitePool) -> Self {
        CheckoutService {
            pool,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }

    /// Sets the base delay between retry attempts. Attempt `n` waits `n × backoff`.
    pub fn retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Runs one checkout as a single unit of work.
    pub async fn checkout(&self, request: &CheckoutRequest) -> Result<CheckoutResult, CheckoutError> {
        let payment_method = validate_request(request)?;

        info!(
            payment_method = %payment_method,
            lines = request.lines.len(),
            "Checkout started"
        );

        let mut tx = self.pool.begin().await?;

        match process(&mut *tx, payment_method, request, Utc::now()).await {
            Ok(result) => {
                tx.commit().await?;
                info!(
                    id = %result.id,
                    transaction_number = %result.transaction_number,
                    grand_total = %result.grand_total,
                    "Checkout committed"
                );
                Ok(result)
            }
            Err(err) => {
                warn!(code = err.code(), error = %err, "Checkout rolled back");
                if let Err(rollback_err) = tx.rollback().await {
                    error!(error = %rollback_err, "Rollback failed");
                }
                Err(err)
            }
        }
    }

    /// Runs [`checkout`](Self::checkout), retrying infrastructure failures.
    ///
    /// Validation, conflict and not-found failures are returned on the first
    /// attempt. `max_attempts` counts the first try; 0 is treated as 1.
    pub async fn checkout_with_retry(
        &self,
        request: &CheckoutRequest,
        max_attempts: u32,
    ) -> Result<CheckoutResult, CheckoutError> {
        let max_attempts = max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.checkout(request).await {
                Ok(result) => return Ok(result),
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    let delay = self.retry_backoff * attempt;
                    warn!(attempt, max_attempts, ?delay, error = %err, "Checkout failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

async fn process(
    conn: &mut SqliteConnection,
    payment_method: PaymentMethod,
    request: &CheckoutRequest,
    now: DateTime<Utc>,
) -> Result<CheckoutResult, CheckoutError> {
    let mut reservations = StockReservations::new();
    let mut items = Vec::with_capacity(request.lines.len());

    for (line, cart_line) in request.lines.iter().enumerate() {
        if !reservations.is_locked(&cart_line.variant_id) {
            let available = stock::lock_for_update(conn, &cart_line.variant_id)
                .await?
                .ok_or_else(|| CoreError::VariantNotFound(cart_line.variant_id.clone()))?;
            reservations.lock(cart_line.variant_id.clone(), available);
        }

        let catalog = catalog::lookup_line(
            conn,
            &cart_line.product_id,
            &cart_line.variant_id,
            &cart_line.unit_id,
        )
        .await?;

        let to_base = catalog.to_base()?;
        let base = base_quantity(line, cart_line.quantity, to_base)?;
        reservations.reserve(line, &cart_line.variant_id, &catalog.product_name, base)?;

        let item = price_cart_line(line, Uuid::new_v4().to_string(), cart_line, &catalog, to_base)?;
        debug!(
            line,
            sku = %item.sku,
            unit = %item.unit_name,
            base_quantity = item.base_quantity,
            unit_price = %item.unit_price,
            "Line priced"
        );
        items.push(item);
    }

    for (variant_id, total) in reservations.decrements() {
        stock::apply_delta(conn, variant_id, -total).await?;
    }

    let transaction_number =
        sequence::next_document_number(conn, DocumentKind::SalesTransaction, now.year()).await?;

    let result = CheckoutResult::assemble(
        Uuid::new_v4().to_string(),
        transaction_number,
        payment_method,
        now,
        items,
    )?;

    transaction::insert(conn, &result).await?;

    for item in &result.items {
        let entry = StockMovementEntry {
            id: Uuid::new_v4().to_string(),
            variant_id: item.variant_id.clone(),
            product_id: item.product_id.clone(),
            transaction_id: Some(result.id.clone()),
            movement_type: MovementType::Sale,
            quantity: -item.base_quantity,
            reference: Some(result.transaction_number.clone()),
            created_at: now,
        };
        ledger::append(conn, &entry).await?;
    }

    Ok(result)
}

// =============================================================================
// Unit Tests
// =============================================================================
