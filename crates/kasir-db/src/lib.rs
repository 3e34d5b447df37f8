//! # kasir-db: Database Layer and Checkout Engine for Kasir
//!
//! SQLite persistence via sqlx, plus the checkout unit of work that ties the
//! pure rules in `kasir-core` to storage.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Kasir Data Flow                                  │
//! │                                                                         │
//! │  Till (CheckoutRequest)                                                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     kasir-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │ catalog stock │    │  (embedded)  │  │   │
//! │  │   │               │◄───│ ledger trx    │    │ 001_init.sql │  │   │
//! │  │   │ SqlitePool    │    │ sequence      │    │              │  │   │
//! │  │   └───────┬───────┘    └───────▲───────┘    └──────────────┘  │   │
//! │  │           │                    │                               │   │
//! │  │           └──► CheckoutService ┘  (one transaction per sale)   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (WAL)                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`config`] - TOML and environment configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database and service error types
//! - [`repository`] - Catalog, stock, ledger, transaction and sequence storage
//! - [`checkout`] - The checkout unit of work
//!
//! ## Usage
//!
//! ```rust,ignore
//! use kasir_db::{Database, KasirConfig};
//!
//! let config = KasirConfig::load(None)?;
//! let db = Database::new(config.db_config()).await?;
//!
//! let result = db
//!     .checkout()
//!     .checkout_with_retry(&request, config.checkout.max_attempts)
//!     .await?;
//! println!("{}", result.transaction_number);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod checkout;
pub mod config;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use checkout::CheckoutService;
pub use config::{ConfigError, KasirConfig};
pub use error::{CheckoutError, DbError, DbResult, ServiceError};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::catalog::CatalogRepository;
pub use repository::ledger::LedgerRepository;
pub use repository::sequence::SequenceRepository;
pub use repository::stock::StockRepository;
pub use repository::transaction::TransactionRepository;
