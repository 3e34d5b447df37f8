//! # Database Error Types
//!
//! Error types for database operations and the services built on them.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbError (this module) ← Adds context and categorization               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ServiceError ← CoreError | DbError, one ErrorKind each                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Caller branches on kind(): VALIDATION / CONFLICT / NOT_FOUND /        │
//! │  INTERNAL (only storage INTERNAL is retried)                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use kasir_core::{CoreError, ErrorKind};
use thiserror::Error;

/// Database operation errors.
///
/// These errors wrap sqlx errors and provide additional context
/// for debugging and user feedback.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Inserting duplicate SKU
    /// - Duplicate unit name within a product
    /// - Any UNIQUE index violation
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// CHECK constraint violation (e.g. stock would go negative).
    #[error("Constraint violation: {message}")]
    CheckViolation { message: String },

    /// Another writer held the database lock for longer than the busy timeout.
    ///
    /// ## When This Occurs
    /// - Two checkouts on the same variant and the first one is slow
    /// - Long-running catalog import while the till is selling
    #[error("Timed out waiting for database lock")]
    LockTimeout,

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// A JSON column could not be encoded or decoded.
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Categorizes this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DbError::NotFound { .. } => ErrorKind::NotFound,
            DbError::UniqueViolation { .. } => ErrorKind::Conflict,
            DbError::ForeignKeyViolation { .. } | DbError::CheckViolation { .. } => {
                ErrorKind::Validation
            }
            DbError::LockTimeout
            | DbError::ConnectionFailed(_)
            | DbError::MigrationFailed(_)
            | DbError::QueryFailed(_)
            | DbError::Serialization(_)
            | DbError::PoolExhausted
            | DbError::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → Analyze message for constraint type / lock
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // SQLite error messages:
                // UNIQUE constraint: "UNIQUE constraint failed: <table>.<column>"
                // FK constraint: "FOREIGN KEY constraint failed"
                // Busy timeout elapsed: "database is locked"
                if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else if msg.contains("CHECK constraint failed") {
                    DbError::CheckViolation {
                        message: msg.to_string(),
                    }
                } else if msg.contains("database is locked") || msg.contains("database table is locked") {
                    DbError::LockTimeout
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        DbError::Serialization(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Service Error
// =============================================================================

/// Error returned by the catalog and checkout services.
///
/// Domain failures keep their own kind. Constraint violations map as in
/// [`DbError::kind`]; everything else from storage is `Internal`, and the
/// same request may be retried.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Db(#[from] DbError),
}

/// The checkout engine's error.
pub type CheckoutError = ServiceError;

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::Core(e) => e.kind(),
            ServiceError::Db(e) => e.kind(),
        }
    }

    /// Machine-readable code: `VALIDATION`, `CONFLICT`, `NOT_FOUND` or `INTERNAL`.
    pub fn code(&self) -> &'static str {
        self.kind().code()
    }

    /// Domain failures repeat on every attempt, so only storage errors retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            ServiceError::Core(_) => false,
            ServiceError::Db(e) => e.kind().is_retryable(),
        }
    }
}

impl From<kasir_core::ValidationError> for ServiceError {
    fn from(err: kasir_core::ValidationError) -> Self {
        ServiceError::Core(err.into())
    }
}

impl From<kasir_core::error::UnitGraphError> for ServiceError {
    fn from(err: kasir_core::error::UnitGraphError) -> Self {
        ServiceError::Core(err.into())
    }
}

impl From<kasir_core::error::PricingError> for ServiceError {
    fn from(err: kasir_core::error::PricingError) -> Self {
        ServiceError::Core(err.into())
    }
}

impl From<kasir_core::error::SequenceError> for ServiceError {
    fn from(err: kasir_core::error::SequenceError) -> Self {
        ServiceError::Core(err.into())
    }
}

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        ServiceError::Db(err.into())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
