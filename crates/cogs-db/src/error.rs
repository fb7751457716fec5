//! # Database Error Types
//!
//! Storage errors, and the combined error the costing engine returns.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)          Domain rule (cogs_core)           │
//! │       │                                    │                            │
//! │       ▼                                    ▼                            │
//! │  DbError (this module)               CoreError                          │
//! │       │                                    │                            │
//! │       └──────────────┬─────────────────────┘                            │
//! │                      ▼                                                  │
//! │              CostingError  ◄── returned by CostingEngine                │
//! │                      │                                                  │
//! │                      ▼                                                  │
//! │  Caller decides: surface, or retry when is_retryable()                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use cogs_core::{CoreError, ValidationError};
use thiserror::Error;

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Registering a SKU twice
    /// - A second posting for the same `(order_id, sku, kind)`
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    ///
    /// ## When This Occurs
    /// - Receipt or bundle row naming an unregistered SKU
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// A CHECK constraint rejected the row.
    #[error("Constraint violation: {message}")]
    CheckViolation { message: String },

    /// A compare-and-set update found the row changed underneath it.
    #[error("Write conflict on {entity} {id}: {reason}")]
    WriteConflict {
        entity: String,
        id: String,
        reason: String,
    },

    /// Another connection held SQLite's write lock past `busy_timeout`.
    #[error("Database busy: {0}")]
    Busy(String),

    /// A stored value could not be turned back into its domain type.
    #[error("Corrupt {field} in storage: {reason}")]
    Decode { field: String, reason: String },

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Transaction failed.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

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

    /// Creates a WriteConflict error.
    pub fn conflict(
        entity: impl Into<String>,
        id: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        DbError::WriteConflict {
            entity: entity.into(),
            id: id.into(),
            reason: reason.into(),
        }
    }

    #[inline]
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, DbError::UniqueViolation { .. })
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → Analyze code / message (busy, constraint type)
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// sqlx::Error::ColumnDecode   → DbError::Decode
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::not_found("Record", "unknown"),

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                if is_busy(db_err.code().as_deref(), msg) {
                    return DbError::Busy(msg.to_string());
                }

                // SQLite reports constraints by message:
                //   "UNIQUE constraint failed: <table>.<column>, ..."
                //   "FOREIGN KEY constraint failed"
                //   "CHECK constraint failed: <expr>"
                if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::duplicate(field, "unknown")
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else if msg.contains("CHECK constraint failed") {
                    DbError::CheckViolation {
                        message: msg.to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::ColumnDecode { index, source } => DbError::Decode {
                field: index,
                reason: source.to_string(),
            },

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

/// SQLITE_BUSY (5) and SQLITE_LOCKED (6), including their extended codes.
fn is_busy(code: Option<&str>, msg: &str) -> bool {
    let primary = code
        .and_then(|c| c.parse::<i32>().ok())
        .map(|c| c & 0xff);
    matches!(primary, Some(5) | Some(6))
        || msg.contains("database is locked")
        || msg.contains("database table is locked")
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Stored decimals are validated on the way in, so a parse failure on the
/// way out means the row was edited outside the engine.
impl From<ValidationError> for DbError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::InvalidFormat { field, reason } => DbError::Decode { field, reason },
            other => DbError::Decode {
                field: "value".to_string(),
                reason: other.to_string(),
            },
        }
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Costing Error
// =============================================================================

/// Error returned by every [`CostingEngine`](crate::engine::CostingEngine) call.
///
/// Whatever the variant, the failed call left every store untouched.
#[derive(Debug, Error)]
pub enum CostingError {
    /// A costing rule rejected the request.
    #[error(transparent)]
    Domain(#[from] CoreError),

    /// The database failed or a concurrent writer got there first.
    #[error(transparent)]
    Storage(#[from] DbError),
}

impl CostingError {
    /// Whether the same call may succeed later without changing its input.
    ///
    /// True for a stock shortage (a receipt may arrive), a lost
    /// compare-and-set race, and a write lock held by another connection.
    /// The engine itself never retries.
    pub fn is_retryable(&self) -> bool {
        match self {
            CostingError::Domain(err) => err.is_retryable(),
            CostingError::Storage(DbError::WriteConflict { .. } | DbError::Busy(_)) => true,
            CostingError::Storage(_) => false,
        }
    }

    /// The domain error, if this is one.
    pub fn as_domain(&self) -> Option<&CoreError> {
        match self {
            CostingError::Domain(err) => Some(err),
            CostingError::Storage(_) => None,
        }
    }
}

impl From<sqlx::Error> for CostingError {
    fn from(err: sqlx::Error) -> Self {
        CostingError::Storage(err.into())
    }
}

impl From<ValidationError> for CostingError {
    fn from(err: ValidationError) -> Self {
        CostingError::Domain(CoreError::Validation(err))
    }
}

/// Result type for costing engine operations.
pub type CostingResult<T> = Result<T, CostingError>;
