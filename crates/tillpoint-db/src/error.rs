//! # Database Error Types
//!
//! Error types for database operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)      ValidationError (tillpoint-core)      │
//! │       │                                │                                │
//! │       ▼                                ▼                                │
//! │  DbError (this module) ← Adds context and categorization               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ApiError (tillpoint-checkout) ← user-safe message + stable code       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::error::ErrorKind;
use thiserror::Error;
use tillpoint_core::ValidationError;

/// Database operation errors.
///
/// These errors wrap sqlx errors and provide additional context
/// for debugging and user feedback.
#[derive(Debug, Error)]
pub enum DbError {
    /// Storage was used before the initializer opened it.
    #[error("Database is not initialized")]
    NotInitialized,

    /// Create/update input was rejected before touching storage.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Entity not found in database.
    ///
    /// ## When This Occurs
    /// - id-based lookup, update or delete matched no row
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Reusing a transaction_id
    /// - Creating a product with an existing id
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    ///
    /// ## When This Occurs
    /// - Line items for a transaction_id that was never stored
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// Database connection failed.
    ///
    /// ## When This Occurs
    /// - Database file can't be created
    /// - File permissions issue
    /// - Pool already closed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Schema creation or a migration step failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// A stored blob or enum column could not be decoded.
    #[error("Cannot decode column {column}: {message}")]
    Serialization { column: String, message: String },

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

    pub fn serialization(column: impl Into<String>, message: impl ToString) -> Self {
        DbError::Serialization {
            column: column.into(),
            message: message.to_string(),
        }
    }

    /// True for failures of the storage engine itself (conflict or I/O),
    /// as opposed to caller mistakes like validation or not-found.
    pub fn is_io(&self) -> bool {
        matches!(
            self,
            DbError::UniqueViolation { .. }
                | DbError::ForeignKeyViolation { .. }
                | DbError::ConnectionFailed(_)
                | DbError::MigrationFailed(_)
                | DbError::QueryFailed(_)
                | DbError::PoolExhausted
                | DbError::Internal(_)
        )
    }
}

/// Maps sqlx failures onto the storage taxonomy.
///
/// ```text
/// RowNotFound                   → NotFound
/// Database, kind UniqueViolation → UniqueViolation (column from the message)
/// Database, kind ForeignKey…    → ForeignKeyViolation
/// Database, anything else       → QueryFailed
/// ColumnDecode                  → Serialization
/// Io / Configuration / PoolClosed → ConnectionFailed
/// PoolTimedOut                  → PoolExhausted
/// everything else               → Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::not_found("Record", "unknown"),

            sqlx::Error::Database(db_err) => {
                let message = db_err.message().to_string();
                match db_err.kind() {
                    ErrorKind::UniqueViolation => DbError::UniqueViolation {
                        field: constraint_column(&message),
                        value: "unknown".to_string(),
                    },
                    ErrorKind::ForeignKeyViolation => DbError::ForeignKeyViolation { message },
                    _ => DbError::QueryFailed(message),
                }
            }

            sqlx::Error::ColumnDecode { index, source } => DbError::serialization(index, source),

            sqlx::Error::Io(e) => DbError::ConnectionFailed(e.to_string()),
            sqlx::Error::Configuration(e) => DbError::ConnectionFailed(e.to_string()),
            sqlx::Error::PoolClosed => DbError::ConnectionFailed("pool is closed".to_string()),
            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            other => DbError::Internal(other.to_string()),
        }
    }
}

/// Column named by a SQLite constraint message.
///
/// `UNIQUE constraint failed: transactions.transaction_id` → `transaction_id`.
/// Composite constraints report their first column.
fn constraint_column(message: &str) -> String {
    let target = match message.split_once(": ") {
        Some((_, target)) => target,
        None => return "unknown".to_string(),
    };
    let first = target.split(", ").next().unwrap_or(target);
    first.rsplit('.').next().unwrap_or(first).to_string()
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;
