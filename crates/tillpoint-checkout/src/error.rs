//! # API and Checkout Errors
//!
//! Two error types leave this crate:
//!
//! - [`CheckoutFailure`]: what a confirm or cart call can fail with, still
//!   carrying typed detail (the degraded-commit snapshot in particular).
//! - [`ApiError`]: the flat `{code, message}` shape handed to presentation
//!   code. Storage failures are logged in full and replaced by a stable,
//!   user-safe message.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  CoreError ─────┐                                                       │
//! │  CheckoutError ─┼──► CheckoutFailure ──┐                                │
//! │  PaymentError ──┤                      ├──► ApiError { code, message }  │
//! │  DbError ───────┘                      │                                │
//! │  ConfigError ──────────────────────────┘                                │
//! │                                                                         │
//! │  DegradedCommit ──► MANUAL_ENTRY_REQUIRED (never a silent success)     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;
use thiserror::Error;
use tillpoint_core::{CheckoutError, CoreError, ValidationError};
use tillpoint_db::DbError;

use crate::config::ConfigError;
use crate::notify::ManualEntryNotice;
use crate::payment::PaymentError;

// =============================================================================
// Checkout Failures
// =============================================================================

/// Failure of an orchestrator operation.
#[derive(Debug, Error)]
pub enum CheckoutFailure {
    /// The state machine refused the step. Nothing changed.
    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    /// A cart edit was rejected. Nothing changed.
    #[error(transparent)]
    Cart(#[from] CoreError),

    /// A product lookup for the cart failed.
    #[error(transparent)]
    Storage(#[from] DbError),

    /// The gateway refused a leg. The session is back at payment input.
    #[error("Payment declined: {0}")]
    PaymentDeclined(#[from] PaymentError),

    /// Payment was captured but the sale could not be stored.
    ///
    /// The notice has already gone to the manual-entry notifier and the cart
    /// is cleared for the next sale.
    #[error("Payment captured but the sale was not saved: {reason}")]
    DegradedCommit {
        notice: Box<ManualEntryNotice>,
        reason: String,
    },
}

impl CheckoutFailure {
    pub fn is_degraded(&self) -> bool {
        matches!(self, CheckoutFailure::DegradedCommit { .. })
    }

    /// The snapshot to reconcile by hand, if this is a degraded commit.
    pub fn manual_entry_notice(&self) -> Option<&ManualEntryNotice> {
        match self {
            CheckoutFailure::DegradedCommit { notice, .. } => Some(&**notice),
            _ => None,
        }
    }
}

// =============================================================================
// API Error
// =============================================================================

/// Error returned to presentation code.
///
/// ## Serialization
/// ```json
/// {
///   "code": "NOT_FOUND",
///   "message": "Product not found: coffee-latte"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Machine-readable error code for programmatic handling
    pub code: ErrorCode,

    /// Human-readable error message for display
    pub message: String,
}

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Resource not found
    NotFound,

    /// Input validation failed
    ValidationError,

    /// Storage used before startup finished
    NotInitialized,

    /// Database operation failed
    DatabaseError,

    /// Cart operation failed
    CartError,

    /// Checkout step not allowed, or payment input does not balance
    CheckoutError,

    /// Payment declined or terminal unavailable
    PaymentError,

    /// Payment captured but not stored; reconcile by hand
    ManualEntryRequired,

    /// Bad deployment configuration
    ConfigError,

    /// Internal error
    Internal,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(resource: &str, id: &str) -> Self {
        ApiError::new(ErrorCode::NotFound, format!("{} not found: {}", resource, id))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Internal, message)
    }

    pub fn cart(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::CartError, message)
    }
}

/// Converts database errors to API errors.
///
/// Validation and not-found keep their detail; storage failures are logged
/// and replaced with a generic message.
impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotInitialized => {
                ApiError::new(ErrorCode::NotInitialized, "Database is still starting up")
            }
            DbError::Validation(e) => ApiError::from(e),
            DbError::NotFound { entity, id } => ApiError::not_found(&entity, &id),
            DbError::UniqueViolation { field, value } => ApiError::new(
                ErrorCode::ValidationError,
                format!("{} '{}' already exists", field, value),
            ),
            DbError::ForeignKeyViolation { message } => {
                tracing::error!("Foreign key violation: {}", message);
                ApiError::new(ErrorCode::ValidationError, "Invalid reference")
            }
            DbError::ConnectionFailed(e) => {
                tracing::error!("Database connection failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database connection failed")
            }
            DbError::MigrationFailed(e) => {
                tracing::error!("Database migration failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database migration failed")
            }
            DbError::QueryFailed(e) => {
                // Log the actual error but return a generic message
                tracing::error!("Database query failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
            DbError::Serialization { column, message } => {
                tracing::error!(column = %column, "Stored value could not be decoded: {}", message);
                ApiError::new(ErrorCode::DatabaseError, "Stored data could not be read")
            }
            DbError::PoolExhausted => {
                ApiError::new(ErrorCode::DatabaseError, "Database is busy, try again")
            }
            DbError::Internal(e) => {
                tracing::error!("Internal database error: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::validation(err.to_string())
    }
}

/// Converts core errors to API errors.
impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(e) => ApiError::from(e),
            CoreError::NotInCart(key) => ApiError::not_found("Cart item", &key),
            other => ApiError::cart(other.to_string()),
        }
    }
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        match err {
            CheckoutError::InvalidReceiptContact(e) => ApiError::from(e),
            e @ (CheckoutError::NegativeAmount { .. } | CheckoutError::AmountTooLarge { .. }) => {
                ApiError::validation(e.to_string())
            }
            other => ApiError::new(ErrorCode::CheckoutError, other.to_string()),
        }
    }
}

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        ApiError::new(ErrorCode::PaymentError, err.to_string())
    }
}

impl From<CheckoutFailure> for ApiError {
    fn from(err: CheckoutFailure) -> Self {
        match err {
            CheckoutFailure::Checkout(e) => e.into(),
            CheckoutFailure::Cart(e) => e.into(),
            CheckoutFailure::Storage(e) => e.into(),
            CheckoutFailure::PaymentDeclined(e) => e.into(),
            CheckoutFailure::DegradedCommit { notice, .. } => ApiError::new(
                ErrorCode::ManualEntryRequired,
                format!(
                    "Payment of {} was taken but transaction {} was not saved. Record it manually.",
                    notice.amount, notice.transaction_id
                ),
            ),
        }
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        tracing::error!("Configuration error: {}", err);
        ApiError::new(ErrorCode::ConfigError, err.to_string())
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

#[cfg(test)]
mod tests {
    use super::*;
    use tillpoint_core::Money;

    #[test]
    fn test_serialized_shape() {
        let err = ApiError::not_found("Product", "coffee-latte");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "NOT_FOUND");
        assert_eq!(json["message"], "Product not found: coffee-latte");
    }

    #[test]
    fn test_storage_failures_are_generic() {
        let err = ApiError::from(DbError::QueryFailed("near \"SELEC\": syntax error".into()));
        assert_eq!(err.code, ErrorCode::DatabaseError);
        assert!(!err.message.contains("SELEC"));

        let err = ApiError::from(DbError::Internal("disk I/O error".into()));
        assert_eq!(err.message, "Database operation failed");
    }

    #[test]
    fn test_caller_errors_keep_detail() {
        let err = ApiError::from(DbError::not_found("Product", "P9"));
        assert_eq!(err.code, ErrorCode::NotFound);
        assert!(err.message.contains("P9"));

        let err = ApiError::from(DbError::Validation(ValidationError::EmptyUpdate));
        assert_eq!(err.code, ErrorCode::ValidationError);

        let err = ApiError::from(DbError::NotInitialized);
        assert_eq!(err.code, ErrorCode::NotInitialized);
    }

    #[test]
    fn test_checkout_errors() {
        let err = ApiError::from(CheckoutError::SplitImbalance {
            difference: Money::from_cents(-50),
        });
        assert_eq!(err.code, ErrorCode::CheckoutError);
        assert!(err.message.contains("-$0.50"));

        let err = ApiError::from(CheckoutFailure::Cart(CoreError::NotInCart("P1".into())));
        assert_eq!(err.code, ErrorCode::NotFound);

        let err = ApiError::from(CheckoutError::AmountTooLarge { field: "tendered" });
        assert_eq!(err.code, ErrorCode::ValidationError);
        assert_eq!(err.message, "tendered exceeds the largest accepted amount");
    }

    #[test]
    fn test_display() {
        let err = ApiError::cart("Cart is full");
        assert_eq!(err.to_string(), "[CartError] Cart is full");
    }
}
