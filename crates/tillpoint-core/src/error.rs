//! # Error Types
//!
//! Domain-specific error types for tillpoint-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  tillpoint-core errors (this file)                                     │
//! │  ├── CoreError        - Cart and general domain errors                 │
//! │  ├── ValidationError  - Input validation failures (field-named)        │
//! │  └── CheckoutError    - Illegal checkout transitions / settlement      │
//! │                                                                         │
//! │  tillpoint-db errors (separate crate)                                  │
//! │  └── DbError          - Storage failures, NotFound, NotInitialized     │
//! │                                                                         │
//! │  tillpoint-checkout errors                                             │
//! │  ├── ApiError         - What presentation code sees (serialized)       │
//! │  └── CheckoutFailure  - Includes DegradedCommit                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::checkout::CheckoutState;
use crate::money::Money;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Cart has exceeded maximum allowed lines.
    #[error("Cart cannot have more than {max} items")]
    CartTooLarge { max: usize },

    /// Item quantity exceeds maximum allowed.
    #[error("Quantity {requested} exceeds maximum allowed ({max})")]
    QuantityTooLarge { requested: i64, max: i64 },

    /// The cart has no line with the given key.
    #[error("Item {0} is not in the cart")]
    NotInCart(String),

    /// A selected variant option does not exist on the product.
    #[error("Product {product_id} has no {kind} option '{option}'")]
    UnknownVariant {
        product_id: String,
        kind: String,
        option: String,
    },

    /// Discount would push the total below zero.
    #[error("Discount {discount} exceeds the order value {limit}")]
    DiscountTooLarge { discount: Money, limit: Money },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Every variant names the offending field (or item index) so presentation
/// code can attach the message to the right form control.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    Negative { field: String },

    /// Invalid format (e.g., malformed email or phone).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// A collection that must contain entries is empty.
    #[error("{field} must not be empty")]
    Empty { field: String },

    /// A line item failed its shape check.
    #[error("items[{index}]: {reason}")]
    InvalidItem { index: usize, reason: String },

    /// A payment leg failed its shape check.
    #[error("paymentMethods[{index}]: {reason}")]
    InvalidPayment { index: usize, reason: String },

    /// An update request carried no changes.
    #[error("No fields to update")]
    EmptyUpdate,
}

impl ValidationError {
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }

    pub fn negative(field: impl Into<String>) -> Self {
        ValidationError::Negative {
            field: field.into(),
        }
    }

    pub fn empty(field: impl Into<String>) -> Self {
        ValidationError::Empty {
            field: field.into(),
        }
    }
}

// =============================================================================
// Checkout Error
// =============================================================================

/// Errors raised by the checkout state machine.
///
/// None of these have side effects: the session stays in the state it was
/// in before the rejected call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckoutError {
    /// Checkout cannot start with an empty cart.
    #[error("Cart is empty")]
    EmptyCart,

    /// The requested action is not legal in the current state.
    #[error("Cannot {action} while checkout is {state}")]
    InvalidTransition {
        state: CheckoutState,
        action: &'static str,
    },

    /// The order total is zero, so no payment leg can be recorded.
    #[error("Nothing to charge")]
    ZeroTotal,

    /// Amounts entered at checkout cannot be negative.
    #[error("{field} must not be negative")]
    NegativeAmount { field: &'static str },

    /// Amounts entered at checkout are capped at `Money::MAX_INPUT`.
    #[error("{field} exceeds the largest accepted amount")]
    AmountTooLarge { field: &'static str },

    /// Cash tendered is below the amount due.
    #[error("Tendered {tendered} is less than total {total} (short {shortfall})")]
    InsufficientTender {
        tendered: Money,
        total: Money,
        shortfall: Money,
    },

    /// Split legs do not add up to the total within tolerance.
    ///
    /// `difference` is `cash + card - total`: negative is a shortfall,
    /// positive an overage.
    #[error("Split payment is off by {difference}")]
    SplitImbalance { difference: Money },

    /// Receipt delivery needs a valid contact.
    #[error("Receipt contact is invalid: {0}")]
    InvalidReceiptContact(ValidationError),
}

// =============================================================================
// Enum Parsing
// =============================================================================

/// A stored string did not name any member of a domain enum.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
