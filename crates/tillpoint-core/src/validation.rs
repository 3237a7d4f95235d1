//! # Validation Module
//!
//! Input validation for products, transactions and receipt contacts.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Presentation                                                 │
//! │  └── Immediate form feedback                                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Rust types                                                   │
//! │  ├── Enum membership (status, type, payment kind)                      │
//! │  └── THIS MODULE: field-named business rules                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: SQLite                                                       │
//! │  ├── NOT NULL / CHECK constraints                                      │
//! │  └── UNIQUE transaction_id                                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Validation runs before any write so a rejected input never leaves a
//! partial row behind.

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::{
    NewProduct, NewTransaction, ReceiptDelivery, ReceiptOptions, TransactionType, VariantGroup,
};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

const MAX_NAME_LEN: usize = 200;
const MAX_CATEGORY_LEN: usize = 100;

// =============================================================================
// Product Validators
// =============================================================================

/// Validates a product name.
///
/// ```rust
/// use tillpoint_core::validation::validate_product_name;
///
/// assert!(validate_product_name("Iced Latte").is_ok());
/// assert!(validate_product_name("   ").is_err());
/// ```
pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    validate_text("name", name, MAX_NAME_LEN)
}

pub fn validate_category(category: &str) -> ValidationResult<()> {
    validate_text("category", category, MAX_CATEGORY_LEN)
}

fn validate_text(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::required(field));
    }
    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }
    Ok(())
}

/// Validates a catalog price. Zero is allowed (free items).
pub fn validate_price(price: Money) -> ValidationResult<()> {
    if price.is_negative() {
        return Err(ValidationError::negative("price"));
    }
    validate_amount("price", price)
}

/// Rejects amounts beyond [`Money::MAX_INPUT`] in either direction.
pub fn validate_amount(field: &str, amount: Money) -> ValidationResult<()> {
    if !amount.is_within_limit() {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: -Money::MAX_INPUT.cents(),
            max: Money::MAX_INPUT.cents(),
        });
    }
    Ok(())
}

/// Variant groups need a kind, named options and bounded price deltas.
pub fn validate_variants(groups: &[VariantGroup]) -> ValidationResult<()> {
    for group in groups {
        if group.kind.trim().is_empty() {
            return Err(ValidationError::required("variants.kind"));
        }
        for option in &group.options {
            if option.name.trim().is_empty() {
                return Err(ValidationError::required("variants.options.name"));
            }
            validate_amount("variants.options.price", option.price)?;
        }
    }
    Ok(())
}

pub fn validate_stock_quantity(quantity: i64) -> ValidationResult<()> {
    if quantity < 0 {
        return Err(ValidationError::negative("stockQuantity"));
    }
    Ok(())
}

/// Validates a product before insert.
pub fn validate_new_product(product: &NewProduct) -> ValidationResult<()> {
    if let Some(id) = &product.id {
        if id.trim().is_empty() {
            return Err(ValidationError::required("id"));
        }
    }
    validate_product_name(&product.name)?;
    validate_category(&product.category)?;
    validate_price(product.price)?;
    validate_stock_quantity(product.stock_quantity)?;

    if let Some(groups) = &product.variants {
        validate_variants(groups)?;
    }
    Ok(())
}

// =============================================================================
// Transaction Validators
// =============================================================================

/// Validates a transaction before insert.
///
/// ## Rules
/// - `cashierId`, `transactionId`, `currency`, `currencySymbol` non-empty
/// - sales need at least one item; every transaction needs a payment
/// - subtotal, tax, discount, total and change are non-negative
/// - every amount lies within [`Money::MAX_INPUT`]
/// - each item has a product id, a name, a non-negative price and a
///   positive quantity
/// - each payment leg has a positive amount
///
/// Enum membership is guaranteed by the types.
pub fn validate_new_transaction(txn: &NewTransaction) -> ValidationResult<()> {
    if txn.cashier_id.trim().is_empty() {
        return Err(ValidationError::required("cashierId"));
    }
    if txn.transaction_id.trim().is_empty() {
        return Err(ValidationError::required("transactionId"));
    }
    if txn.kind == TransactionType::Sale && txn.items.is_empty() {
        return Err(ValidationError::empty("items"));
    }
    if txn.payment_methods.is_empty() {
        return Err(ValidationError::empty("paymentMethods"));
    }

    for (field, amount) in [
        ("subtotal", txn.subtotal),
        ("tax", txn.tax),
        ("discount", txn.discount),
        ("totalAmount", txn.total),
        ("change", txn.change),
    ] {
        if amount.is_negative() {
            return Err(ValidationError::negative(field));
        }
        validate_amount(field, amount)?;
    }

    if txn.currency.trim().is_empty() {
        return Err(ValidationError::required("currency"));
    }
    if txn.currency_symbol.trim().is_empty() {
        return Err(ValidationError::required("currencySymbol"));
    }

    for (index, item) in txn.items.iter().enumerate() {
        let reason = if item.product_id.trim().is_empty() {
            Some("product id is required")
        } else if item.name.trim().is_empty() {
            Some("name is required")
        } else if item.unit_price.is_negative() || item.calculated_price.is_negative() {
            Some("price must not be negative")
        } else if !item.unit_price.is_within_limit() || !item.calculated_price.is_within_limit() {
            Some("price exceeds the largest accepted amount")
        } else if item.quantity <= 0 {
            Some("quantity must be positive")
        } else {
            None
        };
        if let Some(reason) = reason {
            return Err(ValidationError::InvalidItem {
                index,
                reason: reason.to_string(),
            });
        }
    }

    for (index, payment) in txn.payment_methods.iter().enumerate() {
        let reason = if !payment.amount.is_positive() {
            Some("amount must be positive")
        } else if !payment.amount.is_within_limit() {
            Some("amount exceeds the largest accepted amount")
        } else {
            None
        };
        if let Some(reason) = reason {
            return Err(ValidationError::InvalidPayment {
                index,
                reason: reason.to_string(),
            });
        }
    }

    if let Some(options) = &txn.receipt_options {
        validate_receipt_contact(options)?;
    }

    Ok(())
}

// =============================================================================
// Receipt Contact
// =============================================================================

/// SMS and email receipts need a contact that matches the channel.
pub fn validate_receipt_contact(options: &ReceiptOptions) -> ValidationResult<()> {
    let contact = options.contact.as_deref().map(str::trim).unwrap_or("");
    match options.delivery {
        ReceiptDelivery::Sms => {
            if contact.is_empty() {
                return Err(ValidationError::required("phone"));
            }
            if !is_valid_phone(contact) {
                return Err(ValidationError::InvalidFormat {
                    field: "phone".to_string(),
                    reason: "expected 7 to 15 digits".to_string(),
                });
            }
        }
        ReceiptDelivery::Email => {
            if contact.is_empty() {
                return Err(ValidationError::required("email"));
            }
            if !is_valid_email(contact) {
                return Err(ValidationError::InvalidFormat {
                    field: "email".to_string(),
                    reason: "expected name@domain.tld".to_string(),
                });
            }
        }
        ReceiptDelivery::Print | ReceiptDelivery::None => {}
    }
    Ok(())
}

/// Optional leading `+`, then 7-15 digits once spaces and dashes are removed.
///
/// ```rust
/// use tillpoint_core::validation::is_valid_phone;
///
/// assert!(is_valid_phone("+1 555-123-4567"));
/// assert!(!is_valid_phone("555-12"));
/// assert!(!is_valid_phone("call me"));
/// ```
pub fn is_valid_phone(phone: &str) -> bool {
    let compact: String = phone.chars().filter(|c| *c != ' ' && *c != '-').collect();
    let digits = compact.strip_prefix('+').unwrap_or(&compact);
    (7..=15).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit())
}

/// `local@domain.tld` with no whitespace and a dot after the `@`.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
