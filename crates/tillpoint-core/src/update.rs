//! # Typed Update Requests
//!
//! Partial updates are expressed as a list of tagged changes. Only fields
//! that may change after creation have a variant, so an update touching
//! `id`, `created_at` or a transaction's line items cannot be written.
//!
//! ```rust
//! use tillpoint_core::money::Money;
//! use tillpoint_core::update::ProductUpdate;
//!
//! let update = ProductUpdate::new()
//!     .price(Money::from_cents(450))
//!     .stock_quantity(12)
//!     .price(Money::from_cents(475)); // replaces the earlier price change
//!
//! assert_eq!(update.changes().len(), 2);
//! ```

use std::mem;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::{ReceiptStatus, TransactionStatus, VariantGroup};
use crate::validation;

// =============================================================================
// Product Update
// =============================================================================

/// One mutable product field and its new value.
///
/// Optional fields take an `Option` so they can be cleared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum ProductChange {
    Name(String),
    Category(String),
    Price(Money),
    Image(Option<String>),
    Description(Option<String>),
    Badge(Option<String>),
    Variants(Option<Vec<VariantGroup>>),
    StockQuantity(i64),
    Barcode(Option<String>),
    QrCode(Option<String>),
    ReorderQuantity(Option<i64>),
    MinBuyQuantity(Option<i64>),
    MaxBuyQuantity(Option<i64>),
    Reseller(Option<String>),
    Brand(Option<String>),
    Notes(Option<String>),
}

impl ProductChange {
    /// Column written by this change.
    pub fn column(&self) -> &'static str {
        match self {
            ProductChange::Name(_) => "name",
            ProductChange::Category(_) => "category",
            ProductChange::Price(_) => "price",
            ProductChange::Image(_) => "image",
            ProductChange::Description(_) => "description",
            ProductChange::Badge(_) => "badge",
            ProductChange::Variants(_) => "variants",
            ProductChange::StockQuantity(_) => "stock_quantity",
            ProductChange::Barcode(_) => "barcode",
            ProductChange::QrCode(_) => "qr_code",
            ProductChange::ReorderQuantity(_) => "reorder_quantity",
            ProductChange::MinBuyQuantity(_) => "min_buy_quantity",
            ProductChange::MaxBuyQuantity(_) => "max_buy_quantity",
            ProductChange::Reseller(_) => "reseller",
            ProductChange::Brand(_) => "brand",
            ProductChange::Notes(_) => "notes",
        }
    }
}

/// A set of product changes, at most one per field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductUpdate {
    changes: Vec<ProductChange>,
}

impl ProductUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a change, replacing any earlier change to the same field.
    pub fn with(mut self, change: ProductChange) -> Self {
        self.push(change);
        self
    }

    pub fn push(&mut self, change: ProductChange) {
        let tag = mem::discriminant(&change);
        self.changes.retain(|c| mem::discriminant(c) != tag);
        self.changes.push(change);
    }

    pub fn name(self, name: impl Into<String>) -> Self {
        self.with(ProductChange::Name(name.into()))
    }

    pub fn category(self, category: impl Into<String>) -> Self {
        self.with(ProductChange::Category(category.into()))
    }

    pub fn price(self, price: Money) -> Self {
        self.with(ProductChange::Price(price))
    }

    pub fn stock_quantity(self, quantity: i64) -> Self {
        self.with(ProductChange::StockQuantity(quantity))
    }

    pub fn brand(self, brand: Option<String>) -> Self {
        self.with(ProductChange::Brand(brand))
    }

    pub fn variants(self, variants: Option<Vec<VariantGroup>>) -> Self {
        self.with(ProductChange::Variants(variants))
    }

    pub fn changes(&self) -> &[ProductChange] {
        &self.changes
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Rejects empty updates and values that break product invariants.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.is_empty() {
            return Err(ValidationError::EmptyUpdate);
        }
        for change in &self.changes {
            match change {
                ProductChange::Name(name) => validation::validate_product_name(name)?,
                ProductChange::Category(category) => validation::validate_category(category)?,
                ProductChange::Price(price) => validation::validate_price(*price)?,
                ProductChange::StockQuantity(qty) => validation::validate_stock_quantity(*qty)?,
                ProductChange::Variants(Some(groups)) => validation::validate_variants(groups)?,
                _ => {}
            }
        }
        Ok(())
    }
}

// =============================================================================
// Transaction Update
// =============================================================================

/// The fields a committed transaction still allows to change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum TransactionChange {
    Status(TransactionStatus),
    ReceiptStatus(ReceiptStatus),
    Metrics(Option<serde_json::Value>),
}

impl TransactionChange {
    pub fn column(&self) -> &'static str {
        match self {
            TransactionChange::Status(_) => "status",
            TransactionChange::ReceiptStatus(_) => "receipt_status",
            TransactionChange::Metrics(_) => "metrics",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TransactionUpdate {
    changes: Vec<TransactionChange>,
}

impl TransactionUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, change: TransactionChange) -> Self {
        let tag = mem::discriminant(&change);
        self.changes.retain(|c| mem::discriminant(c) != tag);
        self.changes.push(change);
        self
    }

    pub fn status(self, status: TransactionStatus) -> Self {
        self.with(TransactionChange::Status(status))
    }

    pub fn receipt_status(self, status: ReceiptStatus) -> Self {
        self.with(TransactionChange::ReceiptStatus(status))
    }

    pub fn metrics(self, metrics: Option<serde_json::Value>) -> Self {
        self.with(TransactionChange::Metrics(metrics))
    }

    pub fn changes(&self) -> &[TransactionChange] {
        &self.changes
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.is_empty() {
            return Err(ValidationError::EmptyUpdate);
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_update_rejected() {
        assert_eq!(
            ProductUpdate::new().validate(),
            Err(ValidationError::EmptyUpdate)
        );
        assert_eq!(
            TransactionUpdate::new().validate(),
            Err(ValidationError::EmptyUpdate)
        );
    }

    #[test]
    fn test_later_change_replaces_earlier() {
        let update = ProductUpdate::new().name("A").price(Money::from_cents(1)).name("B");
        assert_eq!(update.changes().len(), 2);
        assert_eq!(update.changes()[1], ProductChange::Name("B".to_string()));
    }

    #[test]
    fn test_negative_values_rejected() {
        let update = ProductUpdate::new().stock_quantity(-1);
        assert!(matches!(
            update.validate(),
            Err(ValidationError::Negative { .. })
        ));
        let update = ProductUpdate::new().price(Money::from_cents(-5));
        assert!(update.validate().is_err());
    }

    #[test]
    fn test_oversized_amounts_rejected() {
        let update = ProductUpdate::new().price(Money::MAX_INPUT + Money::from_cents(1));
        assert!(matches!(
            update.validate(),
            Err(ValidationError::OutOfRange { .. })
        ));

        let update = ProductUpdate::new().variants(Some(vec![VariantGroup {
            kind: "Size".to_string(),
            options: vec![crate::types::VariantOption {
                name: "Huge".to_string(),
                price: Money::from_cents(i64::MAX),
            }],
        }]));
        assert!(update.validate().is_err());
    }

    #[test]
    fn test_change_serializes_tagged() {
        let json = serde_json::to_value(ProductChange::StockQuantity(4)).unwrap();
        assert_eq!(json["field"], "stock_quantity");
        assert_eq!(json["value"], 4);
    }
}
