//! # Domain Types
//!
//! Core domain types used throughout Tillpoint.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │   Transaction   │   │  PaymentMethod  │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (string)    │   │  id (rowid)     │   │  kind           │       │
//! │  │  name/category  │   │  transaction_id │   │  amount > 0     │       │
//! │  │  price          │   │  items[]  ──────┼──►│  reference      │       │
//! │  │  variants[]     │   │  payments[]     │   └─────────────────┘       │
//! │  │  stock_quantity │   │  totals         │                             │
//! │  └─────────────────┘   └────────┬────────┘                             │
//! │                                 │                                       │
//! │                        ┌────────▼────────┐   ┌─────────────────┐       │
//! │                        │ TransactionItem │   │ ReceiptOptions  │       │
//! │                        │  unit + variant │   │  print/sms/     │       │
//! │                        │  × quantity     │   │  email/none     │       │
//! │                        └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Identity
//! - Products carry an opaque string id (generated when absent).
//! - Transactions carry a surrogate rowid plus the caller-supplied,
//!   globally unique `transaction_id`.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ParseEnumError;
use crate::money::Money;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// ## Why Basis Points?
/// 1 basis point = 0.01% = 1/10000
/// 1000 bps = 10% (the default checkout rate)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::from_bps(crate::DEFAULT_TAX_RATE_BPS)
    }
}

// =============================================================================
// Variants
// =============================================================================

/// One selectable option inside a variant group, e.g. "Large" (+$1.00).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct VariantOption {
    pub name: String,
    /// Price delta added to the product's base price.
    pub price: Money,
}

/// A group of options of one kind (size, flavor, color, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct VariantGroup {
    pub kind: String,
    pub options: Vec<VariantOption>,
}

// =============================================================================
// Product
// =============================================================================

/// A product available for sale.
///
/// `in_stock` is a cached projection of `stock_quantity > 0`; every store
/// write path derives it in the same statement that sets the quantity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub category: String,
    pub price: Money,
    pub image: Option<String>,
    pub description: Option<String>,
    pub badge: Option<String>,
    pub variants: Option<Vec<VariantGroup>>,
    pub in_stock: bool,
    pub stock_quantity: i64,
    pub barcode: Option<String>,
    pub qr_code: Option<String>,
    pub reorder_quantity: Option<i64>,
    pub min_buy_quantity: Option<i64>,
    pub max_buy_quantity: Option<i64>,
    pub reseller: Option<String>,
    pub brand: Option<String>,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Looks up a variant option by group kind and option name.
    pub fn variant_option(&self, kind: &str, option: &str) -> Option<&VariantOption> {
        self.variants
            .as_deref()?
            .iter()
            .find(|group| group.kind == kind)?
            .options
            .iter()
            .find(|o| o.name == option)
    }
}

/// Input for creating a product. `id` is generated when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewProduct {
    pub id: Option<String>,
    pub name: String,
    pub category: String,
    pub price: Money,
    pub image: Option<String>,
    pub description: Option<String>,
    pub badge: Option<String>,
    pub variants: Option<Vec<VariantGroup>>,
    pub stock_quantity: i64,
    pub barcode: Option<String>,
    pub qr_code: Option<String>,
    pub reorder_quantity: Option<i64>,
    pub min_buy_quantity: Option<i64>,
    pub max_buy_quantity: Option<i64>,
    pub reseller: Option<String>,
    pub brand: Option<String>,
    pub notes: Option<String>,
}

impl NewProduct {
    pub fn new(name: impl Into<String>, category: impl Into<String>, price: Money) -> Self {
        Self {
            id: None,
            name: name.into(),
            category: category.into(),
            price,
            image: None,
            description: None,
            badge: None,
            variants: None,
            stock_quantity: 0,
            barcode: None,
            qr_code: None,
            reorder_quantity: None,
            min_buy_quantity: None,
            max_buy_quantity: None,
            reseller: None,
            brand: None,
            notes: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_stock(mut self, quantity: i64) -> Self {
        self.stock_quantity = quantity;
        self
    }

    pub fn with_variants(mut self, variants: Vec<VariantGroup>) -> Self {
        self.variants = Some(variants);
        self
    }

    pub fn with_brand(mut self, brand: impl Into<String>) -> Self {
        self.brand = Some(brand.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_barcode(mut self, barcode: impl Into<String>) -> Self {
        self.barcode = Some(barcode.into());
        self
    }
}

// =============================================================================
// Product Queries
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    #[default]
    Name,
    Price,
    Created,
    Stock,
}

impl SortField {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortField::Name => "name",
            SortField::Price => "price",
            SortField::Created => "created",
            SortField::Stock => "stock",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

/// Sort order for product listings. Defaults to name ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductSort {
    pub field: SortField,
    pub direction: SortDirection,
}

impl ProductSort {
    pub const fn new(field: SortField, direction: SortDirection) -> Self {
        Self { field, direction }
    }

    pub fn is_default(&self) -> bool {
        *self == ProductSort::default()
    }
}

/// Conjunctive filter for product listings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductFilter {
    /// Substring match over name, description and category.
    pub search: Option<String>,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub in_stock: Option<bool>,
    pub min_price: Option<Money>,
    pub max_price: Option<Money>,
    pub sort: ProductSort,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Aggregate catalog statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductStats {
    pub total_products: i64,
    /// Σ price × stock_quantity.
    pub total_value: Money,
    pub average_price: Money,
    pub in_stock: i64,
    pub out_of_stock: i64,
    /// Number of distinct categories.
    pub categories: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CategoryCount {
    pub category: String,
    pub count: i64,
}

// =============================================================================
// Payment
// =============================================================================

/// How a payment leg was tendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum PaymentKind {
    Cash,
    Card,
    Mobile,
    Link,
    Account,
    Split,
}

impl PaymentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentKind::Cash => "cash",
            PaymentKind::Card => "card",
            PaymentKind::Mobile => "mobile",
            PaymentKind::Link => "link",
            PaymentKind::Account => "account",
            PaymentKind::Split => "split",
        }
    }
}

impl fmt::Display for PaymentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One payment leg of a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PaymentMethod {
    #[serde(rename = "type")]
    pub kind: PaymentKind,
    pub amount: Money,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_code: Option<String>,
}

impl PaymentMethod {
    pub fn new(kind: PaymentKind, amount: Money) -> Self {
        Self {
            kind,
            amount,
            reference: None,
            approval_code: None,
        }
    }
}

// =============================================================================
// Status Enums
// =============================================================================

/// Receipt lifecycle of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum ReceiptStatus {
    Issued,
    Pending,
    Void,
}

impl ReceiptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReceiptStatus::Issued => "issued",
            ReceiptStatus::Pending => "pending",
            ReceiptStatus::Void => "void",
        }
    }
}

impl FromStr for ReceiptStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "issued" => Ok(ReceiptStatus::Issued),
            "pending" => Ok(ReceiptStatus::Pending),
            "void" => Ok(ReceiptStatus::Void),
            other => Err(ParseEnumError {
                kind: "receipt status",
                value: other.to_string(),
            }),
        }
    }
}

/// Settlement status of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    #[default]
    Completed,
    Pending,
    Canceled,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Completed => "completed",
            TransactionStatus::Pending => "pending",
            TransactionStatus::Canceled => "canceled",
        }
    }
}

impl FromStr for TransactionStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "completed" => Ok(TransactionStatus::Completed),
            "pending" => Ok(TransactionStatus::Pending),
            "canceled" => Ok(TransactionStatus::Canceled),
            other => Err(ParseEnumError {
                kind: "transaction status",
                value: other.to_string(),
            }),
        }
    }
}

/// Kind of commercial event a transaction records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    #[default]
    Sale,
    Refund,
    Return,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Sale => "sale",
            TransactionType::Refund => "refund",
            TransactionType::Return => "return",
        }
    }
}

impl FromStr for TransactionType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sale" => Ok(TransactionType::Sale),
            "refund" => Ok(TransactionType::Refund),
            "return" => Ok(TransactionType::Return),
            other => Err(ParseEnumError {
                kind: "transaction type",
                value: other.to_string(),
            }),
        }
    }
}

// =============================================================================
// Receipt Options
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum ReceiptDelivery {
    #[default]
    Print,
    Sms,
    Email,
    None,
}

/// How the customer wants their receipt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReceiptOptions {
    pub delivery: ReceiptDelivery,
    /// Phone number for SMS, address for email.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
}

impl ReceiptOptions {
    pub fn print() -> Self {
        Self::default()
    }

    pub fn sms(phone: impl Into<String>) -> Self {
        Self {
            delivery: ReceiptDelivery::Sms,
            contact: Some(phone.into()),
        }
    }

    pub fn email(address: impl Into<String>) -> Self {
        Self {
            delivery: ReceiptDelivery::Email,
            contact: Some(address.into()),
        }
    }
}

// =============================================================================
// Transaction Item
// =============================================================================

/// A priced line within a transaction.
///
/// Snapshot of the product at the time of sale. The derived prices are
/// computed once by [`TransactionItem::new`]:
/// `calculated_price = unit_price + variant_price`,
/// `total_price = calculated_price × quantity`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TransactionItem {
    pub product_id: String,
    pub name: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub variant_price: Money,
    pub calculated_price: Money,
    pub total_price: Money,
    #[serde(default)]
    pub selected_variants: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl TransactionItem {
    pub fn new(
        product_id: impl Into<String>,
        name: impl Into<String>,
        unit_price: Money,
        variant_price: Money,
        quantity: i64,
    ) -> Self {
        let calculated_price = unit_price + variant_price;
        Self {
            product_id: product_id.into(),
            name: name.into(),
            quantity,
            unit_price,
            variant_price,
            calculated_price,
            total_price: calculated_price * quantity,
            selected_variants: BTreeMap::new(),
            note: None,
        }
    }

    pub fn with_variants(mut self, selected: BTreeMap<String, String>) -> Self {
        self.selected_variants = selected;
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

// =============================================================================
// Transaction
// =============================================================================

/// A committed sale, refund or return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Transaction {
    /// Surrogate row id.
    pub id: i64,
    pub cashier_id: String,
    /// Globally unique, caller-supplied identifier.
    pub transaction_id: String,
    pub order_id: Option<String>,
    pub items: Vec<TransactionItem>,
    pub payment_methods: Vec<PaymentMethod>,
    pub subtotal: Money,
    pub tax: Money,
    pub discount: Money,
    pub total: Money,
    pub change: Money,
    pub customer_name: Option<String>,
    pub receipt_status: ReceiptStatus,
    pub receipt_options: Option<ReceiptOptions>,
    pub status: TransactionStatus,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub currency: String,
    pub currency_symbol: String,
    #[ts(as = "Option<String>")]
    pub metrics: Option<serde_json::Value>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Sum of all payment legs.
    pub fn amount_paid(&self) -> Money {
        self.payment_methods.iter().map(|p| p.amount).sum()
    }
}

/// Input for creating a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewTransaction {
    pub cashier_id: String,
    pub transaction_id: String,
    pub order_id: Option<String>,
    pub items: Vec<TransactionItem>,
    pub payment_methods: Vec<PaymentMethod>,
    pub subtotal: Money,
    pub tax: Money,
    pub discount: Money,
    pub total: Money,
    pub change: Money,
    pub customer_name: Option<String>,
    pub receipt_status: ReceiptStatus,
    pub receipt_options: Option<ReceiptOptions>,
    pub status: TransactionStatus,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub currency: String,
    pub currency_symbol: String,
    #[ts(as = "Option<String>")]
    pub metrics: Option<serde_json::Value>,
}

impl NewTransaction {
    /// A completed sale with an issued receipt in the default currency.
    ///
    /// Totals start at zero; callers fill them in from the cart.
    pub fn sale(cashier_id: impl Into<String>, transaction_id: impl Into<String>) -> Self {
        Self {
            cashier_id: cashier_id.into(),
            transaction_id: transaction_id.into(),
            order_id: None,
            items: Vec::new(),
            payment_methods: Vec::new(),
            subtotal: Money::zero(),
            tax: Money::zero(),
            discount: Money::zero(),
            total: Money::zero(),
            change: Money::zero(),
            customer_name: None,
            receipt_status: ReceiptStatus::Issued,
            receipt_options: None,
            status: TransactionStatus::Completed,
            kind: TransactionType::Sale,
            currency: crate::DEFAULT_CURRENCY.to_string(),
            currency_symbol: crate::DEFAULT_CURRENCY_SYMBOL.to_string(),
            metrics: None,
        }
    }
}

/// Conjunctive filter for transaction listings and stats.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TransactionFilter {
    pub cashier_id: Option<String>,
    pub status: Option<TransactionStatus>,
    pub kind: Option<TransactionType>,
    #[ts(as = "Option<String>")]
    pub date_from: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub date_to: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TransactionStats {
    pub count: i64,
    pub total_amount: Money,
    pub total_discount: Money,
    pub average_total: Money,
}

// =============================================================================
// Analytics
// =============================================================================

/// A normalized line item joined with the current catalog row.
///
/// Product fields are `None` when the product no longer exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LineItemWithProduct {
    pub id: i64,
    pub transaction_id: String,
    pub product_id: String,
    pub name: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub variant_price: Money,
    pub total_price: Money,
    pub selected_variants: BTreeMap<String, String>,
    pub note: Option<String>,
    pub product_name: Option<String>,
    pub product_category: Option<String>,
    pub product_image: Option<String>,
    pub current_price: Option<Money>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductAnalytics {
    pub product_id: String,
    pub total_sold: i64,
    pub total_revenue: Money,
    /// Revenue divided by the number of distinct transactions.
    pub average_order_value: Money,
    #[ts(as = "Option<String>")]
    pub last_sold_at: Option<DateTime<Utc>>,
}

impl ProductAnalytics {
    pub fn empty(product_id: impl Into<String>) -> Self {
        Self {
            product_id: product_id.into(),
            ..Self::default()
        }
    }
}

// =============================================================================
// Best-Effort Report
// =============================================================================

/// Outcome of a step whose failures are tolerated.
///
/// Used by index creation, line-item saves and cache preload so callers can
/// see partial failure instead of only a log line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BestEffortReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failures: Vec<String>,
}

impl BestEffortReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self) {
        self.attempted += 1;
        self.succeeded += 1;
    }

    pub fn record_failure(&mut self, what: impl fmt::Display, err: impl fmt::Display) {
        self.attempted += 1;
        self.failures.push(format!("{what}: {err}"));
    }

    pub fn failed(&self) -> usize {
        self.attempted - self.succeeded
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_product() -> Product {
        let now = Utc::now();
        Product {
            id: "P2".to_string(),
            name: "Latte".to_string(),
            category: "Coffee".to_string(),
            price: Money::from_cents(500),
            image: None,
            description: None,
            badge: None,
            variants: Some(vec![VariantGroup {
                kind: "size".to_string(),
                options: vec![
                    VariantOption {
                        name: "Regular".to_string(),
                        price: Money::zero(),
                    },
                    VariantOption {
                        name: "Large".to_string(),
                        price: Money::from_cents(100),
                    },
                ],
            }]),
            in_stock: false,
            stock_quantity: 0,
            barcode: None,
            qr_code: None,
            reorder_quantity: None,
            min_buy_quantity: None,
            max_buy_quantity: None,
            reseller: None,
            brand: None,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_tax_rate_from_bps() {
        let rate = TaxRate::from_bps(825);
        assert_eq!(rate.bps(), 825);
        assert!((rate.percentage() - 8.25).abs() < 0.001);
        assert_eq!(TaxRate::default().bps(), 1000);
    }

    #[test]
    fn test_variant_option_lookup() {
        let product = sample_product();
        let large = product.variant_option("size", "Large").unwrap();
        assert_eq!(large.price.cents(), 100);
        assert!(product.variant_option("size", "Huge").is_none());
        assert!(product.variant_option("color", "Large").is_none());
    }

    #[test]
    fn test_transaction_item_derives_prices() {
        let item = TransactionItem::new("P2", "Latte", Money::from_cents(500), Money::from_cents(100), 3);
        assert_eq!(item.calculated_price.cents(), 600);
        assert_eq!(item.total_price.cents(), 1800);
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!("void".parse::<ReceiptStatus>().unwrap(), ReceiptStatus::Void);
        assert_eq!(
            "refund".parse::<TransactionType>().unwrap(),
            TransactionType::Refund
        );
        let err = "archived".parse::<TransactionStatus>().unwrap_err();
        assert_eq!(err.to_string(), "unknown transaction status 'archived'");
    }

    #[test]
    fn test_payment_method_serializes_type_field() {
        let json = serde_json::to_value(PaymentMethod::new(PaymentKind::Cash, Money::from_cents(2860)))
            .unwrap();
        assert_eq!(json["type"], "cash");
        assert_eq!(json["amount"], 2860);
        assert!(json.get("reference").is_none());
    }

    #[test]
    fn test_best_effort_report_counts() {
        let mut report = BestEffortReport::new();
        report.record_success();
        report.record_failure("idx_products_brand", "disk I/O error");
        assert_eq!(report.attempted, 2);
        assert_eq!(report.failed(), 1);
        assert!(!report.is_complete());
        assert_eq!(report.failures[0], "idx_products_brand: disk I/O error");
    }
}
