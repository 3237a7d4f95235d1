//! # Cart
//!
//! The in-memory cart that checkout turns into a transaction.
//!
//! ## Cart Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Cart Operations                                      │
//! │                                                                         │
//! │  Tap product + options ──► add_item() ───────► merge or push line      │
//! │  Change quantity ────────► update_quantity() ► 0 removes the line      │
//! │  Remove line ────────────► remove_item()                               │
//! │  Apply discount ─────────► set_discount()                              │
//! │  Checkout ───────────────► totals(rate) + to_transaction_items()       │
//! │  Commit / degraded ──────► clear()  (items, discount, customer)        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Lines are keyed by product id plus the selected variant combination, so
//! a small and a large latte are two lines.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{Product, TaxRate, TransactionItem};
use crate::validation::validate_amount;
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY};

/// An item in the cart.
///
/// Prices are frozen when the line is added; later catalog edits do not
/// change an open cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: String,
    pub name: String,
    pub unit_price: Money,
    /// Sum of the selected options' price deltas.
    pub variant_price: Money,
    pub selected_variants: BTreeMap<String, String>,
    pub quantity: i64,
    pub note: Option<String>,
    pub added_at: DateTime<Utc>,
}

impl CartItem {
    pub fn new(
        product_id: impl Into<String>,
        name: impl Into<String>,
        unit_price: Money,
        quantity: i64,
    ) -> Self {
        CartItem {
            product_id: product_id.into(),
            name: name.into(),
            unit_price,
            variant_price: Money::zero(),
            selected_variants: BTreeMap::new(),
            quantity,
            note: None,
            added_at: Utc::now(),
        }
    }

    pub fn with_variant_price(mut self, delta: Money) -> Self {
        self.variant_price = delta;
        self
    }

    /// Line key: `P2` or `P2[size=Large,milk=Oat]` (options sorted by kind).
    pub fn key(&self) -> String {
        line_key(&self.product_id, &self.selected_variants)
    }

    /// Base price plus variant delta.
    pub fn calculated_price(&self) -> Money {
        self.unit_price + self.variant_price
    }

    pub fn line_total(&self) -> Money {
        self.calculated_price() * self.quantity
    }

    pub fn to_transaction_item(&self) -> TransactionItem {
        let mut item = TransactionItem::new(
            self.product_id.clone(),
            self.name.clone(),
            self.unit_price,
            self.variant_price,
            self.quantity,
        )
        .with_variants(self.selected_variants.clone());
        item.note = self.note.clone();
        item
    }
}

fn line_key(product_id: &str, selected: &BTreeMap<String, String>) -> String {
    if selected.is_empty() {
        return product_id.to_string();
    }
    let options: Vec<String> = selected.iter().map(|(k, v)| format!("{k}={v}")).collect();
    format!("{}[{}]", product_id, options.join(","))
}

fn check_quantity(quantity: i64) -> CoreResult<()> {
    if quantity <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        }
        .into());
    }
    if quantity > MAX_ITEM_QUANTITY {
        return Err(CoreError::QuantityTooLarge {
            requested: quantity,
            max: MAX_ITEM_QUANTITY,
        });
    }
    Ok(())
}

/// The shopping cart.
///
/// ## Invariants
/// - Lines are unique by key (adding the same key increases quantity)
/// - Quantity is in `1..=999`
/// - At most 100 lines
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cart {
    pub items: Vec<CartItem>,
    pub discount: Money,
    pub customer_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Default for Cart {
    fn default() -> Self {
        Cart::new()
    }
}

impl Cart {
    pub fn new() -> Self {
        Cart {
            items: Vec::new(),
            discount: Money::zero(),
            customer_name: None,
            created_at: Utc::now(),
        }
    }

    /// Adds a product with the chosen variant options.
    ///
    /// `selections` maps variant kind to option name; each must exist on the
    /// product. The option deltas are summed into the line's variant price.
    pub fn add_item(
        &mut self,
        product: &Product,
        selections: BTreeMap<String, String>,
        quantity: i64,
    ) -> CoreResult<()> {
        let mut delta = Money::zero();
        for (kind, option) in &selections {
            let found = product.variant_option(kind, option).ok_or_else(|| {
                CoreError::UnknownVariant {
                    product_id: product.id.clone(),
                    kind: kind.clone(),
                    option: option.clone(),
                }
            })?;
            delta += found.price;
        }

        let mut line = CartItem::new(product.id.clone(), product.name.clone(), product.price, quantity)
            .with_variant_price(delta);
        line.selected_variants = selections;
        self.add_line(line)
    }

    /// Adds a prepared line, merging with an existing line of the same key.
    pub fn add_line(&mut self, line: CartItem) -> CoreResult<()> {
        check_quantity(line.quantity)?;
        validate_amount("unitPrice", line.unit_price)?;
        validate_amount("variantPrice", line.variant_price)?;

        let key = line.key();
        if let Some(existing) = self.items.iter_mut().find(|i| i.key() == key) {
            let merged = existing.quantity + line.quantity;
            check_quantity(merged)?;
            existing.quantity = merged;
            return Ok(());
        }

        if self.items.len() >= MAX_CART_ITEMS {
            return Err(CoreError::CartTooLarge {
                max: MAX_CART_ITEMS,
            });
        }
        self.items.push(line);
        Ok(())
    }

    /// Sets a line's quantity. Zero removes the line.
    pub fn update_quantity(&mut self, key: &str, quantity: i64) -> CoreResult<()> {
        if quantity == 0 {
            return self.remove_item(key);
        }
        check_quantity(quantity)?;

        match self.items.iter_mut().find(|i| i.key() == key) {
            Some(item) => {
                item.quantity = quantity;
                Ok(())
            }
            None => Err(CoreError::NotInCart(key.to_string())),
        }
    }

    pub fn remove_item(&mut self, key: &str) -> CoreResult<()> {
        let before = self.items.len();
        self.items.retain(|i| i.key() != key);
        if self.items.len() == before {
            return Err(CoreError::NotInCart(key.to_string()));
        }
        Ok(())
    }

    pub fn set_note(&mut self, key: &str, note: Option<String>) -> CoreResult<()> {
        let item = self
            .items
            .iter_mut()
            .find(|i| i.key() == key)
            .ok_or_else(|| CoreError::NotInCart(key.to_string()))?;
        item.note = note;
        Ok(())
    }

    /// Sets the order discount. It may not exceed subtotal plus tax.
    pub fn set_discount(&mut self, discount: Money, tax_rate: TaxRate) -> CoreResult<()> {
        if discount.is_negative() {
            return Err(ValidationError::negative("discount").into());
        }
        let subtotal = self.subtotal();
        let limit = subtotal + subtotal.calculate_tax(tax_rate);
        if discount > limit {
            return Err(CoreError::DiscountTooLarge { discount, limit });
        }
        self.discount = discount;
        Ok(())
    }

    pub fn set_customer_name(&mut self, name: Option<String>) {
        self.customer_name = name.filter(|n| !n.trim().is_empty());
    }

    /// Empties the cart: lines, discount and customer name.
    pub fn clear(&mut self) {
        self.items.clear();
        self.discount = Money::zero();
        self.customer_name = None;
        self.created_at = Utc::now();
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn total_quantity(&self) -> i64 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    /// Σ (unit price + variant delta) × quantity.
    pub fn subtotal(&self) -> Money {
        self.items.iter().map(CartItem::line_total).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Totals at the given tax rate: `subtotal + tax − discount`.
    ///
    /// The total never goes below zero, even if lines were removed after a
    /// discount was set.
    pub fn totals(&self, tax_rate: TaxRate) -> CartTotals {
        let subtotal = self.subtotal();
        let tax = subtotal.calculate_tax(tax_rate);
        CartTotals {
            item_count: self.item_count(),
            total_quantity: self.total_quantity(),
            subtotal,
            tax,
            discount: self.discount,
            total: (subtotal + tax - self.discount).non_negative(),
        }
    }

    pub fn to_transaction_items(&self) -> Vec<TransactionItem> {
        self.items.iter().map(CartItem::to_transaction_item).collect()
    }
}

/// Cart totals summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CartTotals {
    pub item_count: usize,
    pub total_quantity: i64,
    pub subtotal: Money,
    pub tax: Money,
    pub discount: Money,
    pub total: Money,
}

// =============================================================================
// Unit Tests
// =============================================================================
