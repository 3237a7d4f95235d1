//! Shared fixtures for the storage integration tests.

#![allow(dead_code)]

use tillpoint_core::{
    Money, NewProduct, NewTransaction, PaymentKind, PaymentMethod, TransactionItem,
};
use tillpoint_db::{Database, DbConfig};

/// Fresh in-memory database with schema and migrations applied.
pub async fn test_db() -> Database {
    Database::new(DbConfig::in_memory())
        .await
        .expect("in-memory database")
}

pub fn product(id: &str, name: &str, category: &str, cents: i64, stock: i64) -> NewProduct {
    NewProduct::new(name, category, Money::from_cents(cents))
        .with_id(id)
        .with_stock(stock)
}

pub async fn seed_products(db: &Database, products: &[NewProduct]) {
    db.products()
        .bulk_import(products)
        .await
        .expect("bulk import");
}

/// A one-item cash sale totalling `quantity × cents` plus 10% tax.
pub fn cash_sale(
    transaction_id: &str,
    product_id: &str,
    cents: i64,
    quantity: i64,
) -> NewTransaction {
    let item = TransactionItem::new(
        product_id,
        format!("Item {product_id}"),
        Money::from_cents(cents),
        Money::zero(),
        quantity,
    );
    let subtotal = item.total_price;
    let tax = Money::from_cents((subtotal.cents() + 5) / 10);
    let total = subtotal + tax;

    let mut txn = NewTransaction::sale("cashier-1", transaction_id);
    txn.items = vec![item];
    txn.payment_methods = vec![PaymentMethod::new(PaymentKind::Cash, total)];
    txn.subtotal = subtotal;
    txn.tax = tax;
    txn.total = total;
    txn
}
