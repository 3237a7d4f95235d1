//! Transaction store, line items and analytics against real SQLite.

mod common;

use chrono::{Duration, Utc};
use common::{cash_sale, product, seed_products, test_db};
use tillpoint_core::{
    Money, NewTransaction, PaymentKind, PaymentMethod, ReceiptOptions, ReceiptStatus,
    TransactionFilter, TransactionItem, TransactionStatus, TransactionType, TransactionUpdate,
    ValidationError,
};
use tillpoint_db::DbError;

#[tokio::test]
async fn create_round_trips_every_field() {
    let db = test_db().await;
    let repo = db.transactions();

    let mut input = cash_sale("TXN-1", "P1", 450, 2);
    input.customer_name = Some("Ada".to_string());
    input.order_id = Some("ORD-7".to_string());
    input.receipt_options = Some(ReceiptOptions::email("ada@example.com"));
    input.metrics = Some(serde_json::json!({ "durationMs": 3100 }));
    input.payment_methods[0].amount = Money::from_cents(1000);
    input.change = Money::from_cents(10);

    let stored = repo.create(&input).await.unwrap();
    assert!(stored.id > 0);
    assert_eq!(stored.transaction_id, "TXN-1");
    assert_eq!(stored.items, input.items);
    assert_eq!(stored.payment_methods, input.payment_methods);
    assert_eq!(stored.subtotal, Money::from_cents(900));
    assert_eq!(stored.tax, Money::from_cents(90));
    assert_eq!(stored.total, Money::from_cents(990));
    assert_eq!(stored.change, Money::from_cents(10));
    assert_eq!(stored.amount_paid(), Money::from_cents(1000));
    assert_eq!(stored.receipt_options, input.receipt_options);
    assert_eq!(stored.metrics, input.metrics);
    assert_eq!(stored.status, TransactionStatus::Completed);
    assert_eq!(stored.receipt_status, ReceiptStatus::Issued);
    assert_eq!(stored.kind, TransactionType::Sale);
    assert_eq!(stored.currency, "USD");
    assert_eq!(stored.currency_symbol, "$");

    let by_business_id = repo.get_by_transaction_id("TXN-1").await.unwrap();
    assert_eq!(by_business_id, stored);
    assert!(matches!(
        repo.get_by_transaction_id("TXN-2").await.unwrap_err(),
        DbError::NotFound { .. }
    ));
}

#[tokio::test]
async fn transaction_id_is_unique() {
    let db = test_db().await;
    let repo = db.transactions();

    repo.create(&cash_sale("TXN-1", "P1", 450, 1)).await.unwrap();
    let err = repo
        .create(&cash_sale("TXN-1", "P2", 300, 1))
        .await
        .unwrap_err();

    match err {
        DbError::UniqueViolation { field, value } => {
            assert_eq!(field, "transaction_id");
            assert_eq!(value, "TXN-1");
        }
        other => panic!("expected UniqueViolation, got {other:?}"),
    }
    assert_eq!(repo.count_all().await.unwrap(), 1);
}

#[tokio::test]
async fn invalid_transactions_write_nothing() {
    let db = test_db().await;
    let repo = db.transactions();

    let mut no_items = cash_sale("TXN-1", "P1", 450, 1);
    no_items.items.clear();
    assert!(matches!(
        repo.create(&no_items).await.unwrap_err(),
        DbError::Validation(ValidationError::Empty { .. })
    ));

    let mut no_payment = cash_sale("TXN-2", "P1", 450, 1);
    no_payment.payment_methods.clear();
    assert!(matches!(
        repo.create(&no_payment).await.unwrap_err(),
        DbError::Validation(_)
    ));

    let mut bad_contact = cash_sale("TXN-3", "P1", 450, 1);
    bad_contact.receipt_options = Some(ReceiptOptions::sms("call me"));
    assert!(matches!(
        repo.create(&bad_contact).await.unwrap_err(),
        DbError::Validation(_)
    ));

    assert_eq!(repo.count_all().await.unwrap(), 0);
}

#[tokio::test]
async fn refunds_may_have_no_items() {
    let db = test_db().await;
    let mut refund = NewTransaction::sale("cashier-1", "RFD-1");
    refund.kind = TransactionType::Refund;
    refund.total = Money::from_cents(450);
    refund.payment_methods = vec![PaymentMethod::new(PaymentKind::Card, Money::from_cents(450))];

    let stored = db.transactions().create(&refund).await.unwrap();
    assert_eq!(stored.kind, TransactionType::Refund);
    assert!(stored.items.is_empty());
}

#[tokio::test]
async fn list_is_newest_first_and_filtered() {
    let db = test_db().await;
    let repo = db.transactions();

    repo.create(&cash_sale("TXN-1", "P1", 100, 1)).await.unwrap();
    let mut other_cashier = cash_sale("TXN-2", "P1", 200, 1);
    other_cashier.cashier_id = "cashier-2".to_string();
    repo.create(&other_cashier).await.unwrap();
    let third = repo.create(&cash_sale("TXN-3", "P1", 300, 1)).await.unwrap();
    repo.update(
        third.id,
        &TransactionUpdate::new().status(TransactionStatus::Canceled),
    )
    .await
    .unwrap();

    let all = repo.list(&TransactionFilter::default()).await.unwrap();
    let ids: Vec<_> = all.iter().map(|t| t.transaction_id.as_str()).collect();
    assert_eq!(ids, vec!["TXN-3", "TXN-2", "TXN-1"]);

    let mine = repo
        .list(&TransactionFilter {
            cashier_id: Some("cashier-1".to_string()),
            status: Some(TransactionStatus::Completed),
            ..Default::default()
        })
        .await
        .unwrap();
    let ids: Vec<_> = mine.iter().map(|t| t.transaction_id.as_str()).collect();
    assert_eq!(ids, vec!["TXN-1"]);

    let refunds = repo
        .list(&TransactionFilter {
            kind: Some(TransactionType::Refund),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(refunds.is_empty());

    let future = repo
        .list(&TransactionFilter {
            date_from: Some(Utc::now() + Duration::hours(1)),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(future.is_empty());

    let window = repo
        .list(&TransactionFilter {
            date_from: Some(Utc::now() - Duration::hours(1)),
            date_to: Some(Utc::now() + Duration::hours(1)),
            limit: Some(2),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(window.len(), 2);

    let recent = repo.recent(1).await.unwrap();
    assert_eq!(recent[0].transaction_id, "TXN-3");
}

#[tokio::test]
async fn update_touches_only_mutable_fields() {
    let db = test_db().await;
    let repo = db.transactions();
    let created = repo.create(&cash_sale("TXN-1", "P1", 450, 1)).await.unwrap();

    let updated = repo
        .update(
            created.id,
            &TransactionUpdate::new()
                .status(TransactionStatus::Canceled)
                .receipt_status(ReceiptStatus::Void)
                .metrics(Some(serde_json::json!({ "voidedBy": "manager" }))),
        )
        .await
        .unwrap();

    assert_eq!(updated.status, TransactionStatus::Canceled);
    assert_eq!(updated.receipt_status, ReceiptStatus::Void);
    assert_eq!(
        updated.metrics,
        Some(serde_json::json!({ "voidedBy": "manager" }))
    );
    assert_eq!(updated.total, created.total);
    assert_eq!(updated.items, created.items);

    assert!(matches!(
        repo.update(created.id, &TransactionUpdate::new())
            .await
            .unwrap_err(),
        DbError::Validation(ValidationError::EmptyUpdate)
    ));
    assert!(matches!(
        repo.update(9999, &TransactionUpdate::new().receipt_status(ReceiptStatus::Pending))
            .await
            .unwrap_err(),
        DbError::NotFound { .. }
    ));
}

#[tokio::test]
async fn unknown_stored_enum_is_a_decode_error() {
    let db = test_db().await;
    let repo = db.transactions();
    let created = repo.create(&cash_sale("TXN-1", "P1", 450, 1)).await.unwrap();

    sqlx::query("UPDATE transactions SET status = 'layaway' WHERE id = ?")
        .bind(created.id)
        .execute(db.pool())
        .await
        .unwrap();

    match repo.get_by_id(created.id).await.unwrap_err() {
        DbError::Serialization { column, .. } => assert_eq!(column, "status"),
        other => panic!("expected Serialization, got {other:?}"),
    }
}

#[tokio::test]
async fn corrupt_blob_is_a_decode_error() {
    let db = test_db().await;
    let repo = db.transactions();
    let created = repo.create(&cash_sale("TXN-1", "P1", 450, 1)).await.unwrap();

    sqlx::query("UPDATE transactions SET items = '{oops' WHERE id = ?")
        .bind(created.id)
        .execute(db.pool())
        .await
        .unwrap();

    assert!(matches!(
        repo.get_by_id(created.id).await.unwrap_err(),
        DbError::Serialization { .. }
    ));
}

#[tokio::test]
async fn stats_aggregate_matching_rows() {
    let db = test_db().await;
    let repo = db.transactions();

    repo.create(&cash_sale("TXN-1", "P1", 1000, 1)).await.unwrap();
    let mut discounted = cash_sale("TXN-2", "P1", 2000, 1);
    discounted.discount = Money::from_cents(200);
    discounted.total = discounted.total - Money::from_cents(200);
    repo.create(&discounted).await.unwrap();

    let stats = repo.stats(&TransactionFilter::default()).await.unwrap();
    assert_eq!(stats.count, 2);
    assert_eq!(stats.total_amount, Money::from_cents(1100 + 2000));
    assert_eq!(stats.total_discount, Money::from_cents(200));
    assert_eq!(stats.average_total, Money::from_cents(1550));

    let none = repo
        .stats(&TransactionFilter {
            cashier_id: Some("nobody".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(none.count, 0);
    assert_eq!(none.total_amount, Money::zero());
}

#[tokio::test]
async fn search_matches_ids_customers_and_items() {
    let db = test_db().await;
    let repo = db.transactions();

    let mut ada = cash_sale("TXN-100", "P1", 450, 1);
    ada.customer_name = Some("Ada Lovelace".to_string());
    repo.create(&ada).await.unwrap();

    let mut croissant = cash_sale("TXN-200", "B1", 350, 1);
    croissant.items[0].name = "Butter Croissant".to_string();
    repo.create(&croissant).await.unwrap();

    let by_customer = repo.search("lovelace", 10).await.unwrap();
    assert_eq!(by_customer.len(), 1);
    assert_eq!(by_customer[0].transaction_id, "TXN-100");

    let by_item = repo.search("croissant", 10).await.unwrap();
    assert_eq!(by_item.len(), 1);
    assert_eq!(by_item[0].transaction_id, "TXN-200");

    let by_id = repo.search("TXN-", 10).await.unwrap();
    assert_eq!(by_id.len(), 2);

    assert_eq!(repo.search("  ", 10).await.unwrap().len(), 2);
}

#[tokio::test]
async fn line_items_join_current_catalog() {
    let db = test_db().await;
    seed_products(
        &db,
        &[
            product("P1", "Latte", "Coffee", 475, 5),
            product("P2", "Muffin", "Bakery", 375, 5),
        ],
    )
    .await;
    let repo = db.transactions();

    let items = vec![
        TransactionItem::new("P1", "Latte", Money::from_cents(475), Money::from_cents(50), 2)
            .with_note("extra hot"),
        TransactionItem::new("P2", "Muffin", Money::from_cents(375), Money::zero(), 1),
    ];
    let mut sale = cash_sale("TXN-1", "P1", 475, 2);
    sale.items = items.clone();
    repo.create(&sale).await.unwrap();

    let report = repo.save_line_items("TXN-1", &items).await;
    assert!(report.is_complete());
    assert_eq!(report.succeeded, 2);

    db.products().delete("P2").await.unwrap();

    let joined = repo.line_items_with_product("TXN-1").await.unwrap();
    assert_eq!(joined.len(), 2);
    assert_eq!(joined[0].product_name.as_deref(), Some("Latte"));
    assert_eq!(joined[0].current_price, Some(Money::from_cents(475)));
    assert_eq!(joined[0].total_price, Money::from_cents(1050));
    assert_eq!(joined[0].note.as_deref(), Some("extra hot"));
    assert_eq!(joined[1].name, "Muffin");
    assert_eq!(joined[1].product_name, None);
    assert_eq!(joined[1].current_price, None);
}

#[tokio::test]
async fn line_items_for_unknown_transaction_fail_softly() {
    let db = test_db().await;
    let items = vec![TransactionItem::new(
        "P1",
        "Latte",
        Money::from_cents(475),
        Money::zero(),
        1,
    )];

    let report = db.transactions().save_line_items("TXN-GHOST", &items).await;
    assert_eq!(report.attempted, 1);
    assert_eq!(report.failed(), 1);
    assert!(report.failures[0].starts_with("P1"));
}

#[tokio::test]
async fn deleting_a_transaction_cascades_to_line_items() {
    let db = test_db().await;
    let repo = db.transactions();
    let sale = cash_sale("TXN-1", "P1", 475, 1);
    let stored = repo.create(&sale).await.unwrap();
    repo.save_line_items("TXN-1", &sale.items).await;

    assert!(repo.delete(stored.id).await.unwrap());
    assert!(repo.line_items_with_product("TXN-1").await.unwrap().is_empty());
    assert!(!repo.delete(stored.id).await.unwrap());
}

#[tokio::test]
async fn product_analytics_aggregates_line_items() {
    let db = test_db().await;
    let repo = db.transactions();

    for (txn_id, qty) in [("TXN-1", 2), ("TXN-2", 1)] {
        let sale = cash_sale(txn_id, "P1", 500, qty);
        repo.create(&sale).await.unwrap();
        repo.save_line_items(txn_id, &sale.items).await;
    }

    let analytics = repo.product_analytics("P1").await;
    assert_eq!(analytics.total_sold, 3);
    assert_eq!(analytics.total_revenue, Money::from_cents(1500));
    assert_eq!(analytics.average_order_value, Money::from_cents(750));
    assert!(analytics.last_sold_at.is_some());

    let unsold = repo.product_analytics("P9").await;
    assert_eq!(unsold.total_sold, 0);
    assert_eq!(unsold.total_revenue, Money::zero());
    assert_eq!(unsold.last_sold_at, None);
}

#[tokio::test]
async fn analytics_failure_returns_zeroes() {
    let db = test_db().await;
    let repo = db.transactions();
    db.close().await;

    let analytics = repo.product_analytics("P1").await;
    assert_eq!(analytics.product_id, "P1");
    assert_eq!(analytics.total_sold, 0);
    assert_eq!(analytics.average_order_value, Money::zero());
}
