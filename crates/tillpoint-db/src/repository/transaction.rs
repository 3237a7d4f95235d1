//! # Transaction Repository
//!
//! Database operations for sales, refunds and returns.
//!
//! ## Storage Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  transactions                                                          │
//! │    one row per transaction, items + payments as JSON blobs             │
//! │    (the record of truth for receipts)                                  │
//! │                                                                         │
//! │  transaction_line_items                                                │
//! │    one row per item, written AFTER the transaction commits             │
//! │    (query-friendly copy for analytics; failures are tolerated)         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Enum columns are stored as lowercase text. A value outside the known set
//! surfaces as [`DbError::Serialization`] on read instead of being coerced.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tillpoint_core::validation::validate_new_transaction;
use tillpoint_core::{
    BestEffortReport, LineItemWithProduct, Money, NewTransaction, ParseEnumError,
    ProductAnalytics, Transaction, TransactionChange, TransactionFilter, TransactionItem,
    TransactionStats, TransactionUpdate,
};
use tracing::{debug, info, warn};

use super::{like_pattern, push_pagination};
use crate::codec;
use crate::error::{DbError, DbResult};

const TRANSACTION_COLUMNS: &str = "id, cashier_id, transaction_id, order_id, items, \
     payment_methods, subtotal, tax, discount, total, change_amount, customer_name, \
     receipt_status, receipt_options, status, type AS kind, currency, currency_symbol, \
     metrics, created_at, updated_at";

const INSERT_TRANSACTION: &str = r#"
INSERT INTO transactions (
    cashier_id, transaction_id, order_id, items, payment_methods,
    subtotal, tax, discount, total, change_amount, customer_name,
    receipt_status, receipt_options, status, type, currency, currency_symbol,
    metrics, created_at, updated_at
) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

const INSERT_LINE_ITEM: &str = r#"
INSERT INTO transaction_line_items (
    transaction_id, product_id, name, quantity, unit_price, variant_price,
    total_price, selected_variants, note, created_at
) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

const LINE_ITEMS_WITH_PRODUCT: &str = r#"
SELECT
    li.id, li.transaction_id, li.product_id, li.name, li.quantity,
    li.unit_price, li.variant_price, li.total_price, li.selected_variants, li.note,
    p.name AS product_name, p.category AS product_category,
    p.image AS product_image, p.price AS current_price
FROM transaction_line_items li
LEFT JOIN products p ON p.id = li.product_id
WHERE li.transaction_id = ?
ORDER BY li.id ASC
"#;

const PRODUCT_ANALYTICS: &str = r#"
SELECT
    COALESCE(SUM(quantity), 0),
    COALESCE(SUM(total_price), 0),
    COUNT(DISTINCT transaction_id),
    MAX(created_at)
FROM transaction_line_items
WHERE product_id = ?
"#;

// =============================================================================
// Row Mapping
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: i64,
    cashier_id: String,
    transaction_id: String,
    order_id: Option<String>,
    items: String,
    payment_methods: String,
    subtotal: i64,
    tax: i64,
    discount: i64,
    total: i64,
    change_amount: i64,
    customer_name: Option<String>,
    receipt_status: String,
    receipt_options: Option<String>,
    status: String,
    kind: String,
    currency: String,
    currency_symbol: String,
    metrics: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn parse_enum<T>(column: &str, raw: &str) -> DbResult<T>
where
    T: FromStr<Err = ParseEnumError>,
{
    raw.parse().map_err(|e| DbError::serialization(column, e))
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = DbError;

    fn try_from(row: TransactionRow) -> DbResult<Self> {
        Ok(Transaction {
            items: codec::decode_items(&row.items)?,
            payment_methods: codec::decode_payments(&row.payment_methods)?,
            receipt_options: codec::decode_receipt_options(row.receipt_options.as_deref())?,
            metrics: codec::decode_metrics(row.metrics.as_deref())?,
            receipt_status: parse_enum("receipt_status", &row.receipt_status)?,
            status: parse_enum("status", &row.status)?,
            kind: parse_enum("type", &row.kind)?,
            id: row.id,
            cashier_id: row.cashier_id,
            transaction_id: row.transaction_id,
            order_id: row.order_id,
            subtotal: Money::from_cents(row.subtotal),
            tax: Money::from_cents(row.tax),
            discount: Money::from_cents(row.discount),
            total: Money::from_cents(row.total),
            change: Money::from_cents(row.change_amount),
            customer_name: row.customer_name,
            currency: row.currency,
            currency_symbol: row.currency_symbol,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LineItemRow {
    id: i64,
    transaction_id: String,
    product_id: String,
    name: String,
    quantity: i64,
    unit_price: i64,
    variant_price: i64,
    total_price: i64,
    selected_variants: Option<String>,
    note: Option<String>,
    product_name: Option<String>,
    product_category: Option<String>,
    product_image: Option<String>,
    current_price: Option<i64>,
}

impl TryFrom<LineItemRow> for LineItemWithProduct {
    type Error = DbError;

    fn try_from(row: LineItemRow) -> DbResult<Self> {
        Ok(LineItemWithProduct {
            selected_variants: codec::decode_selected_variants(row.selected_variants.as_deref())?,
            id: row.id,
            transaction_id: row.transaction_id,
            product_id: row.product_id,
            name: row.name,
            quantity: row.quantity,
            unit_price: Money::from_cents(row.unit_price),
            variant_price: Money::from_cents(row.variant_price),
            total_price: Money::from_cents(row.total_price),
            note: row.note,
            product_name: row.product_name,
            product_category: row.product_category,
            product_image: row.product_image,
            current_price: row.current_price.map(Money::from_cents),
        })
    }
}

fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, filter: &TransactionFilter) {
    qb.push(" WHERE 1 = 1");

    if let Some(cashier_id) = &filter.cashier_id {
        qb.push(" AND cashier_id = ").push_bind(cashier_id.clone());
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status);
    }
    if let Some(kind) = filter.kind {
        qb.push(" AND type = ").push_bind(kind);
    }
    if let Some(from) = filter.date_from {
        qb.push(" AND created_at >= ").push_bind(from);
    }
    if let Some(to) = filter.date_to {
        qb.push(" AND created_at <= ").push_bind(to);
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for transaction database operations.
#[derive(Debug, Clone)]
pub struct TransactionRepository {
    pool: SqlitePool,
}

impl TransactionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        TransactionRepository { pool }
    }

    /// Validates and stores a transaction, returning the stored row.
    ///
    /// ## Returns
    /// * `Err(DbError::Validation)` - Nothing was written
    /// * `Err(DbError::UniqueViolation)` - `transaction_id` already used
    pub async fn create(&self, input: &NewTransaction) -> DbResult<Transaction> {
        validate_new_transaction(input)?;

        debug!(
            transaction_id = %input.transaction_id,
            total = %input.total,
            items = input.items.len(),
            "Creating transaction"
        );

        let items = codec::encode_items(&input.items)?;
        let payments = codec::encode_payments(&input.payment_methods)?;
        let receipt_options = codec::encode_receipt_options(input.receipt_options.as_ref())?;
        let metrics = codec::encode_metrics(input.metrics.as_ref())?;
        let now = Utc::now();

        let result = sqlx::query(INSERT_TRANSACTION)
            .bind(&input.cashier_id)
            .bind(&input.transaction_id)
            .bind(input.order_id.as_deref())
            .bind(items)
            .bind(payments)
            .bind(input.subtotal.cents())
            .bind(input.tax.cents())
            .bind(input.discount.cents())
            .bind(input.total.cents())
            .bind(input.change.cents())
            .bind(input.customer_name.as_deref())
            .bind(input.receipt_status)
            .bind(receipt_options)
            .bind(input.status)
            .bind(input.kind)
            .bind(&input.currency)
            .bind(&input.currency_symbol)
            .bind(metrics)
            .bind(now)
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| match DbError::from(e) {
                DbError::UniqueViolation { .. } => {
                    DbError::duplicate("transaction_id", &input.transaction_id)
                }
                other => other,
            })?;

        let id = result.last_insert_rowid();
        info!(id, transaction_id = %input.transaction_id, "Transaction stored");
        self.get_by_id(id).await
    }

    /// Gets a transaction by row id, or `DbError::NotFound`.
    pub async fn get_by_id(&self, id: i64) -> DbResult<Transaction> {
        let row: Option<TransactionRow> = sqlx::query_as(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| DbError::not_found("Transaction", id.to_string()))?
            .try_into()
    }

    /// Gets a transaction by its business identifier, or `DbError::NotFound`.
    pub async fn get_by_transaction_id(&self, transaction_id: &str) -> DbResult<Transaction> {
        let row: Option<TransactionRow> = sqlx::query_as(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE transaction_id = ?"
        ))
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| DbError::not_found("Transaction", transaction_id))?
            .try_into()
    }

    /// Lists transactions newest first. Filters are conjunctive.
    pub async fn list(&self, filter: &TransactionFilter) -> DbResult<Vec<Transaction>> {
        debug!(?filter, "Listing transactions");

        let mut qb = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions"
        ));
        push_filters(&mut qb, filter);
        qb.push(" ORDER BY created_at DESC, id DESC");
        push_pagination(&mut qb, filter.limit, filter.offset);

        let rows = qb
            .build_query_as::<TransactionRow>()
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Transaction::try_from).collect()
    }

    /// Most recent transactions.
    pub async fn recent(&self, limit: i64) -> DbResult<Vec<Transaction>> {
        self.list(&TransactionFilter {
            limit: Some(limit),
            ..Default::default()
        })
        .await
    }

    /// Case-insensitive search over transaction id, customer name and the
    /// item blob (so product names match).
    pub async fn search(&self, text: &str, limit: i64) -> DbResult<Vec<Transaction>> {
        let text = text.trim();
        if text.is_empty() {
            return self.recent(limit).await;
        }

        let pattern = like_pattern(text);
        let rows: Vec<TransactionRow> = sqlx::query_as(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions \
             WHERE transaction_id LIKE ?1 ESCAPE '\\' \
                OR customer_name LIKE ?1 ESCAPE '\\' \
                OR items LIKE ?1 ESCAPE '\\' \
             ORDER BY created_at DESC, id DESC LIMIT ?2"
        ))
        .bind(pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Transaction::try_from).collect()
    }

    pub async fn count_all(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM transactions")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Aggregates over the rows matching `filter` (pagination ignored).
    pub async fn stats(&self, filter: &TransactionFilter) -> DbResult<TransactionStats> {
        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT COUNT(*), COALESCE(SUM(total), 0), COALESCE(SUM(discount), 0), \
             COALESCE(AVG(total), 0.0) FROM transactions",
        );
        push_filters(&mut qb, filter);

        let (count, total_amount, total_discount, average_total): (i64, i64, i64, f64) =
            qb.build_query_as().fetch_one(&self.pool).await?;

        Ok(TransactionStats {
            count,
            total_amount: Money::from_cents(total_amount),
            total_discount: Money::from_cents(total_discount),
            average_total: Money::from_average(average_total),
        })
    }

    /// Changes status, receipt status or metrics; everything else about a
    /// stored transaction is immutable.
    pub async fn update(&self, id: i64, update: &TransactionUpdate) -> DbResult<Transaction> {
        update.validate()?;
        debug!(id, changes = update.changes().len(), "Updating transaction");

        let mut qb = QueryBuilder::<Sqlite>::new("UPDATE transactions SET ");
        {
            let mut set = qb.separated(", ");
            for change in update.changes() {
                set.push(format!("{} = ", change.column()));
                match change {
                    TransactionChange::Status(status) => {
                        set.push_bind_unseparated(*status);
                    }
                    TransactionChange::ReceiptStatus(status) => {
                        set.push_bind_unseparated(*status);
                    }
                    TransactionChange::Metrics(metrics) => {
                        set.push_bind_unseparated(codec::encode_metrics(metrics.as_ref())?);
                    }
                }
            }
            set.push("updated_at = ");
            set.push_bind_unseparated(Utc::now());
        }
        qb.push(" WHERE id = ").push_bind(id);

        let result = qb.build().execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Transaction", id.to_string()));
        }

        self.get_by_id(id).await
    }

    /// Deletes a transaction; its line items go with it.
    pub async fn delete(&self, id: i64) -> DbResult<bool> {
        debug!(id, "Deleting transaction");
        let result = sqlx::query("DELETE FROM transactions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // Line Items & Analytics
    // =========================================================================

    /// Writes one normalized row per item.
    ///
    /// Each insert stands alone: a failing item is logged and recorded in the
    /// report, and the rest are still written. Never returns an error.
    pub async fn save_line_items(
        &self,
        transaction_id: &str,
        items: &[TransactionItem],
    ) -> BestEffortReport {
        let mut report = BestEffortReport::new();
        let now = Utc::now();

        for item in items {
            let outcome = async {
                let selected = codec::encode_selected_variants(&item.selected_variants)?;
                sqlx::query(INSERT_LINE_ITEM)
                    .bind(transaction_id)
                    .bind(&item.product_id)
                    .bind(&item.name)
                    .bind(item.quantity)
                    .bind(item.unit_price.cents())
                    .bind(item.variant_price.cents())
                    .bind(item.total_price.cents())
                    .bind(selected)
                    .bind(item.note.as_deref())
                    .bind(now)
                    .execute(&self.pool)
                    .await?;
                Ok::<_, DbError>(())
            }
            .await;

            match outcome {
                Ok(()) => report.record_success(),
                Err(e) => {
                    warn!(
                        transaction_id,
                        product_id = %item.product_id,
                        error = %e,
                        "Line item save failed"
                    );
                    report.record_failure(&item.product_id, e);
                }
            }
        }

        debug!(
            transaction_id,
            saved = report.succeeded,
            failed = report.failed(),
            "Line items processed"
        );
        report
    }

    /// Line items of a transaction joined with the current catalog.
    pub async fn line_items_with_product(
        &self,
        transaction_id: &str,
    ) -> DbResult<Vec<LineItemWithProduct>> {
        let rows: Vec<LineItemRow> = sqlx::query_as(LINE_ITEMS_WITH_PRODUCT)
            .bind(transaction_id)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(LineItemWithProduct::try_from).collect()
    }

    /// Sales figures for one product from the line-item table.
    ///
    /// Analytics are advisory: a query failure is logged and a zeroed record
    /// is returned.
    pub async fn product_analytics(&self, product_id: &str) -> ProductAnalytics {
        let result: Result<(i64, i64, i64, Option<String>), sqlx::Error> =
            sqlx::query_as(PRODUCT_ANALYTICS)
                .bind(product_id)
                .fetch_one(&self.pool)
                .await;

        match result {
            Ok((total_sold, revenue, orders, last_sold)) => ProductAnalytics {
                product_id: product_id.to_string(),
                total_sold,
                total_revenue: Money::from_cents(revenue),
                average_order_value: if orders > 0 {
                    Money::from_average(revenue as f64 / orders as f64)
                } else {
                    Money::zero()
                },
                last_sold_at: last_sold
                    .as_deref()
                    .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
                    .map(|dt| dt.with_timezone(&Utc)),
            },
            Err(e) => {
                warn!(product_id, error = %e, "Product analytics query failed");
                ProductAnalytics::empty(product_id)
            }
        }
    }
}
