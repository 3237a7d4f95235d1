//! # Baseline Schema
//!
//! The three tables every later migration builds on, plus the indexes that
//! make the common filters cheap.
//!
//! ```text
//! ┌──────────────────┐        ┌──────────────────────┐
//! │     products     │        │     transactions     │
//! │  id TEXT PK      │        │  id INTEGER PK       │
//! │  category, price │        │  transaction_id UQ ◄─┼──┐
//! │  stock_quantity  │        │  items / payments    │  │ FK, cascade
//! │  variants (JSON) │        │  (JSON blobs)        │  │
//! └────────▲─────────┘        └──────────────────────┘  │
//!          │ logical ref                                 │
//!          │ (indexed, no FK)   ┌────────────────────────┴─┐
//!          └────────────────────┤  transaction_line_items  │
//!                               └──────────────────────────┘
//! ```
//!
//! Everything here is `IF NOT EXISTS`, so it runs on every start.

use sqlx::SqlitePool;
use tillpoint_core::BestEffortReport;
use tracing::{info, warn};

use crate::error::{DbError, DbResult};

const CREATE_PRODUCTS: &str = r#"
CREATE TABLE IF NOT EXISTS products (
    id              TEXT PRIMARY KEY NOT NULL,
    name            TEXT NOT NULL,
    category        TEXT NOT NULL,
    price           INTEGER NOT NULL CHECK (price >= 0),
    image           TEXT,
    description     TEXT,
    badge           TEXT,
    variants        TEXT,
    in_stock        INTEGER NOT NULL DEFAULT 0,
    stock_quantity  INTEGER NOT NULL DEFAULT 0 CHECK (stock_quantity >= 0),
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
)
"#;

const CREATE_TRANSACTIONS: &str = r#"
CREATE TABLE IF NOT EXISTS transactions (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    cashier_id       TEXT NOT NULL,
    transaction_id   TEXT NOT NULL UNIQUE,
    items            TEXT NOT NULL,
    payment_methods  TEXT NOT NULL,
    subtotal         INTEGER NOT NULL CHECK (subtotal >= 0),
    tax              INTEGER NOT NULL CHECK (tax >= 0),
    discount         INTEGER NOT NULL DEFAULT 0 CHECK (discount >= 0),
    total            INTEGER NOT NULL CHECK (total >= 0),
    change_amount    INTEGER NOT NULL DEFAULT 0 CHECK (change_amount >= 0),
    customer_name    TEXT,
    receipt_status   TEXT NOT NULL DEFAULT 'issued',
    status           TEXT NOT NULL DEFAULT 'completed',
    type             TEXT NOT NULL DEFAULT 'sale',
    created_at       TEXT NOT NULL,
    updated_at       TEXT NOT NULL
)
"#;

const CREATE_LINE_ITEMS: &str = r#"
CREATE TABLE IF NOT EXISTS transaction_line_items (
    id                 INTEGER PRIMARY KEY AUTOINCREMENT,
    transaction_id     TEXT NOT NULL
                       REFERENCES transactions (transaction_id) ON DELETE CASCADE,
    product_id         TEXT NOT NULL,
    name               TEXT NOT NULL,
    quantity           INTEGER NOT NULL CHECK (quantity > 0),
    unit_price         INTEGER NOT NULL,
    variant_price      INTEGER NOT NULL DEFAULT 0,
    total_price        INTEGER NOT NULL,
    selected_variants  TEXT,
    note               TEXT,
    created_at         TEXT NOT NULL
)
"#;

const BASELINE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_products_category ON products (category)",
    "CREATE INDEX IF NOT EXISTS idx_products_in_stock ON products (in_stock)",
    "CREATE INDEX IF NOT EXISTS idx_products_price ON products (price)",
    "CREATE INDEX IF NOT EXISTS idx_transactions_cashier ON transactions (cashier_id)",
    "CREATE INDEX IF NOT EXISTS idx_transactions_created_at ON transactions (created_at)",
    "CREATE INDEX IF NOT EXISTS idx_transactions_status ON transactions (status)",
    "CREATE INDEX IF NOT EXISTS idx_transactions_type ON transactions (type)",
    "CREATE INDEX IF NOT EXISTS idx_line_items_transaction ON transaction_line_items (transaction_id)",
    "CREATE INDEX IF NOT EXISTS idx_line_items_product ON transaction_line_items (product_id)",
];

/// Composite and secondary indexes built after migrations.
///
/// Some of these reference migrated columns (`brand`), so they must run
/// after [`crate::migrations::apply_migrations`].
pub const ADVANCED_INDEXES: &[(&str, &str)] = &[
    (
        "idx_products_category_name",
        "CREATE INDEX IF NOT EXISTS idx_products_category_name ON products (category, name)",
    ),
    (
        "idx_products_brand",
        "CREATE INDEX IF NOT EXISTS idx_products_brand ON products (brand)",
    ),
    (
        "idx_products_updated_at",
        "CREATE INDEX IF NOT EXISTS idx_products_updated_at ON products (updated_at)",
    ),
    (
        "idx_transactions_cashier_created",
        "CREATE INDEX IF NOT EXISTS idx_transactions_cashier_created ON transactions (cashier_id, created_at)",
    ),
    (
        "idx_transactions_status_created",
        "CREATE INDEX IF NOT EXISTS idx_transactions_status_created ON transactions (status, created_at)",
    ),
    (
        "idx_line_items_product_created",
        "CREATE INDEX IF NOT EXISTS idx_line_items_product_created ON transaction_line_items (product_id, created_at)",
    ),
];

/// Creates the baseline tables and indexes. Any failure aborts startup.
pub async fn ensure_schema(pool: &SqlitePool) -> DbResult<()> {
    info!("Ensuring baseline schema");

    for ddl in [CREATE_PRODUCTS, CREATE_TRANSACTIONS, CREATE_LINE_ITEMS]
        .iter()
        .chain(BASELINE_INDEXES)
    {
        sqlx::query(ddl)
            .execute(pool)
            .await
            .map_err(|e| DbError::MigrationFailed(format!("baseline schema: {e}")))?;
    }
    Ok(())
}

/// Builds [`ADVANCED_INDEXES`] one by one.
///
/// Indexes only affect speed, so a failure is logged and recorded in the
/// report while the remaining indexes are still attempted.
pub async fn build_advanced_indexes(pool: &SqlitePool) -> BestEffortReport {
    let mut report = BestEffortReport::new();

    for (name, ddl) in ADVANCED_INDEXES {
        match sqlx::query(ddl).execute(pool).await {
            Ok(_) => report.record_success(),
            Err(e) => {
                warn!(index = name, error = %e, "Advanced index creation failed");
                report.record_failure(name, e);
            }
        }
    }

    info!(
        built = report.succeeded,
        failed = report.failed(),
        "Advanced indexes processed"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    async fn index_names(pool: &SqlitePool) -> Vec<String> {
        sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'index' ORDER BY name")
            .fetch_all(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_ensure_schema_is_idempotent() {
        let db = Database::open(&DbConfig::in_memory()).await.unwrap();
        ensure_schema(db.pool()).await.unwrap();
        ensure_schema(db.pool()).await.unwrap();

        let names = index_names(db.pool()).await;
        assert!(names.contains(&"idx_products_category".to_string()));
        assert!(names.contains(&"idx_line_items_product".to_string()));
    }

    #[tokio::test]
    async fn test_advanced_index_failure_is_reported_not_raised() {
        // Baseline only: `brand` does not exist yet, so that index fails.
        let db = Database::open(&DbConfig::in_memory()).await.unwrap();
        ensure_schema(db.pool()).await.unwrap();

        let report = build_advanced_indexes(db.pool()).await;
        assert_eq!(report.attempted, ADVANCED_INDEXES.len());
        assert_eq!(report.failed(), 1);
        assert!(report.failures[0].starts_with("idx_products_brand"));
    }

    #[tokio::test]
    async fn test_advanced_indexes_after_migrations() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let report = db.build_advanced_indexes().await;
        assert!(report.is_complete());
        assert_eq!(report.succeeded, ADVANCED_INDEXES.len());
    }
}
