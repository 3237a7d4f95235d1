//! # Database Migrations
//!
//! Versioned, additive schema changes applied on top of the baseline.
//!
//! ## How Migrations Work
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Migration Process                                  │
//! │                                                                         │
//! │  App Startup (after ensure_schema)                                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Create schema_migrations if missing                                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Compare MIGRATIONS vs recorded versions                               │
//! │       │                                                                 │
//! │       ├── v1 product merchandising columns  ✓ (recorded)               │
//! │       └── v2 transaction order/currency     ⬜ (pending)               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  For each pending migration, in one SQL transaction:                   │
//! │    AddColumn  → skipped if the column already exists                   │
//! │    CreateIndex → IF NOT EXISTS                                         │
//! │    record version                                                      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Adding New Migrations
//!
//! 1. Append a `Migration` with the next version number
//! 2. Only add nullable or defaulted columns and new indexes
//! 3. **NEVER** modify an existing migration - always add a new one

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};

/// One additive schema change.
#[derive(Debug, Clone, Copy)]
pub enum MigrationStep {
    AddColumn {
        table: &'static str,
        column: &'static str,
        /// Column type and constraints, e.g. `TEXT NOT NULL DEFAULT 'USD'`.
        definition: &'static str,
    },
    CreateIndex {
        name: &'static str,
        table: &'static str,
        columns: &'static str,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub version: i64,
    pub description: &'static str,
    pub steps: &'static [MigrationStep],
}

/// All known migrations, in version order.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "product merchandising metadata",
        steps: &[
            MigrationStep::AddColumn {
                table: "products",
                column: "barcode",
                definition: "TEXT",
            },
            MigrationStep::AddColumn {
                table: "products",
                column: "qr_code",
                definition: "TEXT",
            },
            MigrationStep::AddColumn {
                table: "products",
                column: "reorder_quantity",
                definition: "INTEGER",
            },
            MigrationStep::AddColumn {
                table: "products",
                column: "min_buy_quantity",
                definition: "INTEGER",
            },
            MigrationStep::AddColumn {
                table: "products",
                column: "max_buy_quantity",
                definition: "INTEGER",
            },
            MigrationStep::AddColumn {
                table: "products",
                column: "reseller",
                definition: "TEXT",
            },
            MigrationStep::AddColumn {
                table: "products",
                column: "brand",
                definition: "TEXT",
            },
            MigrationStep::AddColumn {
                table: "products",
                column: "notes",
                definition: "TEXT",
            },
            MigrationStep::CreateIndex {
                name: "idx_products_barcode",
                table: "products",
                columns: "barcode",
            },
        ],
    },
    Migration {
        version: 2,
        description: "transaction order reference, receipt options, currency, metrics",
        steps: &[
            MigrationStep::AddColumn {
                table: "transactions",
                column: "order_id",
                definition: "TEXT",
            },
            MigrationStep::AddColumn {
                table: "transactions",
                column: "receipt_options",
                definition: "TEXT",
            },
            MigrationStep::AddColumn {
                table: "transactions",
                column: "currency",
                definition: "TEXT NOT NULL DEFAULT 'USD'",
            },
            MigrationStep::AddColumn {
                table: "transactions",
                column: "currency_symbol",
                definition: "TEXT NOT NULL DEFAULT '$'",
            },
            MigrationStep::AddColumn {
                table: "transactions",
                column: "metrics",
                definition: "TEXT",
            },
        ],
    },
];

const CREATE_MIGRATIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version      INTEGER PRIMARY KEY NOT NULL,
    description  TEXT NOT NULL,
    applied_at   TEXT NOT NULL
)
"#;

async fn column_exists(
    conn: &mut SqliteConnection,
    table: &str,
    column: &str,
) -> Result<bool, sqlx::Error> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM pragma_table_info(?) WHERE name = ?")
            .bind(table)
            .bind(column)
            .fetch_one(&mut *conn)
            .await?;
    Ok(count > 0)
}

async fn apply_step(conn: &mut SqliteConnection, step: &MigrationStep) -> Result<(), sqlx::Error> {
    match *step {
        MigrationStep::AddColumn {
            table,
            column,
            definition,
        } => {
            if column_exists(conn, table, column).await? {
                debug!(table, column, "Column already present, skipping");
                return Ok(());
            }
            let ddl = format!("ALTER TABLE {table} ADD COLUMN {column} {definition}");
            sqlx::query(&ddl).execute(&mut *conn).await?;
        }
        MigrationStep::CreateIndex {
            name,
            table,
            columns,
        } => {
            let ddl = format!("CREATE INDEX IF NOT EXISTS {name} ON {table} ({columns})");
            sqlx::query(&ddl).execute(&mut *conn).await?;
        }
    }
    Ok(())
}

async fn applied_versions(pool: &SqlitePool) -> Result<Vec<i64>, sqlx::Error> {
    sqlx::query(CREATE_MIGRATIONS_TABLE).execute(pool).await?;
    sqlx::query_scalar("SELECT version FROM schema_migrations ORDER BY version")
        .fetch_all(pool)
        .await
}

/// Applies every migration not yet recorded in `schema_migrations`.
///
/// ## Safety
/// - Idempotent: recorded versions are skipped, and an `AddColumn` for a
///   column that already exists is a no-op
/// - Transactional: each migration and its record commit together
///
/// Returns the number of migrations applied by this call.
pub async fn apply_migrations(pool: &SqlitePool) -> DbResult<usize> {
    info!("Checking for pending migrations");

    let applied = applied_versions(pool)
        .await
        .map_err(|e| DbError::MigrationFailed(e.to_string()))?;

    let mut count = 0;
    for migration in MIGRATIONS.iter().filter(|m| !applied.contains(&m.version)) {
        let fail = |e: sqlx::Error| {
            DbError::MigrationFailed(format!("v{} ({}): {e}", migration.version, migration.description))
        };

        let mut tx = pool.begin().await.map_err(fail)?;
        for step in migration.steps {
            apply_step(&mut *tx, step).await.map_err(fail)?;
        }
        sqlx::query("INSERT INTO schema_migrations (version, description, applied_at) VALUES (?, ?, ?)")
            .bind(migration.version)
            .bind(migration.description)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await
            .map_err(fail)?;
        tx.commit().await.map_err(fail)?;

        info!(
            version = migration.version,
            description = migration.description,
            "Migration applied"
        );
        count += 1;
    }

    Ok(count)
}

/// Returns information about migrations.
///
/// ## Returns
/// Tuple of (known_migrations, applied_migrations)
pub async fn migration_status(pool: &SqlitePool) -> DbResult<(usize, usize)> {
    let applied = applied_versions(pool).await?;
    let known = MIGRATIONS.len();
    let applied = applied
        .iter()
        .filter(|v| MIGRATIONS.iter().any(|m| m.version == **v))
        .count();
    Ok((known, applied))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{schema, Database, DbConfig};

    async fn baseline() -> Database {
        let db = Database::open(&DbConfig::in_memory()).await.unwrap();
        schema::ensure_schema(db.pool()).await.unwrap();
        db
    }

    #[tokio::test]
    async fn test_migrations_apply_once() {
        let db = baseline().await;
        assert_eq!(apply_migrations(db.pool()).await.unwrap(), MIGRATIONS.len());
        assert_eq!(apply_migrations(db.pool()).await.unwrap(), 0);
        assert_eq!(
            migration_status(db.pool()).await.unwrap(),
            (MIGRATIONS.len(), MIGRATIONS.len())
        );
    }

    #[tokio::test]
    async fn test_existing_column_is_a_noop() {
        let db = baseline().await;
        apply_migrations(db.pool()).await.unwrap();

        // Forget the records: every AddColumn now targets an existing column.
        sqlx::query("DELETE FROM schema_migrations")
            .execute(db.pool())
            .await
            .unwrap();
        assert_eq!(apply_migrations(db.pool()).await.unwrap(), MIGRATIONS.len());
    }

    #[tokio::test]
    async fn test_currency_default_backfills_existing_rows() {
        let db = baseline().await;
        sqlx::query(
            "INSERT INTO transactions (cashier_id, transaction_id, items, payment_methods, \
             subtotal, tax, total, created_at, updated_at) \
             VALUES ('c1', 'legacy-1', '[]', '[]', 0, 0, 0, '2024-01-01T00:00:00+00:00', '2024-01-01T00:00:00+00:00')",
        )
        .execute(db.pool())
        .await
        .unwrap();

        apply_migrations(db.pool()).await.unwrap();

        let (currency, symbol): (String, String) = sqlx::query_as(
            "SELECT currency, currency_symbol FROM transactions WHERE transaction_id = 'legacy-1'",
        )
        .fetch_one(db.pool())
        .await
        .unwrap();
        assert_eq!(currency, "USD");
        assert_eq!(symbol, "$");
    }
}
