//! # Storage Handle
//!
//! Opens the SQLite file (or an in-memory database for tests) and hands out
//! repositories that share one pool.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  DbConfig ──► Database::open ──► pool only (initializer drives schema) │
//! │          └──► Database::new  ──► pool + ensure_schema + migrations     │
//! │                                                                         │
//! │  Database ──┬── products()      ProductRepository  ┐                   │
//! │  (Clone)    ├── transactions()  TransactionRepository ├─ same pool     │
//! │             └── close()         every later query → ConnectionFailed   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! File databases run in WAL mode with `synchronous = NORMAL`; foreign keys
//! are switched on for every connection. An in-memory database is a single
//! connection that must never be recycled.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tillpoint_core::BestEffortReport;
use tracing::info;

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::product::ProductRepository;
use crate::repository::transaction::TransactionRepository;
use crate::schema;

const MEMORY_PATH: &str = ":memory:";

// =============================================================================
// Configuration
// =============================================================================

/// Where the store lives and how its pool behaves.
///
/// ## Example
/// ```rust
/// use tillpoint_db::DbConfig;
///
/// let config = DbConfig::new("/tmp/tillpoint.db")
///     .max_connections(5)
///     .min_connections(1);
/// assert_eq!(config.max_connections, 5);
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// SQLite file, or `:memory:`.
    pub database_path: PathBuf,
    /// Upper bound on pooled connections (5).
    pub max_connections: u32,
    /// Connections kept open while idle (1).
    pub min_connections: u32,
    /// How long `acquire` waits before `PoolExhausted` (30s).
    pub connect_timeout: Duration,
    /// Idle connections above `min_connections` are dropped after this (10m).
    pub idle_timeout: Duration,
    /// `Database::new` runs `ensure_schema` and migrations when set.
    pub run_migrations: bool,
}

impl DbConfig {
    /// Creates a new database configuration with the given path.
    ///
    /// The file is created if it doesn't exist.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            run_migrations: true,
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// Creates an in-memory database configuration (for testing).
    ///
    /// Uses a single connection that never expires: the database lives
    /// exactly as long as that connection.
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(MEMORY_PATH),
            max_connections: 1,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            run_migrations: true,
        }
    }

    pub fn is_in_memory(&self) -> bool {
        self.database_path == Path::new(MEMORY_PATH)
    }
}

// =============================================================================
// Database
// =============================================================================

/// Process-wide database handle.
///
/// Cheap to clone (the pool is reference counted). Constructed once by the
/// initializer and handed to every store; there is no global lookup.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens the pool without touching the schema.
    ///
    /// Creates the file if missing. Fails with `ConnectionFailed` when the
    /// directory does not exist or is not writable.
    pub async fn open(config: &DbConfig) -> DbResult<Self> {
        info!(
            path = %config.database_path.display(),
            "Opening database"
        );

        let base_options = if config.is_in_memory() {
            SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
        } else {
            SqliteConnectOptions::new()
                .filename(&config.database_path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
        };
        let connect_options = base_options
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        let mut pool_options = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout);

        pool_options = if config.is_in_memory() {
            // Dropping the only connection would drop the database.
            pool_options
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>)
        } else {
            pool_options.idle_timeout(Some(config.idle_timeout))
        };

        let pool = pool_options
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        info!(
            max_connections = config.max_connections,
            "Database pool created"
        );

        Ok(Database { pool })
    }

    /// Opens the pool and, if enabled, creates the schema and applies
    /// pending migrations.
    ///
    /// ## Example
    /// ```rust,no_run
    /// # async fn run() -> tillpoint_db::DbResult<()> {
    /// use tillpoint_db::{Database, DbConfig};
    ///
    /// let db = Database::new(DbConfig::new("./tillpoint.db")).await?;
    /// let stats = db.products().stats().await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        let db = Database::open(&config).await?;
        if config.run_migrations {
            db.ensure_schema().await?;
            db.apply_migrations().await?;
        }
        Ok(db)
    }

    /// Creates the baseline tables and indexes if absent. Fatal on failure.
    pub async fn ensure_schema(&self) -> DbResult<()> {
        schema::ensure_schema(&self.pool).await
    }

    /// Applies pending versioned migrations; returns how many ran.
    pub async fn apply_migrations(&self) -> DbResult<usize> {
        info!("Running database migrations");
        let applied = migrations::apply_migrations(&self.pool).await?;
        info!(applied, "Migrations complete");
        Ok(applied)
    }

    /// Creates the performance indexes. Failures are recorded, not raised.
    pub async fn build_advanced_indexes(&self) -> BestEffortReport {
        schema::build_advanced_indexes(&self.pool).await
    }

    /// Returns `(known, applied)` migration counts.
    pub async fn migration_status(&self) -> DbResult<(usize, usize)> {
        migrations::migration_status(&self.pool).await
    }

    /// Raw pool, for schema tooling and tests.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn products(&self) -> ProductRepository {
        ProductRepository::new(self.pool.clone())
    }

    pub fn transactions(&self) -> TransactionRepository {
        TransactionRepository::new(self.pool.clone())
    }

    /// Closes the pool. Repositories cloned from this handle fail with
    /// `DbError::ConnectionFailed` afterwards.
    pub async fn close(&self) {
        info!("Closing database");
        self.pool.close().await;
    }

    /// `SELECT 1` round trip.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
