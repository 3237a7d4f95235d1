//! # Initialization Sequencer
//!
//! The single startup entry point for storage.
//!
//! ## Startup Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Initializer::initialize()                           │
//! │                                                                         │
//! │  1. open pool            (fatal)                                       │
//! │  2. baseline schema      (fatal)                                       │
//! │  3. migrations           (fatal)                                       │
//! │  4. advanced indexes     (best effort → report)                        │
//! │  5. store warm-up        (fatal: first query on each store)            │
//! │  6. catalog seed         (only if requested; empty catalog or force)   │
//! │                                                                         │
//! │  Concurrent callers await the SAME in-flight run.                      │
//! │  Success is kept; a failure is not, so the next call retries.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust,ignore
//! let init = Arc::new(Initializer::new(InitOptions::new(DbConfig::new(path))));
//! let db = init.initialize().await?;
//! ```

use serde::Serialize;
use tillpoint_core::BestEffortReport;
use tokio::sync::OnceCell;
use tracing::info;

use crate::error::{DbError, DbResult};
use crate::pool::{Database, DbConfig};
use crate::seed::{seed_catalog, SeedProduct};

/// Catalog seeding requested at startup.
#[derive(Debug, Clone)]
pub struct SeedRequest {
    pub products: Vec<SeedProduct>,
    /// Upsert even when the catalog already has products.
    pub force: bool,
}

#[derive(Debug, Clone)]
pub struct InitOptions {
    pub db: DbConfig,
    pub seed: Option<SeedRequest>,
}

impl InitOptions {
    pub fn new(db: DbConfig) -> Self {
        InitOptions { db, seed: None }
    }

    pub fn with_seed(mut self, products: Vec<SeedProduct>, force: bool) -> Self {
        self.seed = Some(SeedRequest { products, force });
        self
    }
}

/// What the startup run did.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InitReport {
    pub migrations_applied: usize,
    pub indexes: BestEffortReport,
    /// Product count after warm-up (before seeding).
    pub products: i64,
    pub transactions: i64,
    pub seeded: usize,
}

#[derive(Debug)]
struct Initialized {
    db: Database,
    report: InitReport,
}

/// Runs the startup sequence exactly once per instance.
///
/// Share it behind an `Arc`; the bootstrap layer keeps one for the process.
#[derive(Debug)]
pub struct Initializer {
    options: InitOptions,
    state: OnceCell<Initialized>,
}

impl Initializer {
    pub fn new(options: InitOptions) -> Self {
        Initializer {
            options,
            state: OnceCell::new(),
        }
    }

    /// Initializes storage if needed and returns the handle.
    ///
    /// Idempotent: after the first success every call returns the same
    /// database without doing any work.
    pub async fn initialize(&self) -> DbResult<Database> {
        let state = self
            .state
            .get_or_try_init(|| run_sequence(&self.options))
            .await?;
        Ok(state.db.clone())
    }

    /// The handle, or `DbError::NotInitialized` before the first success.
    pub fn database(&self) -> DbResult<Database> {
        self.state
            .get()
            .map(|s| s.db.clone())
            .ok_or(DbError::NotInitialized)
    }

    pub fn report(&self) -> Option<&InitReport> {
        self.state.get().map(|s| &s.report)
    }

    pub fn is_initialized(&self) -> bool {
        self.state.initialized()
    }
}

async fn run_sequence(options: &InitOptions) -> DbResult<Initialized> {
    info!(path = %options.db.database_path.display(), "Initializing storage");

    let db = Database::open(&options.db).await?;
    db.ensure_schema().await?;
    let migrations_applied = db.apply_migrations().await?;
    let indexes = db.build_advanced_indexes().await;

    let products = db.products().count_all().await?;
    let transactions = db.transactions().count_all().await?;
    info!(products, transactions, "Stores ready");

    let seeded = match &options.seed {
        Some(request) => seed_catalog(&db.products(), &request.products, request.force).await?,
        None => 0,
    };

    let report = InitReport {
        migrations_applied,
        indexes,
        products,
        transactions,
        seeded,
    };
    info!(?report, "Storage initialized");

    Ok(Initialized { db, report })
}
