//! Startup wiring: tracing, storage, cache and tills from one [`PosConfig`].

use std::sync::Arc;

use tillpoint_db::{
    default_catalog, Database, InitOptions, InitReport, Initializer, ProductCache,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::PosConfig;
use crate::error::ApiError;
use crate::ledger::TransactionLedger;
use crate::notify::ManualEntryNotifier;
use crate::orchestrator::CheckoutOrchestrator;
use crate::payment::PaymentGateway;

/// Default filter when `RUST_LOG` is not set.
pub const DEFAULT_LOG_FILTER: &str = "info,tillpoint=debug,sqlx=warn";

/// Initializes the tracing subscriber.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show all debug messages
/// - `RUST_LOG=tillpoint_db=trace` - Trace storage only
/// - Default: info, with debug for tillpoint crates
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

/// Everything a running till needs, built once at startup.
pub struct PosServices {
    config: PosConfig,
    initializer: Arc<Initializer>,
    db: Database,
    cache: ProductCache,
}

impl PosServices {
    /// Opens storage through the init sequence, then builds the read cache
    /// and (optionally) warms it.
    pub async fn start(config: PosConfig) -> Result<Self, ApiError> {
        config.validate()?;

        let mut options = InitOptions::new(config.db_config()?);
        if config.seed_demo_catalog {
            options = options.with_seed(default_catalog(), config.force_seed);
        }

        let initializer = Arc::new(Initializer::new(options));
        let db = initializer.initialize().await?;

        let cache = ProductCache::with_config(db.products(), config.cache_config());
        if config.preload_cache {
            let report = cache.preload().await;
            info!(
                warmed = report.succeeded,
                failed = report.failed(),
                "Product cache preloaded"
            );
        }

        info!(cashier = %config.cashier_id, "POS services ready");
        Ok(PosServices {
            config,
            initializer,
            db,
            cache,
        })
    }

    pub fn config(&self) -> &PosConfig {
        &self.config
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn cache(&self) -> &ProductCache {
        &self.cache
    }

    pub fn init_report(&self) -> Option<&InitReport> {
        self.initializer.report()
    }

    /// A till committing into this database.
    pub fn checkout(
        &self,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn ManualEntryNotifier>,
    ) -> CheckoutOrchestrator {
        let ledger: Arc<dyn TransactionLedger> = Arc::new(self.db.transactions());
        CheckoutOrchestrator::new(
            self.config.checkout_settings(),
            self.config.cashier_id.clone(),
            ledger,
            gateway,
            notifier,
        )
        .with_currency(&self.config.currency_code, &self.config.currency_symbol)
    }

    pub async fn shutdown(&self) {
        self.cache.clear().await;
        self.db.close().await;
        info!("POS services stopped");
    }
}
