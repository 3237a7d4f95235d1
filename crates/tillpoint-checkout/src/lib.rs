//! # Tillpoint Checkout
//!
//! The layer presentation code calls into: configuration, a till's cart and
//! checkout, and the user-safe errors they return.
//!
//! ## Module Organization
//! ```text
//! tillpoint_checkout/
//! ├── lib.rs           ◄─── You are here (exports)
//! ├── bootstrap.rs     ◄─── Tracing + PosServices startup wiring
//! ├── config.rs        ◄─── PosConfig (env > toml > defaults)
//! ├── error.rs         ◄─── ApiError, CheckoutFailure
//! ├── ledger.rs        ◄─── Where committed sales are written
//! ├── notify.rs        ◄─── Manual-entry notices for degraded commits
//! ├── orchestrator.rs  ◄─── Cart → capture → commit
//! └── payment.rs       ◄─── Payment gateway seam + simulator
//! ```
//!
//! ## Usage
//! ```rust,no_run
//! use std::sync::Arc;
//! use tillpoint_checkout::{init_tracing, LoggingNotifier, PosConfig, PosServices, SimulatedGateway};
//!
//! # async fn run() -> Result<(), tillpoint_checkout::ApiError> {
//! init_tracing();
//! let services = PosServices::start(PosConfig::load(None)?).await?;
//! let mut till = services.checkout(Arc::new(SimulatedGateway::new()), Arc::new(LoggingNotifier));
//! # let _ = &mut till;
//! # Ok(())
//! # }
//! ```

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod ledger;
pub mod notify;
pub mod orchestrator;
pub mod payment;

pub use bootstrap::{init_tracing, PosServices, DEFAULT_LOG_FILTER};
pub use config::{default_database_path, ConfigError, PosConfig};
pub use error::{ApiError, CheckoutFailure, ErrorCode};
pub use ledger::TransactionLedger;
pub use notify::{LoggingNotifier, ManualEntryNotice, ManualEntryNotifier, RecordingNotifier};
pub use orchestrator::{generate_transaction_id, CheckoutOrchestrator};
pub use payment::{CaptureReceipt, PaymentError, PaymentGateway, SimulatedGateway};
