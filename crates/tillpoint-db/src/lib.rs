//! # tillpoint-db: Database Layer for Tillpoint
//!
//! This crate provides durable storage for the Tillpoint point of sale.
//! It uses SQLite for local storage with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tillpoint Data Flow                              │
//! │                                                                         │
//! │  Checkout orchestrator / catalog screen                                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  tillpoint-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │  Initializer  │    │ ProductCache  │    │  Migrations  │  │   │
//! │  │   │   (init.rs)   │    │  (cache.rs)   │    │  + schema    │  │   │
//! │  │   └──────┬────────┘    └──────┬────────┘    └──────────────┘  │   │
//! │  │          ▼                    ▼                               │   │
//! │  │   ┌───────────────┐    ┌───────────────┐                      │   │
//! │  │   │   Database    │◄───│  Repositories │                      │   │
//! │  │   │   (pool.rs)   │    │ Product / Txn │                      │   │
//! │  │   └───────────────┘    └───────────────┘                      │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite (WAL)                                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`schema`] - Baseline tables and best-effort advanced indexes
//! - [`migrations`] - Versioned additive migrations
//! - [`codec`] - JSON blob column encoding
//! - [`repository`] - Product and transaction stores
//! - [`cache`] - TTL-bounded read cache over product listings
//! - [`seed`] - Catalog seeding
//! - [`init`] - Startup sequencer
//! - [`error`] - Database error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tillpoint_db::{Initializer, InitOptions, DbConfig, ProductCache, ProductQuery};
//!
//! let init = Initializer::new(InitOptions::new(DbConfig::new("tillpoint.db")));
//! let db = init.initialize().await?;
//!
//! let cache = ProductCache::new(db.products());
//! let page = cache.get(&ProductQuery::new().category("Coffee")).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cache;
pub mod codec;
pub mod error;
pub mod init;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod schema;
pub mod seed;

// =============================================================================
// Re-exports
// =============================================================================

pub use cache::{CacheConfig, CacheStats, ProductCache, ProductPage, ProductQuery};
pub use error::{DbError, DbResult};
pub use init::{InitOptions, InitReport, Initializer, SeedRequest};
pub use pool::{Database, DbConfig};
pub use seed::{default_catalog, seed_catalog, SeedProduct};

// Repository re-exports for convenience
pub use repository::product::ProductRepository;
pub use repository::transaction::TransactionRepository;
