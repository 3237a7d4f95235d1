//! # tillpoint-core: Pure Business Logic for Tillpoint
//!
//! This crate is the **heart** of Tillpoint. It contains the domain model,
//! money arithmetic, validation rules, cart math and the checkout state
//! machine as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tillpoint Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │            Presentation (screens, receipts, reports)            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │        tillpoint-checkout (orchestrator, config, errors)        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              ★ tillpoint-core (THIS CRATE) ★                    │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌──────────┐ ┌────────┐  │   │
//! │  │   │  types  │ │  money  │ │  cart   │ │ checkout │ │ update │  │   │
//! │  │   │ Product │ │  Money  │ │  Cart   │ │ Session  │ │ typed  │  │   │
//! │  │   │  Txn    │ │ TaxRate │ │ Totals  │ │  FSM     │ │ patches│  │   │
//! │  │   └─────────┘ └─────────┘ └─────────┘ └──────────┘ └────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 tillpoint-db (Database Layer)                   │   │
//! │  │        SQLite stores, migrations, read cache, seeding           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Transaction, PaymentMethod, ...)
//! - [`update`] - Typed partial-update requests
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//! - [`cart`] - The in-memory cart feeding checkout
//! - [`checkout`] - Checkout state machine (pure part)
//!
//! ## Example Usage
//!
//! ```rust
//! use tillpoint_core::money::Money;
//! use tillpoint_core::types::TaxRate;
//!
//! let subtotal = Money::from_cents(2600); // $26.00
//! let tax = subtotal.calculate_tax(TaxRate::from_bps(1000)); // 10%
//! assert_eq!(tax.cents(), 260);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod checkout;
pub mod error;
pub mod money;
pub mod types;
pub mod update;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cart::{Cart, CartItem, CartTotals};
pub use checkout::{
    CheckoutSession, CheckoutSettings, CheckoutState, CheckoutTotals, CheckoutView,
    PaymentSelection, SettlementPlan,
};
pub use error::{CheckoutError, CoreError, ParseEnumError, ValidationError};
pub use money::Money;
pub use types::*;
pub use update::{ProductChange, ProductUpdate, TransactionChange, TransactionUpdate};

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum lines allowed in a single cart.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity of a single cart line.
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Default sales tax applied at checkout, in basis points (10%).
pub const DEFAULT_TAX_RATE_BPS: u32 = 1000;

/// Default tolerance when balancing a split payment, in cents.
pub const DEFAULT_SPLIT_TOLERANCE_CENTS: i64 = 1;

/// Default ISO 4217 currency for new transactions.
pub const DEFAULT_CURRENCY: &str = "USD";

/// Default currency symbol for new transactions.
pub const DEFAULT_CURRENCY_SYMBOL: &str = "$";
