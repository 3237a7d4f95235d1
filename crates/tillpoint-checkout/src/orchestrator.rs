//! # Checkout Orchestrator
//!
//! Owns one till's cart and checkout session and performs the side effects
//! the pure state machine in `tillpoint-core` leaves out: capturing payment
//! and committing the sale.
//!
//! ## Confirm Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  prepare_settlement()          balance / tender / receipt checks        │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  gateway.capture(leg) × N ──── declined ──► void earlier legs,          │
//! │         │                                   back to payment input       │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  ledger.record(txn) ────────── failed ───┐                              │
//! │         │                                ▼                              │
//! │         ▼                        notifier.notify(snapshot)              │
//! │  ledger.record_line_items()      clear cart, session → Idle             │
//! │  (best-effort)                   Err(DegradedCommit)                    │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  clear cart, session → Committed                                        │
//! │  Ok(Transaction)                                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The orchestrator is the only writer of its cart. Methods take `&mut
//! self`, so two confirms on one till cannot interleave.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use serde_json::json;
use tillpoint_core::error::CoreResult;
use tillpoint_core::validation::validate_new_transaction;
use tillpoint_core::{
    Cart, CartTotals, CheckoutError, CheckoutSession, CoreError, CheckoutSettings, CheckoutState,
    CheckoutTotals, CheckoutView, Money, NewTransaction, PaymentMethod,
    PaymentSelection, Product, ReceiptDelivery, ReceiptOptions, ReceiptStatus, SettlementPlan,
    TaxRate, Transaction, DEFAULT_CURRENCY, DEFAULT_CURRENCY_SYMBOL,
};

use crate::error::CheckoutFailure;
use crate::ledger::TransactionLedger;
use crate::notify::{ManualEntryNotice, ManualEntryNotifier};
use crate::payment::{PaymentError, PaymentGateway};

/// `TXN-<unix millis>-<4 random digits>`.
pub fn generate_transaction_id() -> String {
    format!(
        "TXN-{}-{:04}",
        Utc::now().timestamp_millis(),
        rand::thread_rng().gen_range(0..10_000)
    )
}

/// Drives one till from cart to committed sale.
pub struct CheckoutOrchestrator {
    cashier_id: String,
    currency: String,
    currency_symbol: String,
    cart: Cart,
    session: CheckoutSession,
    ledger: Arc<dyn TransactionLedger>,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn ManualEntryNotifier>,
    last_committed: Option<Transaction>,
}

impl CheckoutOrchestrator {
    pub fn new(
        settings: CheckoutSettings,
        cashier_id: impl Into<String>,
        ledger: Arc<dyn TransactionLedger>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn ManualEntryNotifier>,
    ) -> Self {
        CheckoutOrchestrator {
            cashier_id: cashier_id.into(),
            currency: DEFAULT_CURRENCY.to_string(),
            currency_symbol: DEFAULT_CURRENCY_SYMBOL.to_string(),
            cart: Cart::new(),
            session: CheckoutSession::new(settings),
            ledger,
            gateway,
            notifier,
            last_committed: None,
        }
    }

    pub fn with_currency(mut self, code: impl Into<String>, symbol: impl Into<String>) -> Self {
        self.currency = code.into();
        self.currency_symbol = symbol.into();
        self
    }

    pub fn cashier_id(&self) -> &str {
        &self.cashier_id
    }

    pub fn state(&self) -> CheckoutState {
        self.session.state()
    }

    /// The most recent sale this till stored.
    pub fn last_committed(&self) -> Option<&Transaction> {
        self.last_committed.as_ref()
    }

    fn tax_rate(&self) -> TaxRate {
        self.session.settings().tax_rate
    }

    // =========================================================================
    // Cart
    // =========================================================================

    pub fn cart(&self) -> &Cart {
        &self.cart
    }

    pub fn cart_totals(&self) -> CartTotals {
        self.cart.totals(self.tax_rate())
    }

    /// Applies a cart edit.
    ///
    /// Editing is allowed before checkout starts and on the method-selection
    /// screen, where the session totals are refreshed (or the session is
    /// dropped if the cart became empty). Once payment input has started
    /// the cart is frozen.
    fn edit_cart<F>(&mut self, edit: F) -> Result<CartTotals, CheckoutFailure>
    where
        F: FnOnce(&mut Cart, TaxRate) -> CoreResult<()>,
    {
        let state = self.session.state();
        if !matches!(
            state,
            CheckoutState::Idle | CheckoutState::Committed | CheckoutState::AwaitingMethodSelection
        ) {
            return Err(CheckoutError::InvalidTransition {
                state,
                action: "edit the cart",
            }
            .into());
        }

        let tax_rate = self.tax_rate();
        edit(&mut self.cart, tax_rate)?;

        if state == CheckoutState::AwaitingMethodSelection {
            if self.cart.is_empty() {
                self.session.cancel()?;
            } else {
                self.session.begin(&self.cart)?;
            }
        }
        Ok(self.cart_totals())
    }

    pub fn add_product(
        &mut self,
        product: &Product,
        selections: BTreeMap<String, String>,
        quantity: i64,
    ) -> Result<CartTotals, CheckoutFailure> {
        tracing::debug!(product_id = %product.id, quantity, "Adding to cart");
        self.edit_cart(|cart, _| cart.add_item(product, selections, quantity))
    }

    /// Sets a line's quantity; zero removes it.
    pub fn update_quantity(&mut self, key: &str, quantity: i64) -> Result<CartTotals, CheckoutFailure> {
        self.edit_cart(|cart, _| cart.update_quantity(key, quantity))
    }

    pub fn remove_item(&mut self, key: &str) -> Result<CartTotals, CheckoutFailure> {
        self.edit_cart(|cart, _| cart.remove_item(key))
    }

    pub fn set_item_note(
        &mut self,
        key: &str,
        note: Option<String>,
    ) -> Result<CartTotals, CheckoutFailure> {
        self.edit_cart(|cart, _| cart.set_note(key, note))
    }

    pub fn set_discount(&mut self, discount: Money) -> Result<CartTotals, CheckoutFailure> {
        self.edit_cart(|cart, tax_rate| cart.set_discount(discount, tax_rate))
    }

    pub fn set_customer_name(&mut self, name: Option<String>) -> Result<CartTotals, CheckoutFailure> {
        self.edit_cart(|cart, _| {
            cart.set_customer_name(name);
            Ok(())
        })
    }

    pub fn clear_cart(&mut self) -> Result<CartTotals, CheckoutFailure> {
        self.edit_cart(|cart, _| {
            cart.clear();
            Ok(())
        })
    }

    // =========================================================================
    // Checkout Steps
    // =========================================================================

    /// Snapshots the cart and moves to method selection.
    pub fn begin_checkout(&mut self) -> Result<CheckoutTotals, CheckoutFailure> {
        let totals = self.session.begin(&self.cart)?;
        tracing::debug!(total = %totals.total, lines = self.cart.item_count(), "Checkout started");
        Ok(totals)
    }

    pub fn select_method(&mut self, selection: PaymentSelection) -> Result<CheckoutView, CheckoutFailure> {
        self.session.select_method(selection)?;
        Ok(self.view())
    }

    pub fn back_to_method_selection(&mut self) -> Result<CheckoutView, CheckoutFailure> {
        self.session.back_to_method_selection()?;
        Ok(self.view())
    }

    pub fn enter_cash_tendered(&mut self, amount: Money) -> Result<CheckoutView, CheckoutFailure> {
        self.session.enter_tendered(amount)?;
        Ok(self.view())
    }

    /// Sets the cash leg; card rebalances to the remainder.
    pub fn set_split_cash(&mut self, amount: Money) -> Result<CheckoutView, CheckoutFailure> {
        self.session.set_split_cash(amount)?;
        Ok(self.view())
    }

    /// Sets the card leg; cash rebalances to the remainder.
    pub fn set_split_card(&mut self, amount: Money) -> Result<CheckoutView, CheckoutFailure> {
        self.session.set_split_card(amount)?;
        Ok(self.view())
    }

    pub fn set_split_amounts(&mut self, cash: Money, card: Money) -> Result<CheckoutView, CheckoutFailure> {
        self.session.set_split_amounts(cash, card)?;
        Ok(self.view())
    }

    pub fn set_receipt_options(&mut self, options: ReceiptOptions) -> Result<CheckoutView, CheckoutFailure> {
        self.session.set_receipt_options(options)?;
        Ok(self.view())
    }

    /// Abandons payment input. The cart is kept.
    pub fn cancel(&mut self) -> Result<(), CheckoutFailure> {
        self.session.cancel()?;
        tracing::debug!("Checkout cancelled");
        Ok(())
    }

    /// Read-only projection for the payment screen.
    pub fn view(&self) -> CheckoutView {
        self.session.view()
    }

    // =========================================================================
    // Settlement
    // =========================================================================

    /// Captures payment and commits the sale.
    ///
    /// ## Outcomes
    /// - `Ok(txn)`: stored; cart cleared; state `Committed`
    /// - `PaymentDeclined`: nothing stored; legs captured before the decline
    ///   are voided (or reported for manual handling); back at payment input
    /// - `DegradedCommit`: money taken but not stored; the manual-entry
    ///   notifier has the snapshot; cart cleared; state `Idle`
    /// - any other error: refused before capture; nothing changed
    pub async fn confirm(&mut self) -> Result<Transaction, CheckoutFailure> {
        let plan = self.session.prepare_settlement()?;

        // The store would refuse this sale; find out before taking money.
        let mut txn = self.build_transaction(&plan, generate_transaction_id(), plan.legs.clone());
        if let Err(e) = validate_new_transaction(&txn) {
            tracing::warn!(transaction_id = %txn.transaction_id, "Sale refused before capture: {}", e);
            self.session.capture_failed()?;
            return Err(CoreError::from(e).into());
        }

        let mut legs = Vec::with_capacity(plan.legs.len());
        for leg in &plan.legs {
            match self.gateway.capture(leg).await {
                Ok(receipt) => {
                    let mut captured = leg.clone();
                    captured.reference = Some(receipt.reference);
                    captured.approval_code = receipt.approval_code;
                    legs.push(captured);
                    self.session.leg_captured()?;
                }
                Err(e) => {
                    tracing::warn!(
                        kind = %leg.kind,
                        amount = %leg.amount,
                        already_captured = legs.len(),
                        "Payment capture failed: {}",
                        e
                    );
                    self.release_captured(&txn, legs, &e).await;
                    self.session.capture_failed()?;
                    return Err(e.into());
                }
            }
        }
        let captured_at = Utc::now();

        txn.payment_methods = legs;
        attach_capture_references(&mut txn);

        match self.ledger.record(&txn).await {
            Ok(stored) => {
                let report = self
                    .ledger
                    .record_line_items(&stored.transaction_id, &txn.items)
                    .await;
                if !report.is_complete() {
                    tracing::warn!(
                        transaction_id = %stored.transaction_id,
                        failed = report.failed(),
                        "Some line items were not saved"
                    );
                }

                self.cart.clear();
                self.session.mark_committed()?;
                tracing::info!(
                    transaction_id = %stored.transaction_id,
                    total = %stored.total,
                    change = %stored.change,
                    "Sale committed"
                );
                self.last_committed = Some(stored.clone());
                Ok(stored)
            }
            Err(e) => {
                let reason = e.to_string();
                tracing::error!(
                    transaction_id = %txn.transaction_id,
                    total = %txn.total,
                    "Captured payment could not be stored: {}",
                    reason
                );
                let notice = ManualEntryNotice::from_transaction(&txn, captured_at, reason.clone());
                self.notifier.notify(&notice).await;

                self.cart.clear();
                self.session.abandon_after_capture()?;
                Err(CheckoutFailure::DegradedCommit {
                    notice: Box::new(notice),
                    reason,
                })
            }
        }
    }

    /// Voids legs taken before a later leg was declined. Legs the gateway
    /// will not give back go to the manual-entry notifier.
    async fn release_captured(
        &self,
        draft: &NewTransaction,
        captured: Vec<PaymentMethod>,
        decline: &PaymentError,
    ) {
        if captured.is_empty() {
            return;
        }

        let mut held = Vec::new();
        for leg in captured.into_iter().rev() {
            match self.gateway.void(&leg).await {
                Ok(()) => {
                    tracing::info!(kind = %leg.kind, amount = %leg.amount, "Voided captured leg")
                }
                Err(e) => {
                    tracing::error!(
                        kind = %leg.kind,
                        amount = %leg.amount,
                        reference = leg.reference.as_deref().unwrap_or("-"),
                        "Captured leg could not be voided: {}",
                        e
                    );
                    held.push(leg);
                }
            }
        }
        if held.is_empty() {
            return;
        }

        held.reverse();
        let amount: Money = held.iter().map(|leg| leg.amount).sum();
        let mut snapshot = draft.clone();
        snapshot.payment_methods = held;
        let mut notice = ManualEntryNotice::from_transaction(
            &snapshot,
            Utc::now(),
            format!("sale abandoned after {}; captured legs not voided", decline),
        );
        notice.amount = amount;
        notice.change = Money::zero();
        self.notifier.notify(&notice).await;
    }

    fn build_transaction(
        &self,
        plan: &SettlementPlan,
        transaction_id: String,
        legs: Vec<PaymentMethod>,
    ) -> NewTransaction {
        let metrics = json!({
            "paymentSelection": plan.selection,
            "lineCount": plan.items.len(),
        });

        let mut txn = NewTransaction::sale(self.cashier_id.clone(), transaction_id);
        txn.items = plan.items.clone();
        txn.payment_methods = legs;
        txn.subtotal = plan.totals.subtotal;
        txn.tax = plan.totals.tax;
        txn.discount = plan.totals.discount;
        txn.total = plan.totals.total;
        txn.change = plan.change;
        txn.customer_name = plan.customer_name.clone();
        txn.receipt_status = match plan.receipt_options.delivery {
            ReceiptDelivery::Sms | ReceiptDelivery::Email => ReceiptStatus::Pending,
            ReceiptDelivery::Print | ReceiptDelivery::None => ReceiptStatus::Issued,
        };
        txn.receipt_options = Some(plan.receipt_options.clone());
        txn.currency = self.currency.clone();
        txn.currency_symbol = self.currency_symbol.clone();
        txn.metrics = Some(metrics);
        txn
    }
}

fn attach_capture_references(txn: &mut NewTransaction) {
    let references: Vec<&str> = txn
        .payment_methods
        .iter()
        .filter_map(|leg| leg.reference.as_deref())
        .collect();
    let references = json!(references);
    if let Some(serde_json::Value::Object(metrics)) = txn.metrics.as_mut() {
        metrics.insert("captureReferences".to_string(), references);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_id_shape() {
        let id = generate_transaction_id();
        let parts: Vec<&str> = id.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "TXN");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 4);
    }
}
