//! # Checkout State Machine
//!
//! The pure half of checkout: states, legal transitions and payment
//! arithmetic. Capturing payments and writing the transaction happen in
//! `tillpoint-checkout`, which drives this session.
//!
//! ## States
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   Idle ──begin──► AwaitingMethodSelection                               │
//! │    ▲                 │        │         │                               │
//! │    │              cash│    card│    split│                              │
//! │    │                 ▼        ▼         ▼                               │
//! │    │          CashInput  CardPending  SplitInput                        │
//! │    │                 │        │         │  both legs > 0                │
//! │ cancel               │        │         ├──► SplitCashProcessing        │
//! │ (pre-settling)       │        │         │          │ leg captured       │
//! │    │                 │        │         │          ▼                    │
//! │    │                 │        │         │    SplitCardProcessing        │
//! │    │                 ▼        ▼         ▼          │ leg captured       │
//! │    │              ┌──────────────────────────┐     │                    │
//! │    │              │         Settling         │◄────┘                    │
//! │    │              └────────────┬─────────────┘                          │
//! │    │       persistence failed  │  commit ok                             │
//! │    └───────────────────────────┤                                        │
//! │                                ▼                                        │
//! │                            Committed ──begin──► (next sale)             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every rejected call returns a [`CheckoutError`] and leaves the session
//! untouched.

use std::fmt;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::cart::{Cart, CartTotals};
use crate::error::CheckoutError;
use crate::money::Money;
use crate::types::{PaymentKind, PaymentMethod, ReceiptOptions, TaxRate, TransactionItem};
use crate::validation::validate_receipt_contact;

// =============================================================================
// Settings
// =============================================================================

/// Deployment-level checkout constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSettings {
    pub tax_rate: TaxRate,
    /// Largest |cash + card − total| accepted for a split payment.
    pub split_tolerance: Money,
}

impl Default for CheckoutSettings {
    fn default() -> Self {
        CheckoutSettings {
            tax_rate: TaxRate::from_bps(crate::DEFAULT_TAX_RATE_BPS),
            split_tolerance: Money::from_cents(crate::DEFAULT_SPLIT_TOLERANCE_CENTS),
        }
    }
}

// =============================================================================
// States
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutState {
    Idle,
    AwaitingMethodSelection,
    CashInput,
    CardPending,
    SplitInput,
    SplitCashProcessing,
    SplitCardProcessing,
    Settling,
    Committed,
}

impl CheckoutState {
    /// States from which cancel is allowed (nothing captured yet).
    pub fn is_pre_settling(&self) -> bool {
        matches!(
            self,
            CheckoutState::Idle
                | CheckoutState::AwaitingMethodSelection
                | CheckoutState::CashInput
                | CheckoutState::CardPending
                | CheckoutState::SplitInput
        )
    }

    fn is_input(&self) -> bool {
        matches!(
            self,
            CheckoutState::CashInput | CheckoutState::CardPending | CheckoutState::SplitInput
        )
    }
}

impl fmt::Display for CheckoutState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CheckoutState::Idle => "idle",
            CheckoutState::AwaitingMethodSelection => "awaiting method selection",
            CheckoutState::CashInput => "taking cash",
            CheckoutState::CardPending => "waiting for card",
            CheckoutState::SplitInput => "taking a split payment",
            CheckoutState::SplitCashProcessing => "processing the cash leg",
            CheckoutState::SplitCardProcessing => "processing the card leg",
            CheckoutState::Settling => "settling",
            CheckoutState::Committed => "committed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum PaymentSelection {
    Cash,
    Card,
    Split,
}

impl PaymentSelection {
    fn input_state(&self) -> CheckoutState {
        match self {
            PaymentSelection::Cash => CheckoutState::CashInput,
            PaymentSelection::Card => CheckoutState::CardPending,
            PaymentSelection::Split => CheckoutState::SplitInput,
        }
    }
}

// =============================================================================
// Projections
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CheckoutTotals {
    pub subtotal: Money,
    pub tax: Money,
    pub discount: Money,
    pub total: Money,
}

impl From<CartTotals> for CheckoutTotals {
    fn from(totals: CartTotals) -> Self {
        CheckoutTotals {
            subtotal: totals.subtotal,
            tax: totals.tax,
            discount: totals.discount,
            total: totals.total,
        }
    }
}

/// Read-only snapshot for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CheckoutView {
    pub state: CheckoutState,
    pub selection: Option<PaymentSelection>,
    pub totals: CheckoutTotals,
    pub tendered: Money,
    pub change: Money,
    pub split_cash: Money,
    pub split_card: Money,
    /// cash + card − total; negative is a shortfall.
    pub split_difference: Money,
    pub receipt_options: ReceiptOptions,
}

/// Everything needed to capture payment and write the transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct SettlementPlan {
    pub selection: PaymentSelection,
    /// Payment legs in capture order (cash before card).
    pub legs: Vec<PaymentMethod>,
    pub change: Money,
    pub totals: CheckoutTotals,
    pub items: Vec<TransactionItem>,
    pub customer_name: Option<String>,
    pub receipt_options: ReceiptOptions,
}

// =============================================================================
// Session
// =============================================================================

/// A single in-flight checkout.
#[derive(Debug, Clone)]
pub struct CheckoutSession {
    settings: CheckoutSettings,
    state: CheckoutState,
    selection: Option<PaymentSelection>,
    totals: CheckoutTotals,
    items: Vec<TransactionItem>,
    customer_name: Option<String>,
    tendered: Money,
    split_cash: Money,
    split_card: Money,
    receipt_options: ReceiptOptions,
}

impl CheckoutSession {
    pub fn new(settings: CheckoutSettings) -> Self {
        CheckoutSession {
            settings,
            state: CheckoutState::Idle,
            selection: None,
            totals: CheckoutTotals::default(),
            items: Vec::new(),
            customer_name: None,
            tendered: Money::zero(),
            split_cash: Money::zero(),
            split_card: Money::zero(),
            receipt_options: ReceiptOptions::default(),
        }
    }

    pub fn settings(&self) -> CheckoutSettings {
        self.settings
    }

    pub fn state(&self) -> CheckoutState {
        self.state
    }

    pub fn totals(&self) -> CheckoutTotals {
        self.totals
    }

    fn ensure(&self, allowed: bool, action: &'static str) -> Result<(), CheckoutError> {
        if allowed {
            Ok(())
        } else {
            Err(CheckoutError::InvalidTransition {
                state: self.state,
                action,
            })
        }
    }

    fn reset(&mut self) {
        self.selection = None;
        self.totals = CheckoutTotals::default();
        self.items.clear();
        self.customer_name = None;
        self.reset_inputs();
        self.receipt_options = ReceiptOptions::default();
    }

    fn reset_inputs(&mut self) {
        self.tendered = Money::zero();
        self.split_cash = Money::zero();
        self.split_card = Money::zero();
    }

    /// Snapshots the cart and computes totals.
    ///
    /// Allowed from `Idle`, from `Committed` (next sale) and from
    /// `AwaitingMethodSelection` (refresh after a cart edit).
    pub fn begin(&mut self, cart: &Cart) -> Result<CheckoutTotals, CheckoutError> {
        self.ensure(
            matches!(
                self.state,
                CheckoutState::Idle
                    | CheckoutState::Committed
                    | CheckoutState::AwaitingMethodSelection
            ),
            "begin checkout",
        )?;
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        self.reset();
        self.totals = cart.totals(self.settings.tax_rate).into();
        self.items = cart.to_transaction_items();
        self.customer_name = cart.customer_name.clone();
        self.state = CheckoutState::AwaitingMethodSelection;
        Ok(self.totals)
    }

    pub fn select_method(&mut self, selection: PaymentSelection) -> Result<(), CheckoutError> {
        self.ensure(
            self.state == CheckoutState::AwaitingMethodSelection,
            "select a payment method",
        )?;
        self.reset_inputs();
        self.selection = Some(selection);
        self.state = selection.input_state();
        Ok(())
    }

    /// Leaves a payment input screen without cancelling the sale.
    pub fn back_to_method_selection(&mut self) -> Result<(), CheckoutError> {
        self.ensure(self.state.is_input(), "change payment method")?;
        self.reset_inputs();
        self.selection = None;
        self.state = CheckoutState::AwaitingMethodSelection;
        Ok(())
    }

    pub fn enter_tendered(&mut self, amount: Money) -> Result<(), CheckoutError> {
        self.ensure(self.state == CheckoutState::CashInput, "enter cash tendered")?;
        check_amount("tendered", amount)?;
        self.tendered = amount;
        Ok(())
    }

    /// Sets the cash leg and rebalances card to `max(0, total − cash)`.
    pub fn set_split_cash(&mut self, amount: Money) -> Result<(), CheckoutError> {
        self.ensure(self.state == CheckoutState::SplitInput, "edit split amounts")?;
        check_amount("cash", amount)?;
        self.split_cash = amount;
        self.split_card = (self.totals.total - amount).non_negative();
        Ok(())
    }

    /// Sets the card leg and rebalances cash to `max(0, total − card)`.
    pub fn set_split_card(&mut self, amount: Money) -> Result<(), CheckoutError> {
        self.ensure(self.state == CheckoutState::SplitInput, "edit split amounts")?;
        check_amount("card", amount)?;
        self.split_card = amount;
        self.split_cash = (self.totals.total - amount).non_negative();
        Ok(())
    }

    /// Sets both split legs without rebalancing.
    pub fn set_split_amounts(&mut self, cash: Money, card: Money) -> Result<(), CheckoutError> {
        self.ensure(self.state == CheckoutState::SplitInput, "edit split amounts")?;
        check_amount("cash", cash)?;
        check_amount("card", card)?;
        self.split_cash = cash;
        self.split_card = card;
        Ok(())
    }

    pub fn split_difference(&self) -> Money {
        self.split_cash + self.split_card - self.totals.total
    }

    /// Change owed for a cash sale; zero until enough has been tendered.
    pub fn change(&self) -> Money {
        if self.selection == Some(PaymentSelection::Cash) {
            (self.tendered - self.totals.total).non_negative()
        } else {
            Money::zero()
        }
    }

    pub fn set_receipt_options(&mut self, options: ReceiptOptions) -> Result<(), CheckoutError> {
        self.ensure(
            self.state.is_pre_settling() && self.state != CheckoutState::Idle,
            "change receipt options",
        )?;
        self.receipt_options = options;
        Ok(())
    }

    /// Checks the payment input and moves into capture.
    ///
    /// On success the session is in `Settling`, or in `SplitCashProcessing`
    /// when a split has two non-zero legs. A split within tolerance is
    /// balanced exactly by adjusting the card leg (or cash, if card is zero).
    pub fn prepare_settlement(&mut self) -> Result<SettlementPlan, CheckoutError> {
        self.ensure(self.state.is_input(), "confirm payment")?;
        validate_receipt_contact(&self.receipt_options)
            .map_err(CheckoutError::InvalidReceiptContact)?;

        let total = self.totals.total;
        if total.is_zero() {
            return Err(CheckoutError::ZeroTotal);
        }

        let (selection, legs, change) = match self.state {
            CheckoutState::CashInput => {
                if self.tendered < total {
                    return Err(CheckoutError::InsufficientTender {
                        tendered: self.tendered,
                        total,
                        shortfall: total - self.tendered,
                    });
                }
                let legs = vec![PaymentMethod::new(PaymentKind::Cash, self.tendered)];
                (PaymentSelection::Cash, legs, self.tendered - total)
            }
            CheckoutState::CardPending => {
                let legs = vec![PaymentMethod::new(PaymentKind::Card, total)];
                (PaymentSelection::Card, legs, Money::zero())
            }
            _ => {
                let difference = self.split_difference();
                if difference.abs() > self.settings.split_tolerance {
                    return Err(CheckoutError::SplitImbalance { difference });
                }
                let (cash, card) = if self.split_card.is_positive() {
                    (self.split_cash, total - self.split_cash)
                } else {
                    (total - self.split_card, self.split_card)
                };
                let legs: Vec<PaymentMethod> = [(PaymentKind::Cash, cash), (PaymentKind::Card, card)]
                    .into_iter()
                    .filter(|(_, amount)| amount.is_positive())
                    .map(|(kind, amount)| PaymentMethod::new(kind, amount))
                    .collect();
                (PaymentSelection::Split, legs, Money::zero())
            }
        };

        self.state = if legs.len() > 1 {
            CheckoutState::SplitCashProcessing
        } else {
            CheckoutState::Settling
        };

        Ok(SettlementPlan {
            selection,
            legs,
            change,
            totals: self.totals,
            items: self.items.clone(),
            customer_name: self.customer_name.clone(),
            receipt_options: self.receipt_options.clone(),
        })
    }

    /// Records that the current leg was captured.
    ///
    /// Advances split processing; a no-op once in `Settling`.
    pub fn leg_captured(&mut self) -> Result<(), CheckoutError> {
        self.state = match self.state {
            CheckoutState::SplitCashProcessing => CheckoutState::SplitCardProcessing,
            CheckoutState::SplitCardProcessing | CheckoutState::Settling => CheckoutState::Settling,
            _ => {
                return Err(CheckoutError::InvalidTransition {
                    state: self.state,
                    action: "record a captured payment",
                })
            }
        };
        Ok(())
    }

    /// A capture was declined: return to the payment input for this method.
    pub fn capture_failed(&mut self) -> Result<(), CheckoutError> {
        self.ensure(
            matches!(
                self.state,
                CheckoutState::SplitCashProcessing
                    | CheckoutState::SplitCardProcessing
                    | CheckoutState::Settling
            ),
            "report a failed capture",
        )?;
        self.state = self
            .selection
            .map(|s| s.input_state())
            .unwrap_or(CheckoutState::AwaitingMethodSelection);
        Ok(())
    }

    /// The transaction is durable. Terminal until the next `begin`.
    pub fn mark_committed(&mut self) -> Result<(), CheckoutError> {
        self.ensure(self.state == CheckoutState::Settling, "commit")?;
        self.reset();
        self.state = CheckoutState::Committed;
        Ok(())
    }

    /// Payment was captured but could not be stored; ready for the next sale.
    pub fn abandon_after_capture(&mut self) -> Result<(), CheckoutError> {
        self.ensure(self.state == CheckoutState::Settling, "abandon settlement")?;
        self.reset();
        self.state = CheckoutState::Idle;
        Ok(())
    }

    /// Discards all payment input. Only before anything is captured.
    pub fn cancel(&mut self) -> Result<(), CheckoutError> {
        self.ensure(self.state.is_pre_settling(), "cancel")?;
        self.reset();
        self.state = CheckoutState::Idle;
        Ok(())
    }

    pub fn view(&self) -> CheckoutView {
        CheckoutView {
            state: self.state,
            selection: self.selection,
            totals: self.totals,
            tendered: self.tendered,
            change: self.change(),
            split_cash: self.split_cash,
            split_card: self.split_card,
            split_difference: if self.selection == Some(PaymentSelection::Split) {
                self.split_difference()
            } else {
                Money::zero()
            },
            receipt_options: self.receipt_options.clone(),
        }
    }
}

fn check_amount(field: &'static str, amount: Money) -> Result<(), CheckoutError> {
    if amount.is_negative() {
        return Err(CheckoutError::NegativeAmount { field });
    }
    if !amount.is_within_limit() {
        return Err(CheckoutError::AmountTooLarge { field });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::CartItem;
    use crate::types::ReceiptDelivery;
    use proptest::prelude::*;

    /// A session whose total is exactly `total_cents` (tax 0).
    fn session_with_total(total_cents: i64) -> CheckoutSession {
        let mut cart = Cart::new();
        cart.add_line(CartItem::new("P1", "Item", Money::from_cents(total_cents), 1))
            .unwrap();
        let mut session = CheckoutSession::new(CheckoutSettings {
            tax_rate: TaxRate::zero(),
            split_tolerance: Money::from_cents(1),
        });
        session.begin(&cart).unwrap();
        session
    }

    #[test]
    fn test_begin_requires_items() {
        let mut session = CheckoutSession::new(CheckoutSettings::default());
        assert_eq!(session.begin(&Cart::new()), Err(CheckoutError::EmptyCart));
        assert_eq!(session.state(), CheckoutState::Idle);
    }

    #[test]
    fn test_begin_computes_totals_with_tax() {
        let mut cart = Cart::new();
        cart.add_line(CartItem::new("P1", "Espresso", Money::from_cents(1000), 2))
            .unwrap();
        cart.add_line(
            CartItem::new("P2", "Latte", Money::from_cents(500), 1)
                .with_variant_price(Money::from_cents(100)),
        )
        .unwrap();

        let mut session = CheckoutSession::new(CheckoutSettings::default());
        let totals = session.begin(&cart).unwrap();
        assert_eq!(totals.subtotal.cents(), 2600);
        assert_eq!(totals.tax.cents(), 260);
        assert_eq!(totals.total.cents(), 2860);
        assert_eq!(session.state(), CheckoutState::AwaitingMethodSelection);
    }

    #[test]
    fn test_cash_change_and_shortfall() {
        let mut session = session_with_total(8750);
        session.select_method(PaymentSelection::Cash).unwrap();

        session.enter_tendered(Money::from_cents(8000)).unwrap();
        let err = session.prepare_settlement().unwrap_err();
        assert_eq!(
            err,
            CheckoutError::InsufficientTender {
                tendered: Money::from_cents(8000),
                total: Money::from_cents(8750),
                shortfall: Money::from_cents(750),
            }
        );
        assert_eq!(session.state(), CheckoutState::CashInput);

        session.enter_tendered(Money::from_cents(10000)).unwrap();
        assert_eq!(session.change().cents(), 1250);
        let plan = session.prepare_settlement().unwrap();
        assert_eq!(plan.change.cents(), 1250);
        assert_eq!(plan.legs, vec![PaymentMethod::new(PaymentKind::Cash, Money::from_cents(10000))]);
        assert_eq!(session.state(), CheckoutState::Settling);
    }

    #[test]
    fn test_card_charges_exact_total() {
        let mut session = session_with_total(4200);
        session.select_method(PaymentSelection::Card).unwrap();
        let plan = session.prepare_settlement().unwrap();
        assert_eq!(plan.legs, vec![PaymentMethod::new(PaymentKind::Card, Money::from_cents(4200))]);
        assert!(plan.change.is_zero());
    }

    #[test]
    fn test_split_auto_balances() {
        let mut session = session_with_total(10000);
        session.select_method(PaymentSelection::Split).unwrap();

        session.set_split_cash(Money::from_cents(6000)).unwrap();
        assert_eq!(session.view().split_card.cents(), 4000);

        session.set_split_card(Money::from_cents(2500)).unwrap();
        assert_eq!(session.view().split_cash.cents(), 7500);

        session.set_split_cash(Money::from_cents(12000)).unwrap();
        assert!(session.view().split_card.is_zero());
    }

    #[test]
    fn test_oversized_amounts_rejected() {
        let too_large = Money::MAX_INPUT + Money::from_cents(1);

        let mut session = session_with_total(500);
        session.select_method(PaymentSelection::Cash).unwrap();
        assert_eq!(
            session.enter_tendered(Money::from_cents(i64::MAX)),
            Err(CheckoutError::AmountTooLarge { field: "tendered" })
        );
        assert!(session.view().tendered.is_zero());

        session.back_to_method_selection().unwrap();
        session.select_method(PaymentSelection::Split).unwrap();
        assert_eq!(
            session.set_split_cash(too_large),
            Err(CheckoutError::AmountTooLarge { field: "cash" })
        );
        assert_eq!(
            session.set_split_amounts(Money::zero(), too_large),
            Err(CheckoutError::AmountTooLarge { field: "card" })
        );
        // The i64::MIN edge stays a negative-amount error.
        assert_eq!(
            session.set_split_card(Money::from_cents(i64::MIN)),
            Err(CheckoutError::NegativeAmount { field: "card" })
        );
        assert!(session.view().split_cash.is_zero());
        assert!(session.view().split_card.is_zero());
    }

    #[test]
    fn test_split_settles_through_both_legs() {
        let mut session = session_with_total(10000);
        session.select_method(PaymentSelection::Split).unwrap();
        session.set_split_cash(Money::from_cents(6000)).unwrap();

        let plan = session.prepare_settlement().unwrap();
        assert_eq!(plan.legs.len(), 2);
        assert_eq!(session.state(), CheckoutState::SplitCashProcessing);
        session.leg_captured().unwrap();
        assert_eq!(session.state(), CheckoutState::SplitCardProcessing);
        session.leg_captured().unwrap();
        assert_eq!(session.state(), CheckoutState::Settling);
        session.mark_committed().unwrap();
        assert_eq!(session.state(), CheckoutState::Committed);
    }

    #[test]
    fn test_split_outside_tolerance_reports_shortfall() {
        let mut session = session_with_total(10000);
        session.select_method(PaymentSelection::Split).unwrap();
        session
            .set_split_amounts(Money::from_cents(6000), Money::from_cents(3950))
            .unwrap();

        let err = session.prepare_settlement().unwrap_err();
        assert_eq!(
            err,
            CheckoutError::SplitImbalance {
                difference: Money::from_cents(-50)
            }
        );
        assert_eq!(session.state(), CheckoutState::SplitInput);
    }

    #[test]
    fn test_split_within_one_cent_is_balanced_exactly() {
        let mut session = session_with_total(10000);
        session.select_method(PaymentSelection::Split).unwrap();
        session
            .set_split_amounts(Money::from_cents(6000), Money::from_cents(3999))
            .unwrap();

        let plan = session.prepare_settlement().unwrap();
        let paid: Money = plan.legs.iter().map(|l| l.amount).sum();
        assert_eq!(paid.cents(), 10000);
    }

    #[test]
    fn test_single_leg_split_skips_leg_processing() {
        let mut session = session_with_total(10000);
        session.select_method(PaymentSelection::Split).unwrap();
        session.set_split_card(Money::from_cents(10000)).unwrap();
        let plan = session.prepare_settlement().unwrap();
        assert_eq!(plan.legs, vec![PaymentMethod::new(PaymentKind::Card, Money::from_cents(10000))]);
        assert_eq!(session.state(), CheckoutState::Settling);
    }

    #[test]
    fn test_receipt_contact_blocks_settlement() {
        let mut session = session_with_total(1000);
        session.select_method(PaymentSelection::Card).unwrap();
        session
            .set_receipt_options(ReceiptOptions {
                delivery: ReceiptDelivery::Sms,
                contact: Some("12".to_string()),
            })
            .unwrap();
        assert!(matches!(
            session.prepare_settlement(),
            Err(CheckoutError::InvalidReceiptContact(_))
        ));
        assert_eq!(session.state(), CheckoutState::CardPending);
    }

    #[test]
    fn test_cancel_only_before_settling() {
        let mut session = session_with_total(1000);
        session.select_method(PaymentSelection::Cash).unwrap();
        session.enter_tendered(Money::from_cents(500)).unwrap();
        session.cancel().unwrap();
        assert_eq!(session.state(), CheckoutState::Idle);
        assert!(session.view().tendered.is_zero());

        let mut session = session_with_total(1000);
        session.select_method(PaymentSelection::Card).unwrap();
        session.prepare_settlement().unwrap();
        assert!(matches!(
            session.cancel(),
            Err(CheckoutError::InvalidTransition { state: CheckoutState::Settling, .. })
        ));
    }

    #[test]
    fn test_capture_failure_returns_to_input() {
        let mut session = session_with_total(1000);
        session.select_method(PaymentSelection::Card).unwrap();
        session.prepare_settlement().unwrap();
        session.capture_failed().unwrap();
        assert_eq!(session.state(), CheckoutState::CardPending);
    }

    #[test]
    fn test_invalid_transition_message() {
        let mut session = CheckoutSession::new(CheckoutSettings::default());
        let err = session.select_method(PaymentSelection::Cash).unwrap_err();
        assert_eq!(err.to_string(), "Cannot select a payment method while checkout is idle");
    }

    proptest! {
        #[test]
        fn prop_split_edit_always_settles(total in 1i64..1_000_000, cash_share in 0i64..=100) {
            let cash = total * cash_share / 100;
            let mut session = session_with_total(total);
            session.select_method(PaymentSelection::Split).unwrap();
            session.set_split_cash(Money::from_cents(cash)).unwrap();

            prop_assert_eq!(session.split_difference(), Money::zero());
            let plan = session.prepare_settlement().unwrap();
            let paid: Money = plan.legs.iter().map(|l| l.amount).sum();
            prop_assert_eq!(paid.cents(), total);
            prop_assert!(plan.legs.iter().all(|l| l.amount.is_positive()));
        }

        #[test]
        fn prop_split_refused_beyond_tolerance(total in 100i64..1_000_000, off in 2i64..500) {
            let mut session = session_with_total(total);
            session.select_method(PaymentSelection::Split).unwrap();
            session
                .set_split_amounts(Money::from_cents(total - off), Money::zero())
                .unwrap();
            let refused = matches!(
                session.prepare_settlement(),
                Err(CheckoutError::SplitImbalance { .. })
            );
            prop_assert!(refused);
        }
    }
}
