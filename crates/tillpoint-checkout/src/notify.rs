//! # Manual-Entry Notifications
//!
//! When payment was captured but the sale could not be stored, the operator
//! has to record it by hand. A [`ManualEntryNotice`] carries everything
//! needed to do that; a [`ManualEntryNotifier`] gets it in front of a person.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tillpoint_core::{Money, NewTransaction, PaymentMethod, TransactionItem};
use tokio::sync::RwLock;

/// Snapshot of a captured-but-unsaved sale.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualEntryNotice {
    pub transaction_id: String,
    pub cashier_id: String,
    pub amount: Money,
    pub change: Money,
    pub items: Vec<TransactionItem>,
    pub payment_methods: Vec<PaymentMethod>,
    pub customer_name: Option<String>,
    pub captured_at: DateTime<Utc>,
    /// Why the store refused the write.
    pub reason: String,
}

impl ManualEntryNotice {
    pub fn from_transaction(
        txn: &NewTransaction,
        captured_at: DateTime<Utc>,
        reason: impl Into<String>,
    ) -> Self {
        ManualEntryNotice {
            transaction_id: txn.transaction_id.clone(),
            cashier_id: txn.cashier_id.clone(),
            amount: txn.total,
            change: txn.change,
            items: txn.items.clone(),
            payment_methods: txn.payment_methods.clone(),
            customer_name: txn.customer_name.clone(),
            captured_at,
            reason: reason.into(),
        }
    }
}

#[async_trait]
pub trait ManualEntryNotifier: Send + Sync {
    async fn notify(&self, notice: &ManualEntryNotice);
}

/// Writes the full notice to the error log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingNotifier;

#[async_trait]
impl ManualEntryNotifier for LoggingNotifier {
    async fn notify(&self, notice: &ManualEntryNotice) {
        let snapshot = serde_json::to_string(notice)
            .unwrap_or_else(|e| format!("<unserializable notice: {}>", e));
        tracing::error!(
            transaction_id = %notice.transaction_id,
            amount = %notice.amount,
            legs = notice.payment_methods.len(),
            items = notice.items.len(),
            captured_at = %notice.captured_at,
            reason = %notice.reason,
            snapshot = %snapshot,
            "MANUAL ENTRY REQUIRED: payment captured but sale not saved"
        );
    }
}

/// Keeps notices in memory for the UI to show, and logs them.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: RwLock<Vec<ManualEntryNotice>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn notices(&self) -> Vec<ManualEntryNotice> {
        self.notices.read().await.clone()
    }

    /// Removes and returns every pending notice.
    pub async fn drain(&self) -> Vec<ManualEntryNotice> {
        std::mem::take(&mut *self.notices.write().await)
    }

    /// Total amount awaiting manual entry.
    pub async fn outstanding(&self) -> Money {
        self.notices.read().await.iter().map(|n| n.amount).sum()
    }
}

#[async_trait]
impl ManualEntryNotifier for RecordingNotifier {
    async fn notify(&self, notice: &ManualEntryNotice) {
        LoggingNotifier.notify(notice).await;
        self.notices.write().await.push(notice.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tillpoint_core::PaymentKind;

    fn notice(id: &str, cents: i64) -> ManualEntryNotice {
        let mut txn = NewTransaction::sale("cashier-1", id);
        txn.total = Money::from_cents(cents);
        txn.payment_methods = vec![PaymentMethod::new(PaymentKind::Card, txn.total)];
        ManualEntryNotice::from_transaction(&txn, Utc::now(), "disk full")
    }

    #[test]
    fn test_notice_copies_snapshot() {
        let n = notice("TXN-1", 1250);
        assert_eq!(n.transaction_id, "TXN-1");
        assert_eq!(n.amount.cents(), 1250);
        assert_eq!(n.payment_methods.len(), 1);
        assert_eq!(n.reason, "disk full");

        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["transactionId"], "TXN-1");
        assert_eq!(json["amount"], 1250);
    }

    #[tokio::test]
    async fn test_recording_notifier() {
        let notifier = RecordingNotifier::new();
        notifier.notify(&notice("TXN-1", 1250)).await;
        notifier.notify(&notice("TXN-2", 750)).await;

        assert_eq!(notifier.notices().await.len(), 2);
        assert_eq!(notifier.outstanding().await.cents(), 2000);

        let drained = notifier.drain().await;
        assert_eq!(drained[0].transaction_id, "TXN-1");
        assert!(notifier.notices().await.is_empty());
    }
}
