//! Where committed sales go.
//!
//! The orchestrator writes through [`TransactionLedger`] rather than the
//! repository directly, so a till can be pointed at any store that keeps
//! the same two promises: `record` is all-or-nothing, and line items are
//! best-effort.

use async_trait::async_trait;
use tillpoint_core::{BestEffortReport, NewTransaction, Transaction, TransactionItem};
use tillpoint_db::{DbResult, TransactionRepository};

#[async_trait]
pub trait TransactionLedger: Send + Sync {
    /// Stores the transaction. An error means nothing was written.
    async fn record(&self, txn: &NewTransaction) -> DbResult<Transaction>;

    /// Stores per-line rows for reporting. Failures are reported, not
    /// raised.
    async fn record_line_items(
        &self,
        transaction_id: &str,
        items: &[TransactionItem],
    ) -> BestEffortReport;
}

#[async_trait]
impl TransactionLedger for TransactionRepository {
    async fn record(&self, txn: &NewTransaction) -> DbResult<Transaction> {
        self.create(txn).await
    }

    async fn record_line_items(
        &self,
        transaction_id: &str,
        items: &[TransactionItem],
    ) -> BestEffortReport {
        self.save_line_items(transaction_id, items).await
    }
}
