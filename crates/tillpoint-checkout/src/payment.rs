//! # Payment Capture
//!
//! The card terminal / cash drawer is an external collaborator. The
//! orchestrator only sees [`PaymentGateway`]: one call per payment leg,
//! approved with a reference or declined with a reason. A captured leg can
//! be voided by its reference when a later leg of the same sale fails.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use rand::Rng;
use thiserror::Error;
use tillpoint_core::{PaymentKind, PaymentMethod};
use tokio::sync::RwLock;

/// A leg the gateway refused to take.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentError {
    #[error("{kind} payment declined: {reason}")]
    Declined { kind: PaymentKind, reason: String },

    #[error("Payment terminal unavailable: {0}")]
    Unavailable(String),
}

/// Proof that a leg was taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureReceipt {
    pub reference: String,
    /// Card authorisation code; `None` for cash.
    pub approval_code: Option<String>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Captures one leg. Declines must not have taken any money.
    async fn capture(&self, leg: &PaymentMethod) -> Result<CaptureReceipt, PaymentError>;

    /// Gives back a leg returned by `capture`, identified by its
    /// `reference`. An error means the money is still held.
    async fn void(&self, leg: &PaymentMethod) -> Result<(), PaymentError>;
}

/// In-process gateway for development and tests.
///
/// Approves every leg unless told to decline a payment kind. Legs still
/// held and legs given back are kept for inspection.
#[derive(Debug, Default)]
pub struct SimulatedGateway {
    decline: Option<PaymentKind>,
    sequence: AtomicU64,
    captured: RwLock<Vec<PaymentMethod>>,
    voided: RwLock<Vec<PaymentMethod>>,
}

impl SimulatedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// A gateway that declines every leg of `kind`.
    pub fn declining(kind: PaymentKind) -> Self {
        SimulatedGateway {
            decline: Some(kind),
            ..Self::default()
        }
    }

    /// Legs currently held, in capture order. Each carries its reference.
    pub async fn captured(&self) -> Vec<PaymentMethod> {
        self.captured.read().await.clone()
    }

    /// Legs given back through `void`.
    pub async fn voided(&self) -> Vec<PaymentMethod> {
        self.voided.read().await.clone()
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn capture(&self, leg: &PaymentMethod) -> Result<CaptureReceipt, PaymentError> {
        if self.decline == Some(leg.kind) {
            tracing::debug!(kind = %leg.kind, amount = %leg.amount, "Simulated decline");
            return Err(PaymentError::Declined {
                kind: leg.kind,
                reason: "declined by simulator".to_string(),
            });
        }

        let n = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let receipt = match leg.kind {
            PaymentKind::Cash => CaptureReceipt {
                reference: format!("CASH-{:06}", n),
                approval_code: None,
            },
            _ => CaptureReceipt {
                reference: format!("SIM-{:06}", n),
                approval_code: Some(format!("{:06}", rand::thread_rng().gen_range(0..1_000_000))),
            },
        };

        let mut held = leg.clone();
        held.reference = Some(receipt.reference.clone());
        held.approval_code = receipt.approval_code.clone();
        self.captured.write().await.push(held);
        tracing::debug!(kind = %leg.kind, amount = %leg.amount, reference = %receipt.reference, "Simulated capture");
        Ok(receipt)
    }

    async fn void(&self, leg: &PaymentMethod) -> Result<(), PaymentError> {
        let reference = leg
            .reference
            .as_deref()
            .ok_or_else(|| PaymentError::Unavailable("leg has no capture reference".to_string()))?;

        let mut captured = self.captured.write().await;
        let position = captured
            .iter()
            .position(|held| held.reference.as_deref() == Some(reference))
            .ok_or_else(|| PaymentError::Unavailable(format!("unknown capture {}", reference)))?;
        let released = captured.remove(position);
        drop(captured);

        tracing::debug!(kind = %released.kind, amount = %released.amount, reference, "Simulated void");
        self.voided.write().await.push(released);
        Ok(())
    }
}
