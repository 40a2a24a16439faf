//! Payment event type definitions.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::currency::CurrencyKey;

/// Per-order payment progress as shown during checkout.
///
/// `Pending → Processing → Completed | Failed`; a failed order goes back to
/// `Pending` only when the whole checkout is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
}

impl PaymentStatus {
    pub fn is_settled(self) -> bool {
        matches!(self, PaymentStatus::Completed | PaymentStatus::Failed)
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "pending"),
            PaymentStatus::Processing => write!(f, "processing"),
            PaymentStatus::Completed => write!(f, "completed"),
            PaymentStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Emitted by the payment driver whenever an order changes payment status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentEvent {
    pub order_id: Uuid,
    pub currency: CurrencyKey,
    pub status: PaymentStatus,
    /// Set on `Completed`.
    pub tx_hash: Option<String>,
    /// Set on `Failed`.
    pub error: Option<String>,
}

impl PaymentEvent {
    pub fn processing(order_id: Uuid, currency: CurrencyKey) -> Self {
        Self {
            order_id,
            currency,
            status: PaymentStatus::Processing,
            tx_hash: None,
            error: None,
        }
    }

    pub fn completed(order_id: Uuid, currency: CurrencyKey, tx_hash: String) -> Self {
        Self {
            order_id,
            currency,
            status: PaymentStatus::Completed,
            tx_hash: Some(tx_hash),
            error: None,
        }
    }

    pub fn failed(order_id: Uuid, currency: CurrencyKey, error: String) -> Self {
        Self {
            order_id,
            currency,
            status: PaymentStatus::Failed,
            tx_hash: None,
            error: Some(error),
        }
    }
}
