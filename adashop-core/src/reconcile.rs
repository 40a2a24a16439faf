//! Turning payment outcomes into order statuses.
//!
//! Completed payments become `paid` with their hash, failed ones
//! `payment_failed` with their error. A status write that fails does not
//! undo anything: the transaction is already on its way, so the order is
//! kept as paid locally and the failure is reported separately.

use uuid::Uuid;

use crate::backend::ShopBackend;
use crate::model::{Order, OrderStatus, StatusUpdate};
use crate::payment::MultiCurrencyPaymentResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistenceFailure {
    pub order_id: Uuid,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationReport {
    /// The orders passed in, updated where the backend accepted the change.
    pub final_orders: Vec<Order>,
    /// `None` when every payment went through and was recorded.
    pub user_message: Option<String>,
    pub all_completed: bool,
    pub persistence_failures: Vec<PersistenceFailure>,
}

pub struct Reconciler<B> {
    backend: B,
}

impl<B: ShopBackend> Reconciler<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    #[tracing::instrument(skip_all, fields(
        completed = result.completed_orders.len(),
        failed = result.failed_orders.len(),
    ))]
    pub async fn reconcile(
        &self,
        result: &MultiCurrencyPaymentResult,
        orders: &[Order],
    ) -> ReconciliationReport {
        let mut final_orders = orders.to_vec();
        let mut persistence_failures = Vec::new();

        let updates = result
            .completed_orders
            .iter()
            .map(|c| StatusUpdate {
                order_id: c.order_id,
                status: OrderStatus::Paid,
                tx_hash: Some(c.tx_hash.clone()),
                error: None,
            })
            .chain(result.failed_orders.iter().map(|f| StatusUpdate {
                order_id: f.order_id,
                status: OrderStatus::PaymentFailed,
                tx_hash: None,
                error: Some(f.error.to_string()),
            }));

        for update in updates {
            let position = final_orders.iter().position(|o| o.id == update.order_id);
            match self.backend.update_order_status(update.clone()).await {
                Ok(order) => match position {
                    Some(i) => final_orders[i] = order,
                    None => final_orders.push(order),
                },
                Err(e) => {
                    tracing::error!(
                        order_id = %update.order_id,
                        status = %update.status,
                        error = %e,
                        "Failed to record payment outcome"
                    );
                    if let Some(i) = position {
                        let local = &mut final_orders[i];
                        local.status = update.status;
                        if update.tx_hash.is_some() {
                            local.cardano_tx_hash = update.tx_hash.clone();
                        }
                        if update.error.is_some() {
                            local.payment_error = update.error.clone();
                        }
                    }
                    persistence_failures.push(PersistenceFailure {
                        order_id: update.order_id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        let user_message = user_message(result, &persistence_failures);
        ReconciliationReport {
            final_orders,
            user_message,
            all_completed: result.all_completed,
            persistence_failures,
        }
    }
}

fn user_message(
    result: &MultiCurrencyPaymentResult,
    persistence_failures: &[PersistenceFailure],
) -> Option<String> {
    if !result.all_completed {
        let reason = result
            .first_failure()
            .map_or_else(|| "Unknown error".to_string(), |f| f.error.to_string());
        return Some(format!(
            "Payment partially completed. {} of {} payments succeeded; failed: {}",
            result.completed_orders.len(),
            result.total_orders,
            reason
        ));
    }
    if !persistence_failures.is_empty() {
        return Some(format!(
            "Your payment went through, but {} order(s) could not be updated yet. \
             Keep your transaction hash for reference; no need to pay again.",
            persistence_failures.len()
        ));
    }
    None
}
