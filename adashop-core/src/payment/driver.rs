use std::sync::Arc;
use std::time::Duration;

use itertools::Itertools;
use uuid::Uuid;

use super::{
    PaymentError, PaymentIntent, SignedTx, TransactionBuilder, TransactionSubmitter, Wallet,
};
use crate::currency::{Currency, CurrencyKey};
use crate::events::{PaymentEvent, PaymentEventSender};
use crate::model::Order;

/// One order as the driver sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderPayment {
    pub order_id: Uuid,
    pub amount: u64,
    pub currency: Currency,
    pub currency_key: CurrencyKey,
}

impl OrderPayment {
    /// `None` for a token order that came back without token metadata.
    pub fn from_order(order: &Order) -> Option<Self> {
        Some(Self {
            order_id: order.id,
            amount: order.total_amount,
            currency: order.currency()?,
            currency_key: order.currency_key(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedPayment {
    pub order_id: Uuid,
    pub tx_hash: String,
    pub currency: Currency,
    pub currency_key: CurrencyKey,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedPayment {
    pub order_id: Uuid,
    pub error: PaymentError,
    pub currency: Currency,
    pub currency_key: CurrencyKey,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiCurrencyPaymentResult {
    /// No payment failed. Still true when nothing was attempted.
    pub success: bool,
    pub completed_orders: Vec<CompletedPayment>,
    pub failed_orders: Vec<FailedPayment>,
    /// Every order handed to the driver was paid.
    pub all_completed: bool,
    pub total_orders: usize,
}

impl MultiCurrencyPaymentResult {
    fn new(
        completed_orders: Vec<CompletedPayment>,
        failed_orders: Vec<FailedPayment>,
        total_orders: usize,
    ) -> Self {
        Self {
            success: failed_orders.is_empty(),
            all_completed: completed_orders.len() == total_orders,
            completed_orders,
            failed_orders,
            total_orders,
        }
    }

    pub fn attempted(&self) -> usize {
        self.completed_orders.len() + self.failed_orders.len()
    }

    pub fn first_failure(&self) -> Option<&FailedPayment> {
        self.failed_orders.first()
    }
}

/// Pays orders one at a time from a single wallet session.
#[derive(Clone)]
pub struct PaymentDriver {
    builder: Arc<dyn TransactionBuilder>,
    submitter: Arc<dyn TransactionSubmitter>,
    merchant_address: String,
    timeout: Option<Duration>,
}

impl PaymentDriver {
    pub fn new(
        builder: Arc<dyn TransactionBuilder>,
        submitter: Arc<dyn TransactionSubmitter>,
        merchant_address: impl Into<String>,
    ) -> Self {
        Self {
            builder,
            submitter,
            merchant_address: merchant_address.into(),
            timeout: None,
        }
    }

    /// Give up on a single payment after `timeout`, reported as
    /// [`PaymentError::Timeout`]. Off by default: the wallet prompt is
    /// interactive and bounded by the wallet itself.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build, sign and submit one payment, returning its transaction hash.
    pub async fn pay_one(
        &self,
        wallet: &dyn Wallet,
        payment: &OrderPayment,
    ) -> Result<String, PaymentError> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.execute(wallet, payment))
                .await
                .map_err(|_| PaymentError::Timeout)?,
            None => self.execute(wallet, payment).await,
        }
    }

    async fn execute(
        &self,
        wallet: &dyn Wallet,
        payment: &OrderPayment,
    ) -> Result<String, PaymentError> {
        let buyer = wallet.change_address().await?;
        let intent = PaymentIntent {
            buyer,
            merchant: self.merchant_address.clone(),
            amount: payment.amount,
            currency: payment.currency.clone(),
        };
        let unsigned = self.builder.build_payment(&intent).await?;
        tracing::debug!(order_id = %payment.order_id, tx_hash = %unsigned.hash, "Transaction built");

        let witness_set = wallet.sign_tx(&unsigned.cbor_hex, true).await?;
        let submitted = self
            .submitter
            .submit(SignedTx {
                tx_cbor_hex: unsigned.cbor_hex,
                witness_set_cbor_hex: witness_set,
                tx_hash_hex: unsigned.hash.clone(),
            })
            .await?;
        Ok(submitted.unwrap_or(unsigned.hash))
    }

    /// Pay `orders` sequentially, ADA orders first, stopping at the first
    /// failure. Later orders are never attempted once one fails.
    ///
    /// Progress is reported on `events` as each order starts and settles.
    #[tracing::instrument(skip_all, fields(orders = orders.len()))]
    pub async fn pay_all(
        &self,
        wallet: &dyn Wallet,
        orders: &[OrderPayment],
        events: Option<&PaymentEventSender>,
    ) -> MultiCurrencyPaymentResult {
        let mut completed = Vec::new();
        let mut failed = Vec::new();

        for payment in orders.iter().sorted_by_key(|p| !p.currency.is_ada()) {
            emit(
                events,
                PaymentEvent::processing(payment.order_id, payment.currency_key),
            )
            .await;

            match self.pay_one(wallet, payment).await {
                Ok(tx_hash) => {
                    tracing::info!(
                        order_id = %payment.order_id,
                        currency = %payment.currency_key,
                        %tx_hash,
                        "Payment submitted"
                    );
                    emit(
                        events,
                        PaymentEvent::completed(
                            payment.order_id,
                            payment.currency_key,
                            tx_hash.clone(),
                        ),
                    )
                    .await;
                    completed.push(CompletedPayment {
                        order_id: payment.order_id,
                        tx_hash,
                        currency: payment.currency.clone(),
                        currency_key: payment.currency_key,
                    });
                }
                Err(error) => {
                    tracing::warn!(
                        order_id = %payment.order_id,
                        currency = %payment.currency_key,
                        timeout = error.is_timeout(),
                        error = %error,
                        "Payment failed, skipping remaining orders"
                    );
                    emit(
                        events,
                        PaymentEvent::failed(
                            payment.order_id,
                            payment.currency_key,
                            error.to_string(),
                        ),
                    )
                    .await;
                    failed.push(FailedPayment {
                        order_id: payment.order_id,
                        error,
                        currency: payment.currency.clone(),
                        currency_key: payment.currency_key,
                    });
                    break;
                }
            }
        }

        MultiCurrencyPaymentResult::new(completed, failed, orders.len())
    }
}

async fn emit(events: Option<&PaymentEventSender>, event: PaymentEvent) {
    if let Some(tx) = events {
        // A dropped receiver only means nobody is watching progress.
        let _ = tx.send(event).await;
    }
}

#[cfg(test)]
mod tests {
    use compact_str::CompactString;

    use super::*;
    use crate::events::{PaymentStatus, payment_event_channel};
    use crate::testing::{FakeChain, FakeWallet, MERCHANT, WALLET};

    fn token(asset: &str) -> Currency {
        Currency::Token {
            policy_id: CompactString::from("5c1c91b1d1a5e3a8b7c4d0e2f3a4b5c6d7e8f9a0b1c2d3e4f5a6b7c8"),
            asset_name: CompactString::from(asset),
        }
    }

    fn payment(amount: u64, currency: Currency) -> OrderPayment {
        let currency_key = if currency.is_ada() {
            CurrencyKey::Ada
        } else {
            CurrencyKey::Token(Uuid::new_v4())
        };
        OrderPayment {
            order_id: Uuid::new_v4(),
            amount,
            currency,
            currency_key,
        }
    }

    #[tokio::test]
    async fn test_stops_at_first_failure() {
        let chain = FakeChain::new();
        let wallet = FakeWallet::new();
        let ada = payment(100, Currency::Ada);
        let token_a = payment(50, token("41"));
        let token_b = payment(30, token("42"));
        chain.fail_for(
            token_a.currency.clone(),
            PaymentError::Submission("bad inputs".to_string()),
        );

        let result = chain
            .driver()
            .pay_all(&wallet, &[ada.clone(), token_a.clone(), token_b.clone()], None)
            .await;

        assert!(!result.success);
        assert!(!result.all_completed);
        assert_eq!(result.attempted(), 2);
        assert_eq!(result.completed_orders.len(), 1);
        assert_eq!(result.completed_orders[0].order_id, ada.order_id);
        assert_eq!(result.failed_orders.len(), 1);
        assert_eq!(result.failed_orders[0].order_id, token_a.order_id);
        assert!(chain.built().iter().all(|i| i.currency != token_b.currency));
    }

    #[tokio::test]
    async fn test_ada_is_paid_first_and_order_is_otherwise_stable() {
        let chain = FakeChain::new();
        let wallet = FakeWallet::new();
        let orders = [
            payment(1, token("41")),
            payment(2, Currency::Ada),
            payment(3, token("42")),
        ];

        let result = chain.driver().pay_all(&wallet, &orders, None).await;

        assert!(result.success);
        assert!(result.all_completed);
        let amounts: Vec<u64> = chain.built().iter().map(|i| i.amount).collect();
        assert_eq!(amounts, vec![2, 1, 3]);
        let intent = &chain.built()[0];
        assert_eq!(intent.buyer, WALLET);
        assert_eq!(intent.merchant, MERCHANT);
    }

    #[tokio::test]
    async fn test_progress_events() {
        let chain = FakeChain::new();
        let wallet = FakeWallet::new();
        wallet.decline(true);
        let order = payment(5, Currency::Ada);
        let (tx, mut rx) = payment_event_channel();

        let result = chain.driver().pay_all(&wallet, &[order.clone()], Some(&tx)).await;
        drop(tx);

        assert_eq!(
            result.failed_orders[0].error,
            PaymentError::SignatureRejected
        );
        let first = rx.recv().await.unwrap();
        assert_eq!(first.status, PaymentStatus::Processing);
        let second = rx.recv().await.unwrap();
        assert_eq!(second.status, PaymentStatus::Failed);
        assert_eq!(
            second.error.as_deref(),
            Some("User declined to sign the transaction")
        );
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_built_hash_stands_when_node_echoes_none() {
        let chain = FakeChain::new();
        chain.silent_submit();
        let wallet = FakeWallet::new();

        let result = chain
            .driver()
            .pay_all(&wallet, &[payment(7, Currency::Ada)], None)
            .await;

        let submitted = chain.submitted();
        assert_eq!(submitted.len(), 1);
        assert_eq!(result.completed_orders[0].tx_hash, submitted[0].tx_hash_hex);
        assert_eq!(wallet.signed(), vec![submitted[0].tx_cbor_hex.clone()]);
    }

    #[tokio::test]
    async fn test_timeout_is_distinguished() {
        let chain = FakeChain::new();
        chain.fail_for(Currency::Ada, PaymentError::Timeout);
        let wallet = FakeWallet::new();

        let result = chain
            .driver()
            .pay_all(&wallet, &[payment(7, Currency::Ada)], None)
            .await;
        assert!(result.failed_orders[0].error.is_timeout());
        assert_eq!(result.failed_orders[0].error.to_string(), "Payment timeout");
    }

    #[tokio::test]
    async fn test_empty_input_is_complete() {
        let chain = FakeChain::new();
        let result = chain.driver().pay_all(&FakeWallet::new(), &[], None).await;
        assert!(result.success);
        assert!(result.all_completed);
        assert_eq!(result.total_orders, 0);
    }
}
