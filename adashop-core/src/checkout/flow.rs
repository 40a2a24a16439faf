use std::collections::HashSet;

use adashop_sdk::objects::CreateOrdersRequest;

use super::{
    CheckoutContext, CheckoutError, CheckoutNotice, CheckoutStep, CurrencyPaymentStatus,
    RecoveryAction, StockCheck,
};
use crate::backend::ShopBackend;
use crate::cart::CartService;
use crate::config::CheckoutConfig;
use crate::currency::{ADA_DECIMALS, ADA_SYMBOL, CurrencyKey};
use crate::events::{PaymentEvent, PaymentStatus, payment_event_channel};
use crate::model::{Order, OrderStatus, ShippingInfo};
use crate::payment::{OrderPayment, PaymentDriver, Wallet};
use crate::reconcile::{Reconciler, ReconciliationReport};
use crate::service::validate_shipping_info;
use crate::stock::{StockGateway, StockValidation};

/// Drives one checkout session from cart review to confirmation.
pub struct CheckoutFlow<B> {
    backend: B,
    gateway: StockGateway<B>,
    reconciler: Reconciler<B>,
    cart: CartService,
    driver: PaymentDriver,
    config: CheckoutConfig,
    context: CheckoutContext,
}

impl<B: ShopBackend + Clone> CheckoutFlow<B> {
    pub fn new(backend: B, cart: CartService, driver: PaymentDriver, config: CheckoutConfig) -> Self {
        Self {
            gateway: StockGateway::new(backend.clone()),
            reconciler: Reconciler::new(backend.clone()),
            backend,
            cart,
            driver,
            config,
            context: CheckoutContext::default(),
        }
    }

    pub fn context(&self) -> &CheckoutContext {
        &self.context
    }

    pub fn cart(&self) -> &CartService {
        &self.cart
    }

    /// Log `error` and put it in front of the shopper.
    fn record(&mut self, error: CheckoutError) -> CheckoutError {
        if error.is_unexpected() {
            tracing::error!(step = %self.context.current_step, error = %error, "Checkout failed unexpectedly");
        } else {
            tracing::warn!(step = %self.context.current_step, error = %error, "Checkout step refused");
        }
        self.context.error = Some(CheckoutNotice::from(&error));
        error
    }

    fn ensure_step(&mut self, expected: CheckoutStep, to: CheckoutStep) -> Result<(), CheckoutError> {
        if self.context.current_step == expected {
            return Ok(());
        }
        Err(self.record(CheckoutError::InvalidStep {
            from: self.context.current_step,
            to,
        }))
    }

    fn enter(&mut self, step: CheckoutStep) {
        tracing::debug!(from = %self.context.current_step, to = %step, "Checkout step changed");
        self.context.current_step = step;
    }

    /// Orders of this attempt stay on the backend as they are; the session
    /// just stops tracking them as its own.
    fn abandon_orders(&mut self) {
        let orders = std::mem::take(&mut self.context.created_orders);
        if !orders.is_empty() {
            tracing::info!(orders = orders.len(), "Abandoning checkout orders");
        }
        self.context.orphaned_orders.extend(orders);
    }

    /// Compare every cart line with current stock. Quantities are left
    /// alone; only the stock recorded in each line's snapshot is refreshed.
    pub async fn check_stock(&mut self) -> Vec<StockValidation> {
        self.context.stock_check = StockCheck::InFlight;
        let items = self.cart.items().await;
        let validations = self.gateway.validate_cart_stock(&items).await;

        for (item, validation) in items.iter().zip(&validations) {
            if item.product.stock != validation.current_stock
                && let Err(e) = self
                    .cart
                    .update_product_stock(item.product_id, validation.current_stock)
                    .await
            {
                tracing::warn!(product_id = %item.product_id, error = %e, "Failed to refresh cart stock");
            }
        }

        let issues: Vec<StockValidation> = validations
            .into_iter()
            .filter(StockValidation::has_stock_issue)
            .collect();
        self.context.stock_check = if issues.is_empty() {
            StockCheck::Passed
        } else {
            StockCheck::Issues(issues.clone())
        };
        issues
    }

    /// Leave the review step once the cart is non-empty and fully in stock.
    pub async fn proceed_from_review(&mut self) -> Result<CheckoutStep, CheckoutError> {
        let next = if self.config.enable_shipping {
            CheckoutStep::Shipping
        } else {
            CheckoutStep::Payment
        };
        self.ensure_step(CheckoutStep::Review, next)?;
        if self.context.stock_check == StockCheck::InFlight {
            return Err(self.record(CheckoutError::StockCheckPending));
        }
        if self.cart.is_empty().await {
            return Err(self.record(CheckoutError::EmptyCart));
        }
        let issues = self.check_stock().await;
        if !issues.is_empty() {
            return Err(self.record(CheckoutError::StockIssues(issues)));
        }
        self.context.error = None;
        self.enter(next);
        Ok(next)
    }

    pub fn set_shipping_info(&mut self, info: ShippingInfo) {
        self.context.shipping_info = info;
    }

    pub fn proceed_to_payment(&mut self) -> Result<(), CheckoutError> {
        self.ensure_step(CheckoutStep::Shipping, CheckoutStep::Payment)?;
        if let Err(reason) = validate_shipping_info(&self.context.shipping_info) {
            return Err(self.record(CheckoutError::ShippingIncomplete(reason)));
        }
        self.context.error = None;
        self.enter(CheckoutStep::Payment);
        Ok(())
    }

    /// Step back one screen. Returning to review releases the session's
    /// orders, since the cart may change there.
    pub fn back(&mut self) -> Result<CheckoutStep, CheckoutError> {
        let previous = match self.context.current_step {
            CheckoutStep::Shipping => CheckoutStep::Review,
            CheckoutStep::Payment if self.config.enable_shipping => CheckoutStep::Shipping,
            CheckoutStep::Payment => CheckoutStep::Review,
            from @ (CheckoutStep::Review | CheckoutStep::Confirmation) => {
                return Err(self.record(CheckoutError::InvalidStep {
                    from,
                    to: CheckoutStep::Review,
                }));
            }
        };
        if previous == CheckoutStep::Review {
            self.abandon_orders();
            self.context.payment_statuses.clear();
            self.context.stock_check = StockCheck::NotRun;
        }
        self.context.error = None;
        self.enter(previous);
        Ok(previous)
    }

    /// Creates the session's orders as soon as a wallet is available.
    pub async fn connect_wallet(&mut self, wallet: &dyn Wallet) -> Result<Vec<Order>, CheckoutError> {
        self.context.error = None;
        self.create_orders(wallet).await
    }

    pub fn disconnect_wallet(&mut self) {
        self.context.payment_statuses.clear();
        self.context.error = None;
        self.abandon_orders();
    }

    /// Reserve the cart's stock and create one order per currency group.
    ///
    /// Once orders exist for this session they are returned as they are;
    /// nothing is created twice.
    #[tracing::instrument(skip_all)]
    pub async fn create_orders(&mut self, wallet: &dyn Wallet) -> Result<Vec<Order>, CheckoutError> {
        if !self.context.created_orders.is_empty() {
            return Ok(self.context.created_orders.clone());
        }
        if self.cart.is_empty().await {
            return Err(self.record(CheckoutError::EmptyCart));
        }

        let lines = self.cart.stock_lines().await;
        let report = match self
            .gateway
            .validate_and_reserve(&lines, self.config.reservation_minutes, self.context.reservation_id)
            .await
        {
            Ok(report) => report,
            Err(e) => return Err(self.record(e.into())),
        };
        self.context.reservation_id = Some(report.reservation_id);

        let wallet_address = match wallet.change_address().await {
            Ok(address) => address,
            Err(e) => return Err(self.record(e.into())),
        };
        let request = CreateOrdersRequest {
            wallet_address,
            orders: self.cart.totals().await.to_order_groups(),
            shipping_info: self
                .config
                .enable_shipping
                .then(|| self.context.shipping_info.clone()),
            reservation_id: Some(report.reservation_id),
        };

        match self.backend.create_orders(request).await {
            Ok(orders) => {
                tracing::info!(orders = orders.len(), "Checkout orders created");
                self.context.created_orders = orders.clone();
                Ok(orders)
            }
            Err(failure) => {
                self.context.orphaned_orders.extend(failure.created);
                Err(self.record(failure.error.into()))
            }
        }
    }

    /// Pay every pending order of the session and record the outcome.
    ///
    /// Completing all payments moves to confirmation and empties the cart.
    /// Otherwise the flow stays on the payment step and the lines whose
    /// currency was already paid leave the cart, so a retry only charges
    /// what is still owed.
    #[tracing::instrument(skip_all)]
    pub async fn pay(&mut self, wallet: &dyn Wallet) -> Result<ReconciliationReport, CheckoutError> {
        self.ensure_step(CheckoutStep::Payment, CheckoutStep::Confirmation)?;
        self.context.error = None;
        let orders = self.create_orders(wallet).await?;

        let pending: Vec<Order> = orders
            .into_iter()
            .filter(|o| o.status == OrderStatus::Pending)
            .collect();
        if pending.is_empty() {
            return Err(self.record(CheckoutError::NothingToPay));
        }
        let mut payments = Vec::with_capacity(pending.len());
        for order in &pending {
            match OrderPayment::from_order(order) {
                Some(payment) => payments.push(payment),
                None => {
                    return Err(self.record(CheckoutError::MissingCurrency { order_id: order.id }));
                }
            }
        }
        self.context.payment_statuses = pending.iter().map(pending_status).collect();

        let (tx, mut rx) = payment_event_channel();
        let driver = &self.driver;
        let pay = async move {
            let result = driver.pay_all(wallet, &payments, Some(&tx)).await;
            drop(tx);
            result
        };
        let statuses = &mut self.context.payment_statuses;
        let track = async {
            while let Some(event) = rx.recv().await {
                apply_event(statuses, &event);
            }
        };
        let (result, ()) = tokio::join!(pay, track);

        let report = self.reconciler.reconcile(&result, &pending).await;
        for order in &report.final_orders {
            if let Some(local) = self
                .context
                .created_orders
                .iter_mut()
                .find(|o| o.id == order.id)
            {
                *local = order.clone();
            }
        }

        if report.all_completed {
            self.context.error = report.user_message.clone().map(|message| CheckoutNotice {
                message,
                recovery: RecoveryAction::RefreshPage,
            });
            if let Err(e) = self.cart.clear().await {
                tracing::warn!(error = %e, "Failed to clear cart after payment");
            }
            self.enter(CheckoutStep::Confirmation);
        } else {
            let paid: HashSet<CurrencyKey> =
                result.completed_orders.iter().map(|c| c.currency_key).collect();
            self.remove_paid_lines(&paid).await;
            self.context.error = report.user_message.clone().map(|message| CheckoutNotice {
                message,
                recovery: RecoveryAction::TryAgain,
            });
        }
        Ok(report)
    }

    async fn remove_paid_lines(&self, paid: &HashSet<CurrencyKey>) {
        if paid.is_empty() {
            return;
        }
        for item in self.cart.items().await {
            if paid.contains(&item.currency_key())
                && let Err(e) = self.cart.remove_item(item.product_id).await
            {
                tracing::warn!(product_id = %item.product_id, error = %e, "Failed to drop paid cart line");
            }
        }
    }

    /// Start over from review. Orders already created stay on the backend.
    pub fn retry(&mut self) {
        self.context.error = None;
        self.context.payment_statuses.clear();
        self.abandon_orders();
        self.context.stock_check = StockCheck::NotRun;
        self.enter(CheckoutStep::Review);
    }
}

fn pending_status(order: &Order) -> CurrencyPaymentStatus {
    let token = order.token.as_ref();
    CurrencyPaymentStatus {
        order_id: order.id,
        currency_key: order.currency_key(),
        symbol: token.map_or_else(|| ADA_SYMBOL.to_string(), |t| t.symbol()),
        decimals: token.map_or(ADA_DECIMALS, |t| t.decimals),
        policy_id: token.map(|t| t.policy_id.clone()),
        asset_name: token.map(|t| t.asset_name.clone()),
        amount: order.total_amount,
        status: PaymentStatus::Pending,
        tx_hash: None,
        error: None,
    }
}

fn apply_event(statuses: &mut [CurrencyPaymentStatus], event: &PaymentEvent) {
    if let Some(status) = statuses.iter_mut().find(|s| s.order_id == event.order_id) {
        status.status = event.status;
        if event.tx_hash.is_some() {
            status.tx_hash = event.tx_hash.clone();
        }
        if event.error.is_some() {
            status.error = event.error.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::cart::{MemoryStorage, ProductSnapshot};
    use crate::model::{Product, SupportedToken};
    use crate::payment::PaymentError;
    use crate::service::{OrderCreationError, ShopService};
    use crate::store::memory::MemoryStore;
    use crate::testing::{self, FakeChain, FakeWallet, Fixture, WALLET};

    type Flow = CheckoutFlow<Arc<ShopService<Arc<MemoryStore>>>>;

    fn snapshot(product: &Product, token: Option<&SupportedToken>) -> ProductSnapshot {
        ProductSnapshot {
            id: product.id,
            name: product.name.clone(),
            price: product.price,
            token_id: product.token_id,
            stock: product.stock,
            supported_token: token.map(|t| t.descriptor.clone()),
        }
    }

    async fn flow(fx: &Fixture, chain: &Arc<FakeChain>, config: CheckoutConfig) -> Flow {
        let cart = CartService::open(Arc::new(MemoryStorage::new()), None).unwrap();
        cart.add_item(snapshot(&fx.ada_product, None), 1).await.unwrap();
        cart.add_item(snapshot(&fx.token_a_product, Some(&fx.token_a)), 2)
            .await
            .unwrap();
        CheckoutFlow::new(fx.service.clone(), cart, chain.driver(), config)
    }

    #[tokio::test]
    async fn test_paid_checkout_reaches_confirmation() {
        let fx = Fixture::new();
        let chain = FakeChain::new();
        let mut flow = flow(&fx, &chain, testing::config()).await;
        let wallet = FakeWallet::new();

        assert_eq!(flow.proceed_from_review().await.unwrap(), CheckoutStep::Payment);
        let report = flow.pay(&wallet).await.unwrap();

        assert!(report.all_completed);
        let ctx = flow.context();
        assert_eq!(ctx.current_step, CheckoutStep::Confirmation);
        assert!(ctx.error.is_none());
        assert_eq!(ctx.created_orders.len(), 2);
        for order in &ctx.created_orders {
            assert_eq!(order.status, OrderStatus::Paid);
            assert!(order.cardano_tx_hash.is_some());
        }
        assert!(
            ctx.payment_statuses
                .iter()
                .all(|s| s.status == PaymentStatus::Completed && s.tx_hash.is_some())
        );
        let token_status = ctx
            .payment_statuses
            .iter()
            .find(|s| !s.currency_key.is_ada())
            .unwrap();
        assert_eq!(token_status.symbol, "HOSKY");
        assert_eq!(token_status.amount, 1_000);
        assert!(flow.cart().is_empty().await);
        assert_eq!(fx.store.product(fx.token_a_product.id).unwrap().stock, 8);
    }

    #[tokio::test]
    async fn test_orders_are_created_once_per_session() {
        let fx = Fixture::new();
        let chain = FakeChain::new();
        let mut flow = flow(&fx, &chain, testing::config()).await;
        let wallet = FakeWallet::new();

        let first = flow.connect_wallet(&wallet).await.unwrap();
        let second = flow.create_orders(&wallet).await.unwrap();

        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
        assert_eq!(fx.store.order_count(), 2);
        assert!(first.iter().all(|o| o.wallet_address == WALLET));
        assert!(flow.context().reservation_id.is_some());
    }

    #[tokio::test]
    async fn test_partial_payment_stays_on_payment_step() {
        let fx = Fixture::new();
        let chain = FakeChain::new();
        chain.fail_for(fx.token_a.descriptor.currency(), PaymentError::SignatureRejected);
        let mut flow = flow(&fx, &chain, testing::config()).await;
        let wallet = FakeWallet::new();

        flow.proceed_from_review().await.unwrap();
        let report = flow.pay(&wallet).await.unwrap();

        assert!(!report.all_completed);
        let ctx = flow.context();
        assert_eq!(ctx.current_step, CheckoutStep::Payment);
        let notice = ctx.error.as_ref().unwrap();
        assert_eq!(
            notice.message,
            "Payment partially completed. 1 of 2 payments succeeded; failed: User declined to sign the transaction"
        );
        assert_eq!(notice.recovery, RecoveryAction::TryAgain);
        let failed = ctx
            .payment_statuses
            .iter()
            .find(|s| s.status == PaymentStatus::Failed)
            .unwrap();
        assert!(!failed.currency_key.is_ada());

        // The ADA line was paid and must not be charged again.
        assert!(!flow.cart().has_item(fx.ada_product.id).await);
        assert!(flow.cart().has_item(fx.token_a_product.id).await);

        flow.retry();
        let ctx = flow.context();
        assert_eq!(ctx.current_step, CheckoutStep::Review);
        assert!(ctx.created_orders.is_empty());
        assert!(ctx.payment_statuses.is_empty());
        assert!(ctx.error.is_none());
        assert_eq!(ctx.orphaned_orders.len(), 2);
    }

    #[tokio::test]
    async fn test_stock_issues_block_review() {
        let fx = Fixture::new();
        let chain = FakeChain::new();
        let mut flow = flow(&fx, &chain, testing::config()).await;
        fx.store.set_stock(fx.token_a_product.id, 1);

        let err = flow.proceed_from_review().await.unwrap_err();

        assert!(matches!(err, CheckoutError::StockIssues(ref issues) if issues.len() == 1));
        assert_eq!(err.recovery(), RecoveryAction::AdjustCart);
        let ctx = flow.context();
        assert_eq!(ctx.current_step, CheckoutStep::Review);
        assert!(matches!(
            &ctx.stock_check,
            StockCheck::Issues(issues) if issues[0].current_stock == 1 && issues[0].requested == 2
        ));
        let line = flow
            .cart()
            .items()
            .await
            .into_iter()
            .find(|i| i.product_id == fx.token_a_product.id)
            .unwrap();
        assert_eq!(line.quantity, 2);
        assert_eq!(line.product.stock, 1);
    }

    #[tokio::test]
    async fn test_shipping_step_requires_address() {
        let fx = Fixture::new();
        let chain = FakeChain::new();
        let config = CheckoutConfig {
            enable_shipping: true,
            ..testing::config()
        };
        let mut flow = flow(&fx, &chain, config).await;
        let wallet = FakeWallet::new();

        assert_eq!(flow.proceed_from_review().await.unwrap(), CheckoutStep::Shipping);
        let err = flow.proceed_to_payment().unwrap_err();
        assert!(matches!(err, CheckoutError::ShippingIncomplete(_)));
        assert_eq!(
            flow.context().error.as_ref().unwrap().recovery,
            RecoveryAction::CompleteShipping
        );

        // The backend also needs postal code, country and a usable email.
        for info in [
            ShippingInfo {
                postal_code: String::new(),
                ..testing::shipping()
            },
            ShippingInfo {
                country: " ".to_string(),
                ..testing::shipping()
            },
            ShippingInfo {
                email: "ada@localhost".to_string(),
                ..testing::shipping()
            },
        ] {
            flow.set_shipping_info(info);
            let err = flow.proceed_to_payment().unwrap_err();
            assert!(matches!(err, CheckoutError::ShippingIncomplete(_)));
            assert_eq!(flow.context().current_step, CheckoutStep::Shipping);
        }

        flow.set_shipping_info(testing::shipping());
        flow.proceed_to_payment().unwrap();
        assert_eq!(flow.back().unwrap(), CheckoutStep::Shipping);
        flow.proceed_to_payment().unwrap();
        flow.pay(&wallet).await.unwrap();

        assert_eq!(flow.context().current_step, CheckoutStep::Confirmation);
        assert_eq!(fx.store.shipping_info(WALLET), Some(testing::shipping()));
    }

    #[tokio::test]
    async fn test_stale_price_asks_for_refresh() {
        let fx = Fixture::new();
        let chain = FakeChain::new();
        let mut flow = flow(&fx, &chain, testing::config()).await;
        let wallet = FakeWallet::new();
        flow.proceed_from_review().await.unwrap();
        fx.store.set_price(fx.ada_product.id, 30_000_000);

        let err = flow.pay(&wallet).await.unwrap_err();

        assert!(matches!(
            err,
            CheckoutError::OrderCreation(OrderCreationError::PriceMismatch { .. })
        ));
        let notice = flow.context().error.clone().unwrap();
        assert_eq!(notice.recovery, RecoveryAction::RefreshPage);
        assert!(notice.message.starts_with("Price mismatch for product Hoodie."));
        assert_eq!(flow.context().current_step, CheckoutStep::Payment);
        assert!(flow.context().created_orders.is_empty());
        assert_eq!(fx.store.order_count(), 0);
        assert!(chain.built().is_empty());
    }

    #[tokio::test]
    async fn test_paying_from_review_is_refused() {
        let fx = Fixture::new();
        let chain = FakeChain::new();
        let mut flow = flow(&fx, &chain, testing::config()).await;

        let err = flow.pay(&FakeWallet::new()).await.unwrap_err();

        assert!(matches!(
            err,
            CheckoutError::InvalidStep {
                from: CheckoutStep::Review,
                to: CheckoutStep::Confirmation
            }
        ));
        assert_eq!(fx.store.order_count(), 0);
    }
}
