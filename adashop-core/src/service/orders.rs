use std::collections::HashMap;

use adashop_sdk::objects::{CreateOrdersRequest, OrderFailure};
use itertools::Itertools;
use time::OffsetDateTime;
use uuid::Uuid;

use super::ShopService;
use crate::backend::BackendError;
use crate::currency::{CurrencyKey, TokenDescriptor};
use crate::model::{
    NewOrder, NewOrderItem, Order, OrderGroupInput, OrderItem, Product, ShippingInfo,
    StatusUpdate, StockItemRequest,
};
use crate::stock::aggregate_lines;
use crate::store::{ConfirmOutcome, OrderStore, StatusChange, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum OrderCreationError {
    #[error("{0}")]
    Validation(String),
    #[error("Invalid shipping information: {0}")]
    ShippingInfo(String),
    #[error("Token {token_id} is not supported")]
    UnsupportedToken { token_id: Uuid },
    #[error("Token {token_id} is not active")]
    InactiveToken { token_id: Uuid },
    #[error("Product {product_id} not found")]
    ProductNotFound { product_id: Uuid },
    #[error("Product {product_id} is not sold in this order's currency")]
    CurrencyMismatch { product_id: Uuid },
    #[error(
        "Price mismatch for product {product_name}. Expected {expected}, got {got}. Please refresh and try again."
    )]
    PriceMismatch {
        product_id: Uuid,
        product_name: String,
        expected: u64,
        got: u64,
    },
    #[error(
        "Stock for product {product_id} changed since it was reserved. Available: {available}, Requested: {requested}"
    )]
    StockChanged {
        product_id: Uuid,
        available: u32,
        requested: u32,
    },
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl From<StoreError> for OrderCreationError {
    fn from(value: StoreError) -> Self {
        OrderCreationError::Backend(BackendError::Store(value))
    }
}

impl OrderCreationError {
    pub fn to_failure(&self) -> OrderFailure {
        match self {
            OrderCreationError::Validation(reason) => OrderFailure::Validation {
                reason: reason.clone(),
            },
            OrderCreationError::ShippingInfo(reason) => OrderFailure::ShippingInfo {
                reason: reason.clone(),
            },
            OrderCreationError::UnsupportedToken { token_id } => {
                OrderFailure::UnsupportedToken {
                    token_id: *token_id,
                }
            }
            OrderCreationError::InactiveToken { token_id } => OrderFailure::InactiveToken {
                token_id: *token_id,
            },
            OrderCreationError::ProductNotFound { product_id } => OrderFailure::ProductNotFound {
                product_id: *product_id,
            },
            OrderCreationError::CurrencyMismatch { product_id } => {
                OrderFailure::CurrencyMismatch {
                    product_id: *product_id,
                }
            }
            OrderCreationError::PriceMismatch {
                product_id,
                product_name,
                expected,
                got,
            } => OrderFailure::PriceMismatch {
                product_id: *product_id,
                product_name: product_name.clone(),
                expected: *expected,
                got: *got,
            },
            OrderCreationError::StockChanged {
                product_id,
                available,
                requested,
            } => OrderFailure::StockChanged {
                product_id: *product_id,
                available: *available,
                requested: *requested,
            },
            OrderCreationError::Backend(_) => OrderFailure::Persistence {
                reason: "Failed to create order".to_string(),
            },
        }
    }

    pub fn from_failure(failure: OrderFailure) -> Self {
        match failure {
            OrderFailure::Validation { reason } => OrderCreationError::Validation(reason),
            OrderFailure::ShippingInfo { reason } => OrderCreationError::ShippingInfo(reason),
            OrderFailure::UnsupportedToken { token_id } => {
                OrderCreationError::UnsupportedToken { token_id }
            }
            OrderFailure::InactiveToken { token_id } => {
                OrderCreationError::InactiveToken { token_id }
            }
            OrderFailure::ProductNotFound { product_id } => {
                OrderCreationError::ProductNotFound { product_id }
            }
            OrderFailure::CurrencyMismatch { product_id } => {
                OrderCreationError::CurrencyMismatch { product_id }
            }
            OrderFailure::PriceMismatch {
                product_id,
                product_name,
                expected,
                got,
            } => OrderCreationError::PriceMismatch {
                product_id,
                product_name,
                expected,
                got,
            },
            OrderFailure::StockChanged {
                product_id,
                available,
                requested,
            } => OrderCreationError::StockChanged {
                product_id,
                available,
                requested,
            },
            OrderFailure::Persistence { reason } => {
                OrderCreationError::Backend(BackendError::Rejected(reason))
            }
        }
    }
}

/// A create-orders call that stopped early.
///
/// `created` holds the orders fully created before the failing group, in
/// input order. It is empty whenever validation, the shipping upsert or the
/// token check failed.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct OrderCreationFailure {
    pub created: Vec<Order>,
    #[source]
    pub error: OrderCreationError,
}

impl From<OrderCreationError> for OrderCreationFailure {
    fn from(error: OrderCreationError) -> Self {
        Self {
            created: Vec::new(),
            error,
        }
    }
}

/// Every field except the phone number is required, and the email needs a
/// domain with a dot.
pub fn validate_shipping_info(info: &ShippingInfo) -> Result<(), String> {
    let required = [
        ("full name", &info.full_name),
        ("email", &info.email),
        ("address", &info.address),
        ("city", &info.city),
        ("postal code", &info.postal_code),
        ("country", &info.country),
    ];
    if let Some((field, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
        return Err(format!("{field} is required"));
    }
    let valid_email = info
        .email
        .trim()
        .split_once('@')
        .is_some_and(|(local, domain)| {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
        });
    if !valid_email {
        return Err("email is not valid".to_string());
    }
    Ok(())
}

fn validate_request(request: &CreateOrdersRequest) -> Result<(), OrderCreationError> {
    if request.wallet_address.trim().is_empty() {
        return Err(OrderCreationError::Validation(
            "Wallet address is required".to_string(),
        ));
    }
    if request.orders.is_empty() {
        return Err(OrderCreationError::Validation(
            "At least one order is required".to_string(),
        ));
    }
    for (index, group) in request.orders.iter().enumerate() {
        if group.items.is_empty() {
            return Err(OrderCreationError::Validation(format!(
                "Order {} has no items",
                index + 1
            )));
        }
        for item in &group.items {
            if item.quantity == 0 {
                return Err(OrderCreationError::Validation(format!(
                    "Quantity for product {} must be at least 1",
                    item.product_id
                )));
            }
            if item.price == 0 {
                return Err(OrderCreationError::Validation(format!(
                    "Price for product {} must be positive",
                    item.product_id
                )));
            }
        }
    }
    if let Some(info) = &request.shipping_info {
        validate_shipping_info(info).map_err(OrderCreationError::ShippingInfo)?;
    }
    Ok(())
}

impl<S: OrderStore> ShopService<S> {
    /// Create one `pending` order per currency group, in input order.
    ///
    /// Groups are created one after another; the first failing group stops
    /// the call and is rolled back, while the groups before it stay created.
    #[tracing::instrument(skip_all, fields(groups = request.orders.len()))]
    pub async fn create_orders(
        &self,
        request: CreateOrdersRequest,
    ) -> Result<Vec<Order>, OrderCreationFailure> {
        let mut created = Vec::with_capacity(request.orders.len());
        match self.create_orders_into(&request, &mut created).await {
            Ok(()) => {
                tracing::info!(
                    wallet = %request.wallet_address.trim(),
                    orders = created.len(),
                    "Orders created"
                );
                Ok(created)
            }
            Err(error) => {
                tracing::warn!(
                    error = %error,
                    created = created.len(),
                    "Order creation aborted"
                );
                Err(OrderCreationFailure { created, error })
            }
        }
    }

    async fn create_orders_into(
        &self,
        request: &CreateOrdersRequest,
        created: &mut Vec<Order>,
    ) -> Result<(), OrderCreationError> {
        validate_request(request)?;
        let wallet_address = request.wallet_address.trim();

        if let Some(info) = &request.shipping_info {
            self.store.upsert_shipping_info(wallet_address, info).await?;
        }

        let tokens = self.supported_tokens(request).await?;
        let expires_at = OffsetDateTime::now_utc() + self.order_hold;

        for group in &request.orders {
            let order = self
                .create_group_order(
                    wallet_address,
                    group,
                    &tokens,
                    request.reservation_id,
                    expires_at,
                )
                .await?;
            created.push(order);
        }
        Ok(())
    }

    /// Every distinct token across the groups must be known and active.
    async fn supported_tokens(
        &self,
        request: &CreateOrdersRequest,
    ) -> Result<HashMap<Uuid, TokenDescriptor>, OrderCreationError> {
        let token_ids: Vec<Uuid> = request
            .orders
            .iter()
            .filter_map(|g| g.token_id)
            .unique()
            .collect();
        let mut tokens = HashMap::with_capacity(token_ids.len());
        for token_id in token_ids {
            match self.store.supported_token(token_id).await? {
                None => return Err(OrderCreationError::UnsupportedToken { token_id }),
                Some(token) if !token.is_active => {
                    return Err(OrderCreationError::InactiveToken { token_id });
                }
                Some(token) => {
                    tokens.insert(token_id, token.descriptor);
                }
            }
        }
        Ok(tokens)
    }

    async fn create_group_order(
        &self,
        wallet_address: &str,
        group: &OrderGroupInput,
        tokens: &HashMap<Uuid, TokenDescriptor>,
        reservation_id: Option<Uuid>,
        expires_at: OffsetDateTime,
    ) -> Result<Order, OrderCreationError> {
        let ids: Vec<Uuid> = group.items.iter().map(|i| i.product_id).unique().collect();
        let products: HashMap<Uuid, Product> = self
            .store
            .products_by_ids(&ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        let mut total: u64 = 0;
        let mut items = Vec::with_capacity(group.items.len());
        for item in &group.items {
            let product = products
                .get(&item.product_id)
                .filter(|p| p.is_active)
                .ok_or(OrderCreationError::ProductNotFound {
                    product_id: item.product_id,
                })?;
            let item_currency_differs = item.token_id.is_some_and(|t| Some(t) != group.token_id);
            if product.token_id != group.token_id || item_currency_differs {
                return Err(OrderCreationError::CurrencyMismatch {
                    product_id: item.product_id,
                });
            }
            if product.price != item.price {
                return Err(OrderCreationError::PriceMismatch {
                    product_id: product.id,
                    product_name: product.name.clone(),
                    expected: product.price,
                    got: item.price,
                });
            }
            total = product
                .price
                .checked_mul(u64::from(item.quantity))
                .and_then(|line| total.checked_add(line))
                .ok_or_else(|| {
                    OrderCreationError::Validation("Order total is too large".to_string())
                })?;
            items.push(NewOrderItem {
                product_id: product.id,
                product_name: product.name.clone(),
                quantity: item.quantity,
                price: product.price,
                token_id: group.token_id,
            });
        }

        let mut order = self
            .store
            .insert_order(NewOrder {
                wallet_address: wallet_address.to_string(),
                total_amount: total,
                token_id: group.token_id,
            })
            .await?;
        tracing::debug!(
            order_id = %order.id,
            currency = %CurrencyKey::from_token_id(group.token_id),
            total,
            "Order inserted"
        );

        if let Err(e) = self.store.insert_order_items(order.id, &items).await {
            self.discard_order(order.id, "order item insert failed").await;
            return Err(e.into());
        }

        let lines: Vec<StockItemRequest> = items
            .iter()
            .map(|i| StockItemRequest {
                product_id: i.product_id,
                quantity: i.quantity,
            })
            .collect();
        match self
            .store
            .confirm_reservation(order.id, reservation_id, &aggregate_lines(&lines), expires_at)
            .await
        {
            Ok(ConfirmOutcome::Confirmed) => {}
            Ok(ConfirmOutcome::Insufficient {
                product_id,
                available,
                requested,
            }) => {
                self.discard_order(order.id, "stock no longer available")
                    .await;
                return Err(OrderCreationError::StockChanged {
                    product_id,
                    available,
                    requested,
                });
            }
            Err(e) => {
                self.discard_order(order.id, "reservation confirmation failed")
                    .await;
                return Err(e.into());
            }
        }

        order.items = items
            .into_iter()
            .map(|i| OrderItem {
                product_id: i.product_id,
                product_name: Some(i.product_name),
                quantity: i.quantity,
                price: i.price,
                token_id: i.token_id,
            })
            .collect();
        order.token = group.token_id.and_then(|id| tokens.get(&id).cloned());
        Ok(order)
    }

    /// Compensating delete for an order that could not be completed.
    async fn discard_order(&self, order_id: Uuid, reason: &str) {
        tracing::warn!(%order_id, reason, "Rolling back partially created order");
        if let Err(e) = self.store.delete_order(order_id).await {
            tracing::error!(%order_id, error = %e, "Compensating delete failed");
        }
    }

    /// Move an order along its lifecycle.
    ///
    /// Re-applying the current status is accepted and still records the
    /// hash or error passed with it.
    #[tracing::instrument(skip_all, fields(order_id = %update.order_id, status = %update.status))]
    pub async fn update_order_status(&self, update: StatusUpdate) -> Result<Order, BackendError> {
        match self.store.update_order_status(&update).await? {
            StatusChange::Updated { from, order } => {
                tracing::info!(%from, to = %order.status, "Order status updated");
                Ok(order)
            }
            StatusChange::Refused { current } => {
                tracing::warn!(from = %current, "Order status change refused");
                Err(BackendError::InvalidTransition {
                    from: current,
                    to: update.status,
                })
            }
            StatusChange::NotFound => {
                Err(BackendError::NotFound(format!("Order {}", update.order_id)))
            }
        }
    }

    pub async fn get_order(
        &self,
        order_id: Uuid,
        wallet_address: Option<&str>,
    ) -> Result<Order, BackendError> {
        let wallet_address = wallet_address.map(str::trim).filter(|w| !w.is_empty());
        self.store
            .get_order(order_id, wallet_address)
            .await?
            .ok_or_else(|| BackendError::NotFound(format!("Order {order_id}")))
    }

    pub async fn get_user_orders(&self, wallet_address: &str) -> Result<Vec<Order>, BackendError> {
        let wallet_address = wallet_address.trim();
        if wallet_address.is_empty() {
            return Err(BackendError::Rejected(
                "Wallet address is required".to_string(),
            ));
        }
        Ok(self.store.orders_by_wallet(wallet_address).await?)
    }
}
