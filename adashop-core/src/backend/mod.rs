//! The remote operations the checkout depends on.
//!
//! [`ShopBackend`] is implemented in process by
//! [`ShopService`](crate::service::ShopService) and, with the `client`
//! feature, over HTTP by `adashop_sdk::client::ShopClient`.

#[cfg(feature = "client")]
mod http;

use std::sync::Arc;

use adashop_sdk::objects::{CreateOrdersRequest, StockReservationRequest, StockSnapshotEntry};
use async_trait::async_trait;
use uuid::Uuid;

use crate::model::{Order, OrderStatus, ReservationReport, StatusUpdate};
use crate::service::OrderCreationFailure;
use crate::stock::StockError;
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("Cannot change order status from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
    #[error("{0}")]
    Rejected(String),
    #[error("backend unavailable: {0}")]
    Transport(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[cfg(feature = "client")]
    #[error(transparent)]
    Client(#[from] adashop_sdk::client::ClientError),
}

impl BackendError {
    /// Failures the shopper can do nothing about except try again later.
    pub fn is_unexpected(&self) -> bool {
        match self {
            BackendError::Transport(_) | BackendError::Store(_) => true,
            #[cfg(feature = "client")]
            BackendError::Client(_) => true,
            _ => false,
        }
    }
}

#[async_trait]
pub trait ShopBackend: Send + Sync {
    /// validate-and-reserve-stock
    async fn validate_and_reserve_stock(
        &self,
        request: StockReservationRequest,
    ) -> Result<ReservationReport, StockError>;

    async fn stock_snapshot(
        &self,
        product_ids: Vec<Uuid>,
    ) -> Result<Vec<StockSnapshotEntry>, BackendError>;

    /// create-orders; on failure the orders created before the failing group
    /// are returned alongside the error.
    async fn create_orders(
        &self,
        request: CreateOrdersRequest,
    ) -> Result<Vec<Order>, OrderCreationFailure>;

    async fn update_order_status(&self, update: StatusUpdate) -> Result<Order, BackendError>;

    async fn get_order(
        &self,
        order_id: Uuid,
        wallet_address: Option<&str>,
    ) -> Result<Order, BackendError>;

    async fn get_user_orders(&self, wallet_address: &str) -> Result<Vec<Order>, BackendError>;
}

#[async_trait]
impl<T: ShopBackend + ?Sized> ShopBackend for Arc<T> {
    async fn validate_and_reserve_stock(
        &self,
        request: StockReservationRequest,
    ) -> Result<ReservationReport, StockError> {
        (**self).validate_and_reserve_stock(request).await
    }

    async fn stock_snapshot(
        &self,
        product_ids: Vec<Uuid>,
    ) -> Result<Vec<StockSnapshotEntry>, BackendError> {
        (**self).stock_snapshot(product_ids).await
    }

    async fn create_orders(
        &self,
        request: CreateOrdersRequest,
    ) -> Result<Vec<Order>, OrderCreationFailure> {
        (**self).create_orders(request).await
    }

    async fn update_order_status(&self, update: StatusUpdate) -> Result<Order, BackendError> {
        (**self).update_order_status(update).await
    }

    async fn get_order(
        &self,
        order_id: Uuid,
        wallet_address: Option<&str>,
    ) -> Result<Order, BackendError> {
        (**self).get_order(order_id, wallet_address).await
    }

    async fn get_user_orders(&self, wallet_address: &str) -> Result<Vec<Order>, BackendError> {
        (**self).get_user_orders(wallet_address).await
    }
}
