//! Backend side of the checkout: validates requests, holds stock and
//! persists orders through an [`OrderStore`].

mod orders;
mod stock;

pub use orders::{OrderCreationError, OrderCreationFailure, validate_shipping_info};

use adashop_sdk::objects::{CreateOrdersRequest, StockReservationRequest, StockSnapshotEntry};
use async_trait::async_trait;
use uuid::Uuid;

use crate::backend::{BackendError, ShopBackend};
use crate::config::CheckoutConfig;
use crate::model::{Order, ReservationReport, StatusUpdate};
use crate::stock::StockError;
use crate::store::OrderStore;

#[derive(Debug, Clone)]
pub struct ShopService<S> {
    store: S,
    /// How long a hold lives once it is bound to an order.
    order_hold: time::Duration,
}

impl<S: OrderStore> ShopService<S> {
    pub fn new(store: S, config: &CheckoutConfig) -> Self {
        Self {
            store,
            order_hold: config.reservation_window(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

#[async_trait]
impl<S: OrderStore> ShopBackend for ShopService<S> {
    async fn validate_and_reserve_stock(
        &self,
        request: StockReservationRequest,
    ) -> Result<ReservationReport, StockError> {
        ShopService::validate_and_reserve_stock(self, request).await
    }

    async fn stock_snapshot(
        &self,
        product_ids: Vec<Uuid>,
    ) -> Result<Vec<StockSnapshotEntry>, BackendError> {
        ShopService::stock_snapshot(self, product_ids).await
    }

    async fn create_orders(
        &self,
        request: CreateOrdersRequest,
    ) -> Result<Vec<Order>, OrderCreationFailure> {
        ShopService::create_orders(self, request).await
    }

    async fn update_order_status(&self, update: StatusUpdate) -> Result<Order, BackendError> {
        ShopService::update_order_status(self, update).await
    }

    async fn get_order(
        &self,
        order_id: Uuid,
        wallet_address: Option<&str>,
    ) -> Result<Order, BackendError> {
        ShopService::get_order(self, order_id, wallet_address).await
    }

    async fn get_user_orders(&self, wallet_address: &str) -> Result<Vec<Order>, BackendError> {
        ShopService::get_user_orders(self, wallet_address).await
    }
}
