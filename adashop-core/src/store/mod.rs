//! Persistence boundary of the backend.
//!
//! [`OrderStore`] is what the order service talks to. [`PgStore`] runs it on
//! Postgres through the `entities` processors; [`MemoryStore`] keeps
//! everything in process and can inject faults for tests.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use std::sync::Arc;

use adashop_sdk::objects::{ReservedStockItem, StockSnapshotEntry};
use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::model::{
    NewOrder, NewOrderItem, Order, OrderStatus, Product, ShippingInfo, StatusUpdate,
    StockItemRequest, SupportedToken,
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("invalid stored data: {0}")]
    InvalidData(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Outcome of placing a hold for a whole cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HoldOutcome {
    Held(Vec<ReservedStockItem>),
    ProductNotFound {
        product_id: Uuid,
    },
    Insufficient {
        product_id: Uuid,
        product_name: String,
        available: u32,
        requested: u32,
    },
}

/// Outcome of tying held stock to a freshly created order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmOutcome {
    Confirmed,
    Insufficient {
        product_id: Uuid,
        available: u32,
        requested: u32,
    },
}

/// Outcome of a lifecycle step on an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusChange {
    Updated { from: OrderStatus, order: Order },
    /// The stored status does not lead to the requested one.
    Refused { current: OrderStatus },
    NotFound,
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Live products among `ids`; unknown ids are skipped.
    async fn products_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Product>, StoreError>;

    async fn supported_token(&self, id: Uuid) -> Result<Option<SupportedToken>, StoreError>;

    async fn upsert_shipping_info(
        &self,
        wallet_address: &str,
        info: &ShippingInfo,
    ) -> Result<(), StoreError>;

    /// Check availability line by line and hold every line, or hold nothing.
    ///
    /// Unbound holds already recorded under `reservation_id` are released
    /// first so a client renewing its reservation does not compete with
    /// itself. `lines` must not repeat a product.
    async fn hold_stock(
        &self,
        reservation_id: Uuid,
        lines: &[StockItemRequest],
        expires_at: OffsetDateTime,
    ) -> Result<HoldOutcome, StoreError>;

    /// Insert a `pending` order without items.
    async fn insert_order(&self, order: NewOrder) -> Result<Order, StoreError>;

    async fn insert_order_items(
        &self,
        order_id: Uuid,
        items: &[NewOrderItem],
    ) -> Result<(), StoreError>;

    /// Bind the held lines of `reservation_id` to `order_id` and extend them
    /// to `expires_at`.
    ///
    /// A line without a matching live hold is re-checked against current
    /// availability and held afresh. Either every line ends up bound or
    /// nothing changes.
    async fn confirm_reservation(
        &self,
        order_id: Uuid,
        reservation_id: Option<Uuid>,
        lines: &[StockItemRequest],
        expires_at: OffsetDateTime,
    ) -> Result<ConfirmOutcome, StoreError>;

    /// Remove an order and its items for good.
    async fn delete_order(&self, order_id: Uuid) -> Result<(), StoreError>;

    /// Check the transition against the stored status and, when allowed,
    /// write it and settle the order's holds: `paid` consumes them,
    /// `payment_failed` and `cancelled` release them.
    ///
    /// The check and the write happen under one lock, so concurrent callers
    /// see each other's result.
    async fn update_order_status(&self, update: &StatusUpdate)
    -> Result<StatusChange, StoreError>;

    async fn get_order(
        &self,
        order_id: Uuid,
        wallet_address: Option<&str>,
    ) -> Result<Option<Order>, StoreError>;

    /// Newest first.
    async fn orders_by_wallet(&self, wallet_address: &str) -> Result<Vec<Order>, StoreError>;

    /// One entry per requested id, in request order; unknown or inactive
    /// products report 0.
    async fn stock_levels(
        &self,
        product_ids: &[Uuid],
    ) -> Result<Vec<StockSnapshotEntry>, StoreError>;
}

#[async_trait]
impl<T: OrderStore + ?Sized> OrderStore for Arc<T> {
    async fn products_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Product>, StoreError> {
        (**self).products_by_ids(ids).await
    }

    async fn supported_token(&self, id: Uuid) -> Result<Option<SupportedToken>, StoreError> {
        (**self).supported_token(id).await
    }

    async fn upsert_shipping_info(
        &self,
        wallet_address: &str,
        info: &ShippingInfo,
    ) -> Result<(), StoreError> {
        (**self).upsert_shipping_info(wallet_address, info).await
    }

    async fn hold_stock(
        &self,
        reservation_id: Uuid,
        lines: &[StockItemRequest],
        expires_at: OffsetDateTime,
    ) -> Result<HoldOutcome, StoreError> {
        (**self).hold_stock(reservation_id, lines, expires_at).await
    }

    async fn insert_order(&self, order: NewOrder) -> Result<Order, StoreError> {
        (**self).insert_order(order).await
    }

    async fn insert_order_items(
        &self,
        order_id: Uuid,
        items: &[NewOrderItem],
    ) -> Result<(), StoreError> {
        (**self).insert_order_items(order_id, items).await
    }

    async fn confirm_reservation(
        &self,
        order_id: Uuid,
        reservation_id: Option<Uuid>,
        lines: &[StockItemRequest],
        expires_at: OffsetDateTime,
    ) -> Result<ConfirmOutcome, StoreError> {
        (**self)
            .confirm_reservation(order_id, reservation_id, lines, expires_at)
            .await
    }

    async fn delete_order(&self, order_id: Uuid) -> Result<(), StoreError> {
        (**self).delete_order(order_id).await
    }

    async fn update_order_status(
        &self,
        update: &StatusUpdate,
    ) -> Result<StatusChange, StoreError> {
        (**self).update_order_status(update).await
    }

    async fn get_order(
        &self,
        order_id: Uuid,
        wallet_address: Option<&str>,
    ) -> Result<Option<Order>, StoreError> {
        (**self).get_order(order_id, wallet_address).await
    }

    async fn orders_by_wallet(&self, wallet_address: &str) -> Result<Vec<Order>, StoreError> {
        (**self).orders_by_wallet(wallet_address).await
    }

    async fn stock_levels(
        &self,
        product_ids: &[Uuid],
    ) -> Result<Vec<StockSnapshotEntry>, StoreError> {
        (**self).stock_levels(product_ids).await
    }
}
