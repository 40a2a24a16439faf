//! [`ShopBackend`] over the HTTP API.

use adashop_sdk::client::{ClientError, ShopClient};
use adashop_sdk::objects::{
    CreateOrdersRequest, ErrorResponse, OrderResponse, StockReservationRequest,
    StockSnapshotEntry, UpdateOrderStatusRequest,
};
use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use super::{BackendError, ShopBackend};
use crate::model::{Order, ReservationReport, StatusUpdate};
use crate::service::{OrderCreationError, OrderCreationFailure};
use crate::stock::StockError;

/// 4xx answers without a typed body still carry a readable message.
fn from_client(e: ClientError) -> BackendError {
    if e.is_not_found() {
        return BackendError::NotFound(message_of(&e).unwrap_or_else(|| "Resource".to_string()));
    }
    match &e {
        ClientError::Api { status, .. } if status.is_client_error() => {
            BackendError::Rejected(message_of(&e).unwrap_or_else(|| e.to_string()))
        }
        _ => BackendError::Client(e),
    }
}

fn message_of(e: &ClientError) -> Option<String> {
    match e {
        ClientError::Api { body, .. } => serde_json::from_str::<ErrorResponse>(body)
            .ok()
            .map(|r| r.message),
        _ => None,
    }
}

fn to_order(response: OrderResponse) -> Result<Order, BackendError> {
    let id = response.id;
    Order::try_from(response)
        .map_err(|e| BackendError::Transport(format!("order {id} has an invalid timestamp: {e}")))
}

#[async_trait]
impl ShopBackend for ShopClient {
    async fn validate_and_reserve_stock(
        &self,
        request: StockReservationRequest,
    ) -> Result<ReservationReport, StockError> {
        let response = self
            .reserve_stock(&request)
            .await
            .map_err(|e| StockError::Backend(from_client(e)))?;
        if let Some(failure) = response.failure {
            return Err(StockError::from_failure(failure));
        }
        match (response.success, response.reservation_id, response.expires_at) {
            (true, Some(reservation_id), Some(expires_at)) => Ok(ReservationReport {
                reservation_id,
                expires_at: OffsetDateTime::from_unix_timestamp(expires_at).map_err(|e| {
                    StockError::Backend(BackendError::Transport(e.to_string()))
                })?,
                items: response.items,
            }),
            _ => Err(StockError::Backend(BackendError::Rejected(response.message))),
        }
    }

    async fn stock_snapshot(
        &self,
        product_ids: Vec<Uuid>,
    ) -> Result<Vec<StockSnapshotEntry>, BackendError> {
        ShopClient::stock_snapshot(self, product_ids)
            .await
            .map_err(from_client)
    }

    async fn create_orders(
        &self,
        request: CreateOrdersRequest,
    ) -> Result<Vec<Order>, OrderCreationFailure> {
        let response = ShopClient::create_orders(self, &request)
            .await
            .map_err(|e| OrderCreationFailure::from(OrderCreationError::Backend(from_client(e))))?;
        let orders = response
            .orders
            .into_iter()
            .map(to_order)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| OrderCreationFailure::from(OrderCreationError::Backend(e)))?;
        if response.success {
            return Ok(orders);
        }
        let error = match response.failure {
            Some(failure) => OrderCreationError::from_failure(failure),
            None => OrderCreationError::Backend(BackendError::Rejected(response.message)),
        };
        Err(OrderCreationFailure {
            created: orders,
            error,
        })
    }

    async fn update_order_status(&self, update: StatusUpdate) -> Result<Order, BackendError> {
        let request = UpdateOrderStatusRequest {
            status: update.status.into(),
            tx_hash: update.tx_hash,
            error: update.error,
        };
        let response = ShopClient::update_order_status(self, update.order_id, &request)
            .await
            .map_err(from_client)?;
        match response.order {
            Some(order) if response.success => to_order(order),
            _ => Err(BackendError::Rejected(response.message)),
        }
    }

    async fn get_order(
        &self,
        order_id: Uuid,
        wallet_address: Option<&str>,
    ) -> Result<Order, BackendError> {
        let response = ShopClient::get_order(self, order_id, wallet_address)
            .await
            .map_err(from_client)?;
        to_order(response)
    }

    async fn get_user_orders(&self, wallet_address: &str) -> Result<Vec<Order>, BackendError> {
        ShopClient::get_user_orders(self, wallet_address)
            .await
            .map_err(from_client)?
            .orders
            .into_iter()
            .map(to_order)
            .collect()
    }
}
