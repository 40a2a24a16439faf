pub mod checkout;
pub mod orders;
pub mod stock;
pub mod tokens;

pub use checkout::CheckoutSettings;
pub use orders::{
    CreateOrdersRequest, CreateOrdersResponse, GetOrderQuery, OrderFailure, OrderGroupInput,
    OrderItemInput, OrderItemResponse, OrderResponse, OrderStatus, ShippingInfo,
    UpdateOrderStatusRequest, UpdateOrderStatusResponse, UserOrdersResponse,
};
pub use stock::{
    ReservedStockItem, StockFailure, StockItemRequest, StockReservationRequest,
    StockReservationResponse, StockSnapshotEntry, StockSnapshotRequest, DEFAULT_RESERVATION_MINUTES,
};
pub use tokens::SupportedTokenInfo;

use serde::{Deserialize, Serialize};

/// Generic error body returned by endpoints that have no richer failure shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}
