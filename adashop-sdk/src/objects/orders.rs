//! Order payloads for the create / update / query endpoints.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::tokens::SupportedTokenInfo;

/// Order status for API payloads.
///
/// This is the API/DTO version without sqlx::Type.
/// For database operations, use the version in `adashop-core::entities`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    PaymentFailed,
    Paid,
    Processing,
    Shipped,
    Completed,
    Cancelled,
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::Pending => write!(f, "pending"),
            OrderStatus::PaymentFailed => write!(f, "payment_failed"),
            OrderStatus::Paid => write!(f, "paid"),
            OrderStatus::Processing => write!(f, "processing"),
            OrderStatus::Shipped => write!(f, "shipped"),
            OrderStatus::Completed => write!(f, "completed"),
            OrderStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Shipping address captured by the optional shipping step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingInfo {
    pub full_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub address: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

/// One line of an order group, priced as the client last saw it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItemInput {
    pub product_id: Uuid,
    pub quantity: u32,
    /// Unit price in the smallest unit of the group's currency.
    pub price: u64,
    #[serde(default)]
    pub token_id: Option<Uuid>,
}

/// All cart lines paid in one currency; becomes exactly one order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderGroupInput {
    pub items: Vec<OrderItemInput>,
    /// `None` for ADA.
    #[serde(default)]
    pub token_id: Option<Uuid>,
}

/// `POST /api/v1/orders`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOrdersRequest {
    pub wallet_address: String,
    pub orders: Vec<OrderGroupInput>,
    #[serde(default)]
    pub shipping_info: Option<ShippingInfo>,
    /// Hold obtained from the stock reservation endpoint, confirmed per order.
    #[serde(default)]
    pub reservation_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItemResponse {
    pub product_id: Uuid,
    pub product_name: Option<String>,
    pub quantity: u32,
    pub price: u64,
    pub token_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderResponse {
    pub id: Uuid,
    pub wallet_address: String,
    pub total_amount: u64,
    pub status: OrderStatus,
    pub cardano_tx_hash: Option<String>,
    pub payment_error: Option<String>,
    pub token_id: Option<Uuid>,
    pub supported_token: Option<SupportedTokenInfo>,
    pub items: Vec<OrderItemResponse>,
    /// Unix timestamp of when the order was created.
    pub created_at: i64,
}

/// Machine-readable reason attached to a failed order creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OrderFailure {
    Validation {
        reason: String,
    },
    ShippingInfo {
        reason: String,
    },
    UnsupportedToken {
        token_id: Uuid,
    },
    InactiveToken {
        token_id: Uuid,
    },
    ProductNotFound {
        product_id: Uuid,
    },
    CurrencyMismatch {
        product_id: Uuid,
    },
    PriceMismatch {
        product_id: Uuid,
        product_name: String,
        expected: u64,
        got: u64,
    },
    StockChanged {
        product_id: Uuid,
        available: u32,
        requested: u32,
    },
    Persistence {
        reason: String,
    },
}

/// Response of `POST /api/v1/orders`.
///
/// On failure `orders` holds the orders created before the failing group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOrdersResponse {
    pub success: bool,
    pub orders: Vec<OrderResponse>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<OrderFailure>,
}

/// `POST /api/v1/orders/{order_id}/status`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
    #[serde(default)]
    pub tx_hash: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateOrderStatusResponse {
    pub success: bool,
    pub order: Option<OrderResponse>,
    pub message: String,
}

/// Query string of `GET /api/v1/orders/{order_id}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetOrderQuery {
    #[serde(default)]
    pub wallet_address: Option<String>,
}

/// Response of `GET /api/v1/wallets/{wallet_address}/orders`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserOrdersResponse {
    pub orders: Vec<OrderResponse>,
    pub count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_failure_is_tagged() {
        let failure = OrderFailure::PriceMismatch {
            product_id: Uuid::nil(),
            product_name: "Hoodie".to_string(),
            expected: 120,
            got: 100,
        };
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["kind"], "price_mismatch");
        assert_eq!(json["expected"], 120);
    }

    #[test]
    fn test_status_wire_names() {
        let json = serde_json::to_string(&OrderStatus::PaymentFailed).unwrap();
        assert_eq!(json, "\"payment_failed\"");
        assert_eq!(OrderStatus::PaymentFailed.to_string(), "payment_failed");
    }

    #[test]
    fn test_create_request_defaults() {
        let request: CreateOrdersRequest = serde_json::from_str(
            r#"{"wallet_address":"addr1q","orders":[{"items":[]}]}"#,
        )
        .unwrap();
        assert!(request.shipping_info.is_none());
        assert!(request.reservation_id.is_none());
        assert!(request.orders[0].token_id.is_none());
    }
}
