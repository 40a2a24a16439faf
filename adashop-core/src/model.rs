//! Domain records shared by the store, the backend service and the checkout
//! client, with conversions to and from the wire DTOs.

use adashop_sdk::objects::{OrderItemResponse, OrderResponse, ReservedStockItem};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::currency::{Currency, CurrencyKey, TokenDescriptor};

pub use crate::entities::OrderStatus;
pub use adashop_sdk::objects::{OrderGroupInput, OrderItemInput, ShippingInfo, StockItemRequest};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    /// Unit price in the smallest unit of the product's currency.
    pub price: u64,
    /// `None` for ADA-priced products.
    pub token_id: Option<Uuid>,
    pub stock: u32,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportedToken {
    pub descriptor: TokenDescriptor,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderItem {
    pub product_id: Uuid,
    pub product_name: Option<String>,
    pub quantity: u32,
    pub price: u64,
    pub token_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub id: Uuid,
    pub wallet_address: String,
    pub total_amount: u64,
    pub status: OrderStatus,
    pub cardano_tx_hash: Option<String>,
    pub payment_error: Option<String>,
    pub token_id: Option<Uuid>,
    pub token: Option<TokenDescriptor>,
    pub items: Vec<OrderItem>,
    pub created_at: OffsetDateTime,
}

impl Order {
    pub fn currency_key(&self) -> CurrencyKey {
        CurrencyKey::from_token_id(self.token_id)
    }

    /// Ledger currency; a token order without metadata cannot be paid.
    pub fn currency(&self) -> Option<Currency> {
        match (&self.token_id, &self.token) {
            (None, _) => Some(Currency::Ada),
            (Some(_), Some(token)) => Some(token.currency()),
            (Some(_), None) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub wallet_address: String,
    pub total_amount: u64,
    pub token_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderItem {
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: u32,
    pub price: u64,
    pub token_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub order_id: Uuid,
    pub status: OrderStatus,
    pub tx_hash: Option<String>,
    pub error: Option<String>,
}

/// Result of a successful validate-and-reserve call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationReport {
    pub reservation_id: Uuid,
    pub expires_at: OffsetDateTime,
    pub items: Vec<ReservedStockItem>,
}

impl From<OrderItem> for OrderItemResponse {
    fn from(value: OrderItem) -> Self {
        OrderItemResponse {
            product_id: value.product_id,
            product_name: value.product_name,
            quantity: value.quantity,
            price: value.price,
            token_id: value.token_id,
        }
    }
}

impl From<OrderItemResponse> for OrderItem {
    fn from(value: OrderItemResponse) -> Self {
        OrderItem {
            product_id: value.product_id,
            product_name: value.product_name,
            quantity: value.quantity,
            price: value.price,
            token_id: value.token_id,
        }
    }
}

impl From<Order> for OrderResponse {
    fn from(value: Order) -> Self {
        OrderResponse {
            id: value.id,
            wallet_address: value.wallet_address,
            total_amount: value.total_amount,
            status: value.status.into(),
            cardano_tx_hash: value.cardano_tx_hash,
            payment_error: value.payment_error,
            token_id: value.token_id,
            supported_token: value.token.map(Into::into),
            items: value.items.into_iter().map(Into::into).collect(),
            created_at: value.created_at.unix_timestamp(),
        }
    }
}

impl TryFrom<OrderResponse> for Order {
    type Error = time::error::ComponentRange;

    fn try_from(value: OrderResponse) -> Result<Self, Self::Error> {
        Ok(Order {
            id: value.id,
            wallet_address: value.wallet_address,
            total_amount: value.total_amount,
            status: value.status.into(),
            cardano_tx_hash: value.cardano_tx_hash,
            payment_error: value.payment_error,
            token_id: value.token_id,
            token: value.supported_token.map(Into::into),
            items: value.items.into_iter().map(Into::into).collect(),
            created_at: OffsetDateTime::from_unix_timestamp(value.created_at)?,
        })
    }
}
