//! Client-side cart.
//!
//! [`CartService`] owns the cart of one browser session, persists it through
//! a [`KeyValueStorage`] and keeps peer sessions in sync over a [`CartBus`].
//! [`group_by_currency`] partitions its lines into one group per payment
//! currency.

pub mod grouping;
pub mod service;
pub mod storage;

pub use grouping::{CurrencyGroup, CurrencyGroups, CurrencyKind, group_by_currency};
pub use service::{CartBus, CartService, CartSync, CartWatcher};
pub use storage::{CartRecord, KeyValueStorage, MemoryStorage, StorageError};

use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::currency::{CurrencyKey, TokenDescriptor};

#[derive(Debug, thiserror::Error)]
pub enum CartError {
    #[error("Quantity must be greater than 0")]
    InvalidQuantity,
    #[error("Insufficient stock. Only {available} available.")]
    ExceedsStock {
        product_id: Uuid,
        available: u32,
        requested: u32,
    },
    #[error("Item not found in cart")]
    ItemNotFound { product_id: Uuid },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Product data captured when the line was added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSnapshot {
    pub id: Uuid,
    pub name: String,
    /// Unit price in the smallest unit of the product's currency.
    #[serde(deserialize_with = "price_from_number_or_string")]
    pub price: u64,
    #[serde(default, alias = "token_id")]
    pub token_id: Option<Uuid>,
    #[serde(default)]
    pub stock: u32,
    #[serde(default, alias = "supported_tokens")]
    pub supported_token: Option<TokenDescriptor>,
}

/// Prices stored by older clients may be numeric strings.
fn price_from_number_or_string<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Price {
        Number(u64),
        Text(String),
    }
    match Price::deserialize(deserializer)? {
        Price::Number(n) => Ok(n),
        Price::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub product_id: Uuid,
    pub quantity: u32,
    /// Unix milliseconds.
    pub added_at: i64,
    pub product: ProductSnapshot,
}

impl CartItem {
    pub fn new(product: ProductSnapshot, quantity: u32) -> Self {
        Self {
            product_id: product.id,
            quantity,
            added_at: now_millis(),
            product,
        }
    }

    pub fn subtotal(&self) -> u64 {
        self.product.price.saturating_mul(u64::from(self.quantity))
    }

    pub fn currency_key(&self) -> CurrencyKey {
        CurrencyKey::from_token_id(self.product.token_id)
    }

    /// A line is usable when its snapshot belongs to it and is complete.
    pub fn is_valid(&self) -> bool {
        self.quantity > 0
            && self.product.id == self.product_id
            && !self.product.name.trim().is_empty()
            && self.product.price > 0
    }
}

pub(crate) fn now_millis() -> i64 {
    i64::try_from(OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000).unwrap_or(i64::MAX)
}
