//! Versioned cart record kept under one storage key.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use super::{CartItem, now_millis};

pub const CART_STORAGE_KEY: &str = "ecommerce-cart";
pub const CART_RECORD_VERSION: &str = "1.0.0";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("failed to encode cart: {0}")]
    Encode(#[from] serde_json::Error),
}

/// String key/value store shared by every session of one browser profile.
pub trait KeyValueStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

impl<T: KeyValueStorage + ?Sized> KeyValueStorage for Arc<T> {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        (**self).remove(key)
    }
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, StorageError> {
        self.entries
            .lock()
            .map_err(|_| StorageError::Unavailable("storage lock poisoned".to_string()))
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries()?.remove(key);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartMetadata {
    pub version: String,
    /// Unix milliseconds.
    pub last_updated: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartRecord {
    pub items: Vec<CartItem>,
    pub metadata: CartMetadata,
}

impl CartRecord {
    pub fn new(items: Vec<CartItem>) -> Self {
        Self {
            items,
            metadata: CartMetadata {
                version: CART_RECORD_VERSION.to_string(),
                last_updated: now_millis(),
            },
        }
    }
}

/// Record shape before the entries are checked one by one.
#[derive(Deserialize)]
struct RawRecord {
    items: Vec<serde_json::Value>,
    #[allow(dead_code)]
    metadata: serde_json::Value,
}

#[derive(Debug)]
pub struct DecodedCart {
    pub items: Vec<CartItem>,
    /// Entries that failed to parse or were incomplete.
    pub dropped: usize,
}

/// Parse a stored record, dropping every entry that is not a valid line.
///
/// Fails only when the record itself is malformed.
pub fn decode_cart(raw: &str) -> Result<DecodedCart, serde_json::Error> {
    let record: RawRecord = serde_json::from_str(raw)?;
    let total = record.items.len();
    let items: Vec<CartItem> = record
        .items
        .into_iter()
        .filter_map(|value| serde_json::from_value::<CartItem>(value).ok())
        .filter(CartItem::is_valid)
        .collect();
    Ok(DecodedCart {
        dropped: total - items.len(),
        items,
    })
}

/// Write `items` under the cart key and return the serialized record.
pub fn save_cart(
    storage: &dyn KeyValueStorage,
    items: &[CartItem],
) -> Result<String, StorageError> {
    let payload = serde_json::to_string(&CartRecord::new(items.to_vec()))?;
    storage.set(CART_STORAGE_KEY, &payload)?;
    Ok(payload)
}

pub fn clear_cart(storage: &dyn KeyValueStorage) -> Result<(), StorageError> {
    storage.remove(CART_STORAGE_KEY)
}

/// Load the stored cart.
///
/// Invalid entries are dropped and the cleaned record written back; a
/// record that cannot be parsed at all is removed and an empty cart
/// returned.
pub fn load_cart(storage: &dyn KeyValueStorage) -> Result<Vec<CartItem>, StorageError> {
    let Some(raw) = storage.get(CART_STORAGE_KEY)? else {
        return Ok(Vec::new());
    };
    match decode_cart(&raw) {
        Ok(decoded) => {
            if decoded.dropped > 0 {
                tracing::warn!(dropped = decoded.dropped, "Dropped invalid cart entries");
                save_cart(storage, &decoded.items)?;
            }
            Ok(decoded.items)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Stored cart is unreadable, clearing it");
            clear_cart(storage)?;
            Ok(Vec::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use uuid::Uuid;

    use super::*;
    use crate::cart::ProductSnapshot;

    fn line(name: &str, price: u64, quantity: u32) -> CartItem {
        CartItem::new(
            ProductSnapshot {
                id: Uuid::new_v4(),
                name: name.to_string(),
                price,
                token_id: None,
                stock: 10,
                supported_token: None,
            },
            quantity,
        )
    }

    #[test]
    fn test_round_trip_keeps_valid_entries_only() {
        let storage = MemoryStorage::new();
        let good = vec![line("Tee", 10, 1), line("Cap", 20, 2)];
        let mut mismatched = line("Mug", 5, 1);
        mismatched.product_id = Uuid::new_v4();

        let mut entries: Vec<serde_json::Value> =
            good.iter().map(|i| serde_json::to_value(i).unwrap()).collect();
        entries.push(serde_json::to_value(&mismatched).unwrap());
        entries.push(serde_json::to_value(line("", 5, 1)).unwrap());
        entries.push(serde_json::to_value(line("Free", 0, 1)).unwrap());
        entries.push(json!({ "productId": "not-a-uuid", "quantity": 1 }));
        entries.push(json!(42));
        let raw = json!({ "items": entries, "metadata": { "version": "1.0.0", "lastUpdated": 0 } });
        storage.set(CART_STORAGE_KEY, &raw.to_string()).unwrap();

        let loaded = load_cart(&storage).unwrap();
        assert_eq!(loaded, good);

        // The cleaned record was written back.
        let decoded = decode_cart(&storage.get(CART_STORAGE_KEY).unwrap().unwrap()).unwrap();
        assert_eq!(decoded.dropped, 0);
        assert_eq!(decoded.items, good);
    }

    #[test]
    fn test_unparsable_record_is_cleared() {
        let storage = MemoryStorage::new();
        storage.set(CART_STORAGE_KEY, "{not json").unwrap();
        assert!(load_cart(&storage).unwrap().is_empty());
        assert!(storage.get(CART_STORAGE_KEY).unwrap().is_none());

        storage
            .set(CART_STORAGE_KEY, &json!({ "items": [] }).to_string())
            .unwrap();
        assert!(load_cart(&storage).unwrap().is_empty());
        assert!(storage.get(CART_STORAGE_KEY).unwrap().is_none());
    }

    #[test]
    fn test_saved_record_carries_version() {
        let storage = MemoryStorage::new();
        let payload = save_cart(&storage, &[line("Tee", 10, 1)]).unwrap();
        let record: CartRecord = serde_json::from_str(&payload).unwrap();
        assert_eq!(record.metadata.version, CART_RECORD_VERSION);
        assert_eq!(record.items.len(), 1);
    }
}
