//! Cart service with change notification and cross-session sync.
//!
//! `CartService` keeps the cart lines behind a `tokio` `RwLock` and a
//! version counter published on a `watch` channel, so views can await the
//! next change instead of polling. Every local change is written to storage
//! first, then committed in memory, then announced on the [`CartBus`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use adashop_sdk::objects::StockItemRequest;
use tokio::sync::{RwLock, broadcast, watch};
use uuid::Uuid;

use super::grouping::{CurrencyGroups, group_by_currency};
use super::storage::{KeyValueStorage, clear_cart, decode_cart, load_cart, save_cart};
use super::{CartError, CartItem, ProductSnapshot};

/// Full cart published by one session for its peers.
///
/// `payload` is the serialized cart record, or `None` once the cart was
/// cleared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartSync {
    pub origin: Uuid,
    pub payload: Option<Arc<str>>,
}

/// Broadcast channel connecting the cart services of one browser profile.
#[derive(Debug, Clone)]
pub struct CartBus {
    tx: broadcast::Sender<CartSync>,
}

impl CartBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CartSync> {
        self.tx.subscribe()
    }

    fn publish(&self, sync: CartSync) {
        // No receivers just means no other session is open.
        let _ = self.tx.send(sync);
    }
}

pub struct CartService {
    inner: Arc<CartInner>,
}

struct CartInner {
    session_id: Uuid,
    storage: Arc<dyn KeyValueStorage>,
    items: RwLock<Vec<CartItem>>,
    version: AtomicU64,
    version_tx: watch::Sender<u64>,
    bus: Option<CartBus>,
}

/// Receives a notification whenever the cart changes.
pub struct CartWatcher {
    version_rx: watch::Receiver<u64>,
}

impl CartWatcher {
    /// Wait for the next change; `Err` once the service is gone.
    pub async fn changed(&mut self) -> Result<(), watch::error::RecvError> {
        self.version_rx.changed().await
    }

    pub fn version(&self) -> u64 {
        *self.version_rx.borrow()
    }
}

impl Clone for CartService {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl CartService {
    /// Load the persisted cart and join `bus`, if any.
    pub fn open(
        storage: Arc<dyn KeyValueStorage>,
        bus: Option<CartBus>,
    ) -> Result<Self, CartError> {
        let items = load_cart(storage.as_ref())?;
        let (version_tx, _) = watch::channel(0u64);
        Ok(Self {
            inner: Arc::new(CartInner {
                session_id: Uuid::new_v4(),
                storage,
                items: RwLock::new(items),
                version: AtomicU64::new(0),
                version_tx,
                bus,
            }),
        })
    }

    pub fn session_id(&self) -> Uuid {
        self.inner.session_id
    }

    pub fn subscribe(&self) -> CartWatcher {
        CartWatcher {
            version_rx: self.inner.version_tx.subscribe(),
        }
    }

    fn notify(&self) {
        let version = self.inner.version.fetch_add(1, Ordering::Relaxed) + 1;
        let _ = self.inner.version_tx.send(version);
    }

    fn announce(&self, payload: Option<Arc<str>>) {
        if let Some(bus) = &self.inner.bus {
            bus.publish(CartSync {
                origin: self.inner.session_id,
                payload,
            });
        }
    }

    /// Apply `change` to a copy of the lines, persist, then commit.
    async fn mutate<F>(&self, change: F) -> Result<(), CartError>
    where
        F: FnOnce(&mut Vec<CartItem>) -> Result<(), CartError>,
    {
        let mut guard = self.inner.items.write().await;
        let mut next = guard.clone();
        change(&mut next)?;
        let payload = save_cart(self.inner.storage.as_ref(), &next)?;
        *guard = next;
        drop(guard);
        self.notify();
        self.announce(Some(Arc::from(payload)));
        Ok(())
    }

    /// Add `quantity` of `product`, merging with an existing line.
    pub async fn add_item(&self, product: ProductSnapshot, quantity: u32) -> Result<(), CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }
        self.mutate(|items| {
            let existing = items.iter().position(|i| i.product_id == product.id);
            let current = existing.map_or(0, |i| items[i].quantity);
            let total = current.saturating_add(quantity);
            if total > product.stock {
                return Err(CartError::ExceedsStock {
                    product_id: product.id,
                    available: product.stock,
                    requested: total,
                });
            }
            match existing {
                Some(i) => {
                    items[i].quantity = total;
                    items[i].product = product;
                }
                None => items.push(CartItem::new(product, quantity)),
            }
            Ok(())
        })
        .await
    }

    pub async fn remove_item(&self, product_id: Uuid) -> Result<(), CartError> {
        self.mutate(|items| {
            items.retain(|i| i.product_id != product_id);
            Ok(())
        })
        .await
    }

    /// Set a line's quantity; zero removes the line.
    pub async fn update_quantity(&self, product_id: Uuid, quantity: u32) -> Result<(), CartError> {
        if quantity == 0 {
            return self.remove_item(product_id).await;
        }
        self.mutate(|items| {
            let item = items
                .iter_mut()
                .find(|i| i.product_id == product_id)
                .ok_or(CartError::ItemNotFound { product_id })?;
            if quantity > item.product.stock {
                return Err(CartError::ExceedsStock {
                    product_id,
                    available: item.product.stock,
                    requested: quantity,
                });
            }
            item.quantity = quantity;
            Ok(())
        })
        .await
    }

    /// Record fresh stock for a product without touching the requested
    /// quantity, which may now exceed it.
    pub async fn update_product_stock(&self, product_id: Uuid, stock: u32) -> Result<(), CartError> {
        self.mutate(|items| {
            for item in items.iter_mut().filter(|i| i.product_id == product_id) {
                item.product.stock = stock;
            }
            Ok(())
        })
        .await
    }

    pub async fn clear(&self) -> Result<(), CartError> {
        let mut guard = self.inner.items.write().await;
        clear_cart(self.inner.storage.as_ref())?;
        guard.clear();
        drop(guard);
        self.notify();
        self.announce(None);
        Ok(())
    }

    /// Reload from storage, discarding the in-memory copy.
    pub async fn refresh(&self) -> Result<(), CartError> {
        let mut guard = self.inner.items.write().await;
        *guard = load_cart(self.inner.storage.as_ref())?;
        drop(guard);
        self.notify();
        Ok(())
    }

    /// Take over a peer's cart. Last writer wins and nothing is re-published.
    ///
    /// Returns `false` for messages this session published itself.
    pub async fn apply_remote(&self, sync: &CartSync) -> bool {
        if sync.origin == self.inner.session_id {
            return false;
        }
        let items = match sync.payload.as_deref().map(decode_cart) {
            None => Vec::new(),
            Some(Ok(decoded)) => decoded.items,
            Some(Err(e)) => {
                tracing::warn!(origin = %sync.origin, error = %e, "Ignoring unreadable cart sync");
                return false;
            }
        };
        *self.inner.items.write().await = items;
        self.notify();
        true
    }

    /// Apply peer updates until the bus closes.
    pub async fn follow(&self, mut rx: broadcast::Receiver<CartSync>) {
        loop {
            match rx.recv().await {
                Ok(sync) => {
                    self.apply_remote(&sync).await;
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Cart sync lagged, reloading from storage");
                    if let Err(e) = self.refresh().await {
                        tracing::warn!(error = %e, "Cart reload failed");
                    }
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    pub async fn items(&self) -> Vec<CartItem> {
        self.inner.items.read().await.clone()
    }

    pub async fn item_quantity(&self, product_id: Uuid) -> u32 {
        self.inner
            .items
            .read()
            .await
            .iter()
            .find(|i| i.product_id == product_id)
            .map_or(0, |i| i.quantity)
    }

    pub async fn has_item(&self, product_id: Uuid) -> bool {
        self.item_quantity(product_id).await > 0
    }

    /// Sum of quantities across all lines.
    pub async fn item_count(&self) -> u32 {
        self.inner
            .items
            .read()
            .await
            .iter()
            .fold(0u32, |acc, i| acc.saturating_add(i.quantity))
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.items.read().await.is_empty()
    }

    pub async fn totals(&self) -> CurrencyGroups {
        group_by_currency(&self.inner.items.read().await)
    }

    /// One stock line per cart line, for validate-and-reserve.
    pub async fn stock_lines(&self) -> Vec<StockItemRequest> {
        self.inner
            .items
            .read()
            .await
            .iter()
            .map(|i| StockItemRequest {
                product_id: i.product_id,
                quantity: i.quantity,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::MemoryStorage;
    use crate::cart::storage::CART_STORAGE_KEY;

    fn snapshot(stock: u32) -> ProductSnapshot {
        ProductSnapshot {
            id: Uuid::new_v4(),
            name: "Tee".to_string(),
            price: 2_000_000,
            token_id: None,
            stock,
            supported_token: None,
        }
    }

    fn open(storage: &Arc<MemoryStorage>, bus: Option<CartBus>) -> CartService {
        CartService::open(storage.clone(), bus).unwrap()
    }

    #[tokio::test]
    async fn test_add_merges_and_respects_stock() {
        let storage = Arc::new(MemoryStorage::new());
        let cart = open(&storage, None);
        let product = snapshot(3);

        cart.add_item(product.clone(), 2).await.unwrap();
        cart.add_item(product.clone(), 1).await.unwrap();
        assert_eq!(cart.item_quantity(product.id).await, 3);
        assert_eq!(cart.items().await.len(), 1);

        let err = cart.add_item(product.clone(), 1).await.unwrap_err();
        assert!(matches!(err, CartError::ExceedsStock { available: 3, .. }));
        assert_eq!(err.to_string(), "Insufficient stock. Only 3 available.");
        assert!(matches!(
            cart.add_item(product.clone(), 0).await,
            Err(CartError::InvalidQuantity)
        ));
        assert_eq!(cart.item_quantity(product.id).await, 3);
    }

    #[tokio::test]
    async fn test_update_quantity() {
        let storage = Arc::new(MemoryStorage::new());
        let cart = open(&storage, None);
        let product = snapshot(5);
        cart.add_item(product.clone(), 1).await.unwrap();

        cart.update_quantity(product.id, 4).await.unwrap();
        assert_eq!(cart.item_count().await, 4);
        assert!(cart.update_quantity(product.id, 6).await.is_err());
        assert!(matches!(
            cart.update_quantity(Uuid::new_v4(), 1).await,
            Err(CartError::ItemNotFound { .. })
        ));

        cart.update_quantity(product.id, 0).await.unwrap();
        assert!(!cart.has_item(product.id).await);
    }

    #[tokio::test]
    async fn test_stock_update_keeps_requested_quantity() {
        let storage = Arc::new(MemoryStorage::new());
        let cart = open(&storage, None);
        let product = snapshot(5);
        cart.add_item(product.clone(), 4).await.unwrap();

        cart.update_product_stock(product.id, 2).await.unwrap();
        let items = cart.items().await;
        assert_eq!(items[0].quantity, 4);
        assert_eq!(items[0].product.stock, 2);
    }

    #[tokio::test]
    async fn test_persisted_cart_survives_reopen() {
        let storage = Arc::new(MemoryStorage::new());
        let product = snapshot(5);
        {
            let cart = open(&storage, None);
            cart.add_item(product.clone(), 2).await.unwrap();
        }
        let reopened = open(&storage, None);
        assert_eq!(reopened.item_quantity(product.id).await, 2);

        reopened.clear().await.unwrap();
        assert!(storage.get(CART_STORAGE_KEY).unwrap().is_none());
        assert!(reopened.is_empty().await);
    }

    #[tokio::test]
    async fn test_watchers_see_every_change() {
        let storage = Arc::new(MemoryStorage::new());
        let cart = open(&storage, None);
        let mut watcher = cart.subscribe();

        cart.add_item(snapshot(5), 1).await.unwrap();
        watcher.changed().await.unwrap();
        assert_eq!(watcher.version(), 1);

        cart.clear().await.unwrap();
        watcher.changed().await.unwrap();
        assert_eq!(watcher.version(), 2);
    }

    #[tokio::test]
    async fn test_peer_sessions_converge_over_the_bus() {
        let storage = Arc::new(MemoryStorage::new());
        let bus = CartBus::new(16);
        let first = open(&storage, Some(bus.clone()));
        let second = open(&storage, Some(bus.clone()));
        let mut rx = bus.subscribe();
        let product = snapshot(5);

        first.add_item(product.clone(), 2).await.unwrap();
        let sync = rx.recv().await.unwrap();
        assert_eq!(sync.origin, first.session_id());

        assert!(!first.apply_remote(&sync).await);
        assert!(second.apply_remote(&sync).await);
        assert_eq!(second.item_quantity(product.id).await, 2);

        second.clear().await.unwrap();
        let sync = rx.recv().await.unwrap();
        assert!(sync.payload.is_none());
        first.apply_remote(&sync).await;
        assert!(first.is_empty().await);
    }

    #[tokio::test]
    async fn test_failed_change_is_not_committed() {
        let storage = Arc::new(MemoryStorage::new());
        let cart = open(&storage, None);
        let product = snapshot(1);
        cart.add_item(product.clone(), 1).await.unwrap();
        let watcher = cart.subscribe();

        assert!(cart.update_quantity(product.id, 2).await.is_err());
        assert!(!watcher.version_rx.has_changed().unwrap());
        assert_eq!(cart.item_quantity(product.id).await, 1);
    }
}
