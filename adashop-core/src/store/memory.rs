use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use adashop_sdk::objects::{ReservedStockItem, StockSnapshotEntry};
use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use super::{ConfirmOutcome, HoldOutcome, OrderStore, StatusChange, StoreError};
use crate::entities::ReservationStatus;
use crate::model::{
    NewOrder, NewOrderItem, Order, OrderItem, OrderStatus, Product, ShippingInfo, StatusUpdate,
    StockItemRequest, SupportedToken,
};

/// In-process [`OrderStore`].
///
/// Follows the same hold rules as the Postgres store. The `fail_*` switches
/// make the next matching call return [`StoreError::Unavailable`] until
/// switched off again. [`MemoryStore::yield_on_status_update`] hands control
/// back to the runtime before each status write, so concurrent writers
/// interleave.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    yield_on_status_update: AtomicBool,
}

#[derive(Debug, Default)]
struct State {
    products: HashMap<Uuid, Product>,
    tokens: HashMap<Uuid, SupportedToken>,
    shipping: HashMap<String, ShippingInfo>,
    orders: Vec<StoredOrder>,
    holds: Vec<Hold>,
    faults: Faults,
}

#[derive(Debug, Default, Clone, Copy)]
struct Faults {
    shipping_upsert: bool,
    item_insert: bool,
    reservation_confirm: bool,
    status_update: bool,
}

#[derive(Debug, Clone)]
struct StoredOrder {
    order: Order,
    items: Vec<NewOrderItem>,
}

#[derive(Debug, Clone)]
struct Hold {
    reservation_id: Uuid,
    product_id: Uuid,
    order_id: Option<Uuid>,
    quantity: u32,
    status: ReservationStatus,
    expires_at: OffsetDateTime,
}

impl Hold {
    fn is_active(&self, now: OffsetDateTime) -> bool {
        self.status == ReservationStatus::Held && self.expires_at > now
    }
}

impl State {
    fn available(&self, product_id: Uuid, now: OffsetDateTime) -> Option<(&Product, u32)> {
        let product = self.products.get(&product_id).filter(|p| p.is_active)?;
        let held: u64 = self
            .holds
            .iter()
            .filter(|h| h.product_id == product_id && h.is_active(now))
            .map(|h| u64::from(h.quantity))
            .sum();
        let available = u64::from(product.stock).saturating_sub(held);
        Some((product, u32::try_from(available).unwrap_or(u32::MAX)))
    }

    fn render(&self, stored: &StoredOrder) -> Order {
        let mut order = stored.order.clone();
        order.items = stored
            .items
            .iter()
            .map(|item| OrderItem {
                product_id: item.product_id,
                product_name: Some(
                    self.products
                        .get(&item.product_id)
                        .map(|p| p.name.clone())
                        .unwrap_or_else(|| item.product_name.clone()),
                ),
                quantity: item.quantity,
                price: item.price,
                token_id: item.token_id,
            })
            .collect();
        order.token = order
            .token_id
            .and_then(|id| self.tokens.get(&id))
            .map(|t| t.descriptor.clone());
        order
    }
}

fn injected(what: &str) -> StoreError {
    StoreError::Unavailable(format!("injected {what} failure"))
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, State>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut State) -> R) -> Option<R> {
        self.state.lock().ok().map(|mut state| f(&mut state))
    }

    pub fn add_product(&self, product: Product) {
        self.with_state(|s| s.products.insert(product.id, product));
    }

    pub fn add_token(&self, token: SupportedToken) {
        self.with_state(|s| s.tokens.insert(token.descriptor.id, token));
    }

    pub fn set_price(&self, product_id: Uuid, price: u64) {
        self.with_state(|s| {
            if let Some(p) = s.products.get_mut(&product_id) {
                p.price = price;
            }
        });
    }

    pub fn set_stock(&self, product_id: Uuid, stock: u32) {
        self.with_state(|s| {
            if let Some(p) = s.products.get_mut(&product_id) {
                p.stock = stock;
            }
        });
    }

    pub fn set_token_active(&self, token_id: Uuid, active: bool) {
        self.with_state(|s| {
            if let Some(t) = s.tokens.get_mut(&token_id) {
                t.is_active = active;
            }
        });
    }

    pub fn product(&self, product_id: Uuid) -> Option<Product> {
        self.with_state(|s| s.products.get(&product_id).cloned())
            .flatten()
    }

    pub fn shipping_info(&self, wallet_address: &str) -> Option<ShippingInfo> {
        self.with_state(|s| s.shipping.get(wallet_address).cloned())
            .flatten()
    }

    /// Number of orders currently stored, across all wallets.
    pub fn order_count(&self) -> usize {
        self.with_state(|s| s.orders.len()).unwrap_or(0)
    }

    /// Quantity of `product_id` under live holds.
    pub fn held_quantity(&self, product_id: Uuid) -> u32 {
        let now = OffsetDateTime::now_utc();
        self.with_state(|s| {
            s.holds
                .iter()
                .filter(|h| h.product_id == product_id && h.is_active(now))
                .map(|h| h.quantity)
                .sum::<u32>()
        })
        .unwrap_or(0)
    }

    /// Simulate the cleanup job releasing a reservation behind the client's back.
    pub fn drop_holds(&self, reservation_id: Uuid) {
        self.with_state(|s| {
            for hold in s
                .holds
                .iter_mut()
                .filter(|h| h.reservation_id == reservation_id && h.order_id.is_none())
            {
                hold.status = ReservationStatus::Released;
            }
        });
    }

    pub fn fail_shipping_upsert(&self, fail: bool) {
        self.with_state(|s| s.faults.shipping_upsert = fail);
    }

    pub fn fail_item_insert(&self, fail: bool) {
        self.with_state(|s| s.faults.item_insert = fail);
    }

    pub fn fail_reservation_confirm(&self, fail: bool) {
        self.with_state(|s| s.faults.reservation_confirm = fail);
    }

    pub fn fail_status_update(&self, fail: bool) {
        self.with_state(|s| s.faults.status_update = fail);
    }

    pub fn yield_on_status_update(&self, on: bool) {
        self.yield_on_status_update.store(on, Ordering::Relaxed);
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn products_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Product>, StoreError> {
        let state = self.state()?;
        Ok(ids
            .iter()
            .filter_map(|id| state.products.get(id).cloned())
            .collect())
    }

    async fn supported_token(&self, id: Uuid) -> Result<Option<SupportedToken>, StoreError> {
        Ok(self.state()?.tokens.get(&id).cloned())
    }

    async fn upsert_shipping_info(
        &self,
        wallet_address: &str,
        info: &ShippingInfo,
    ) -> Result<(), StoreError> {
        let mut state = self.state()?;
        if state.faults.shipping_upsert {
            return Err(injected("shipping upsert"));
        }
        state
            .shipping
            .insert(wallet_address.to_string(), info.clone());
        Ok(())
    }

    async fn hold_stock(
        &self,
        reservation_id: Uuid,
        lines: &[StockItemRequest],
        expires_at: OffsetDateTime,
    ) -> Result<HoldOutcome, StoreError> {
        let now = OffsetDateTime::now_utc();
        let mut state = self.state()?;

        // Availability is judged without this reservation's previous holds,
        // but they are only released once the new hold is known to succeed.
        let previous: Vec<usize> = state
            .holds
            .iter()
            .enumerate()
            .filter(|(_, h)| {
                h.reservation_id == reservation_id && h.order_id.is_none() && h.is_active(now)
            })
            .map(|(i, _)| i)
            .collect();
        for &i in &previous {
            state.holds[i].status = ReservationStatus::Released;
        }

        let mut held = Vec::with_capacity(lines.len());
        let mut outcome = None;
        for line in lines {
            match state.available(line.product_id, now) {
                None => {
                    outcome = Some(HoldOutcome::ProductNotFound {
                        product_id: line.product_id,
                    });
                    break;
                }
                Some((product, available)) if available < line.quantity => {
                    outcome = Some(HoldOutcome::Insufficient {
                        product_id: line.product_id,
                        product_name: product.name.clone(),
                        available,
                        requested: line.quantity,
                    });
                    break;
                }
                Some((product, available)) => held.push(ReservedStockItem {
                    product_id: line.product_id,
                    product_name: product.name.clone(),
                    quantity: line.quantity,
                    available_stock: available,
                }),
            }
        }

        if let Some(outcome) = outcome {
            for &i in &previous {
                state.holds[i].status = ReservationStatus::Held;
            }
            return Ok(outcome);
        }

        for line in lines {
            state.holds.push(Hold {
                reservation_id,
                product_id: line.product_id,
                order_id: None,
                quantity: line.quantity,
                status: ReservationStatus::Held,
                expires_at,
            });
        }
        Ok(HoldOutcome::Held(held))
    }

    async fn insert_order(&self, new_order: NewOrder) -> Result<Order, StoreError> {
        let order = Order {
            id: Uuid::now_v7(),
            wallet_address: new_order.wallet_address,
            total_amount: new_order.total_amount,
            status: OrderStatus::Pending,
            cardano_tx_hash: None,
            payment_error: None,
            token_id: new_order.token_id,
            token: None,
            items: Vec::new(),
            created_at: OffsetDateTime::now_utc(),
        };
        self.state()?.orders.push(StoredOrder {
            order: order.clone(),
            items: Vec::new(),
        });
        Ok(order)
    }

    async fn insert_order_items(
        &self,
        order_id: Uuid,
        items: &[NewOrderItem],
    ) -> Result<(), StoreError> {
        let mut state = self.state()?;
        if state.faults.item_insert {
            return Err(injected("order item insert"));
        }
        let stored = state
            .orders
            .iter_mut()
            .find(|o| o.order.id == order_id)
            .ok_or_else(|| StoreError::InvalidData(format!("order {order_id} not found")))?;
        stored.items.extend_from_slice(items);
        Ok(())
    }

    async fn confirm_reservation(
        &self,
        order_id: Uuid,
        reservation_id: Option<Uuid>,
        lines: &[StockItemRequest],
        expires_at: OffsetDateTime,
    ) -> Result<ConfirmOutcome, StoreError> {
        let now = OffsetDateTime::now_utc();
        let mut state = self.state()?;
        if state.faults.reservation_confirm {
            return Err(injected("reservation confirmation"));
        }

        let mut bind = Vec::new();
        let mut stale = Vec::new();
        let mut lost = Vec::new();
        for line in lines {
            let holds: Vec<usize> = state
                .holds
                .iter()
                .enumerate()
                .filter(|(_, h)| {
                    Some(h.reservation_id) == reservation_id
                        && h.product_id == line.product_id
                        && h.order_id.is_none()
                        && h.is_active(now)
                })
                .map(|(i, _)| i)
                .collect();
            let held: u32 = holds.iter().map(|&i| state.holds[i].quantity).sum();
            if !holds.is_empty() && held == line.quantity {
                bind.extend(holds);
            } else {
                stale.extend(holds);
                lost.push(*line);
            }
        }

        for &i in &stale {
            state.holds[i].status = ReservationStatus::Released;
        }
        for line in &lost {
            let available = state
                .available(line.product_id, now)
                .map(|(_, available)| available)
                .unwrap_or(0);
            if available < line.quantity {
                for &i in &stale {
                    state.holds[i].status = ReservationStatus::Held;
                }
                return Ok(ConfirmOutcome::Insufficient {
                    product_id: line.product_id,
                    available,
                    requested: line.quantity,
                });
            }
        }

        for &i in &bind {
            state.holds[i].order_id = Some(order_id);
            state.holds[i].expires_at = expires_at;
        }
        let reservation_id = reservation_id.unwrap_or_else(Uuid::now_v7);
        for line in lost {
            state.holds.push(Hold {
                reservation_id,
                product_id: line.product_id,
                order_id: Some(order_id),
                quantity: line.quantity,
                status: ReservationStatus::Held,
                expires_at,
            });
        }
        Ok(ConfirmOutcome::Confirmed)
    }

    async fn delete_order(&self, order_id: Uuid) -> Result<(), StoreError> {
        let mut state = self.state()?;
        state.orders.retain(|o| o.order.id != order_id);
        for hold in state.holds.iter_mut().filter(|h| h.order_id == Some(order_id)) {
            hold.order_id = None;
        }
        Ok(())
    }

    async fn update_order_status(
        &self,
        update: &StatusUpdate,
    ) -> Result<StatusChange, StoreError> {
        if self.yield_on_status_update.load(Ordering::Relaxed) {
            tokio::task::yield_now().await;
        }
        let mut state = self.state()?;
        if state.faults.status_update {
            return Err(injected("status update"));
        }
        let Some(stored) = state
            .orders
            .iter_mut()
            .find(|o| o.order.id == update.order_id)
        else {
            return Ok(StatusChange::NotFound);
        };
        let from = stored.order.status;
        if !from.accepts(update.status) {
            return Ok(StatusChange::Refused { current: from });
        }
        stored.order.status = update.status;
        if let Some(hash) = &update.tx_hash {
            stored.order.cardano_tx_hash = Some(hash.clone());
        }
        if let Some(error) = &update.error {
            stored.order.payment_error = Some(error.clone());
        }

        let order_id = update.order_id;
        if update.status == OrderStatus::Paid {
            let mut consumed: HashMap<Uuid, u32> = HashMap::new();
            for hold in state
                .holds
                .iter_mut()
                .filter(|h| h.order_id == Some(order_id) && h.status == ReservationStatus::Held)
            {
                hold.status = ReservationStatus::Consumed;
                *consumed.entry(hold.product_id).or_default() += hold.quantity;
            }
            for (product_id, quantity) in consumed {
                if let Some(product) = state.products.get_mut(&product_id) {
                    product.stock = product.stock.saturating_sub(quantity);
                }
            }
        } else if update.status.releases_stock() {
            for hold in state
                .holds
                .iter_mut()
                .filter(|h| h.order_id == Some(order_id) && h.status == ReservationStatus::Held)
            {
                hold.status = ReservationStatus::Released;
            }
        }

        let stored = state.orders.iter().find(|o| o.order.id == order_id);
        Ok(match stored {
            Some(o) => StatusChange::Updated {
                from,
                order: state.render(o),
            },
            None => StatusChange::NotFound,
        })
    }

    async fn get_order(
        &self,
        order_id: Uuid,
        wallet_address: Option<&str>,
    ) -> Result<Option<Order>, StoreError> {
        let state = self.state()?;
        Ok(state
            .orders
            .iter()
            .find(|o| {
                o.order.id == order_id
                    && wallet_address.is_none_or(|w| o.order.wallet_address == w)
            })
            .map(|o| state.render(o)))
    }

    async fn orders_by_wallet(&self, wallet_address: &str) -> Result<Vec<Order>, StoreError> {
        let state = self.state()?;
        let mut orders: Vec<Order> = state
            .orders
            .iter()
            .rev()
            .filter(|o| o.order.wallet_address == wallet_address)
            .map(|o| state.render(o))
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn stock_levels(
        &self,
        product_ids: &[Uuid],
    ) -> Result<Vec<StockSnapshotEntry>, StoreError> {
        let state = self.state()?;
        Ok(product_ids
            .iter()
            .map(|id| StockSnapshotEntry {
                product_id: *id,
                current_stock: state
                    .products
                    .get(id)
                    .filter(|p| p.is_active)
                    .map(|p| p.stock)
                    .unwrap_or(0),
            })
            .collect())
    }
}
