use std::collections::HashMap;

use adashop_sdk::objects::{ReservedStockItem, StockSnapshotEntry};
use async_trait::async_trait;
use kanau::processor::Processor;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use super::{ConfirmOutcome, HoldOutcome, OrderStore, StatusChange, StoreError};
use crate::currency::TokenDescriptor;
use crate::entities::order_items::{GetOrderItems, InsertOrderItems, OrderItemInsert, OrderItemRow};
use crate::entities::orders::{
    DeleteOrder, GetOrderById, GetOrdersByWallet, InsertOrder, OrderRow,
};
use crate::entities::products::{GetProductsByIds, GetStockLevels, ProductRow};
use crate::entities::shipping_info::UpsertShippingInfo;
use crate::entities::stock_reservations::{HoldInsert, StockReservation};
use crate::entities::supported_tokens::{GetSupportedTokensByIds, SupportedTokenRow};
use crate::framework::DatabaseProcessor;
use crate::model::{
    NewOrder, NewOrderItem, Order, OrderItem, OrderStatus, Product, ShippingInfo, StatusUpdate,
    StockItemRequest, SupportedToken,
};

/// [`OrderStore`] on Postgres.
#[derive(Debug, Clone)]
pub struct PgStore {
    db: DatabaseProcessor,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            db: DatabaseProcessor::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.db.pool
    }

    /// Attach items and token metadata to bare order rows.
    async fn hydrate(&self, rows: Vec<OrderRow>) -> Result<Vec<Order>, StoreError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let order_ids = rows.iter().map(|r| r.id).collect();
        let token_ids: Vec<Uuid> = rows.iter().filter_map(|r| r.token_id).collect();

        let item_rows = self.db.process(GetOrderItems { order_ids }).await?;
        let token_rows = self
            .db
            .process(GetSupportedTokensByIds { ids: token_ids })
            .await?;

        let mut items: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
        for row in item_rows {
            let order_id = row.order_id;
            items.entry(order_id).or_default().push(order_item(row)?);
        }
        let mut tokens = HashMap::new();
        for row in token_rows {
            let token = supported_token(row)?;
            tokens.insert(token.descriptor.id, token.descriptor);
        }

        rows.into_iter()
            .map(|row| {
                let order_items = items.remove(&row.id).unwrap_or_default();
                let token = row.token_id.and_then(|id| tokens.get(&id).cloned());
                order(row, order_items, token)
            })
            .collect()
    }
}

fn to_u64(value: i64, what: &str) -> Result<u64, StoreError> {
    u64::try_from(value).map_err(|_| StoreError::InvalidData(format!("negative {what}: {value}")))
}

fn to_u32(value: i64, what: &str) -> Result<u32, StoreError> {
    u32::try_from(value).map_err(|_| StoreError::InvalidData(format!("{what} out of range: {value}")))
}

fn to_i64(value: u64, what: &str) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| StoreError::InvalidData(format!("{what} too large: {value}")))
}

fn to_i32(value: u32, what: &str) -> Result<i32, StoreError> {
    i32::try_from(value).map_err(|_| StoreError::InvalidData(format!("{what} too large: {value}")))
}

fn product(row: ProductRow) -> Result<Product, StoreError> {
    Ok(Product {
        id: row.id,
        name: row.name,
        price: to_u64(row.price, "price")?,
        token_id: row.token_id,
        stock: to_u32(i64::from(row.stock), "stock")?,
        is_active: row.is_active,
    })
}

fn supported_token(row: SupportedTokenRow) -> Result<SupportedToken, StoreError> {
    let decimals = u8::try_from(row.decimals)
        .map_err(|_| StoreError::InvalidData(format!("token decimals: {}", row.decimals)))?;
    Ok(SupportedToken {
        descriptor: TokenDescriptor {
            id: row.id,
            policy_id: row.policy_id.into(),
            asset_name: row.asset_name.into(),
            display_name: row.display_name.map(Into::into),
            decimals,
        },
        is_active: row.is_active,
    })
}

fn order_item(row: OrderItemRow) -> Result<OrderItem, StoreError> {
    Ok(OrderItem {
        product_id: row.product_id,
        product_name: row.product_name,
        quantity: to_u32(i64::from(row.quantity), "quantity")?,
        price: to_u64(row.price, "price")?,
        token_id: row.token_id,
    })
}

fn order(
    row: OrderRow,
    items: Vec<OrderItem>,
    token: Option<TokenDescriptor>,
) -> Result<Order, StoreError> {
    Ok(Order {
        id: row.id,
        wallet_address: row.wallet_address,
        total_amount: to_u64(row.total_amount, "total amount")?,
        status: row.status,
        cardano_tx_hash: row.cardano_tx_hash,
        payment_error: row.payment_error,
        token_id: row.token_id,
        token,
        items,
        created_at: row.created_at,
    })
}

#[async_trait]
impl OrderStore for PgStore {
    async fn products_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Product>, StoreError> {
        let rows = self
            .db
            .process(GetProductsByIds { ids: ids.to_vec() })
            .await?;
        rows.into_iter().map(product).collect()
    }

    async fn supported_token(&self, id: Uuid) -> Result<Option<SupportedToken>, StoreError> {
        let rows = self
            .db
            .process(GetSupportedTokensByIds { ids: vec![id] })
            .await?;
        rows.into_iter().next().map(supported_token).transpose()
    }

    async fn upsert_shipping_info(
        &self,
        wallet_address: &str,
        info: &ShippingInfo,
    ) -> Result<(), StoreError> {
        self.db
            .process(UpsertShippingInfo {
                wallet_address: wallet_address.to_string(),
                info: info.clone(),
            })
            .await?;
        Ok(())
    }

    async fn hold_stock(
        &self,
        reservation_id: Uuid,
        lines: &[StockItemRequest],
        expires_at: OffsetDateTime,
    ) -> Result<HoldOutcome, StoreError> {
        let mut tx = self.db.pool.begin().await?;
        StockReservation::release_unbound_tx(&mut tx, reservation_id).await?;

        let ids: Vec<Uuid> = lines.iter().map(|l| l.product_id).collect();
        let availability: HashMap<Uuid, _> =
            StockReservation::lock_availability_tx(&mut tx, &ids)
                .await?
                .into_iter()
                .map(|row| (row.id, row))
                .collect();

        let mut held = Vec::with_capacity(lines.len());
        let mut inserts = Vec::with_capacity(lines.len());
        for line in lines {
            let Some(row) = availability.get(&line.product_id).filter(|r| r.is_active) else {
                tx.rollback().await?;
                return Ok(HoldOutcome::ProductNotFound {
                    product_id: line.product_id,
                });
            };
            let available = to_u32(row.available(), "available stock")?;
            if available < line.quantity {
                tx.rollback().await?;
                return Ok(HoldOutcome::Insufficient {
                    product_id: line.product_id,
                    product_name: row.name.clone(),
                    available,
                    requested: line.quantity,
                });
            }
            inserts.push(HoldInsert {
                product_id: line.product_id,
                quantity: to_i32(line.quantity, "quantity")?,
            });
            held.push(ReservedStockItem {
                product_id: line.product_id,
                product_name: row.name.clone(),
                quantity: line.quantity,
                available_stock: available,
            });
        }

        StockReservation::insert_holds_tx(&mut tx, reservation_id, None, inserts, expires_at)
            .await?;
        tx.commit().await?;
        Ok(HoldOutcome::Held(held))
    }

    async fn insert_order(&self, new_order: NewOrder) -> Result<Order, StoreError> {
        let row = self
            .db
            .process(InsertOrder {
                id: Uuid::now_v7(),
                wallet_address: new_order.wallet_address,
                total_amount: to_i64(new_order.total_amount, "total amount")?,
                token_id: new_order.token_id,
            })
            .await?;
        order(row, Vec::new(), None)
    }

    async fn insert_order_items(
        &self,
        order_id: Uuid,
        items: &[NewOrderItem],
    ) -> Result<(), StoreError> {
        let items = items
            .iter()
            .map(|item| {
                Ok(OrderItemInsert {
                    product_id: item.product_id,
                    quantity: to_i32(item.quantity, "quantity")?,
                    price: to_i64(item.price, "price")?,
                    token_id: item.token_id,
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()?;
        self.db.process(InsertOrderItems { order_id, items }).await?;
        Ok(())
    }

    async fn confirm_reservation(
        &self,
        order_id: Uuid,
        reservation_id: Option<Uuid>,
        lines: &[StockItemRequest],
        expires_at: OffsetDateTime,
    ) -> Result<ConfirmOutcome, StoreError> {
        let mut tx = self.db.pool.begin().await?;
        let ids: Vec<Uuid> = lines.iter().map(|l| l.product_id).collect();

        let mut existing: HashMap<Uuid, Vec<StockReservation>> = HashMap::new();
        if let Some(reservation_id) = reservation_id {
            for hold in StockReservation::active_unbound_tx(&mut tx, reservation_id, &ids).await? {
                existing.entry(hold.product_id).or_default().push(hold);
            }
        }

        let mut bind = Vec::new();
        let mut stale = Vec::new();
        let mut lost = Vec::new();
        for line in lines {
            let holds = existing.remove(&line.product_id).unwrap_or_default();
            let held: i64 = holds.iter().map(|h| i64::from(h.quantity)).sum();
            if !holds.is_empty() && held == i64::from(line.quantity) {
                bind.extend(holds.iter().map(|h| h.id));
            } else {
                stale.extend(holds.iter().map(|h| h.id));
                lost.push(*line);
            }
        }
        StockReservation::release_by_ids_tx(&mut tx, &stale).await?;

        if !lost.is_empty() {
            let lost_ids: Vec<Uuid> = lost.iter().map(|l| l.product_id).collect();
            let availability: HashMap<Uuid, _> =
                StockReservation::lock_availability_tx(&mut tx, &lost_ids)
                    .await?
                    .into_iter()
                    .map(|row| (row.id, row))
                    .collect();
            let mut inserts = Vec::with_capacity(lost.len());
            for line in &lost {
                let available = match availability.get(&line.product_id) {
                    Some(row) if row.is_active => to_u32(row.available(), "available stock")?,
                    _ => 0,
                };
                if available < line.quantity {
                    tx.rollback().await?;
                    return Ok(ConfirmOutcome::Insufficient {
                        product_id: line.product_id,
                        available,
                        requested: line.quantity,
                    });
                }
                inserts.push(HoldInsert {
                    product_id: line.product_id,
                    quantity: to_i32(line.quantity, "quantity")?,
                });
            }
            tracing::debug!(
                %order_id,
                lines = inserts.len(),
                "Re-holding stock for lines without a live reservation"
            );
            StockReservation::insert_holds_tx(
                &mut tx,
                reservation_id.unwrap_or_else(Uuid::now_v7),
                Some(order_id),
                inserts,
                expires_at,
            )
            .await?;
        }

        StockReservation::bind_to_order_tx(&mut tx, &bind, order_id, expires_at).await?;
        tx.commit().await?;
        Ok(ConfirmOutcome::Confirmed)
    }

    async fn delete_order(&self, order_id: Uuid) -> Result<(), StoreError> {
        self.db.process(DeleteOrder { id: order_id }).await?;
        Ok(())
    }

    async fn update_order_status(
        &self,
        update: &StatusUpdate,
    ) -> Result<StatusChange, StoreError> {
        let mut tx = self.db.pool.begin().await?;
        let Some(current) = OrderRow::lock_status_tx(&mut tx, update.order_id).await? else {
            tx.rollback().await?;
            return Ok(StatusChange::NotFound);
        };
        if !current.accepts(update.status) {
            tx.rollback().await?;
            return Ok(StatusChange::Refused { current });
        }
        let found = OrderRow::update_status_tx(
            &mut tx,
            update.order_id,
            update.status,
            update.tx_hash.as_deref(),
            update.error.as_deref(),
        )
        .await?;
        if !found {
            tx.rollback().await?;
            return Ok(StatusChange::NotFound);
        }
        if update.status == OrderStatus::Paid {
            StockReservation::consume_for_order_tx(&mut tx, update.order_id).await?;
        } else if update.status.releases_stock() {
            StockReservation::release_for_order_tx(&mut tx, update.order_id).await?;
        }
        tx.commit().await?;
        Ok(match self.get_order(update.order_id, None).await? {
            Some(order) => StatusChange::Updated {
                from: current,
                order,
            },
            None => StatusChange::NotFound,
        })
    }

    async fn get_order(
        &self,
        order_id: Uuid,
        wallet_address: Option<&str>,
    ) -> Result<Option<Order>, StoreError> {
        let row = self
            .db
            .process(GetOrderById {
                id: order_id,
                wallet_address: wallet_address.map(str::to_string),
            })
            .await?;
        match row {
            Some(row) => Ok(self.hydrate(vec![row]).await?.into_iter().next()),
            None => Ok(None),
        }
    }

    async fn orders_by_wallet(&self, wallet_address: &str) -> Result<Vec<Order>, StoreError> {
        let rows = self
            .db
            .process(GetOrdersByWallet {
                wallet_address: wallet_address.to_string(),
            })
            .await?;
        self.hydrate(rows).await
    }

    async fn stock_levels(
        &self,
        product_ids: &[Uuid],
    ) -> Result<Vec<StockSnapshotEntry>, StoreError> {
        let levels: HashMap<Uuid, i32> = self
            .db
            .process(GetStockLevels {
                ids: product_ids.to_vec(),
            })
            .await?
            .into_iter()
            .map(|row| (row.id, row.stock))
            .collect();
        product_ids
            .iter()
            .map(|id| {
                let stock = levels.get(id).copied().unwrap_or(0);
                Ok(StockSnapshotEntry {
                    product_id: *id,
                    current_stock: to_u32(i64::from(stock), "stock")?,
                })
            })
            .collect()
    }
}
