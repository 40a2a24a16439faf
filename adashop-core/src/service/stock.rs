use adashop_sdk::objects::{StockReservationRequest, StockSnapshotEntry};
use time::OffsetDateTime;
use uuid::Uuid;

use super::ShopService;
use crate::backend::BackendError;
use crate::model::ReservationReport;
use crate::stock::{StockError, aggregate_lines, validate_stock_request};
use crate::store::{HoldOutcome, OrderStore};

impl<S: OrderStore> ShopService<S> {
    /// Check every line against current availability and hold all of them
    /// for `reservation_minutes`, or fail on the first line that cannot be
    /// served.
    #[tracing::instrument(skip_all, fields(lines = request.cart_items.len()))]
    pub async fn validate_and_reserve_stock(
        &self,
        request: StockReservationRequest,
    ) -> Result<ReservationReport, StockError> {
        validate_stock_request(&request.cart_items, request.reservation_minutes)?;
        let lines = aggregate_lines(&request.cart_items);
        let reservation_id = request.reservation_id.unwrap_or_else(Uuid::now_v7);
        let expires_at = OffsetDateTime::now_utc()
            + time::Duration::minutes(i64::from(request.reservation_minutes));

        match self
            .store
            .hold_stock(reservation_id, &lines, expires_at)
            .await?
        {
            HoldOutcome::Held(items) => {
                tracing::info!(
                    %reservation_id,
                    items = items.len(),
                    minutes = request.reservation_minutes,
                    "Stock reserved"
                );
                Ok(ReservationReport {
                    reservation_id,
                    expires_at,
                    items,
                })
            }
            HoldOutcome::ProductNotFound { product_id } => {
                Err(StockError::ProductNotFound { product_id })
            }
            HoldOutcome::Insufficient {
                product_id,
                product_name,
                available,
                requested,
            } => Err(StockError::InsufficientStock {
                product_id,
                product_name,
                available,
                requested,
            }),
        }
    }

    pub async fn stock_snapshot(
        &self,
        product_ids: Vec<Uuid>,
    ) -> Result<Vec<StockSnapshotEntry>, BackendError> {
        Ok(self.store.stock_levels(&product_ids).await?)
    }
}

#[cfg(test)]
mod tests {
    use adashop_sdk::objects::StockItemRequest;

    use crate::stock::StockError;
    use crate::testing::Fixture;

    use super::*;

    fn request(product_id: Uuid, quantity: u32) -> StockReservationRequest {
        StockReservationRequest {
            cart_items: vec![StockItemRequest {
                product_id,
                quantity,
            }],
            reservation_minutes: 30,
            reservation_id: None,
        }
    }

    #[tokio::test]
    async fn test_quantity_equal_to_stock_is_reserved() {
        let fx = Fixture::new();
        let report = fx
            .service
            .validate_and_reserve_stock(request(fx.ada_product.id, fx.ada_product.stock))
            .await
            .unwrap();
        assert_eq!(report.items.len(), 1);
        assert_eq!(report.items[0].available_stock, fx.ada_product.stock);
    }

    #[tokio::test]
    async fn test_one_over_stock_names_available_amount() {
        let fx = Fixture::new();
        let stock = fx.ada_product.stock;
        let err = fx
            .service
            .validate_and_reserve_stock(request(fx.ada_product.id, stock + 1))
            .await
            .unwrap_err();
        match err {
            StockError::InsufficientStock {
                available,
                requested,
                ..
            } => {
                assert_eq!(available, stock);
                assert_eq!(requested, stock + 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(fx.store.held_quantity(fx.ada_product.id), 0);
    }

    #[tokio::test]
    async fn test_unknown_product() {
        let fx = Fixture::new();
        let missing = Uuid::new_v4();
        let err = fx
            .service
            .validate_and_reserve_stock(request(missing, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, StockError::ProductNotFound { product_id } if product_id == missing));
    }

    #[tokio::test]
    async fn test_window_out_of_range_is_rejected_before_holding() {
        let fx = Fixture::new();
        let mut req = request(fx.ada_product.id, 1);
        req.reservation_minutes = 2;
        let err = fx.service.validate_and_reserve_stock(req).await.unwrap_err();
        assert!(matches!(err, StockError::InvalidWindow { minutes: 2 }));
        assert_eq!(fx.store.held_quantity(fx.ada_product.id), 0);
    }
}
