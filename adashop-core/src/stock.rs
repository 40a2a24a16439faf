//! Stock validation and reservation, as seen from the checkout.
//!
//! Requests are checked locally before any remote call. A failed reservation
//! is never retried automatically: the shopper has to change the cart first.

use std::collections::HashMap;

use adashop_sdk::objects::{StockFailure, StockItemRequest};
use uuid::Uuid;

use crate::backend::{BackendError, ShopBackend};
use crate::cart::CartItem;
use crate::config::validate_reservation_window;
use crate::model::ReservationReport;
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum StockError {
    #[error("No items to reserve")]
    EmptyRequest,
    #[error("Quantity for product {product_id} must be at least 1")]
    InvalidQuantity { product_id: Uuid },
    #[error("Reservation window must be between 5 and 120 minutes, got {minutes}")]
    InvalidWindow { minutes: u32 },
    #[error("Product {product_id} not found or deleted")]
    ProductNotFound { product_id: Uuid },
    #[error(
        "Insufficient stock for product \"{product_name}\". Available: {available}, Requested: {requested}"
    )]
    InsufficientStock {
        product_id: Uuid,
        product_name: String,
        available: u32,
        requested: u32,
    },
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl From<StoreError> for StockError {
    fn from(value: StoreError) -> Self {
        StockError::Backend(BackendError::Store(value))
    }
}

impl StockError {
    /// Shortage or missing product: the cart has to change before retrying.
    pub fn requires_cart_change(&self) -> bool {
        matches!(
            self,
            StockError::ProductNotFound { .. } | StockError::InsufficientStock { .. }
        )
    }

    /// Wire form of the error.
    pub fn to_failure(&self) -> StockFailure {
        match self {
            StockError::EmptyRequest
            | StockError::InvalidQuantity { .. }
            | StockError::InvalidWindow { .. } => StockFailure::InvalidRequest {
                reason: self.to_string(),
            },
            StockError::ProductNotFound { product_id } => StockFailure::ProductNotFound {
                product_id: *product_id,
            },
            StockError::InsufficientStock {
                product_id,
                product_name,
                available,
                requested,
            } => StockFailure::InsufficientStock {
                product_id: *product_id,
                product_name: product_name.clone(),
                available: *available,
                requested: *requested,
            },
            StockError::Backend(e) => StockFailure::Unavailable {
                reason: e.to_string(),
            },
        }
    }

    pub fn from_failure(failure: StockFailure) -> Self {
        match failure {
            StockFailure::InsufficientStock {
                product_id,
                product_name,
                available,
                requested,
            } => StockError::InsufficientStock {
                product_id,
                product_name,
                available,
                requested,
            },
            StockFailure::ProductNotFound { product_id } => {
                StockError::ProductNotFound { product_id }
            }
            StockFailure::InvalidRequest { reason } => {
                StockError::Backend(BackendError::Rejected(reason))
            }
            StockFailure::Unavailable { reason } => {
                StockError::Backend(BackendError::Transport(reason))
            }
        }
    }
}

/// Shape checks shared by the gateway and the backend service.
pub fn validate_stock_request(
    items: &[StockItemRequest],
    reservation_minutes: u32,
) -> Result<(), StockError> {
    if items.is_empty() {
        return Err(StockError::EmptyRequest);
    }
    if let Some(item) = items.iter().find(|i| i.quantity == 0) {
        return Err(StockError::InvalidQuantity {
            product_id: item.product_id,
        });
    }
    validate_reservation_window(reservation_minutes).map_err(|_| StockError::InvalidWindow {
        minutes: reservation_minutes,
    })
}

/// Merge repeated products into one line each, keeping first-seen order.
pub fn aggregate_lines(items: &[StockItemRequest]) -> Vec<StockItemRequest> {
    let mut index: HashMap<Uuid, usize> = HashMap::with_capacity(items.len());
    let mut lines: Vec<StockItemRequest> = Vec::with_capacity(items.len());
    for item in items {
        match index.get(&item.product_id) {
            Some(&i) => lines[i].quantity = lines[i].quantity.saturating_add(item.quantity),
            None => {
                index.insert(item.product_id, lines.len());
                lines.push(*item);
            }
        }
    }
    lines
}

/// Stock of one cart line compared with what the cart asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockValidation {
    pub product_id: Uuid,
    pub current_stock: u32,
    pub requested: u32,
}

impl StockValidation {
    pub fn has_stock_issue(&self) -> bool {
        self.current_stock < self.requested
    }
}

/// Client side of validate-and-reserve and of the pre-checkout stock snapshot.
#[derive(Debug, Clone)]
pub struct StockGateway<B> {
    backend: B,
}

impl<B: ShopBackend> StockGateway<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Validate locally, then ask the backend to hold every line.
    ///
    /// Passing the `renew` id of an earlier reservation replaces its holds
    /// instead of stacking new ones on top.
    #[tracing::instrument(skip_all, fields(lines = items.len(), minutes = reservation_minutes))]
    pub async fn validate_and_reserve(
        &self,
        items: &[StockItemRequest],
        reservation_minutes: u32,
        renew: Option<Uuid>,
    ) -> Result<ReservationReport, StockError> {
        validate_stock_request(items, reservation_minutes)?;
        let request = adashop_sdk::objects::StockReservationRequest {
            cart_items: aggregate_lines(items),
            reservation_minutes,
            reservation_id: renew,
        };
        match self.backend.validate_and_reserve_stock(request).await {
            Ok(report) => {
                tracing::debug!(reservation_id = %report.reservation_id, "Stock reserved");
                Ok(report)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Stock reservation refused");
                Err(e)
            }
        }
    }

    /// Current stock for every cart line.
    ///
    /// If the snapshot cannot be fetched the cart's own stock values are used,
    /// so a flaky backend never blocks the review step on its own.
    pub async fn validate_cart_stock(&self, items: &[CartItem]) -> Vec<StockValidation> {
        let ids = items.iter().map(|i| i.product_id).collect();
        let current: HashMap<Uuid, u32> = match self.backend.stock_snapshot(ids).await {
            Ok(entries) => entries
                .into_iter()
                .map(|e| (e.product_id, e.current_stock))
                .collect(),
            Err(e) => {
                tracing::warn!(error = %e, "Stock snapshot failed, using cart stock values");
                items.iter().map(|i| (i.product_id, i.product.stock)).collect()
            }
        };
        items
            .iter()
            .map(|item| StockValidation {
                product_id: item.product_id,
                current_stock: current.get(&item.product_id).copied().unwrap_or(0),
                requested: item.quantity,
            })
            .collect()
    }
}
