//! Stock validation and reservation payloads.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reservation window used when the request does not specify one.
pub const DEFAULT_RESERVATION_MINUTES: u32 = 30;

fn default_reservation_minutes() -> u32 {
    DEFAULT_RESERVATION_MINUTES
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StockItemRequest {
    pub product_id: Uuid,
    pub quantity: u32,
}

/// `POST /api/v1/stock/reservations`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockReservationRequest {
    pub cart_items: Vec<StockItemRequest>,
    #[serde(default = "default_reservation_minutes")]
    pub reservation_minutes: u32,
    /// Earlier reservation of the same checkout; its holds are replaced.
    #[serde(default)]
    pub reservation_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservedStockItem {
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: u32,
    pub available_stock: u32,
}

/// Machine-readable reason attached to a failed reservation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StockFailure {
    InsufficientStock {
        product_id: Uuid,
        product_name: String,
        available: u32,
        requested: u32,
    },
    ProductNotFound {
        product_id: Uuid,
    },
    InvalidRequest {
        reason: String,
    },
    Unavailable {
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockReservationResponse {
    pub success: bool,
    pub message: String,
    #[serde(default)]
    pub reservation_id: Option<Uuid>,
    /// Unix timestamp at which the hold lapses.
    #[serde(default)]
    pub expires_at: Option<i64>,
    #[serde(default)]
    pub items: Vec<ReservedStockItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<StockFailure>,
}

/// `POST /api/v1/stock/snapshot`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockSnapshotRequest {
    pub product_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockSnapshotEntry {
    pub product_id: Uuid,
    pub current_stock: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reservation_minutes_default() {
        let request: StockReservationRequest =
            serde_json::from_str(r#"{"cart_items":[]}"#).unwrap();
        assert_eq!(request.reservation_minutes, DEFAULT_RESERVATION_MINUTES);
        assert!(request.reservation_id.is_none());
    }
}
