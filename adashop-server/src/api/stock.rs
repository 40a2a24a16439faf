use adashop_sdk::objects::{
    StockReservationRequest, StockReservationResponse, StockSnapshotEntry, StockSnapshotRequest,
};
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    response::IntoResponse,
};

use super::ApiError;
use crate::state::AppState;

/// `POST /stock/reservations`: validate the cart and hold every line.
///
/// Sending the `reservation_id` of an earlier answer renews that hold
/// instead of adding a second one.
pub(super) async fn reserve_stock(
    state: State<AppState>,
    payload: Result<Json<StockReservationRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload?;
    let report = state.service.validate_and_reserve_stock(request).await?;

    Ok(Json(StockReservationResponse {
        success: true,
        message: "Stock validated and reserved".to_string(),
        reservation_id: Some(report.reservation_id),
        expires_at: Some(report.expires_at.unix_timestamp()),
        items: report.items,
        failure: None,
    }))
}

/// `POST /stock/snapshot`: on-hand stock, without holding anything.
pub(super) async fn stock_snapshot(
    state: State<AppState>,
    payload: Result<Json<StockSnapshotRequest>, JsonRejection>,
) -> Result<Json<Vec<StockSnapshotEntry>>, ApiError> {
    let Json(request) = payload?;
    let entries = state.service.stock_snapshot(request.product_ids).await?;
    Ok(Json(entries))
}
