use adashop_core::model::StatusUpdate;
use adashop_sdk::objects::{UpdateOrderStatusRequest, UpdateOrderStatusResponse};
use axum::{
    Json,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    response::IntoResponse,
};
use uuid::Uuid;

use crate::api::ApiError;
use crate::state::AppState;

/// `POST /orders/{order_id}/status`: record a payment outcome or a
/// fulfilment step.
pub(in crate::api) async fn update_order_status(
    state: State<AppState>,
    order_id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdateOrderStatusRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(order_id) = order_id?;
    let Json(request) = payload?;

    let order = state
        .service
        .update_order_status(StatusUpdate {
            order_id,
            status: request.status.into(),
            tx_hash: request.tx_hash,
            error: request.error,
        })
        .await?;

    Ok(Json(UpdateOrderStatusResponse {
        success: true,
        message: format!("Order status updated to {}", order.status),
        order: Some(order.into()),
    }))
}
