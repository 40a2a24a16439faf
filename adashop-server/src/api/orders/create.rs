use adashop_sdk::objects::{CreateOrdersRequest, CreateOrdersResponse, OrderResponse};
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};

use crate::api::ApiError;
use crate::state::AppState;

/// `POST /orders`: create one `pending` order per currency group.
///
/// A failing group answers with the orders created before it alongside a
/// typed `failure`.
pub(in crate::api) async fn create_orders(
    state: State<AppState>,
    payload: Result<Json<CreateOrdersRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload?;
    let orders = state.service.create_orders(request).await?;
    let count = orders.len();

    Ok((
        StatusCode::CREATED,
        Json(CreateOrdersResponse {
            success: true,
            orders: orders.into_iter().map(OrderResponse::from).collect(),
            message: format!("{count} order(s) created"),
            failure: None,
        }),
    ))
}
