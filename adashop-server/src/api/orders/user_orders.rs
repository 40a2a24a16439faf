use adashop_sdk::objects::{OrderResponse, UserOrdersResponse};
use axum::{
    Json,
    extract::{Path, State, rejection::PathRejection},
};

use crate::api::ApiError;
use crate::state::AppState;

/// `GET /wallets/{wallet_address}/orders`: newest first.
pub(in crate::api) async fn get_user_orders(
    state: State<AppState>,
    wallet_address: Result<Path<String>, PathRejection>,
) -> Result<Json<UserOrdersResponse>, ApiError> {
    let Path(wallet_address) = wallet_address?;
    let orders: Vec<OrderResponse> = state
        .service
        .get_user_orders(&wallet_address)
        .await?
        .into_iter()
        .map(OrderResponse::from)
        .collect();

    Ok(Json(UserOrdersResponse {
        count: orders.len(),
        orders,
    }))
}
