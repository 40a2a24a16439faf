use adashop_sdk::objects::{GetOrderQuery, OrderResponse};
use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{PathRejection, QueryRejection},
    },
};
use uuid::Uuid;

use crate::api::ApiError;
use crate::state::AppState;

/// `GET /orders/{order_id}`: one order with its items and token.
///
/// With `wallet_address` set, orders placed by another wallet are reported
/// as not found.
pub(in crate::api) async fn get_order(
    state: State<AppState>,
    order_id: Result<Path<Uuid>, PathRejection>,
    query: Result<Query<GetOrderQuery>, QueryRejection>,
) -> Result<Json<OrderResponse>, ApiError> {
    let Path(order_id) = order_id?;
    let Query(query) = query?;

    let order = state
        .service
        .get_order(order_id, query.wallet_address.as_deref())
        .await?;
    Ok(Json(order.into()))
}
