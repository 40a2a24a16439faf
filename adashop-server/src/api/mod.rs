//! Checkout API handlers.
//!
//! These endpoints are called by the storefront checkout (the shopper's
//! browser) and mirror the remote operations of the checkout core.
//!
//! # Endpoints
//!
//! - `POST /stock/reservations`                 – validate the cart and hold stock
//! - `POST /stock/snapshot`                     – current stock for a set of products
//! - `POST /orders`                             – create one order per currency group
//! - `POST /orders/{order_id}/status`           – record a payment outcome
//! - `GET  /orders/{order_id}?wallet_address=`  – fetch one order
//! - `GET  /wallets/{wallet_address}/orders`    – orders placed by a wallet
//! - `GET  /checkout/config`                    – checkout settings

use adashop_sdk::objects::CheckoutSettings;
use axum::{
    Json, Router,
    extract::State,
    response::IntoResponse,
    routing::{get, post},
};

use crate::state::AppState;

mod error;
mod orders;
mod stock;

pub use error::ApiError;

/// Build the checkout API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/stock/reservations", post(stock::reserve_stock))
        .route("/stock/snapshot", post(stock::stock_snapshot))
        .route("/orders", post(orders::create::create_orders))
        .route(
            "/orders/{order_id}/status",
            post(orders::update_status::update_order_status),
        )
        .route("/orders/{order_id}", get(orders::get_order::get_order))
        .route(
            "/wallets/{wallet_address}/orders",
            get(orders::user_orders::get_user_orders),
        )
        .route("/checkout/config", get(checkout_config))
}

/// `GET /checkout/config`
async fn checkout_config(state: State<AppState>) -> impl IntoResponse {
    Json(CheckoutSettings::from(state.checkout.as_ref()))
}

#[cfg(test)]
mod tests;
