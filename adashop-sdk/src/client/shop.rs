//! Storefront API client (checkout frontend → adashop server).

use reqwest::{Client, StatusCode};
use url::Url;
use uuid::Uuid;

use super::ClientError;
use crate::objects::{
    CheckoutSettings, CreateOrdersRequest, CreateOrdersResponse, OrderResponse,
    StockReservationRequest, StockReservationResponse, StockSnapshotEntry, StockSnapshotRequest,
    UpdateOrderStatusRequest, UpdateOrderStatusResponse, UserOrdersResponse,
};

/// Typed HTTP client for the checkout API.
///
/// Reservation and order creation answer business failures with a 4xx
/// status and a typed body (`success: false` plus `failure`). Those bodies
/// are returned as `Ok` so callers can inspect the failure kind; every other
/// non-2xx status becomes [`ClientError::Api`].
#[derive(Debug, Clone)]
pub struct ShopClient {
    http: Client,
    base_url: Url,
}

impl ShopClient {
    /// * `base_url` – root URL of the adashop server (e.g. `https://shop.example.com`).
    pub fn new(base_url: Url) -> Self {
        Self {
            http: Client::new(),
            base_url,
        }
    }

    /// Replace the default `reqwest::Client` with a custom one (e.g. to
    /// configure timeouts or a proxy).
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    /// `POST /api/v1/stock/reservations` – validate the cart and hold stock.
    pub async fn reserve_stock(
        &self,
        request: &StockReservationRequest,
    ) -> Result<StockReservationResponse, ClientError> {
        let url = self.base_url.join("/api/v1/stock/reservations")?;
        let resp = self.http.post(url).json(request).send().await?;
        parse_typed_failure(resp).await
    }

    /// `POST /api/v1/stock/snapshot` – current stock for a set of products.
    pub async fn stock_snapshot(
        &self,
        product_ids: Vec<Uuid>,
    ) -> Result<Vec<StockSnapshotEntry>, ClientError> {
        let url = self.base_url.join("/api/v1/stock/snapshot")?;
        let resp = self
            .http
            .post(url)
            .json(&StockSnapshotRequest { product_ids })
            .send()
            .await?;
        parse_response(resp).await
    }

    /// `POST /api/v1/orders` – create one order per currency group.
    pub async fn create_orders(
        &self,
        request: &CreateOrdersRequest,
    ) -> Result<CreateOrdersResponse, ClientError> {
        let url = self.base_url.join("/api/v1/orders")?;
        let resp = self.http.post(url).json(request).send().await?;
        parse_typed_failure(resp).await
    }

    /// `POST /api/v1/orders/{order_id}/status` – record a payment outcome.
    pub async fn update_order_status(
        &self,
        order_id: Uuid,
        request: &UpdateOrderStatusRequest,
    ) -> Result<UpdateOrderStatusResponse, ClientError> {
        let url = self
            .base_url
            .join(&format!("/api/v1/orders/{order_id}/status"))?;
        let resp = self.http.post(url).json(request).send().await?;
        parse_response(resp).await
    }

    /// `GET /api/v1/orders/{order_id}` – fetch one order, optionally scoped
    /// to the wallet that placed it.
    pub async fn get_order(
        &self,
        order_id: Uuid,
        wallet_address: Option<&str>,
    ) -> Result<OrderResponse, ClientError> {
        let mut url = self.base_url.join(&format!("/api/v1/orders/{order_id}"))?;
        if let Some(wallet) = wallet_address {
            url.query_pairs_mut().append_pair("wallet_address", wallet);
        }
        let resp = self.http.get(url).send().await?;
        parse_response(resp).await
    }

    /// `GET /api/v1/wallets/{wallet_address}/orders` – newest first.
    pub async fn get_user_orders(
        &self,
        wallet_address: &str,
    ) -> Result<UserOrdersResponse, ClientError> {
        let url = self.base_url.join(&format!(
            "/api/v1/wallets/{}/orders",
            urlencoding::encode(wallet_address)
        ))?;
        let resp = self.http.get(url).send().await?;
        parse_response(resp).await
    }

    /// `GET /api/v1/checkout/config`
    pub async fn checkout_settings(&self) -> Result<CheckoutSettings, ClientError> {
        let url = self.base_url.join("/api/v1/checkout/config")?;
        let resp = self.http.get(url).send().await?;
        parse_response(resp).await
    }
}

async fn parse_response<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, ClientError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ClientError::Api { status, body });
    }
    let bytes = resp.bytes().await?;
    serde_json::from_slice(&bytes).map_err(ClientError::Json)
}

/// Like [`parse_response`], but also decodes the typed failure bodies the
/// server sends with 400 / 404 / 409 / 422.
async fn parse_typed_failure<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, ClientError> {
    let status = resp.status();
    if status.is_success() {
        let bytes = resp.bytes().await?;
        return serde_json::from_slice(&bytes).map_err(ClientError::Json);
    }
    let typed_failure = matches!(
        status,
        StatusCode::BAD_REQUEST
            | StatusCode::NOT_FOUND
            | StatusCode::CONFLICT
            | StatusCode::UNPROCESSABLE_ENTITY
    );
    let body = resp.text().await.unwrap_or_default();
    if typed_failure {
        if let Ok(parsed) = serde_json::from_str(&body) {
            return Ok(parsed);
        }
    }
    Err(ClientError::Api { status, body })
}
