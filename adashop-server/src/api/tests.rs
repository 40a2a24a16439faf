use std::sync::Arc;

use adashop_core::config::CheckoutConfig;
use adashop_core::currency::TokenDescriptor;
use adashop_core::model::{Product, SupportedToken};
use adashop_core::store::{MemoryStore, OrderStore};
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use compact_str::CompactString;
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use crate::server::build_router;
use crate::state::AppState;

const WALLET: &str = "addr_test1qz2fxv2umyhttkxyxp8x0dlpdt3k6cwng5pxj3jhsydzer3";

struct Shop {
    router: Router,
    tee: Product,
    sticker: Product,
    token: SupportedToken,
}

fn shop() -> Shop {
    let store = Arc::new(MemoryStore::new());
    let token = SupportedToken {
        descriptor: TokenDescriptor {
            id: Uuid::new_v4(),
            policy_id: CompactString::from(
                "29d222ce763455e3d7a09a665ce554f00ac89d2e99a1a83d267170c6",
            ),
            asset_name: CompactString::from("4d494e"),
            display_name: Some(CompactString::from("MIN")),
            decimals: 6,
        },
        is_active: true,
    };
    let tee = Product {
        id: Uuid::new_v4(),
        name: "Tee".to_string(),
        price: 20_000_000,
        token_id: None,
        stock: 3,
        is_active: true,
    };
    let sticker = Product {
        id: Uuid::new_v4(),
        name: "Sticker".to_string(),
        price: 500,
        token_id: Some(token.descriptor.id),
        stock: 5,
        is_active: true,
    };
    store.add_token(token.clone());
    store.add_product(tee.clone());
    store.add_product(sticker.clone());

    let config = CheckoutConfig {
        enable_shipping: true,
        reservation_minutes: 30,
        merchant_address: "addr_test1vrmerchant".to_string(),
    };
    let store: Arc<dyn OrderStore> = store;
    Shop {
        router: build_router(AppState::new(store, config)),
        tee,
        sticker,
        token,
    }
}

async fn call(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => request.body(Body::empty()),
    }
    .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn order_request(shop: &Shop, tee_price: u64) -> Value {
    json!({
        "wallet_address": WALLET,
        "orders": [
            {
                "items": [{"product_id": shop.tee.id, "quantity": 1, "price": tee_price}],
                "token_id": null
            },
            {
                "items": [{
                    "product_id": shop.sticker.id,
                    "quantity": 2,
                    "price": shop.sticker.price,
                    "token_id": shop.token.descriptor.id
                }],
                "token_id": shop.token.descriptor.id
            }
        ]
    })
}

#[tokio::test]
async fn test_health_and_checkout_config() {
    let shop = shop();
    let (status, body) = call(&shop.router, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = call(&shop.router, "GET", "/api/v1/checkout/config", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["enable_shipping"], true);
    assert_eq!(body["reservation_minutes"], 30);
    assert_eq!(body["merchant_address"], "addr_test1vrmerchant");
}

#[tokio::test]
async fn test_reservation_boundary() {
    let shop = shop();
    let (status, body) = call(
        &shop.router,
        "POST",
        "/api/v1/stock/reservations",
        Some(json!({"cart_items": [{"product_id": shop.tee.id, "quantity": 3}]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(body["reservation_id"].is_string());
    assert_eq!(body["items"][0]["product_name"], "Tee");

    let (status, body) = call(
        &shop.router,
        "POST",
        "/api/v1/stock/snapshot",
        Some(json!({"product_ids": [shop.tee.id, shop.sticker.id]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["current_stock"], 3);
    assert_eq!(body[1]["current_stock"], 5);

    let (status, body) = call(
        &shop.router,
        "POST",
        "/api/v1/stock/reservations",
        Some(json!({"cart_items": [{"product_id": shop.sticker.id, "quantity": 6}]})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);
    assert_eq!(body["failure"]["kind"], "insufficient_stock");
    assert_eq!(body["failure"]["available"], 5);
    assert_eq!(body["failure"]["requested"], 6);
}

#[tokio::test]
async fn test_reservation_request_validation() {
    let shop = shop();
    let (status, body) = call(
        &shop.router,
        "POST",
        "/api/v1/stock/reservations",
        Some(json!({"cart_items": [], "reservation_minutes": 30})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["failure"]["kind"], "invalid_request");

    let (status, body) = call(
        &shop.router,
        "POST",
        "/api/v1/stock/reservations",
        Some(json!({"cart_items": "nope"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_create_orders_and_track_status() {
    let shop = shop();
    let (status, body) = call(
        &shop.router,
        "POST",
        "/api/v1/orders",
        Some(order_request(&shop, shop.tee.price)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    let orders = body["orders"].as_array().unwrap();
    assert_eq!(orders.len(), 2);
    assert_eq!(orders[0]["status"], "pending");
    assert_eq!(orders[0]["total_amount"], 20_000_000);
    assert_eq!(orders[1]["total_amount"], 1_000);
    assert_eq!(orders[1]["supported_token"]["display_name"], "MIN");
    let order_id = orders[0]["id"].as_str().unwrap().to_string();

    let uri = format!("/api/v1/orders/{order_id}/status");
    let (status, body) = call(
        &shop.router,
        "POST",
        &uri,
        Some(json!({"status": "paid", "tx_hash": "ab12"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["order"]["status"], "paid");
    assert_eq!(body["order"]["cardano_tx_hash"], "ab12");

    let (status, body) = call(&shop.router, "POST", &uri, Some(json!({"status": "pending"}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);

    let missing = format!("/api/v1/orders/{}/status", Uuid::new_v4());
    let (status, _) = call(&shop.router, "POST", &missing, Some(json!({"status": "paid"}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = call(
        &shop.router,
        "GET",
        &format!("/api/v1/orders/{order_id}?wallet_address={WALLET}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"][0]["product_name"], "Tee");

    let (status, _) = call(
        &shop.router,
        "GET",
        &format!("/api/v1/orders/{order_id}?wallet_address=addr_test1someoneelse"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = call(
        &shop.router,
        "GET",
        &format!("/api/v1/wallets/{WALLET}/orders"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
}

#[tokio::test]
async fn test_stale_price_is_unprocessable() {
    let shop = shop();
    let (status, body) = call(
        &shop.router,
        "POST",
        "/api/v1/orders",
        Some(order_request(&shop, 1)),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["success"], false);
    assert_eq!(body["failure"]["kind"], "price_mismatch");
    assert_eq!(body["failure"]["expected"], 20_000_000);
    assert_eq!(body["failure"]["got"], 1);
    assert!(body["orders"].as_array().unwrap().is_empty());

    let (_, body) = call(
        &shop.router,
        "GET",
        &format!("/api/v1/wallets/{WALLET}/orders"),
        None,
    )
    .await;
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn test_bad_order_id_is_rejected() {
    let shop = shop();
    let (status, body) = call(&shop.router, "GET", "/api/v1/orders/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}
