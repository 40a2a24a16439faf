//! Application state shared across all request handlers.

use adashop_core::config::CheckoutConfig;
use adashop_core::service::ShopService;
use adashop_core::store::OrderStore;
use std::sync::Arc;

pub type Service = ShopService<Arc<dyn OrderStore>>;

/// Application state that is shared across all request handlers.
///
/// This is cloneable and cheap to pass around (everything is behind Arc).
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<Service>,
    /// Published to clients through `GET /api/v1/checkout/config`.
    pub checkout: Arc<CheckoutConfig>,
}

impl AppState {
    pub fn new(store: Arc<dyn OrderStore>, checkout: CheckoutConfig) -> Self {
        Self {
            service: Arc::new(ShopService::new(store, &checkout)),
            checkout: Arc::new(checkout),
        }
    }
}
