use serde::{Deserialize, Serialize};

/// Checkout settings published by the backend (`GET /api/v1/checkout/config`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSettings {
    /// Whether the shipping step is part of the checkout flow.
    pub enable_shipping: bool,
    /// Stock hold window requested during validation.
    pub reservation_minutes: u32,
    /// Bech32 address receiving every payment.
    pub merchant_address: String,
}
