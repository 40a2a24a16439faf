//! Checkout configuration shared by the server and the checkout flow.
//!
//! Loading and parsing the file is the server's job; this module only
//! defines the validated shape.

use adashop_sdk::objects::{CheckoutSettings, DEFAULT_RESERVATION_MINUTES};
use serde::{Deserialize, Serialize};

/// Shortest hold a client may request.
pub const MIN_RESERVATION_MINUTES: u32 = 5;
/// Longest hold a client may request.
pub const MAX_RESERVATION_MINUTES: u32 = 120;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("reservation window must be between 5 and 120 minutes, got {0}")]
    ReservationWindow(u32),
    #[error("merchant address must not be empty")]
    MissingMerchantAddress,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutConfig {
    /// Insert the shipping step between review and payment.
    #[serde(default)]
    pub enable_shipping: bool,
    #[serde(default = "default_reservation_minutes")]
    pub reservation_minutes: u32,
    /// Bech32 address receiving every payment.
    pub merchant_address: String,
}

fn default_reservation_minutes() -> u32 {
    DEFAULT_RESERVATION_MINUTES
}

impl CheckoutConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_reservation_window(self.reservation_minutes)?;
        if self.merchant_address.trim().is_empty() {
            return Err(ConfigError::MissingMerchantAddress);
        }
        Ok(())
    }

    pub fn reservation_window(&self) -> time::Duration {
        time::Duration::minutes(i64::from(self.reservation_minutes))
    }
}

pub fn validate_reservation_window(minutes: u32) -> Result<(), ConfigError> {
    if (MIN_RESERVATION_MINUTES..=MAX_RESERVATION_MINUTES).contains(&minutes) {
        Ok(())
    } else {
        Err(ConfigError::ReservationWindow(minutes))
    }
}

impl From<&CheckoutConfig> for CheckoutSettings {
    fn from(value: &CheckoutConfig) -> Self {
        CheckoutSettings {
            enable_shipping: value.enable_shipping,
            reservation_minutes: value.reservation_minutes,
            merchant_address: value.merchant_address.clone(),
        }
    }
}

impl From<CheckoutSettings> for CheckoutConfig {
    fn from(value: CheckoutSettings) -> Self {
        CheckoutConfig {
            enable_shipping: value.enable_shipping,
            reservation_minutes: value.reservation_minutes,
            merchant_address: value.merchant_address,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_toml_like_json() {
        let config: CheckoutConfig =
            serde_json::from_str(r#"{"merchant_address":"addr_test1qz"}"#).unwrap();
        assert!(!config.enable_shipping);
        assert_eq!(config.reservation_minutes, 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_reservation_window_bounds() {
        assert!(validate_reservation_window(5).is_ok());
        assert!(validate_reservation_window(120).is_ok());
        assert_eq!(
            validate_reservation_window(4),
            Err(ConfigError::ReservationWindow(4))
        );
        assert_eq!(
            validate_reservation_window(121),
            Err(ConfigError::ReservationWindow(121))
        );
    }

    #[test]
    fn test_missing_merchant_address() {
        let config = CheckoutConfig {
            enable_shipping: true,
            reservation_minutes: 30,
            merchant_address: "  ".to_string(),
        };
        assert_eq!(config.validate(), Err(ConfigError::MissingMerchantAddress));
    }
}
