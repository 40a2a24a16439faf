//! The checkout state machine.
//!
//! `review → shipping (optional) → payment → confirmation`. The
//! [`CheckoutFlow`] owns one [`CheckoutContext`] per session and is the only
//! thing that changes it; views read it through [`CheckoutFlow::context`].

mod flow;

pub use flow::CheckoutFlow;

use compact_str::CompactString;
use uuid::Uuid;

use crate::cart::CartError;
use crate::currency::CurrencyKey;
use crate::events::PaymentStatus;
use crate::model::{Order, ShippingInfo};
use crate::payment::WalletError;
use crate::service::OrderCreationError;
use crate::stock::{StockError, StockValidation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckoutStep {
    Review,
    Shipping,
    Payment,
    Confirmation,
}

impl std::fmt::Display for CheckoutStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckoutStep::Review => write!(f, "review"),
            CheckoutStep::Shipping => write!(f, "shipping"),
            CheckoutStep::Payment => write!(f, "payment"),
            CheckoutStep::Confirmation => write!(f, "confirmation"),
        }
    }
}

/// Outcome of the pre-checkout stock pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StockCheck {
    #[default]
    NotRun,
    InFlight,
    Passed,
    Issues(Vec<StockValidation>),
}

/// What the shopper can do about a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecoveryAction {
    TryAgain,
    AdjustCart,
    RefreshPage,
    ReconnectWallet,
    CompleteShipping,
}

#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    #[error("Your cart is empty")]
    EmptyCart,
    #[error("Stock validation is still running")]
    StockCheckPending,
    #[error("{} cart line(s) exceed the available stock", .0.len())]
    StockIssues(Vec<StockValidation>),
    #[error("Please fill in all required shipping information: {0}")]
    ShippingIncomplete(String),
    #[error("Cannot go from {from} to {to}")]
    InvalidStep { from: CheckoutStep, to: CheckoutStep },
    #[error("Order {order_id} has no payable currency")]
    MissingCurrency { order_id: Uuid },
    #[error("No pending orders left to pay")]
    NothingToPay,
    #[error(transparent)]
    Wallet(#[from] WalletError),
    #[error(transparent)]
    Stock(#[from] StockError),
    #[error(transparent)]
    OrderCreation(#[from] OrderCreationError),
    #[error(transparent)]
    Cart(#[from] CartError),
}

impl CheckoutError {
    pub fn recovery(&self) -> RecoveryAction {
        match self {
            CheckoutError::EmptyCart | CheckoutError::StockIssues(_) => RecoveryAction::AdjustCart,
            CheckoutError::StockCheckPending
            | CheckoutError::InvalidStep { .. }
            | CheckoutError::NothingToPay => RecoveryAction::TryAgain,
            CheckoutError::ShippingIncomplete(_) => RecoveryAction::CompleteShipping,
            CheckoutError::MissingCurrency { .. } => RecoveryAction::RefreshPage,
            CheckoutError::Wallet(_) => RecoveryAction::ReconnectWallet,
            CheckoutError::Stock(e) if e.requires_cart_change() => RecoveryAction::AdjustCart,
            CheckoutError::Stock(_) => RecoveryAction::TryAgain,
            CheckoutError::OrderCreation(e) => match e {
                OrderCreationError::StockChanged { .. }
                | OrderCreationError::ProductNotFound { .. } => RecoveryAction::AdjustCart,
                OrderCreationError::PriceMismatch { .. }
                | OrderCreationError::UnsupportedToken { .. }
                | OrderCreationError::InactiveToken { .. }
                | OrderCreationError::CurrencyMismatch { .. } => RecoveryAction::RefreshPage,
                OrderCreationError::ShippingInfo(_) => RecoveryAction::CompleteShipping,
                OrderCreationError::Validation(_) | OrderCreationError::Backend(_) => {
                    RecoveryAction::TryAgain
                }
            },
            CheckoutError::Cart(_) => RecoveryAction::TryAgain,
        }
    }

    /// Failures nobody planned for; shown as a generic "try again".
    pub fn is_unexpected(&self) -> bool {
        match self {
            CheckoutError::Stock(StockError::Backend(e)) => e.is_unexpected(),
            CheckoutError::OrderCreation(OrderCreationError::Backend(e)) => e.is_unexpected(),
            CheckoutError::Cart(_) => true,
            _ => false,
        }
    }

    /// Text for the shopper.
    pub fn user_message(&self) -> String {
        match self {
            CheckoutError::EmptyCart => {
                "Your cart is empty. Please add items to your cart before proceeding to checkout."
                    .to_string()
            }
            CheckoutError::StockIssues(_) => "Some items in your cart have insufficient stock. \
                 Please adjust quantities or remove unavailable items."
                .to_string(),
            CheckoutError::Wallet(WalletError::Declined) => {
                "The wallet request was declined. Please try again.".to_string()
            }
            CheckoutError::Wallet(_) => "Failed to connect wallet. Please try again.".to_string(),
            CheckoutError::Stock(e) if e.requires_cart_change() => e.to_string(),
            CheckoutError::OrderCreation(e) => match e {
                OrderCreationError::StockChanged { .. }
                | OrderCreationError::ProductNotFound { .. } => {
                    "Some items in your cart are no longer available. Please update your cart."
                        .to_string()
                }
                OrderCreationError::PriceMismatch { .. } => e.to_string(),
                OrderCreationError::UnsupportedToken { .. }
                | OrderCreationError::InactiveToken { .. }
                | OrderCreationError::CurrencyMismatch { .. } => {
                    "Invalid payment token used. Please refresh the page and try again."
                        .to_string()
                }
                OrderCreationError::ShippingInfo(_) | OrderCreationError::Validation(_) => {
                    e.to_string()
                }
                OrderCreationError::Backend(_) => {
                    "Failed to create order. Please try again.".to_string()
                }
            },
            CheckoutError::MissingCurrency { .. } => {
                "Payment details for an order are missing. Please refresh the page.".to_string()
            }
            CheckoutError::NothingToPay => {
                "These orders were already processed. Please start the checkout again.".to_string()
            }
            e if e.is_unexpected() => "Something went wrong. Please try again.".to_string(),
            e => e.to_string(),
        }
    }
}

/// The failure currently shown to the shopper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutNotice {
    pub message: String,
    pub recovery: RecoveryAction,
}

impl From<&CheckoutError> for CheckoutNotice {
    fn from(value: &CheckoutError) -> Self {
        Self {
            message: value.user_message(),
            recovery: value.recovery(),
        }
    }
}

/// Payment progress of one order, as shown on the payment step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrencyPaymentStatus {
    pub order_id: Uuid,
    pub currency_key: CurrencyKey,
    pub symbol: String,
    pub decimals: u8,
    pub policy_id: Option<CompactString>,
    pub asset_name: Option<CompactString>,
    pub amount: u64,
    pub status: PaymentStatus,
    pub tx_hash: Option<String>,
    pub error: Option<String>,
}

/// Session-scoped checkout state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutContext {
    pub current_step: CheckoutStep,
    pub created_orders: Vec<Order>,
    /// Orders created by an abandoned attempt. They stay `pending` or
    /// `payment_failed` on the backend.
    pub orphaned_orders: Vec<Order>,
    pub payment_statuses: Vec<CurrencyPaymentStatus>,
    pub error: Option<CheckoutNotice>,
    pub shipping_info: ShippingInfo,
    pub stock_check: StockCheck,
    /// Hold obtained at the last validate-and-reserve; renewed on the next.
    pub reservation_id: Option<Uuid>,
}

impl Default for CheckoutContext {
    fn default() -> Self {
        Self {
            current_step: CheckoutStep::Review,
            created_orders: Vec::new(),
            orphaned_orders: Vec::new(),
            payment_statuses: Vec::new(),
            error: None,
            shipping_info: ShippingInfo::default(),
            stock_check: StockCheck::NotRun,
            reservation_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_failure_has_a_way_out() {
        let errors = [
            CheckoutError::EmptyCart,
            CheckoutError::ShippingIncomplete("city is required".to_string()),
            CheckoutError::Wallet(WalletError::Unavailable("no extension".to_string())),
            CheckoutError::OrderCreation(OrderCreationError::PriceMismatch {
                product_id: Uuid::nil(),
                product_name: "Tee".to_string(),
                expected: 120,
                got: 100,
            }),
            CheckoutError::OrderCreation(OrderCreationError::StockChanged {
                product_id: Uuid::nil(),
                available: 0,
                requested: 1,
            }),
        ];
        let actions: Vec<RecoveryAction> = errors.iter().map(CheckoutError::recovery).collect();
        assert_eq!(
            actions,
            vec![
                RecoveryAction::AdjustCart,
                RecoveryAction::CompleteShipping,
                RecoveryAction::ReconnectWallet,
                RecoveryAction::RefreshPage,
                RecoveryAction::AdjustCart,
            ]
        );
        assert!(errors[3].user_message().contains("Please refresh and try again."));
    }
}
