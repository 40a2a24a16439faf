//! Wallet-signed payments.
//!
//! Building transactions, signing them and talking to a node happen outside
//! this crate. They are reached through three capabilities:
//!
//! - [`Wallet`]: the browser wallet of the buyer.
//! - [`TransactionBuilder`]: turns a [`PaymentIntent`] into an unsigned transaction.
//! - [`TransactionSubmitter`]: sends the signed transaction to the network.
//!
//! [`PaymentDriver`] pays a list of orders one after another through them.

mod driver;

pub use driver::{
    CompletedPayment, FailedPayment, MultiCurrencyPaymentResult, OrderPayment, PaymentDriver,
};

use std::sync::Arc;

use async_trait::async_trait;

use crate::currency::Currency;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WalletError {
    #[error("User declined to sign the transaction")]
    Declined,
    #[error("Wallet unavailable: {0}")]
    Unavailable(String),
    #[error("Payment timeout")]
    Timeout,
}

/// Why a single payment did not go through.
///
/// Timeouts are kept apart from rejections and node failures so the
/// checkout can tell the shopper which one happened.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PaymentError {
    #[error("Failed to build transaction: {0}")]
    Build(String),
    #[error("User declined to sign the transaction")]
    SignatureRejected,
    #[error("Wallet error: {0}")]
    Wallet(String),
    #[error("Transaction submission failed: {0}")]
    Submission(String),
    #[error("Payment timeout")]
    Timeout,
}

impl PaymentError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, PaymentError::Timeout)
    }
}

impl From<WalletError> for PaymentError {
    fn from(value: WalletError) -> Self {
        match value {
            WalletError::Declined => PaymentError::SignatureRejected,
            WalletError::Timeout => PaymentError::Timeout,
            WalletError::Unavailable(reason) => PaymentError::Wallet(reason),
        }
    }
}

/// Browser wallet of the buyer (CIP-30 style).
#[async_trait]
pub trait Wallet: Send + Sync {
    /// Bech32 change address; used as the buyer and as the order's wallet.
    async fn change_address(&self) -> Result<String, WalletError>;

    /// Sign `tx_cbor_hex`, returning the witness set as CBOR hex.
    async fn sign_tx(&self, tx_cbor_hex: &str, partial: bool) -> Result<String, WalletError>;

    /// Display only.
    async fn network_id(&self) -> Result<u8, WalletError>;

    /// CBOR-encoded value held by the wallet. Display only.
    async fn balance(&self) -> Result<String, WalletError>;
}

/// What one order asks the buyer to pay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentIntent {
    pub buyer: String,
    pub merchant: String,
    /// Smallest unit of `currency`.
    pub amount: u64,
    pub currency: Currency,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTx {
    pub cbor_hex: String,
    pub hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTx {
    pub tx_cbor_hex: String,
    pub witness_set_cbor_hex: String,
    pub tx_hash_hex: String,
}

#[async_trait]
pub trait TransactionBuilder: Send + Sync {
    async fn build_payment(&self, intent: &PaymentIntent) -> Result<UnsignedTx, PaymentError>;
}

#[async_trait]
pub trait TransactionSubmitter: Send + Sync {
    /// Submit a signed transaction. `None` means the node accepted it without
    /// echoing a hash, in which case the built hash stands.
    async fn submit(&self, tx: SignedTx) -> Result<Option<String>, PaymentError>;
}

#[async_trait]
impl<T: Wallet + ?Sized> Wallet for Arc<T> {
    async fn change_address(&self) -> Result<String, WalletError> {
        (**self).change_address().await
    }

    async fn sign_tx(&self, tx_cbor_hex: &str, partial: bool) -> Result<String, WalletError> {
        (**self).sign_tx(tx_cbor_hex, partial).await
    }

    async fn network_id(&self) -> Result<u8, WalletError> {
        (**self).network_id().await
    }

    async fn balance(&self) -> Result<String, WalletError> {
        (**self).balance().await
    }
}

#[async_trait]
impl<T: TransactionBuilder + ?Sized> TransactionBuilder for Arc<T> {
    async fn build_payment(&self, intent: &PaymentIntent) -> Result<UnsignedTx, PaymentError> {
        (**self).build_payment(intent).await
    }
}

#[async_trait]
impl<T: TransactionSubmitter + ?Sized> TransactionSubmitter for Arc<T> {
    async fn submit(&self, tx: SignedTx) -> Result<Option<String>, PaymentError> {
        (**self).submit(tx).await
    }
}
