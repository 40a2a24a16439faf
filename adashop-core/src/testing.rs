//! Shared fixtures for the crate's unit tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use adashop_sdk::objects::{CreateOrdersRequest, StockItemRequest, StockReservationRequest};
use async_trait::async_trait;
use compact_str::CompactString;
use uuid::Uuid;

use crate::config::CheckoutConfig;
use crate::currency::{Currency, TokenDescriptor};
use crate::model::{
    OrderGroupInput, OrderItemInput, Product, ReservationReport, ShippingInfo, SupportedToken,
};
use crate::payment::{
    PaymentDriver, PaymentError, PaymentIntent, SignedTx, TransactionBuilder,
    TransactionSubmitter, UnsignedTx, Wallet, WalletError,
};
use crate::service::ShopService;
use crate::store::memory::MemoryStore;

pub const WALLET: &str = "addr_test1qz2fxv2umyhttkxyxp8x0dlpdt3k6cwng5pxj3jhsydzer3";
pub const MERCHANT: &str = "addr_test1vrmerchant0000000000000000000000000000000000000";

pub fn config() -> CheckoutConfig {
    CheckoutConfig {
        enable_shipping: false,
        reservation_minutes: 30,
        merchant_address: MERCHANT.to_string(),
    }
}

pub fn token(asset_hex: &str, display_name: Option<&str>, decimals: u8) -> SupportedToken {
    SupportedToken {
        descriptor: TokenDescriptor {
            id: Uuid::new_v4(),
            policy_id: CompactString::from(
                "29d222ce763455e3d7a09a665ce554f00ac89d2e99a1a83d267170c6",
            ),
            asset_name: CompactString::from(asset_hex),
            display_name: display_name.map(CompactString::from),
            decimals,
        },
        is_active: true,
    }
}

pub fn product(name: &str, price: u64, token_id: Option<Uuid>, stock: u32) -> Product {
    Product {
        id: Uuid::new_v4(),
        name: name.to_string(),
        price,
        token_id,
        stock,
        is_active: true,
    }
}

pub fn item(product: &Product, quantity: u32) -> OrderItemInput {
    OrderItemInput {
        product_id: product.id,
        quantity,
        price: product.price,
        token_id: product.token_id,
    }
}

pub fn shipping() -> ShippingInfo {
    ShippingInfo {
        full_name: "Ada Lovelace".to_string(),
        email: "ada@example.com".to_string(),
        phone: None,
        address: "12 Analytical Row".to_string(),
        city: "London".to_string(),
        postal_code: "NW1 6XE".to_string(),
        country: "UK".to_string(),
    }
}

/// A memory-backed shop with one ADA product and one product per token.
pub struct Fixture {
    pub store: Arc<MemoryStore>,
    pub service: Arc<ShopService<Arc<MemoryStore>>>,
    pub ada_product: Product,
    pub token_a: SupportedToken,
    pub token_a_product: Product,
    pub token_b: SupportedToken,
    pub token_b_product: Product,
}

impl Fixture {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        // "HOSKY" and "MIN" in hex
        let token_a = token("484f534b59", None, 0);
        let token_b = token("4d494e", Some("MIN"), 6);
        let ada_product = product("Hoodie", 25_000_000, None, 10);
        let token_a_product = product("Sticker", 500, Some(token_a.descriptor.id), 10);
        let token_b_product = product("Mug", 1_500_000, Some(token_b.descriptor.id), 10);

        store.add_token(token_a.clone());
        store.add_token(token_b.clone());
        store.add_product(ada_product.clone());
        store.add_product(token_a_product.clone());
        store.add_product(token_b_product.clone());

        let service = Arc::new(ShopService::new(store.clone(), &config()));
        Self {
            store,
            service,
            ada_product,
            token_a,
            token_a_product,
            token_b,
            token_b_product,
        }
    }

    pub fn request(&self, orders: Vec<OrderGroupInput>) -> CreateOrdersRequest {
        CreateOrdersRequest {
            wallet_address: WALLET.to_string(),
            orders,
            shipping_info: None,
            reservation_id: None,
        }
    }

    pub fn ada_group(&self, quantity: u32) -> OrderGroupInput {
        OrderGroupInput {
            items: vec![item(&self.ada_product, quantity)],
            token_id: None,
        }
    }

    pub fn token_group(
        &self,
        token: &SupportedToken,
        product: &Product,
        quantity: u32,
    ) -> OrderGroupInput {
        OrderGroupInput {
            items: vec![item(product, quantity)],
            token_id: Some(token.descriptor.id),
        }
    }

    pub async fn reserve(&self, product: &Product, quantity: u32) -> ReservationReport {
        self.service
            .validate_and_reserve_stock(StockReservationRequest {
                cart_items: vec![StockItemRequest {
                    product_id: product.id,
                    quantity,
                }],
                reservation_minutes: 30,
                reservation_id: None,
            })
            .await
            .unwrap()
    }
}

/// Wallet that signs everything unless told to decline.
pub struct FakeWallet {
    pub address: String,
    declined: AtomicBool,
    signed: Mutex<Vec<String>>,
}

impl FakeWallet {
    pub fn new() -> Self {
        Self {
            address: WALLET.to_string(),
            declined: AtomicBool::new(false),
            signed: Mutex::new(Vec::new()),
        }
    }

    pub fn decline(&self, declined: bool) {
        self.declined.store(declined, Ordering::SeqCst);
    }

    pub fn signed(&self) -> Vec<String> {
        self.signed.lock().unwrap().clone()
    }
}

#[async_trait]
impl Wallet for FakeWallet {
    async fn change_address(&self) -> Result<String, WalletError> {
        Ok(self.address.clone())
    }

    async fn sign_tx(&self, tx_cbor_hex: &str, partial: bool) -> Result<String, WalletError> {
        assert!(partial);
        if self.declined.load(Ordering::SeqCst) {
            return Err(WalletError::Declined);
        }
        self.signed.lock().unwrap().push(tx_cbor_hex.to_string());
        Ok(format!("a100{tx_cbor_hex}"))
    }

    async fn network_id(&self) -> Result<u8, WalletError> {
        Ok(0)
    }

    async fn balance(&self) -> Result<String, WalletError> {
        Ok("1a05f5e100".to_string())
    }
}

/// Builder and submitter in one, failing on demand per currency.
#[derive(Default)]
pub struct FakeChain {
    built: Mutex<Vec<PaymentIntent>>,
    failures: Mutex<Vec<(Currency, PaymentError)>>,
    submitted: Mutex<Vec<SignedTx>>,
    silent_submit: AtomicBool,
}

impl FakeChain {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_for(&self, currency: Currency, error: PaymentError) {
        self.failures.lock().unwrap().push((currency, error));
    }

    /// Submit without echoing a hash.
    pub fn silent_submit(&self) {
        self.silent_submit.store(true, Ordering::SeqCst);
    }

    pub fn built(&self) -> Vec<PaymentIntent> {
        self.built.lock().unwrap().clone()
    }

    pub fn submitted(&self) -> Vec<SignedTx> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn driver(self: &Arc<Self>) -> PaymentDriver {
        PaymentDriver::new(self.clone(), self.clone(), MERCHANT)
    }
}

#[async_trait]
impl TransactionBuilder for FakeChain {
    async fn build_payment(&self, intent: &PaymentIntent) -> Result<UnsignedTx, PaymentError> {
        let n = {
            let mut built = self.built.lock().unwrap();
            built.push(intent.clone());
            built.len()
        };
        let failure = self
            .failures
            .lock()
            .unwrap()
            .iter()
            .find(|(c, _)| *c == intent.currency)
            .map(|(_, e)| e.clone());
        match failure {
            Some(e) => Err(e),
            None => Ok(UnsignedTx {
                cbor_hex: format!("84a400{n:02}"),
                hash: format!("{n:064x}"),
            }),
        }
    }
}

#[async_trait]
impl TransactionSubmitter for FakeChain {
    async fn submit(&self, tx: SignedTx) -> Result<Option<String>, PaymentError> {
        let hash = tx.tx_hash_hex.clone();
        self.submitted.lock().unwrap().push(tx);
        if self.silent_submit.load(Ordering::SeqCst) {
            Ok(None)
        } else {
            Ok(Some(hash))
        }
    }
}
