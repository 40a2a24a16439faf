//! Payment currencies.
//!
//! A cart line is paid either in ADA or in one native token. Identity is
//! carried by two types:
//!
//! - [`Currency`] is the ledger view (`Ada` or a policy id / asset name pair)
//!   and is what the payment driver builds transactions for.
//! - [`CurrencyKey`] is the grouping key (`Ada` or the supported-token id),
//!   used wherever orders and cart lines are partitioned.

use std::fmt;
use std::str::FromStr;

use adashop_sdk::objects::SupportedTokenInfo;
use compact_str::CompactString;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const ADA_SYMBOL: &str = "₳";
/// 1 ADA = 1,000,000 lovelace.
pub const ADA_DECIMALS: u8 = 6;
/// Used by the cart when a token line carries no descriptor.
pub const DEFAULT_TOKEN_DECIMALS: u8 = 6;
const FALLBACK_TOKEN_SYMBOL: &str = "Token";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Currency {
    Ada,
    Token {
        policy_id: CompactString,
        asset_name: CompactString,
    },
}

impl Currency {
    pub fn is_ada(&self) -> bool {
        matches!(self, Currency::Ada)
    }

    pub fn policy_id(&self) -> Option<&str> {
        match self {
            Currency::Ada => None,
            Currency::Token { policy_id, .. } => Some(policy_id),
        }
    }

    pub fn asset_name(&self) -> Option<&str> {
        match self {
            Currency::Ada => None,
            Currency::Token { asset_name, .. } => Some(asset_name),
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Currency::Ada => write!(f, "ADA"),
            Currency::Token {
                policy_id,
                asset_name,
            } => write!(f, "{policy_id}.{asset_name}"),
        }
    }
}

/// Grouping key: one currency group and one order per key.
///
/// Serialises as `"ADA"` or as the hyphenated token id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CurrencyKey {
    Ada,
    Token(Uuid),
}

impl CurrencyKey {
    pub fn from_token_id(token_id: Option<Uuid>) -> Self {
        match token_id {
            Some(id) => CurrencyKey::Token(id),
            None => CurrencyKey::Ada,
        }
    }

    pub fn token_id(&self) -> Option<Uuid> {
        match self {
            CurrencyKey::Ada => None,
            CurrencyKey::Token(id) => Some(*id),
        }
    }

    pub fn is_ada(&self) -> bool {
        matches!(self, CurrencyKey::Ada)
    }
}

impl fmt::Display for CurrencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CurrencyKey::Ada => write!(f, "ADA"),
            CurrencyKey::Token(id) => write!(f, "{id}"),
        }
    }
}

impl FromStr for CurrencyKey {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("ADA") {
            Ok(CurrencyKey::Ada)
        } else {
            Uuid::parse_str(s).map(CurrencyKey::Token)
        }
    }
}

impl Serialize for CurrencyKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CurrencyKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Metadata of a supported token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenDescriptor {
    pub id: Uuid,
    pub policy_id: CompactString,
    pub asset_name: CompactString,
    #[serde(default)]
    pub display_name: Option<CompactString>,
    pub decimals: u8,
}

impl TokenDescriptor {
    pub fn currency(&self) -> Currency {
        Currency::Token {
            policy_id: self.policy_id.clone(),
            asset_name: self.asset_name.clone(),
        }
    }

    pub fn key(&self) -> CurrencyKey {
        CurrencyKey::Token(self.id)
    }

    /// Display name, else the decoded asset name, else `Token`.
    pub fn symbol(&self) -> String {
        token_symbol(self.display_name.as_deref(), Some(&self.asset_name))
    }
}

pub fn token_symbol(display_name: Option<&str>, asset_name: Option<&str>) -> String {
    if let Some(name) = display_name.filter(|n| !n.trim().is_empty()) {
        return name.to_string();
    }
    asset_name
        .and_then(hex_to_ascii)
        .unwrap_or_else(|| FALLBACK_TOKEN_SYMBOL.to_string())
}

impl From<SupportedTokenInfo> for TokenDescriptor {
    fn from(value: SupportedTokenInfo) -> Self {
        TokenDescriptor {
            id: value.id,
            policy_id: value.policy_id.into(),
            asset_name: value.asset_name.into(),
            display_name: value.display_name.map(Into::into),
            decimals: value.decimals,
        }
    }
}

impl From<TokenDescriptor> for SupportedTokenInfo {
    fn from(value: TokenDescriptor) -> Self {
        SupportedTokenInfo {
            id: value.id,
            policy_id: value.policy_id.into(),
            asset_name: value.asset_name.into(),
            display_name: value.display_name.map(Into::into),
            decimals: value.decimals,
        }
    }
}

/// Decodes a hex asset name into printable ASCII.
///
/// Returns `None` for odd-length input, invalid hex, or bytes outside the
/// printable range, so binary asset names never reach the UI.
pub fn hex_to_ascii(hex: &str) -> Option<String> {
    if hex.is_empty() || hex.len() % 2 != 0 {
        return None;
    }
    let mut out = String::with_capacity(hex.len() / 2);
    for pair in hex.as_bytes().chunks(2) {
        let pair = std::str::from_utf8(pair).ok()?;
        let byte = u8::from_str_radix(pair, 16).ok()?;
        if !(byte.is_ascii_graphic() || byte == b' ') {
            return None;
        }
        out.push(char::from(byte));
    }
    Some(out)
}

/// Renders a smallest-unit amount with `decimals` fractional digits.
pub fn format_amount(amount: u64, decimals: u8) -> Result<Decimal, rust_decimal::Error> {
    Decimal::try_from_i128_with_scale(i128::from(amount), u32::from(decimals))
}
