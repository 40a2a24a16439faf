use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metadata of a fungible token accepted as payment, nested in order and
/// product payloads.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SupportedTokenInfo {
    pub id: Uuid,
    /// Hex-encoded minting policy id.
    pub policy_id: String,
    /// Hex-encoded asset name.
    pub asset_name: String,
    pub display_name: Option<String>,
    pub decimals: u8,
}
