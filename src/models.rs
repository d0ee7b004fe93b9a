use serde::{Deserialize, Serialize};

use crate::curve::CurveType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CircleStatus {
    Pending,
    Confirmed,
}

/// Local projection of a circle. Amounts and curve parameters are base-10 integer strings.
///
/// `token_address` and `bonding_curve_address` stay empty while pending; sync fills both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Circle {
    pub id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_circle_id: Option<u64>,
    pub owner_address: String,
    pub token_address: String,
    pub bonding_curve_address: String,
    pub name: String,
    pub symbol: String,
    pub description: String,
    pub curve_type: CurveType,
    pub base_price: String,
    pub curve_k: String,
    pub curve_m: String,
    pub curve_n: String,
    pub total_supply: String,
    pub holder_count: u64,
    pub transaction_count: u64,
    pub total_volume: String,
    pub active: bool,
    pub status: CircleStatus,
    /// Creation transaction.
    pub tx_hash: String,
    pub created_ts_ms: u128,
    pub updated_ts_ms: u128,
}

impl Circle {
    pub fn is_confirmed(&self) -> bool {
        self.status == CircleStatus::Confirmed
    }
}

/// Aggregates written by stat rollups; everything else on a circle is left alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CircleStats {
    pub total_supply: String,
    pub holder_count: u64,
    pub transaction_count: u64,
    pub total_volume: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxType {
    Buy,
    Sell,
    Create,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Pending,
    Confirmed,
    Failed,
}

/// Local record of a submitted transaction, keyed by its hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub tx_hash: String,
    pub circle_id: u64,
    pub tx_type: TxType,
    pub amount: String,
    pub status: TxStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    pub token_address: String,
    pub timestamp_ms: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VolumeStats {
    pub confirmed_count: u64,
    pub total_volume: String,
}

/// A circle plus display-only chain data.
#[derive(Debug, Clone, Serialize)]
pub struct CircleDetail {
    #[serde(flatten)]
    pub circle: Circle,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewer_balance: Option<String>,
}
