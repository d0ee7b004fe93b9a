use alloy::primitives::U256;
use serde::{Deserialize, Serialize};

use crate::contracts::NewCircle;
use crate::curve::validate_curve_params;
use crate::error::AppError;
use crate::models::{Circle, CircleStatus, TxType};
use crate::transactor::Credential;
use crate::utils::parse_decimal;

pub const DEFAULT_PAGE: usize = 20;
pub const MAX_PAGE: usize = 100;
pub const DEFAULT_TRENDING: usize = 10;
pub const MAX_TRENDING: usize = 50;

const NAME_LEN: (usize, usize) = (3, 50);
const SYMBOL_LEN: (usize, usize) = (2, 10);
const MAX_DESCRIPTION_LEN: usize = 500;

fn ensure_len(field: &str, s: &str, (min, max): (usize, usize)) -> Result<(), AppError> {
    let n = s.chars().count();
    if n < min || n > max {
        return Err(AppError::BadRequest(format!(
            "{field} must be {min}..={max} characters, got {n}"
        )));
    }
    Ok(())
}

fn optional_decimal(field: &str, v: &Option<String>) -> Result<Option<U256>, AppError> {
    v.as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(|s| parse_decimal(field, s))
        .transpose()
}

#[derive(Deserialize, Debug)]
pub struct CreateCircleRequest {
    pub name: String,
    pub symbol: String,
    #[serde(default)]
    pub description: String,
    /// 0 = linear, 1 = exponential, 2 = sigmoid.
    pub curve_type: u8,
    pub base_price: String,
    #[serde(default)]
    pub k: Option<String>,
    #[serde(default)]
    pub m: Option<String>,
    #[serde(default)]
    pub n: Option<String>,
    pub private_key: Credential,
}

impl CreateCircleRequest {
    /// Field and curve checks. Runs before anything touches the chain.
    pub fn validate(&self) -> Result<NewCircle, AppError> {
        let name = self.name.trim();
        let symbol = self.symbol.trim();
        ensure_len("name", name, NAME_LEN)?;
        ensure_len("symbol", symbol, SYMBOL_LEN)?;
        if self.description.chars().count() > MAX_DESCRIPTION_LEN {
            return Err(AppError::BadRequest(format!(
                "description too long (max {MAX_DESCRIPTION_LEN})"
            )));
        }
        let base_price = parse_decimal("base_price", &self.base_price)?;
        let params = validate_curve_params(
            self.curve_type,
            optional_decimal("k", &self.k)?,
            optional_decimal("m", &self.m)?,
            optional_decimal("n", &self.n)?,
        )?;
        Ok(NewCircle {
            name: name.to_string(),
            symbol: symbol.to_string(),
            description: self.description.clone(),
            base_price,
            params,
        })
    }
}

#[derive(Serialize, Debug)]
pub struct CreateCircleResponse {
    pub circle_id: u64,
    pub tx_hash: String,
    pub status: CircleStatus,
    pub message: String,
}

#[derive(Deserialize, Debug)]
pub struct BuyRequest {
    pub circle_id: u64,
    pub amount: String,
    pub max_cost: String,
    pub private_key: Credential,
}

#[derive(Deserialize, Debug)]
pub struct SellRequest {
    pub circle_id: u64,
    pub amount: String,
    pub min_refund: String,
    pub private_key: Credential,
}

#[derive(Serialize, Debug)]
pub struct TradeResponse {
    pub tx_hash: String,
    pub circle_id: u64,
    pub tx_type: TxType,
    pub amount: String,
    /// False when the trade was submitted but the local ledger write failed.
    pub ledger_recorded: bool,
    pub message: String,
}

#[derive(Deserialize, Debug)]
pub struct LinkChainIdRequest {
    pub chain_circle_id: u64,
}

#[derive(Deserialize, Debug, Default)]
pub struct PageQuery {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl PageQuery {
    pub fn page(&self) -> (usize, usize) {
        let limit = match self.limit {
            None | Some(0) => DEFAULT_PAGE,
            Some(n) => n.min(MAX_PAGE),
        };
        (limit, self.offset.unwrap_or(0))
    }
}

#[derive(Deserialize, Debug)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl SearchQuery {
    pub fn page(&self) -> (usize, usize) {
        PageQuery {
            limit: self.limit,
            offset: self.offset,
        }
        .page()
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct TrendingQuery {
    pub limit: Option<usize>,
}

impl TrendingQuery {
    pub fn limit(&self) -> usize {
        match self.limit {
            None | Some(0) => DEFAULT_TRENDING,
            Some(n) => n.min(MAX_TRENDING),
        }
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct DetailQuery {
    /// Optional address whose token balance is included (best-effort).
    pub viewer: Option<String>,
}

#[derive(Serialize, Debug)]
pub struct CircleListResponse {
    pub circles: Vec<Circle>,
    pub total: u64,
    pub limit: usize,
    pub offset: usize,
}

#[derive(Serialize, Debug)]
pub struct BalanceResponse {
    pub circle_id: u64,
    pub address: String,
    pub token_address: String,
    pub balance: String,
}

#[derive(Serialize, Debug)]
pub struct PriceResponse {
    pub circle_id: u64,
    pub token_address: String,
    pub price: String,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum QuoteSide {
    Buy,
    Sell,
}

#[derive(Deserialize, Debug)]
pub struct QuoteQuery {
    pub side: QuoteSide,
    pub amount: String,
}

#[derive(Serialize, Debug)]
pub struct QuoteResponse {
    pub circle_id: u64,
    pub side: QuoteSide,
    pub amount: String,
    /// Cost for buys, refund for sells; includes `fee`.
    pub total: String,
    pub fee: String,
}
