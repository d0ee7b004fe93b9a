//! Circle lifecycle: `pending` on submission, `confirmed` once the factory record is synced.
//!
//! The chain write and the local insert are not atomic. If the insert fails after the node
//! accepted the transaction, the caller gets `AppError::Unreconciled` with the hash.

use alloy::primitives::Address;
use std::sync::Arc;

use crate::contracts::CircleContracts;
use crate::error::{AppError, AppResult};
use crate::metrics::metrics;
use crate::models::{
    Circle, CircleDetail, CircleStats, CircleStatus, LedgerEntry, TxStatus, TxType,
};
use crate::query::DisplayQuery;
use crate::store::{CircleStore, TransactionStore};
use crate::types::{CreateCircleRequest, CreateCircleResponse};
use crate::utils::{now_ms, parse_address};

pub struct CircleLifecycleManager {
    contracts: Arc<dyn CircleContracts>,
    circles: Arc<dyn CircleStore>,
    ledger: Arc<dyn TransactionStore>,
    display: DisplayQuery,
}

/// Token address of a confirmed circle.
pub fn token_address(c: &Circle) -> AppResult<Address> {
    if !c.is_confirmed() || c.token_address.is_empty() {
        return Err(AppError::Precondition(format!(
            "circle {} is not confirmed yet",
            c.id
        )));
    }
    parse_address("token_address", &c.token_address)
        .map_err(|_| AppError::Internal(format!("circle {} has a malformed token address", c.id)))
}

impl CircleLifecycleManager {
    pub fn new(
        contracts: Arc<dyn CircleContracts>,
        circles: Arc<dyn CircleStore>,
        ledger: Arc<dyn TransactionStore>,
    ) -> Self {
        Self {
            display: DisplayQuery::new(contracts.clone()),
            contracts,
            circles,
            ledger,
        }
    }

    pub async fn create(&self, req: CreateCircleRequest) -> AppResult<CreateCircleResponse> {
        let new = req.validate()?;
        let hash = self.contracts.create_circle(&req.private_key, &new).await?;
        let tx_hash = hash.to_string();

        let (k, m, n) = new.params.call_args();
        let now = now_ms();
        let pending = Circle {
            id: 0,
            chain_circle_id: None,
            owner_address: String::new(),
            token_address: String::new(),
            bonding_curve_address: String::new(),
            name: new.name,
            symbol: new.symbol,
            description: new.description,
            curve_type: new.params.curve_type(),
            base_price: new.base_price.to_string(),
            curve_k: k.to_string(),
            curve_m: m.to_string(),
            curve_n: n.to_string(),
            total_supply: "0".into(),
            holder_count: 0,
            transaction_count: 0,
            total_volume: "0".into(),
            active: false,
            status: CircleStatus::Pending,
            tx_hash: tx_hash.clone(),
            created_ts_ms: now,
            updated_ts_ms: now,
        };

        let circle = match self.circles.create(pending).await {
            Ok(c) => c,
            Err(e) => {
                metrics().unreconciled_total.inc();
                tracing::error!(tx_hash = %tx_hash, error = %e, "circle submitted but not persisted");
                return Err(AppError::Unreconciled {
                    tx_hash,
                    cause: e.to_string(),
                });
            }
        };

        let entry = LedgerEntry {
            tx_hash: tx_hash.clone(),
            circle_id: circle.id,
            tx_type: TxType::Create,
            amount: "0".into(),
            status: TxStatus::Pending,
            block_number: None,
            token_address: String::new(),
            timestamp_ms: now,
        };
        if let Err(e) = self.ledger.create(entry).await {
            metrics().ledger_write_failures_total.inc();
            tracing::warn!(circle_id = circle.id, tx_hash = %tx_hash, error = %e, "create not recorded in ledger");
        }

        tracing::info!(circle_id = circle.id, tx_hash = %tx_hash, "circle creation submitted");
        Ok(CreateCircleResponse {
            circle_id: circle.id,
            tx_hash,
            status: CircleStatus::Pending,
            message: "Circle creation transaction submitted".into(),
        })
    }

    pub async fn find(&self, id: u64) -> AppResult<Circle> {
        self.circles
            .get_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("circle {id}")))
    }

    /// Records the factory-assigned id for a circle. Idempotent for the same id.
    pub async fn link_chain_id(&self, id: u64, chain_circle_id: u64) -> AppResult<Circle> {
        let mut c = self.find(id).await?;
        match c.chain_circle_id {
            Some(existing) if existing == chain_circle_id => return Ok(c),
            Some(existing) => {
                return Err(AppError::Precondition(format!(
                    "circle {id} is already linked to chain circle {existing}"
                )))
            }
            None => {}
        }
        if let Some(other) = self.circles.get_by_chain_id(chain_circle_id).await? {
            return Err(AppError::Precondition(format!(
                "chain circle {chain_circle_id} is already linked to circle {}",
                other.id
            )));
        }
        c.chain_circle_id = Some(chain_circle_id);
        c.updated_ts_ms = now_ms();
        self.circles.update(&c).await?;
        tracing::info!(circle_id = id, chain_circle_id, "linked chain id");
        Ok(c)
    }

    /// Pulls owner, addresses and `active` from the factory and marks the circle confirmed.
    pub async fn sync(&self, id: u64) -> AppResult<Circle> {
        let mut c = self.find(id).await?;
        let chain_id = c.chain_circle_id.ok_or_else(|| {
            AppError::Precondition(format!("circle {id} not yet confirmed on chain"))
        })?;

        let rec = self.contracts.circle_record(chain_id).await?;
        if rec.id != alloy::primitives::U256::from(chain_id) {
            return Err(AppError::BadGateway(format!(
                "factory returned circle {} for id {chain_id}",
                rec.id
            )));
        }
        if rec.curve_type != c.curve_type.tag() || rec.symbol != c.symbol {
            tracing::warn!(
                circle_id = id,
                chain_circle_id = chain_id,
                chain_symbol = %rec.symbol,
                chain_curve_type = rec.curve_type,
                "chain record differs from the submitted circle"
            );
        }
        if rec.token_address == Address::ZERO || rec.bonding_curve == Address::ZERO {
            return Err(AppError::Precondition(format!(
                "chain circle {chain_id} has no deployed token yet"
            )));
        }

        c.owner_address = rec.owner.to_string();
        c.token_address = rec.token_address.to_string();
        c.bonding_curve_address = rec.bonding_curve.to_string();
        c.active = rec.active;
        c.status = CircleStatus::Confirmed;
        c.updated_ts_ms = now_ms();
        self.circles.update(&c).await?;
        tracing::info!(circle_id = id, chain_circle_id = chain_id, active = c.active, "circle synced");
        Ok(c)
    }

    /// Local record plus best-effort price (and viewer balance) for confirmed circles.
    pub async fn get(&self, id: u64, viewer: Option<Address>) -> AppResult<CircleDetail> {
        let circle = self.find(id).await?;
        let token = token_address(&circle).ok();
        let (current_price, viewer_balance) = match token {
            Some(token) => {
                let price = self.display.price_or_zero(token).await;
                let balance = match viewer {
                    Some(v) => Some(self.display.balance_or_zero(token, v).await.to_string()),
                    None => None,
                };
                (Some(price.to_string()), balance)
            }
            None => (None, None),
        };
        Ok(CircleDetail {
            circle,
            current_price,
            viewer_balance,
        })
    }

    pub async fn list(&self, limit: usize, offset: usize) -> AppResult<(Vec<Circle>, u64)> {
        let circles = self.circles.list(limit, offset).await?;
        let total = self.circles.count().await?;
        Ok((circles, total))
    }

    pub async fn search(&self, query: &str, limit: usize, offset: usize) -> AppResult<Vec<Circle>> {
        if query.trim().is_empty() {
            return Err(AppError::BadRequest("search query is empty".into()));
        }
        Ok(self.circles.search(query, limit, offset).await?)
    }

    pub async fn trending(&self, limit: usize) -> AppResult<Vec<Circle>> {
        Ok(self.circles.trending(limit).await?)
    }

    pub async fn transactions(
        &self,
        id: u64,
        limit: usize,
        offset: usize,
    ) -> AppResult<Vec<LedgerEntry>> {
        self.find(id).await?;
        Ok(self.ledger.list_by_circle(id, limit, offset).await?)
    }

    /// Recomputes volume and trade count from confirmed ledger rows and reads supply from the token.
    pub async fn refresh_stats(&self, id: u64) -> AppResult<CircleStats> {
        let c = self.find(id).await?;
        let token = token_address(&c)?;
        let supply = self.contracts.total_supply(token).await?;
        let volume = self.ledger.volume_stats(id).await?;
        let stats = CircleStats {
            total_supply: supply.to_string(),
            holder_count: c.holder_count,
            transaction_count: volume.confirmed_count,
            total_volume: volume.total_volume,
        };
        self.circles.update_stats(id, &stats).await?;
        Ok(stats)
    }
}
