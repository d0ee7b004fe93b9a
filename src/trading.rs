//! Buy/sell execution and strict trading reads.

use alloy::primitives::{Address, B256, U256};
use std::sync::Arc;

use crate::circles::{token_address, CircleLifecycleManager};
use crate::contracts::{CircleContracts, Quote};
use crate::error::{AppError, AppResult};
use crate::metrics::metrics;
use crate::models::{Circle, LedgerEntry, TxStatus, TxType};
use crate::store::TransactionStore;
use crate::types::{BuyRequest, QuoteSide, SellRequest, TradeResponse};
use crate::utils::{now_ms, parse_decimal};

pub struct TradingEngine {
    circles: Arc<CircleLifecycleManager>,
    contracts: Arc<dyn CircleContracts>,
    ledger: Arc<dyn TransactionStore>,
}

fn positive_amount(s: &str) -> AppResult<U256> {
    let amount = parse_decimal("amount", s)?;
    if amount.is_zero() {
        return Err(AppError::BadRequest("amount must be > 0".into()));
    }
    Ok(amount)
}

impl TradingEngine {
    pub fn new(
        circles: Arc<CircleLifecycleManager>,
        contracts: Arc<dyn CircleContracts>,
        ledger: Arc<dyn TransactionStore>,
    ) -> Self {
        Self {
            circles,
            contracts,
            ledger,
        }
    }

    async fn confirmed(&self, circle_id: u64) -> AppResult<(Circle, Address)> {
        let c = self.circles.find(circle_id).await?;
        let token = token_address(&c)?;
        Ok((c, token))
    }

    pub async fn buy(&self, req: BuyRequest) -> AppResult<TradeResponse> {
        let amount = positive_amount(&req.amount)?;
        let max_cost = parse_decimal("max_cost", &req.max_cost)?;
        let (c, token) = self.confirmed(req.circle_id).await?;
        if !c.active {
            return Err(AppError::Precondition(format!(
                "circle {} is not active",
                c.id
            )));
        }
        let hash = self
            .contracts
            .buy_tokens(&req.private_key, token, amount, max_cost)
            .await?;
        let ledger_recorded = self.record(&c, hash, TxType::Buy, amount).await;
        Ok(TradeResponse {
            tx_hash: hash.to_string(),
            circle_id: c.id,
            tx_type: TxType::Buy,
            amount: amount.to_string(),
            ledger_recorded,
            message: "Buy transaction submitted successfully".into(),
        })
    }

    /// Unlike buys, sells stay open on inactive circles so holders can exit.
    pub async fn sell(&self, req: SellRequest) -> AppResult<TradeResponse> {
        let amount = positive_amount(&req.amount)?;
        let min_refund = parse_decimal("min_refund", &req.min_refund)?;
        let (c, token) = self.confirmed(req.circle_id).await?;
        let hash = self
            .contracts
            .sell_tokens(&req.private_key, token, amount, min_refund)
            .await?;
        let ledger_recorded = self.record(&c, hash, TxType::Sell, amount).await;
        Ok(TradeResponse {
            tx_hash: hash.to_string(),
            circle_id: c.id,
            tx_type: TxType::Sell,
            amount: amount.to_string(),
            ledger_recorded,
            message: "Sell transaction submitted successfully".into(),
        })
    }

    /// One best-effort ledger insert. Failures are logged and counted, never retried.
    async fn record(&self, c: &Circle, hash: B256, tx_type: TxType, amount: U256) -> bool {
        let entry = LedgerEntry {
            tx_hash: hash.to_string(),
            circle_id: c.id,
            tx_type,
            amount: amount.to_string(),
            status: TxStatus::Pending,
            block_number: None,
            token_address: c.token_address.clone(),
            timestamp_ms: now_ms(),
        };
        match self.ledger.create(entry).await {
            Ok(()) => true,
            Err(e) => {
                metrics().ledger_write_failures_total.inc();
                tracing::warn!(
                    circle_id = c.id,
                    tx_hash = %hash,
                    tx_type = ?tx_type,
                    error = %e,
                    "trade submitted but not recorded in ledger"
                );
                false
            }
        }
    }

    pub async fn balance(&self, circle_id: u64, account: Address) -> AppResult<(Circle, U256)> {
        let (c, token) = self.confirmed(circle_id).await?;
        let balance = self.contracts.balance_of(token, account).await?;
        Ok((c, balance))
    }

    pub async fn current_price(&self, circle_id: u64) -> AppResult<(Circle, U256)> {
        let (c, token) = self.confirmed(circle_id).await?;
        let price = self.contracts.current_price(token).await?;
        Ok((c, price))
    }

    pub async fn quote(&self, circle_id: u64, side: QuoteSide, amount: &str) -> AppResult<Quote> {
        let amount = positive_amount(amount)?;
        let (_, token) = self.confirmed(circle_id).await?;
        match side {
            QuoteSide::Buy => self.contracts.buy_quote(token, amount).await,
            QuoteSide::Sell => self.contracts.sell_quote(token, amount).await,
        }
    }
}
