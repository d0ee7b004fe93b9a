//! Price and balance lookups for display paths.
//!
//! A failed chain read is logged, counted and answered with zero. Callers that act on the
//! value (quotes, trades) go through `TradingEngine`, which fails instead.

use alloy::primitives::{Address, U256};
use std::sync::Arc;

use crate::contracts::CircleContracts;
use crate::metrics::{metrics, OpLabel};

#[derive(Clone)]
pub struct DisplayQuery {
    contracts: Arc<dyn CircleContracts>,
}

impl DisplayQuery {
    pub fn new(contracts: Arc<dyn CircleContracts>) -> Self {
        Self { contracts }
    }

    pub async fn price_or_zero(&self, token: Address) -> U256 {
        match self.contracts.current_price(token).await {
            Ok(p) => p,
            Err(e) => {
                degraded("price", token, &e);
                U256::ZERO
            }
        }
    }

    pub async fn balance_or_zero(&self, token: Address, account: Address) -> U256 {
        match self.contracts.balance_of(token, account).await {
            Ok(b) => b,
            Err(e) => {
                degraded("balance", token, &e);
                U256::ZERO
            }
        }
    }
}

fn degraded(op: &'static str, token: Address, e: &crate::error::AppError) {
    metrics().degraded_reads_total.get_or_create(&OpLabel { op }).inc();
    tracing::warn!(op, token = %token, error = %e, "chain read failed, showing zero");
}
