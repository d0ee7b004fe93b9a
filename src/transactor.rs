//! Builds signed, broadcast-ready transactions.
//!
//! Preparation is strictly ordered (sender, nonce, gas price, gas estimate, signature) and
//! each step fails on its own with `AppError::Prepare`. Nothing here broadcasts.

use alloy::consensus::{SignableTransaction, TxEnvelope, TxLegacy};
use alloy::eips::eip2718::Encodable2718;
use alloy::network::TxSignerSync;
use alloy::primitives::{Address, Bytes, TxKind, B256, U256};
use alloy::signers::local::PrivateKeySigner;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::{AppError, AppResult, PrepStep};
use crate::rpc::{CallRequest, ChainRpc};

/// Added on top of `eth_estimateGas`.
pub const GAS_LIMIT_BUFFER: u64 = 50_000;

/// Hex secp256k1 private key supplied with a request. Never logged.
#[derive(Clone, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn signer(&self) -> AppResult<PrivateKeySigner> {
        self.0
            .trim()
            .parse::<PrivateKeySigner>()
            .map_err(|_| AppError::prepare(PrepStep::DeriveSender, "invalid private key"))
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

#[derive(Debug, Clone)]
pub struct PreparedTransaction {
    pub from: Address,
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
    pub hash: B256,
    pub raw: Bytes,
}

pub struct ChainTransactor {
    rpc: Arc<dyn ChainRpc>,
    chain_id: u64,
    gas_buffer: u64,
}

impl ChainTransactor {
    pub fn new(rpc: Arc<dyn ChainRpc>, chain_id: u64) -> Self {
        Self {
            rpc,
            chain_id,
            gas_buffer: GAS_LIMIT_BUFFER,
        }
    }

    pub fn with_gas_buffer(mut self, gas_buffer: u64) -> Self {
        self.gas_buffer = gas_buffer;
        self
    }

    /// Legacy EIP-155 transaction calling `to` with `data`, signed by `signer`.
    pub async fn prepare(
        &self,
        signer: &PrivateKeySigner,
        to: Address,
        data: Bytes,
        value: U256,
    ) -> AppResult<PreparedTransaction> {
        let from = signer.address();

        let nonce = self
            .rpc
            .pending_nonce(from)
            .await
            .map_err(|e| AppError::prepare(PrepStep::Nonce, e))?;

        let gas_price = self
            .rpc
            .gas_price()
            .await
            .map_err(|e| AppError::prepare(PrepStep::GasPrice, e))?;

        let estimate = self
            .rpc
            .estimate_gas(&CallRequest {
                from: Some(from),
                to,
                value,
                data: data.clone(),
            })
            .await
            .map_err(|e| AppError::prepare(PrepStep::EstimateGas, e))?;
        let gas_limit = estimate.saturating_add(self.gas_buffer);

        let mut tx = TxLegacy {
            chain_id: Some(self.chain_id),
            nonce,
            gas_price,
            gas_limit,
            to: TxKind::Call(to),
            value,
            input: data,
        };
        let sig = signer
            .sign_transaction_sync(&mut tx)
            .map_err(|e| AppError::prepare(PrepStep::Sign, e))?;
        let signed = tx.into_signed(sig);
        let hash = *signed.hash();
        let raw = TxEnvelope::Legacy(signed).encoded_2718();

        tracing::debug!(
            from = %from,
            to = %to,
            nonce,
            gas_price,
            gas_limit,
            tx_hash = %hash,
            "prepared transaction"
        );

        Ok(PreparedTransaction {
            from,
            nonce,
            gas_price,
            gas_limit,
            hash,
            raw: raw.into(),
        })
    }
}

/// Per-sender mutex held from nonce fetch through broadcast.
///
/// Without it, two submissions from one key can read the same pending nonce and one of
/// them gets dropped by the node. Disabled, it hands out no guards. Entries nobody holds
/// or waits on are dropped on the next acquire, so the map tracks in-flight senders only.
pub struct SubmissionLocks {
    enabled: bool,
    by_sender: Mutex<HashMap<Address, Arc<Mutex<()>>>>,
}

impl SubmissionLocks {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            by_sender: Mutex::new(HashMap::new()),
        }
    }

    pub async fn acquire(&self, sender: Address) -> Option<OwnedMutexGuard<()>> {
        if !self.enabled {
            return None;
        }
        let lock = {
            let mut map = self.by_sender.lock().await;
            map.retain(|_, l| Arc::strong_count(l) > 1);
            map.entry(sender).or_default().clone()
        };
        Some(lock.lock_owned().await)
    }
}
