//! Thin seam over the node's JSON-RPC.
//!
//! Everything above this module talks to `ChainRpc`, so tests can swap in a recording fake.

use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::providers::{Provider, RootProvider};
use alloy::rpc::types::TransactionRequest;
use alloy::transports::TransportError;
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("{method}: {message}")]
    Node {
        method: &'static str,
        message: String,
    },
    #[error("{method}: no response after {after:?}")]
    Timeout {
        method: &'static str,
        after: Duration,
    },
}

/// A call against a contract, used both for `eth_call` and for gas estimation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRequest {
    pub from: Option<Address>,
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
}

impl CallRequest {
    pub fn view(to: Address, data: Bytes) -> Self {
        Self {
            from: None,
            to,
            value: U256::ZERO,
            data,
        }
    }
}

#[async_trait]
pub trait ChainRpc: Send + Sync {
    async fn chain_id(&self) -> Result<u64, RpcError>;
    async fn pending_nonce(&self, address: Address) -> Result<u64, RpcError>;
    async fn gas_price(&self) -> Result<u128, RpcError>;
    async fn estimate_gas(&self, call: &CallRequest) -> Result<u64, RpcError>;
    async fn call(&self, call: &CallRequest) -> Result<Bytes, RpcError>;
    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<B256, RpcError>;
}

/// HTTP JSON-RPC client; every call is bounded by `timeout`.
pub struct NodeClient {
    provider: RootProvider,
    timeout: Duration,
}

impl NodeClient {
    pub fn new(url: Url, timeout: Duration) -> Self {
        Self {
            provider: RootProvider::new_http(url),
            timeout,
        }
    }

    async fn bounded<T, F>(&self, method: &'static str, fut: F) -> Result<T, RpcError>
    where
        F: Future<Output = Result<T, TransportError>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(v)) => Ok(v),
            Ok(Err(e)) => Err(RpcError::Node {
                method,
                message: e.to_string(),
            }),
            Err(_) => Err(RpcError::Timeout {
                method,
                after: self.timeout,
            }),
        }
    }
}

fn to_request(call: &CallRequest) -> TransactionRequest {
    let tx = TransactionRequest::default()
        .with_to(call.to)
        .with_value(call.value)
        .with_input(call.data.clone());
    match call.from {
        Some(from) => tx.with_from(from),
        None => tx,
    }
}

#[async_trait]
impl ChainRpc for NodeClient {
    async fn chain_id(&self) -> Result<u64, RpcError> {
        self.bounded("eth_chainId", async { self.provider.get_chain_id().await })
            .await
    }

    async fn pending_nonce(&self, address: Address) -> Result<u64, RpcError> {
        self.bounded("eth_getTransactionCount", async {
            self.provider.get_transaction_count(address).pending().await
        })
        .await
    }

    async fn gas_price(&self) -> Result<u128, RpcError> {
        self.bounded("eth_gasPrice", async { self.provider.get_gas_price().await })
            .await
    }

    async fn estimate_gas(&self, call: &CallRequest) -> Result<u64, RpcError> {
        let tx = to_request(call);
        self.bounded("eth_estimateGas", async { self.provider.estimate_gas(tx).await })
            .await
    }

    async fn call(&self, call: &CallRequest) -> Result<Bytes, RpcError> {
        let tx = to_request(call);
        self.bounded("eth_call", async { self.provider.call(tx).await })
            .await
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<B256, RpcError> {
        self.bounded("eth_sendRawTransaction", async {
            let pending = self.provider.send_raw_transaction(raw).await?;
            Ok::<_, TransportError>(*pending.tx_hash())
        })
        .await
    }
}
