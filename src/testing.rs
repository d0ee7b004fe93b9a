//! Recording fakes shared by unit tests.

use alloy::primitives::{keccak256, Address, Bytes, B256, U256};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::contracts::{ChainCircle, CircleContracts, NewCircle, Quote};
use crate::error::{AppError, AppResult};
use crate::models::{Circle, CircleStats, LedgerEntry, VolumeStats};
use crate::rpc::{CallRequest, ChainRpc, RpcError};
use crate::store::{CircleStore, MemoryStore, StoreError, TransactionStore};
use crate::transactor::Credential;

/// Well-known development key (anvil account 0).
pub const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

pub struct FakeRpc {
    pub chain_id: u64,
    pub nonce: u64,
    pub gas_price: u128,
    pub estimate: u64,
    fail: HashSet<&'static str>,
    responses: Mutex<HashMap<[u8; 4], Bytes>>,
    pub estimates: Mutex<Vec<CallRequest>>,
    pub calls: Mutex<Vec<CallRequest>>,
    pub sent: Mutex<Vec<Bytes>>,
}

impl FakeRpc {
    pub fn new() -> Self {
        Self {
            chain_id: 11_155_111,
            nonce: 4,
            gas_price: 2_000_000_000,
            estimate: 120_000,
            fail: HashSet::new(),
            responses: Mutex::new(HashMap::new()),
            estimates: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// One of `chain_id`, `nonce`, `gas_price`, `estimate_gas`, `call`, `send_raw`.
    pub fn failing(mut self, method: &'static str) -> Self {
        self.fail.insert(method);
        self
    }

    pub fn respond(&self, selector: [u8; 4], data: impl Into<Bytes>) {
        self.responses.lock().unwrap().insert(selector, data.into());
    }

    fn check(&self, method: &'static str) -> Result<(), RpcError> {
        if self.fail.contains(method) {
            return Err(RpcError::Node {
                method,
                message: "injected failure".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ChainRpc for FakeRpc {
    async fn chain_id(&self) -> Result<u64, RpcError> {
        self.check("chain_id")?;
        Ok(self.chain_id)
    }

    async fn pending_nonce(&self, _address: Address) -> Result<u64, RpcError> {
        self.check("nonce")?;
        Ok(self.nonce)
    }

    async fn gas_price(&self) -> Result<u128, RpcError> {
        self.check("gas_price")?;
        Ok(self.gas_price)
    }

    async fn estimate_gas(&self, call: &CallRequest) -> Result<u64, RpcError> {
        self.check("estimate_gas")?;
        self.estimates.lock().unwrap().push(call.clone());
        Ok(self.estimate)
    }

    async fn call(&self, call: &CallRequest) -> Result<Bytes, RpcError> {
        self.check("call")?;
        self.calls.lock().unwrap().push(call.clone());
        let selector: Option<[u8; 4]> = call.data.get(..4).and_then(|s| s.try_into().ok());
        selector
            .and_then(|s| self.responses.lock().unwrap().get(&s).cloned())
            .ok_or(RpcError::Node {
                method: "eth_call",
                message: "execution reverted".into(),
            })
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<B256, RpcError> {
        self.check("send_raw")?;
        self.sent.lock().unwrap().push(Bytes::copy_from_slice(raw));
        Ok(keccak256(raw))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayWrite {
    Create { name: String, curve_type: u8 },
    Buy { token: Address, amount: U256, max_cost: U256 },
    Sell { token: Address, amount: U256, min_refund: U256 },
}

/// `CircleContracts` stand-in returning canned values. Reads fail while `fail_reads` is set.
/// Every accepted write gets its own hash.
pub struct FakeContracts {
    pub hashes: Mutex<Vec<B256>>,
    pub writes: Mutex<Vec<GatewayWrite>>,
    pub reads: Mutex<Vec<&'static str>>,
    pub record: Mutex<Option<ChainCircle>>,
    pub price: U256,
    pub balance: U256,
    pub supply: U256,
    pub fail_reads: AtomicBool,
    pub fail_writes: AtomicBool,
}

impl FakeContracts {
    pub fn new() -> Self {
        Self {
            hashes: Mutex::new(Vec::new()),
            writes: Mutex::new(Vec::new()),
            reads: Mutex::new(Vec::new()),
            record: Mutex::new(None),
            price: U256::from(1_500),
            balance: U256::from(77),
            supply: U256::from(10_000),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
        }
    }

    pub fn with_record(self, record: ChainCircle) -> Self {
        *self.record.lock().unwrap() = Some(record);
        self
    }

    /// Hash handed out by the most recent write.
    pub fn last_hash(&self) -> B256 {
        self.hashes.lock().unwrap().last().copied().unwrap_or_default()
    }

    pub fn write_count(&self) -> usize {
        self.writes.lock().unwrap().len()
    }

    fn write(&self, w: GatewayWrite) -> AppResult<B256> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::prepare(crate::error::PrepStep::Nonce, "node down"));
        }
        self.writes.lock().unwrap().push(w);
        let mut hashes = self.hashes.lock().unwrap();
        let hash = keccak256((hashes.len() as u64 + 1).to_be_bytes());
        hashes.push(hash);
        Ok(hash)
    }

    fn read(&self, what: &'static str) -> AppResult<()> {
        self.reads.lock().unwrap().push(what);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(AppError::BadGateway(format!("{what}: execution reverted")));
        }
        Ok(())
    }
}

pub fn chain_record(id: u64, active: bool) -> ChainCircle {
    ChainCircle {
        id: U256::from(id),
        owner: Address::repeat_byte(0x0a),
        token_address: Address::repeat_byte(0x70),
        bonding_curve: Address::repeat_byte(0xc0),
        name: "Rustaceans".into(),
        symbol: "CRAB".into(),
        description: String::new(),
        active,
        curve_type: 0,
        created_at: U256::from(1_700_000_000u64),
    }
}

#[async_trait]
impl CircleContracts for FakeContracts {
    async fn create_circle(&self, credential: &Credential, circle: &NewCircle) -> AppResult<B256> {
        credential.signer()?;
        self.write(GatewayWrite::Create {
            name: circle.name.clone(),
            curve_type: circle.params.curve_type().tag(),
        })
    }

    async fn buy_tokens(
        &self,
        credential: &Credential,
        token: Address,
        amount: U256,
        max_cost: U256,
    ) -> AppResult<B256> {
        credential.signer()?;
        self.write(GatewayWrite::Buy {
            token,
            amount,
            max_cost,
        })
    }

    async fn sell_tokens(
        &self,
        credential: &Credential,
        token: Address,
        amount: U256,
        min_refund: U256,
    ) -> AppResult<B256> {
        credential.signer()?;
        self.write(GatewayWrite::Sell {
            token,
            amount,
            min_refund,
        })
    }

    async fn circle_record(&self, _chain_circle_id: u64) -> AppResult<ChainCircle> {
        self.read("circles")?;
        self.record
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| AppError::BadGateway("circles: execution reverted".into()))
    }

    async fn current_price(&self, _token: Address) -> AppResult<U256> {
        self.read("getCurrentPrice")?;
        Ok(self.price)
    }

    async fn balance_of(&self, _token: Address, _account: Address) -> AppResult<U256> {
        self.read("balanceOf")?;
        Ok(self.balance)
    }

    async fn buy_quote(&self, _token: Address, amount: U256) -> AppResult<Quote> {
        self.read("calculateBuyCost")?;
        Ok(Quote {
            amount: amount * self.price,
            fee: U256::from(1),
        })
    }

    async fn sell_quote(&self, _token: Address, amount: U256) -> AppResult<Quote> {
        self.read("calculateSellRefund")?;
        Ok(Quote {
            amount: amount * self.price,
            fee: U256::from(1),
        })
    }

    async fn total_supply(&self, _token: Address) -> AppResult<U256> {
        self.read("totalSupply")?;
        Ok(self.supply)
    }
}

/// Ledger that records every attempted write and optionally rejects them all.
pub struct RecordingLedger {
    fail: bool,
    pub attempts: Mutex<Vec<LedgerEntry>>,
}

impl RecordingLedger {
    pub fn new(fail: bool) -> Self {
        Self {
            fail,
            attempts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl TransactionStore for RecordingLedger {
    async fn create(&self, entry: LedgerEntry) -> Result<(), StoreError> {
        self.attempts.lock().unwrap().push(entry);
        if self.fail {
            return Err(StoreError::Backend("connection refused".into()));
        }
        Ok(())
    }

    async fn get_by_hash(&self, tx_hash: &str) -> Result<Option<LedgerEntry>, StoreError> {
        Ok(self
            .attempts
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.tx_hash == tx_hash)
            .cloned())
    }

    async fn list_by_circle(
        &self,
        circle_id: u64,
        _limit: usize,
        _offset: usize,
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        Ok(self
            .attempts
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.circle_id == circle_id)
            .cloned()
            .collect())
    }

    async fn volume_stats(&self, _circle_id: u64) -> Result<VolumeStats, StoreError> {
        Ok(VolumeStats {
            confirmed_count: 0,
            total_volume: "0".into(),
        })
    }
}

/// Memory-backed circle store whose inserts can be made to fail.
pub struct FlakyCircles {
    pub inner: MemoryStore,
    pub fail_create: bool,
}

#[async_trait]
impl CircleStore for FlakyCircles {
    async fn create(&self, circle: Circle) -> Result<Circle, StoreError> {
        if self.fail_create {
            return Err(StoreError::Backend("disk full".into()));
        }
        CircleStore::create(&self.inner, circle).await
    }

    async fn get_by_id(&self, id: u64) -> Result<Option<Circle>, StoreError> {
        self.inner.get_by_id(id).await
    }

    async fn get_by_chain_id(&self, chain_circle_id: u64) -> Result<Option<Circle>, StoreError> {
        self.inner.get_by_chain_id(chain_circle_id).await
    }

    async fn update(&self, circle: &Circle) -> Result<(), StoreError> {
        self.inner.update(circle).await
    }

    async fn update_stats(&self, id: u64, stats: &CircleStats) -> Result<(), StoreError> {
        self.inner.update_stats(id, stats).await
    }

    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<Circle>, StoreError> {
        self.inner.list(limit, offset).await
    }

    async fn count(&self) -> Result<u64, StoreError> {
        self.inner.count().await
    }

    async fn search(
        &self,
        query: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Circle>, StoreError> {
        self.inner.search(query, limit, offset).await
    }

    async fn trending(&self, limit: usize) -> Result<Vec<Circle>, StoreError> {
        self.inner.trending(limit).await
    }
}
