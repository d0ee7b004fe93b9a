//! Persistence ports for the local projection, plus an in-memory adapter.

use alloy::primitives::U256;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::models::{Circle, CircleStats, LedgerEntry, TxStatus, VolumeStats};
use crate::utils::now_ms;

/// Only circles touched within this window count as trending.
pub const TRENDING_WINDOW_MS: u128 = 24 * 60 * 60 * 1000;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("duplicate transaction hash {0}")]
    DuplicateHash(String),
    #[error("store backend: {0}")]
    Backend(String),
}

#[async_trait]
pub trait CircleStore: Send + Sync {
    /// Inserts a circle and returns it with its assigned id. The incoming `id` is ignored.
    async fn create(&self, circle: Circle) -> Result<Circle, StoreError>;
    async fn get_by_id(&self, id: u64) -> Result<Option<Circle>, StoreError>;
    async fn get_by_chain_id(&self, chain_circle_id: u64) -> Result<Option<Circle>, StoreError>;
    async fn update(&self, circle: &Circle) -> Result<(), StoreError>;
    async fn update_stats(&self, id: u64, stats: &CircleStats) -> Result<(), StoreError>;
    /// Newest first.
    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<Circle>, StoreError>;
    async fn count(&self) -> Result<u64, StoreError>;
    /// Case-insensitive match on name or symbol, most holders first.
    async fn search(
        &self,
        query: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Circle>, StoreError>;
    /// Circles updated within `TRENDING_WINDOW_MS`, highest volume first, then most holders.
    async fn trending(&self, limit: usize) -> Result<Vec<Circle>, StoreError>;
}

#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Fails with `DuplicateHash` if the hash is already recorded.
    async fn create(&self, entry: LedgerEntry) -> Result<(), StoreError>;
    async fn get_by_hash(&self, tx_hash: &str) -> Result<Option<LedgerEntry>, StoreError>;
    /// Newest first.
    async fn list_by_circle(
        &self,
        circle_id: u64,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<LedgerEntry>, StoreError>;
    /// Count and summed amount of confirmed entries for a circle.
    async fn volume_stats(&self, circle_id: u64) -> Result<VolumeStats, StoreError>;
}

fn parse_amount(what: &str, s: &str) -> Result<U256, StoreError> {
    U256::from_str_radix(s, 10)
        .map_err(|err| StoreError::Backend(format!("{what} has bad amount: {err}")))
}

fn hash_key(tx_hash: &str) -> String {
    tx_hash.trim().to_ascii_lowercase()
}

#[derive(Default)]
struct Tables {
    next_id: u64,
    circles: BTreeMap<u64, Circle>,
    ledger: HashMap<String, LedgerEntry>,
}

/// Process-local store. Contents are lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CircleStore for MemoryStore {
    async fn create(&self, mut circle: Circle) -> Result<Circle, StoreError> {
        let mut t = self.tables.write().await;
        t.next_id += 1;
        circle.id = t.next_id;
        t.circles.insert(circle.id, circle.clone());
        Ok(circle)
    }

    async fn get_by_id(&self, id: u64) -> Result<Option<Circle>, StoreError> {
        Ok(self.tables.read().await.circles.get(&id).cloned())
    }

    async fn get_by_chain_id(&self, chain_circle_id: u64) -> Result<Option<Circle>, StoreError> {
        let t = self.tables.read().await;
        Ok(t.circles
            .values()
            .find(|c| c.chain_circle_id == Some(chain_circle_id))
            .cloned())
    }

    async fn update(&self, circle: &Circle) -> Result<(), StoreError> {
        let mut t = self.tables.write().await;
        match t.circles.get_mut(&circle.id) {
            Some(slot) => {
                *slot = circle.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("circle {}", circle.id))),
        }
    }

    async fn update_stats(&self, id: u64, stats: &CircleStats) -> Result<(), StoreError> {
        let mut t = self.tables.write().await;
        let c = t
            .circles
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("circle {id}")))?;
        c.total_supply = stats.total_supply.clone();
        c.holder_count = stats.holder_count;
        c.transaction_count = stats.transaction_count;
        c.total_volume = stats.total_volume.clone();
        c.updated_ts_ms = now_ms();
        Ok(())
    }

    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<Circle>, StoreError> {
        let t = self.tables.read().await;
        Ok(t.circles
            .values()
            .rev()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn count(&self) -> Result<u64, StoreError> {
        Ok(self.tables.read().await.circles.len() as u64)
    }

    async fn search(
        &self,
        query: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Circle>, StoreError> {
        let needle = query.trim().to_lowercase();
        let t = self.tables.read().await;
        let mut hits: Vec<&Circle> = t
            .circles
            .values()
            .filter(|c| {
                c.name.to_lowercase().contains(&needle) || c.symbol.to_lowercase().contains(&needle)
            })
            .collect();
        hits.sort_by(|a, b| b.holder_count.cmp(&a.holder_count).then(b.id.cmp(&a.id)));
        Ok(hits.into_iter().skip(offset).take(limit).cloned().collect())
    }

    async fn trending(&self, limit: usize) -> Result<Vec<Circle>, StoreError> {
        let cutoff = now_ms().saturating_sub(TRENDING_WINDOW_MS);
        let t = self.tables.read().await;
        let mut hot = Vec::new();
        for c in t.circles.values().filter(|c| c.updated_ts_ms > cutoff) {
            let volume = parse_amount(&format!("circle {}", c.id), &c.total_volume)?;
            hot.push((volume, c));
        }
        hot.sort_by(|(va, a), (vb, b)| {
            vb.cmp(va)
                .then(b.holder_count.cmp(&a.holder_count))
                .then(b.id.cmp(&a.id))
        });
        Ok(hot.into_iter().take(limit).map(|(_, c)| c.clone()).collect())
    }
}

#[async_trait]
impl TransactionStore for MemoryStore {
    async fn create(&self, mut entry: LedgerEntry) -> Result<(), StoreError> {
        let key = hash_key(&entry.tx_hash);
        let mut t = self.tables.write().await;
        if t.ledger.contains_key(&key) {
            return Err(StoreError::DuplicateHash(entry.tx_hash));
        }
        entry.tx_hash = key.clone();
        t.ledger.insert(key, entry);
        Ok(())
    }

    async fn get_by_hash(&self, tx_hash: &str) -> Result<Option<LedgerEntry>, StoreError> {
        Ok(self.tables.read().await.ledger.get(&hash_key(tx_hash)).cloned())
    }

    async fn list_by_circle(
        &self,
        circle_id: u64,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        let t = self.tables.read().await;
        let mut rows: Vec<&LedgerEntry> = t
            .ledger
            .values()
            .filter(|e| e.circle_id == circle_id)
            .collect();
        rows.sort_by(|a, b| {
            b.timestamp_ms
                .cmp(&a.timestamp_ms)
                .then_with(|| b.tx_hash.cmp(&a.tx_hash))
        });
        Ok(rows.into_iter().skip(offset).take(limit).cloned().collect())
    }

    async fn volume_stats(&self, circle_id: u64) -> Result<VolumeStats, StoreError> {
        let t = self.tables.read().await;
        let mut count = 0u64;
        let mut total = U256::ZERO;
        for e in t
            .ledger
            .values()
            .filter(|e| e.circle_id == circle_id && e.status == TxStatus::Confirmed)
        {
            let amount = parse_amount(&format!("ledger {}", e.tx_hash), &e.amount)?;
            total = total.saturating_add(amount);
            count += 1;
        }
        Ok(VolumeStats {
            confirmed_count: count,
            total_volume: total.to_string(),
        })
    }
}
