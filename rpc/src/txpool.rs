//! Pending transaction pool.
//!
//! Entries are ordered by effective gas price, highest first, then by
//! arrival. Block proposals additionally keep each sender's transactions in
//! sequence order. The pool only orders and deduplicates; admission checks
//! happen in the service before `insert`.

use std::cmp::Reverse;
use std::collections::BTreeMap;

use ledger_engine::TxInfo;
use ledger_primitives::{Address, Hash, Tx, U256};

use crate::error::{RpcError, RpcResult};

/// Sort key: price descending, then arrival ascending.
type PoolKey = (Reverse<U256>, u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolEntry {
    pub hash: Hash,
    pub tx: Tx,
    pub info: TxInfo,
    /// Canonical bytes as received.
    pub raw: Vec<u8>,
    /// Monotonic insertion counter.
    pub arrival: u64,
}

impl PoolEntry {
    fn key(&self) -> PoolKey {
        (Reverse(self.info.effective_gas_price), self.arrival)
    }
}

#[derive(Debug, Clone)]
pub struct TxPool {
    capacity: usize,
    next_arrival: u64,
    ordered: BTreeMap<PoolKey, PoolEntry>,
    by_hash: BTreeMap<Hash, PoolKey>,
}

impl TxPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            next_arrival: 0,
            ordered: BTreeMap::new(),
            by_hash: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.by_hash.contains_key(hash)
    }

    pub fn insert(&mut self, hash: Hash, tx: Tx, info: TxInfo, raw: Vec<u8>) -> RpcResult<()> {
        if self.contains(&hash) {
            return Err(RpcError::AlreadyPending(ledger_primitives::types::hash_to_hex(&hash)));
        }
        if self.ordered.len() >= self.capacity {
            return Err(RpcError::PoolFull(self.capacity));
        }
        let arrival = self.next_arrival;
        self.next_arrival += 1;
        let key = (Reverse(info.effective_gas_price), arrival);
        self.by_hash.insert(hash, key);
        self.ordered.insert(
            key,
            PoolEntry {
                hash,
                tx,
                info,
                raw,
                arrival,
            },
        );
        Ok(())
    }

    pub fn remove(&mut self, hash: &Hash) -> Option<PoolEntry> {
        let key = self.by_hash.remove(hash)?;
        self.ordered.remove(&key)
    }

    /// Up to `limit` entries in priority order.
    pub fn pending(&self, limit: usize) -> impl Iterator<Item = &PoolEntry> {
        self.ordered.values().take(limit)
    }

    /// Up to `limit` entries for a block proposal. The best-priced head of
    /// any sender goes first, but a sender's own entries always come out in
    /// sequence order so a later one is never proposed ahead of its
    /// predecessor.
    pub fn proposal(&self, limit: usize) -> Vec<&PoolEntry> {
        let mut by_sender: BTreeMap<Address, Vec<&PoolEntry>> = BTreeMap::new();
        for entry in self.ordered.values() {
            by_sender.entry(entry.info.address).or_default().push(entry);
        }
        // lowest sequence last, so `pop` yields it first
        for queue in by_sender.values_mut() {
            queue.sort_by_key(|e| Reverse((e.info.sequence, e.arrival)));
        }

        let mut heads: BTreeMap<PoolKey, Address> = by_sender
            .iter()
            .filter_map(|(address, queue)| queue.last().map(|head| (head.key(), *address)))
            .collect();
        let mut picked = Vec::with_capacity(limit.min(self.len()));
        while picked.len() < limit {
            let Some((_, address)) = heads.pop_first() else {
                break;
            };
            let Some(queue) = by_sender.get_mut(&address) else {
                continue;
            };
            if let Some(entry) = queue.pop() {
                picked.push(entry);
            }
            if let Some(next) = queue.last() {
                heads.insert(next.key(), address);
            }
        }
        picked
    }

    /// All entries in arrival order.
    pub fn by_arrival(&self) -> Vec<&PoolEntry> {
        let mut entries: Vec<_> = self.ordered.values().collect();
        entries.sort_by_key(|e| e.arrival);
        entries
    }
}
