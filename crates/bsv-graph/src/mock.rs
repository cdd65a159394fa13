//! In-memory provider for tests and demos.
//!
//! Holds a finite spending graph, can be told to fail specific requests,
//! and can hold a spent-status call open until the test releases it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bsv_primitives::chainhash::Hash;
use bsv_spv::{
    BlockId, BlockInfo, BlockchainProvider, InputRecord, OutputRecord, ProviderError, SpentStatus,
    TransactionRecord,
};
use parking_lot::RwLock;
use tokio::sync::Notify;

/// Holds one provider call open.
///
/// The call signals `reached` when it arrives and then waits for
/// `release`. Both use stored permits, so the order in which the test and
/// the call get there does not matter.
#[derive(Debug, Default)]
pub struct CallGate {
    reached: Notify,
    release: Notify,
}

impl CallGate {
    /// Wait until the gated call has arrived.
    pub async fn reached(&self) {
        self.reached.notified().await;
    }

    /// Let the gated call return.
    pub fn release(&self) {
        self.release.notify_one();
    }
}

#[derive(Debug, Default)]
pub struct MockProvider {
    transactions: RwLock<HashMap<Hash, TransactionRecord>>,
    spends: RwLock<HashMap<(Hash, u32), SpentStatus>>,
    blocks: RwLock<Vec<BlockInfo>>,
    tx_failures: RwLock<HashMap<Hash, ProviderError>>,
    spent_failures: RwLock<HashMap<(Hash, u32), ProviderError>>,
    spent_gates: RwLock<HashMap<(Hash, u32), Arc<CallGate>>>,
    tx_gates: RwLock<HashMap<Hash, Arc<CallGate>>>,
    latency: Option<Duration>,
    calls: AtomicU64,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn add_transaction(&self, record: TransactionRecord) {
        self.transactions.write().insert(record.txid, record);
    }

    /// Record that `spender` consumes output `vout` of `txid`.
    pub fn add_spend(&self, txid: Hash, vout: u32, spender: Hash, input_index: u32) {
        self.spends.write().insert(
            (txid, vout),
            SpentStatus::Spent {
                txid: spender,
                input_index,
            },
        );
    }

    pub fn add_block(&self, block: BlockInfo) {
        self.blocks.write().push(block);
    }

    /// Make every fetch of `txid` fail with `error`.
    pub fn fail_transaction(&self, txid: Hash, error: ProviderError) {
        self.tx_failures.write().insert(txid, error);
    }

    /// Make every spent-status lookup of `txid:vout` fail with `error`.
    pub fn fail_spent_status(&self, txid: Hash, vout: u32, error: ProviderError) {
        self.spent_failures.write().insert((txid, vout), error);
    }

    /// Hold the next spent-status lookup of `txid:vout` until released.
    pub fn gate_spent_status(&self, txid: Hash, vout: u32) -> Arc<CallGate> {
        let gate = Arc::new(CallGate::default());
        self.spent_gates.write().insert((txid, vout), Arc::clone(&gate));
        gate
    }

    /// Hold the next fetch of `txid` until released.
    pub fn gate_transaction(&self, txid: Hash) -> Arc<CallGate> {
        let gate = Arc::new(CallGate::default());
        self.tx_gates.write().insert(txid, Arc::clone(&gate));
        gate
    }

    /// Total calls made against this provider.
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    async fn enter(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

async fn pass(gate: Option<Arc<CallGate>>) {
    if let Some(gate) = gate {
        gate.reached.notify_one();
        gate.release.notified().await;
    }
}

#[async_trait]
impl BlockchainProvider for MockProvider {
    async fn get_block(&self, id: &BlockId) -> Result<BlockInfo, ProviderError> {
        self.enter().await;
        self.blocks
            .read()
            .iter()
            .find(|b| match id {
                BlockId::Height(h) => b.height == *h,
                BlockId::Hash(h) => b.hash == *h,
            })
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(format!("block {}", id)))
    }

    async fn get_transaction(&self, txid: &Hash) -> Result<TransactionRecord, ProviderError> {
        self.enter().await;
        let gate = self.tx_gates.write().remove(txid);
        pass(gate).await;
        if let Some(error) = self.tx_failures.read().get(txid) {
            return Err(error.clone());
        }
        self.transactions
            .read()
            .get(txid)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(format!("transaction {}", txid)))
    }

    async fn get_spent_status(&self, txid: &Hash, vout: u32) -> Result<SpentStatus, ProviderError> {
        self.enter().await;
        let gate = self.spent_gates.write().remove(&(*txid, vout));
        pass(gate).await;
        if let Some(error) = self.spent_failures.read().get(&(*txid, vout)) {
            return Err(error.clone());
        }
        let status = self.spends.read().get(&(*txid, vout)).copied();
        status.ok_or_else(|| ProviderError::NotFound(format!("{}:{} unspent", txid, vout)))
    }
}

/// A transaction record with the given inputs and output values.
pub fn record(txid: Hash, inputs: &[(Hash, u32)], values: &[u64]) -> TransactionRecord {
    TransactionRecord {
        txid,
        version: 1,
        inputs: inputs
            .iter()
            .map(|&(prev, vout)| InputRecord {
                prev_txid: Some(prev),
                prev_output_index: vout,
                sequence: 0xFFFF_FFFF,
            })
            .collect(),
        outputs: values
            .iter()
            .enumerate()
            .map(|(index, &value)| OutputRecord {
                index: index as u32,
                value_satoshis: value,
                locking_script: vec![0x76, 0xa9],
            })
            .collect(),
        lock_time: 0,
        confirmations: None,
        block_height: None,
        block_hash: None,
    }
}
