//! Blockchain data provider interface.
//!
//! The traversal engine and BUMP validation read chain data through
//! [`BlockchainProvider`]. Implementations own their own rate limiting and
//! retry policy; callers only see the final outcome of each request.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use bsv_primitives::chainhash::Hash;
use bsv_transaction::Transaction;
use serde::{Deserialize, Serialize};

/// Identifies a block either by height or by hash.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlockId {
    Height(u64),
    Hash(Hash),
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockId::Height(h) => write!(f, "{}", h),
            BlockId::Hash(h) => write!(f, "{}", h),
        }
    }
}

impl FromStr for BlockId {
    type Err = bsv_primitives::PrimitivesError;

    /// Digits-only input is a height; anything else must be a block hash.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.parse::<u64>() {
            Ok(height) if s.len() < 64 => Ok(BlockId::Height(height)),
            _ => Ok(BlockId::Hash(Hash::from_hex(s)?)),
        }
    }
}

impl From<u64> for BlockId {
    fn from(height: u64) -> Self {
        BlockId::Height(height)
    }
}

impl From<Hash> for BlockId {
    fn from(hash: Hash) -> Self {
        BlockId::Hash(hash)
    }
}

/// Block data needed to check Merkle proofs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockInfo {
    pub hash: Hash,
    pub height: u64,
    pub merkle_root: Hash,
    /// Transaction ids in block order. May be empty when the provider
    /// does not list them.
    pub tx_ids: Vec<Hash>,
    /// Block timestamp (Unix seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<u64>,
}

/// One input of a fetched transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputRecord {
    /// `None` for a coinbase input.
    pub prev_txid: Option<Hash>,
    pub prev_output_index: u32,
    pub sequence: u32,
}

/// One output of a fetched transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputRecord {
    pub index: u32,
    pub value_satoshis: u64,
    #[serde(with = "hex_bytes")]
    pub locking_script: Vec<u8>,
}

/// A transaction as returned by a provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub txid: Hash,
    pub version: i32,
    pub inputs: Vec<InputRecord>,
    pub outputs: Vec<OutputRecord>,
    pub lock_time: u32,
    #[serde(default)]
    pub confirmations: Option<u64>,
    #[serde(default)]
    pub block_height: Option<u64>,
    #[serde(default)]
    pub block_hash: Option<Hash>,
}

impl TransactionRecord {
    /// Build a record from a decoded transaction (unconfirmed).
    pub fn from_transaction(tx: &Transaction) -> Self {
        let coinbase = tx.is_coinbase();
        TransactionRecord {
            txid: tx.txid(),
            version: tx.version,
            inputs: tx
                .inputs
                .iter()
                .map(|i| InputRecord {
                    prev_txid: (!coinbase).then_some(i.source_txid),
                    prev_output_index: i.source_tx_out_index,
                    sequence: i.sequence_number,
                })
                .collect(),
            outputs: tx
                .outputs
                .iter()
                .enumerate()
                .map(|(index, o)| OutputRecord {
                    index: index as u32,
                    value_satoshis: o.satoshis,
                    locking_script: o.locking_script.clone(),
                })
                .collect(),
            lock_time: tx.lock_time,
            confirmations: None,
            block_height: None,
            block_hash: None,
        }
    }

    /// Sum of output values, saturating.
    pub fn total_output_satoshis(&self) -> u64 {
        self.outputs
            .iter()
            .fold(0u64, |acc, o| acc.saturating_add(o.value_satoshis))
    }
}

/// Spent status of one output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum SpentStatus {
    Unspent,
    #[serde(rename_all = "camelCase")]
    Spent { txid: Hash, input_index: u32 },
}

/// Errors a provider reports for a single request.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// The resource does not exist (HTTP 404).
    #[error("not found: {0}")]
    NotFound(String),

    /// The provider is throttling us and retries ran out (HTTP 429).
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Any other 4xx response.
    #[error("client error {status}: {message}")]
    Client { status: u16, message: String },

    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },

    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The response body could not be understood.
    #[error("decode error: {0}")]
    Decode(String),
}

impl ProviderError {
    /// Whether a spent-status lookup failing this way should be read as
    /// "unspent".
    ///
    /// Besides 404 this also covers the other 4xx responses (except 429).
    /// That is an approximation: a genuinely bad request ends its branch as
    /// a UTXO instead of being counted as an error.
    pub fn is_unspent_equivalent(&self) -> bool {
        matches!(self, ProviderError::NotFound(_) | ProviderError::Client { .. })
    }

    /// Whether the same request might succeed later.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimited(_)
                | ProviderError::Server { .. }
                | ProviderError::Transport(_)
        )
    }
}

/// Read access to blocks, transactions and output spend status.
#[async_trait]
pub trait BlockchainProvider: Send + Sync {
    /// Fetch a block by height or hash.
    async fn get_block(&self, id: &BlockId) -> Result<BlockInfo, ProviderError>;

    /// Fetch a transaction by txid.
    async fn get_transaction(&self, txid: &Hash) -> Result<TransactionRecord, ProviderError>;

    /// Ask who (if anyone) spent output `vout` of `txid`.
    async fn get_spent_status(&self, txid: &Hash, vout: u32) -> Result<SpentStatus, ProviderError>;
}

#[async_trait]
impl<P: BlockchainProvider + ?Sized> BlockchainProvider for Arc<P> {
    async fn get_block(&self, id: &BlockId) -> Result<BlockInfo, ProviderError> {
        (**self).get_block(id).await
    }

    async fn get_transaction(&self, txid: &Hash) -> Result<TransactionRecord, ProviderError> {
        (**self).get_transaction(txid).await
    }

    async fn get_spent_status(&self, txid: &Hash, vout: u32) -> Result<SpentStatus, ProviderError> {
        (**self).get_spent_status(txid, vout).await
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}
