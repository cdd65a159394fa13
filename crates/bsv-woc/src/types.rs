//! WhatsOnChain data types: configuration and the JSON models of the
//! transaction, spent-output and block endpoints.

use std::time::Duration;

use bsv_primitives::chainhash::Hash;
use bsv_spv::{BlockInfo, InputRecord, OutputRecord, SpentStatus, TransactionRecord};
use serde::{Deserialize, Serialize};

use crate::error::WocError;

const SATOSHIS_PER_BSV: u64 = 100_000_000;

/// Configuration for a [`WocClient`](crate::WocClient).
#[derive(Debug, Clone)]
pub struct WocConfig {
    /// Base URL of the API (e.g. `https://api.whatsonchain.com`).
    pub base_url: String,
    /// `main` or `test`.
    pub network: String,
    /// Optional API key sent via the `Authorization` header.
    pub api_key: Option<String>,
    /// Minimum spacing between requests. The public tier allows about
    /// three requests per second.
    pub min_request_interval: Duration,
    /// Retries after a 429 before giving up.
    pub max_retries: u32,
    /// Wait before the first retry; doubled for each further retry.
    pub retry_backoff: Duration,
}

impl Default for WocConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.whatsonchain.com".to_string(),
            network: "main".to_string(),
            api_key: None,
            min_request_interval: Duration::from_millis(350),
            max_retries: 3,
            retry_backoff: Duration::from_secs(1),
        }
    }
}

/// A transaction from `GET /tx/hash/{txid}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WocTransaction {
    /// Transaction ID (display hex).
    pub txid: String,
    /// Transaction version.
    #[serde(default)]
    pub version: i32,
    /// Lock time.
    #[serde(default)]
    pub locktime: u32,
    /// Inputs.
    #[serde(default)]
    pub vin: Vec<WocInput>,
    /// Outputs.
    #[serde(default)]
    pub vout: Vec<WocOutput>,
    /// Containing block hash, if mined.
    #[serde(default)]
    pub blockhash: Option<String>,
    /// Containing block height, if mined.
    #[serde(default)]
    pub blockheight: Option<u64>,
    /// Confirmation count, if mined.
    #[serde(default)]
    pub confirmations: Option<u64>,
}

/// A transaction input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WocInput {
    /// Present only on coinbase inputs.
    #[serde(default)]
    pub coinbase: Option<String>,
    /// Spent transaction ID.
    #[serde(default)]
    pub txid: Option<String>,
    /// Spent output index.
    #[serde(default)]
    pub vout: Option<u32>,
    /// Sequence number.
    #[serde(default = "final_sequence")]
    pub sequence: u32,
}

fn final_sequence() -> u32 {
    0xFFFF_FFFF
}

/// A transaction output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WocOutput {
    /// Amount in BSV, not satoshis.
    pub value: serde_json::Number,
    /// Output index.
    pub n: u32,
    /// Locking script.
    #[serde(rename = "scriptPubKey", default)]
    pub script_pub_key: WocScript,
}

/// A script as WhatsOnChain reports it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WocScript {
    /// Script bytes, hex-encoded.
    #[serde(default)]
    pub hex: String,
}

/// Body of `GET /tx/{txid}/{vout}/spent` for a spent output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WocSpent {
    /// Spending transaction ID.
    pub txid: String,
    /// Input index within the spending transaction.
    pub vin: u32,
}

/// A block from `GET /block/height/{h}` or `GET /block/hash/{hash}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WocBlock {
    /// Block hash.
    pub hash: String,
    /// Block height.
    pub height: u64,
    /// Merkle root (display hex).
    pub merkleroot: String,
    /// Transaction IDs. Large blocks may list only a page of them.
    #[serde(default)]
    pub tx: Vec<String>,
    /// Block timestamp.
    #[serde(default)]
    pub time: Option<u64>,
}

impl TryFrom<WocTransaction> for TransactionRecord {
    type Error = WocError;

    fn try_from(tx: WocTransaction) -> Result<Self, WocError> {
        let inputs = tx
            .vin
            .iter()
            .map(|input| {
                if input.coinbase.is_some() {
                    return Ok(InputRecord {
                        prev_txid: None,
                        prev_output_index: input.vout.unwrap_or(0xFFFF_FFFF),
                        sequence: input.sequence,
                    });
                }
                let prev = input.txid.as_deref().ok_or_else(|| {
                    WocError::InvalidResponse("input without txid or coinbase".to_string())
                })?;
                Ok(InputRecord {
                    prev_txid: Some(Hash::from_hex(prev)?),
                    prev_output_index: input.vout.unwrap_or(0),
                    sequence: input.sequence,
                })
            })
            .collect::<Result<Vec<_>, WocError>>()?;

        let outputs = tx
            .vout
            .iter()
            .map(|output| {
                Ok(OutputRecord {
                    index: output.n,
                    value_satoshis: bsv_to_satoshis(&output.value)?,
                    locking_script: hex::decode(&output.script_pub_key.hex).map_err(|e| {
                        WocError::InvalidResponse(format!("output {} script: {}", output.n, e))
                    })?,
                })
            })
            .collect::<Result<Vec<_>, WocError>>()?;

        Ok(TransactionRecord {
            txid: Hash::from_hex(&tx.txid)?,
            version: tx.version,
            inputs,
            outputs,
            lock_time: tx.locktime,
            confirmations: tx.confirmations,
            block_height: tx.blockheight,
            block_hash: tx.blockhash.as_deref().map(Hash::from_hex).transpose()?,
        })
    }
}

impl TryFrom<WocSpent> for SpentStatus {
    type Error = WocError;

    fn try_from(spent: WocSpent) -> Result<Self, WocError> {
        Ok(SpentStatus::Spent {
            txid: Hash::from_hex(&spent.txid)?,
            input_index: spent.vin,
        })
    }
}

impl TryFrom<WocBlock> for BlockInfo {
    type Error = WocError;

    fn try_from(block: WocBlock) -> Result<Self, WocError> {
        Ok(BlockInfo {
            hash: Hash::from_hex(&block.hash)?,
            height: block.height,
            merkle_root: Hash::from_hex(&block.merkleroot)?,
            tx_ids: block
                .tx
                .iter()
                .map(|t| Hash::from_hex(t))
                .collect::<Result<_, _>>()?,
            time: block.time,
        })
    }
}

/// Convert a decimal BSV amount to satoshis without going through `f64`
/// where the decimal form is available.
pub fn bsv_to_satoshis(value: &serde_json::Number) -> Result<u64, WocError> {
    let invalid = || WocError::InvalidResponse(format!("invalid amount {}", value));
    let text = value.to_string();

    if text.contains(['e', 'E']) {
        let bsv = value.as_f64().ok_or_else(invalid)?;
        if !(0.0..=21e6).contains(&bsv) {
            return Err(invalid());
        }
        return Ok((bsv * SATOSHIS_PER_BSV as f64).round() as u64);
    }

    let (whole, frac) = text.split_once('.').unwrap_or((text.as_str(), ""));
    if whole.starts_with('-') || frac.len() > 8 {
        return Err(invalid());
    }
    let whole: u64 = whole.parse().map_err(|_| invalid())?;
    let frac: u64 = if frac.is_empty() {
        0
    } else {
        format!("{:0<8}", frac).parse().map_err(|_| invalid())?
    };
    whole
        .checked_mul(SATOSHIS_PER_BSV)
        .and_then(|s| s.checked_add(frac))
        .ok_or_else(invalid)
}
