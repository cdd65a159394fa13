//! WhatsOnChain HTTP client for transactions, spent outputs, blocks and
//! Merkle proofs.

use std::sync::Arc;

use async_trait::async_trait;
use bsv_primitives::chainhash::Hash;
use bsv_spv::{
    BlockId, BlockInfo, BlockchainProvider, ProviderError, SpentStatus, TransactionRecord,
    TscProof,
};
use bsv_transaction::Transaction;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::WocError;
use crate::rate_limit::RateLimiter;
use crate::types::{WocBlock, WocConfig, WocSpent, WocTransaction};

/// HTTP client for the WhatsOnChain API.
#[derive(Debug, Clone)]
pub struct WocClient {
    /// Client configuration.
    config: WocConfig,
    /// Underlying HTTP client.
    client: reqwest::Client,
    /// Request pacing, possibly shared with other clients.
    limiter: Arc<RateLimiter>,
}

impl WocClient {
    /// Create a client with its own rate limiter.
    pub fn new(config: WocConfig) -> Self {
        let limiter = Arc::new(RateLimiter::new(config.min_request_interval));
        Self::with_rate_limiter(config, limiter)
    }

    /// Create a client that draws on a shared rate limiter.
    pub fn with_rate_limiter(config: WocConfig, limiter: Arc<RateLimiter>) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
            limiter,
        }
    }

    /// The client's configuration.
    pub fn config(&self) -> &WocConfig {
        &self.config
    }

    /// The limiter pacing this client's requests.
    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Get a decoded transaction by id.
    pub async fn fetch_transaction(&self, txid: &Hash) -> Result<TransactionRecord, WocError> {
        let tx: WocTransaction = self.get_json(&format!("tx/hash/{}", txid)).await?;
        let record = TransactionRecord::try_from(tx)?;
        if record.txid != *txid {
            return Err(WocError::InvalidResponse(format!(
                "asked for {}, got {}",
                txid, record.txid
            )));
        }
        Ok(record)
    }

    /// Get the raw transaction and parse it locally.
    pub async fn fetch_raw_transaction(&self, txid: &Hash) -> Result<Transaction, WocError> {
        let hex = self.get_text(&format!("tx/{}/hex", txid)).await?;
        let tx = Transaction::from_hex(hex.trim())?;
        if tx.txid() != *txid {
            return Err(WocError::InvalidResponse(format!(
                "raw transaction hashes to {}, expected {}",
                tx.txid(),
                txid
            )));
        }
        Ok(tx)
    }

    /// Who spent output `vout` of `txid`. A 404 means unspent.
    pub async fn fetch_spent_status(
        &self,
        txid: &Hash,
        vout: u32,
    ) -> Result<SpentStatus, WocError> {
        match self
            .get_json::<WocSpent>(&format!("tx/{}/{}/spent", txid, vout))
            .await
        {
            Ok(spent) => SpentStatus::try_from(spent),
            Err(WocError::NotFound(_)) => Ok(SpentStatus::Unspent),
            Err(e) => Err(e),
        }
    }

    /// Get a block by height or hash.
    pub async fn fetch_block(&self, id: &BlockId) -> Result<BlockInfo, WocError> {
        let path = match id {
            BlockId::Height(height) => format!("block/height/{}", height),
            BlockId::Hash(hash) => format!("block/hash/{}", hash),
        };
        let block: WocBlock = self.get_json(&path).await?;
        BlockInfo::try_from(block)
    }

    /// Get the TSC Merkle proof of a confirmed transaction.
    pub async fn fetch_tsc_proof(&self, txid: &Hash) -> Result<TscProof, WocError> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum OneOrMany {
            One(TscProof),
            Many(Vec<TscProof>),
        }

        let path = format!("tx/{}/proof/tsc", txid);
        match self.get_json::<Option<OneOrMany>>(&path).await? {
            Some(OneOrMany::One(proof)) => Ok(proof),
            Some(OneOrMany::Many(proofs)) => proofs
                .into_iter()
                .next()
                .ok_or(WocError::NotFound(path)),
            None => Err(WocError::NotFound(path)),
        }
    }

    /// GET a path and deserialize the JSON body.
    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, WocError> {
        let text = self.get_text(path).await?;
        let parsed = serde_json::from_str(&text)?;
        Ok(parsed)
    }

    /// GET a path relative to the network root, retrying on 429 with
    /// exponential backoff.
    async fn get_text(&self, path: &str) -> Result<String, WocError> {
        let url = format!(
            "{}/v1/bsv/{}/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.network,
            path
        );

        let mut attempt: u32 = 0;
        loop {
            self.limiter.acquire().await;
            debug!("GET {}", url);
            let resp = self
                .client
                .get(&url)
                .headers(self.build_headers())
                .send()
                .await?;

            let status = resp.status();

            if status == StatusCode::TOO_MANY_REQUESTS {
                if attempt >= self.config.max_retries {
                    warn!("rate limited on {}, giving up after {} attempts", path, attempt + 1);
                    return Err(WocError::RateLimited {
                        attempts: attempt + 1,
                    });
                }
                let backoff = self
                    .config
                    .retry_backoff
                    .saturating_mul(1u32 << attempt.min(16));
                warn!("rate limited on {}, retrying in {:?}", path, backoff);
                tokio::time::sleep(backoff).await;
                attempt += 1;
                continue;
            }

            if status == StatusCode::NOT_FOUND {
                return Err(WocError::NotFound(path.to_string()));
            }

            if !status.is_success() {
                let message = resp.text().await.unwrap_or_default();
                return Err(WocError::ServerError {
                    status_code: status.as_u16(),
                    message,
                });
            }

            return Ok(resp.text().await?);
        }
    }

    /// Build common headers from config.
    fn build_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();

        if let Some(ref key) = self.config.api_key {
            if let Ok(val) = HeaderValue::from_str(key) {
                headers.insert(AUTHORIZATION, val);
            }
        }

        headers
    }
}

#[async_trait]
impl BlockchainProvider for WocClient {
    async fn get_block(&self, id: &BlockId) -> Result<BlockInfo, ProviderError> {
        Ok(self.fetch_block(id).await?)
    }

    async fn get_transaction(&self, txid: &Hash) -> Result<TransactionRecord, ProviderError> {
        Ok(self.fetch_transaction(txid).await?)
    }

    async fn get_spent_status(&self, txid: &Hash, vout: u32) -> Result<SpentStatus, ProviderError> {
        Ok(self.fetch_spent_status(txid, vout).await?)
    }
}
