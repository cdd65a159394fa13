#![deny(missing_docs)]

//! # bsv-woc
//!
//! WhatsOnChain client for fetching BSV transactions, output spend status,
//! blocks and Merkle proofs.
//!
//! [`WocClient`] implements [`bsv_spv::BlockchainProvider`], so it can feed
//! the traversal engine and [`bsv_spv::ProviderChainTracker`] directly.
//! Requests are paced by a [`RateLimiter`] and retried with exponential
//! backoff when the API answers 429.
//!
//! # Example
//!
//! ```no_run
//! use bsv_primitives::chainhash::Hash;
//! use bsv_spv::BlockId;
//! use bsv_woc::{WocClient, WocConfig};
//!
//! # async fn example() -> Result<(), bsv_woc::WocError> {
//! let client = WocClient::new(WocConfig {
//!     api_key: Some("my-key".to_string()),
//!     ..Default::default()
//! });
//!
//! let txid = Hash::from_hex("157428aee67d11123203735e4c540fa1bdab3b36d5882c6f8c5ff79f07d20d1c")?;
//! let tx = client.fetch_transaction(&txid).await?;
//! println!("outputs: {}", tx.outputs.len());
//!
//! let block = client.fetch_block(&BlockId::Height(814435)).await?;
//! println!("merkle root: {}", block.merkle_root);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod rate_limit;
pub mod types;

#[cfg(test)]
mod tests;

pub use client::WocClient;
pub use error::WocError;
pub use rate_limit::RateLimiter;
pub use types::WocConfig;
