//! Chain tracker trait for SPV verification.

use async_trait::async_trait;
use bsv_primitives::chainhash::Hash;

use crate::error::SpvError;
use crate::provider::{BlockId, BlockchainProvider, ProviderError};

/// Verifies Merkle roots against block headers.
///
/// Implementors provide access to block header data, allowing SPV
/// verification of transactions by checking that a computed Merkle root
/// matches the expected root for a given block height.
#[async_trait]
pub trait ChainTracker: Send + Sync {
    /// Verify that a Merkle root is valid for a given block height.
    ///
    /// # Returns
    /// `Ok(true)` if the root matches the block at the given height,
    /// `Ok(false)` if it does not or no such block exists.
    async fn is_valid_root_for_height(&self, root: &Hash, height: u64) -> Result<bool, SpvError>;
}

/// A [`ChainTracker`] backed by any [`BlockchainProvider`].
#[derive(Debug, Clone)]
pub struct ProviderChainTracker<P> {
    provider: P,
}

impl<P: BlockchainProvider> ProviderChainTracker<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }
}

#[async_trait]
impl<P: BlockchainProvider> ChainTracker for ProviderChainTracker<P> {
    async fn is_valid_root_for_height(&self, root: &Hash, height: u64) -> Result<bool, SpvError> {
        match self.provider.get_block(&BlockId::Height(height)).await {
            Ok(block) => Ok(block.merkle_root == *root),
            Err(ProviderError::NotFound(_)) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
