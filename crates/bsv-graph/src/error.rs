//! Error types for graph traversal.

use bsv_primitives::chainhash::Hash;
use bsv_spv::ProviderError;

use crate::types::TraversalStatus;

/// Errors returned by [`crate::TraversalEngine`] operations.
///
/// Provider failures on individual items are not errors: they are counted
/// in the stats and the branch is abandoned.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// The root transaction could not be fetched.
    #[error("failed to fetch root transaction {txid}: {source}")]
    RootFetch {
        txid: Hash,
        #[source]
        source: ProviderError,
    },

    /// A traversal is already running or paused on this engine.
    #[error("traversal already {0}")]
    AlreadyActive(TraversalStatus),
}
