use crate::provider::ProviderError;

/// Error types for Merkle, BUMP, BEEF and chain-tracking operations.
#[derive(Debug, thiserror::Error)]
pub enum SpvError {
    /// A Merkle tree was requested over zero leaves.
    #[error("cannot build a merkle tree from an empty leaf list")]
    EmptyInput,

    /// A leaf index outside `0..count`.
    #[error("leaf index {index} out of range for {count} leaves")]
    IndexOutOfRange { index: usize, count: usize },

    /// The declared leaf count disagrees with the leaves supplied.
    #[error("leaf count {declared} does not match {actual} supplied leaves")]
    LeafCountMismatch { declared: usize, actual: usize },

    /// The BEEF byte stream could not be decoded.
    #[error("malformed BEEF at offset {offset}: {reason}")]
    MalformedBeef { offset: usize, reason: String },

    /// A structurally valid BEEF that cannot be encoded or used as asked.
    #[error("invalid BEEF: {0}")]
    InvalidBeef(String),

    #[error("invalid merkle path: {0}")]
    InvalidMerklePath(String),

    #[error("invalid merkle proof: {0}")]
    InvalidProof(String),

    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("transaction error: {0}")]
    Transaction(#[from] bsv_transaction::TransactionError),

    #[error("primitives error: {0}")]
    Primitives(#[from] bsv_primitives::PrimitivesError),

    #[error("hex error: {0}")]
    Hex(#[from] hex::FromHexError),
}
