use bsv_primitives::PrimitivesError;

/// Errors from decoding or encoding a transaction.
#[derive(Debug, thiserror::Error)]
pub enum TransactionError {
    /// The input ended, or a varint was invalid, while reading `field`.
    #[error("reading {field}: {source}")]
    Truncated {
        field: &'static str,
        #[source]
        source: PrimitivesError,
    },

    /// A complete transaction was followed by more bytes.
    #[error("trailing {0} bytes after transaction")]
    TrailingBytes(usize),

    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    #[error("primitives error: {0}")]
    Primitives(#[from] PrimitivesError),
}

impl TransactionError {
    /// Wrap a reader failure with the field being read.
    pub(crate) fn truncated(field: &'static str) -> impl FnOnce(PrimitivesError) -> Self {
        move |source| TransactionError::Truncated { field, source }
    }
}
