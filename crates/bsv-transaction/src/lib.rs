//! Bitcoin transaction wire-format codec.
//!
//! [`Transaction`] decodes and re-encodes the standard serialization and
//! computes txids. Scripts are carried as opaque byte strings: the analysis
//! layers only need their lengths and the hashes they feed into.

pub mod input;
pub mod output;
pub mod transaction;

mod error;

pub use error::TransactionError;
pub use input::TransactionInput;
pub use output::TransactionOutput;
pub use transaction::Transaction;
