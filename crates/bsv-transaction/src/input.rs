//! Transaction input referencing a previous output.
//!
//! Holds the outpoint being spent (previous txid and output index), the
//! unlocking script bytes and the sequence number, with binary
//! serialization following the Bitcoin wire format.

use bsv_primitives::chainhash::Hash;
use bsv_primitives::util::{BsvReader, BsvWriter};

use crate::TransactionError;

/// Default sequence number indicating a finalized input (no relative lock-time).
pub const DEFAULT_SEQUENCE_NUMBER: u32 = 0xFFFF_FFFF;

/// A single input in a transaction.
///
/// # Wire format
///
/// | Field              | Size             |
/// |--------------------|------------------|
/// | source_txid        | 32 bytes (LE)    |
/// | source_tx_out_index| 4 bytes (LE)     |
/// | script length      | VarInt           |
/// | unlocking_script   | variable         |
/// | sequence_number    | 4 bytes (LE)     |
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionInput {
    /// Txid of the output being spent, in internal byte order.
    /// Its `Display` form is the usual reversed hex.
    pub source_txid: Hash,

    /// Index of the output within the source transaction.
    pub source_tx_out_index: u32,

    /// The unlocking script (scriptSig) bytes; empty when unsigned.
    pub unlocking_script: Vec<u8>,

    /// Sequence number. Defaults to `0xFFFFFFFF` (finalized).
    pub sequence_number: u32,
}

impl TransactionInput {
    /// Create an input spending `source_txid:vout` with an empty script.
    pub fn new(source_txid: Hash, vout: u32) -> Self {
        TransactionInput {
            source_txid,
            source_tx_out_index: vout,
            unlocking_script: Vec::new(),
            sequence_number: DEFAULT_SEQUENCE_NUMBER,
        }
    }

    /// Deserialize a `TransactionInput` from a `BsvReader`.
    ///
    /// # Arguments
    /// * `reader` - The reader positioned at the start of an encoded input.
    ///
    /// # Returns
    /// `Ok(TransactionInput)` on success, or a `TransactionError` if the
    /// data is truncated or the script length runs past the buffer.
    pub fn read_from(reader: &mut BsvReader) -> Result<Self, TransactionError> {
        let txid_bytes = reader
            .read_array::<32>()
            .map_err(TransactionError::truncated("source txid"))?;

        let source_tx_out_index = reader
            .read_u32_le()
            .map_err(TransactionError::truncated("output index"))?;

        let script = reader
            .read_var_bytes()
            .map_err(TransactionError::truncated("unlocking script"))?;

        let sequence_number = reader
            .read_u32_le()
            .map_err(TransactionError::truncated("sequence number"))?;

        Ok(TransactionInput {
            source_txid: Hash::new(txid_bytes),
            source_tx_out_index,
            unlocking_script: script.to_vec(),
            sequence_number,
        })
    }

    /// Serialize this input into a `BsvWriter`.
    pub fn write_to(&self, writer: &mut BsvWriter) {
        writer.write_bytes(self.source_txid.as_bytes());
        writer.write_u32_le(self.source_tx_out_index);
        writer.write_var_bytes(&self.unlocking_script);
        writer.write_u32_le(self.sequence_number);
    }

    /// The spent outpoint's txid in display hex.
    pub fn source_txid_hex(&self) -> String {
        self.source_txid.to_string()
    }
}
