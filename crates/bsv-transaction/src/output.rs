//! Transaction output: a satoshi value and its locking script bytes.

use bsv_primitives::util::{BsvReader, BsvWriter};

use crate::TransactionError;

/// A single output in a transaction.
///
/// # Wire format
///
/// | Field            | Size           |
/// |------------------|----------------|
/// | satoshis         | 8 bytes (LE)   |
/// | script length    | VarInt         |
/// | locking_script   | variable       |
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TransactionOutput {
    /// The number of satoshis (1 satoshi = 10^-8 BSV) locked by this output.
    pub satoshis: u64,

    /// The locking script (scriptPubKey) bytes.
    pub locking_script: Vec<u8>,
}

impl TransactionOutput {
    /// Create an output of `satoshis` with the given locking script.
    pub fn new(satoshis: u64, locking_script: Vec<u8>) -> Self {
        TransactionOutput { satoshis, locking_script }
    }

    /// Deserialize a `TransactionOutput` from a `BsvReader`.
    ///
    /// # Returns
    /// `Ok(TransactionOutput)` on success, or a `TransactionError` if the
    /// data is truncated or the script length runs past the buffer.
    pub fn read_from(reader: &mut BsvReader) -> Result<Self, TransactionError> {
        let satoshis = reader.read_u64_le().map_err(TransactionError::truncated("satoshis"))?;

        let script = reader
            .read_var_bytes()
            .map_err(TransactionError::truncated("locking script"))?;

        Ok(TransactionOutput {
            satoshis,
            locking_script: script.to_vec(),
        })
    }

    /// Serialize this output into a `BsvWriter`.
    pub fn write_to(&self, writer: &mut BsvWriter) {
        writer.write_u64_le(self.satoshis);
        writer.write_var_bytes(&self.locking_script);
    }

    /// Return the locking script as a hex-encoded string.
    pub fn locking_script_hex(&self) -> String {
        hex::encode(&self.locking_script)
    }
}
