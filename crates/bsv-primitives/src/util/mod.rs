//! Binary encoding utilities.
//!
//! Provides VarInt encoding/decoding, the `BsvReader` cursor and `BsvWriter`
//! buffer used by the transaction, BUMP and BEEF codecs, and byte-order
//! reversal helpers.

use crate::PrimitivesError;

/// Reverse a byte slice into a new vector.
///
/// Converts between internal (wire) order and display order for hashes.
pub fn reverse_bytes(bytes: &[u8]) -> Vec<u8> {
    bytes.iter().rev().copied().collect()
}

// ---------------------------------------------------------------------------
// VarInt
// ---------------------------------------------------------------------------

/// A Bitcoin protocol variable-length integer.
///
/// Used to prefix counts and lengths. The encoding uses 1, 3, 5, or 9 bytes
/// depending on the magnitude of the value. Decoding accepts any of the four
/// size classes (including non-minimal ones); encoding always produces the
/// minimal form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VarInt(pub u64);

impl VarInt {
    /// Decode a VarInt from the start of a byte slice.
    ///
    /// # Returns
    /// The decoded value and the number of bytes consumed, or
    /// `TruncatedInput` if the slice is shorter than the size class needs.
    pub fn from_bytes(data: &[u8]) -> Result<(Self, usize), PrimitivesError> {
        read_varint(data, 0).map(|(v, n)| (VarInt(v), n))
    }

    /// Return the wire-format byte length of this VarInt.
    ///
    /// # Returns
    /// 1, 3, 5, or 9 depending on the value.
    pub fn length(&self) -> usize {
        match self.0 {
            0..=0xfc => 1,
            0xfd..=0xffff => 3,
            0x1_0000..=0xffff_ffff => 5,
            _ => 9,
        }
    }

    /// Encode the VarInt into a new byte vector.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = vec![0u8; self.length()];
        self.put_bytes(&mut buf);
        buf
    }

    /// Write the VarInt into a destination buffer.
    ///
    /// The buffer must be at least `self.length()` bytes long.
    ///
    /// # Returns
    /// The number of bytes written.
    pub fn put_bytes(&self, dst: &mut [u8]) -> usize {
        let v = self.0;
        match self.length() {
            1 => {
                dst[0] = v as u8;
                1
            }
            3 => {
                dst[0] = 0xfd;
                dst[1..3].copy_from_slice(&(v as u16).to_le_bytes());
                3
            }
            5 => {
                dst[0] = 0xfe;
                dst[1..5].copy_from_slice(&(v as u32).to_le_bytes());
                5
            }
            _ => {
                dst[0] = 0xff;
                dst[1..9].copy_from_slice(&v.to_le_bytes());
                9
            }
        }
    }

    /// Return the underlying u64 value.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl From<u64> for VarInt {
    fn from(v: u64) -> Self {
        VarInt(v)
    }
}

impl From<usize> for VarInt {
    fn from(v: usize) -> Self {
        VarInt(v as u64)
    }
}

/// Read a varint from `buffer` starting at `offset`.
///
/// # Arguments
/// * `buffer` - The full input buffer.
/// * `offset` - Position of the varint's first byte.
///
/// # Returns
/// `(value, bytes_consumed)`, or `TruncatedInput` when the buffer ends
/// before the size class is complete.
pub fn read_varint(buffer: &[u8], offset: usize) -> Result<(u64, usize), PrimitivesError> {
    let available = buffer.len().saturating_sub(offset);
    let first = *buffer.get(offset).ok_or(PrimitivesError::TruncatedInput {
        offset,
        needed: 1,
        available,
    })?;
    let width = match first {
        0xfd => 2,
        0xfe => 4,
        0xff => 8,
        b => return Ok((b as u64, 1)),
    };
    if available < 1 + width {
        return Err(PrimitivesError::TruncatedInput {
            offset,
            needed: 1 + width,
            available,
        });
    }
    let mut le = [0u8; 8];
    le[..width].copy_from_slice(&buffer[offset + 1..offset + 1 + width]);
    Ok((u64::from_le_bytes(le), 1 + width))
}

/// Encode `value` as a canonical (minimal-length) varint.
pub fn write_varint(value: u64) -> Vec<u8> {
    VarInt(value).to_bytes()
}

// ---------------------------------------------------------------------------
// BsvReader
// ---------------------------------------------------------------------------

/// A cursor-based reader for Bitcoin protocol binary data.
///
/// Wraps a byte slice and maintains a read position. Every failed read
/// reports the offset at which it was attempted, so decoders built on top
/// can point at the exact malformed byte.
pub struct BsvReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BsvReader<'a> {
    /// Create a new reader positioned at the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        BsvReader { data, pos: 0 }
    }

    /// Read `n` bytes and advance the position.
    ///
    /// # Returns
    /// A byte slice of length `n`, or `TruncatedInput` if fewer remain.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], PrimitivesError> {
        if n > self.remaining() {
            return Err(PrimitivesError::TruncatedInput {
                offset: self.pos,
                needed: n,
                available: self.remaining(),
            });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Read exactly `N` bytes into an array.
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], PrimitivesError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    /// Read a single byte.
    pub fn read_u8(&mut self) -> Result<u8, PrimitivesError> {
        Ok(self.read_array::<1>()?[0])
    }

    /// Read a little-endian u16.
    pub fn read_u16_le(&mut self) -> Result<u16, PrimitivesError> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    /// Read a little-endian u32.
    pub fn read_u32_le(&mut self) -> Result<u32, PrimitivesError> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    /// Read a little-endian u64.
    pub fn read_u64_le(&mut self) -> Result<u64, PrimitivesError> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    /// Read a VarInt and advance past it.
    pub fn read_varint(&mut self) -> Result<VarInt, PrimitivesError> {
        let (value, consumed) = read_varint(self.data, self.pos)?;
        self.pos += consumed;
        Ok(VarInt(value))
    }

    /// Read a varint length prefix followed by that many bytes.
    ///
    /// The length is checked against the remaining input before any slice
    /// is taken, so a hostile length cannot trigger a huge allocation. On
    /// failure the reader is left at the length prefix.
    pub fn read_var_bytes(&mut self) -> Result<&'a [u8], PrimitivesError> {
        let start = self.pos;
        let len = self.read_varint()?.value();
        let len = usize::try_from(len).unwrap_or(usize::MAX);
        self.read_bytes(len).map_err(|e| {
            self.pos = start;
            e
        })
    }

    /// Current read position from the start of the buffer.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// The bytes consumed between `start` and the current position.
    ///
    /// Lets a decoder capture the exact raw encoding of a structure it
    /// just parsed (e.g. a transaction, for txid hashing).
    pub fn consumed_since(&self, start: usize) -> &'a [u8] {
        &self.data[start.min(self.pos)..self.pos]
    }

    /// Return the number of bytes remaining.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }
}

// ---------------------------------------------------------------------------
// BsvWriter
// ---------------------------------------------------------------------------

/// A buffer-based writer for Bitcoin protocol binary data.
#[derive(Debug, Default)]
pub struct BsvWriter {
    buf: Vec<u8>,
}

impl BsvWriter {
    /// Create a new empty writer.
    pub fn new() -> Self {
        BsvWriter { buf: Vec::new() }
    }

    /// Create a new writer with a pre-allocated capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        BsvWriter { buf: Vec::with_capacity(capacity) }
    }

    /// Append raw bytes.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Append a single byte.
    pub fn write_u8(&mut self, val: u8) {
        self.buf.push(val);
    }

    /// Append a little-endian u16.
    pub fn write_u16_le(&mut self, val: u16) {
        self.buf.extend_from_slice(&val.to_le_bytes());
    }

    /// Append a little-endian u32.
    pub fn write_u32_le(&mut self, val: u32) {
        self.buf.extend_from_slice(&val.to_le_bytes());
    }

    /// Append a little-endian u64.
    pub fn write_u64_le(&mut self, val: u64) {
        self.buf.extend_from_slice(&val.to_le_bytes());
    }

    /// Append a canonical VarInt.
    pub fn write_varint(&mut self, varint: VarInt) {
        let mut tmp = [0u8; 9];
        let n = varint.put_bytes(&mut tmp);
        self.buf.extend_from_slice(&tmp[..n]);
    }

    /// Append a varint length prefix followed by the bytes.
    pub fn write_var_bytes(&mut self, bytes: &[u8]) {
        self.write_varint(VarInt::from(bytes.len()));
        self.write_bytes(bytes);
    }

    /// Consume the writer and return the accumulated bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Return the current buffer contents.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// `true` if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}
