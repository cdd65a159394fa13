//! BSV analysis primitives.
//!
//! The leaf layer every other crate in the workspace builds on:
//! - Hash functions (SHA-256, double SHA-256)
//! - `Hash`, the 32-byte chain hash with internal/display byte order
//! - Byte-order reversal helpers
//! - Bitcoin variable-length integers and a cursor reader / buffer writer

pub mod hash;
pub mod chainhash;
pub mod util;

mod error;
pub use error::PrimitivesError;
