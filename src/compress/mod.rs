//! Compression into the bit-packed token stream
//!
//! The encoder is a greedy forward scan: at every position it looks for the
//! longest prior occurrence of the upcoming bytes inside the sliding window
//! and emits either a back-reference or a literal. The window shortlist lives
//! in [`window::WindowIndex`]; it is a performance structure only and never
//! influences the encoded bytes.

mod encoder;
mod window;

pub use encoder::Compressor;

use crate::common::{CompressionParams, Result};

/// Minimum match length worth a back-reference
pub const MIN_MATCH_LENGTH: usize = 2;

/// Convenience function to compress data in memory
pub fn compress_bytes(data: &[u8], params: CompressionParams) -> Result<Vec<u8>> {
    Compressor::new(data, params).compress()
}
