//! Decompression of the bit-packed token stream
//!
//! This module provides the decoding half of the codec: direct and
//! validation-mode decoding over a complete compressed slice, and a lazy
//! rolling decompressor for streams whose total extent is not known upfront.

mod decoder;
mod rolling;

pub use decoder::Decompressor;
pub use rolling::{RollingDecompressor, RollingView};

use crate::common::{CompressionParams, Result};

/// Convenience function to decompress a complete stream in memory
///
/// With `original_size` the decode stops exactly at the target length;
/// without it the decode runs speculatively until the bit source is
/// exhausted.
pub fn decompress_bytes(
    data: &[u8],
    params: CompressionParams,
    original_size: Option<usize>,
) -> Result<Vec<u8>> {
    let mut decompressor = match original_size {
        Some(size) => Decompressor::with_exact_size(data, params, size),
        None => Decompressor::new(data, params),
    };
    decompressor.decompress()
}

/// Convenience function to check a stream without materializing output
pub fn validate_bytes(
    data: &[u8],
    params: CompressionParams,
    original_size: Option<usize>,
) -> bool {
    let mut decompressor = match original_size {
        Some(size) => Decompressor::with_exact_size(data, params, size),
        None => Decompressor::new(data, params),
    };
    decompressor.validate()
}
