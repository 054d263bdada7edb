//! carvelib - file carving for table-less game archives
//!
//! This crate recovers individual files embedded inside a single
//! undifferentiated archive blob that carries no file table. It pairs a
//! bit-packed LZ77-style codec (variable-width distance and run-length
//! fields, packed low-bit-first into 32-bit big-endian words) with a
//! verification-driven discovery engine: candidate headers are found by
//! byte-pattern search, confirmed by trial decompression, and recorded into
//! a categorized catalog, with an interval set preventing any region from
//! being claimed twice.
//!
//! # Example - Codec round trip
//!
//! ```
//! use carvelib::{compress_bytes, decompress_bytes, CompressionParams};
//!
//! let params = CompressionParams::new(11, 4)?;
//! let data = b"the rain in spain falls mainly on the plain";
//! let packed = compress_bytes(data, params)?;
//! let unpacked = decompress_bytes(&packed, params, Some(data.len()))?;
//! assert_eq!(&unpacked, data);
//! # Ok::<(), carvelib::CarveError>(())
//! ```
//!
//! # Example - Discovery
//!
//! ```no_run
//! use carvelib::discovery::{DiscoveryConfig, DiscoveryEngine};
//!
//! let config = DiscoveryConfig::new("main.dol", "aaaa.dat", "zzzz.dat");
//! let catalog = DiscoveryEngine::new(config).run()?;
//! println!("{}", serde_json::to_string_pretty(&catalog.to_document())?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

// Public modules
pub mod bitstream;
pub mod common;
pub mod compress;
pub mod decompress;
pub mod descriptor;
pub mod discovery;
pub mod error;
pub mod ranges;

// Re-export commonly used types
pub use common::{
    CarveError, CompressionParams, Result, Token, ROLLING_OUTPUT_CAP, SECTOR_SIZE,
};
pub use compress::Compressor;
pub use decompress::{Decompressor, RollingDecompressor, RollingView};
pub use descriptor::{DescriptorRecord, FileDescriptor};
pub use discovery::{Catalog, CatalogDocument, DiscoveryConfig, DiscoveryEngine};
pub use ranges::RangeSet;

// Convenience functions

/// Compress data with the given stream parameters
///
/// # Arguments
/// * `data` - The data to compress
/// * `params` - Distance and run-length field widths
///
/// # Returns
/// The packed words as bytes, final word zero-padded
pub fn compress_bytes(data: &[u8], params: CompressionParams) -> Result<Vec<u8>> {
    compress::compress_bytes(data, params)
}

/// Decompress a complete stream
///
/// # Arguments
/// * `data` - The compressed words
/// * `params` - Distance and run-length field widths
/// * `original_size` - Exact decoded size when known; `None` decodes until
///   the bit source is exhausted
///
/// # Returns
/// A vector containing the decompressed data
pub fn decompress_bytes(
    data: &[u8],
    params: CompressionParams,
    original_size: Option<usize>,
) -> Result<Vec<u8>> {
    decompress::decompress_bytes(data, params, original_size)
}

/// Check a stream without materializing its output
pub fn validate_bytes(data: &[u8], params: CompressionParams, original_size: Option<usize>) -> bool {
    decompress::validate_bytes(data, params, original_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reexports() {
        let params = CompressionParams::new(11, 4).unwrap();
        let packed = compress_bytes(b"test", params).unwrap();
        assert!(validate_bytes(&packed, params, Some(4)));
    }
}
