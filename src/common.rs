//! Common types and constants for the archive carving toolkit
//!
//! This module defines the core types shared by the codec, the rolling
//! decompressor and the discovery engine: stream parameters, decoded tokens,
//! the error enum and the handful of format-wide constants.

use thiserror::Error;

/// Per-stream bit widths of the back-reference fields
///
/// The window covers the last `2^lookback_bits` bytes of output and a single
/// back-reference copies at most `2^repetition_bits + 1` bytes. The special
/// pair `(0, 0)` marks a stored (uncompressed) region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionParams {
    /// Width in bits of the back-reference distance field
    pub lookback_bits: u8,
    /// Width in bits of the back-reference length field
    pub repetition_bits: u8,
}

impl CompressionParams {
    /// Create validated parameters
    ///
    /// Accepts `(0, 0)` (stored mode) or both widths in `1..=24`.
    pub fn new(lookback_bits: u8, repetition_bits: u8) -> Result<Self> {
        if lookback_bits == 0 && repetition_bits == 0 {
            return Ok(Self {
                lookback_bits,
                repetition_bits,
            });
        }
        if !(1..=MAX_FIELD_BITS).contains(&lookback_bits)
            || !(1..=MAX_FIELD_BITS).contains(&repetition_bits)
        {
            return Err(CarveError::InvalidParams {
                lookback_bits,
                repetition_bits,
            });
        }
        Ok(Self {
            lookback_bits,
            repetition_bits,
        })
    }

    /// True for the stored (uncompressed) parameter pair `(0, 0)`
    pub fn is_stored(&self) -> bool {
        self.lookback_bits == 0 && self.repetition_bits == 0
    }

    /// Size of the sliding window in bytes
    pub fn window_size(&self) -> u32 {
        1 << self.lookback_bits
    }

    /// Longest run a single back-reference may copy
    pub fn max_run_length(&self) -> u32 {
        (1 << self.repetition_bits) + 1
    }

    /// The 4-byte big-endian pattern that opens a descriptor header carrying
    /// these parameters
    pub fn fingerprint(&self) -> [u8; 4] {
        (((self.repetition_bits as u32) << 8) | self.lookback_bits as u32).to_be_bytes()
    }
}

/// One decoded element of the token stream
///
/// Tokens only exist within a single encode or decode call; the wire format
/// is the packed bit stream, never a token list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    /// A verbatim byte
    Literal(u8),
    /// A self-overlap-capable copy out of the sliding window
    BackReference {
        /// Distance back from the last written byte, zero-based
        distance: u32,
        /// Decoded copy length, always at least 2
        length: u32,
    },
}

/// Error type for codec and discovery operations
#[derive(Debug, Error)]
pub enum CarveError {
    /// A back-reference pointed at data the stream has not produced yet
    #[error(
        "corrupt stream: back-reference distance {distance} with only {produced} bytes produced"
    )]
    CorruptStream {
        /// Offending distance field
        distance: u32,
        /// Output bytes produced when the reference was read
        produced: usize,
    },

    /// An encode-side value does not fit its configured field width
    #[error("value {value:#x} does not fit in {bits} bits")]
    InvalidBitWidth {
        /// The value that was to be written
        value: u32,
        /// The configured field width
        bits: u8,
    },

    /// The input ended while refilling the bit buffer
    #[error("unexpected end of input")]
    UnexpectedEof,

    /// Rejected parameter pair at construction
    #[error(
        "invalid stream parameters: lookback {lookback_bits} bits, repetition {repetition_bits} bits"
    )]
    InvalidParams {
        /// Rejected lookback width
        lookback_bits: u8,
        /// Rejected repetition width
        repetition_bits: u8,
    },

    /// A descriptor header would extend past the end of its buffer
    #[error("truncated descriptor header at offset {offset:#x}")]
    TruncatedHeader {
        /// Offset the decode started at
        offset: usize,
    },

    /// Rolling access past the defensive output cap
    #[error("rolling output index {index} exceeds the hard output cap")]
    OutputLimitExceeded {
        /// The index that was requested
        index: usize,
    },

    /// Invalid data format or corruption
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for carving operations
pub type Result<T> = std::result::Result<T, CarveError>;

// Format-wide constants

/// Meaningful file starts fall on this boundary inside an archive
pub const SECTOR_SIZE: usize = 0x800;

/// Hard cap on rolling decompressor output (4 MB)
pub const ROLLING_OUTPUT_CAP: usize = 4_000_000;

/// Maximum width of either back-reference field
pub const MAX_FIELD_BITS: u8 = 24;

/// Allowed |compressedSize - originalSize| for a raw region candidate
pub const RAW_SIZE_EPSILON: u32 = 3;

/// Marker preceding form records embedded in the bulk archive
pub const ADGC_MARKER: &[u8; 8] = b"AdGCForm";

/// Default parameters used by the unreferenced brute-force probe
pub const DEFAULT_PROBE_PARAMS: CompressionParams = CompressionParams {
    lookback_bits: 11,
    repetition_bits: 4,
};

/// Default probe validation window in decoded bytes
pub const DEFAULT_PROBE_WINDOW: usize = 200;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_validation() {
        assert!(CompressionParams::new(11, 4).is_ok());
        assert!(CompressionParams::new(1, 1).is_ok());
        assert!(CompressionParams::new(24, 24).is_ok());
        assert!(CompressionParams::new(0, 0).is_ok());
        assert!(CompressionParams::new(0, 4).is_err());
        assert!(CompressionParams::new(11, 0).is_err());
        assert!(CompressionParams::new(25, 4).is_err());
    }

    #[test]
    fn test_derived_sizes() {
        let params = CompressionParams::new(11, 4).unwrap();
        assert_eq!(params.window_size(), 2048);
        assert_eq!(params.max_run_length(), 17);
        assert!(!params.is_stored());
        assert!(CompressionParams::new(0, 0).unwrap().is_stored());
    }

    #[test]
    fn test_fingerprint_bytes() {
        let params = CompressionParams::new(11, 4).unwrap();
        assert_eq!(params.fingerprint(), [0x00, 0x00, 0x04, 0x0b]);
    }

    #[test]
    fn test_constants() {
        assert_eq!(SECTOR_SIZE, 2048);
        assert_eq!(ROLLING_OUTPUT_CAP, 4_000_000);
        assert_eq!(ADGC_MARKER.len(), 8);
    }
}
