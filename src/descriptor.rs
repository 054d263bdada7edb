//! Fixed-layout file descriptor headers
//!
//! A descriptor is the 16-byte big-endian record that announces an embedded
//! file: two pad bytes, the repetition and lookback field widths, a packed
//! word carrying the 4-bit compression flag above the 28-bit original size,
//! then the disk location and compressed size. The footer pad to the next
//! sector boundary and the claimed byte range are derived, never stored.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::common::{CarveError, CompressionParams, Result, SECTOR_SIZE};

/// Encoded size of a descriptor header in bytes
pub const HEADER_LEN: usize = 16;

/// One embedded file: where it lives, how it is packed, what to call it
///
/// `output_name` is the only mutable field and participates in neither
/// equality notion. Full equality includes `source_file`; structural equality
/// ([`FileDescriptor::structural_eq`]) ignores it, which is what lets the
/// same region found through two companion buffers collapse to one entry.
#[derive(Debug, Clone)]
pub struct FileDescriptor {
    /// Path of the file this descriptor points into
    pub source_file: String,
    /// Width in bits of the back-reference distance field
    pub lookback_bits: u8,
    /// Width in bits of the back-reference length field
    pub repetition_bits: u8,
    /// Decompressed size, 28 bits
    pub original_size: u32,
    /// Format flag, 4 bits; zero marks a stored (uncompressed) region
    pub compression_flag: u8,
    /// Byte offset of the data inside the source file
    pub disk_location: u32,
    /// Stored size of the data in bytes
    pub compressed_size: u32,
    /// Suggested name for the extracted file
    pub output_name: String,
}

impl FileDescriptor {
    /// Decode the header at `offset` into a descriptor referencing `source_file`
    pub fn decode(buffer: &[u8], offset: usize, source_file: &str) -> Result<Self> {
        if buffer.len() < offset + HEADER_LEN {
            return Err(CarveError::TruncatedHeader { offset });
        }
        let word = |at: usize| {
            u32::from_be_bytes([
                buffer[offset + at],
                buffer[offset + at + 1],
                buffer[offset + at + 2],
                buffer[offset + at + 3],
            ])
        };
        let repetition_bits = buffer[offset + 2];
        let lookback_bits = buffer[offset + 3];
        let packed = word(4);
        let disk_location = word(8);
        let compressed_size = word(12);

        let mut descriptor = Self {
            source_file: source_file.to_string(),
            lookback_bits,
            repetition_bits,
            original_size: packed & 0x0FFF_FFFF,
            compression_flag: (packed >> 28) as u8,
            disk_location,
            compressed_size,
            output_name: String::new(),
        };
        descriptor.reset_output_name();
        Ok(descriptor)
    }

    /// Encode this descriptor back into its 16-byte header
    ///
    /// Exact inverse of [`FileDescriptor::decode`] for all valid field
    /// combinations (flag in 4 bits, original size in 28).
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        debug_assert!(self.compression_flag <= 0xF);
        debug_assert!(self.original_size <= 0x0FFF_FFFF);

        let mut header = [0u8; HEADER_LEN];
        header[2] = self.repetition_bits;
        header[3] = self.lookback_bits;
        let packed = ((self.compression_flag as u32) << 28) | (self.original_size & 0x0FFF_FFFF);
        header[4..8].copy_from_slice(&packed.to_be_bytes());
        header[8..12].copy_from_slice(&self.disk_location.to_be_bytes());
        header[12..16].copy_from_slice(&self.compressed_size.to_be_bytes());
        header
    }

    /// Stream parameters for this descriptor's data
    pub fn params(&self) -> Result<CompressionParams> {
        CompressionParams::new(self.lookback_bits, self.repetition_bits)
    }

    /// Pad bytes between the end of the data and the next sector boundary
    pub fn footer_size(&self) -> u32 {
        let end = (self.disk_location as u64 + self.compressed_size as u64) % SECTOR_SIZE as u64;
        if end == 0 {
            0
        } else {
            SECTOR_SIZE as u32 - end as u32
        }
    }

    /// The half-open byte range this descriptor claims, footer included
    pub fn byte_range(&self) -> Range<u64> {
        let start = self.disk_location as u64;
        start..start + self.compressed_size as u64 + self.footer_size() as u64
    }

    /// Restore the default output name derived from the stored fields
    pub fn reset_output_name(&mut self) {
        self.output_name = format!(
            "{} {:02x}{:02x} {:08x}.dat",
            self.source_file, self.lookback_bits, self.repetition_bits, self.disk_location
        );
    }

    /// Equality over every stored field except `source_file` and `output_name`
    ///
    /// This is the cross-buffer dedup notion: two discoveries of the same
    /// region through different files compare equal.
    pub fn structural_eq(&self, other: &Self) -> bool {
        self.lookback_bits == other.lookback_bits
            && self.repetition_bits == other.repetition_bits
            && self.original_size == other.original_size
            && self.compression_flag == other.compression_flag
            && self.disk_location == other.disk_location
            && self.compressed_size == other.compressed_size
    }
}

impl PartialEq for FileDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.structural_eq(other) && self.source_file == other.source_file
    }
}

impl Eq for FileDescriptor {}

/// JSON mirror of a descriptor, using the catalog document field names
///
/// `footerSize` is emitted for consumers but ignored on input; it is derived
/// from the stored fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescriptorRecord {
    /// Source file path
    #[serde(rename = "Input")]
    pub input: String,
    /// Suggested output path, defaulted from the stored fields when absent
    #[serde(rename = "Output", default)]
    pub output: Option<String>,
    /// Lookback field width in bits
    #[serde(rename = "lookbackBitSize")]
    pub lookback_bit_size: u8,
    /// Repetition field width in bits
    #[serde(rename = "repetitionBitSize")]
    pub repetition_bit_size: u8,
    /// Decompressed size
    #[serde(rename = "size")]
    pub size: u32,
    /// Byte offset inside the source file
    #[serde(rename = "offset")]
    pub offset: u32,
    /// Stored size
    #[serde(rename = "compressedSize")]
    pub compressed_size: u32,
    /// 4-bit format flag
    #[serde(rename = "compressionFlag")]
    pub compression_flag: u8,
    /// Derived footer pad; recomputed on input
    #[serde(rename = "footerSize", default)]
    pub footer_size: u32,
}

impl From<&FileDescriptor> for DescriptorRecord {
    fn from(descriptor: &FileDescriptor) -> Self {
        Self {
            input: descriptor.source_file.clone(),
            output: Some(descriptor.output_name.clone()),
            lookback_bit_size: descriptor.lookback_bits,
            repetition_bit_size: descriptor.repetition_bits,
            size: descriptor.original_size,
            offset: descriptor.disk_location,
            compressed_size: descriptor.compressed_size,
            compression_flag: descriptor.compression_flag,
            footer_size: descriptor.footer_size(),
        }
    }
}

impl From<DescriptorRecord> for FileDescriptor {
    fn from(record: DescriptorRecord) -> Self {
        let mut descriptor = FileDescriptor {
            source_file: record.input,
            lookback_bits: record.lookback_bit_size,
            repetition_bits: record.repetition_bit_size,
            original_size: record.size,
            compression_flag: record.compression_flag,
            disk_location: record.offset,
            compressed_size: record.compressed_size,
            output_name: String::new(),
        };
        match record.output {
            Some(output) => descriptor.output_name = output,
            None => descriptor.reset_output_name(),
        }
        descriptor
    }
}
