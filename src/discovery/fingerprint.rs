//! Byte-pattern scans for descriptor headers
//!
//! A descriptor header opens with two zero pad bytes followed by the
//! repetition and lookback widths, so the 4-byte parameter fingerprint *is*
//! the start of the header. Hits only survive if the decoded header passes
//! the sector-alignment invariant; trial decompression happens later, in the
//! engine.

use crate::common::{CompressionParams, RAW_SIZE_EPSILON, SECTOR_SIZE};
use crate::descriptor::{FileDescriptor, HEADER_LEN};

/// Find the first occurrence of `needle` in `haystack`
pub(crate) fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Scans one buffer for descriptor headers referencing `source_file`
#[derive(Debug)]
pub struct FingerprintSearcher<'a> {
    data: &'a [u8],
    source_file: &'a str,
}

impl<'a> FingerprintSearcher<'a> {
    /// Create a searcher over `data`
    ///
    /// `source_file` is the file the discovered descriptors point into,
    /// which need not be the buffer being scanned: headers for one archive
    /// routinely live inside another.
    pub fn new(data: &'a [u8], source_file: &'a str) -> Self {
        Self { data, source_file }
    }

    /// Headers announcing a compressed stream with the given parameters
    ///
    /// Keeps every hit whose decoded `disk_location` is a nonzero multiple
    /// of the sector size. Hits at offset zero are skipped; a real header
    /// never starts a buffer.
    pub fn search_compressed(&self, params: CompressionParams) -> Vec<FileDescriptor> {
        let pattern = params.fingerprint();
        let mut found = Vec::new();
        let mut start = 0;

        while let Some(relative) = find(&self.data[start..], &pattern) {
            let offset = start + relative;
            start = offset + pattern.len();
            if offset == 0 || self.data.len() < offset + HEADER_LEN {
                continue;
            }
            // the fingerprint is the header's first four bytes
            let entry = match FileDescriptor::decode(self.data, offset, self.source_file) {
                Ok(entry) => entry,
                Err(_) => continue,
            };
            if entry.disk_location != 0 && entry.disk_location as usize % SECTOR_SIZE == 0 {
                found.push(entry);
            }
        }
        found
    }

    /// Headers announcing a stored (uncompressed) region
    ///
    /// Flag and both widths are zero, so the scan pattern is four zero
    /// bytes; plausibility additionally requires positive sizes that agree
    /// within [`RAW_SIZE_EPSILON`], plus the sector-alignment invariant.
    pub fn search_raw(&self) -> Vec<FileDescriptor> {
        let pattern = [0u8; 4];
        let mut found = Vec::new();
        let mut start = 0;

        while let Some(relative) = find(&self.data[start..], &pattern) {
            let offset = start + relative;
            start = offset + 1;
            if self.data.len() < offset + HEADER_LEN {
                break;
            }
            let entry = match FileDescriptor::decode(self.data, offset, self.source_file) {
                Ok(entry) => entry,
                Err(_) => continue,
            };
            if entry.disk_location == 0 || entry.disk_location as usize % SECTOR_SIZE != 0 {
                continue;
            }
            if entry.compressed_size == 0 || entry.original_size == 0 {
                continue;
            }
            if entry.compressed_size.abs_diff(entry.original_size) <= RAW_SIZE_EPSILON {
                found.push(entry);
            }
        }
        found
    }
}
