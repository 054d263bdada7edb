//! The carving pipeline
//!
//! Three buffers participate in a run: the `program` image, whose embedded
//! headers reference segments inside the `overlay`; the overlay itself; and
//! the bulk `archive`, which is what the catalog describes. Headers for
//! archive regions live in the program image and inside the decompressed
//! overlay segments, never in the archive, which is why discovery has to
//! carve instead of reading a directory.

use std::path::{Path, PathBuf};
use std::rc::Rc;

use super::fingerprint::{find, FingerprintSearcher};
use super::{Catalog, FileCache};
use crate::common::{
    CompressionParams, Result, ADGC_MARKER, DEFAULT_PROBE_PARAMS, DEFAULT_PROBE_WINDOW,
    SECTOR_SIZE,
};
use crate::decompress::Decompressor;
use crate::descriptor::FileDescriptor;
use crate::ranges::RangeSet;

/// Inputs and policy for one discovery run
#[derive(Debug)]
pub struct DiscoveryConfig {
    /// Executable image carrying headers that reference the overlay
    pub program: PathBuf,
    /// Segment archive referenced by the program image
    pub overlay: PathBuf,
    /// Bulk data archive the catalog describes
    pub archive: PathBuf,
    /// Already-confirmed stored regions; never rediscovered
    pub known_raw: Vec<FileDescriptor>,
    /// Already-confirmed compressed files; never rediscovered
    pub known_compressed: Vec<FileDescriptor>,
    /// Parameter pair assumed by the brute-force probes
    pub probe_params: CompressionParams,
    /// Decoded bytes a probe must produce to count as plausible
    pub probe_window: usize,
}

impl DiscoveryConfig {
    /// Configuration with default probe policy and no known entries
    pub fn new(
        program: impl Into<PathBuf>,
        overlay: impl Into<PathBuf>,
        archive: impl Into<PathBuf>,
    ) -> Self {
        Self {
            program: program.into(),
            overlay: overlay.into(),
            archive: archive.into(),
            known_raw: Vec::new(),
            known_compressed: Vec::new(),
            probe_params: DEFAULT_PROBE_PARAMS,
            probe_window: DEFAULT_PROBE_WINDOW,
        }
    }
}

/// Runs the carving pipeline over one set of buffers
#[derive(Debug)]
pub struct DiscoveryEngine {
    config: DiscoveryConfig,
    cache: FileCache,
}

impl DiscoveryEngine {
    /// Create an engine loading buffers from disk on demand
    pub fn new(config: DiscoveryConfig) -> Self {
        Self {
            config,
            cache: FileCache::new(),
        }
    }

    /// Create an engine over a pre-populated cache
    pub fn with_cache(config: DiscoveryConfig, cache: FileCache) -> Self {
        Self { config, cache }
    }

    /// Run the full pipeline and produce the catalog
    pub fn run(&mut self) -> Result<Catalog> {
        let overlay_name = self.config.overlay.to_string_lossy().into_owned();
        let archive_name = self.config.archive.to_string_lossy().into_owned();

        let program = self.cache.bytes(&self.config.program.clone())?;
        let overlay = self.cache.bytes(&self.config.overlay.clone())?;
        let archive = self.cache.bytes(&self.config.archive.clone())?;

        let archive_data: &[u8] = &archive;
        let probe_params = self.config.probe_params;
        let probe_window = self.config.probe_window;

        // plausible segment starts inside the overlay
        let overlay_starts = probe_offsets(&overlay, probe_params, probe_window);
        log::info!(
            "{} plausible segment starts in {}",
            overlay_starts.len(),
            overlay_name
        );

        // headers in the program image pointing into the overlay, confirmed
        // by a full trial decompression of the claimed extent
        let mut segments: Vec<FileDescriptor> = Vec::new();
        for entry in
            FingerprintSearcher::new(&program, &overlay_name).search_compressed(probe_params)
        {
            if !overlay_starts.contains(&(entry.disk_location as usize)) {
                continue;
            }
            if segments.iter().any(|seg| seg.structural_eq(&entry)) {
                continue;
            }
            if self.validate_entry(&entry)? {
                segments.push(entry);
            }
        }
        log::info!("confirmed {} overlay segments", segments.len());

        // the program image and every decompressed segment may carry
        // references into the archive
        let mut scan_buffers: Vec<Rc<Vec<u8>>> = vec![Rc::clone(&program)];
        for segment in &segments {
            scan_buffers.push(Rc::new(self.decompress_entry(segment)?));
        }
        let mut compressed_candidates = Vec::new();
        let mut raw_candidates = Vec::new();
        for buffer in &scan_buffers {
            let searcher = FingerprintSearcher::new(buffer, &archive_name);
            compressed_candidates.extend(searcher.search_compressed(probe_params));
            raw_candidates.extend(searcher.search_raw());
        }
        log::info!(
            "{} compressed and {} raw candidates across {} buffers",
            compressed_candidates.len(),
            raw_candidates.len(),
            scan_buffers.len()
        );

        // a region found through two buffers is one region
        dedup_structural(&mut compressed_candidates);
        compressed_candidates.retain(|cand| !segments.iter().any(|seg| seg.structural_eq(cand)));
        compressed_candidates.sort_by_key(|cand| cand.disk_location);
        dedup_structural(&mut raw_candidates);
        raw_candidates.sort_by_key(|cand| cand.disk_location);

        // seeds claim their archive ranges before anything can rediscover them
        let mut claimed = RangeSet::new();
        for known in self
            .config
            .known_raw
            .iter()
            .chain(&self.config.known_compressed)
        {
            if known.source_file == archive_name {
                claimed.insert(known.byte_range());
            }
        }

        let mut referenced_compressed = self.config.known_compressed.clone();
        for segment in &segments {
            if referenced_compressed
                .iter()
                .any(|known| known.structural_eq(segment))
            {
                continue;
            }
            let mut entry = segment.clone();
            entry.output_name = format!("{:x}.rel", entry.disk_location);
            referenced_compressed.push(entry);
        }

        for candidate in compressed_candidates {
            if referenced_compressed
                .iter()
                .any(|known| known.structural_eq(&candidate))
            {
                continue;
            }
            if !self.validate_entry(&candidate)? {
                log::debug!(
                    "candidate at {:#x} failed trial decompression",
                    candidate.disk_location
                );
                continue;
            }
            let mut entry = candidate;
            entry.output_name = format!("cmp {}", entry.output_name);
            claimed.insert(entry.byte_range());
            referenced_compressed.push(entry);
        }

        // blind probe of every unclaimed sector; extents stay unresolved
        let mut unreferenced_compressed = Vec::new();
        for offset in (0..archive_data.len()).step_by(SECTOR_SIZE) {
            if claimed.contains(offset as u64) {
                continue;
            }
            let slice = &archive_data[offset..archive_data.len().min(offset + 2 * probe_window)];
            if !Decompressor::with_exact_size(slice, probe_params, probe_window).validate() {
                continue;
            }
            let mut entry = FileDescriptor {
                source_file: archive_name.clone(),
                lookback_bits: probe_params.lookback_bits,
                repetition_bits: probe_params.repetition_bits,
                original_size: 0,
                compression_flag: 0,
                disk_location: offset as u32,
                compressed_size: 0,
                output_name: String::new(),
            };
            entry.output_name = format!("cmp unverified {offset:x}.dat");
            claimed.insert(offset as u64..(offset + probe_window) as u64);
            unreferenced_compressed.push(entry);
        }
        log::info!(
            "{} unreferenced sectors validate under ({}, {})",
            unreferenced_compressed.len(),
            probe_params.lookback_bits,
            probe_params.repetition_bits
        );

        let adgc_forms = scan_forms(archive_data, &archive_name);
        log::info!("{} form records", adgc_forms.len());

        let mut referenced_raw = self.config.known_raw.clone();
        for candidate in raw_candidates {
            if claimed.overlaps(&candidate.byte_range()) {
                continue;
            }
            let mut entry = candidate;
            entry.output_name = format!("raw {}", entry.output_name);
            claimed.insert(entry.byte_range());
            referenced_raw.push(entry);
        }

        let mut catalog = Catalog {
            referenced_compressed,
            referenced_raw,
            unreferenced_compressed,
            adgc_forms,
        };
        catalog.sort();
        Ok(catalog)
    }

    /// Trial-decompress a descriptor's extent without materializing output
    fn validate_entry(&mut self, entry: &FileDescriptor) -> Result<bool> {
        let params = match entry.params() {
            Ok(params) => params,
            Err(_) => return Ok(false),
        };
        let bytes = self.cache.bytes(Path::new(&entry.source_file))?;
        let start = entry.disk_location as usize;
        let end = start.saturating_add(entry.compressed_size as usize);
        if end > bytes.len() {
            return Ok(false);
        }
        Ok(Decompressor::new(&bytes[start..end], params).validate())
    }

    /// Decompress a confirmed descriptor's extent
    fn decompress_entry(&mut self, entry: &FileDescriptor) -> Result<Vec<u8>> {
        let params = entry.params()?;
        let bytes = self.cache.bytes(Path::new(&entry.source_file))?;
        let end = (entry.disk_location as usize)
            .saturating_add(entry.compressed_size as usize)
            .min(bytes.len());
        let start = (entry.disk_location as usize).min(end);
        Decompressor::new(&bytes[start..end], params).decompress()
    }
}

/// Sector offsets whose contents validate under the probe parameters
fn probe_offsets(data: &[u8], params: CompressionParams, window: usize) -> Vec<usize> {
    let mut offsets = Vec::new();
    for offset in (0..data.len()).step_by(SECTOR_SIZE) {
        let slice = &data[offset..data.len().min(offset + 2 * window)];
        if Decompressor::with_exact_size(slice, params, window).validate() {
            offsets.push(offset);
        }
    }
    offsets
}

/// Form records addressed by the embedded marker
///
/// The 8-byte mini-header before each marker is little-endian, unlike the
/// descriptor headers: a packed flag/size word, then the parameter word.
/// Records without a stored compressed size learn it by decompressing to the
/// recorded original size and counting consumed words.
fn scan_forms(archive: &[u8], archive_name: &str) -> Vec<FileDescriptor> {
    let mut forms = Vec::new();
    let mut start = 0;

    while let Some(relative) = find(&archive[start..], ADGC_MARKER) {
        let marker = start + relative;
        start = marker + ADGC_MARKER.len();
        if marker < 8 {
            continue;
        }
        let le_word = |at: usize| {
            u32::from_le_bytes([
                archive[at],
                archive[at + 1],
                archive[at + 2],
                archive[at + 3],
            ])
        };
        let packed = le_word(marker - 8);
        let info = le_word(marker - 4);
        let compression_flag = (packed >> 28) as u8;
        let original_size = packed & 0x0FFF_FFFF;
        let data_begin = marker + ADGC_MARKER.len();

        let (lookback_bits, repetition_bits, compressed_size) = if compression_flag == 0 {
            (0u8, 0u8, original_size)
        } else {
            let lookback_bits = (info & 0xFF) as u8;
            let repetition_bits = ((info >> 8) & 0xFF) as u8;
            let params = match CompressionParams::new(lookback_bits, repetition_bits) {
                Ok(params) => params,
                Err(err) => {
                    log::warn!("form record at {marker:#x} has unusable parameters: {err}");
                    continue;
                }
            };
            let mut decoder = Decompressor::with_exact_size(
                &archive[data_begin..],
                params,
                original_size as usize,
            );
            match decoder.decompress() {
                Ok(_) => (lookback_bits, repetition_bits, decoder.compressed_size() as u32),
                Err(err) => {
                    log::warn!("form record at {marker:#x} failed decompression: {err}");
                    continue;
                }
            }
        };

        let mut entry = FileDescriptor {
            source_file: archive_name.to_string(),
            lookback_bits,
            repetition_bits,
            original_size,
            compression_flag,
            disk_location: data_begin as u32,
            compressed_size,
            output_name: String::new(),
        };
        entry.output_name = format!("AdGCForm {data_begin:08x}.dat");
        forms.push(entry);
    }
    forms
}

/// Keep the first of every structurally equal group, preserving order
fn dedup_structural(entries: &mut Vec<FileDescriptor>) {
    let mut kept: Vec<FileDescriptor> = Vec::with_capacity(entries.len());
    entries.retain(|entry| {
        if kept.iter().any(|seen| seen.structural_eq(entry)) {
            false
        } else {
            kept.push(entry.clone());
            true
        }
    });
}
