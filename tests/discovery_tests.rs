//! Discovery engine scenarios over synthetic archive sets
//!
//! Each test builds the three buffers a run consumes - program image,
//! overlay, bulk archive - in memory and drives the engine through a
//! preloaded cache, so no fixtures live on disk.

use carvelib::discovery::{DiscoveryConfig, DiscoveryEngine, FileCache};
use carvelib::{compress_bytes, CatalogDocument, CompressionParams, FileDescriptor};

const PROGRAM: &str = "main.dol";
const OVERLAY: &str = "aaaa.dat";
const ARCHIVE: &str = "zzzz.dat";

fn params() -> CompressionParams {
    CompressionParams::new(11, 4).unwrap()
}

fn descriptor(
    disk_location: u32,
    compressed_size: u32,
    original_size: u32,
    compression_flag: u8,
) -> FileDescriptor {
    let mut entry = FileDescriptor {
        source_file: ARCHIVE.to_string(),
        lookback_bits: 11,
        repetition_bits: 4,
        original_size,
        compression_flag,
        disk_location,
        compressed_size,
        output_name: String::new(),
    };
    entry.reset_output_name();
    entry
}

fn raw_descriptor(disk_location: u32, size: u32) -> FileDescriptor {
    let mut entry = descriptor(disk_location, size, size, 0);
    entry.lookback_bits = 0;
    entry.repetition_bits = 0;
    entry.reset_output_name();
    entry
}

fn engine_for(program: Vec<u8>, overlay: Vec<u8>, archive: Vec<u8>) -> DiscoveryEngine {
    engine_with_config(
        DiscoveryConfig::new(PROGRAM, OVERLAY, ARCHIVE),
        program,
        overlay,
        archive,
    )
}

fn engine_with_config(
    config: DiscoveryConfig,
    program: Vec<u8>,
    overlay: Vec<u8>,
    archive: Vec<u8>,
) -> DiscoveryEngine {
    let mut cache = FileCache::new();
    cache.preload(PROGRAM, program);
    cache.preload(OVERLAY, overlay);
    cache.preload(ARCHIVE, archive);
    DiscoveryEngine::with_cache(config, cache)
}

/// One referenced header, one legal stream, exactly one catalog entry
#[test]
fn test_single_referenced_compressed_file() -> Result<(), Box<dyn std::error::Error>> {
    // 10 distinct bytes encode as 12 bytes of literals; the header claims 16,
    // and the zero padding decodes as harmless copies before the stream ends
    let stream = compress_bytes(b"0123456789", params())?;
    assert_eq!(stream.len(), 12);
    let mut archive = vec![0u8; 0x1000];
    archive[0x800..0x800 + stream.len()].copy_from_slice(&stream);

    let mut program = vec![0xEEu8; 0x100];
    program[0x20..0x30].copy_from_slice(&descriptor(0x800, 16, 10, 4).encode());

    let overlay = vec![0xEEu8; 0x800];

    let catalog = engine_for(program, overlay, archive).run()?;

    assert_eq!(catalog.referenced_compressed.len(), 1);
    let entry = &catalog.referenced_compressed[0];
    assert_eq!(entry.disk_location, 0x800);
    assert_eq!(entry.original_size, 10);
    assert_eq!(entry.compressed_size, 16);
    assert!(entry.output_name.starts_with("cmp "));

    assert!(catalog.referenced_raw.is_empty());
    assert!(catalog.unreferenced_compressed.is_empty());
    assert!(catalog.adgc_forms.is_empty());
    Ok(())
}

/// A header whose stream does not validate never reaches the catalog
#[test]
fn test_invalid_stream_rejected() -> Result<(), Box<dyn std::error::Error>> {
    // an immediate back-reference with nothing produced: always corrupt
    let archive = vec![0u8; 0x1000];

    let mut program = vec![0xEEu8; 0x100];
    program[0x20..0x30].copy_from_slice(&descriptor(0x800, 16, 10, 4).encode());

    let catalog = engine_for(program, vec![0xEEu8; 0x800], archive).run()?;
    assert!(catalog.is_empty());
    Ok(())
}

/// An unaligned stored region is rejected from every category
#[test]
fn test_unaligned_raw_rejected_everywhere() -> Result<(), Box<dyn std::error::Error>> {
    let mut program = vec![0xEEu8; 0x100];
    program[0x10..0x20].copy_from_slice(&raw_descriptor(0x801, 50).encode());

    let catalog = engine_for(program, vec![0xEEu8; 0x800], vec![0u8; 0x1000]).run()?;
    assert!(catalog.is_empty());
    Ok(())
}

/// Aligned stored regions survive; overlapping ones are dropped
#[test]
fn test_raw_regions_and_overlap() -> Result<(), Box<dyn std::error::Error>> {
    let mut program = vec![0xEEu8; 0x100];
    program[0x10..0x20].copy_from_slice(&raw_descriptor(0x800, 50).encode());
    // structurally distinct but claiming the same sector
    let mut rival = raw_descriptor(0x800, 50);
    rival.original_size = 51;
    program[0x40..0x50].copy_from_slice(&rival.encode());

    let catalog = engine_for(program, vec![0xEEu8; 0x800], vec![0u8; 0x1000]).run()?;

    assert_eq!(catalog.referenced_raw.len(), 1);
    let entry = &catalog.referenced_raw[0];
    assert_eq!(entry.disk_location, 0x800);
    assert_eq!(entry.original_size, 50);
    assert!(entry.output_name.starts_with("raw "));
    assert!(catalog.referenced_compressed.is_empty());
    Ok(())
}

/// A structural match between a discovery and a pre-seeded entry collapses
/// to the known entry
#[test]
fn test_known_entry_wins_dedup() -> Result<(), Box<dyn std::error::Error>> {
    let stream = compress_bytes(b"0123456789", params())?;
    let mut archive = vec![0u8; 0x1000];
    archive[0x800..0x800 + stream.len()].copy_from_slice(&stream);

    let mut program = vec![0xEEu8; 0x100];
    program[0x20..0x30].copy_from_slice(&descriptor(0x800, 16, 10, 4).encode());

    let mut known = descriptor(0x800, 16, 10, 4);
    known.source_file = "confirmed-elsewhere.dat".to_string();
    known.output_name = "800.rel".to_string();

    let mut config = DiscoveryConfig::new(PROGRAM, OVERLAY, ARCHIVE);
    config.known_compressed = vec![known.clone()];

    let catalog =
        engine_with_config(config, program, vec![0xEEu8; 0x800], archive).run()?;

    assert_eq!(catalog.referenced_compressed.len(), 1);
    let entry = &catalog.referenced_compressed[0];
    assert_eq!(entry, &known);
    assert_eq!(entry.output_name, "800.rel");

    // a seed pointing into a different file cannot claim archive ranges, so
    // the blind probe still flags the sector as an unresolved region
    assert_eq!(catalog.unreferenced_compressed.len(), 1);
    assert_eq!(catalog.unreferenced_compressed[0].disk_location, 0x800);
    Ok(())
}

/// Seeded known entries claim their ranges and are never rediscovered
#[test]
fn test_seeded_range_suppresses_probe() -> Result<(), Box<dyn std::error::Error>> {
    // a stream at 0x800 that the blind probe would otherwise flag
    let stream = compress_bytes(&b"abcdefgh".repeat(64), params())?;
    let mut archive = vec![0u8; 0x1000];
    archive[0x800..0x800 + stream.len()].copy_from_slice(&stream);

    let mut config = DiscoveryConfig::new(PROGRAM, OVERLAY, ARCHIVE);
    config.known_raw = vec![raw_descriptor(0x800, 0x400)];

    let catalog = engine_with_config(
        config,
        vec![0xEEu8; 0x100],
        vec![0xEEu8; 0x800],
        archive,
    )
    .run()?;

    assert!(catalog.unreferenced_compressed.is_empty());
    assert_eq!(catalog.referenced_raw.len(), 1);
    Ok(())
}

/// An orphan stream with no header lands in the unreferenced list with its
/// extent unresolved
#[test]
fn test_unreferenced_probe() -> Result<(), Box<dyn std::error::Error>> {
    let stream = compress_bytes(&b"abcdefgh".repeat(64), params())?;
    let mut archive = vec![0u8; 0x1000];
    archive[0x800..0x800 + stream.len()].copy_from_slice(&stream);

    let catalog =
        engine_for(vec![0xEEu8; 0x100], vec![0xEEu8; 0x800], archive).run()?;

    assert_eq!(catalog.unreferenced_compressed.len(), 1);
    let entry = &catalog.unreferenced_compressed[0];
    assert_eq!(entry.disk_location, 0x800);
    assert_eq!(entry.original_size, 0);
    assert_eq!(entry.compressed_size, 0);
    assert_eq!(entry.output_name, "cmp unverified 800.dat");
    Ok(())
}

/// Overlay segments are confirmed, decompressed and scanned for further
/// references into the archive
#[test]
fn test_segment_pipeline() -> Result<(), Box<dyn std::error::Error>> {
    let p = params();

    // archive payload referenced from inside the segment
    let payload_stream = compress_bytes(&b"payload!".repeat(16), p)?;
    let mut archive = vec![0u8; 0x2000];
    archive[0x1000..0x1000 + payload_stream.len()].copy_from_slice(&payload_stream);

    // segment content: filler plus a header pointing into the archive
    let mut segment_content = vec![0xABu8; 0x190];
    let payload_header = descriptor(0x1000, payload_stream.len() as u32, 128, 4);
    segment_content[0x10..0x20].copy_from_slice(&payload_header.encode());
    let segment_stream = compress_bytes(&segment_content, p)?;

    let mut overlay = vec![0u8; 0x1000];
    overlay[0x800..0x800 + segment_stream.len()].copy_from_slice(&segment_stream);

    // the program references the segment, not the payload
    let mut segment_header = descriptor(0x800, segment_stream.len() as u32, 0x190, 4);
    segment_header.source_file = OVERLAY.to_string();
    segment_header.reset_output_name();
    let mut program = vec![0xEEu8; 0x100];
    program[0x08..0x18].copy_from_slice(&segment_header.encode());

    let catalog = engine_for(program, overlay, archive).run()?;

    assert_eq!(catalog.referenced_compressed.len(), 2);
    let segment = &catalog.referenced_compressed[0];
    assert_eq!(segment.disk_location, 0x800);
    assert_eq!(segment.source_file, OVERLAY);
    assert_eq!(segment.output_name, "800.rel");

    let payload = &catalog.referenced_compressed[1];
    assert_eq!(payload.disk_location, 0x1000);
    assert_eq!(payload.source_file, ARCHIVE);
    assert!(payload.output_name.starts_with("cmp "));
    Ok(())
}

/// Form records carry a little-endian mini-header and learn their
/// compressed size by trial decompression
#[test]
fn test_form_records() -> Result<(), Box<dyn std::error::Error>> {
    let p = params();
    let payload = b"form payload 123".repeat(4);
    let stream = compress_bytes(&payload, p)?;

    let mut archive = vec![0u8; 0x800];

    // compressed form at 0x40
    let packed: u32 = (4 << 28) | payload.len() as u32;
    archive[0x38..0x3C].copy_from_slice(&packed.to_le_bytes());
    archive[0x3C..0x40].copy_from_slice(&(11u32 | (4 << 8)).to_le_bytes());
    archive[0x40..0x48].copy_from_slice(b"AdGCForm");
    archive[0x48..0x48 + stream.len()].copy_from_slice(&stream);

    // stored form at 0x200
    let stored_packed: u32 = 32;
    archive[0x1F8..0x1FC].copy_from_slice(&stored_packed.to_le_bytes());
    archive[0x200..0x208].copy_from_slice(b"AdGCForm");

    // corrupt form at 0x400: parameters say compressed, data is zeros
    let bad_packed: u32 = (4 << 28) | 100;
    archive[0x3F8..0x3FC].copy_from_slice(&bad_packed.to_le_bytes());
    archive[0x3FC..0x400].copy_from_slice(&(11u32 | (4 << 8)).to_le_bytes());
    archive[0x400..0x408].copy_from_slice(b"AdGCForm");

    let catalog =
        engine_for(vec![0xEEu8; 0x100], vec![0xEEu8; 0x800], archive).run()?;

    assert_eq!(catalog.adgc_forms.len(), 2);

    let compressed_form = &catalog.adgc_forms[0];
    assert_eq!(compressed_form.disk_location, 0x48);
    assert_eq!(compressed_form.original_size, payload.len() as u32);
    assert_eq!(compressed_form.compressed_size, stream.len() as u32);
    assert_eq!(compressed_form.lookback_bits, 11);
    assert_eq!(compressed_form.repetition_bits, 4);
    assert_eq!(compressed_form.compression_flag, 4);
    assert_eq!(compressed_form.output_name, "AdGCForm 00000048.dat");

    let stored_form = &catalog.adgc_forms[1];
    assert_eq!(stored_form.disk_location, 0x208);
    assert_eq!(stored_form.original_size, 32);
    assert_eq!(stored_form.compressed_size, 32);
    assert_eq!(stored_form.compression_flag, 0);
    Ok(())
}

/// The catalog document uses the published array and field names and
/// rehydrates losslessly
#[test]
fn test_catalog_document_round_trip() -> Result<(), Box<dyn std::error::Error>> {
    let stream = compress_bytes(b"0123456789", params())?;
    let mut archive = vec![0u8; 0x1000];
    archive[0x800..0x800 + stream.len()].copy_from_slice(&stream);

    let mut program = vec![0xEEu8; 0x100];
    program[0x20..0x30].copy_from_slice(&descriptor(0x800, 16, 10, 4).encode());

    let catalog = engine_for(program, vec![0xEEu8; 0x800], archive).run()?;
    let json = serde_json::to_string_pretty(&catalog.to_document())?;

    for key in [
        "GameReferencedCompressedFiles",
        "GameReferencedRawFiles",
        "UnreferencedCompressedFiles",
        "AdGCForms",
        "lookbackBitSize",
        "repetitionBitSize",
        "compressedSize",
        "footerSize",
    ] {
        assert!(json.contains(key), "missing {key} in document");
    }

    let parsed: CatalogDocument = serde_json::from_str(&json)?;
    let rehydrated = parsed.into_catalog();
    assert_eq!(
        rehydrated.referenced_compressed,
        catalog.referenced_compressed
    );
    Ok(())
}

/// A partial seed document parses; absent arrays default to empty
#[test]
fn test_partial_seed_document() -> Result<(), Box<dyn std::error::Error>> {
    let json = r#"{
        "GameReferencedRawFiles": [{
            "Input": "zzzz.dat",
            "Output": "movie1.HVQM4",
            "lookbackBitSize": 0,
            "repetitionBitSize": 0,
            "size": 86258776,
            "offset": 73728,
            "compressedSize": 86258776,
            "compressionFlag": 0
        }]
    }"#;

    let document: CatalogDocument = serde_json::from_str(json)?;
    let seeded = document.into_catalog();
    assert_eq!(seeded.referenced_raw.len(), 1);
    assert_eq!(seeded.referenced_raw[0].disk_location, 0x12000);
    assert_eq!(seeded.referenced_raw[0].output_name, "movie1.HVQM4");
    assert!(seeded.referenced_compressed.is_empty());
    Ok(())
}

/// Empty buffers produce an empty catalog, not an error
#[test]
fn test_empty_buffers() -> Result<(), Box<dyn std::error::Error>> {
    let catalog = engine_for(Vec::new(), Vec::new(), Vec::new()).run()?;
    assert!(catalog.is_empty());
    Ok(())
}
