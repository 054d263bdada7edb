//! carve-cli - Command-line interface for carvelib
//!
//! A command-line tool for compressing, decompressing and carving the
//! bit-packed LZ archive format.

use carvelib::discovery::{DiscoveryConfig, DiscoveryEngine};
use carvelib::{compress_bytes, decompress_bytes, CatalogDocument, CompressionParams, Decompressor};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "carve-cli")]
#[command(about = "A CLI tool for carving and recompressing table-less game archives")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compress a file into the bit-packed stream format
    Compress {
        /// Input file to compress
        input: PathBuf,

        /// Output compressed file
        output: PathBuf,

        /// Width of the back-reference distance field in bits
        #[arg(short, long, default_value_t = 11)]
        lookback_bits: u8,

        /// Width of the back-reference length field in bits
        #[arg(short, long, default_value_t = 4)]
        repetition_bits: u8,

        /// Force overwrite of output file
        #[arg(short, long)]
        force: bool,
    },

    /// Decompress a stream, optionally from an offset inside an archive
    Decompress {
        /// Input compressed file or archive
        input: PathBuf,

        /// Output decompressed file
        output: PathBuf,

        /// Width of the back-reference distance field in bits
        #[arg(short, long, default_value_t = 11)]
        lookback_bits: u8,

        /// Width of the back-reference length field in bits
        #[arg(short, long, default_value_t = 4)]
        repetition_bits: u8,

        /// Byte offset of the stream inside the input file
        #[arg(short, long, default_value_t = 0)]
        offset: u64,

        /// Exact decompressed size, when known
        #[arg(short, long)]
        size: Option<usize>,

        /// Force overwrite of output file
        #[arg(short, long)]
        force: bool,
    },

    /// Check whether a file validates as a compressed stream
    Info {
        /// File to analyze
        input: PathBuf,

        /// Width of the back-reference distance field in bits
        #[arg(short, long, default_value_t = 11)]
        lookback_bits: u8,

        /// Width of the back-reference length field in bits
        #[arg(short, long, default_value_t = 4)]
        repetition_bits: u8,
    },

    /// Carve an archive set and write the resulting catalog as JSON
    Discover {
        /// Executable image carrying headers that reference the overlay
        #[arg(long)]
        program: PathBuf,

        /// Segment archive referenced by the program image
        #[arg(long)]
        overlay: PathBuf,

        /// Bulk data archive to catalog
        #[arg(long)]
        archive: PathBuf,

        /// Output catalog JSON path
        #[arg(short, long)]
        output: PathBuf,

        /// Catalog-schema JSON of already-confirmed entries to seed with
        #[arg(long)]
        seeds: Option<PathBuf>,

        /// Probe lookback width in bits
        #[arg(long, default_value_t = 11)]
        probe_lookback_bits: u8,

        /// Probe repetition width in bits
        #[arg(long, default_value_t = 4)]
        probe_repetition_bits: u8,

        /// Decoded bytes a probe must produce to count as plausible
        #[arg(long, default_value_t = 200)]
        probe_window: usize,

        /// Force overwrite of output file
        #[arg(short, long)]
        force: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Compress {
            input,
            output,
            lookback_bits,
            repetition_bits,
            force,
        } => compress_file(
            &input,
            &output,
            lookback_bits,
            repetition_bits,
            force,
            cli.verbose,
            cli.quiet,
        ),
        Commands::Decompress {
            input,
            output,
            lookback_bits,
            repetition_bits,
            offset,
            size,
            force,
        } => decompress_file(
            &input,
            &output,
            lookback_bits,
            repetition_bits,
            offset,
            size,
            force,
            cli.verbose,
            cli.quiet,
        ),
        Commands::Info {
            input,
            lookback_bits,
            repetition_bits,
        } => show_stream_info(&input, lookback_bits, repetition_bits, cli.verbose),
        Commands::Discover {
            program,
            overlay,
            archive,
            output,
            seeds,
            probe_lookback_bits,
            probe_repetition_bits,
            probe_window,
            force,
        } => discover_files(
            &program,
            &overlay,
            &archive,
            &output,
            seeds.as_deref(),
            probe_lookback_bits,
            probe_repetition_bits,
            probe_window,
            force,
            cli.quiet,
        ),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn stream_params(
    lookback_bits: u8,
    repetition_bits: u8,
) -> Result<CompressionParams, Box<dyn std::error::Error>> {
    Ok(CompressionParams::new(lookback_bits, repetition_bits)?)
}

fn check_paths(
    input: &PathBuf,
    output: &PathBuf,
    force: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if !input.exists() {
        return Err(format!("Input file '{}' does not exist", input.display()).into());
    }
    if output.exists() && !force {
        return Err(format!(
            "Output file '{}' already exists. Use --force to overwrite",
            output.display()
        )
        .into());
    }
    Ok(())
}

fn progress_for(quiet: bool, input_size: usize, message: &'static str) -> Option<ProgressBar> {
    if !quiet && input_size > 1024 * 1024 {
        let pb = ProgressBar::new(2);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}",
                )
                .unwrap()
                .progress_chars("#>-"),
        );
        pb.set_message(message);
        Some(pb)
    } else {
        None
    }
}

fn compress_file(
    input: &PathBuf,
    output: &PathBuf,
    lookback_bits: u8,
    repetition_bits: u8,
    force: bool,
    verbose: bool,
    quiet: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    check_paths(input, output, force)?;
    let params = stream_params(lookback_bits, repetition_bits)?;

    if verbose {
        println!(
            "Compressing '{}' to '{}'",
            input.display(),
            output.display()
        );
        println!(
            "Lookback: {} bits, Repetition: {} bits",
            lookback_bits, repetition_bits
        );
    }

    let start_time = Instant::now();
    let input_data = fs::read(input)?;
    let input_size = input_data.len();

    let progress = progress_for(quiet, input_size, "Compressing...");
    if let Some(ref pb) = progress {
        pb.inc(1);
    }

    let compressed_data =
        compress_bytes(&input_data, params).map_err(|e| format!("Compression failed: {}", e))?;

    if let Some(ref pb) = progress {
        pb.inc(1);
        pb.finish_with_message("Compression complete");
    }

    fs::write(output, &compressed_data)?;

    let compression_time = start_time.elapsed();
    let output_size = compressed_data.len();
    let compression_ratio = (output_size as f64 / input_size.max(1) as f64) * 100.0;

    if !quiet {
        println!("✓ Compression successful!");
        println!("  Input:  {} bytes", input_size);
        println!("  Output: {} bytes", output_size);
        println!("  Ratio:  {:.1}%", compression_ratio);
        println!("  Time:   {:.2?}", compression_time);

        if compression_ratio > 100.0 {
            println!("  Note: File expanded during compression (common for small/random data)");
        }
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn decompress_file(
    input: &PathBuf,
    output: &PathBuf,
    lookback_bits: u8,
    repetition_bits: u8,
    offset: u64,
    size: Option<usize>,
    force: bool,
    verbose: bool,
    quiet: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    check_paths(input, output, force)?;
    let params = stream_params(lookback_bits, repetition_bits)?;

    if verbose {
        println!(
            "Decompressing '{}' (offset {:#x}) to '{}'",
            input.display(),
            offset,
            output.display()
        );
    }

    let start_time = Instant::now();
    let archive_data = fs::read(input)?;
    if offset as usize > archive_data.len() {
        return Err(format!("Offset {:#x} is past the end of the input", offset).into());
    }
    let stream = &archive_data[offset as usize..];

    let progress = progress_for(quiet, stream.len(), "Decompressing...");
    if let Some(ref pb) = progress {
        pb.inc(1);
    }

    let decompressed_data =
        decompress_bytes(stream, params, size).map_err(|e| format!("Decompression failed: {}", e))?;

    if let Some(ref pb) = progress {
        pb.inc(1);
        pb.finish_with_message("Decompression complete");
    }

    fs::write(output, &decompressed_data)?;

    let decompression_time = start_time.elapsed();

    if !quiet {
        println!("✓ Decompression successful!");
        println!("  Input:  {} bytes", stream.len());
        println!("  Output: {} bytes", decompressed_data.len());
        println!("  Time:   {:.2?}", decompression_time);
    }

    Ok(())
}

fn show_stream_info(
    input: &PathBuf,
    lookback_bits: u8,
    repetition_bits: u8,
    verbose: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if !input.exists() {
        return Err(format!("Input file '{}' does not exist", input.display()).into());
    }
    let params = stream_params(lookback_bits, repetition_bits)?;

    let data = fs::read(input)?;
    println!("Stream Information:");
    println!("  File: {}", input.display());
    println!("  Size: {} bytes", data.len());
    println!(
        "  Parameters: lookback {} bits, repetition {} bits",
        lookback_bits, repetition_bits
    );

    let mut decoder = Decompressor::new(&data, params);
    match decoder.decompress() {
        Ok(decompressed) => {
            println!("  Decompressed Size: {} bytes", decompressed.len());
            println!("  Consumed: {} bytes", decoder.compressed_size());
            println!("  Status: ✓ Valid stream");
        }
        Err(e) => {
            println!("  Status: ✗ Not a valid stream under these parameters");
            if verbose {
                println!("  Error: {}", e);
            }
        }
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn discover_files(
    program: &PathBuf,
    overlay: &PathBuf,
    archive: &PathBuf,
    output: &PathBuf,
    seeds: Option<&std::path::Path>,
    probe_lookback_bits: u8,
    probe_repetition_bits: u8,
    probe_window: usize,
    force: bool,
    quiet: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    for path in [program, overlay, archive] {
        if !path.exists() {
            return Err(format!(
                "{} does not exist. Please supply this file to continue.",
                path.display()
            )
            .into());
        }
    }
    if output.exists() && !force {
        return Err(format!(
            "Output file '{}' already exists. Use --force to overwrite",
            output.display()
        )
        .into());
    }

    let mut config = DiscoveryConfig::new(program, overlay, archive);
    config.probe_params = CompressionParams::new(probe_lookback_bits, probe_repetition_bits)?;
    config.probe_window = probe_window;

    if let Some(seeds_path) = seeds {
        let document: CatalogDocument = serde_json::from_str(&fs::read_to_string(seeds_path)?)?;
        let seeded = document.into_catalog();
        config.known_raw = seeded.referenced_raw;
        config.known_compressed = seeded.referenced_compressed;
        if !quiet {
            println!(
                "Seeded {} raw and {} compressed known entries",
                config.known_raw.len(),
                config.known_compressed.len()
            );
        }
    }

    let start_time = Instant::now();
    let spinner = if quiet {
        None
    } else {
        let pb = ProgressBar::new_spinner();
        pb.set_message("Carving...");
        Some(pb)
    };

    let mut engine = DiscoveryEngine::new(config);
    let catalog = engine.run()?;

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    fs::write(
        output,
        serde_json::to_string_pretty(&catalog.to_document())?,
    )?;

    if !quiet {
        println!("✓ Discovery complete!");
        println!(
            "  Referenced compressed: {}",
            catalog.referenced_compressed.len()
        );
        println!("  Referenced raw:        {}", catalog.referenced_raw.len());
        println!(
            "  Unreferenced:          {}",
            catalog.unreferenced_compressed.len()
        );
        println!("  Form records:          {}", catalog.adgc_forms.len());
        println!("  Time:   {:.2?}", start_time.elapsed());
        println!("  Catalog written to {}", output.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_round_trip() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let input_path = dir.path().join("input.bin");
        let compressed_path = dir.path().join("compressed.dat");
        let output_path = dir.path().join("output.bin");

        let test_data = b"Hello, World! This is a test of the carve CLI tool.";
        fs::write(&input_path, test_data)?;

        compress_file(&input_path, &compressed_path, 11, 4, false, false, true)?;
        decompress_file(
            &compressed_path,
            &output_path,
            11,
            4,
            0,
            Some(test_data.len()),
            false,
            false,
            true,
        )?;

        let result_data = fs::read(&output_path)?;
        assert_eq!(test_data, &result_data[..]);

        Ok(())
    }
}
