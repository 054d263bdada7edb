//! Token-stream decoder with direct, listing and validation modes
//!
//! All three modes run the same state machine: read a flag bit, then either
//! an 8-bit literal or a `(distance, length)` back-reference copied
//! byte-by-byte out of the already-produced output. Validation tracks only
//! the produced count, which keeps candidate probing allocation-free.

use crate::bitstream::{BitReader, BACK_REFERENCE_FLAG};
use crate::common::{CarveError, CompressionParams, Result, Token};

/// Decoder over one compressed slice
///
/// The stop mode is fixed at construction: exact (decode until a known
/// original size is reached) or speculative (decode until the bit source is
/// exhausted).
#[derive(Debug)]
pub struct Decompressor<'a> {
    data: &'a [u8],
    params: CompressionParams,
    original_size: Option<usize>,
    consumed: usize,
}

impl<'a> Decompressor<'a> {
    /// Create a speculative-stop decoder
    pub fn new(data: &'a [u8], params: CompressionParams) -> Self {
        Self {
            data,
            params,
            original_size: None,
            consumed: 0,
        }
    }

    /// Create an exact-stop decoder for a known original size
    pub fn with_exact_size(data: &'a [u8], params: CompressionParams, original_size: usize) -> Self {
        Self {
            data,
            params,
            original_size: Some(original_size),
            consumed: 0,
        }
    }

    fn keep_going(&self, produced: usize, reader: &BitReader<'_>) -> bool {
        match self.original_size {
            Some(target) => produced < target,
            None => reader.has_more(),
        }
    }

    /// Whole input bytes consumed by the last decode or validation
    ///
    /// Word-granular; this is how a stream with no recorded compressed size
    /// learns its extent.
    pub fn compressed_size(&self) -> usize {
        self.consumed
    }

    /// Decode the stream into a fresh buffer
    ///
    /// Stored-mode parameters return the input prefix of the original size
    /// (or nothing without one). A final back-reference in exact mode may
    /// legitimately overrun the target size and is emitted in full.
    pub fn decompress(&mut self) -> Result<Vec<u8>> {
        if self.params.is_stored() {
            let end = self.original_size.unwrap_or(0).min(self.data.len());
            return Ok(self.data[..end].to_vec());
        }

        let mut reader = BitReader::new(self.data);
        let mut output: Vec<u8> = match self.original_size {
            Some(target) => Vec::with_capacity(target),
            None => Vec::new(),
        };

        let result = loop {
            if !self.keep_going(output.len(), &reader) {
                break Ok(());
            }
            match self.step(&mut reader, output.len()) {
                Ok(Token::Literal(byte)) => output.push(byte),
                Ok(Token::BackReference { distance, length }) => {
                    for _ in 0..length {
                        let byte = output[output.len() - 1 - distance as usize];
                        output.push(byte);
                    }
                }
                Err(err) => break Err(err),
            }
        };
        self.consumed = reader.bytes_consumed();
        result.map(|()| output)
    }

    /// Decode into a token list without materializing bytes
    pub fn tokens(&mut self) -> Result<Vec<Token>> {
        if self.params.is_stored() {
            return Ok(Vec::new());
        }

        let mut reader = BitReader::new(self.data);
        let mut produced = 0usize;
        let mut tokens = Vec::new();

        let result = loop {
            if !self.keep_going(produced, &reader) {
                break Ok(());
            }
            match self.step(&mut reader, produced) {
                Ok(token) => {
                    produced += match token {
                        Token::Literal(_) => 1,
                        Token::BackReference { length, .. } => length as usize,
                    };
                    tokens.push(token);
                }
                Err(err) => break Err(err),
            }
        };
        self.consumed = reader.bytes_consumed();
        result.map(|()| tokens)
    }

    /// Run the decode state machine discarding output
    ///
    /// Returns `false` on an out-of-range back-reference or truncated input,
    /// `true` once the stream is fully consumed. Trivially true for stored
    /// parameters.
    pub fn validate(&mut self) -> bool {
        if self.params.is_stored() {
            return true;
        }

        let mut reader = BitReader::new(self.data);
        let mut produced = 0usize;

        let result = loop {
            if !self.keep_going(produced, &reader) {
                break Ok(());
            }
            match self.step(&mut reader, produced) {
                Ok(Token::Literal(_)) => produced += 1,
                Ok(Token::BackReference { length, .. }) => produced += length as usize,
                Err(err) => break Err(err),
            }
        };
        self.consumed = reader.bytes_consumed();
        match result {
            Ok(()) => true,
            Err(err) => {
                log::debug!("stream rejected: {err}");
                false
            }
        }
    }

    fn step(&self, reader: &mut BitReader<'_>, produced: usize) -> Result<Token> {
        if reader.read_bits(1)? == BACK_REFERENCE_FLAG {
            let distance = reader.read_bits(self.params.lookback_bits)?;
            let raw_length = reader.read_bits(self.params.repetition_bits)?;
            if distance as usize >= produced {
                return Err(CarveError::CorruptStream { distance, produced });
            }
            Ok(Token::BackReference {
                distance,
                length: raw_length + 2,
            })
        } else {
            Ok(Token::Literal(reader.read_bits(8)? as u8))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitstream::BitWriter;

    fn params() -> CompressionParams {
        CompressionParams::new(11, 4).unwrap()
    }

    fn literals(bytes: &[u8]) -> Vec<u8> {
        let mut writer = BitWriter::new();
        for &byte in bytes {
            writer.put_literal(byte).unwrap();
        }
        writer.finish()
    }

    #[test]
    fn test_literal_stream() {
        let stream = literals(b"carve");
        let mut decoder = Decompressor::new(&stream, params());
        assert_eq!(decoder.decompress().unwrap(), b"carve");
    }

    #[test]
    fn test_self_overlapping_copy() {
        // one literal then a run of 9 copies at distance 0
        let mut writer = BitWriter::new();
        writer.put_literal(b'x').unwrap();
        writer.put_back_reference(0, 7, 11, 4).unwrap();
        let stream = writer.finish();

        let mut decoder = Decompressor::with_exact_size(&stream, params(), 10);
        assert_eq!(decoder.decompress().unwrap(), b"xxxxxxxxxx");
    }

    #[test]
    fn test_corrupt_back_reference() {
        let mut writer = BitWriter::new();
        writer.put_literal(b'a').unwrap();
        writer.put_back_reference(5, 0, 11, 4).unwrap();
        let stream = writer.finish();

        let mut decoder = Decompressor::with_exact_size(&stream, params(), 3);
        assert!(matches!(
            decoder.decompress(),
            Err(CarveError::CorruptStream {
                distance: 5,
                produced: 1
            })
        ));

        let mut validator = Decompressor::with_exact_size(&stream, params(), 3);
        assert!(!validator.validate());
    }

    #[test]
    fn test_truncated_input_rejected_by_validate() {
        // exact mode wanting more bytes than the stream encodes
        let stream = literals(b"ab");
        let mut validator = Decompressor::with_exact_size(&stream, params(), 100);
        assert!(!validator.validate());

        let mut decoder = Decompressor::with_exact_size(&stream, params(), 100);
        assert!(matches!(
            decoder.decompress(),
            Err(CarveError::UnexpectedEof)
        ));
    }

    #[test]
    fn test_token_listing() {
        let mut writer = BitWriter::new();
        writer.put_literal(b'a').unwrap();
        writer.put_literal(b'b').unwrap();
        writer.put_back_reference(1, 2, 11, 4).unwrap();
        let stream = writer.finish();

        let mut decoder = Decompressor::with_exact_size(&stream, params(), 6);
        assert_eq!(
            decoder.tokens().unwrap(),
            vec![
                Token::Literal(b'a'),
                Token::Literal(b'b'),
                Token::BackReference {
                    distance: 1,
                    length: 4
                },
            ]
        );
    }

    #[test]
    fn test_stored_mode() {
        let data = b"raw bytes, no bit stream";
        let stored = CompressionParams::new(0, 0).unwrap();
        let mut decoder = Decompressor::with_exact_size(data, stored, 9);
        assert_eq!(decoder.decompress().unwrap(), b"raw bytes");
        assert!(Decompressor::new(data, stored).validate());
        assert!(Decompressor::new(data, stored).decompress().unwrap().is_empty());
    }

    #[test]
    fn test_compressed_size_accounting() {
        let stream = literals(b"abcdefgh");
        assert_eq!(stream.len(), 12);
        let mut decoder = Decompressor::with_exact_size(&stream, params(), 8);
        decoder.decompress().unwrap();
        assert_eq!(decoder.compressed_size(), 12);
    }

    #[test]
    fn test_speculative_stop_on_padding() {
        let stream = literals(b"abc");
        let mut decoder = Decompressor::new(&stream, params());
        assert_eq!(decoder.decompress().unwrap(), b"abc");
    }
}
