//! Greedy token-stream encoder
//!
//! At each input position the encoder searches the sliding window for the
//! longest prior occurrence of the upcoming bytes. Matches may start inside
//! the window and run past the current position (self-overlap), which is what
//! lets single-byte runs collapse into one back-reference. Ties are broken
//! toward the smallest match position, so the encoded stream is a pure
//! function of input and parameters.

use super::window::WindowIndex;
use super::MIN_MATCH_LENGTH;
use crate::bitstream::BitWriter;
use crate::common::{CompressionParams, Result};

/// Longest prior occurrence found for one position
#[derive(Debug, Clone, Copy)]
struct Match {
    pos: usize,
    length: usize,
}

/// Greedy encoder over one input buffer
#[derive(Debug)]
pub struct Compressor<'a> {
    data: &'a [u8],
    params: CompressionParams,
    index: WindowIndex,
}

impl<'a> Compressor<'a> {
    /// Create an encoder for `data` under `params`
    pub fn new(data: &'a [u8], params: CompressionParams) -> Self {
        Self {
            data,
            params,
            index: WindowIndex::new(),
        }
    }

    /// Encode the whole buffer into packed words
    ///
    /// Stored-mode parameters pass the input through unchanged.
    pub fn compress(&mut self) -> Result<Vec<u8>> {
        if self.params.is_stored() {
            return Ok(self.data.to_vec());
        }

        let window_size = self.params.window_size() as usize;
        let mut writer = BitWriter::new();
        let mut pos = 0;

        while pos < self.data.len() {
            let advance = match self.find_longest_match(pos, window_size) {
                Some(found) => {
                    let distance = (pos - found.pos - 1) as u32;
                    let raw_length = (found.length - MIN_MATCH_LENGTH) as u32;
                    writer.put_back_reference(
                        distance,
                        raw_length,
                        self.params.lookback_bits,
                        self.params.repetition_bits,
                    )?;
                    found.length
                }
                None => {
                    writer.put_literal(self.data[pos])?;
                    1
                }
            };
            for offset in pos..pos + advance {
                self.index.insert(self.data[offset], offset);
            }
            pos += advance;
        }

        Ok(writer.finish())
    }

    /// Longest window match for the bytes at `pos`, if at least 2 long
    ///
    /// The lookahead is capped at the maximum run length and the remaining
    /// input. Among equally long matches the smallest position wins.
    fn find_longest_match(&mut self, pos: usize, window_size: usize) -> Option<Match> {
        let max_length = (self.params.max_run_length() as usize).min(self.data.len() - pos);
        if max_length < MIN_MATCH_LENGTH {
            return None;
        }

        let window_start = pos.saturating_sub(window_size);
        let mut best: Option<Match> = None;

        for &candidate in self.index.candidates(self.data[pos], window_start) {
            let mut length = 0;
            while length < max_length && self.data[candidate + length] == self.data[pos + length] {
                length += 1;
            }
            // candidates come ascending, so a strict improvement keeps the
            // leftmost position for any given length
            if length > best.map_or(MIN_MATCH_LENGTH - 1, |m| m.length) {
                best = Some(Match {
                    pos: candidate,
                    length,
                });
            }
        }

        best
    }
}
