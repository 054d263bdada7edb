//! Lazy, capped decompression for streams of unknown total length
//!
//! A [`RollingDecompressor`] materializes output only as far as a concrete
//! request demands, holding its bit-stream position between calls. Open-ended
//! views ([`RollingView`]) compose offsets and steps without touching the
//! stream at all, so the decode cost is deferred until a consumer finally
//! supplies a concrete stop. Output never exceeds [`ROLLING_OUTPUT_CAP`]
//! bytes regardless of what the stream encodes.

use std::cell::RefCell;
use std::rc::Rc;

use crate::bitstream::{BitCursor, BitReader, BACK_REFERENCE_FLAG};
use crate::common::{CarveError, CompressionParams, Result, ROLLING_OUTPUT_CAP};

#[derive(Debug)]
struct RollingState {
    data: Vec<u8>,
    params: CompressionParams,
    cursor: BitCursor,
    output: Vec<u8>,
}

impl RollingState {
    /// Decode tokens until at least `target` bytes exist (or the cap is hit)
    fn materialize(&mut self, target: usize) -> Result<()> {
        let mut reader = BitReader::resume(&self.data, self.cursor);
        let result = loop {
            if self.output.len() >= target || self.output.len() >= ROLLING_OUTPUT_CAP {
                break Ok(());
            }
            match Self::decode_step(&mut reader, &self.params, &mut self.output) {
                Ok(()) => {}
                Err(err) => break Err(err),
            }
        };
        self.cursor = reader.cursor();
        result
    }

    fn decode_step(
        reader: &mut BitReader<'_>,
        params: &CompressionParams,
        output: &mut Vec<u8>,
    ) -> Result<()> {
        if reader.read_bits(1)? == BACK_REFERENCE_FLAG {
            let distance = reader.read_bits(params.lookback_bits)?;
            let raw_length = reader.read_bits(params.repetition_bits)?;
            if distance as usize >= output.len() {
                return Err(CarveError::CorruptStream {
                    distance,
                    produced: output.len(),
                });
            }
            for _ in 0..raw_length + 2 {
                let byte = output[output.len() - 1 - distance as usize];
                output.push(byte);
            }
        } else {
            let byte = reader.read_bits(8)? as u8;
            output.push(byte);
        }
        Ok(())
    }
}

/// Lazily decompresses a stream, materializing output on demand
///
/// Cheap to clone views of; the decoded prefix is shared between the
/// decompressor and every view derived from it.
#[derive(Debug)]
pub struct RollingDecompressor {
    state: Rc<RefCell<RollingState>>,
}

impl RollingDecompressor {
    /// Create a rolling decompressor over a copy of the compressed bytes
    pub fn new(data: Vec<u8>, params: CompressionParams) -> Self {
        Self {
            state: Rc::new(RefCell::new(RollingState {
                data,
                params,
                cursor: BitCursor::default(),
                output: Vec::new(),
            })),
        }
    }

    /// Bytes materialized so far
    pub fn materialized(&self) -> usize {
        self.state.borrow().output.len()
    }

    /// Ensure at least `size` output bytes exist, capped
    pub fn ensure(&self, size: usize) -> Result<()> {
        self.state.borrow_mut().materialize(size)
    }

    /// Single-index access; materializes through `index`
    pub fn get(&self, index: usize) -> Result<u8> {
        if index >= ROLLING_OUTPUT_CAP {
            return Err(CarveError::OutputLimitExceeded { index });
        }
        self.ensure(index + 1)?;
        Ok(self.state.borrow().output[index])
    }

    /// Concrete-stop slice `[start, stop)`; materializes through `stop`
    ///
    /// The result is shorter than requested when the output cap intervenes.
    pub fn read_range(&self, start: usize, stop: usize) -> Result<Vec<u8>> {
        self.ensure(start.max(stop))?;
        let state = self.state.borrow();
        let end = stop.min(state.output.len());
        let begin = start.min(end);
        Ok(state.output[begin..end].to_vec())
    }

    /// Open-ended lazy view starting at `start`; materializes nothing
    pub fn view(&self, start: usize) -> RollingView {
        RollingView {
            state: Rc::clone(&self.state),
            offset: start,
            step: 1,
        }
    }
}

/// Lazy view over a [`RollingDecompressor`] carrying an offset and step
///
/// Views of views compose: offsets add (scaled by the parent step) and steps
/// multiply, so no decompression happens until a concrete stop arrives.
#[derive(Debug)]
pub struct RollingView {
    state: Rc<RefCell<RollingState>>,
    offset: usize,
    step: usize,
}

impl RollingView {
    /// Offset of this view's first element in the decompressed stream
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Distance between consecutive elements of this view
    pub fn step(&self) -> usize {
        self.step
    }

    /// Further open-ended view `[start..]` of this view
    pub fn view(&self, start: usize) -> RollingView {
        self.view_stepped(start, 1)
    }

    /// Further open-ended view `[start..; step]` of this view
    pub fn view_stepped(&self, start: usize, step: usize) -> RollingView {
        assert!(step > 0);
        RollingView {
            state: Rc::clone(&self.state),
            offset: self.offset + start * self.step,
            step: self.step * step,
        }
    }

    /// Element access; materializes through the underlying index
    pub fn get(&self, index: usize) -> Result<u8> {
        let absolute = self.offset + index * self.step;
        if absolute >= ROLLING_OUTPUT_CAP {
            return Err(CarveError::OutputLimitExceeded { index: absolute });
        }
        self.state.borrow_mut().materialize(absolute + 1)?;
        Ok(self.state.borrow().output[absolute])
    }

    /// Materialize elements `[0, stop)` of this view
    ///
    /// Shorter than requested when the output cap intervenes.
    pub fn take_to(&self, stop: usize) -> Result<Vec<u8>> {
        if stop == 0 {
            return Ok(Vec::new());
        }
        let last = self.offset + (stop - 1) * self.step;
        self.state
            .borrow_mut()
            .materialize(last.min(ROLLING_OUTPUT_CAP) + 1)?;
        let state = self.state.borrow();
        let mut out = Vec::with_capacity(stop);
        for index in 0..stop {
            let absolute = self.offset + index * self.step;
            if absolute >= state.output.len() {
                break;
            }
            out.push(state.output[absolute]);
        }
        Ok(out)
    }

    /// Materialize elements `[start, stop)` of this view
    pub fn take_range(&self, start: usize, stop: usize) -> Result<Vec<u8>> {
        self.view(start).take_to(stop.saturating_sub(start))
    }
}
