//! Overlap-add block convolution
//!
//! Each input block is zero-padded to `B + N - 1` samples and convolved in
//! one transform. The first `B` samples of the result are emitted together
//! with the tail carried over from earlier blocks; the remaining `N - 1`
//! samples are added into the carry buffer.

use crate::convolver::BlockConvolver;
use crate::fft_conv::FftConv;
use crate::{AudioBuffer, AudioError, AudioResult, Sample};
use realfft::RealFftPlanner;

#[cfg(not(feature = "std"))]
use alloc::vec;

/// Streaming overlap-add convolver
///
/// # Example
///
/// ```rust
/// use blockconv::convolver::BlockConvolver;
/// use blockconv::ola::OverlapAdd;
/// use realfft::RealFftPlanner;
///
/// let mut planner = RealFftPlanner::new();
/// let mut ola = OverlapAdd::new(&mut planner, &[1.0, 0.5], 4).unwrap();
///
/// let mut output = vec![0.0; 4];
/// ola.process_block(&[0.0, 0.0, 0.0, 1.0], &mut output).unwrap();
/// // the filter tail spills into the next block
/// ola.process_block(&[0.0; 4], &mut output).unwrap();
/// assert!((output[0] - 0.5).abs() < 1e-6);
/// ```
pub struct OverlapAdd {
    block_size: usize,
    filter_len: usize,
    fft_conv: FftConv,
    /// Convolution tail not yet emitted (length `fft_size`)
    left_overs: AudioBuffer,
    conv_output: AudioBuffer,
}

impl OverlapAdd {
    /// Create an overlap-add convolver for `impulse_response`
    pub fn new(
        planner: &mut RealFftPlanner<Sample>,
        impulse_response: &[Sample],
        block_size: usize,
    ) -> AudioResult<Self> {
        if block_size == 0 {
            return Err(AudioError::InvalidBlockSize);
        }
        if impulse_response.is_empty() {
            return Err(AudioError::InsufficientData);
        }

        let fft_size = Self::fft_size_for(block_size, impulse_response.len());
        let mut fft_conv = FftConv::new(planner, fft_size)?;
        fft_conv.set_kernel(impulse_response)?;

        Ok(Self {
            block_size,
            filter_len: impulse_response.len(),
            fft_conv,
            left_overs: vec![0.0; fft_size],
            conv_output: vec![0.0; fft_size],
        })
    }

    /// Smallest transform free of circular aliasing: `B + N - 1`
    pub fn fft_size_for(block_size: usize, filter_len: usize) -> usize {
        block_size + filter_len - 1
    }
}

impl BlockConvolver for OverlapAdd {
    fn block_size(&self) -> usize {
        self.block_size
    }

    fn fft_size(&self) -> usize {
        self.fft_conv.fft_size()
    }

    fn filter_len(&self) -> usize {
        self.filter_len
    }

    fn update_filter(&mut self, impulse_response: &[Sample]) -> AudioResult<()> {
        if impulse_response.len() != self.filter_len {
            return Err(AudioError::BufferSizeMismatch);
        }
        self.fft_conv.set_kernel(impulse_response)
    }

    fn process_block(&mut self, input: &[Sample], output: &mut [Sample]) -> AudioResult<()> {
        let block_size = self.block_size;
        if input.len() != block_size || output.len() != block_size {
            return Err(AudioError::BufferSizeMismatch);
        }
        let fft_size = self.fft_conv.fft_size();
        let tail_len = fft_size - block_size;

        // FftConv zero-pads the block to the transform size
        self.fft_conv.convolve(input, &mut self.conv_output)?;

        for ((out, &y), &carry) in output
            .iter_mut()
            .zip(&self.conv_output[..block_size])
            .zip(&self.left_overs[..block_size])
        {
            *out = y + carry;
        }

        // Flush the emitted samples, then overlap the new tail
        self.left_overs.copy_within(block_size.., 0);
        self.left_overs[tail_len..].fill(0.0);
        for (carry, &y) in self.left_overs[..tail_len]
            .iter_mut()
            .zip(&self.conv_output[block_size..])
        {
            *carry += y;
        }

        Ok(())
    }

    fn reset(&mut self) {
        self.left_overs.fill(0.0);
    }
}
