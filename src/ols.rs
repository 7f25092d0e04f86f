//! Overlap-save block convolution
//!
//! Keeps a sliding window of the last `B + N - 1` input samples. Each block is
//! appended to the window, the whole window is convolved, and only the last
//! `B` samples (the part unaffected by circular wrap-around) are kept.

use crate::convolver::BlockConvolver;
use crate::fft_conv::FftConv;
use crate::utils::slide_window;
use crate::{AudioBuffer, AudioError, AudioResult, Sample};
use realfft::RealFftPlanner;

#[cfg(not(feature = "std"))]
use alloc::vec;

/// Streaming overlap-save convolver
pub struct OverlapSave {
    block_size: usize,
    filter_len: usize,
    fft_conv: FftConv,
    /// Most recent `fft_size` input samples, newest last
    input_ring: AudioBuffer,
    conv_output: AudioBuffer,
}

impl OverlapSave {
    /// Create an overlap-save convolver for `impulse_response`
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
            input_ring: vec![0.0; fft_size],
            conv_output: vec![0.0; fft_size],
        })
    }

    /// Window length needed for `B` alias-free outputs: `B + N - 1`
    pub fn fft_size_for(block_size: usize, filter_len: usize) -> usize {
        block_size + filter_len - 1
    }
}

impl BlockConvolver for OverlapSave {
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
        if input.len() != self.block_size || output.len() != self.block_size {
            return Err(AudioError::BufferSizeMismatch);
        }

        slide_window(&mut self.input_ring, input);
        self.fft_conv
            .convolve(&self.input_ring, &mut self.conv_output)?;

        let valid_start = self.conv_output.len() - self.block_size;
        output.copy_from_slice(&self.conv_output[valid_start..]);
        Ok(())
    }

    fn reset(&mut self) {
        self.input_ring.fill(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convolve::time_convolve;
    use approx::assert_abs_diff_eq;

    #[cfg(not(feature = "std"))]
    use alloc::{vec, vec::Vec};

    #[test]
    fn test_ols_matches_direct() {
        let mut planner = RealFftPlanner::new();
        let ir = vec![0.5, -0.3, 0.2, 0.1, -0.05];
        let signal: Vec<Sample> = (0..40).map(|i| ((i * 3) % 7) as Sample * 0.25 - 0.75).collect();
        let block_size = 8;

        let mut ols = OverlapSave::new(&mut planner, &ir, block_size).unwrap();
        assert_eq!(ols.fft_size(), 12);

        let mut output = vec![0.0; signal.len()];
        for (input, out) in signal
            .chunks_exact(block_size)
            .zip(output.chunks_exact_mut(block_size))
        {
            ols.process_block(input, out).unwrap();
        }

        let expected = time_convolve(&signal, &ir).unwrap();
        for (o, e) in output.iter().zip(expected.iter()) {
            assert_abs_diff_eq!(o, e, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_ols_filter_update_keeps_history() {
        let mut planner = RealFftPlanner::new();
        let mut ols = OverlapSave::new(&mut planner, &[1.0, 0.0, 0.0], 2).unwrap();
        let mut out = vec![0.0; 2];

        ols.process_block(&[1.0, 2.0], &mut out).unwrap();
        assert_abs_diff_eq!(out[0], 1.0, epsilon = 1e-5);
        assert_abs_diff_eq!(out[1], 2.0, epsilon = 1e-5);

        // a pure two-sample delay sees the previous block
        ols.update_filter(&[0.0, 0.0, 1.0]).unwrap();
        ols.process_block(&[3.0, 4.0], &mut out).unwrap();
        assert_abs_diff_eq!(out[0], 1.0, epsilon = 1e-5);
        assert_abs_diff_eq!(out[1], 2.0, epsilon = 1e-5);
    }

    #[test]
    fn test_ols_reset_clears_window() {
        let mut planner = RealFftPlanner::new();
        let mut ols = OverlapSave::new(&mut planner, &[0.0, 1.0], 1).unwrap();
        let mut out = vec![0.0; 1];
        ols.process_block(&[5.0], &mut out).unwrap();
        ols.reset();
        ols.process_block(&[0.0], &mut out).unwrap();
        assert_abs_diff_eq!(out[0], 0.0, epsilon = 1e-6);
    }
}
