//! Uniformly partitioned overlap-save convolution
//!
//! The filter is cut into `P` sub-filters of `L` samples. Sub-filter `m`
//! belongs `m * L` samples late; that delay is split into a whole number of
//! blocks, served by reading an older spectrum from the frequency delay line
//! (FDL), and a remainder `(m * L) mod B` baked into the sub-filter as leading
//! zeros. All products are summed in the frequency domain, so one inverse
//! transform per block covers the whole filter.

use crate::convolver::BlockConvolver;
use crate::fft_conv::{multiply_accumulate, FftConv, Spectrum};
use crate::optimize::UpolsParameters;
use crate::utils::{gcd, pad_beginning, pad_end, slide_window};
use crate::{AudioBuffer, AudioError, AudioResult, Sample};
use realfft::RealFftPlanner;

#[cfg(not(feature = "std"))]
use alloc::vec;
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

/// Streaming UPOLS convolver
///
/// # Example
///
/// ```rust
/// use blockconv::convolver::BlockConvolver;
/// use blockconv::optimize::UpolsParameters;
/// use blockconv::upols::Upols;
/// use realfft::RealFftPlanner;
///
/// let ir = vec![0.0; 1000];
/// let params = UpolsParameters::for_partition(128, 64).unwrap();
/// let mut planner = RealFftPlanner::new();
/// let upols = Upols::new(&mut planner, &ir, 64, params).unwrap();
/// assert_eq!(upols.num_partitions(), 8);
/// assert_eq!(upols.active_slots()[3], 6);
/// ```
pub struct Upols {
    block_size: usize,
    partition_size: usize,
    filter_len: usize,
    fft_conv: FftConv,
    /// One spectrum per sub-filter (`H`)
    filter_partitions: Vec<Spectrum>,
    /// FDL row each sub-filter multiplies against
    active_slots: Vec<usize>,
    /// Spectra of recent input windows, newest in row 0
    fdl: Vec<Spectrum>,
    input_ring: AudioBuffer,
    accumulator: Spectrum,
    conv_output: AudioBuffer,
}

impl Upols {
    /// Partition `impulse_response` and allocate the delay line
    ///
    /// # Errors
    /// `InvalidPartitionSize` if `params.fft_size` cannot hold a block, a
    /// partition and the largest remainder delay without aliasing.
    pub fn new(
        planner: &mut RealFftPlanner<Sample>,
        impulse_response: &[Sample],
        block_size: usize,
        params: UpolsParameters,
    ) -> AudioResult<Self> {
        if block_size == 0 {
            return Err(AudioError::InvalidBlockSize);
        }
        if impulse_response.is_empty() {
            return Err(AudioError::InsufficientData);
        }
        let UpolsParameters {
            partition_size,
            fft_size,
        } = params;
        if partition_size == 0 {
            return Err(AudioError::InvalidPartitionSize);
        }
        let max_delay = block_size - gcd(partition_size, block_size);
        if fft_size + 1 < block_size + partition_size + max_delay {
            return Err(AudioError::InvalidPartitionSize);
        }

        let num_partitions = impulse_response.len().div_ceil(partition_size);
        let active_slots: Vec<usize> = (0..num_partitions)
            .map(|m| m * partition_size / block_size)
            .collect();
        let fdl_depth = active_slots.iter().copied().max().unwrap_or(0) + 1;

        let fft_conv = FftConv::new(planner, fft_size)?;
        let spectrum = fft_conv.make_spectrum();

        let mut upols = Self {
            block_size,
            partition_size,
            filter_len: impulse_response.len(),
            filter_partitions: vec![spectrum.clone(); num_partitions],
            active_slots,
            fdl: vec![spectrum.clone(); fdl_depth],
            input_ring: vec![0.0; fft_size],
            accumulator: spectrum,
            conv_output: vec![0.0; fft_size],
            fft_conv,
        };
        upols.partition_filter(impulse_response)?;

        log::debug!(
            "UPOLS setup: N={} B={} L={} P={} NFFT={} FDL rows={}",
            upols.filter_len,
            block_size,
            partition_size,
            num_partitions,
            fft_size,
            fdl_depth
        );
        Ok(upols)
    }

    /// Sub-filter length `L`
    pub fn partition_size(&self) -> usize {
        self.partition_size
    }

    /// Number of sub-filters `P = ceil(N / L)`
    pub fn num_partitions(&self) -> usize {
        self.filter_partitions.len()
    }

    /// `active_slots()[m] == m * L / B`
    pub fn active_slots(&self) -> &[usize] {
        &self.active_slots
    }

    /// Rows in the frequency delay line
    pub fn fdl_depth(&self) -> usize {
        self.fdl.len()
    }

    /// Transform every sub-filter into its row of `H`
    fn partition_filter(&mut self, impulse_response: &[Sample]) -> AudioResult<()> {
        let l = self.partition_size;
        for (m, (partition, spectrum)) in impulse_response
            .chunks(l)
            .zip(self.filter_partitions.iter_mut())
            .enumerate()
        {
            // the last partition may be short
            let sub_filter = pad_end(partition, l);
            let remainder_delay = (m * l) % self.block_size;
            let delayed = pad_beginning(&sub_filter, remainder_delay);
            self.fft_conv.forward(&delayed, spectrum)?;
        }
        Ok(())
    }
}

impl BlockConvolver for Upols {
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
        self.partition_filter(impulse_response)
    }

    fn process_block(&mut self, input: &[Sample], output: &mut [Sample]) -> AudioResult<()> {
        if input.len() != self.block_size || output.len() != self.block_size {
            return Err(AudioError::BufferSizeMismatch);
        }

        slide_window(&mut self.input_ring, input);

        // Age the delay line by one block; the oldest row is recycled as row 0
        self.fdl.rotate_right(1);
        self.fft_conv.forward(&self.input_ring, &mut self.fdl[0])?;

        self.accumulator.fill(Default::default());
        for (h, &slot) in self.filter_partitions.iter().zip(&self.active_slots) {
            multiply_accumulate(&mut self.accumulator, &self.fdl[slot], h);
        }

        self.fft_conv
            .inverse(&mut self.accumulator, &mut self.conv_output)?;

        let valid_start = self.conv_output.len() - self.block_size;
        output.copy_from_slice(&self.conv_output[valid_start..]);
        Ok(())
    }

    fn reset(&mut self) {
        self.input_ring.fill(0.0);
        for row in &mut self.fdl {
            row.fill(Default::default());
        }
    }
}
