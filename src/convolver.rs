//! Common interface of the streaming block convolvers

use crate::{AudioResult, Sample};

/// A single-channel streaming convolver consuming exactly one block per call
///
/// Implementations own all of their history and must produce, block after
/// block, the linear convolution of the whole input stream with the filter.
pub trait BlockConvolver: Send {
    /// Samples consumed and produced per call
    fn block_size(&self) -> usize;

    /// Transform size used internally
    fn fft_size(&self) -> usize;

    /// Length of the filter this convolver was built for
    fn filter_len(&self) -> usize;

    /// Replace the filter with another one of the same length
    ///
    /// Input history is kept, so output continues as the linear convolution
    /// of the past input with the new filter.
    fn update_filter(&mut self, impulse_response: &[Sample]) -> AudioResult<()>;

    /// Convolve one block, writing `block_size` samples into `output`
    fn process_block(&mut self, input: &[Sample], output: &mut [Sample]) -> AudioResult<()>;

    /// Clear all input history and pending tails
    fn reset(&mut self);
}
