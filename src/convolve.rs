//! One-shot convolution of complete signals
//!
//! Reference implementations used to validate the streaming convolvers, and a
//! convenience for offline callers that hold the whole signal in memory.

use crate::fft_conv::FftConv;
use crate::{utils::next_power_of_two, AudioBuffer, AudioError, AudioResult, Sample};
use realfft::RealFftPlanner;

#[cfg(not(feature = "std"))]
use alloc::vec;

/// Perform FFT-based convolution
///
/// Output length is `signal.len() + kernel.len() - 1`.
///
/// # Example
///
/// ```rust
/// use blockconv::convolve;
///
/// let signal = vec![1.0, 2.0, 3.0, 4.0];
/// let kernel = vec![0.5, 0.3, 0.1];
/// let result = convolve::fft_convolve(&signal, &kernel).unwrap();
/// assert_eq!(result.len(), 6);
/// ```
pub fn fft_convolve(signal: &[Sample], kernel: &[Sample]) -> AudioResult<AudioBuffer> {
    if signal.is_empty() || kernel.is_empty() {
        return Err(AudioError::InsufficientData);
    }

    let output_length = signal.len() + kernel.len() - 1;
    let fft_size = next_power_of_two(output_length);

    let mut planner = RealFftPlanner::new();
    let mut conv = FftConv::new(&mut planner, fft_size)?;
    conv.set_kernel(kernel)?;

    let mut output = vec![0.0; fft_size];
    conv.convolve(signal, &mut output)?;
    output.truncate(output_length);

    Ok(output)
}

/// Perform time-domain convolution
///
/// O(N·M) direct form. This is the ground truth the block convolvers are
/// checked against.
///
/// # Example
///
/// ```rust
/// use blockconv::convolve;
///
/// let result = convolve::time_convolve(&[1.0, 2.0], &[1.0, 1.0]).unwrap();
/// assert_eq!(result, vec![1.0, 3.0, 2.0]);
/// ```
pub fn time_convolve(signal: &[Sample], kernel: &[Sample]) -> AudioResult<AudioBuffer> {
    if signal.is_empty() || kernel.is_empty() {
        return Err(AudioError::InsufficientData);
    }

    let output_length = signal.len() + kernel.len() - 1;
    let mut output = vec![0.0; output_length];

    for (i, &sig_sample) in signal.iter().enumerate() {
        for (j, &kernel_sample) in kernel.iter().enumerate() {
            output[i + j] += sig_sample * kernel_sample;
        }
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[cfg(not(feature = "std"))]
    use alloc::vec;

    #[test]
    fn test_fft_convolution_basic() {
        let signal = vec![1.0, 0.0, 0.0, 0.0];
        let kernel = vec![1.0, 0.5, 0.25];

        let result = fft_convolve(&signal, &kernel).unwrap();
        let expected = vec![1.0, 0.5, 0.25, 0.0, 0.0, 0.0];

        assert_eq!(result.len(), expected.len());
        for (r, e) in result.iter().zip(expected.iter()) {
            assert_abs_diff_eq!(r, e, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_fft_vs_time_convolution() {
        let signal = vec![1.0, 2.0, 3.0, 4.0, -1.0, 0.5];
        let kernel = vec![0.5, 0.3, 0.1];

        let fft_result = fft_convolve(&signal, &kernel).unwrap();
        let time_result = time_convolve(&signal, &kernel).unwrap();

        assert_eq!(fft_result.len(), time_result.len());
        for (fft, time) in fft_result.iter().zip(time_result.iter()) {
            assert_abs_diff_eq!(fft, time, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_empty_inputs() {
        assert_eq!(
            fft_convolve(&[], &[1.0]),
            Err(AudioError::InsufficientData)
        );
        assert_eq!(
            time_convolve(&[1.0], &[]),
            Err(AudioError::InsufficientData)
        );
    }
}
