//! Buffer helpers shared by the block convolvers
//!
//! Padding, integer helpers used to size transforms, and the worst-case gain
//! reference used for output normalization.

use crate::{AudioBuffer, Sample};

#[cfg(not(feature = "std"))]
use alloc::vec;

/// Find the next power of two greater than or equal to n
pub fn next_power_of_two(n: usize) -> usize {
    if n == 0 {
        return 1;
    }
    let mut power = 1;
    while power < n {
        power *= 2;
    }
    power
}

/// Greatest common divisor (Euclid). `gcd(0, n) == n`.
pub fn gcd(mut a: usize, mut b: usize) -> usize {
    while b != 0 {
        let r = a % b;
        a = b;
        b = r;
    }
    a
}

/// Integer base-2 logarithm, rounded down. Returns 0 for 0 and 1.
pub fn floor_log2(n: usize) -> u32 {
    if n <= 1 {
        0
    } else {
        usize::BITS - 1 - n.leading_zeros()
    }
}

/// Zero-pad `x` at the end up to `new_length` samples
///
/// Buffers already at least `new_length` long are returned unchanged (never truncated).
pub fn pad_end(x: &[Sample], new_length: usize) -> AudioBuffer {
    let mut output = x.to_vec();
    if output.len() < new_length {
        output.resize(new_length, 0.0);
    }
    output
}

/// Prepend `padding` zeros to `x`
pub fn pad_beginning(x: &[Sample], padding: usize) -> AudioBuffer {
    let mut output = vec![0.0; padding + x.len()];
    output[padding..].copy_from_slice(x);
    output
}

/// Shift `buffer` left by `shift` samples and write `block` into the freed tail
///
/// This is the sliding input window used by overlap-save style convolvers.
/// `block.len()` must equal `shift`.
pub fn slide_window(buffer: &mut [Sample], block: &[Sample]) {
    let shift = block.len();
    let len = buffer.len();
    debug_assert!(shift <= len);
    buffer.copy_within(shift.., 0);
    buffer[len - shift..].copy_from_slice(block);
}

/// Sum of absolute coefficient values of one channel
///
/// The largest output a unit-amplitude input can produce through this filter.
pub fn absolute_sum(channel: &[Sample]) -> Sample {
    channel.iter().map(|&x| x.abs()).sum()
}

/// Worst-case gain over all channels of an impulse response
///
/// Dividing the filtered signal by this reference keeps any input in `[-1, 1]`
/// inside `[-1, 1]`.
pub fn normalization_reference<T>(channels: &[T]) -> Sample
where
    T: AsRef<[Sample]>,
{
    channels
        .iter()
        .map(|c| absolute_sum(c.as_ref()))
        .fold(0.0, Sample::max)
}

/// Calculate peak amplitude of a buffer
pub fn calculate_peak(buffer: &[Sample]) -> Sample {
    buffer.iter().map(|&x| x.abs()).fold(0.0, f32::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[cfg(not(feature = "std"))]
    use alloc::{vec, vec::Vec};

    #[test]
    fn test_next_power_of_two() {
        assert_eq!(next_power_of_two(0), 1);
        assert_eq!(next_power_of_two(1), 1);
        assert_eq!(next_power_of_two(5), 8);
        assert_eq!(next_power_of_two(64), 64);
        assert_eq!(next_power_of_two(65), 128);
    }

    #[test]
    fn test_gcd() {
        assert_eq!(gcd(12, 18), 6);
        assert_eq!(gcd(4, 512), 4);
        assert_eq!(gcd(7, 3), 1);
        assert_eq!(gcd(0, 9), 9);
        assert_eq!(gcd(9, 0), 9);
    }

    #[test]
    fn test_floor_log2() {
        assert_eq!(floor_log2(0), 0);
        assert_eq!(floor_log2(1), 0);
        assert_eq!(floor_log2(2), 1);
        assert_eq!(floor_log2(7), 2);
        assert_eq!(floor_log2(8), 3);
        assert_eq!(floor_log2(1000), 9);
    }

    #[test]
    fn test_pad_end() {
        assert_eq!(pad_end(&[1.0, 2.0], 4), vec![1.0, 2.0, 0.0, 0.0]);
        // never truncates
        assert_eq!(pad_end(&[1.0, 2.0, 3.0], 2), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_pad_beginning() {
        assert_eq!(pad_beginning(&[1.0, 2.0], 3), vec![0.0, 0.0, 0.0, 1.0, 2.0]);
        assert_eq!(pad_beginning(&[1.0], 0), vec![1.0]);
    }

    #[test]
    fn test_slide_window() {
        let mut window = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        slide_window(&mut window, &[6.0, 7.0]);
        assert_eq!(window, vec![3.0, 4.0, 5.0, 6.0, 7.0]);

        // block as long as the window replaces it entirely
        slide_window(&mut window, &[0.0; 5]);
        assert_eq!(window, vec![0.0; 5]);
    }

    #[test]
    fn test_normalization_reference() {
        let left = vec![0.5, -0.25, 0.25];
        let right = vec![-1.0, 0.5, 0.0];
        let channels: Vec<Vec<f32>> = vec![left, right];
        assert_abs_diff_eq!(normalization_reference(&channels), 1.5, epsilon = 1e-6);

        let empty: Vec<Vec<f32>> = Vec::new();
        assert_abs_diff_eq!(normalization_reference(&empty), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_calculate_peak() {
        assert_abs_diff_eq!(calculate_peak(&[0.5, -1.0, 0.25]), 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(calculate_peak(&[]), 0.0, epsilon = 1e-6);
    }
}
