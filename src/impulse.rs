//! Multi-channel impulse responses

use crate::utils::normalization_reference;
use crate::{AudioBuffer, AudioError, AudioResult, Sample};

#[cfg(not(feature = "std"))]
use alloc::vec;
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

/// A filter kernel with one or more channels of equal length
///
/// Two responses compare equal only if every coefficient is equal, which is
/// how the engine decides whether its cached spectra are stale.
#[derive(Debug, Clone, PartialEq)]
pub struct ImpulseResponse {
    channels: Vec<AudioBuffer>,
}

impl ImpulseResponse {
    /// Single-channel impulse response
    ///
    /// # Errors
    /// `InsufficientData` if `samples` is empty.
    pub fn mono(samples: AudioBuffer) -> AudioResult<Self> {
        Self::from_channels(vec![samples])
    }

    /// Impulse response from planar channels
    ///
    /// # Errors
    /// `InsufficientData` if there are no channels or they are empty,
    /// `BufferSizeMismatch` if channel lengths differ.
    pub fn from_channels(channels: Vec<AudioBuffer>) -> AudioResult<Self> {
        let len = channels.first().map_or(0, Vec::len);
        if len == 0 {
            return Err(AudioError::InsufficientData);
        }
        if channels.iter().any(|c| c.len() != len) {
            return Err(AudioError::BufferSizeMismatch);
        }
        Ok(Self { channels })
    }

    /// Impulse response from interleaved frames (`L, R, L, R, ...` for stereo)
    pub fn from_interleaved(samples: &[Sample], num_channels: usize) -> AudioResult<Self> {
        if num_channels == 0 || samples.is_empty() {
            return Err(AudioError::InsufficientData);
        }
        if samples.len() % num_channels != 0 {
            return Err(AudioError::BufferSizeMismatch);
        }

        let mut channels = vec![Vec::with_capacity(samples.len() / num_channels); num_channels];
        for frame in samples.chunks_exact(num_channels) {
            for (channel, &sample) in channels.iter_mut().zip(frame) {
                channel.push(sample);
            }
        }
        Self::from_channels(channels)
    }

    /// Filter length `Nh` in samples
    pub fn len(&self) -> usize {
        self.channels[0].len()
    }

    /// Always `false`: construction rejects empty responses
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Number of channels
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Coefficients of one channel
    pub fn channel(&self, index: usize) -> Option<&[Sample]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    /// All channels
    pub fn channels(&self) -> &[AudioBuffer] {
        &self.channels
    }

    /// Largest per-channel sum of absolute coefficients
    pub fn normalization_reference(&self) -> Sample {
        normalization_reference(&self.channels)
    }

    /// Same length and channel count as `other`
    pub fn same_shape(&self, other: &Self) -> bool {
        self.len() == other.len() && self.num_channels() == other.num_channels()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[cfg(not(feature = "std"))]
    use alloc::vec;

    #[test]
    fn test_mono() {
        let ir = ImpulseResponse::mono(vec![1.0, -0.5, 0.25]).unwrap();
        assert_eq!(ir.len(), 3);
        assert_eq!(ir.num_channels(), 1);
        assert_abs_diff_eq!(ir.normalization_reference(), 1.75, epsilon = 1e-6);
        assert_eq!(ImpulseResponse::mono(vec![]), Err(AudioError::InsufficientData));
    }

    #[test]
    fn test_from_interleaved() {
        let ir = ImpulseResponse::from_interleaved(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 2).unwrap();
        assert_eq!(ir.channel(0), Some(&[1.0, 3.0, 5.0][..]));
        assert_eq!(ir.channel(1), Some(&[2.0, 4.0, 6.0][..]));
        assert_eq!(ir.channel(2), None);
        assert_abs_diff_eq!(ir.normalization_reference(), 12.0, epsilon = 1e-6);

        assert_eq!(
            ImpulseResponse::from_interleaved(&[1.0, 2.0, 3.0], 2),
            Err(AudioError::BufferSizeMismatch)
        );
    }

    #[test]
    fn test_ragged_channels_rejected() {
        assert_eq!(
            ImpulseResponse::from_channels(vec![vec![1.0, 2.0], vec![1.0]]),
            Err(AudioError::BufferSizeMismatch)
        );
        assert_eq!(
            ImpulseResponse::from_channels(vec![]),
            Err(AudioError::InsufficientData)
        );
    }

    #[test]
    fn test_value_equality() {
        let a = ImpulseResponse::mono(vec![1.0, 0.5]).unwrap();
        let b = ImpulseResponse::mono(vec![1.0, 0.5]).unwrap();
        let c = ImpulseResponse::mono(vec![1.0, 0.25]).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.same_shape(&c));
    }
}
