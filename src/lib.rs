#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![doc = include_str!("../README.md")]

pub mod convolve;
pub mod convolver;
pub mod engine;
pub mod fft_conv;
pub mod impulse;
pub mod ola;
pub mod ols;
pub mod optimize;
pub mod upols;
pub mod utils;

#[cfg(feature = "wasm")]
pub mod wasm;

pub use convolver::BlockConvolver;
pub use engine::{ConvolutionEngine, EngineConfig, Method};
pub use impulse::ImpulseResponse;
pub use optimize::{optimize_upols_parameters, UpolsParameters};

#[cfg(not(feature = "std"))]
extern crate alloc;

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

/// Audio sample type (32-bit float).
pub type Sample = f32;

/// Buffer of audio samples.
pub type AudioBuffer = Vec<Sample>;

/// Audio processing errors.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioError {
    /// Input buffer sizes do not match expected dimensions.
    BufferSizeMismatch,
    /// Input channel count differs from the impulse response's.
    ChannelMismatch,
    /// Not enough data provided for the requested operation.
    InsufficientData,
    /// An error occurred during FFT processing.
    FftError,
    /// Convolution method name not recognised.
    UnknownMethod,
    /// Block size must be positive.
    InvalidBlockSize,
    /// Partition size must be positive and fit the transform.
    InvalidPartitionSize,
    /// No impulse response has been supplied yet.
    MissingImpulseResponse,
}

impl core::fmt::Display for AudioError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            AudioError::BufferSizeMismatch => write!(f, "Buffer size mismatch"),
            AudioError::ChannelMismatch => write!(f, "Channel count mismatch"),
            AudioError::InsufficientData => write!(f, "Insufficient data"),
            AudioError::FftError => write!(f, "FFT processing error"),
            AudioError::UnknownMethod => {
                write!(f, "Unknown convolution method, supported methods are: ")?;
                for (i, name) in Method::NAMES.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    f.write_str(name)?;
                }
                Ok(())
            }
            AudioError::InvalidBlockSize => write!(f, "Invalid block size"),
            AudioError::InvalidPartitionSize => write!(f, "Invalid partition size"),
            AudioError::MissingImpulseResponse => write!(f, "No impulse response supplied"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for AudioError {}

/// Result type for audio processing operations
pub type AudioResult<T> = Result<T, AudioError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(feature = "std")]
    #[test]
    fn test_audio_error_display() {
        assert_eq!(
            AudioError::BufferSizeMismatch.to_string(),
            "Buffer size mismatch"
        );
        assert_eq!(
            AudioError::InsufficientData.to_string(),
            "Insufficient data"
        );
        assert_eq!(AudioError::FftError.to_string(), "FFT processing error");
        assert_eq!(
            AudioError::UnknownMethod.to_string(),
            "Unknown convolution method, supported methods are: \
             overlap-save, overlap-add, ols, ola, upols"
        );
        assert_eq!(
            AudioError::MissingImpulseResponse.to_string(),
            "No impulse response supplied"
        );
    }

    #[test]
    fn test_audio_error_clone() {
        let err = AudioError::ChannelMismatch;
        let cloned = err.clone();
        assert_eq!(err, cloned);
    }
}
