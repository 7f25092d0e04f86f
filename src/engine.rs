//! Streaming convolution engine
//!
//! [`ConvolutionEngine`] holds the configuration, the current impulse
//! response and one [`BlockConvolver`] per channel. Filter state is built as
//! soon as an impulse response is known, either at construction or on the
//! first [`process`](ConvolutionEngine::process) call that supplies one.

use crate::convolver::BlockConvolver;
use crate::impulse::ImpulseResponse;
use crate::ola::OverlapAdd;
use crate::ols::OverlapSave;
use crate::optimize::{optimize_upols_parameters, UpolsParameters};
use crate::upols::Upols;
use crate::{AudioBuffer, AudioError, AudioResult, Sample};
use core::fmt;
use core::str::FromStr;
use realfft::RealFftPlanner;

#[cfg(not(feature = "std"))]
use alloc::boxed::Box;
#[cfg(not(feature = "std"))]
use alloc::vec;
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

/// Block convolution algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Overlap-add (`"overlap-add"`, `"ola"`)
    OverlapAdd,
    /// Overlap-save (`"overlap-save"`, `"ols"`)
    OverlapSave,
    /// Uniformly partitioned overlap-save (`"upols"`)
    Upols,
}

impl Method {
    /// Every name accepted by [`FromStr`]
    pub const NAMES: [&'static str; 5] = ["overlap-save", "overlap-add", "ols", "ola", "upols"];

    /// Canonical name
    pub fn name(&self) -> &'static str {
        match self {
            Method::OverlapAdd => "overlap-add",
            Method::OverlapSave => "overlap-save",
            Method::Upols => "upols",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Method {
    type Err = AudioError;

    /// Case-insensitive; fails with [`AudioError::UnknownMethod`]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let is = |name: &str| s.eq_ignore_ascii_case(name);
        if is("overlap-save") || is("ols") {
            Ok(Method::OverlapSave)
        } else if is("overlap-add") || is("ola") {
            Ok(Method::OverlapAdd)
        } else if is("upols") {
            Ok(Method::Upols)
        } else {
            Err(AudioError::UnknownMethod)
        }
    }
}

/// Engine configuration, fixed for the engine's lifetime
///
/// # Example
///
/// ```rust
/// use blockconv::{EngineConfig, Method};
///
/// let config = EngineConfig {
///     method: "upols".parse().unwrap(),
///     block_size: 256,
///     ..Default::default()
/// };
/// assert_eq!(config.method, Method::Upols);
/// assert!(config.normalize);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Convolution algorithm
    pub method: Method,
    /// Samples per channel consumed and produced by each `process` call
    pub block_size: usize,
    /// Fixed UPOLS partition length
    ///
    /// When `None`, the partition length and transform size are chosen by
    /// [`optimize_upols_parameters`] whenever a filter of a new length is set.
    /// Ignored by the other methods.
    pub partition_size: Option<usize>,
    /// Divide the output by the impulse response's normalization reference
    pub normalize: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            method: Method::OverlapSave,
            block_size: 512,
            partition_size: None,
            normalize: true,
        }
    }
}

/// Filter-dependent state
enum EngineState {
    /// No impulse response yet
    Uninitialized,
    Ready(ReadyState),
}

struct ReadyState {
    /// One convolver per channel
    convolvers: Vec<Box<dyn BlockConvolver>>,
    fft_size: usize,
    upols: Option<(UpolsParameters, usize)>,
    channel_input: AudioBuffer,
    channel_output: AudioBuffer,
}

/// Streaming block convolution of interleaved audio with an impulse response
///
/// Each call to [`process`](Self::process) consumes one block of
/// `block_size` frames and returns the matching block of the linear
/// convolution of the whole input stream with the current filter.
///
/// # Example
///
/// ```rust
/// use blockconv::{ConvolutionEngine, EngineConfig, ImpulseResponse, Method};
///
/// let config = EngineConfig {
///     method: Method::OverlapAdd,
///     block_size: 4,
///     partition_size: None,
///     normalize: false,
/// };
/// let ir = ImpulseResponse::mono(vec![1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0]).unwrap();
/// let mut engine = ConvolutionEngine::new(config, Some(ir)).unwrap();
///
/// let first = engine.process(&[1.0, 2.0, 3.0, 4.0], None).unwrap();
/// let second = engine.process(&[5.0, 6.0, 7.0, 8.0], None).unwrap();
/// assert!((first[3] - 4.0).abs() < 1e-4);
/// assert!((second[3] - 9.0).abs() < 1e-4);
/// ```
pub struct ConvolutionEngine {
    config: EngineConfig,
    impulse_response: Option<ImpulseResponse>,
    normalization_reference: Sample,
    state: EngineState,
}

impl ConvolutionEngine {
    /// Create an engine, building filter state now if `impulse_response` is given
    ///
    /// # Errors
    /// `InvalidBlockSize` for a zero block size, `InvalidPartitionSize` for a
    /// zero partition length, or any error from building the filter state.
    pub fn new(config: EngineConfig, impulse_response: Option<ImpulseResponse>) -> AudioResult<Self> {
        if config.block_size == 0 {
            return Err(AudioError::InvalidBlockSize);
        }
        if config.partition_size == Some(0) {
            return Err(AudioError::InvalidPartitionSize);
        }
        if config.partition_size.is_some() && config.method != Method::Upols {
            log::debug!("partition size ignored by {}", config.method);
        }

        let mut engine = Self {
            config,
            impulse_response: None,
            normalization_reference: 0.0,
            state: EngineState::Uninitialized,
        };
        if let Some(ir) = impulse_response {
            engine.set_impulse_response(&ir)?;
        }
        Ok(engine)
    }

    /// Convolve one block of interleaved frames
    ///
    /// `input` holds `block_size * num_channels` samples. If `impulse_response`
    /// is given and differs from the stored one, filter state is rebuilt before
    /// the block is processed: fully when the length or channel count changed,
    /// otherwise only the filter spectra.
    ///
    /// # Errors
    /// - `MissingImpulseResponse` if no impulse response was ever supplied
    /// - `BufferSizeMismatch` / `ChannelMismatch` if `input` has the wrong shape
    ///
    /// Shape errors are reported before any state changes.
    pub fn process(
        &mut self,
        input: &[Sample],
        impulse_response: Option<&ImpulseResponse>,
    ) -> AudioResult<AudioBuffer> {
        let num_channels = match (impulse_response, &self.impulse_response) {
            (Some(ir), _) | (None, Some(ir)) => ir.num_channels(),
            (None, None) => return Err(AudioError::MissingImpulseResponse),
        };
        self.check_block(input, num_channels)?;

        if let Some(ir) = impulse_response {
            self.set_impulse_response(ir)?;
        }

        let mut output = vec![0.0; input.len()];
        self.process_into(input, &mut output)?;
        Ok(output)
    }

    /// Convolve one block into a caller-provided buffer of the same shape
    ///
    /// Does not allocate once the filter state is built.
    pub fn process_into(&mut self, input: &[Sample], output: &mut [Sample]) -> AudioResult<()> {
        let scale = self.output_scale();
        let ready = match &mut self.state {
            EngineState::Ready(ready) => ready,
            EngineState::Uninitialized => return Err(AudioError::MissingImpulseResponse),
        };

        let num_channels = ready.convolvers.len();
        Self::check_shape(input.len(), self.config.block_size, num_channels)?;
        if output.len() != input.len() {
            return Err(AudioError::BufferSizeMismatch);
        }

        for (channel, convolver) in ready.convolvers.iter_mut().enumerate() {
            for (sample, frame) in ready
                .channel_input
                .iter_mut()
                .zip(input.chunks_exact(num_channels))
            {
                *sample = frame[channel];
            }

            convolver.process_block(&ready.channel_input, &mut ready.channel_output)?;

            for (frame, &y) in output
                .chunks_exact_mut(num_channels)
                .zip(&ready.channel_output)
            {
                frame[channel] = match scale {
                    Some(reference) => y / reference,
                    None => y,
                };
            }
        }

        Ok(())
    }

    /// Store a new impulse response, rebuilding filter state if it changed
    ///
    /// An identical response (compared by value) is a no-op, so passing the
    /// same filter with every block costs one comparison and no transforms.
    pub fn set_impulse_response(&mut self, impulse_response: &ImpulseResponse) -> AudioResult<()> {
        if self.impulse_response.as_ref() == Some(impulse_response) {
            return Ok(());
        }

        let same_shape = self
            .impulse_response
            .as_ref()
            .map_or(false, |stored| stored.same_shape(impulse_response));

        let updated_in_place = match &mut self.state {
            EngineState::Ready(ready) if same_shape => {
                for (convolver, channel) in ready
                    .convolvers
                    .iter_mut()
                    .zip(impulse_response.channels())
                {
                    convolver.update_filter(channel)?;
                }
                log::debug!("impulse response updated in place");
                true
            }
            _ => false,
        };
        if !updated_in_place {
            self.state = EngineState::Ready(Self::build_state(&self.config, impulse_response)?);
        }

        self.normalization_reference = impulse_response.normalization_reference();
        self.impulse_response = Some(impulse_response.clone());
        Ok(())
    }

    /// Clear all input history and pending tails, keeping the filter
    pub fn reset(&mut self) {
        if let EngineState::Ready(ready) = &mut self.state {
            for convolver in &mut ready.convolvers {
                convolver.reset();
            }
        }
    }

    /// Configured algorithm
    pub fn method(&self) -> Method {
        self.config.method
    }

    /// Frames per block
    pub fn block_size(&self) -> usize {
        self.config.block_size
    }

    /// Engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Whether filter state has been built
    pub fn is_ready(&self) -> bool {
        matches!(self.state, EngineState::Ready(_))
    }

    /// Current impulse response
    pub fn impulse_response(&self) -> Option<&ImpulseResponse> {
        self.impulse_response.as_ref()
    }

    /// Channels per frame, once an impulse response is set
    pub fn num_channels(&self) -> Option<usize> {
        self.impulse_response.as_ref().map(ImpulseResponse::num_channels)
    }

    /// Transform size in use
    pub fn fft_size(&self) -> Option<usize> {
        match &self.state {
            EngineState::Ready(ready) => Some(ready.fft_size),
            EngineState::Uninitialized => None,
        }
    }

    /// UPOLS partition length in use
    pub fn partition_size(&self) -> Option<usize> {
        match &self.state {
            EngineState::Ready(ReadyState {
                upols: Some((params, _)),
                ..
            }) => Some(params.partition_size),
            _ => None,
        }
    }

    /// UPOLS partition count in use
    pub fn num_partitions(&self) -> Option<usize> {
        match &self.state {
            EngineState::Ready(ReadyState {
                upols: Some((_, count)),
                ..
            }) => Some(*count),
            _ => None,
        }
    }

    /// Largest per-channel sum of absolute filter coefficients (0 before a
    /// filter is set)
    pub fn normalization_reference(&self) -> Sample {
        self.normalization_reference
    }

    fn output_scale(&self) -> Option<Sample> {
        // an all-zero filter outputs silence either way
        (self.config.normalize && self.normalization_reference > 0.0)
            .then_some(self.normalization_reference)
    }

    fn check_block(&self, input: &[Sample], num_channels: usize) -> AudioResult<()> {
        Self::check_shape(input.len(), self.config.block_size, num_channels)
    }

    fn check_shape(len: usize, block_size: usize, num_channels: usize) -> AudioResult<()> {
        if len == block_size * num_channels {
            Ok(())
        } else if len > 0 && len % block_size == 0 {
            Err(AudioError::ChannelMismatch)
        } else {
            Err(AudioError::BufferSizeMismatch)
        }
    }

    fn build_state(config: &EngineConfig, impulse_response: &ImpulseResponse) -> AudioResult<ReadyState> {
        let block_size = config.block_size;
        let mut planner = RealFftPlanner::new();
        let mut convolvers: Vec<Box<dyn BlockConvolver>> =
            Vec::with_capacity(impulse_response.num_channels());
        let mut upols = None;

        match config.method {
            Method::OverlapAdd => {
                for channel in impulse_response.channels() {
                    convolvers.push(Box::new(OverlapAdd::new(&mut planner, channel, block_size)?));
                }
            }
            Method::OverlapSave => {
                for channel in impulse_response.channels() {
                    convolvers.push(Box::new(OverlapSave::new(&mut planner, channel, block_size)?));
                }
            }
            Method::Upols => {
                let params = match config.partition_size {
                    Some(partition_size) => UpolsParameters::for_partition(partition_size, block_size)?,
                    None => optimize_upols_parameters(impulse_response.len(), block_size)?,
                };
                let mut num_partitions = 0;
                for channel in impulse_response.channels() {
                    let convolver = Upols::new(&mut planner, channel, block_size, params)?;
                    num_partitions = convolver.num_partitions();
                    convolvers.push(Box::new(convolver));
                }
                upols = Some((params, num_partitions));
            }
        }

        let fft_size = convolvers.first().map_or(0, |c| c.fft_size());
        log::debug!(
            "{} engine ready: B={} N={} channels={} NFFT={}",
            config.method,
            block_size,
            impulse_response.len(),
            impulse_response.num_channels(),
            fft_size
        );

        Ok(ReadyState {
            convolvers,
            fft_size,
            upols,
            channel_input: vec![0.0; block_size],
            channel_output: vec![0.0; block_size],
        })
    }
}
