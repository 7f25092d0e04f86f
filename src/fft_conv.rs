//! Frequency-domain multiply primitive shared by every block convolver
//!
//! [`FftConv`] owns a planned real FFT pair of a fixed size together with the
//! spectrum of the current kernel. The kernel spectrum is cached: it is only
//! recomputed after [`FftConv::set_kernel`] stores a new kernel, never per block.

use crate::{AudioBuffer, AudioError, AudioResult, Sample};
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};
use rustfft::num_complex::Complex;

#[cfg(not(feature = "std"))]
use alloc::sync::Arc;
#[cfg(not(feature = "std"))]
use alloc::vec;
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

#[cfg(feature = "std")]
use std::sync::Arc;

/// Half spectrum produced by a real FFT (`fft_size / 2 + 1` bins)
pub type Spectrum = Vec<Complex<Sample>>;

/// Fixed-size FFT convolution against a cached kernel spectrum
///
/// # Example
///
/// ```rust
/// use blockconv::fft_conv::FftConv;
/// use realfft::RealFftPlanner;
///
/// let mut planner = RealFftPlanner::new();
/// let mut conv = FftConv::new(&mut planner, 8).unwrap();
/// conv.set_kernel(&[1.0, 0.5]).unwrap();
///
/// let mut out = vec![0.0; 8];
/// conv.convolve(&[1.0, 0.0, 0.0, 0.0], &mut out).unwrap();
/// assert!((out[1] - 0.5).abs() < 1e-6);
/// ```
pub struct FftConv {
    fft_size: usize,
    r2c: Arc<dyn RealToComplex<Sample>>,
    c2r: Arc<dyn ComplexToReal<Sample>>,
    /// Zero-padded copy of the forward input (realfft consumes its input)
    time_buffer: AudioBuffer,
    spectrum_buffer: Spectrum,
    forward_scratch: Vec<Complex<Sample>>,
    inverse_scratch: Vec<Complex<Sample>>,
    kernel: AudioBuffer,
    kernel_spectrum: Spectrum,
    kernel_changed: bool,
    kernel_transforms: usize,
}

impl FftConv {
    /// Plan a forward/inverse real FFT pair of `fft_size` points
    ///
    /// Plans are shared through the planner, so several convolvers of the same
    /// size only pay for planning once.
    pub fn new(planner: &mut RealFftPlanner<Sample>, fft_size: usize) -> AudioResult<Self> {
        if fft_size == 0 {
            return Err(AudioError::InsufficientData);
        }

        let r2c = planner.plan_fft_forward(fft_size);
        let c2r = planner.plan_fft_inverse(fft_size);
        let num_bins = fft_size / 2 + 1;

        Ok(Self {
            fft_size,
            time_buffer: r2c.make_input_vec(),
            spectrum_buffer: r2c.make_output_vec(),
            forward_scratch: r2c.make_scratch_vec(),
            inverse_scratch: c2r.make_scratch_vec(),
            r2c,
            c2r,
            kernel: Vec::new(),
            kernel_spectrum: vec![Complex::new(0.0, 0.0); num_bins],
            kernel_changed: false,
            kernel_transforms: 0,
        })
    }

    /// Transform size in samples
    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Number of complex bins in a spectrum of this size
    pub fn num_bins(&self) -> usize {
        self.fft_size / 2 + 1
    }

    /// A zeroed spectrum of the right length
    pub fn make_spectrum(&self) -> Spectrum {
        vec![Complex::new(0.0, 0.0); self.num_bins()]
    }

    /// Store a new time-domain kernel
    ///
    /// The spectrum is rebuilt lazily by the next [`convolve`](Self::convolve).
    ///
    /// # Errors
    /// `BufferSizeMismatch` if the kernel does not fit in one transform.
    pub fn set_kernel(&mut self, kernel: &[Sample]) -> AudioResult<()> {
        if kernel.len() > self.fft_size {
            return Err(AudioError::BufferSizeMismatch);
        }
        self.kernel.clear();
        self.kernel.extend_from_slice(kernel);
        self.kernel_changed = true;
        Ok(())
    }

    /// Whether the cached kernel spectrum is stale
    pub fn kernel_changed(&self) -> bool {
        self.kernel_changed
    }

    /// How many times the kernel spectrum has been computed
    pub fn kernel_transform_count(&self) -> usize {
        self.kernel_transforms
    }

    /// Forward real FFT of `input`, zero-padded to the transform size
    ///
    /// # Errors
    /// `BufferSizeMismatch` if `input` is longer than the transform or `output`
    /// is not exactly [`num_bins`](Self::num_bins) long.
    pub fn forward(&mut self, input: &[Sample], output: &mut [Complex<Sample>]) -> AudioResult<()> {
        Self::transform(
            &*self.r2c,
            &mut self.time_buffer,
            &mut self.forward_scratch,
            input,
            output,
        )
    }

    /// Inverse real FFT of `spectrum` into `output`, scaled by `1 / fft_size`
    ///
    /// `spectrum` is used as scratch and holds garbage afterwards.
    pub fn inverse(
        &mut self,
        spectrum: &mut [Complex<Sample>],
        output: &mut [Sample],
    ) -> AudioResult<()> {
        Self::inverse_transform(
            &*self.c2r,
            &mut self.inverse_scratch,
            self.fft_size,
            spectrum,
            output,
        )
    }

    /// Circular convolution of `window` with the kernel, written to `output`
    ///
    /// `window` is zero-padded to the transform size; `output` must hold exactly
    /// `fft_size` samples.
    pub fn convolve(&mut self, window: &[Sample], output: &mut [Sample]) -> AudioResult<()> {
        if self.kernel_changed {
            Self::transform(
                &*self.r2c,
                &mut self.time_buffer,
                &mut self.forward_scratch,
                &self.kernel,
                &mut self.kernel_spectrum,
            )?;
            self.kernel_changed = false;
            self.kernel_transforms += 1;
        }

        Self::transform(
            &*self.r2c,
            &mut self.time_buffer,
            &mut self.forward_scratch,
            window,
            &mut self.spectrum_buffer,
        )?;

        for (bin, &h) in self.spectrum_buffer.iter_mut().zip(&self.kernel_spectrum) {
            *bin *= h;
        }

        Self::inverse_transform(
            &*self.c2r,
            &mut self.inverse_scratch,
            self.fft_size,
            &mut self.spectrum_buffer,
            output,
        )
    }

    fn transform(
        r2c: &dyn RealToComplex<Sample>,
        time_buffer: &mut [Sample],
        scratch: &mut [Complex<Sample>],
        input: &[Sample],
        output: &mut [Complex<Sample>],
    ) -> AudioResult<()> {
        if input.len() > time_buffer.len() || output.len() != time_buffer.len() / 2 + 1 {
            return Err(AudioError::BufferSizeMismatch);
        }

        time_buffer[..input.len()].copy_from_slice(input);
        time_buffer[input.len()..].fill(0.0);

        r2c.process_with_scratch(time_buffer, output, scratch)
            .map_err(|_| AudioError::FftError)
    }

    fn inverse_transform(
        c2r: &dyn ComplexToReal<Sample>,
        scratch: &mut [Complex<Sample>],
        fft_size: usize,
        spectrum: &mut [Complex<Sample>],
        output: &mut [Sample],
    ) -> AudioResult<()> {
        if output.len() != fft_size || spectrum.len() != fft_size / 2 + 1 {
            return Err(AudioError::BufferSizeMismatch);
        }

        // Spectrum of a real signal: DC (and Nyquist for even sizes) are real
        spectrum[0].im = 0.0;
        if fft_size % 2 == 0 {
            if let Some(last) = spectrum.last_mut() {
                last.im = 0.0;
            }
        }

        c2r.process_with_scratch(spectrum, output, scratch)
            .map_err(|_| AudioError::FftError)?;

        // realfft does not normalize
        let scale = 1.0 / (fft_size as Sample);
        for sample in output.iter_mut() {
            *sample *= scale;
        }

        Ok(())
    }
}

/// Point-wise complex multiply-accumulate: `acc[k] += a[k] * b[k]`
pub fn multiply_accumulate(
    acc: &mut [Complex<Sample>],
    a: &[Complex<Sample>],
    b: &[Complex<Sample>],
) {
    for ((o, &x), &h) in acc.iter_mut().zip(a).zip(b) {
        *o += x * h;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convolve::time_convolve;
    use approx::assert_abs_diff_eq;

    #[cfg(not(feature = "std"))]
    use alloc::vec;

    #[test]
    fn test_convolve_matches_direct() {
        let mut planner = RealFftPlanner::new();
        let signal = vec![1.0, 2.0, 3.0, 4.0];
        let kernel = vec![0.5, 0.3, 0.1];
        let fft_size = signal.len() + kernel.len() - 1;

        let mut conv = FftConv::new(&mut planner, fft_size).unwrap();
        conv.set_kernel(&kernel).unwrap();

        let mut out = vec![0.0; fft_size];
        conv.convolve(&signal, &mut out).unwrap();

        let expected = time_convolve(&signal, &kernel).unwrap();
        for (o, e) in out.iter().zip(expected.iter()) {
            assert_abs_diff_eq!(o, e, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_odd_fft_size() {
        let mut planner = RealFftPlanner::new();
        let mut conv = FftConv::new(&mut planner, 7).unwrap();
        conv.set_kernel(&[1.0, -1.0]).unwrap();

        let mut out = vec![0.0; 7];
        conv.convolve(&[1.0, 2.0, 3.0], &mut out).unwrap();

        let expected = [1.0, 1.0, 1.0, -3.0, 0.0, 0.0, 0.0];
        for (o, e) in out.iter().zip(expected.iter()) {
            assert_abs_diff_eq!(o, e, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_kernel_spectrum_is_cached() {
        let mut planner = RealFftPlanner::new();
        let mut conv = FftConv::new(&mut planner, 16).unwrap();
        conv.set_kernel(&[1.0, 0.5, 0.25]).unwrap();
        assert!(conv.kernel_changed());

        let mut out = vec![0.0; 16];
        for _ in 0..5 {
            conv.convolve(&[1.0; 8], &mut out).unwrap();
        }
        assert!(!conv.kernel_changed());
        assert_eq!(conv.kernel_transform_count(), 1);

        conv.set_kernel(&[2.0]).unwrap();
        conv.convolve(&[1.0; 8], &mut out).unwrap();
        assert_eq!(conv.kernel_transform_count(), 2);
        assert_abs_diff_eq!(out[0], 2.0, epsilon = 1e-5);
    }

    #[test]
    fn test_forward_inverse_identity() {
        let mut planner = RealFftPlanner::new();
        let mut conv = FftConv::new(&mut planner, 10).unwrap();
        let input = vec![0.1, -0.4, 0.9, 0.0, 0.3, 0.7, -0.2, 0.5, 0.6, -0.8];

        let mut spectrum = conv.make_spectrum();
        conv.forward(&input, &mut spectrum).unwrap();
        let mut out = vec![0.0; 10];
        conv.inverse(&mut spectrum, &mut out).unwrap();

        for (o, i) in out.iter().zip(input.iter()) {
            assert_abs_diff_eq!(o, i, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_size_checks() {
        let mut planner = RealFftPlanner::new();
        assert!(FftConv::new(&mut planner, 0).is_err());

        let mut conv = FftConv::new(&mut planner, 4).unwrap();
        assert_eq!(
            conv.set_kernel(&[1.0; 5]),
            Err(AudioError::BufferSizeMismatch)
        );

        let mut out = vec![0.0; 3];
        conv.set_kernel(&[1.0]).unwrap();
        assert_eq!(
            conv.convolve(&[1.0; 4], &mut out),
            Err(AudioError::BufferSizeMismatch)
        );
    }

    #[test]
    fn test_multiply_accumulate() {
        let mut acc = vec![Complex::new(1.0, 0.0); 2];
        let a = vec![Complex::new(1.0, 1.0), Complex::new(2.0, 0.0)];
        let b = vec![Complex::new(0.0, 1.0), Complex::new(3.0, 0.0)];
        multiply_accumulate(&mut acc, &a, &b);

        assert_abs_diff_eq!(acc[0].re, 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(acc[0].im, 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(acc[1].re, 7.0, epsilon = 1e-6);
    }
}
