//! WASM bindings for browser integration
//!
//! Exposes [`ConvolutionEngine`] to JavaScript, taking and returning
//! Float32Array blocks.

use crate::{convolve, ConvolutionEngine, EngineConfig, ImpulseResponse, Method};

#[cfg(feature = "wasm")]
use wasm_bindgen::prelude::*;

#[cfg(feature = "wasm")]
use js_sys::Float32Array;

#[cfg(not(feature = "std"))]
use alloc::format; // Import `format!` macro for no_std builds

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

#[cfg(feature = "wasm")]
fn js_error(context: &str, error: crate::AudioError) -> JsValue {
    JsValue::from_str(&format!("{}: {}", context, error))
}

/// WebAssembly wrapper around the streaming block convolution engine.
///
/// Input and output blocks are interleaved when the impulse response has
/// more than one channel.
#[cfg(feature = "wasm")]
#[wasm_bindgen]
pub struct WasmConvolutionEngine {
    engine: ConvolutionEngine,
}

#[cfg(feature = "wasm")]
#[wasm_bindgen]
impl WasmConvolutionEngine {
    /// Create an engine for a mono impulse response
    ///
    /// `method` is one of `overlap-save`, `overlap-add`, `ols`, `ola`, `upols`.
    /// A `partition_size` of 0 lets UPOLS pick its own parameters.
    #[wasm_bindgen(constructor)]
    pub fn new(
        method: &str,
        block_size: usize,
        impulse_response: &Float32Array,
        partition_size: usize,
        normalize: bool,
    ) -> Result<WasmConvolutionEngine, JsValue> {
        let method: Method = method
            .parse()
            .map_err(|e| js_error("Configuration error", e))?;
        let config = EngineConfig {
            method,
            block_size,
            partition_size: (partition_size > 0).then_some(partition_size),
            normalize,
        };
        let ir = ImpulseResponse::mono(impulse_response.to_vec())
            .map_err(|e| js_error("Impulse response error", e))?;

        let engine =
            ConvolutionEngine::new(config, Some(ir)).map_err(|e| js_error("Engine error", e))?;

        Ok(WasmConvolutionEngine { engine })
    }

    /// Process one block and return the convolved block
    #[wasm_bindgen]
    pub fn process_block(&mut self, audio_block: &Float32Array) -> Result<Float32Array, JsValue> {
        let input_vec: Vec<f32> = audio_block.to_vec();

        let output = self
            .engine
            .process(&input_vec, None)
            .map_err(|e| js_error("Processing error", e))?;

        Ok(Float32Array::from(&output[..]))
    }

    /// Swap in a new impulse response with `channels` interleaved channels
    #[wasm_bindgen]
    pub fn set_impulse_response(
        &mut self,
        impulse_response: &Float32Array,
        channels: usize,
    ) -> Result<(), JsValue> {
        let ir = ImpulseResponse::from_interleaved(&impulse_response.to_vec(), channels)
            .map_err(|e| js_error("Impulse response error", e))?;
        self.engine
            .set_impulse_response(&ir)
            .map_err(|e| js_error("Engine error", e))
    }

    /// Transform size in use
    #[wasm_bindgen]
    pub fn fft_size(&self) -> usize {
        self.engine.fft_size().unwrap_or(0)
    }

    /// Reset the engine state (clears all input history)
    #[wasm_bindgen]
    pub fn reset(&mut self) {
        self.engine.reset();
    }
}

/// Convolve a complete signal with an impulse response (non-real-time).
#[cfg(feature = "wasm")]
#[wasm_bindgen]
pub fn convolve_audio(
    audio: &Float32Array,
    impulse_response: &Float32Array,
) -> Result<Float32Array, JsValue> {
    let audio_vec: Vec<f32> = audio.to_vec();
    let ir_vec: Vec<f32> = impulse_response.to_vec();

    let result = convolve::fft_convolve(&audio_vec, &ir_vec)
        .map_err(|e| js_error("Convolution error", e))?;

    Ok(Float32Array::from(&result[..]))
}
