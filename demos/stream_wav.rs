//! # Stream a WAV File Through the Block Convolution Engine
//!
//! Feeds an audio file to [`ConvolutionEngine`] one block at a time, the way a
//! real-time host would, and writes the result (including the filter tail).
//!
//! ## Usage
//!
//! ```bash
//! cargo run --example stream_wav -- <input.wav> <impulse_response.wav> [output.wav] \
//!     [--method ols|ola|upols] [--block-size 512] [--partition 256] [--no-normalize]
//! ```
//!
//! Set `RUST_LOG=debug` to see the chosen transform and partition sizes.

use anyhow::{Context, Result};
use blockconv::{ConvolutionEngine, EngineConfig, ImpulseResponse, Method};
use hound::{WavReader, WavSpec, WavWriter};
use std::env;
use std::time::Instant;

/// Read WAV samples and convert to f32, supporting both 16-bit and 24-bit audio
fn read_wav_samples(reader: &mut WavReader<std::io::BufReader<std::fs::File>>) -> Result<Vec<f32>> {
    let spec = reader.spec();

    match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Int, 16) => Ok(reader
            .samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read 16-bit samples")?
            .into_iter()
            .map(|s| (s as f32) / 32768.0)
            .collect()),
        (hound::SampleFormat::Int, 24) => Ok(reader
            .samples::<i32>()
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read 24-bit samples")?
            .into_iter()
            .map(|s| (s as f32) / 8388608.0) // 2^23
            .collect()),
        (hound::SampleFormat::Float, 32) => Ok(reader
            .samples::<f32>()
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read 32-bit float samples")?),
        _ => {
            anyhow::bail!(
                "Unsupported audio format: {} bits, {:?}",
                spec.bits_per_sample,
                spec.sample_format
            )
        }
    }
}

/// Repeat every sample `times` times (mono to interleaved multi-channel)
fn upmix(samples: &[f32], times: usize) -> Vec<f32> {
    samples
        .iter()
        .flat_map(|&s| std::iter::repeat(s).take(times))
        .collect()
}

struct Options {
    input: String,
    impulse_response: String,
    output: String,
    config: EngineConfig,
}

fn parse_args() -> Result<Options> {
    let args: Vec<String> = env::args().collect();
    let mut positional = Vec::new();
    let mut config = EngineConfig::default();

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--method" => {
                let value = iter.next().context("--method needs a value")?;
                config.method = value.parse::<Method>()?;
            }
            "--block-size" => {
                let value = iter.next().context("--block-size needs a value")?;
                config.block_size = value.parse().context("Invalid block size")?;
            }
            "--partition" => {
                let value = iter.next().context("--partition needs a value")?;
                config.partition_size = Some(value.parse().context("Invalid partition size")?);
            }
            "--no-normalize" => config.normalize = false,
            _ => positional.push(arg.clone()),
        }
    }

    if positional.len() < 2 {
        eprintln!(
            "Usage: {} <input.wav> <impulse_response.wav> [output.wav] \
             [--method ols|ola|upols] [--block-size N] [--partition N] [--no-normalize]",
            args[0]
        );
        std::process::exit(1);
    }

    Ok(Options {
        input: positional[0].clone(),
        impulse_response: positional[1].clone(),
        output: positional
            .get(2)
            .cloned()
            .unwrap_or_else(|| "output_stream.wav".to_string()),
        config,
    })
}

fn main() -> Result<()> {
    env_logger::init();
    let options = parse_args()?;

    let mut audio_reader = WavReader::open(&options.input)
        .with_context(|| format!("Failed to open {}", options.input))?;
    let audio_spec = audio_reader.spec();
    let audio_samples = read_wav_samples(&mut audio_reader)?;

    let mut ir_reader = WavReader::open(&options.impulse_response)
        .with_context(|| format!("Failed to open {}", options.impulse_response))?;
    let ir_spec = ir_reader.spec();
    let ir_samples = read_wav_samples(&mut ir_reader)?;

    if audio_spec.sample_rate != ir_spec.sample_rate {
        anyhow::bail!(
            "Sample rate mismatch: audio is {} Hz but IR is {} Hz",
            audio_spec.sample_rate,
            ir_spec.sample_rate
        );
    }

    // The engine pairs channel k of the input with channel k of the filter
    let audio_channels = audio_spec.channels as usize;
    let ir_channels = ir_spec.channels as usize;
    let channels = audio_channels.max(ir_channels);
    let (audio, ir) = match (audio_channels, ir_channels) {
        (a, i) if a == i => (audio_samples, ir_samples),
        (1, i) => (upmix(&audio_samples, i), ir_samples),
        (a, 1) => (audio_samples, upmix(&ir_samples, a)),
        (a, i) => anyhow::bail!(
            "Unsupported channel configuration: {} audio channels, {} IR channels",
            a,
            i
        ),
    };
    let impulse_response = ImpulseResponse::from_interleaved(&ir, channels)?;

    println!("Streaming Convolution");
    println!("Method: {}", options.config.method);
    println!("Block size: {}", options.config.block_size);
    println!("IR: {} samples x {} channels", impulse_response.len(), channels);

    let block_size = options.config.block_size;
    let tail_frames = impulse_response.len() - 1;
    let mut engine = ConvolutionEngine::new(options.config, Some(impulse_response))?;
    if let Some(fft_size) = engine.fft_size() {
        println!("FFT size: {}", fft_size);
    }
    if let (Some(partition), Some(count)) = (engine.partition_size(), engine.num_partitions()) {
        println!("Partitions: {} x {} samples", count, partition);
    }

    // Pad the stream so the last block is whole and the filter tail is flushed
    let block_len = block_size * channels;
    let total_frames = audio.len() / channels + tail_frames;
    let num_blocks = total_frames.div_ceil(block_size);
    let mut stream = audio;
    stream.resize(num_blocks * block_len, 0.0);

    let mut output = vec![0.0; stream.len()];
    let start = Instant::now();
    for (input, out) in stream
        .chunks_exact(block_len)
        .zip(output.chunks_exact_mut(block_len))
    {
        engine.process_into(input, out)?;
    }
    let elapsed = start.elapsed();
    output.truncate(total_frames * channels);

    let audio_seconds = total_frames as f64 / audio_spec.sample_rate as f64;
    println!(
        "Processed {} blocks in {:.1} ms ({:.1}x real time)",
        num_blocks,
        elapsed.as_secs_f64() * 1000.0,
        audio_seconds / elapsed.as_secs_f64().max(f64::EPSILON)
    );

    let output_spec = WavSpec {
        channels: channels as u16,
        sample_rate: audio_spec.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = WavWriter::create(&options.output, output_spec)
        .with_context(|| format!("Failed to create {}", options.output))?;
    for &sample in &output {
        let sample_i16 = (sample.clamp(-1.0, 1.0) * 32767.0) as i16;
        writer.write_sample(sample_i16)?;
    }
    writer.finalize()?;

    println!("Saved: {}", options.output);
    Ok(())
}
