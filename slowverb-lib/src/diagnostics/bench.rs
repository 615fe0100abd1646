//! Synthetic benchmarks for the reverb convolver and the full offline render.

use std::sync::Arc;
use std::time::Instant;

use rand::Rng;

use crate::audio::AudioAsset;
use crate::dsp::convolution::Convolver;
use crate::dsp::impulse_response::IMPULSE_RESPONSE_SECONDS;
use crate::graph::GraphError;
use crate::render::render_offline;
use crate::settings::EffectSettings;

#[derive(Debug, Clone, Copy)]
pub struct BenchConfig {
    pub sample_rate: u32,
    pub channels: usize,
    pub input_seconds: f32,
    pub fft_size: usize,
    pub iterations: usize,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            channels: 2,
            input_seconds: 10.0,
            fft_size: crate::dsp::convolution::DEFAULT_FFT_SIZE,
            iterations: 3,
        }
    }
}

/// Timings in milliseconds. `rt_factor` below 1.0 means faster than real time.
#[derive(Debug, Clone, Copy)]
pub struct BenchResult {
    pub avg_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub audio_time_ms: f64,
    pub rt_factor: f64,
}

impl BenchResult {
    fn from_times(times: &[f64], audio_time_ms: f64) -> Self {
        let min_ms = times.iter().copied().fold(f64::INFINITY, f64::min);
        let max_ms = times.iter().copied().fold(0.0_f64, f64::max);
        let avg_ms = if times.is_empty() {
            0.0
        } else {
            times.iter().sum::<f64>() / times.len() as f64
        };
        Self {
            avg_ms,
            min_ms: if min_ms.is_finite() { min_ms } else { 0.0 },
            max_ms,
            audio_time_ms,
            rt_factor: if audio_time_ms > 0.0 {
                avg_ms / audio_time_ms
            } else {
                0.0
            },
        }
    }
}

fn noise(rng: &mut impl Rng, len: usize) -> Vec<f32> {
    (0..len).map(|_| rng.gen_range(-1.0_f32..1.0_f32)).collect()
}

/// Time one mono pass through a convolver loaded with a reverb-length kernel.
pub fn bench_convolver(config: BenchConfig) -> BenchResult {
    let input_len = (config.sample_rate as f32 * config.input_seconds).max(1.0) as usize;
    let ir_len = (config.sample_rate * IMPULSE_RESPONSE_SECONDS) as usize;

    let mut rng = rand::thread_rng();
    let input = noise(&mut rng, input_len);
    let ir = noise(&mut rng, ir_len);

    let mut convolver = Convolver::new(&ir, config.fft_size);
    let mut times = Vec::with_capacity(config.iterations.max(1));
    for _ in 0..config.iterations.max(1) {
        let start = Instant::now();
        let _ = convolver.process(&input);
        times.push(start.elapsed().as_secs_f64() * 1000.0);
    }

    let audio_time_ms = input_len as f64 / config.sample_rate as f64 * 1000.0;
    BenchResult::from_times(&times, audio_time_ms)
}

pub fn bench_convolver_sweep(base: BenchConfig, fft_sizes: &[usize]) -> Vec<(usize, BenchResult)> {
    fft_sizes
        .iter()
        .map(|&fft_size| (fft_size, bench_convolver(BenchConfig { fft_size, ..base })))
        .collect()
}

/// Time complete offline renders of a noise asset with `settings`.
pub fn bench_offline_render(
    config: BenchConfig,
    settings: &EffectSettings,
) -> Result<BenchResult, GraphError> {
    let frames = (config.sample_rate as f32 * config.input_seconds).max(1.0) as usize;
    let mut rng = rand::thread_rng();
    let channels = (0..config.channels.max(1))
        .map(|_| noise(&mut rng, frames))
        .collect();
    let asset: Arc<AudioAsset> = AudioAsset::new(config.sample_rate, channels)
        .ok_or(GraphError::EmptyAsset)?
        .into_shared();

    let mut times = Vec::with_capacity(config.iterations.max(1));
    for _ in 0..config.iterations.max(1) {
        let start = Instant::now();
        render_offline(&asset, settings)?;
        times.push(start.elapsed().as_secs_f64() * 1000.0);
    }

    let audio_time_ms = asset.duration_seconds() * 1000.0;
    Ok(BenchResult::from_times(&times, audio_time_ms))
}
