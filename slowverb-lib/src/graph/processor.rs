//! Sample-producing half of an effect graph.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use rodio::source::SeekError;
use rodio::Source;

use super::{GraphParams, SharedParams};
use crate::audio::AudioAsset;
use crate::dsp::convolution::{Convolver, DEFAULT_FFT_SIZE};
use crate::dsp::equalizer::Equalizer;
use crate::dsp::impulse_response::ImpulseResponse;

/// Frames rendered between parameter checks.
pub const RENDER_QUANTUM_FRAMES: usize = 128;

/// Runs the asset through the graph and yields interleaved output samples.
///
/// Output is aligned with the source: the convolver's block latency is
/// absorbed at construction, and the dry path is delayed to match.
pub struct GraphSource {
    asset: Arc<AudioAsset>,
    shared: Arc<SharedParams>,
    rate: f64,
    position: f64,
    channels: usize,
    output_frames: usize,
    frames_rendered: usize,
    params: GraphParams,
    params_version: u64,
    equalizer: Equalizer,
    convolvers: Vec<Convolver>,
    dry_delay: Vec<VecDeque<f32>>,
    block: Vec<f32>,
    block_pos: usize,
}

impl GraphSource {
    pub(super) fn new(
        asset: Arc<AudioAsset>,
        rate: f32,
        offset_seconds: f64,
        params: GraphParams,
        impulse_response: &ImpulseResponse,
        shared: Arc<SharedParams>,
    ) -> Self {
        let channels = asset.channel_count();
        let sample_rate = asset.sample_rate();
        let rate = rate as f64;

        let offset_frames = (offset_seconds * sample_rate as f64).max(0.0);
        let remaining = (asset.frame_count() as f64 - offset_frames).max(0.0);
        let output_frames = (remaining / rate).ceil() as usize;

        let convolvers: Vec<Convolver> = impulse_response
            .normalized_kernels(channels)
            .iter()
            .map(|kernel| Convolver::new(kernel, DEFAULT_FFT_SIZE))
            .collect();
        let latency = convolvers.first().map(|c| c.latency()).unwrap_or(0);

        let mut source = Self {
            equalizer: Equalizer::new(sample_rate, channels, &params.eq_gains),
            params_version: shared.version(),
            asset,
            shared,
            rate,
            position: offset_frames,
            channels,
            output_frames,
            frames_rendered: 0,
            params,
            convolvers,
            dry_delay: vec![std::iter::repeat(0.0).take(latency).collect(); channels],
            block: Vec::with_capacity(RENDER_QUANTUM_FRAMES * channels),
            block_pos: 0,
        };
        source.prime(latency);
        source
    }

    /// Total frames this source yields.
    pub fn output_frames(&self) -> usize {
        self.output_frames
    }

    pub fn channel_count(&self) -> usize {
        self.channels
    }

    /// Render every remaining frame into planar buffers.
    pub fn render_to_end(mut self) -> Vec<Vec<f32>> {
        let mut out = vec![Vec::with_capacity(self.output_frames); self.channels];
        loop {
            let start = self
                .block_pos
                .next_multiple_of(self.channels)
                .min(self.block.len());
            for frame in self.block[start..].chunks_exact(self.channels) {
                for (channel, sample) in out.iter_mut().zip(frame) {
                    channel.push(*sample);
                }
            }
            self.block_pos = self.block.len();

            if self.shared.is_torn_down() || self.frames_rendered >= self.output_frames {
                break;
            }
            self.render_quantum();
        }
        out
    }

    /// Run the first `latency` frames through the graph and drop them.
    fn prime(&mut self, latency: usize) {
        for _ in 0..latency {
            self.process_frame(None);
        }
    }

    fn sync_params(&mut self) {
        let version = self.shared.version();
        if version == self.params_version {
            return;
        }
        self.params = *self.shared.lock();
        self.params_version = version;
        self.equalizer.set_gains(&self.params.eq_gains);
    }

    fn render_quantum(&mut self) {
        self.sync_params();
        self.block.clear();
        self.block_pos = 0;

        let frames = RENDER_QUANTUM_FRAMES.min(self.output_frames - self.frames_rendered);
        let mut frame_out = vec![0.0_f32; self.channels];
        for _ in 0..frames {
            self.process_frame(Some(&mut frame_out));
            self.block.extend_from_slice(&frame_out);
        }
        self.frames_rendered += frames;
    }

    fn process_frame(&mut self, out: Option<&mut [f32]>) {
        let dry_gain = self.params.dry_gain();
        let wet_gain = self.params.wet_gain();
        let volume = self.params.volume;
        let position = self.position;
        self.position += self.rate;

        let mut out = out;
        for channel in 0..self.channels {
            let input = self.read_source(channel, position);
            let dry = self.equalizer.process_sample(channel, input);
            let delay = &mut self.dry_delay[channel];
            delay.push_back(dry);
            let dry = delay.pop_front().unwrap_or(0.0);
            let wet = self.convolvers[channel].process_sample(input);

            if let Some(out) = out.as_deref_mut() {
                out[channel] = (dry * dry_gain + wet * wet_gain) * volume;
            }
        }
    }

    /// Linear interpolation between neighbouring source frames. Reads past
    /// the end are silent.
    fn read_source(&self, channel: usize, position: f64) -> f32 {
        let samples = self.asset.channel(channel);
        let index = position.floor() as usize;
        let Some(&current) = samples.get(index) else {
            return 0.0;
        };
        let frac = (position - index as f64) as f32;
        if frac == 0.0 {
            return current;
        }
        let next = samples.get(index + 1).copied().unwrap_or(current);
        current + (next - current) * frac
    }
}

impl Iterator for GraphSource {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.shared.is_torn_down() {
            return None;
        }
        if self.block_pos >= self.block.len() {
            if self.frames_rendered >= self.output_frames {
                return None;
            }
            self.render_quantum();
        }
        let sample = self.block.get(self.block_pos).copied();
        self.block_pos += 1;
        sample
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.output_frames - self.frames_rendered) * self.channels
            + self.block.len().saturating_sub(self.block_pos);
        (remaining, Some(remaining))
    }
}

impl Source for GraphSource {
    fn current_span_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        self.channels as u16
    }

    fn sample_rate(&self) -> u32 {
        self.asset.sample_rate()
    }

    fn total_duration(&self) -> Option<Duration> {
        Some(Duration::from_secs_f64(
            self.output_frames as f64 / self.asset.sample_rate() as f64,
        ))
    }

    fn try_seek(&mut self, _pos: Duration) -> Result<(), SeekError> {
        Err(SeekError::NotSupported {
            underlying_source: "GraphSource",
        })
    }
}
