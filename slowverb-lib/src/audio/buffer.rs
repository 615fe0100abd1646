//! Planar sample buffers: decoded sources and rendered exports.

use std::fmt;
use std::sync::Arc;

/// Decoded multi-channel source audio.
///
/// Samples are stored per channel (planar), 32-bit float in `[-1, 1]`.
/// An asset is immutable once built; the session shares it through an
/// [`Arc`] and swaps it wholesale when a new file is loaded.
#[derive(Clone, PartialEq)]
pub struct AudioAsset {
    sample_rate: u32,
    channels: Vec<Vec<f32>>,
}

impl fmt::Debug for AudioAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioAsset")
            .field("sample_rate", &self.sample_rate)
            .field("channels", &self.channel_count())
            .field("frames", &self.frame_count())
            .finish()
    }
}

impl AudioAsset {
    /// Build an asset from planar channel data.
    ///
    /// Returns `None` when channels have differing lengths.
    pub fn new(sample_rate: u32, channels: Vec<Vec<f32>>) -> Option<Self> {
        let frames = channels.first().map(|channel| channel.len()).unwrap_or(0);
        if channels.iter().any(|channel| channel.len() != frames) {
            return None;
        }
        Some(Self {
            sample_rate,
            channels,
        })
    }

    /// Build an asset from interleaved samples.
    pub fn from_interleaved(sample_rate: u32, channel_count: usize, samples: &[f32]) -> Self {
        Self {
            sample_rate,
            channels: deinterleave(samples, channel_count),
        }
    }

    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn frame_count(&self) -> usize {
        self.channels.first().map(|channel| channel.len()).unwrap_or(0)
    }

    /// Duration in seconds at the native sample rate.
    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frame_count() as f64 / self.sample_rate as f64
    }

    pub fn channel(&self, index: usize) -> &[f32] {
        self.channels
            .get(index)
            .map(|channel| channel.as_slice())
            .unwrap_or(&[])
    }

    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }
}

/// Output of an offline render, consumed once by the sample codec.
#[derive(Clone, PartialEq)]
pub struct RenderedExport {
    sample_rate: u32,
    channels: Vec<Vec<f32>>,
}

impl fmt::Debug for RenderedExport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderedExport")
            .field("sample_rate", &self.sample_rate)
            .field("channels", &self.channel_count())
            .field("frames", &self.frame_count())
            .finish()
    }
}

impl RenderedExport {
    /// Build an export from planar channel data.
    ///
    /// Returns `None` when channels have differing lengths.
    pub fn new(sample_rate: u32, channels: Vec<Vec<f32>>) -> Option<Self> {
        let frames = channels.first().map(|channel| channel.len()).unwrap_or(0);
        if channels.iter().any(|channel| channel.len() != frames) {
            return None;
        }
        Some(Self {
            sample_rate,
            channels,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn frame_count(&self) -> usize {
        self.channels.first().map(|channel| channel.len()).unwrap_or(0)
    }

    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frame_count() as f64 / self.sample_rate as f64
    }

    pub fn channel(&self, index: usize) -> &[f32] {
        self.channels
            .get(index)
            .map(|channel| channel.as_slice())
            .unwrap_or(&[])
    }

    /// Iterate samples frame by frame, channels interleaved.
    pub fn interleaved(&self) -> impl Iterator<Item = f32> + '_ {
        let channels = self.channel_count();
        (0..self.frame_count() * channels)
            .map(move |index| self.channels[index % channels][index / channels])
    }
}

/// Split interleaved samples into per-channel vectors.
///
/// A trailing partial frame is dropped.
pub fn deinterleave(samples: &[f32], channel_count: usize) -> Vec<Vec<f32>> {
    if channel_count == 0 {
        return Vec::new();
    }
    let frames = samples.len() / channel_count;
    let mut channels = vec![Vec::with_capacity(frames); channel_count];
    for frame in samples.chunks_exact(channel_count) {
        for (channel, &sample) in channels.iter_mut().zip(frame) {
            channel.push(sample);
        }
    }
    channels
}
