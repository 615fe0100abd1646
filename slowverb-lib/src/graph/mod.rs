//! Effect graph construction and the handle used to retune or tear it down.
//!
//! [`build_graph`] returns two halves: a [`GraphHandle`] kept by whoever
//! controls the graph, and a [`GraphSource`] that produces the processed
//! samples. The source can be handed to an audio device (live) or drained into
//! buffers (offline). Parameter changes go through the handle and are picked
//! up by the source at the next render quantum. Rate cannot change on a built
//! graph; a new graph must be built instead.

mod processor;
pub mod topology;

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, info, warn};

use crate::audio::AudioAsset;
use crate::dsp::impulse_response::generate_impulse_response;
use crate::settings::{
    clamp_eq_gain, clamp_reverb_mix, clamp_speed, clamp_volume, EffectSettings, EQ_BAND_COUNT,
};

pub use processor::{GraphSource, RENDER_QUANTUM_FRAMES};
pub use topology::{GainRole, GraphTopology, Stage};

/// Failure to construct a rendering engine for an asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    EmptyAsset,
    NoChannels,
    InvalidSampleRate,
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyAsset => write!(f, "cannot build effect graph for an empty asset"),
            Self::NoChannels => write!(f, "cannot build effect graph for an asset without channels"),
            Self::InvalidSampleRate => write!(f, "cannot build effect graph with a zero sample rate"),
        }
    }
}

impl std::error::Error for GraphError {}

/// Where the graph's destination stage delivers samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Destination {
    /// Real-time device output, starting `offset_seconds` into the asset.
    Live { offset_seconds: f64 },
    /// As-fast-as-possible render into memory, from the start of the asset.
    Offline,
}

/// Parameters that may change on a running graph.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GraphParams {
    pub reverb_mix: f32,
    pub volume: f32,
    pub eq_gains: [f32; EQ_BAND_COUNT],
}

impl GraphParams {
    fn from_settings(settings: &EffectSettings) -> Self {
        let settings = settings.clamped();
        Self {
            reverb_mix: settings.reverb_mix,
            volume: settings.volume,
            eq_gains: settings.eq_gains,
        }
    }

    pub fn dry_gain(&self) -> f32 {
        1.0 - self.reverb_mix
    }

    pub fn wet_gain(&self) -> f32 {
        self.reverb_mix
    }
}

pub(crate) struct SharedParams {
    params: Mutex<GraphParams>,
    version: AtomicU64,
    torn_down: AtomicBool,
}

impl SharedParams {
    fn new(params: GraphParams) -> Self {
        Self {
            params: Mutex::new(params),
            version: AtomicU64::new(0),
            torn_down: AtomicBool::new(false),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, GraphParams> {
        self.params
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    pub(crate) fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::Acquire)
    }

    fn update(&self, apply: impl FnOnce(&mut GraphParams)) {
        let mut params = self.lock();
        apply(&mut params);
        self.version.fetch_add(1, Ordering::AcqRel);
    }
}

/// Control side of a built graph. Cheap to clone; all clones address the same
/// graph instance.
#[derive(Clone)]
pub struct GraphHandle {
    shared: Arc<SharedParams>,
    topology: Arc<GraphTopology>,
    destination: Destination,
    output_frames: usize,
}

impl fmt::Debug for GraphHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphHandle")
            .field("rate", &self.rate())
            .field("destination", &self.destination)
            .field("output_frames", &self.output_frames)
            .field("torn_down", &self.is_torn_down())
            .finish()
    }
}

impl GraphHandle {
    pub fn set_volume(&self, volume: f32) {
        let volume = clamp_volume(volume);
        self.shared.update(|params| params.volume = volume);
    }

    pub fn set_reverb_mix(&self, reverb_mix: f32) {
        let reverb_mix = clamp_reverb_mix(reverb_mix);
        self.shared.update(|params| params.reverb_mix = reverb_mix);
    }

    pub fn set_eq_gain(&self, index: usize, gain_db: f32) {
        if index >= EQ_BAND_COUNT {
            warn!("ignoring gain for unknown eq band {}", index);
            return;
        }
        let gain_db = clamp_eq_gain(gain_db);
        self.shared.update(|params| params.eq_gains[index] = gain_db);
    }

    /// Retune every live parameter from `settings`. Speed is ignored.
    pub fn apply(&self, settings: &EffectSettings) {
        let next = GraphParams::from_settings(settings);
        self.shared.update(|params| *params = next);
    }

    pub fn params(&self) -> GraphParams {
        *self.shared.lock()
    }

    /// Stop the graph. Its source yields no further samples.
    pub fn teardown(&self) {
        if !self.shared.torn_down.swap(true, Ordering::AcqRel) {
            debug!("effect graph torn down");
        }
    }

    pub fn is_torn_down(&self) -> bool {
        self.shared.is_torn_down()
    }

    pub fn rate(&self) -> f32 {
        self.topology.rate()
    }

    pub fn topology(&self) -> &GraphTopology {
        &self.topology
    }

    pub fn destination(&self) -> Destination {
        self.destination
    }

    /// Frames the source will produce before ending.
    pub fn output_frames(&self) -> usize {
        self.output_frames
    }
}

/// Build a fresh effect graph over `asset`.
///
/// Every call generates its own impulse response. Settings are clamped here;
/// the speed in `settings` fixes the source rate for the lifetime of the
/// graph.
pub fn build_graph(
    asset: Arc<AudioAsset>,
    settings: &EffectSettings,
    destination: Destination,
) -> Result<(GraphHandle, GraphSource), GraphError> {
    if asset.sample_rate() == 0 {
        return Err(GraphError::InvalidSampleRate);
    }
    if asset.channel_count() == 0 {
        return Err(GraphError::NoChannels);
    }
    if asset.frame_count() == 0 {
        return Err(GraphError::EmptyAsset);
    }

    let rate = clamp_speed(settings.speed);
    let params = GraphParams::from_settings(settings);
    let topology = Arc::new(GraphTopology::new(rate));
    let shared = Arc::new(SharedParams::new(params));
    let impulse_response = generate_impulse_response(asset.sample_rate());

    let offset_seconds = match destination {
        Destination::Live { offset_seconds } => offset_seconds.max(0.0),
        Destination::Offline => 0.0,
    };

    let source = GraphSource::new(
        asset.clone(),
        rate,
        offset_seconds,
        params,
        &impulse_response,
        shared.clone(),
    );
    let output_frames = source.output_frames();

    info!(
        "effect graph built: {} ch @ {} Hz, rate {:.2}, {} output frames ({:?})",
        asset.channel_count(),
        asset.sample_rate(),
        rate,
        output_frames,
        destination
    );

    let handle = GraphHandle {
        shared,
        topology,
        destination,
        output_frames,
    };

    Ok((handle, source))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset(frames: usize, channels: usize) -> Arc<AudioAsset> {
        let data = (0..channels)
            .map(|_| (0..frames).map(|n| ((n % 50) as f32 / 50.0) - 0.5).collect())
            .collect();
        Arc::new(AudioAsset::new(8_000, data).expect("asset"))
    }

    #[test]
    fn empty_asset_is_rejected() {
        let empty = Arc::new(AudioAsset::new(44_100, vec![Vec::new()]).expect("asset"));
        let result = build_graph(empty, &EffectSettings::default(), Destination::Offline);
        assert_eq!(result.err(), Some(GraphError::EmptyAsset));

        let silent = Arc::new(AudioAsset::new(44_100, Vec::new()).expect("asset"));
        let result = build_graph(silent, &EffectSettings::default(), Destination::Offline);
        assert_eq!(result.err(), Some(GraphError::NoChannels));

        let zero_rate = Arc::new(AudioAsset::new(0, vec![vec![0.0; 4]]).expect("asset"));
        let result = build_graph(zero_rate, &EffectSettings::default(), Destination::Offline);
        assert_eq!(result.err(), Some(GraphError::InvalidSampleRate));
    }

    #[test]
    fn live_and_offline_share_topology() {
        let settings = EffectSettings::default();
        let (live, _) = build_graph(
            asset(800, 2),
            &settings,
            Destination::Live { offset_seconds: 0.0 },
        )
        .expect("live graph");
        let (offline, _) =
            build_graph(asset(800, 2), &settings, Destination::Offline).expect("offline graph");
        assert_eq!(live.topology(), offline.topology());
        assert_ne!(live.destination(), offline.destination());
    }

    #[test]
    fn speed_is_clamped_at_construction() {
        let settings = EffectSettings {
            speed: 5.0,
            ..Default::default()
        };
        let (handle, _) = build_graph(asset(800, 1), &settings, Destination::Offline).expect("graph");
        assert_eq!(handle.rate(), 2.0);
        assert_eq!(handle.output_frames(), 400);
    }

    #[test]
    fn retune_clamps_parameters() {
        let (handle, _) =
            build_graph(asset(800, 1), &EffectSettings::default(), Destination::Offline)
                .expect("graph");
        handle.set_eq_gain(2, 20.0);
        handle.set_volume(3.0);
        handle.set_reverb_mix(-0.5);
        handle.set_eq_gain(42, 1.0);

        let params = handle.params();
        assert_eq!(params.eq_gains[2], 12.0);
        assert_eq!(params.volume, 1.0);
        assert_eq!(params.reverb_mix, 0.0);
        assert_eq!(params.dry_gain() + params.wet_gain(), 1.0);
    }

    #[test]
    fn teardown_ends_the_source() {
        let (handle, mut source) =
            build_graph(asset(8_000, 1), &EffectSettings::default(), Destination::Offline)
                .expect("graph");
        assert!(source.next().is_some());
        handle.teardown();
        assert!(handle.is_torn_down());
        assert!(source.next().is_none());
    }

    #[test]
    fn live_offset_shortens_output() {
        let settings = EffectSettings {
            speed: 1.0,
            ..Default::default()
        };
        let (handle, _) = build_graph(
            asset(8_000, 1),
            &settings,
            Destination::Live { offset_seconds: 0.5 },
        )
        .expect("graph");
        assert_eq!(handle.output_frames(), 4_000);
    }
}
