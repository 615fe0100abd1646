//! Playback state machine: Stopped, Playing, Paused.
//!
//! Exactly one live graph exists at a time. Every path that builds a graph
//! first tears down the previous one, and every path that leaves `Playing`
//! cancels the position sampler.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, info};

use super::clock::{Clock, EngineClock};
use super::output::AudioOutput;
use super::ticker::{RepeatingTask, DEFAULT_SAMPLE_INTERVAL};
use super::{PlaybackError, PlaybackState, PlaybackStatus};
use crate::audio::AudioAsset;
use crate::graph::{build_graph, Destination, GraphHandle};
use crate::settings::{clamp_speed, EffectSettings, EqPreset};

struct Transport {
    status: PlaybackStatus,
    position: f64,
    resume_offset: f64,
    start_time: f64,
    duration: f64,
    rate: f32,
    graph: Option<GraphHandle>,
    generation: u64,
}

impl Transport {
    fn new(rate: f32) -> Self {
        Self {
            status: PlaybackStatus::Stopped,
            position: 0.0,
            resume_offset: 0.0,
            start_time: 0.0,
            duration: 0.0,
            rate,
            graph: None,
            generation: 0,
        }
    }

    fn teardown_graph(&mut self) {
        if let Some(graph) = self.graph.take() {
            graph.teardown();
        }
    }

    fn reset_position(&mut self) {
        self.position = 0.0;
        self.resume_offset = 0.0;
    }
}

fn lock(transport: &Mutex<Transport>) -> MutexGuard<'_, Transport> {
    transport
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// One sampler tick. Returns `false` once this playback instance is over.
fn sample_transport(transport: &Mutex<Transport>, clock: &dyn Clock, generation: u64) -> bool {
    let mut transport = lock(transport);
    if transport.generation != generation || transport.status != PlaybackStatus::Playing {
        return false;
    }

    let elapsed = clock.now_seconds() - transport.start_time;
    if elapsed >= transport.duration {
        transport.teardown_graph();
        transport.status = PlaybackStatus::Stopped;
        transport.reset_position();
        info!("playback reached end of track");
        return false;
    }

    transport.position = elapsed.max(0.0);
    true
}

/// Owns the transport, the live graph and the output device.
pub struct PlaybackController {
    asset: Option<Arc<AudioAsset>>,
    settings: EffectSettings,
    transport: Arc<Mutex<Transport>>,
    ticker: Option<RepeatingTask>,
    clock: Arc<dyn Clock>,
    output: Box<dyn AudioOutput>,
    exporting: Arc<AtomicBool>,
    sample_interval: Duration,
}

impl PlaybackController {
    pub fn new(output: Box<dyn AudioOutput>) -> Self {
        Self::with_clock(output, Arc::new(EngineClock::new()), DEFAULT_SAMPLE_INTERVAL)
    }

    pub fn with_clock(
        output: Box<dyn AudioOutput>,
        clock: Arc<dyn Clock>,
        sample_interval: Duration,
    ) -> Self {
        let settings = EffectSettings::default();
        Self {
            asset: None,
            transport: Arc::new(Mutex::new(Transport::new(clamp_speed(settings.speed)))),
            settings,
            ticker: None,
            clock,
            output,
            exporting: Arc::new(AtomicBool::new(false)),
            sample_interval,
        }
    }

    /// Replace the asset. Any playback is torn down and the transport resets
    /// to the start.
    pub fn load(&mut self, asset: Arc<AudioAsset>) {
        self.teardown();
        let rate = clamp_speed(self.settings.speed);
        {
            let mut transport = lock(&self.transport);
            transport.status = PlaybackStatus::Stopped;
            transport.reset_position();
            transport.rate = rate;
            transport.duration = asset.duration_seconds() / rate as f64;
        }
        debug!(
            "loaded asset: {:.2}s, {} ch @ {} Hz",
            asset.duration_seconds(),
            asset.channel_count(),
            asset.sample_rate()
        );
        self.asset = Some(asset);
    }

    /// Drop the asset and return to an empty Stopped state.
    pub fn unload(&mut self) {
        self.teardown();
        let mut transport = lock(&self.transport);
        transport.status = PlaybackStatus::Stopped;
        transport.reset_position();
        transport.duration = 0.0;
        drop(transport);
        self.asset = None;
    }

    pub fn asset(&self) -> Option<&Arc<AudioAsset>> {
        self.asset.as_ref()
    }

    /// Start from the stored resume offset with a freshly built graph.
    ///
    /// Ignored without an asset, while an export runs, or when already
    /// playing.
    pub fn play(&mut self) -> Result<(), PlaybackError> {
        let Some(asset) = self.asset.clone() else {
            return Ok(());
        };
        if self.is_exporting() {
            debug!("play ignored while exporting");
            return Ok(());
        }
        if self.status() == PlaybackStatus::Playing {
            return Ok(());
        }

        self.teardown();

        let (offset, rate) = {
            let transport = lock(&self.transport);
            (transport.resume_offset, transport.rate)
        };
        let (graph, source) = build_graph(
            asset,
            &self.settings,
            Destination::Live {
                offset_seconds: offset * rate as f64,
            },
        )?;

        if let Err(err) = self.output.start(source) {
            graph.teardown();
            return Err(err);
        }

        let generation = {
            let mut transport = lock(&self.transport);
            transport.start_time = self.clock.now_seconds() - offset;
            transport.position = offset;
            transport.status = PlaybackStatus::Playing;
            transport.graph = Some(graph);
            transport.generation += 1;
            transport.generation
        };

        let transport = self.transport.clone();
        let clock = self.clock.clone();
        self.ticker = Some(RepeatingTask::spawn(self.sample_interval, move || {
            sample_transport(&transport, clock.as_ref(), generation)
        }));

        info!("playback started at {:.2}s", offset);
        Ok(())
    }

    pub fn pause(&mut self) {
        if self.status() != PlaybackStatus::Playing {
            return;
        }
        self.cancel_ticker();
        self.output.stop();

        let mut transport = lock(&self.transport);
        let elapsed = self.clock.now_seconds() - transport.start_time;
        transport.resume_offset = elapsed.clamp(0.0, transport.duration);
        transport.position = transport.resume_offset;
        transport.teardown_graph();
        transport.status = PlaybackStatus::Paused;
        info!("playback paused at {:.2}s", transport.position);
    }

    pub fn stop(&mut self) {
        self.teardown();
        let mut transport = lock(&self.transport);
        transport.reset_position();
        transport.status = PlaybackStatus::Stopped;
    }

    /// Move to `seconds`, clamped into the track. A playing transport restarts
    /// from the new position.
    pub fn seek(&mut self, seconds: f64) -> Result<(), PlaybackError> {
        if self.asset.is_none() {
            return Ok(());
        }
        let was_playing = self.status() == PlaybackStatus::Playing;
        if was_playing {
            self.teardown();
        }

        {
            let mut transport = lock(&self.transport);
            let target = if seconds.is_finite() {
                seconds.clamp(0.0, transport.duration)
            } else {
                0.0
            };
            transport.resume_offset = target;
            transport.position = target;
            if was_playing {
                transport.status = PlaybackStatus::Paused;
            }
        }

        if was_playing {
            self.play()?;
        }
        Ok(())
    }

    /// Take one position sample now, exactly as the background sampler does.
    pub fn sample_position(&self) {
        let generation = lock(&self.transport).generation;
        sample_transport(&self.transport, self.clock.as_ref(), generation);
    }

    pub fn state(&self) -> PlaybackState {
        let transport = lock(&self.transport);
        PlaybackState {
            status: transport.status,
            position_seconds: transport.position,
            duration_seconds: transport.duration,
        }
    }

    pub fn status(&self) -> PlaybackStatus {
        lock(&self.transport).status
    }

    pub fn settings(&self) -> EffectSettings {
        self.settings
    }

    /// Handle of the live graph, if one is running.
    pub fn graph(&self) -> Option<GraphHandle> {
        lock(&self.transport).graph.clone()
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.settings.volume = volume;
        self.with_graph(|graph| graph.set_volume(volume));
    }

    pub fn set_reverb_mix(&mut self, reverb_mix: f32) {
        self.settings.reverb_mix = reverb_mix;
        self.with_graph(|graph| graph.set_reverb_mix(reverb_mix));
    }

    pub fn set_eq_gain(&mut self, band: usize, gain_db: f32) {
        if let Some(gain) = self.settings.eq_gains.get_mut(band) {
            *gain = gain_db;
        }
        self.with_graph(|graph| graph.set_eq_gain(band, gain_db));
    }

    pub fn apply_preset(&mut self, preset: EqPreset) {
        let mut settings = self.settings;
        settings.apply_preset(preset);
        self.retune(&settings);
    }

    /// Apply every parameter except speed to the running graph, if any.
    pub fn retune(&mut self, settings: &EffectSettings) {
        let speed = self.settings.speed;
        self.settings = EffectSettings { speed, ..*settings };
        let settings = self.settings;
        self.with_graph(|graph| graph.apply(&settings));
    }

    /// Change speed. A playing transport restarts on a new graph.
    pub fn set_speed(&mut self, speed: f32) -> Result<(), PlaybackError> {
        self.settings.speed = speed;
        self.rebuild()
    }

    /// Replace all settings, rebuilding the graph when playing.
    pub fn set_settings(&mut self, settings: &EffectSettings) -> Result<(), PlaybackError> {
        self.settings = *settings;
        self.rebuild()
    }

    /// Tear down and rebuild from the current settings, keeping position.
    pub fn rebuild(&mut self) -> Result<(), PlaybackError> {
        let was_playing = self.status() == PlaybackStatus::Playing;
        if was_playing {
            self.pause();
        }

        let rate = clamp_speed(self.settings.speed);
        {
            let mut transport = lock(&self.transport);
            if transport.rate != rate {
                let scale = transport.rate as f64 / rate as f64;
                transport.resume_offset *= scale;
                transport.position *= scale;
                transport.duration = self
                    .asset
                    .as_ref()
                    .map(|asset| asset.duration_seconds() / rate as f64)
                    .unwrap_or(0.0);
                transport.resume_offset = transport.resume_offset.min(transport.duration);
                transport.position = transport.position.min(transport.duration);
                transport.rate = rate;
            }
        }

        if was_playing {
            self.play()?;
        }
        Ok(())
    }

    /// Flag shared with the export path; `play` is ignored while it is set.
    pub fn exporting_flag(&self) -> Arc<AtomicBool> {
        self.exporting.clone()
    }

    pub fn set_exporting(&self, exporting: bool) {
        self.exporting.store(exporting, Ordering::Release);
    }

    pub fn is_exporting(&self) -> bool {
        self.exporting.load(Ordering::Acquire)
    }

    fn with_graph(&self, apply: impl FnOnce(&GraphHandle)) {
        if let Some(graph) = lock(&self.transport).graph.as_ref() {
            apply(graph);
        }
    }

    fn cancel_ticker(&mut self) {
        if let Some(mut ticker) = self.ticker.take() {
            ticker.cancel();
        }
    }

    /// Stop the sampler, the device and the graph, leaving positions intact.
    fn teardown(&mut self) {
        self.cancel_ticker();
        self.output.stop();
        lock(&self.transport).teardown_graph();
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphSource;
    use crate::playback::clock::manual::ManualClock;
    use std::time::Instant;

    #[derive(Default)]
    struct OutputLog {
        starts: usize,
        stops: usize,
        playing: bool,
    }

    struct MockOutput {
        log: Arc<Mutex<OutputLog>>,
        fail: bool,
    }

    impl AudioOutput for MockOutput {
        fn start(&mut self, _source: GraphSource) -> Result<(), PlaybackError> {
            if self.fail {
                return Err(PlaybackError::OutputUnavailable("no device".to_string()));
            }
            let mut log = self.log.lock().unwrap();
            assert!(!log.playing, "previous instantiation still running");
            log.starts += 1;
            log.playing = true;
            Ok(())
        }

        fn stop(&mut self) {
            let mut log = self.log.lock().unwrap();
            if log.playing {
                log.stops += 1;
            }
            log.playing = false;
        }
    }

    fn asset(seconds: usize) -> Arc<AudioAsset> {
        Arc::new(AudioAsset::new(1_000, vec![vec![0.0; seconds * 1_000]]).expect("asset"))
    }

    fn controller(
        interval: Duration,
    ) -> (PlaybackController, Arc<ManualClock>, Arc<Mutex<OutputLog>>) {
        let clock = Arc::new(ManualClock::default());
        let log = Arc::new(Mutex::new(OutputLog::default()));
        let output = MockOutput {
            log: log.clone(),
            fail: false,
        };
        let mut controller = PlaybackController::with_clock(Box::new(output), clock.clone(), interval);
        controller.settings.speed = 1.0;
        (controller, clock, log)
    }

    #[test]
    fn play_without_asset_is_a_no_op() {
        let (mut controller, _, log) = controller(Duration::from_secs(60));
        controller.play().expect("play");
        assert_eq!(controller.status(), PlaybackStatus::Stopped);
        assert_eq!(log.lock().unwrap().starts, 0);
    }

    #[test]
    fn pause_records_elapsed_and_resumes_from_it() {
        let (mut controller, clock, log) = controller(Duration::from_secs(60));
        controller.load(asset(10));
        clock.set(100.0);
        controller.play().expect("play");
        assert_eq!(controller.status(), PlaybackStatus::Playing);

        clock.advance(3.0);
        controller.pause();
        let state = controller.state();
        assert_eq!(state.status, PlaybackStatus::Paused);
        assert!((state.position_seconds - 3.0).abs() < 1e-9);
        assert!(controller.graph().is_none());

        clock.advance(50.0);
        controller.play().expect("resume");
        clock.advance(1.0);
        controller.sample_position();
        assert!((controller.state().position_seconds - 4.0).abs() < 1e-9);

        let log = log.lock().unwrap();
        assert_eq!(log.starts, 2);
        assert_eq!(log.stops, 1);
    }

    #[test]
    fn auto_stop_at_end_of_track() {
        let (mut controller, clock, _) = controller(Duration::from_secs(60));
        controller.load(asset(10));
        controller.play().expect("play");
        let graph = controller.graph().expect("graph");

        clock.advance(9.9);
        controller.sample_position();
        assert_eq!(controller.status(), PlaybackStatus::Playing);

        clock.advance(0.2);
        controller.sample_position();
        let state = controller.state();
        assert_eq!(state.status, PlaybackStatus::Stopped);
        assert_eq!(state.position_seconds, 0.0);
        assert!(graph.is_torn_down());
    }

    #[test]
    fn background_sampler_stops_playback() {
        let (mut controller, clock, _) = controller(Duration::from_millis(2));
        controller.load(asset(10));
        controller.play().expect("play");
        clock.advance(10.5);

        let started = Instant::now();
        while controller.status() != PlaybackStatus::Stopped
            && started.elapsed() < Duration::from_secs(5)
        {
            std::thread::sleep(Duration::from_millis(2));
        }
        assert_eq!(controller.status(), PlaybackStatus::Stopped);
        assert_eq!(controller.state().position_seconds, 0.0);
    }

    #[test]
    fn seek_clamps_and_restarts_when_playing() {
        let (mut controller, clock, log) = controller(Duration::from_secs(60));
        controller.load(asset(10));

        controller.seek(42.0).expect("seek");
        assert_eq!(controller.state().position_seconds, 10.0);
        controller.seek(-3.0).expect("seek");
        assert_eq!(controller.state().position_seconds, 0.0);
        assert_eq!(controller.status(), PlaybackStatus::Stopped);

        controller.play().expect("play");
        clock.advance(2.0);
        controller.seek(6.0).expect("seek");
        assert_eq!(controller.status(), PlaybackStatus::Playing);
        clock.advance(0.5);
        controller.sample_position();
        assert!((controller.state().position_seconds - 6.5).abs() < 1e-9);
        assert_eq!(log.lock().unwrap().starts, 2);
    }

    #[test]
    fn stop_resets_from_any_state() {
        let (mut controller, clock, _) = controller(Duration::from_secs(60));
        controller.stop();
        controller.load(asset(5));
        controller.play().expect("play");
        clock.advance(2.0);
        controller.pause();
        controller.stop();
        controller.stop();
        let state = controller.state();
        assert_eq!(state.status, PlaybackStatus::Stopped);
        assert_eq!(state.position_seconds, 0.0);

        controller.play().expect("play");
        controller.sample_position();
        assert_eq!(controller.state().position_seconds, 0.0);
    }

    #[test]
    fn exporting_blocks_play() {
        let (mut controller, _, log) = controller(Duration::from_secs(60));
        controller.load(asset(5));
        controller.set_exporting(true);
        controller.play().expect("play");
        assert_eq!(controller.status(), PlaybackStatus::Stopped);
        controller.set_exporting(false);
        controller.play().expect("play");
        assert_eq!(controller.status(), PlaybackStatus::Playing);
        assert_eq!(log.lock().unwrap().starts, 1);
    }

    #[test]
    fn retune_keeps_the_running_graph() {
        let (mut controller, _, log) = controller(Duration::from_secs(60));
        controller.load(asset(5));
        controller.play().expect("play");
        let graph = controller.graph().expect("graph");

        controller.set_volume(0.25);
        controller.set_reverb_mix(0.9);
        controller.set_eq_gain(0, 20.0);

        let params = graph.params();
        assert_eq!(params.volume, 0.25);
        assert_eq!(params.reverb_mix, 0.9);
        assert_eq!(params.eq_gains[0], 12.0);
        assert!(!graph.is_torn_down());
        assert_eq!(log.lock().unwrap().starts, 1);
    }

    #[test]
    fn speed_change_rebuilds_and_rescales_position() {
        let (mut controller, clock, log) = controller(Duration::from_secs(60));
        controller.load(asset(10));
        controller.play().expect("play");
        let first = controller.graph().expect("graph");

        clock.advance(4.0);
        controller.set_speed(0.5).expect("speed");
        let state = controller.state();
        assert_eq!(state.status, PlaybackStatus::Playing);
        assert!((state.duration_seconds - 20.0).abs() < 1e-9);
        assert!((state.position_seconds - 8.0).abs() < 1e-9);
        assert!(first.is_torn_down());

        let second = controller.graph().expect("graph");
        assert_eq!(second.rate(), 0.5);
        assert_eq!(log.lock().unwrap().starts, 2);
    }

    #[test]
    fn output_failure_surfaces_and_leaves_transport_stopped() {
        let clock = Arc::new(ManualClock::default());
        let output = MockOutput {
            log: Arc::new(Mutex::new(OutputLog::default())),
            fail: true,
        };
        let mut controller =
            PlaybackController::with_clock(Box::new(output), clock, Duration::from_secs(60));
        controller.load(asset(2));
        assert!(matches!(
            controller.play(),
            Err(PlaybackError::OutputUnavailable(_))
        ));
        assert_eq!(controller.status(), PlaybackStatus::Stopped);
    }

    #[test]
    fn load_resets_transport() {
        let (mut controller, clock, _) = controller(Duration::from_secs(60));
        controller.load(asset(10));
        controller.play().expect("play");
        clock.advance(3.0);
        controller.pause();

        controller.load(asset(4));
        let state = controller.state();
        assert_eq!(state.status, PlaybackStatus::Stopped);
        assert_eq!(state.position_seconds, 0.0);
        assert!((state.duration_seconds - 4.0).abs() < 1e-9);
    }
}
