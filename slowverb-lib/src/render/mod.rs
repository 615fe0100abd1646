//! Offline rendering: the live graph, drained as fast as possible.

use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use log::{error, info};

use crate::audio::{AudioAsset, RenderedExport};
use crate::graph::{build_graph, Destination, GraphError};
use crate::settings::EffectSettings;

/// Render `asset` through a fresh offline graph.
///
/// The result has `ceil(frames / speed)` frames at the asset's sample rate and
/// channel count.
pub fn render_offline(
    asset: &Arc<AudioAsset>,
    settings: &EffectSettings,
) -> Result<RenderedExport, GraphError> {
    let started = Instant::now();
    let (_handle, source) = build_graph(asset.clone(), settings, Destination::Offline)?;
    let channels = source.render_to_end();

    let export = RenderedExport::new(asset.sample_rate(), channels).ok_or(GraphError::EmptyAsset)?;
    info!(
        "offline render: {} frames in {:.1} ms",
        export.frame_count(),
        started.elapsed().as_secs_f64() * 1000.0
    );
    Ok(export)
}

/// Render on a worker thread. The receiver yields exactly one result.
pub fn render_offline_in_background(
    asset: Arc<AudioAsset>,
    settings: EffectSettings,
) -> Receiver<Result<RenderedExport, GraphError>> {
    let (sender, receiver) = mpsc::channel();
    thread::spawn(move || {
        let result = render_offline(&asset, &settings);
        if let Err(err) = &result {
            error!("offline render failed: {}", err);
        }
        let _ = sender.send(result);
    });
    receiver
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noise_asset(seconds: f32, channels: usize, sample_rate: u32) -> Arc<AudioAsset> {
        let frames = (seconds * sample_rate as f32) as usize;
        let data = (0..channels)
            .map(|c| {
                (0..frames)
                    .map(|n| (((n * 31 + c * 17) % 97) as f32 / 97.0) - 0.5)
                    .collect()
            })
            .collect();
        Arc::new(AudioAsset::new(sample_rate, data).expect("asset"))
    }

    #[test]
    fn frame_count_follows_speed() {
        let asset = noise_asset(0.5, 1, 8_000);
        for speed in [0.5_f32, 0.75, 0.85, 1.0, 1.3, 2.0] {
            let settings = EffectSettings {
                speed,
                ..Default::default()
            };
            let export = render_offline(&asset, &settings).expect("render");
            let expected = (4_000.0 / speed as f64).ceil() as usize;
            assert!(
                export.frame_count().abs_diff(expected) <= 1,
                "speed {}: {} frames, expected {}",
                speed,
                export.frame_count(),
                expected
            );
        }
    }

    #[test]
    fn export_keeps_rate_and_channels() {
        let asset = noise_asset(0.25, 2, 22_050);
        let export = render_offline(&asset, &EffectSettings::default()).expect("render");
        assert_eq!(export.sample_rate(), 22_050);
        assert_eq!(export.channel_count(), 2);
        assert!(export.interleaved().all(|s| s.is_finite()));
    }

    #[test]
    fn zero_length_asset_fails() {
        let asset = Arc::new(AudioAsset::new(44_100, vec![Vec::new(), Vec::new()]).expect("asset"));
        let result = render_offline(&asset, &EffectSettings::default());
        assert_eq!(result.err(), Some(GraphError::EmptyAsset));
    }

    #[test]
    fn background_render_delivers_one_result() {
        let asset = noise_asset(0.1, 1, 8_000);
        let receiver = render_offline_in_background(asset, EffectSettings::default());
        let result = receiver.recv().expect("render result");
        assert_eq!(result.expect("render").frame_count(), 942);
        assert!(receiver.recv().is_err());
    }
}
