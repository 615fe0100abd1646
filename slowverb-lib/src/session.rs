//! One-file editing session: load, audition, export.
//!
//! `Session` is the surface a UI talks to. It owns the playback controller,
//! the sample codec and the name of the loaded file, and exposes the busy
//! flags a UI needs to grey out controls.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::RecvError;
use std::sync::Arc;

use log::{error, info, warn};

use crate::audio::{decode_bytes, decode_file, DecodeError};
use crate::codec::{EncodeError, ExportFormat, Mp3Encoder, SampleCodec};
use crate::graph::GraphError;
use crate::playback::{AudioOutput, PlaybackController, PlaybackError, PlaybackState};
use crate::render::render_offline_in_background;
use crate::settings::{EffectSettings, EqPreset};

/// Brand segment of default export names.
pub const DEFAULT_BRAND: &str = "slowedandreverbgenerator.com";

#[derive(Debug)]
pub enum SessionError {
    Decode(DecodeError),
    Render(GraphError),
    /// The render worker exited without delivering a result.
    RenderInterrupted,
    Encode(EncodeError),
    Playback(PlaybackError),
    Io(std::io::Error),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decode(err) => write!(f, "could not load audio: {}", err),
            Self::Render(err) => write!(f, "export failed: {}", err),
            Self::RenderInterrupted => write!(f, "export failed: render worker exited"),
            Self::Encode(err) => write!(f, "export failed: {}", err),
            Self::Playback(err) => write!(f, "{}", err),
            Self::Io(err) => write!(f, "failed to write export: {}", err),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Decode(err) => Some(err),
            Self::Render(err) => Some(err),
            Self::RenderInterrupted => None,
            Self::Encode(err) => Some(err),
            Self::Playback(err) => Some(err),
            Self::Io(err) => Some(err),
        }
    }
}

impl From<DecodeError> for SessionError {
    fn from(err: DecodeError) -> Self {
        Self::Decode(err)
    }
}

impl From<GraphError> for SessionError {
    fn from(err: GraphError) -> Self {
        Self::Render(err)
    }
}

impl From<EncodeError> for SessionError {
    fn from(err: EncodeError) -> Self {
        Self::Encode(err)
    }
}

impl From<PlaybackError> for SessionError {
    fn from(err: PlaybackError) -> Self {
        Self::Playback(err)
    }
}

impl From<std::io::Error> for SessionError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<RecvError> for SessionError {
    fn from(_: RecvError) -> Self {
        Self::RenderInterrupted
    }
}

/// A finished export, ready to be saved or offered for download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportBlob {
    pub file_name: String,
    pub mime_type: &'static str,
    pub format: ExportFormat,
    pub bytes: Vec<u8>,
}

impl ExportBlob {
    /// Write the blob. A directory target receives the blob's own file name.
    pub fn write_to(&self, target: &Path) -> Result<PathBuf, SessionError> {
        let path = if target.is_dir() {
            target.join(&self.file_name)
        } else {
            target.to_path_buf()
        };
        fs::write(&path, &self.bytes)?;
        info!("wrote {} ({} bytes)", path.display(), self.bytes.len());
        Ok(path)
    }
}

/// Sets a flag for the lifetime of the guard.
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn set(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::Release);
        Self(flag)
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Session {
    controller: PlaybackController,
    codec: SampleCodec,
    file_name: Option<String>,
    brand: String,
    loading: Arc<AtomicBool>,
    processing: Arc<AtomicBool>,
}

impl Session {
    pub fn new(output: Box<dyn AudioOutput>) -> Self {
        Self::with_controller(PlaybackController::new(output))
    }

    pub fn with_controller(controller: PlaybackController) -> Self {
        let processing = controller.exporting_flag();
        Self {
            controller,
            codec: SampleCodec::with_default_encoders(),
            file_name: None,
            brand: DEFAULT_BRAND.to_string(),
            loading: Arc::new(AtomicBool::new(false)),
            processing,
        }
    }

    pub fn set_brand(&mut self, brand: impl Into<String>) {
        self.brand = brand.into();
    }

    pub fn brand(&self) -> &str {
        &self.brand
    }

    pub fn set_mp3_encoder(&mut self, encoder: Option<Box<dyn Mp3Encoder>>) {
        self.codec.set_mp3_encoder(encoder);
    }

    /// Decode a file from disk and make it the current asset.
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<(), SessionError> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let loading = self.loading.clone();
        let _busy = BusyGuard::set(&loading);
        self.controller.unload();
        self.file_name = None;
        let result = decode_file(path);
        self.install(name, result)
    }

    /// Decode an in-memory upload named `name` and make it the current asset.
    pub fn load_bytes(&mut self, name: &str, bytes: Vec<u8>) -> Result<(), SessionError> {
        let loading = self.loading.clone();
        let _busy = BusyGuard::set(&loading);
        self.controller.unload();
        self.file_name = None;
        let hint = Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());
        let result = decode_bytes(bytes, hint.as_deref());
        self.install(name.to_string(), result)
    }

    fn install(
        &mut self,
        name: String,
        result: Result<crate::audio::AudioAsset, DecodeError>,
    ) -> Result<(), SessionError> {
        match result {
            Ok(asset) => {
                info!(
                    "loaded {}: {:.2}s, {} ch @ {} Hz",
                    name,
                    asset.duration_seconds(),
                    asset.channel_count(),
                    asset.sample_rate()
                );
                self.controller.load(asset.into_shared());
                self.file_name = Some(name);
                Ok(())
            }
            Err(err) => {
                error!("failed to load {}: {}", name, err);
                Err(err.into())
            }
        }
    }

    /// Render the current asset with the current settings and encode it.
    ///
    /// Returns `Ok(None)` when there is nothing to export or an export is
    /// already running.
    pub fn export(
        &mut self,
        format: ExportFormat,
        file_name_override: Option<&str>,
    ) -> Result<Option<ExportBlob>, SessionError> {
        let Some(asset) = self.controller.asset().cloned() else {
            return Ok(None);
        };
        if self.processing.load(Ordering::Acquire) {
            warn!("export already in progress");
            return Ok(None);
        }

        let processing = self.processing.clone();
        let _busy = BusyGuard::set(&processing);
        let settings = self.controller.settings();
        info!("exporting {} (speed {:.2})", format, settings.speed);

        let rendered = render_offline_in_background(asset, settings).recv()??;
        let encoded = self.codec.encode(&rendered, format)?;

        let file_name = match file_name_override {
            Some(name) => name.to_string(),
            None => default_export_name(
                self.file_name.as_deref().unwrap_or("audio"),
                &self.brand,
                encoded.format,
            ),
        };

        Ok(Some(ExportBlob {
            file_name,
            mime_type: encoded.mime_type(),
            format: encoded.format,
            bytes: encoded.bytes,
        }))
    }

    pub fn play(&mut self) -> Result<(), SessionError> {
        Ok(self.controller.play()?)
    }

    pub fn pause(&mut self) {
        self.controller.pause();
    }

    pub fn stop(&mut self) {
        self.controller.stop();
    }

    pub fn seek(&mut self, seconds: f64) -> Result<(), SessionError> {
        Ok(self.controller.seek(seconds)?)
    }

    pub fn set_speed(&mut self, speed: f32) -> Result<(), SessionError> {
        Ok(self.controller.set_speed(speed)?)
    }

    pub fn set_reverb_mix(&mut self, reverb_mix: f32) {
        self.controller.set_reverb_mix(reverb_mix);
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.controller.set_volume(volume);
    }

    pub fn set_eq_gain(&mut self, band: usize, gain_db: f32) {
        self.controller.set_eq_gain(band, gain_db);
    }

    pub fn apply_preset(&mut self, preset: EqPreset) {
        self.controller.apply_preset(preset);
    }

    /// Replace every setting at once. A speed change rebuilds the graph.
    pub fn set_settings(&mut self, settings: &EffectSettings) -> Result<(), SessionError> {
        if settings.speed != self.controller.settings().speed {
            self.controller.set_settings(settings)?;
        } else {
            self.controller.retune(settings);
        }
        Ok(())
    }

    pub fn settings(&self) -> EffectSettings {
        self.controller.settings()
    }

    pub fn state(&self) -> PlaybackState {
        self.controller.state()
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub fn has_audio(&self) -> bool {
        self.controller.asset().is_some()
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Acquire)
    }

    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::Acquire)
    }

    pub fn controller(&self) -> &PlaybackController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut PlaybackController {
        &mut self.controller
    }
}

/// `<base>_Slower+Reverb_<brand>.<ext>`, where `<base>` is `file_name` without
/// its final extension.
pub fn default_export_name(file_name: &str, brand: &str, format: ExportFormat) -> String {
    format!(
        "{}_Slower+Reverb_{}.{}",
        strip_extension(file_name),
        brand,
        format.extension()
    )
}

fn strip_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(index) if index + 1 < name.len() && !name[index + 1..].contains('/') => {
            &name[..index]
        }
        _ => name,
    }
}

/// Render seconds as `m:ss`, truncating fractions.
pub fn format_time(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    format!("{}:{:02}", total / 60, total % 60)
}
