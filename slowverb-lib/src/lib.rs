//! # Slowverb Audio Library
//!
//! Core of a "slowed + reverb" processor: decode a file, run it through a
//! speed / 9-band EQ / convolution reverb graph, audition it live, and export
//! the result as WAV (or MP3 when an encoder is plugged in).

pub mod audio;
pub mod codec;
#[cfg(feature = "bench")]
pub mod diagnostics;
pub mod dsp;
pub mod graph;
pub mod playback;
pub mod render;
pub mod session;
pub mod settings;

pub use audio::{AudioAsset, RenderedExport};
pub use codec::{ExportFormat, SampleCodec};
pub use playback::{PlaybackController, PlaybackState, PlaybackStatus};
pub use session::{format_time, ExportBlob, Session, SessionError};
pub use settings::{EffectSettings, EqPreset};
