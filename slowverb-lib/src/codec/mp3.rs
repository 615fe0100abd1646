//! Pluggable MP3 encoding.
//!
//! With the `mp3` feature the library ships a LAME-backed encoder and
//! [`SampleCodec::with_default_encoders`](super::SampleCodec::with_default_encoders)
//! installs it. Hosts may plug in their own [`Mp3Encoder`]; without one every
//! MP3 request falls back to WAV.

use super::EncodeError;
use crate::audio::RenderedExport;

pub const DEFAULT_MP3_BITRATE_KBPS: u32 = 128;

pub trait Mp3Encoder: Send + Sync {
    /// Encode the whole export into MP3 bytes.
    fn encode(&self, export: &RenderedExport) -> Result<Vec<u8>, EncodeError>;

    fn bitrate_kbps(&self) -> u32 {
        DEFAULT_MP3_BITRATE_KBPS
    }
}

impl<F> Mp3Encoder for F
where
    F: Fn(&RenderedExport) -> Result<Vec<u8>, EncodeError> + Send + Sync,
{
    fn encode(&self, export: &RenderedExport) -> Result<Vec<u8>, EncodeError> {
        self(export)
    }
}
