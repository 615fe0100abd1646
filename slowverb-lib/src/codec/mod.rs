//! Turning rendered audio into downloadable bytes.
//!
//! WAV always works. MP3 is attempted only when an encoder is installed, and
//! any MP3 failure falls back to WAV. [`EncodedAudio::format`] reports what
//! was actually produced.

#[cfg(feature = "mp3")]
pub mod lame;
pub mod mp3;
pub mod wav;

use std::fmt;
use std::str::FromStr;

use log::{info, warn};

use crate::audio::RenderedExport;

pub use mp3::Mp3Encoder;
pub use wav::{encode_wav, float_to_pcm16, WavHeader};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Wav,
    Mp3,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Wav => "wav",
            ExportFormat::Mp3 => "mp3",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ExportFormat::Wav => "audio/wav",
            ExportFormat::Mp3 => "audio/mp3",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "wav" | "wave" => Ok(ExportFormat::Wav),
            "mp3" => Ok(ExportFormat::Mp3),
            other => Err(format!("unsupported export format \"{}\"", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// No encoder is available for the requested format.
    Unavailable,
    /// The encoder ran and failed.
    Failed(String),
    /// The export does not fit in a WAV container.
    TooLarge,
    InvalidHeader(String),
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable => write!(f, "encoder unavailable"),
            Self::Failed(reason) => write!(f, "encoding failed: {}", reason),
            Self::TooLarge => write!(f, "audio too large for a WAV container"),
            Self::InvalidHeader(reason) => write!(f, "invalid WAV header: {}", reason),
        }
    }
}

impl std::error::Error for EncodeError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedAudio {
    pub format: ExportFormat,
    pub bytes: Vec<u8>,
}

impl EncodedAudio {
    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }
}

#[derive(Default)]
pub struct SampleCodec {
    mp3: Option<Box<dyn Mp3Encoder>>,
}

impl fmt::Debug for SampleCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SampleCodec")
            .field("mp3", &self.mp3.is_some())
            .finish()
    }
}

impl SampleCodec {
    /// Codec with WAV support only.
    pub fn new() -> Self {
        Self::default()
    }

    /// Codec with every encoder compiled into this build.
    pub fn with_default_encoders() -> Self {
        Self {
            mp3: default_mp3_encoder(),
        }
    }

    pub fn with_mp3_encoder(encoder: Box<dyn Mp3Encoder>) -> Self {
        Self { mp3: Some(encoder) }
    }

    pub fn set_mp3_encoder(&mut self, encoder: Option<Box<dyn Mp3Encoder>>) {
        self.mp3 = encoder;
    }

    pub fn mp3_available(&self) -> bool {
        self.mp3.is_some()
    }

    /// Encode `export` as `requested`, falling back to WAV when MP3 cannot be
    /// produced. Only a WAV failure is returned as an error.
    pub fn encode(
        &self,
        export: &RenderedExport,
        requested: ExportFormat,
    ) -> Result<EncodedAudio, EncodeError> {
        if requested == ExportFormat::Mp3 {
            match self.encode_mp3(export) {
                Ok(bytes) => {
                    let kbps = self.mp3.as_ref().map(|e| e.bitrate_kbps()).unwrap_or(0);
                    info!("encoded {} bytes of mp3 at {} kbps", bytes.len(), kbps);
                    return Ok(EncodedAudio {
                        format: ExportFormat::Mp3,
                        bytes,
                    });
                }
                Err(err) => warn!("mp3 export unavailable ({}), falling back to wav", err),
            }
        }

        let bytes = encode_wav(export)?;
        info!("encoded {} bytes of wav", bytes.len());
        Ok(EncodedAudio {
            format: ExportFormat::Wav,
            bytes,
        })
    }

    fn encode_mp3(&self, export: &RenderedExport) -> Result<Vec<u8>, EncodeError> {
        let encoder = self.mp3.as_ref().ok_or(EncodeError::Unavailable)?;
        let bytes = encoder.encode(export)?;
        if bytes.is_empty() {
            return Err(EncodeError::Failed("encoder produced no data".to_string()));
        }
        Ok(bytes)
    }
}

#[cfg(feature = "mp3")]
fn default_mp3_encoder() -> Option<Box<dyn Mp3Encoder>> {
    Some(Box::new(lame::LameEncoder::default()))
}

#[cfg(not(feature = "mp3"))]
fn default_mp3_encoder() -> Option<Box<dyn Mp3Encoder>> {
    None
}
