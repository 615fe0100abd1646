//! Decode uploaded media into an [`AudioAsset`] with Symphonia.

use std::fmt;
use std::fs::File;
use std::io::Cursor;
use std::path::Path;

use log::{debug, warn};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::buffer::{deinterleave, AudioAsset};

/// Failure to turn input bytes into an [`AudioAsset`].
#[derive(Debug)]
pub enum DecodeError {
    Io(std::io::Error),
    Unsupported(String),
    Decode(String),
    NoAudioTrack,
    InvalidAsset(String),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read audio file: {}", err),
            Self::Unsupported(what) => write!(f, "unsupported audio format: {}", what),
            Self::Decode(err) => write!(f, "failed to decode audio: {}", err),
            Self::NoAudioTrack => write!(f, "no decodable audio track found"),
            Self::InvalidAsset(reason) => write!(f, "decoded audio is invalid: {}", reason),
        }
    }
}

impl std::error::Error for DecodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for DecodeError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<Error> for DecodeError {
    fn from(err: Error) -> Self {
        match err {
            Error::IoError(err) => Self::Io(err),
            Error::Unsupported(what) => Self::Unsupported(what.to_string()),
            other => Self::Decode(other.to_string()),
        }
    }
}

/// Decode a file on disk. The extension is used as a probe hint.
pub fn decode_file(path: impl AsRef<Path>) -> Result<AudioAsset, DecodeError> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());
    decode_source(Box::new(file), extension.as_deref())
}

/// Decode an in-memory file, e.g. an upload that never touched the disk.
pub fn decode_bytes(bytes: Vec<u8>, extension_hint: Option<&str>) -> Result<AudioAsset, DecodeError> {
    decode_source(Box::new(Cursor::new(bytes)), extension_hint)
}

fn open_reader(
    source: Box<dyn MediaSource>,
    extension_hint: Option<&str>,
) -> Result<Box<dyn FormatReader>, DecodeError> {
    let mut hint = Hint::new();
    if let Some(extension) = extension_hint {
        hint.with_extension(extension);
    }

    let mss = MediaSourceStream::new(source, Default::default());
    let format_opts: FormatOptions = Default::default();
    let metadata_opts: MetadataOptions = Default::default();

    let probed =
        symphonia::default::get_probe().format(&hint, mss, &format_opts, &metadata_opts)?;
    Ok(probed.format)
}

fn decode_source(
    source: Box<dyn MediaSource>,
    extension_hint: Option<&str>,
) -> Result<AudioAsset, DecodeError> {
    let mut format = open_reader(source, extension_hint)?;

    let track = format
        .tracks()
        .iter()
        .find(|track| track.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(DecodeError::NoAudioTrack)?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate;
    let mut channel_count = track
        .codec_params
        .channels
        .map(|channels| channels.count())
        .unwrap_or(0);

    let dec_opts: DecoderOptions = Default::default();
    let mut decoder = symphonia::default::get_codecs().make(&track.codec_params, &dec_opts)?;

    let mut interleaved: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(Error::IoError(err)) if err.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(Error::ResetRequired) => {
                return Err(DecodeError::Decode(
                    "decoder reset required mid-stream".to_string(),
                ));
            }
            Err(err) => return Err(err.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                if channel_count == 0 {
                    channel_count = spec.channels.count();
                }
                if sample_rate.is_none() {
                    sample_rate = Some(spec.rate);
                }

                let needs_alloc = sample_buf
                    .as_ref()
                    .map(|buf| buf.capacity() < decoded.capacity() * spec.channels.count())
                    .unwrap_or(true);
                if needs_alloc {
                    sample_buf = Some(SampleBuffer::<f32>::new(decoded.capacity() as u64, spec));
                }

                if let Some(buf) = sample_buf.as_mut() {
                    buf.copy_interleaved_ref(decoded);
                    interleaved.extend_from_slice(buf.samples());
                }
            }
            Err(Error::DecodeError(err)) => {
                warn!("skipping corrupt packet: {}", err);
            }
            Err(err) => return Err(err.into()),
        }
    }

    let sample_rate = sample_rate
        .filter(|rate| *rate > 0)
        .ok_or_else(|| DecodeError::InvalidAsset("missing sample rate".to_string()))?;
    if channel_count == 0 {
        return Err(DecodeError::InvalidAsset("no channels".to_string()));
    }

    let channels = deinterleave(&interleaved, channel_count);
    let asset = AudioAsset::new(sample_rate, channels)
        .ok_or_else(|| DecodeError::InvalidAsset("ragged channel data".to_string()))?;
    debug!(
        "decoded {} frames, {} channels at {} Hz",
        asset.frame_count(),
        asset.channel_count(),
        asset.sample_rate()
    );
    Ok(asset)
}
