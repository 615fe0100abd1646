//! MP3 encoding through LAME, compiled with the `mp3` feature.

use mp3lame_encoder::{max_required_buffer_size, Bitrate, Builder, DualPcm, FlushNoGap, MonoPcm, Quality};

use super::mp3::{Mp3Encoder, DEFAULT_MP3_BITRATE_KBPS};
use super::wav::float_to_pcm16;
use super::EncodeError;
use crate::audio::RenderedExport;

/// Frames handed to the encoder per call.
pub const MP3_BLOCK_FRAMES: usize = 1152;

/// Constant-bitrate LAME encoder. Mono exports stay mono; anything wider is
/// encoded from its first two channels.
#[derive(Debug, Clone, Copy)]
pub struct LameEncoder {
    bitrate_kbps: u32,
}

impl Default for LameEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_MP3_BITRATE_KBPS)
    }
}

impl LameEncoder {
    /// Unsupported rates snap to the nearest lower LAME bitrate.
    pub fn new(bitrate_kbps: u32) -> Self {
        Self {
            bitrate_kbps: lame_bitrate(bitrate_kbps).1,
        }
    }
}

fn lame_bitrate(kbps: u32) -> (Bitrate, u32) {
    match kbps {
        0..=95 => (Bitrate::Kbps64, 64),
        96..=127 => (Bitrate::Kbps96, 96),
        128..=159 => (Bitrate::Kbps128, 128),
        160..=191 => (Bitrate::Kbps160, 160),
        192..=255 => (Bitrate::Kbps192, 192),
        256..=319 => (Bitrate::Kbps256, 256),
        _ => (Bitrate::Kbps320, 320),
    }
}

fn failed(stage: &str, err: impl std::fmt::Debug) -> EncodeError {
    EncodeError::Failed(format!("lame {}: {:?}", stage, err))
}

impl Mp3Encoder for LameEncoder {
    fn encode(&self, export: &RenderedExport) -> Result<Vec<u8>, EncodeError> {
        let stereo = export.channel_count() >= 2;
        let mut builder = Builder::new().ok_or_else(|| failed("init", "no encoder"))?;
        builder
            .set_num_channels(if stereo { 2 } else { 1 })
            .map_err(|err| failed("channels", err))?;
        builder
            .set_sample_rate(export.sample_rate())
            .map_err(|err| failed("sample rate", err))?;
        builder
            .set_brate(lame_bitrate(self.bitrate_kbps).0)
            .map_err(|err| failed("bitrate", err))?;
        builder
            .set_quality(Quality::Good)
            .map_err(|err| failed("quality", err))?;
        let mut encoder = builder.build().map_err(|err| failed("build", err))?;

        let left: Vec<i16> = export.channel(0).iter().copied().map(float_to_pcm16).collect();
        let right: Vec<i16> = if stereo {
            export.channel(1).iter().copied().map(float_to_pcm16).collect()
        } else {
            Vec::new()
        };

        let mut out = Vec::with_capacity(max_required_buffer_size(left.len()));
        for start in (0..left.len()).step_by(MP3_BLOCK_FRAMES) {
            let end = (start + MP3_BLOCK_FRAMES).min(left.len());
            out.reserve(max_required_buffer_size(end - start));
            let written = if stereo {
                let block = DualPcm {
                    left: &left[start..end],
                    right: &right[start..end],
                };
                encoder.encode(block, out.spare_capacity_mut())
            } else {
                encoder.encode(MonoPcm(&left[start..end]), out.spare_capacity_mut())
            }
            .map_err(|err| failed("encode", err))?;
            // SAFETY: the encoder initialized `written` bytes of spare capacity.
            unsafe { out.set_len(out.len() + written) };
        }

        out.reserve(max_required_buffer_size(MP3_BLOCK_FRAMES));
        let written = encoder
            .flush::<FlushNoGap>(out.spare_capacity_mut())
            .map_err(|err| failed("flush", err))?;
        // SAFETY: as above, for the flushed tail.
        unsafe { out.set_len(out.len() + written) };

        Ok(out)
    }

    fn bitrate_kbps(&self) -> u32 {
        self.bitrate_kbps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(channels: usize, seconds: f32) -> RenderedExport {
        let sample_rate = 44_100;
        let frames = (seconds * sample_rate as f32) as usize;
        let signal: Vec<f32> = (0..frames)
            .map(|n| (2.0 * std::f32::consts::PI * 440.0 * n as f32 / sample_rate as f32).sin() * 0.5)
            .collect();
        RenderedExport::new(sample_rate, vec![signal; channels]).expect("export")
    }

    fn has_frame_sync(bytes: &[u8]) -> bool {
        bytes.windows(2).any(|w| w[0] == 0xFF && w[1] & 0xE0 == 0xE0)
    }

    #[test]
    fn default_bitrate_is_128() {
        assert_eq!(LameEncoder::default().bitrate_kbps(), 128);
        assert_eq!(LameEncoder::new(130).bitrate_kbps(), 128);
        assert_eq!(LameEncoder::new(1_000).bitrate_kbps(), 320);
    }

    #[test]
    fn stereo_export_encodes_to_mp3_frames() {
        let bytes = LameEncoder::default().encode(&tone(2, 1.0)).expect("mp3");
        assert!(has_frame_sync(&bytes));
        // One second at 128 kbps is about 16 kB.
        assert!(bytes.len() > 8_000 && bytes.len() < 32_000, "{} bytes", bytes.len());
    }

    #[test]
    fn mono_export_encodes() {
        let bytes = LameEncoder::default().encode(&tone(1, 0.5)).expect("mp3");
        assert!(has_frame_sync(&bytes));
    }
}
