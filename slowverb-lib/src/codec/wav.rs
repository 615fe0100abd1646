//! Canonical 44-byte RIFF/WAVE writer for 16-bit PCM.

use super::EncodeError;
use crate::audio::RenderedExport;

pub const WAV_HEADER_LEN: usize = 44;
const BITS_PER_SAMPLE: u16 = 16;
const PCM_FORMAT: u16 = 1;

/// Quantize a float sample to signed 16-bit PCM.
///
/// Samples are clamped to `[-1, 1]`, then negatives scale by `0x8000` and
/// positives by `0x7FFF`, truncating toward zero.
pub fn float_to_pcm16(sample: f32) -> i16 {
    if sample.is_nan() {
        return 0;
    }
    let sample = sample.clamp(-1.0, 1.0);
    if sample < 0.0 {
        (sample * 32_768.0) as i16
    } else {
        (sample * 32_767.0) as i16
    }
}

/// Encode `export` as a WAV file: header plus interleaved little-endian PCM.
pub fn encode_wav(export: &RenderedExport) -> Result<Vec<u8>, EncodeError> {
    let channels = u16::try_from(export.channel_count())
        .map_err(|_| EncodeError::TooLarge)?;
    let sample_rate = export.sample_rate();
    let block_align = channels
        .checked_mul(BITS_PER_SAMPLE / 8)
        .ok_or(EncodeError::TooLarge)?;
    let byte_rate = sample_rate
        .checked_mul(block_align as u32)
        .ok_or(EncodeError::TooLarge)?;
    let data_size = export
        .frame_count()
        .checked_mul(block_align as usize)
        .and_then(|size| u32::try_from(size).ok())
        .filter(|size| size.checked_add(36).is_some())
        .ok_or(EncodeError::TooLarge)?;
    let file_size = 36 + data_size;

    let mut buf = Vec::with_capacity(WAV_HEADER_LEN + data_size as usize);

    buf.extend_from_slice(b"RIFF");
    buf.extend_from_slice(&file_size.to_le_bytes());
    buf.extend_from_slice(b"WAVE");

    buf.extend_from_slice(b"fmt ");
    buf.extend_from_slice(&16u32.to_le_bytes());
    buf.extend_from_slice(&PCM_FORMAT.to_le_bytes());
    buf.extend_from_slice(&channels.to_le_bytes());
    buf.extend_from_slice(&sample_rate.to_le_bytes());
    buf.extend_from_slice(&byte_rate.to_le_bytes());
    buf.extend_from_slice(&block_align.to_le_bytes());
    buf.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());

    buf.extend_from_slice(b"data");
    buf.extend_from_slice(&data_size.to_le_bytes());
    for sample in export.interleaved() {
        buf.extend_from_slice(&float_to_pcm16(sample).to_le_bytes());
    }

    Ok(buf)
}

/// Fields of a canonical WAV header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    pub channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
    pub data_size: u32,
}

impl WavHeader {
    /// Read the header written by [`encode_wav`].
    pub fn parse(bytes: &[u8]) -> Result<Self, EncodeError> {
        if bytes.len() < WAV_HEADER_LEN {
            return Err(EncodeError::InvalidHeader("shorter than 44 bytes".to_string()));
        }
        expect_tag(bytes, 0, b"RIFF")?;
        expect_tag(bytes, 8, b"WAVE")?;
        expect_tag(bytes, 12, b"fmt ")?;
        expect_tag(bytes, 36, b"data")?;

        if read_u16(bytes, 20) != PCM_FORMAT {
            return Err(EncodeError::InvalidHeader("not PCM".to_string()));
        }

        Ok(Self {
            channels: read_u16(bytes, 22),
            sample_rate: read_u32(bytes, 24),
            byte_rate: read_u32(bytes, 28),
            block_align: read_u16(bytes, 32),
            bits_per_sample: read_u16(bytes, 34),
            data_size: read_u32(bytes, 40),
        })
    }

    pub fn frame_count(&self) -> usize {
        if self.block_align == 0 {
            return 0;
        }
        self.data_size as usize / self.block_align as usize
    }
}

fn expect_tag(bytes: &[u8], offset: usize, tag: &[u8; 4]) -> Result<(), EncodeError> {
    if &bytes[offset..offset + 4] != tag {
        return Err(EncodeError::InvalidHeader(format!(
            "missing {} marker at byte {}",
            String::from_utf8_lossy(tag),
            offset
        )));
    }
    Ok(())
}

fn read_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}
