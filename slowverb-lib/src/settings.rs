//! User-driven effect settings and the clamp rules applied before any stage
//! sees them.
//!
//! Every value that reaches the effect graph passes through one of the
//! `clamp_*` functions below. Both the live graph and the offline renderer
//! go through [`EffectSettings::clamped`], so the bounds live in one place.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Center frequencies (Hz) of the fixed equalizer bands.
pub const EQ_FREQUENCIES_HZ: [f32; EQ_BAND_COUNT] = [
    60.0, 170.0, 310.0, 600.0, 1_000.0, 3_000.0, 6_000.0, 12_000.0, 16_000.0,
];
/// Number of equalizer bands.
pub const EQ_BAND_COUNT: usize = 9;
/// Q factor shared by every equalizer band.
pub const EQ_Q: f32 = 1.0;

pub const MIN_SPEED: f32 = 0.5;
pub const MAX_SPEED: f32 = 2.0;
pub const MIN_EQ_GAIN_DB: f32 = -12.0;
pub const MAX_EQ_GAIN_DB: f32 = 12.0;

const DEFAULT_SPEED: f32 = 0.85;
const DEFAULT_REVERB_MIX: f32 = 0.5;
const DEFAULT_VOLUME: f32 = 1.0;
const DEFAULT_EQ_GAIN_DB: f32 = 0.0;

/// Snapshot of the parameters driving the effect graph.
///
/// Values may be out of domain while stored; they are sanitized when applied.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectSettings {
    pub speed: f32,
    pub reverb_mix: f32,
    pub volume: f32,
    pub eq_gains: [f32; EQ_BAND_COUNT],
}

impl Default for EffectSettings {
    fn default() -> Self {
        Self {
            speed: DEFAULT_SPEED,
            reverb_mix: DEFAULT_REVERB_MIX,
            volume: DEFAULT_VOLUME,
            eq_gains: [DEFAULT_EQ_GAIN_DB; EQ_BAND_COUNT],
        }
    }
}

impl EffectSettings {
    /// Return a copy with every field clamped into its domain.
    pub fn clamped(&self) -> Self {
        let mut eq_gains = [DEFAULT_EQ_GAIN_DB; EQ_BAND_COUNT];
        for (out, gain) in eq_gains.iter_mut().zip(self.eq_gains.iter()) {
            *out = clamp_eq_gain(*gain);
        }

        Self {
            speed: clamp_speed(self.speed),
            reverb_mix: clamp_reverb_mix(self.reverb_mix),
            volume: clamp_volume(self.volume),
            eq_gains,
        }
    }

    /// Gain applied to the unprocessed (EQ) path.
    pub fn dry_gain(&self) -> f32 {
        1.0 - clamp_reverb_mix(self.reverb_mix)
    }

    /// Gain applied to the convolution path.
    pub fn wet_gain(&self) -> f32 {
        clamp_reverb_mix(self.reverb_mix)
    }

    /// Replace all EQ gains with a preset curve.
    pub fn apply_preset(&mut self, preset: EqPreset) {
        self.eq_gains = preset.gains();
    }

    /// Parse settings from a JSON document. Missing fields use defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize settings as pretty-printed JSON.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Clamp a playback rate multiplier into `[0.5, 2.0]`.
pub fn clamp_speed(speed: f32) -> f32 {
    sanitize(speed, MIN_SPEED, MAX_SPEED, DEFAULT_SPEED)
}

/// Clamp a dry/wet ratio into `[0, 1]`.
pub fn clamp_reverb_mix(mix: f32) -> f32 {
    sanitize(mix, 0.0, 1.0, DEFAULT_REVERB_MIX)
}

/// Clamp an output gain into `[0, 1]`.
pub fn clamp_volume(volume: f32) -> f32 {
    sanitize(volume, 0.0, 1.0, DEFAULT_VOLUME)
}

/// Clamp a band gain (dB) into `[-12, 12]`.
pub fn clamp_eq_gain(gain_db: f32) -> f32 {
    sanitize(gain_db, MIN_EQ_GAIN_DB, MAX_EQ_GAIN_DB, DEFAULT_EQ_GAIN_DB)
}

fn sanitize(value: f32, min: f32, max: f32, fallback: f32) -> f32 {
    if !value.is_finite() {
        return fallback;
    }
    value.clamp(min, max)
}

/// Named EQ curves offered to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EqPreset {
    Flat,
    BassBoost,
    TrebleBoost,
    VocalBoost,
    Electronic,
    Rock,
    Classical,
}

impl EqPreset {
    pub const ALL: [EqPreset; 7] = [
        EqPreset::Flat,
        EqPreset::BassBoost,
        EqPreset::TrebleBoost,
        EqPreset::VocalBoost,
        EqPreset::Electronic,
        EqPreset::Rock,
        EqPreset::Classical,
    ];

    /// Band gains (dB) of the preset, lowest band first.
    pub fn gains(self) -> [f32; EQ_BAND_COUNT] {
        match self {
            EqPreset::Flat => [0.0; EQ_BAND_COUNT],
            EqPreset::BassBoost => [10.0, 8.0, 6.0, 3.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            EqPreset::TrebleBoost => [0.0, 0.0, 0.0, 0.0, 0.0, 3.0, 6.0, 8.0, 10.0],
            EqPreset::VocalBoost => [0.0, 0.0, 0.0, 3.0, 6.0, 6.0, 3.0, 0.0, 0.0],
            EqPreset::Electronic => [4.0, 3.0, 0.0, -2.0, -3.0, 0.0, 3.0, 5.0, 6.0],
            EqPreset::Rock => [4.0, 3.0, 2.0, 0.0, -1.0, 0.0, 2.0, 3.0, 4.0],
            EqPreset::Classical => [2.0, 1.0, 0.0, 0.0, 0.0, 0.0, -1.0, -2.0, -3.0],
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            EqPreset::Flat => "flat",
            EqPreset::BassBoost => "bass-boost",
            EqPreset::TrebleBoost => "treble-boost",
            EqPreset::VocalBoost => "vocal-boost",
            EqPreset::Electronic => "electronic",
            EqPreset::Rock => "rock",
            EqPreset::Classical => "classical",
        }
    }
}

impl fmt::Display for EqPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EqPreset {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace(['_', ' '], "-");
        EqPreset::ALL
            .iter()
            .copied()
            .find(|preset| preset.name() == normalized || preset.name().replace('-', "") == normalized)
            .ok_or_else(|| format!("unknown eq preset \"{}\"", value))
    }
}
