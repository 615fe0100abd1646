//! Nine peaking bands in series at the fixed EQ frequencies.

use log::warn;

use super::biquad::{Biquad, BiquadCoefficients};
use crate::settings::{clamp_eq_gain, EQ_BAND_COUNT, EQ_FREQUENCIES_HZ, EQ_Q};

#[derive(Clone, Debug)]
pub struct Equalizer {
    sample_rate: u32,
    gains_db: [f32; EQ_BAND_COUNT],
    bands: Vec<Biquad>,
}

impl Equalizer {
    pub fn new(sample_rate: u32, channels: usize, gains_db: &[f32; EQ_BAND_COUNT]) -> Self {
        let mut clamped = [0.0; EQ_BAND_COUNT];
        let mut bands = Vec::with_capacity(EQ_BAND_COUNT);
        for (index, gain) in gains_db.iter().enumerate() {
            clamped[index] = clamp_eq_gain(*gain);
            let coeffs = BiquadCoefficients::peaking(
                sample_rate,
                EQ_FREQUENCIES_HZ[index],
                EQ_Q,
                clamped[index],
            );
            bands.push(Biquad::new(coeffs, channels));
        }

        Self {
            sample_rate,
            gains_db: clamped,
            bands,
        }
    }

    /// Retune one band. The gain is clamped before it reaches the filter.
    pub fn set_gain(&mut self, band: usize, gain_db: f32) {
        if band >= EQ_BAND_COUNT {
            warn!("ignoring gain for unknown eq band {}", band);
            return;
        }
        let gain_db = clamp_eq_gain(gain_db);
        if self.gains_db[band] == gain_db {
            return;
        }
        self.gains_db[band] = gain_db;
        self.bands[band].set_coefficients(BiquadCoefficients::peaking(
            self.sample_rate,
            EQ_FREQUENCIES_HZ[band],
            EQ_Q,
            gain_db,
        ));
    }

    pub fn set_gains(&mut self, gains_db: &[f32; EQ_BAND_COUNT]) {
        for (band, gain) in gains_db.iter().enumerate() {
            self.set_gain(band, *gain);
        }
    }

    pub fn gains(&self) -> [f32; EQ_BAND_COUNT] {
        self.gains_db
    }

    /// Run one sample of `channel` through band 0 up to band 8.
    pub fn process_sample(&mut self, channel: usize, sample: f32) -> f32 {
        self.bands
            .iter_mut()
            .fold(sample, |acc, band| band.process_sample(channel, acc))
    }

    pub fn reset(&mut self) {
        for band in &mut self.bands {
            band.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_equalizer_passes_signal_through() {
        let mut eq = Equalizer::new(44_100, 1, &[0.0; EQ_BAND_COUNT]);
        for n in 0..256 {
            let sample = ((n as f32) * 0.05).sin() * 0.5;
            assert!((eq.process_sample(0, sample) - sample).abs() < 1e-4);
        }
    }

    #[test]
    fn out_of_domain_gain_clamps_to_twelve() {
        let mut eq = Equalizer::new(44_100, 2, &[0.0; EQ_BAND_COUNT]);
        eq.set_gain(4, 20.0);
        assert_eq!(eq.gains()[4], 12.0);

        let expected = BiquadCoefficients::peaking(44_100, 1_000.0, 1.0, 12.0);
        assert_eq!(eq.bands[4].coefficients(), expected);
    }

    #[test]
    fn constructor_clamps_gains() {
        let mut gains = [0.0; EQ_BAND_COUNT];
        gains[0] = -30.0;
        let eq = Equalizer::new(48_000, 2, &gains);
        assert_eq!(eq.gains()[0], -12.0);
    }

    #[test]
    fn unknown_band_is_ignored() {
        let mut eq = Equalizer::new(44_100, 1, &[1.0; EQ_BAND_COUNT]);
        eq.set_gain(EQ_BAND_COUNT, 6.0);
        assert_eq!(eq.gains(), [1.0; EQ_BAND_COUNT]);
    }
}
