//! Peaking biquad filter with per-channel history.

use std::f32::consts::PI;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BiquadCoefficients {
    pub b0: f32,
    pub b1: f32,
    pub b2: f32,
    pub a1: f32,
    pub a2: f32,
}

impl BiquadCoefficients {
    /// Coefficients of a unity filter.
    pub const IDENTITY: Self = Self {
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
        a1: 0.0,
        a2: 0.0,
    };

    /// RBJ cookbook peaking EQ centred on `freq_hz`.
    pub fn peaking(sample_rate: u32, freq_hz: f32, q: f32, gain_db: f32) -> Self {
        if sample_rate == 0 {
            return Self::IDENTITY;
        }
        let freq_hz = sanitize_freq(freq_hz, sample_rate);
        let w0 = 2.0 * PI * freq_hz / sample_rate as f32;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * q.max(f32::EPSILON));
        let amplitude = 10.0_f32.powf(gain_db / 40.0);

        let b0 = 1.0 + alpha * amplitude;
        let b1 = -2.0 * cos_w0;
        let b2 = 1.0 - alpha * amplitude;
        let a0 = 1.0 + alpha / amplitude;
        let a1 = -2.0 * cos_w0;
        let a2 = 1.0 - alpha / amplitude;

        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }
}

/// Direct form I biquad. History is kept per channel so one instance serves
/// a whole multi-channel stream.
#[derive(Clone, Debug)]
pub struct Biquad {
    coeffs: BiquadCoefficients,
    x_n1: Vec<f32>,
    x_n2: Vec<f32>,
    y_n1: Vec<f32>,
    y_n2: Vec<f32>,
}

impl Biquad {
    pub fn new(coeffs: BiquadCoefficients, channels: usize) -> Self {
        let channels = channels.max(1);
        Self {
            coeffs,
            x_n1: vec![0.0; channels],
            x_n2: vec![0.0; channels],
            y_n1: vec![0.0; channels],
            y_n2: vec![0.0; channels],
        }
    }

    pub fn coefficients(&self) -> BiquadCoefficients {
        self.coeffs
    }

    /// Swap coefficients without clearing history, so a running stream does
    /// not click when a gain changes.
    pub fn set_coefficients(&mut self, coeffs: BiquadCoefficients) {
        self.coeffs = coeffs;
    }

    pub fn process_sample(&mut self, channel: usize, sample: f32) -> f32 {
        let y = self.coeffs.b0 * sample
            + self.coeffs.b1 * self.x_n1[channel]
            + self.coeffs.b2 * self.x_n2[channel]
            - self.coeffs.a1 * self.y_n1[channel]
            - self.coeffs.a2 * self.y_n2[channel];

        self.x_n2[channel] = self.x_n1[channel];
        self.x_n1[channel] = sample;
        self.y_n2[channel] = self.y_n1[channel];
        self.y_n1[channel] = y;

        y
    }

    pub fn reset(&mut self) {
        self.x_n1.fill(0.0);
        self.x_n2.fill(0.0);
        self.y_n1.fill(0.0);
        self.y_n2.fill(0.0);
    }
}

fn sanitize_freq(freq_hz: f32, sample_rate: u32) -> f32 {
    let nyquist = sample_rate as f32 / 2.0;
    if !freq_hz.is_finite() {
        return nyquist / 2.0;
    }
    freq_hz.clamp(1.0, (nyquist - 1.0).max(1.0))
}
