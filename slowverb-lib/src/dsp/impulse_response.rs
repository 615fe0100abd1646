//! Synthetic reverb kernel: stereo noise under a cubic decay.

use rand::Rng;

/// Length of the generated tail in seconds.
pub const IMPULSE_RESPONSE_SECONDS: u32 = 2;
/// Channels in a generated impulse response.
pub const IMPULSE_RESPONSE_CHANNELS: usize = 2;
/// Exponent of the `(1 - t)^n` decay envelope.
pub const DECAY_EXPONENT: i32 = 3;

/// Equal-power normalization constants: a kernel is scaled so that its RMS
/// maps to `NORMALIZATION_CALIBRATION` at the reference sample rate.
const NORMALIZATION_CALIBRATION: f32 = 0.00125;
const NORMALIZATION_REFERENCE_RATE: f32 = 44_100.0;
const NORMALIZATION_MIN_POWER: f32 = 0.000125;

#[derive(Debug, Clone)]
pub struct ImpulseResponse {
    pub sample_rate: u32,
    pub channels: Vec<Vec<f32>>,
}

impl ImpulseResponse {
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn len(&self) -> usize {
        self.channels.first().map(|channel| channel.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Kernel feeding output channel `index`. Outputs beyond the kernel's
    /// channel count wrap around.
    pub fn channel_for_output(&self, index: usize) -> &[f32] {
        if self.channels.is_empty() {
            return &[];
        }

        if self.channels.len() == 1 {
            return &self.channels[0];
        }

        let channel_index = index % self.channels.len();
        &self.channels[channel_index]
    }

    /// Gain that brings the kernel to a fixed loudness: RMS over every
    /// channel, inverted, then calibrated for the sample rate.
    pub fn normalization_scale(&self) -> f32 {
        let count: usize = self.channels.iter().map(|channel| channel.len()).sum();
        if count == 0 || self.sample_rate == 0 {
            return 1.0;
        }
        let energy: f64 = self
            .channels
            .iter()
            .flatten()
            .map(|sample| (*sample as f64) * (*sample as f64))
            .sum();
        let power = ((energy / count as f64).sqrt() as f32).max(NORMALIZATION_MIN_POWER);
        NORMALIZATION_CALIBRATION / power * NORMALIZATION_REFERENCE_RATE / self.sample_rate as f32
    }

    /// Normalized kernels, one per output channel. A mono output gets the
    /// average of every kernel channel.
    pub fn normalized_kernels(&self, output_channels: usize) -> Vec<Vec<f32>> {
        let scale = self.normalization_scale();
        if output_channels == 1 && self.channels.len() > 1 {
            let weight = scale / self.channels.len() as f32;
            let mut mixed = vec![0.0_f32; self.len()];
            for channel in &self.channels {
                for (out, sample) in mixed.iter_mut().zip(channel) {
                    *out += sample * weight;
                }
            }
            return vec![mixed];
        }

        (0..output_channels)
            .map(|index| {
                self.channel_for_output(index)
                    .iter()
                    .map(|sample| sample * scale)
                    .collect()
            })
            .collect()
    }
}

/// Generate a fresh impulse response for `sample_rate` using thread-local
/// randomness. Every call returns a different kernel.
pub fn generate_impulse_response(sample_rate: u32) -> ImpulseResponse {
    generate_impulse_response_with_rng(sample_rate, &mut rand::thread_rng())
}

pub fn generate_impulse_response_with_rng<R: Rng + ?Sized>(
    sample_rate: u32,
    rng: &mut R,
) -> ImpulseResponse {
    let length = (sample_rate * IMPULSE_RESPONSE_SECONDS) as usize;
    let channels = (0..IMPULSE_RESPONSE_CHANNELS)
        .map(|_| {
            (0..length)
                .map(|i| {
                    let noise = rng.gen::<f32>() * 2.0 - 1.0;
                    noise * decay_envelope(i, length)
                })
                .collect()
        })
        .collect();

    ImpulseResponse {
        sample_rate,
        channels,
    }
}

fn decay_envelope(position: usize, length: usize) -> f32 {
    (1.0 - position as f32 / length as f32).powi(DECAY_EXPONENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn two_second_stereo_kernel() {
        let ir = generate_impulse_response(44_100);
        assert_eq!(ir.sample_rate, 44_100);
        assert_eq!(ir.channel_count(), 2);
        assert_eq!(ir.len(), 88_200);
        assert_eq!(ir.channels[1].len(), 88_200);
    }

    #[test]
    fn samples_stay_under_decay_envelope() {
        let mut rng = StdRng::seed_from_u64(7);
        let ir = generate_impulse_response_with_rng(8_000, &mut rng);
        let length = ir.len();
        for channel in &ir.channels {
            for (i, sample) in channel.iter().enumerate() {
                assert!(sample.abs() <= decay_envelope(i, length) + 1e-6);
            }
        }
    }

    #[test]
    fn tail_is_quieter_than_head() {
        let ir = generate_impulse_response(16_000);
        let head: f32 = ir.channels[0][..3_200].iter().map(|s| s.abs()).sum();
        let tail: f32 = ir.channels[0][28_800..].iter().map(|s| s.abs()).sum();
        assert!(tail < head * 0.01);
    }

    #[test]
    fn output_channels_wrap_onto_kernel() {
        let ir = ImpulseResponse {
            sample_rate: 8_000,
            channels: vec![vec![1.0], vec![2.0]],
        };
        assert_eq!(ir.channel_for_output(0), &[1.0]);
        assert_eq!(ir.channel_for_output(3), &[2.0]);
    }

    fn rms(samples: &[f32]) -> f32 {
        let energy: f64 = samples.iter().map(|s| (*s as f64) * (*s as f64)).sum();
        (energy / samples.len() as f64).sqrt() as f32
    }

    #[test]
    fn normalized_kernel_rms_is_calibrated() {
        let mut rng = StdRng::seed_from_u64(11);
        let ir = generate_impulse_response_with_rng(44_100, &mut rng);
        let kernels = ir.normalized_kernels(2);
        assert_eq!(kernels.len(), 2);
        let combined: Vec<f32> = kernels.iter().flatten().copied().collect();
        assert!((rms(&combined) - 0.00125).abs() < 1e-7);

        let low_rate = generate_impulse_response_with_rng(22_050, &mut rng);
        let combined: Vec<f32> = low_rate.normalized_kernels(2).concat();
        assert!((rms(&combined) - 0.0025).abs() < 2e-7);
    }

    #[test]
    fn generated_samples_are_left_unscaled() {
        let mut rng = StdRng::seed_from_u64(3);
        let ir = generate_impulse_response_with_rng(8_000, &mut rng);
        let before = ir.channels.clone();
        let _ = ir.normalized_kernels(2);
        assert_eq!(ir.channels, before);
        assert!(ir.channels[0].iter().any(|s| s.abs() > 0.5));
    }

    #[test]
    fn mono_output_averages_kernel_channels() {
        let ir = ImpulseResponse {
            sample_rate: 44_100,
            channels: vec![vec![1.0, 0.0], vec![0.0, 1.0]],
        };
        let scale = ir.normalization_scale();
        let kernels = ir.normalized_kernels(1);
        assert_eq!(kernels.len(), 1);
        assert!((kernels[0][0] - scale * 0.5).abs() < 1e-9);
        assert!((kernels[0][1] - scale * 0.5).abs() < 1e-9);
    }

    #[test]
    fn silent_kernel_uses_power_floor() {
        let ir = ImpulseResponse {
            sample_rate: 44_100,
            channels: vec![vec![0.0; 16]; 2],
        };
        assert!((ir.normalization_scale() - 10.0).abs() < 1e-4);
    }

    #[test]
    fn regeneration_uses_fresh_noise() {
        let first = generate_impulse_response(8_000);
        let second = generate_impulse_response(8_000);
        assert_ne!(first.channels[0], second.channels[0]);
    }
}
