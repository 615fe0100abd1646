//! DSP building blocks: peaking filters, the band equalizer, the synthetic
//! impulse response and the partitioned convolver.

pub mod biquad;
pub mod convolution;
pub mod equalizer;
pub mod impulse_response;
