//! Uniformly partitioned FFT convolution for streaming input.
//!
//! Input is gathered into blocks of `fft_size / 2` samples. Each full block
//! is transformed, multiplied against every kernel partition and the result
//! overlap-added. Output lags input by exactly one block; see
//! [`Convolver::latency`].

use std::collections::VecDeque;
use std::sync::Arc;

use log::debug;
use realfft::num_complex::Complex;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};

/// FFT size used by the reverb convolution stage.
pub const DEFAULT_FFT_SIZE: usize = 2048;

#[derive(Clone)]
pub struct Convolver {
    fft_size: usize,
    segment_size: usize,
    ir_segments: Vec<Vec<Complex<f32>>>,
    previous_frame_q: VecDeque<Vec<Complex<f32>>>,
    previous_tail: Vec<f32>,
    input_block: Vec<f32>,
    output_q: VecDeque<f32>,
    accumulator: Vec<Complex<f32>>,
    time_domain: Vec<f32>,
    r2c: Arc<dyn RealToComplex<f32>>,
    c2r: Arc<dyn ComplexToReal<f32>>,
}

impl Convolver {
    /// Build a convolver for `ir_signal`. `fft_size` is rounded up to an even
    /// number of at least 2.
    pub fn new(ir_signal: &[f32], fft_size: usize) -> Self {
        let fft_size = (fft_size.max(2) + 1) & !1;
        let segment_size = fft_size / 2;
        let spectrum_len = segment_size + 1;

        let mut planner = RealFftPlanner::<f32>::new();
        let r2c = planner.plan_fft_forward(fft_size);
        let c2r = planner.plan_fft_inverse(fft_size);

        let ir_segments = segment_buffer(ir_signal, fft_size, &r2c);
        let segment_count = ir_segments.len();
        debug!(
            "convolver: {} kernel partitions of {} samples",
            segment_count, segment_size
        );

        Self {
            fft_size,
            segment_size,
            ir_segments,
            previous_frame_q: init_previous_frame_q(segment_count, spectrum_len),
            previous_tail: vec![0.0; segment_size],
            input_block: Vec::with_capacity(segment_size),
            output_q: init_output_q(segment_size),
            accumulator: vec![Complex { re: 0.0, im: 0.0 }; spectrum_len],
            time_domain: vec![0.0; fft_size],
            r2c,
            c2r,
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Delay, in samples, between an input sample and its convolved output.
    pub fn latency(&self) -> usize {
        self.segment_size
    }

    /// Push `input` and return the same number of output samples.
    pub fn process(&mut self, input: &[f32]) -> Vec<f32> {
        let mut output = Vec::with_capacity(input.len());
        for &sample in input {
            output.push(self.process_sample(sample));
        }
        output
    }

    pub fn process_sample(&mut self, sample: f32) -> f32 {
        self.input_block.push(sample);
        if self.input_block.len() == self.segment_size {
            self.convolve_block();
        }
        self.output_q.pop_front().unwrap_or(0.0)
    }

    pub fn reset(&mut self) {
        for frame in &mut self.previous_frame_q {
            frame.fill(Complex { re: 0.0, im: 0.0 });
        }
        self.previous_tail.fill(0.0);
        self.input_block.clear();
        self.output_q = init_output_q(self.segment_size);
    }

    fn convolve_block(&mut self) {
        let segment_size = self.segment_size;

        if let Some(mut spectrum) = self.previous_frame_q.pop_back() {
            self.time_domain.fill(0.0);
            self.time_domain[..segment_size].copy_from_slice(&self.input_block);
            if let Err(err) = self.r2c.process(&mut self.time_domain, &mut spectrum) {
                debug!("convolver forward fft: {}", err);
            }
            self.previous_frame_q.push_front(spectrum);
        }
        self.input_block.clear();

        self.accumulator.fill(Complex { re: 0.0, im: 0.0 });
        for (frame, ir) in self.previous_frame_q.iter().zip(self.ir_segments.iter()) {
            mult_add_frames(&mut self.accumulator, frame, ir);
        }
        if let Some(first) = self.accumulator.first_mut() {
            first.im = 0.0;
        }
        if let Some(last) = self.accumulator.last_mut() {
            last.im = 0.0;
        }

        if let Err(err) = self.c2r.process(&mut self.accumulator, &mut self.time_domain) {
            debug!("convolver inverse fft: {}", err);
        }

        let norm = self.fft_size as f32;
        for (i, sample) in self.time_domain.iter().enumerate() {
            let value = sample / norm;
            if i < segment_size {
                self.output_q.push_back(value + self.previous_tail[i]);
            } else {
                self.previous_tail[i - segment_size] = value;
            }
        }
    }
}

fn mult_add_frames(acc: &mut [Complex<f32>], f1: &[Complex<f32>], f2: &[Complex<f32>]) {
    for ((out, a), b) in acc.iter_mut().zip(f1).zip(f2) {
        out.re += (a.re * b.re) - (a.im * b.im);
        out.im += (a.im * b.re) + (a.re * b.im);
    }
}

fn segment_buffer(
    buffer: &[f32],
    fft_size: usize,
    r2c: &Arc<dyn RealToComplex<f32>>,
) -> Vec<Vec<Complex<f32>>> {
    let segment_size = fft_size / 2;
    let spectrum_len = segment_size + 1;

    buffer
        .chunks(segment_size)
        .map(|chunk| {
            let mut time_domain = vec![0.0_f32; fft_size];
            time_domain[..chunk.len()].copy_from_slice(chunk);
            let mut spectrum = vec![Complex { re: 0.0, im: 0.0 }; spectrum_len];
            if let Err(err) = r2c.process(&mut time_domain, &mut spectrum) {
                debug!("kernel fft: {}", err);
            }
            spectrum
        })
        .collect()
}

fn init_previous_frame_q(segment_count: usize, spectrum_len: usize) -> VecDeque<Vec<Complex<f32>>> {
    (0..segment_count.max(1))
        .map(|_| vec![Complex { re: 0.0, im: 0.0 }; spectrum_len])
        .collect()
}

fn init_output_q(latency: usize) -> VecDeque<f32> {
    std::iter::repeat(0.0).take(latency).collect()
}
