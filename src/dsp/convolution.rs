//! Uniformly-partitioned FFT convolution.
//!
//! Direct convolution with a two second impulse costs ~100k multiplies per
//! output sample. Instead the impulse is cut into partitions of `block`
//! samples, each pre-transformed once. Every block of input is transformed
//! once and kept in a frequency-domain delay line; the output block is
//!
//! ```text
//! Y = Σ_k X[now - k] · H[k]
//! ```
//!
//! followed by a single inverse transform (overlap-save: the transform spans
//! the previous and current input blocks and only the second half of the
//! result is kept). Latency is zero; cost per block is one forward FFT, one
//! inverse FFT and `partitions × 2·block` complex multiply-adds.

use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

pub struct Convolver {
    block: usize,
    fft: Arc<dyn Fft<f32>>,
    ifft: Arc<dyn Fft<f32>>,
    partitions: Vec<Vec<Complex<f32>>>,
    history: Vec<Vec<Complex<f32>>>,
    history_pos: usize,
    window: Vec<f32>,
    spectrum: Vec<Complex<f32>>,
    accum: Vec<Complex<f32>>,
    fft_scratch: Vec<Complex<f32>>,
}

impl Convolver {
    /// Prepare `impulse` for streaming in chunks of exactly `block` samples.
    pub fn new(impulse: &[f32], block: usize) -> Self {
        let block = block.max(1);
        let size = block * 2;

        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(size);
        let ifft = planner.plan_fft_inverse(size);
        let scratch_len = fft
            .get_inplace_scratch_len()
            .max(ifft.get_inplace_scratch_len());
        let mut fft_scratch = vec![Complex::default(); scratch_len];

        let partitions: Vec<Vec<Complex<f32>>> = impulse
            .chunks(block)
            .map(|chunk| {
                let mut buf = vec![Complex::default(); size];
                for (slot, &h) in buf.iter_mut().zip(chunk) {
                    slot.re = h;
                }
                fft.process_with_scratch(&mut buf, &mut fft_scratch);
                buf
            })
            .collect();

        let history = vec![vec![Complex::default(); size]; partitions.len()];

        Self {
            block,
            fft,
            ifft,
            partitions,
            history,
            history_pos: 0,
            window: vec![0.0; size],
            spectrum: vec![Complex::default(); size],
            accum: vec![Complex::default(); size],
            fft_scratch,
        }
    }

    pub fn block_size(&self) -> usize {
        self.block
    }

    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    /// Convolve one block. `input` and `output` must both be `block` long.
    pub fn process_block(&mut self, input: &[f32], output: &mut [f32]) {
        debug_assert_eq!(input.len(), self.block);
        debug_assert_eq!(output.len(), self.block);

        let count = self.partitions.len();
        if count == 0 {
            output.fill(0.0);
            return;
        }

        let block = self.block;
        self.window.copy_within(block.., 0);
        self.window[block..].copy_from_slice(input);

        for (slot, &x) in self.spectrum.iter_mut().zip(&self.window) {
            *slot = Complex::new(x, 0.0);
        }
        self.fft
            .process_with_scratch(&mut self.spectrum, &mut self.fft_scratch);
        self.history[self.history_pos].copy_from_slice(&self.spectrum);

        self.accum.fill(Complex::default());
        for (k, partition) in self.partitions.iter().enumerate() {
            let past = &self.history[(self.history_pos + count - k) % count];
            for ((acc, x), h) in self.accum.iter_mut().zip(past).zip(partition) {
                *acc += x * h;
            }
        }

        self.ifft
            .process_with_scratch(&mut self.accum, &mut self.fft_scratch);

        let norm = 1.0 / (block * 2) as f32;
        for (out, y) in output.iter_mut().zip(&self.accum[block..]) {
            *out = y.re * norm;
        }

        self.history_pos = (self.history_pos + 1) % count;
    }

    pub fn reset(&mut self) {
        self.window.fill(0.0);
        for spectrum in &mut self.history {
            spectrum.fill(Complex::default());
        }
        self.history_pos = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLOCK: usize = 128;

    fn run(convolver: &mut Convolver, input: &[f32]) -> Vec<f32> {
        let mut out = vec![0.0; input.len()];
        for (inp, outp) in input.chunks(BLOCK).zip(out.chunks_mut(BLOCK)) {
            convolver.process_block(inp, outp);
        }
        out
    }

    fn direct(input: &[f32], impulse: &[f32]) -> Vec<f32> {
        (0..input.len())
            .map(|n| {
                impulse
                    .iter()
                    .enumerate()
                    .filter(|(k, _)| *k <= n)
                    .map(|(k, h)| h * input[n - k])
                    .sum()
            })
            .collect()
    }

    #[test]
    fn matches_direct_convolution() {
        let mut rng = fastrand::Rng::with_seed(9);
        let input: Vec<f32> = (0..BLOCK * 8).map(|_| rng.f32() - 0.5).collect();
        let impulse: Vec<f32> = (0..400).map(|_| rng.f32() - 0.5).collect();

        let mut convolver = Convolver::new(&impulse, BLOCK);
        assert_eq!(convolver.partition_count(), 4);

        let fast = run(&mut convolver, &input);
        let slow = direct(&input, &impulse);
        for (n, (a, b)) in fast.iter().zip(&slow).enumerate() {
            assert!((a - b).abs() < 1e-3, "sample {n}: {a} vs {b}");
        }
    }

    #[test]
    fn delayed_delta_delays_signal() {
        let mut impulse = vec![0.0; 300];
        impulse[299] = 1.0;
        let mut convolver = Convolver::new(&impulse, BLOCK);

        let mut input = vec![0.0; BLOCK * 4];
        input[5] = 1.0;
        let out = run(&mut convolver, &input);

        assert!((out[304] - 1.0).abs() < 1e-4);
        assert!(out[..304].iter().all(|s| s.abs() < 1e-4));
    }

    #[test]
    fn empty_impulse_is_silent() {
        let mut convolver = Convolver::new(&[], BLOCK);
        let out = run(&mut convolver, &vec![1.0; BLOCK]);
        assert!(out.iter().all(|&s| s == 0.0));
    }
}
