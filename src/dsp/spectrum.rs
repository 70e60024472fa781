//! Spectrum tap: a rolling window of recent samples plus FFT magnitudes.
//!
//! Nothing here renders anything. External code polls the raw arrays and
//! draws them however it likes.

use std::{f32::consts::TAU, sync::Arc};

use rustfft::{num_complex::Complex, Fft, FftPlanner};

pub const MIN_FFT_SIZE: usize = 32;
pub const MAX_FFT_SIZE: usize = 32_768;

pub struct Analyser {
    fft_size: usize,
    ring: Vec<f32>,
    write_pos: usize,
    smoothing: f32,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    smoothed: Vec<f32>,
}

impl Analyser {
    /// `fft_size` is rounded up to a power of two within the supported range.
    pub fn new(fft_size: usize, smoothing: f32) -> Self {
        let fft_size = fft_size
            .clamp(MIN_FFT_SIZE, MAX_FFT_SIZE)
            .next_power_of_two();
        let fft = FftPlanner::<f32>::new().plan_fft_forward(fft_size);

        // Blackman window
        let window = (0..fft_size)
            .map(|n| {
                let x = n as f32 / fft_size as f32;
                0.42 - 0.5 * (TAU * x).cos() + 0.08 * (2.0 * TAU * x).cos()
            })
            .collect();

        Self {
            fft_size,
            ring: vec![0.0; fft_size],
            write_pos: 0,
            smoothing: smoothing.clamp(0.0, 1.0),
            fft,
            window,
            smoothed: vec![0.0; fft_size / 2],
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn frequency_bin_count(&self) -> usize {
        self.fft_size / 2
    }

    pub fn smoothing(&self) -> f32 {
        self.smoothing
    }

    pub fn set_smoothing(&mut self, smoothing: f32) {
        self.smoothing = smoothing.clamp(0.0, 1.0);
    }

    pub fn push(&mut self, samples: &[f32]) {
        for &sample in samples {
            self.ring[self.write_pos] = sample;
            self.write_pos = (self.write_pos + 1) % self.fft_size;
        }
    }

    /// The last `fft_size` samples, oldest first.
    pub fn time_domain_data(&self) -> Vec<f32> {
        let (newer, older) = self.ring.split_at(self.write_pos);
        older.iter().chain(newer).copied().collect()
    }

    /// Smoothed magnitude spectrum in dB, one value per bin up to Nyquist.
    ///
    /// Each call folds the current window into the running average, so the
    /// polling rate affects how quickly the display settles.
    pub fn frequency_data(&mut self) -> Vec<f32> {
        let mut buffer: Vec<Complex<f32>> = self
            .time_domain_data()
            .iter()
            .zip(&self.window)
            .map(|(x, w)| Complex::new(x * w, 0.0))
            .collect();
        self.fft.process(&mut buffer);

        let scale = 1.0 / self.fft_size as f32;
        for (avg, bin) in self.smoothed.iter_mut().zip(&buffer) {
            let magnitude = bin.norm() * scale;
            *avg = self.smoothing * *avg + (1.0 - self.smoothing) * magnitude;
        }

        self.smoothed
            .iter()
            .map(|&m| 20.0 * m.max(1e-12).log10())
            .collect()
    }

    /// `frequency_data` mapped linearly from `min_db..max_db` onto 0..=255.
    pub fn byte_frequency_data(&mut self, min_db: f32, max_db: f32) -> Vec<u8> {
        let range = (max_db - min_db).max(f32::EPSILON);
        self.frequency_data()
            .into_iter()
            .map(|db| (((db - min_db) / range).clamp(0.0, 1.0) * 255.0) as u8)
            .collect()
    }

    pub fn reset(&mut self) {
        self.ring.fill(0.0);
        self.smoothed.fill(0.0);
        self.write_pos = 0;
    }
}
