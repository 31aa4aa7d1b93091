// FFT module - Windowed magnitude spectrum
//
// This module applies the analysis window, runs the forward FFT and returns
// the compressed magnitude spectrum used by band aggregation and peak
// extraction.

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

/// Periodic Hamming window `0.54 - 0.46 cos(2πn/N)`
///
/// Shared by the spectral frontend and the label generator so that onset and
/// activation weights line up with the analyzed samples.
pub fn hamming_window(size: usize) -> Vec<f64> {
    (0..size)
        .map(|n| 0.54 - 0.46 * (2.0 * std::f64::consts::PI * n as f64 / size as f64).cos())
        .collect()
}

/// FFT processor that computes compressed magnitude spectra from audio windows
pub struct FftProcessor {
    fft: Arc<dyn Fft<f64>>,
    window_size: usize,
    /// Hamming window (pre-computed)
    window: Vec<f64>,
}

impl FftProcessor {
    /// Create a new FFT processor
    ///
    /// # Arguments
    /// * `window_size` - Analysis window size in samples
    pub fn new(window_size: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(window_size);

        Self {
            fft,
            window_size,
            window: hamming_window(window_size),
        }
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Compute the spectrum of one window
    ///
    /// Applies the Hamming window, performs the FFT and returns the square
    /// root of the magnitudes of the first `window_size / 2` bins.
    ///
    /// # Arguments
    /// * `audio` - Exactly `window_size` samples
    ///
    /// # Returns
    /// Compressed magnitude spectrum (size = window_size / 2)
    pub fn spectrum(&self, audio: &[f32]) -> Vec<f64> {
        assert_eq!(
            audio.len(),
            self.window_size,
            "spectrum input must be exactly one window"
        );

        let mut buffer: Vec<Complex<f64>> = audio
            .iter()
            .zip(&self.window)
            .map(|(&sample, &w)| Complex::new(sample as f64 * w, 0.0))
            .collect();

        self.fft.process(&mut buffer);

        buffer[..self.window_size / 2]
            .iter()
            .map(|c| c.norm().sqrt())
            .collect()
    }
}
