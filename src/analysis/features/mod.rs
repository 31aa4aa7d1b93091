// FeatureBuilder - per-window spectral and peak features
//
// This module turns a pair of consecutive analysis windows (previous hop and
// current hop) into the fixed feature record written to the dataset.
//
// Module organization:
// - types: Data structures (Feature struct)
// - fft: Hamming-windowed FFT with square-root magnitude compression
// - spectral: Log-frequency band aggregation and flux
// - temporal: Window RMS
// - mod.rs: Coordinator (FeatureBuilder)
//
// Features extracted (one value per spectrum band):
// 1. Spectrum: band-aggregated compressed magnitudes of the current window
// 2. Spectral flux: spectrum(cur) - spectrum(prev)
// 3. Peak heights: tallest peak per band over the RMS moving average
// 4. Peak locations: distance of that peak from the band centre
// 5. Peak flux: heights(cur) - heights(prev)

mod fft;
mod spectral;
mod temporal;
mod types;

pub use fft::{hamming_window, FftProcessor};
pub use spectral::{flux, BandAggregator};
pub use temporal::rms;
pub use types::Feature;

use crate::analysis::peak_features::{PeakHeights, PeakLocations};
use crate::analysis::peaks::{spectrum_points, PeakExtractor};
use crate::config::Configuration;

/// FeatureBuilder coordinates the feature extraction pipeline
///
/// The previous and current windows each own a peak heights generator so the
/// RMS moving averages advance independently. Build one per audio file, or
/// call `reset()` between files.
pub struct FeatureBuilder {
    config: Configuration,
    fft_processor: FftProcessor,
    bands: BandAggregator,
    peak_extractor: PeakExtractor,
    peak_heights_prev: PeakHeights,
    peak_heights_cur: PeakHeights,
    peak_locations: PeakLocations,
}

impl FeatureBuilder {
    /// Create a new FeatureBuilder
    ///
    /// # Arguments
    /// * `config` - Analysis parameters (window size, band grid, peak thresholds)
    pub fn new(config: &Configuration) -> Self {
        Self {
            config: config.clone(),
            fft_processor: FftProcessor::new(config.window_size),
            bands: BandAggregator::new(config),
            peak_extractor: PeakExtractor::new(config),
            peak_heights_prev: PeakHeights::new(config),
            peak_heights_cur: PeakHeights::new(config),
            peak_locations: PeakLocations::new(config),
        }
    }

    pub fn configuration(&self) -> &Configuration {
        &self.config
    }

    /// Reset every stateful generator
    pub fn reset(&mut self) {
        self.peak_heights_prev.reset();
        self.peak_heights_cur.reset();
        self.peak_locations.reset();
    }

    /// Compressed magnitude spectrum of one window
    pub fn spectrum_values(&self, audio: &[f32]) -> Vec<f64> {
        self.fft_processor.spectrum(audio)
    }

    /// Extract features from two consecutive windows
    ///
    /// # Arguments
    /// * `prev` - Window starting one step before `cur` (window_size samples)
    /// * `cur` - Current window (window_size samples)
    ///
    /// # Returns
    /// Feature for the current window
    ///
    /// # Panics
    /// Panics if either window is not exactly `window_size` samples
    pub fn generate(&mut self, prev: &[f32], cur: &[f32]) -> Feature {
        let base_frequency = self.config.base_frequency();
        let rms_prev = rms(prev);
        let rms_cur = rms(cur);

        let spectrum_prev = self.spectrum_values(prev);
        let spectrum_cur = self.spectrum_values(cur);

        let bands_prev = self.bands.aggregate(&spectrum_prev);
        let bands_cur = self.bands.aggregate(&spectrum_cur);
        let spectral_flux = flux(&bands_prev, &bands_cur);

        let peaks_prev = self
            .peak_extractor
            .process(&spectrum_points(&spectrum_prev, base_frequency), rms_prev);
        let peaks_cur = self
            .peak_extractor
            .process(&spectrum_points(&spectrum_cur, base_frequency), rms_cur);

        self.peak_heights_prev.update(&peaks_prev, rms_prev);
        self.peak_heights_cur.update(&peaks_cur, rms_cur);
        self.peak_locations.update(&peaks_cur);
        let peak_flux = flux(self.peak_heights_prev.data(), self.peak_heights_cur.data());

        Feature {
            spectrum: to_f32(&bands_cur),
            spectral_flux: to_f32(&spectral_flux),
            peak_heights: to_f32(self.peak_heights_cur.data()),
            peak_locations: to_f32(self.peak_locations.data()),
            peak_flux: to_f32(&peak_flux),
        }
    }
}

fn to_f32(values: &[f64]) -> Vec<f32> {
    values.iter().map(|&v| v as f32).collect()
}
