// Spectral module - Log-frequency band aggregation and flux
//
// Each band is centred on a note of the spectrum range and spans half a band
// to either side, measured in semitones. The interval is converted to
// fractional FFT bin positions; bin `i` owns the cell `[i - ½, i + ½)` and
// contributes in proportion to how much of that cell the band covers.
// Contiguous bands therefore re-sum to exactly the spectrum mass they span.

use crate::config::Configuration;
use crate::note::note_to_freq;

/// Fractional bin coverage for one band
#[derive(Debug, Clone)]
struct BandCoverage {
    first_bin: usize,
    weights: Vec<f64>,
}

/// Precomputed band aggregation for one configuration
#[derive(Debug, Clone)]
pub struct BandAggregator {
    bands: Vec<BandCoverage>,
}

impl BandAggregator {
    /// Build the band coverage table
    ///
    /// # Arguments
    /// * `config` - Supplies the band grid, window size and base frequency
    pub fn new(config: &Configuration) -> Self {
        let bin_count = config.window_size / 2;
        let base_frequency = config.base_frequency();
        let half_band = 0.5 / config.spectrum_resolution;

        let bands = (0..config.band_count())
            .map(|band| {
                let note = config.note_for_band(band);
                let lower = note_to_freq(note - half_band) / base_frequency;
                let upper = note_to_freq(note + half_band) / base_frequency;
                Self::coverage(lower, upper, bin_count)
            })
            .collect();

        Self { bands }
    }

    /// Weights of the bins overlapping `[lower, upper)` in bin units
    fn coverage(lower: f64, upper: f64, bin_count: usize) -> BandCoverage {
        let first = (lower + 0.5).floor().max(0.0) as usize;
        let last = ((upper + 0.5).floor().max(0.0) as usize).min(bin_count.saturating_sub(1));

        let weights = (first..=last)
            .map(|bin| {
                let cell_lo = bin as f64 - 0.5;
                let cell_hi = bin as f64 + 0.5;
                (upper.min(cell_hi) - lower.max(cell_lo)).max(0.0)
            })
            .collect();

        BandCoverage {
            first_bin: first,
            weights,
        }
    }

    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    /// Aggregate a spectrum into bands
    ///
    /// # Arguments
    /// * `spectrum` - Magnitude spectrum with `window_size / 2` bins
    ///
    /// # Returns
    /// One value per band
    pub fn aggregate(&self, spectrum: &[f64]) -> Vec<f64> {
        self.bands
            .iter()
            .map(|band| {
                band.weights
                    .iter()
                    .enumerate()
                    .filter_map(|(k, &w)| spectrum.get(band.first_bin + k).map(|v| v * w))
                    .sum()
            })
            .collect()
    }
}

/// Per-band difference `cur - prev`
///
/// # Panics
/// Panics if the inputs differ in length
pub fn flux(prev: &[f64], cur: &[f64]) -> Vec<f64> {
    assert_eq!(prev.len(), cur.len(), "flux inputs must have equal length");
    prev.iter().zip(cur).map(|(p, c)| c - p).collect()
}
