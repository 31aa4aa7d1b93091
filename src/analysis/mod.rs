// Analysis module - Spectral frontend and peak extraction
//
// This module holds the DSP half of the compiler: windowed spectra, band
// aggregation, peak picking and the per-band peak generators. The label half
// lives in `labels`.
//
// Architecture:
// - features: FeatureBuilder coordinating FFT, bands and generators
// - peaks: PeakExtractor (local maxima, height filter, distance dedup)
// - peak_features: PeakHeights / PeakLocations with per-file reset

pub mod features;
pub mod peak_features;
pub mod peaks;

pub use features::{Feature, FeatureBuilder};
pub use peaks::{PeakExtractor, SpectrumPoint};
