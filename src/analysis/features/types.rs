// Types module - Per-window feature vectors
//
// This module defines the fixed feature record written to the dataset. Every
// vector has one entry per spectrum band.

/// Features extracted from one analysis window
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    /// Band-aggregated compressed magnitude spectrum
    pub spectrum: Vec<f32>,

    /// Spectrum difference against the previous hop
    pub spectral_flux: Vec<f32>,

    /// Tallest peak per band, normalized by the RMS moving average
    pub peak_heights: Vec<f32>,

    /// How close the tallest peak in each band is to the band centre (0.0 to 1.0)
    pub peak_locations: Vec<f32>,

    /// Peak height difference against the previous hop
    pub peak_flux: Vec<f32>,
}

impl Feature {
    /// All-zero feature for `band_count` bands
    pub fn new(band_count: usize) -> Self {
        Self {
            spectrum: vec![0.0; band_count],
            spectral_flux: vec![0.0; band_count],
            peak_heights: vec![0.0; band_count],
            peak_locations: vec![0.0; band_count],
            peak_flux: vec![0.0; band_count],
        }
    }

    pub fn band_count(&self) -> usize {
        self.spectrum.len()
    }

    /// Vectors in dataset column order
    pub fn columns(&self) -> [&[f32]; 5] {
        [
            &self.spectrum,
            &self.spectral_flux,
            &self.peak_locations,
            &self.peak_heights,
            &self.peak_flux,
        ]
    }

    /// True if no value is NaN or infinite
    pub fn is_finite(&self) -> bool {
        self.columns()
            .iter()
            .all(|column| column.iter().all(|v| v.is_finite()))
    }
}
