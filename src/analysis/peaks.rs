// Peak extraction - Local maxima of a magnitude spectrum
//
// Pipeline:
// 1. Local maxima: y[i] > y[i-1] && y[i] >= y[i+1] (plateaus resolve to
//    their first index)
// 2. Height filter: keep peaks taller than cutoff_multiplier × RMS
// 3. Musical-distance dedup: peaks closer than `minimum_peak_distance`
//    semitones to the last accepted peak replace it only if strictly taller

use crate::config::Configuration;
use crate::note::{freq_to_note, note_to_freq};

/// A spectrum sample: frequency in Hz and magnitude
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectrumPoint {
    pub frequency: f64,
    pub magnitude: f64,
}

/// Convert spectrum bins to `(frequency, magnitude)` points
///
/// # Arguments
/// * `spectrum` - Magnitude per bin
/// * `base_frequency` - Width of one bin in Hz
pub fn spectrum_points(spectrum: &[f64], base_frequency: f64) -> Vec<SpectrumPoint> {
    spectrum
        .iter()
        .enumerate()
        .map(|(i, &magnitude)| SpectrumPoint {
            frequency: base_frequency * i as f64,
            magnitude,
        })
        .collect()
}

/// Peak extractor configured with height and distance thresholds
#[derive(Debug, Clone)]
pub struct PeakExtractor {
    cutoff_multiplier: f64,
    minimum_distance: f64,
}

impl PeakExtractor {
    pub fn new(config: &Configuration) -> Self {
        Self {
            cutoff_multiplier: config.peak_height_cutoff_multiplier,
            minimum_distance: config.minimum_peak_distance,
        }
    }

    /// Run the full pipeline on one spectrum
    ///
    /// # Arguments
    /// * `points` - Spectrum points in ascending frequency
    /// * `rms` - RMS of the analyzed window
    ///
    /// # Returns
    /// Accepted peaks in ascending frequency
    pub fn process(&self, points: &[SpectrumPoint], rms: f64) -> Vec<SpectrumPoint> {
        let peaks = find_peaks(points);
        let peaks = self.filter_by_height(peaks, rms);
        self.choose_peaks(peaks)
    }

    fn filter_by_height(&self, peaks: Vec<SpectrumPoint>, rms: f64) -> Vec<SpectrumPoint> {
        let cutoff = self.cutoff_multiplier * rms;
        peaks.into_iter().filter(|p| p.magnitude > cutoff).collect()
    }

    fn choose_peaks(&self, peaks: Vec<SpectrumPoint>) -> Vec<SpectrumPoint> {
        let mut chosen: Vec<SpectrumPoint> = Vec::new();
        let mut exclusion: Option<(f64, f64)> = None;

        for peak in peaks {
            let inside = exclusion
                .map(|(lo, hi)| peak.frequency >= lo && peak.frequency <= hi)
                .unwrap_or(false);

            if inside {
                if let Some(last) = chosen.last_mut() {
                    if last.magnitude < peak.magnitude {
                        *last = peak;
                        exclusion = Some(self.exclusion_interval(peak.frequency));
                    }
                }
            } else {
                chosen.push(peak);
                exclusion = Some(self.exclusion_interval(peak.frequency));
            }
        }

        chosen
    }

    /// Frequencies within `minimum_distance` semitones of `frequency`
    fn exclusion_interval(&self, frequency: f64) -> (f64, f64) {
        let note = freq_to_note(frequency);
        (
            note_to_freq(note - self.minimum_distance),
            note_to_freq(note + self.minimum_distance),
        )
    }
}

/// Local maxima, excluding the first and last point
pub fn find_peaks(points: &[SpectrumPoint]) -> Vec<SpectrumPoint> {
    points
        .windows(3)
        .filter(|w| w[1].magnitude > w[0].magnitude && w[1].magnitude >= w[2].magnitude)
        .map(|w| w[1])
        .collect()
}
