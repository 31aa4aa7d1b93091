// Peak feature generators - Peak heights and locations on the band grid
//
// Both generators keep per-instance state and must be reset at the start of
// every audio file so no history leaks between files.

use crate::analysis::peaks::SpectrumPoint;
use crate::config::Configuration;
use crate::note::freq_to_note;

/// Floor applied to window RMS values before averaging
pub const MIN_RMS: f64 = 0.0001;

/// Tallest peak per band, normalized by a moving average of window RMS
#[derive(Debug, Clone)]
pub struct PeakHeights {
    config: Configuration,
    rms_history: Vec<f64>,
    rms_history_index: usize,
    rms_average: f64,
    heights: Vec<f64>,
}

impl PeakHeights {
    pub fn new(config: &Configuration) -> Self {
        let mut generator = Self {
            config: config.clone(),
            rms_history: vec![MIN_RMS; config.rms_moving_average_size],
            rms_history_index: 0,
            rms_average: MIN_RMS,
            heights: vec![0.0; config.band_count()],
        };
        generator.reset();
        generator
    }

    /// Clear the RMS history and heights
    pub fn reset(&mut self) {
        self.rms_history.fill(MIN_RMS);
        self.rms_history_index = 0;
        self.rms_average = MIN_RMS;
        self.heights.fill(0.0);
    }

    /// Current mean of the RMS ring buffer
    pub fn rms_average(&self) -> f64 {
        self.rms_average
    }

    pub fn data(&self) -> &[f64] {
        &self.heights
    }

    /// Push the window RMS and recompute heights from `peaks`
    pub fn update(&mut self, peaks: &[SpectrumPoint], rms: f64) {
        let safe_rms = rms.max(MIN_RMS);
        let scale = 1.0 / self.rms_history.len() as f64;

        self.rms_average += (safe_rms - self.rms_history[self.rms_history_index]) * scale;
        self.rms_history[self.rms_history_index] = safe_rms;
        self.rms_history_index = (self.rms_history_index + 1) % self.rms_history.len();

        self.heights.fill(0.0);
        let band_count = self.heights.len() as i64;
        for peak in peaks {
            let band = self.config.band_for_note(freq_to_note(peak.frequency));
            if (0..band_count).contains(&band) {
                let slot = &mut self.heights[band as usize];
                *slot = slot.max(peak.magnitude / self.rms_average);
            }
        }
    }
}

/// Proximity of the tallest peak in each band to the band centre
#[derive(Debug, Clone)]
pub struct PeakLocations {
    config: Configuration,
    locations: Vec<f64>,
}

impl PeakLocations {
    pub fn new(config: &Configuration) -> Self {
        Self {
            config: config.clone(),
            locations: vec![0.0; config.band_count()],
        }
    }

    pub fn reset(&mut self) {
        self.locations.fill(0.0);
    }

    pub fn data(&self) -> &[f64] {
        &self.locations
    }

    /// Recompute locations from `peaks`
    ///
    /// Each band holds `max(0, 1 - |note(peak) - note(band)|)` for the tallest
    /// peak landing in it, 0 if none does.
    pub fn update(&mut self, peaks: &[SpectrumPoint]) {
        let band_count = self.locations.len();
        let mut tallest: Vec<Option<SpectrumPoint>> = vec![None; band_count];

        for peak in peaks {
            let band = self.config.band_for_note(freq_to_note(peak.frequency));
            if band < 0 || band >= band_count as i64 {
                continue;
            }
            let slot = &mut tallest[band as usize];
            match slot {
                Some(existing) if existing.magnitude >= peak.magnitude => {}
                _ => *slot = Some(*peak),
            }
        }

        for (band, peak) in tallest.into_iter().enumerate() {
            self.locations[band] = match peak {
                Some(peak) => {
                    let distance = (self.config.note_for_band(band) - freq_to_note(peak.frequency)).abs();
                    (1.0 - distance).max(0.0)
                }
                None => 0.0,
            };
        }
    }
}
