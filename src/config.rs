//! Configuration for feature compilation and onset tracking
//!
//! This module provides the analysis parameters shared by the spectral
//! frontend, the peak extractor, the label generator and the dataset layout.
//! Parameters load from flat camelCase JSON files; missing keys take their
//! defaults so older configuration files keep working.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::error::CompileError;
use crate::note::Note;

/// Half-open range of MIDI note numbers
///
/// The textual form is `"21..<109"`. The closed form `"21...108"` is accepted
/// on input and normalized to the half-open form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NoteRange {
    pub start: i32,
    pub end: i32,
}

impl NoteRange {
    pub const fn new(start: i32, end: i32) -> Self {
        Self { start, end }
    }

    /// Number of notes in the range
    pub fn count(&self) -> usize {
        (self.end - self.start).max(0) as usize
    }

    pub fn contains(&self, note: i32) -> bool {
        note >= self.start && note < self.end
    }

    /// Iterate the notes of the range in ascending order
    pub fn notes(&self) -> impl Iterator<Item = i32> {
        self.start..self.end
    }
}

impl fmt::Display for NoteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..<{}", self.start, self.end)
    }
}

impl FromStr for NoteRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (start, end, closed) = if let Some((a, b)) = s.split_once("..<") {
            (a, b, false)
        } else if let Some((a, b)) = s.split_once("...") {
            (a, b, true)
        } else {
            return Err(format!("invalid note range '{}'", s));
        };

        let start: i32 = start
            .trim()
            .parse()
            .map_err(|_| format!("invalid range start in '{}'", s))?;
        let mut end: i32 = end
            .trim()
            .parse()
            .map_err(|_| format!("invalid range end in '{}'", s))?;
        if closed {
            end += 1;
        }
        if end <= start {
            return Err(format!("empty note range '{}'", s));
        }

        Ok(Self { start, end })
    }
}

impl TryFrom<String> for NoteRange {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<NoteRange> for String {
    fn from(range: NoteRange) -> Self {
        range.to_string()
    }
}

/// Analysis parameters shared by every stage of the compiler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Configuration {
    /// Input audio sampling frequency in Hz
    pub sampling_frequency: f64,
    /// Window size in audio samples
    pub window_size: usize,
    /// Window step size in audio samples
    pub step_size: usize,
    /// Notes considered for labeling
    pub representable_note_range: NoteRange,
    /// Notes covered by the spectrum bands
    pub spectrum_note_range: NoteRange,
    /// Spectrum bands per semitone
    pub spectrum_resolution: f64,
    /// Minimum distance between accepted peaks, in semitones
    pub minimum_peak_distance: f64,
    /// Peak height cutoff as a multiple of the window RMS
    pub peak_height_cutoff_multiplier: f64,
    /// Number of windows in the RMS moving average
    pub rms_moving_average_size: usize,
    /// Multiplier applied to summed note activations
    pub note_activation_scale: f64,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            sampling_frequency: 44100.0,
            window_size: 8192,
            step_size: 1024,
            representable_note_range: NoteRange::new(21, 109),
            spectrum_note_range: NoteRange::new(21, 121),
            spectrum_resolution: 1.0,
            minimum_peak_distance: 0.5,
            peak_height_cutoff_multiplier: 0.05,
            rms_moving_average_size: 20,
            note_activation_scale: 2.0,
        }
    }
}

impl Configuration {
    /// Load configuration from a JSON file, failing on any error
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// * `Ok(Configuration)` - Parsed and validated configuration
    /// * `Err(CompileError::InvalidConfiguration)` - Unreadable, unparsable or inconsistent file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, CompileError> {
        let path = path.as_ref();
        let contents =
            fs::read_to_string(path).map_err(|err| CompileError::InvalidConfiguration {
                reason: format!("failed to read {}: {}", path.display(), err),
            })?;
        let config: Self =
            serde_json::from_str(&contents).map_err(|err| CompileError::InvalidConfiguration {
                reason: format!("failed to parse {}: {}", path.display(), err),
            })?;
        config.validate()?;
        log::info!("[Config] Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Load configuration from a JSON file, falling back to defaults
    ///
    /// Read, parse and validation failures are logged and the default
    /// configuration is returned instead.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match Self::from_file(&path) {
            Ok(config) => config,
            Err(err) => {
                log::warn!("[Config] {}. Using defaults.", err);
                Self::default()
            }
        }
    }

    /// Serialize to pretty JSON
    pub fn to_json_pretty(&self) -> String {
        // Every field is a plain number or a range string
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// Check the parameters for internal consistency
    pub fn validate(&self) -> Result<(), CompileError> {
        let invalid = |reason: String| Err(CompileError::InvalidConfiguration { reason });

        if !(self.sampling_frequency.is_finite() && self.sampling_frequency > 0.0) {
            return invalid(format!(
                "samplingFrequency must be positive, got {}",
                self.sampling_frequency
            ));
        }
        if self.window_size < 4 {
            return invalid(format!("windowSize too small: {}", self.window_size));
        }
        if self.step_size == 0 {
            return invalid("stepSize must be positive".to_string());
        }
        if !(self.spectrum_resolution.is_finite() && self.spectrum_resolution > 0.0) {
            return invalid(format!(
                "spectrumResolution must be positive, got {}",
                self.spectrum_resolution
            ));
        }
        if self.representable_note_range.count() == 0 || self.spectrum_note_range.count() == 0 {
            return invalid("note ranges must not be empty".to_string());
        }
        if self.representable_note_range.start < 0 || self.representable_note_range.end > 128 {
            return invalid(format!(
                "representableNoteRange {} outside MIDI notes",
                self.representable_note_range
            ));
        }
        if self.rms_moving_average_size == 0 {
            return invalid("rmsMovingAverageSize must be positive".to_string());
        }
        if self.minimum_peak_distance < 0.0 || self.peak_height_cutoff_multiplier < 0.0 {
            return invalid("peak parameters must not be negative".to_string());
        }
        if !self.note_activation_scale.is_finite() {
            return invalid("noteActivationScale must be finite".to_string());
        }
        Ok(())
    }

    /// Frequency resolution of one FFT bin in Hz
    pub fn base_frequency(&self) -> f64 {
        self.sampling_frequency / self.window_size as f64
    }

    /// Number of representable notes (label width)
    pub fn note_count(&self) -> usize {
        self.representable_note_range.count()
    }

    /// Number of spectrum bands (feature width)
    pub fn band_count(&self) -> usize {
        (self.spectrum_note_range.count() as f64 * self.spectrum_resolution).round() as usize
    }

    /// Band index for a fractional note, may fall outside `0..band_count`
    pub fn band_for_note(&self, note: f64) -> i64 {
        ((note - self.spectrum_note_range.start as f64) * self.spectrum_resolution).round() as i64
    }

    /// Centre note of a band
    pub fn note_for_band(&self, band: usize) -> f64 {
        self.spectrum_note_range.start as f64 + band as f64 / self.spectrum_resolution
    }

    /// Number of windows that fit inside the given number of samples
    pub fn window_count_in_samples(&self, samples: usize) -> usize {
        if samples < self.window_size {
            return 0;
        }
        1 + (samples - self.window_size) / self.step_size
    }

    /// Number of samples spanned by the given number of contiguous windows
    pub fn sample_count_in_windows(&self, window_count: usize) -> usize {
        if window_count < 1 {
            return 0;
        }
        (window_count - 1) * self.step_size + self.window_size
    }

    /// One-hot vector over the representable notes
    ///
    /// Notes outside the representable range are ignored.
    pub fn vector_from_notes(&self, notes: &[Note]) -> Vec<f32> {
        let mut vector = vec![0.0; self.note_count()];
        for note in notes {
            let number = note.number() as i32;
            if self.representable_note_range.contains(number) {
                vector[(number - self.representable_note_range.start) as usize] = 1.0;
            }
        }
        vector
    }

    /// Notes whose activation is at least 0.5
    ///
    /// # Panics
    /// Panics if the vector length differs from `note_count()`
    pub fn notes_from_vector(&self, vector: &[f32]) -> Vec<Note> {
        assert_eq!(
            vector.len(),
            self.note_count(),
            "note vector length must match representable note count"
        );
        vector
            .iter()
            .enumerate()
            .filter(|(_, value)| **value >= 0.5)
            .filter_map(|(index, _)| {
                Note::from_number(index as i32 + self.representable_note_range.start)
            })
            .collect()
    }
}

/// Onset tracker parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrackerConfig {
    /// Onset score that arms the detector
    pub onset_peak_height: f32,
    /// Onset score at or below which an armed detector fires
    pub onset_trigger: f32,
    /// Number of onsets past the cursor considered for a match
    pub lookahead: usize,
    /// Distance multiplier per offset from the cursor
    pub offset_weights: Vec<f32>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            onset_peak_height: 0.5,
            onset_trigger: 0.25,
            lookahead: 3,
            offset_weights: vec![1.0, 1.15, 1.3, 1.45],
        }
    }
}

impl TrackerConfig {
    /// Load tracker parameters from JSON, falling back to defaults
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded tracker configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Weight for a candidate `offset` onsets past the cursor
    ///
    /// Offsets past the configured weights reuse the last weight.
    pub fn weight_for_offset(&self, offset: usize) -> f32 {
        self.offset_weights
            .get(offset)
            .or_else(|| self.offset_weights.last())
            .copied()
            .unwrap_or(1.0)
    }
}
