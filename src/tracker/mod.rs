// Tracker - follows a reference onset list from streamed predictions
//
// Each prediction is an onset score plus one activation per representable
// note. A two-threshold edge detector turns the score stream into discrete
// detections:
//
//   idle  --score > onsetPeakHeight-->  armed (track running max)
//   armed --score <= onsetTrigger-->    detection, back to idle
//
// A detection compares the activations seen at the running max with the
// one-hot labels of onsets index..=index+lookahead. Each candidate scores
// euclidean distance × weight[offset]; the minimum wins and a non-zero
// offset moves the cursor forward.

pub mod onset;
pub mod stream;

pub use onset::{onsets_from_events, onsets_from_midi, Onset};
pub use stream::{
    prediction_queue, Prediction, PredictionReceiver, PredictionSender, DEFAULT_QUEUE_CAPACITY,
};

use crate::config::{NoteRange, TrackerConfig};

/// Cursor notification, receives the new index
pub type CursorMovedCallback = Box<dyn FnMut(usize) + Send>;

/// Result of one detection
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    /// Offset from the cursor of the best matching onset
    pub offset: usize,
    /// Weighted distance of the best match
    pub distance: f32,
    /// Cursor after the detection
    pub index: usize,
}

#[derive(Debug, Clone, Default)]
struct EdgeDetector {
    armed: bool,
    peak: f32,
    activations_at_peak: Vec<f32>,
}

pub struct Tracker {
    config: TrackerConfig,
    onsets: Vec<Onset>,
    /// One-hot label per onset
    labels: Vec<Vec<f32>>,
    index: usize,
    detector: EdgeDetector,
    on_cursor_moved: Option<CursorMovedCallback>,
}

impl Tracker {
    /// Create a tracker with the cursor on the first onset
    ///
    /// # Arguments
    /// * `onsets` - Reference onsets in time order
    /// * `note_range` - Notes covered by the activation vectors
    /// * `config` - Thresholds, lookahead and offset weights
    pub fn new(onsets: Vec<Onset>, note_range: NoteRange, config: TrackerConfig) -> Self {
        let labels = onsets
            .iter()
            .map(|onset| {
                let mut label = vec![0.0; note_range.count()];
                for note in &onset.notes {
                    let number = i32::from(note.number());
                    if note_range.contains(number) {
                        label[(number - note_range.start) as usize] = 1.0;
                    }
                }
                label
            })
            .collect();

        log::debug!(
            "[Tracker] Following {} onsets with lookahead {}",
            onsets.len(),
            config.lookahead
        );

        Self {
            config,
            onsets,
            labels,
            index: 0,
            detector: EdgeDetector::default(),
            on_cursor_moved: None,
        }
    }

    /// Register the cursor-moved notification
    pub fn set_cursor_moved_callback(&mut self, callback: impl FnMut(usize) + Send + 'static) {
        self.on_cursor_moved = Some(Box::new(callback));
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn onsets(&self) -> &[Onset] {
        &self.onsets
    }

    pub fn current_onset(&self) -> Option<&Onset> {
        self.onsets.get(self.index)
    }

    /// Re-seat the cursor and clear the edge detector
    ///
    /// Positions past the last onset are clamped to it.
    pub fn start(&mut self, position: usize) {
        self.index = position.min(self.onsets.len().saturating_sub(1));
        self.detector = EdgeDetector::default();
        log::debug!("[Tracker] Started at onset {}", self.index);
    }

    /// Feed one prediction
    ///
    /// # Arguments
    /// * `onset_score` - Onset likelihood for this step
    /// * `activations` - One value per note of the tracker's note range
    ///
    /// # Returns
    /// The detection completed by this step, if any
    ///
    /// # Panics
    /// Panics if `activations` does not match the note range
    pub fn update(&mut self, onset_score: f32, activations: &[f32]) -> Option<Detection> {
        if let Some(label) = self.labels.first() {
            assert_eq!(
                activations.len(),
                label.len(),
                "activation vector does not match the note range"
            );
        }

        if onset_score > self.config.onset_peak_height {
            if !self.detector.armed || onset_score > self.detector.peak {
                self.detector.peak = onset_score;
                self.detector.activations_at_peak.clear();
                self.detector.activations_at_peak.extend_from_slice(activations);
            }
            self.detector.armed = true;
            return None;
        }

        if !self.detector.armed || onset_score > self.config.onset_trigger {
            return None;
        }

        self.detector.armed = false;
        let activations = std::mem::take(&mut self.detector.activations_at_peak);
        let detection = self.match_onset(&activations)?;

        if detection.offset > 0 {
            self.index = detection.index;
            log::debug!(
                "[Tracker] Cursor moved by {} to onset {}",
                detection.offset,
                self.index
            );
            if let Some(callback) = self.on_cursor_moved.as_mut() {
                callback(self.index);
            }
        }
        Some(detection)
    }

    fn match_onset(&self, activations: &[f32]) -> Option<Detection> {
        let last = self.onsets.len().checked_sub(1)?;
        let end = (self.index + self.config.lookahead).min(last);

        (self.index..=end)
            .map(|candidate| {
                let offset = candidate - self.index;
                let distance = euclidean_distance(&self.labels[candidate], activations)
                    * self.config.weight_for_offset(offset);
                Detection {
                    offset,
                    distance,
                    index: candidate,
                }
            })
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }
}

fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

#[cfg(test)]
mod tests;
