// Labels module - Training targets from ground-truth events
//
// - decay: DecayModel (fitted per-note decay curves and normalization sums)
// - labeler: Labeler (onset, polyphony and per-note activations per window)

mod decay;
mod labeler;

pub use decay::{DecayModel, MAX_DECAY_OFFSET, SUPPORTED_WINDOW_SIZES};
pub use labeler::Labeler;

/// Label data for one analysis window
#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    /// Window-weighted mean of the onsets falling in the window (0.0 to 1.0)
    pub onset: f32,

    /// Number of notes with non-zero activation
    pub polyphony: f32,

    /// Activation per representable note
    pub notes: Vec<f32>,
}

impl Label {
    /// All-zero label
    pub fn new(note_count: usize) -> Self {
        Self {
            onset: 0.0,
            polyphony: 0.0,
            notes: vec![0.0; note_count],
        }
    }

    pub fn is_finite(&self) -> bool {
        self.onset.is_finite()
            && self.polyphony.is_finite()
            && self.notes.iter().all(|v| v.is_finite())
    }
}
