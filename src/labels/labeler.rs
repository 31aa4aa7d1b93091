// Labeler - decay-weighted targets for one analysis window
//
// notes[n]  = scale · Σ_events(n) Σ_i decay(n, i - start) · hamming[i - ws] / norm(n, W)
// onset     = mean hamming[start - ws] over events starting inside the window
// polyphony = count of notes with non-zero activation

use std::sync::Arc;

use super::{DecayModel, Label};
use crate::analysis::features::hamming_window;
use crate::config::{Configuration, NoteRange};
use crate::error::CompileError;
use crate::events::Event;
use crate::note::Note;

/// Computes labels from sorted events and a shared decay model
#[derive(Debug, Clone)]
pub struct Labeler {
    model: Arc<DecayModel>,
    window: Vec<f64>,
    note_range: NoteRange,
    /// Normalization per representable note for the configured window size
    normalizations: Vec<f32>,
    scale: f64,
}

impl Labeler {
    /// Create a labeler for one configuration
    ///
    /// # Errors
    /// * `UnsupportedWindowSize` - window size without precomputed sums
    /// * `DecayModelUnavailable` - model does not cover every representable note
    pub fn new(config: &Configuration, model: Arc<DecayModel>) -> Result<Self, CompileError> {
        let note_range = config.representable_note_range;
        let normalizations = note_range
            .notes()
            .map(|number| {
                let note = Note::from_number(number).ok_or_else(|| {
                    CompileError::InvalidConfiguration {
                        reason: format!("note {} outside MIDI range", number),
                    }
                })?;
                model.normalization(note, config.window_size)
            })
            .collect::<Result<Vec<f32>, CompileError>>()?;

        Ok(Self {
            model,
            window: hamming_window(config.window_size),
            note_range,
            normalizations,
            scale: config.note_activation_scale,
        })
    }

    pub fn window_size(&self) -> usize {
        self.window.len()
    }

    /// Label for the window starting at `window_start`
    ///
    /// # Arguments
    /// * `events` - Events sorted by start sample
    /// * `window_start` - First sample of the window
    ///
    /// # Errors
    /// `NonFiniteLabel` if any label value is NaN or infinite
    pub fn label(&self, events: &[Event], window_start: usize) -> Result<Label, CompileError> {
        let ws = window_start as i64;
        let window_end = ws + self.window.len() as i64;

        let mut notes = vec![0.0f64; self.note_range.count()];
        let mut onset_sum = 0.0f64;
        let mut onset_count = 0usize;

        for event in events {
            if event.start >= window_end {
                break;
            }
            if event.start >= ws {
                onset_sum += self.window[(event.start - ws) as usize];
                onset_count += 1;
            }
            if event.end() <= ws {
                continue;
            }

            let number = event.note.number() as i32;
            if !self.note_range.contains(number) {
                continue;
            }
            let index = (number - self.note_range.start) as usize;
            notes[index] += self.event_value(event, ws, window_end, index);
        }

        let onset = if onset_count > 0 {
            onset_sum / onset_count as f64
        } else {
            0.0
        };

        let non_finite = |detail: String| CompileError::NonFiniteLabel {
            window_start,
            detail,
        };
        if !onset.is_finite() {
            return Err(non_finite("onset".to_string()));
        }

        let mut values = Vec::with_capacity(notes.len());
        for (index, value) in notes.into_iter().enumerate() {
            let value = (self.scale * value) as f32;
            if !value.is_finite() {
                return Err(non_finite(format!(
                    "note {}",
                    self.note_range.start + index as i32
                )));
            }
            values.push(value);
        }
        let polyphony = values.iter().filter(|&&v| v > 0.0).count() as f32;

        Ok(Label {
            onset: onset as f32,
            polyphony,
            notes: values,
        })
    }

    /// Windowed decay sum of one event over its overlap with the window
    fn event_value(&self, event: &Event, ws: i64, window_end: i64, note_index: usize) -> f64 {
        let start = event.start.max(ws);
        let end = event.end().min(window_end);

        let sum: f64 = (start..end)
            .map(|i| {
                let decay = self.model.decay_value(event.note, i - event.start) as f64;
                decay * self.window[(i - ws) as usize]
            })
            .sum();
        sum / self.normalizations[note_index] as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::scores::{event, synthetic_decay_model};

    fn config() -> Configuration {
        Configuration {
            window_size: 1024,
            step_size: 256,
            ..Configuration::default()
        }
    }

    fn labeler(config: &Configuration) -> Labeler {
        let model = Arc::new(synthetic_decay_model(config.representable_note_range));
        Labeler::new(config, model).unwrap()
    }

    #[test]
    fn test_empty_window() {
        let config = config();
        let label = labeler(&config).label(&[], 0).unwrap();
        assert_eq!(label, Label::new(config.note_count()));
    }

    #[test]
    fn test_note_covering_window_scales_to_two() {
        let config = config();
        let labeler = labeler(&config);
        let events = [event(60, 1000, 4000)];

        // The synthetic normalization is the windowed decay sum of a note
        // starting at the window start
        let label = labeler.label(&events, 1000).unwrap();
        let index = (60 - config.representable_note_range.start) as usize;
        assert!((label.notes[index] - 2.0).abs() < 1e-4, "{}", label.notes[index]);
        assert_eq!(label.polyphony, 1.0);
        assert!((label.onset - 0.08).abs() < 1e-6);
    }

    #[test]
    fn test_activation_scale_is_configurable() {
        let config = Configuration {
            note_activation_scale: 1.0,
            ..config()
        };
        let events = [event(60, 1000, 4000)];
        let label = labeler(&config).label(&events, 1000).unwrap();
        let index = (60 - config.representable_note_range.start) as usize;
        assert!((label.notes[index] - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_onset_is_mean_window_weight() {
        let config = config();
        let labeler = labeler(&config);
        // starts at the window centre and at the window start
        let events = [event(60, 0, 100), event(64, 512, 100)];
        let label = labeler.label(&events, 0).unwrap();
        assert!((label.onset - (0.08 + 1.0) / 2.0).abs() < 1e-6);
        assert_eq!(label.polyphony, 2.0);
    }

    #[test]
    fn test_events_outside_window_ignored() {
        let config = config();
        let labeler = labeler(&config);
        // ends exactly at the window start; starts exactly at the window end
        let events = [event(60, 0, 2048), event(62, 3072, 500)];
        let label = labeler.label(&events, 2048).unwrap();
        assert_eq!(label, Label::new(config.note_count()));
    }

    #[test]
    fn test_event_before_window_still_sounding() {
        let config = config();
        let labeler = labeler(&config);
        let events = [event(67, 0, 10_000)];
        let label = labeler.label(&events, 2048).unwrap();
        let index = (67 - config.representable_note_range.start) as usize;
        assert!(label.notes[index] > 0.0);
        assert_eq!(label.onset, 0.0);
    }

    #[test]
    fn test_unrepresentable_note_counts_for_onset_only() {
        let config = config();
        let labeler = labeler(&config);
        let events = [event(10, 512, 100)];
        let label = labeler.label(&events, 0).unwrap();
        assert_eq!(label.polyphony, 0.0);
        assert!((label.onset - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_unsupported_window_size() {
        let config = Configuration {
            window_size: 3000,
            ..Configuration::default()
        };
        let model = Arc::new(synthetic_decay_model(config.representable_note_range));
        assert_eq!(
            Labeler::new(&config, model).unwrap_err(),
            CompileError::UnsupportedWindowSize { window_size: 3000 }
        );
    }

    #[test]
    fn test_labels_finite_for_dense_events() {
        let config = config();
        let labeler = labeler(&config);
        let mut events: Vec<Event> = (0..200)
            .map(|i| event(21 + (i * 7 % 88) as i32, i as i64 * 97, 500 + i as i64 * 13))
            .collect();
        crate::events::sort_events(&mut events);

        for ws in (0..20_000).step_by(256) {
            let label = labeler.label(&events, ws).unwrap();
            assert!(label.is_finite());
            assert!(label.onset >= 0.0 && label.onset <= 1.0);
            assert!(label.notes.iter().all(|&v| v >= 0.0));
        }
    }
}
