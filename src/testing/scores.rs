//! Synthetic decay models and note events.

use serde_json::json;
use std::path::Path;

use crate::analysis::features::hamming_window;
use crate::config::NoteRange;
use crate::events::{Event, DEFAULT_VELOCITY};
use crate::labels::{DecayModel, SUPPORTED_WINDOW_SIZES};
use crate::note::Note;

/// Curve parameters of the synthetic model: slow Gaussian decay, faster for higher notes
fn synthetic_coefficients(range: NoteRange) -> Vec<[f32; 4]> {
    (0..range.count())
        .map(|index| [1.0, 0.0, -(1e-10 + index as f32 * 2e-11), 0.0])
        .collect()
}

/// Decay model whose normalization equals the windowed decay sum of a note
/// starting exactly at the window start
pub fn synthetic_decay_model(range: NoteRange) -> DecayModel {
    let coefficients = synthetic_coefficients(range);
    let placeholder = vec![vec![1.0; range.count()]; SUPPORTED_WINDOW_SIZES.len()];
    let shape = DecayModel::from_parameters(range, coefficients.clone(), placeholder)
        .expect("synthetic coefficients are consistent");

    let sums = SUPPORTED_WINDOW_SIZES
        .iter()
        .map(|&size| {
            let window = hamming_window(size);
            range
                .notes()
                .map(|number| {
                    let note = Note::from_number(number).expect("range within MIDI notes");
                    window
                        .iter()
                        .enumerate()
                        .map(|(i, w)| shape.decay_value(note, i as i64) as f64 * w)
                        .sum::<f64>() as f32
                })
                .collect()
        })
        .collect();

    DecayModel::from_parameters(range, coefficients, sums)
        .expect("synthetic sums are positive")
}

/// Write the synthetic model as a decay table JSON file
pub fn write_decay_table(path: &Path, range: NoteRange) -> std::io::Result<()> {
    let model = synthetic_decay_model(range);
    let sums: Vec<Vec<f32>> = SUPPORTED_WINDOW_SIZES
        .iter()
        .map(|&size| {
            range
                .notes()
                .filter_map(Note::from_number)
                .map(|note| model.normalization(note, size).unwrap_or(1.0))
                .collect()
        })
        .collect();

    let table = json!({
        "representableNoteRange": range.to_string(),
        "curveCoefficients": synthetic_coefficients(range),
        "curveSums": sums,
    });
    std::fs::write(path, serde_json::to_string_pretty(&table)?)
}

/// Event with the default velocity
pub fn event(note: i32, start: i64, duration: i64) -> Event {
    Event {
        note: Note::from_number(note).expect("test notes are valid MIDI notes"),
        start,
        duration,
        velocity: DEFAULT_VELOCITY as f32 / 127.0,
    }
}
