// DecayModel - fitted note decay curves
//
// Each representable note carries four curve parameters (a, b, c, d) for
// `a·exp((offset - b)²·c) + d` and one normalization sum per supported window
// size. The table is loaded once and shared read-only by every worker.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::NoteRange;
use crate::error::CompileError;
use crate::note::Note;

/// Window sizes with precomputed normalization sums, in table column order
pub const SUPPORTED_WINDOW_SIZES: [usize; 4] = [1024, 2048, 4096, 8192];

/// Offsets past this many samples decay to zero
pub const MAX_DECAY_OFFSET: i64 = 44100;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DecayTable {
    representable_note_range: NoteRange,
    curve_coefficients: Vec<[f32; 4]>,
    curve_sums: Vec<Vec<f32>>,
}

/// Immutable per-note decay curves and normalization constants
#[derive(Debug, Clone, PartialEq)]
pub struct DecayModel {
    note_range: NoteRange,
    coefficients: Vec<[f32; 4]>,
    /// `sums[k][note_index]` for window size `SUPPORTED_WINDOW_SIZES[k]`
    sums: [Vec<f32>; 4],
}

impl DecayModel {
    /// Load the curve table from JSON
    ///
    /// # Arguments
    /// * `path` - Decay table file
    ///
    /// # Returns
    /// * `Ok(DecayModel)` - Validated model
    /// * `Err(CompileError::DecayModelUnavailable)` - Missing, unparsable or inconsistent table
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, CompileError> {
        let path = path.as_ref();
        let unavailable = |reason: String| CompileError::DecayModelUnavailable {
            path: path.to_path_buf(),
            reason,
        };

        let contents = fs::read_to_string(path).map_err(|err| unavailable(err.to_string()))?;
        let table: DecayTable =
            serde_json::from_str(&contents).map_err(|err| unavailable(err.to_string()))?;

        let model = Self::from_parameters(
            table.representable_note_range,
            table.curve_coefficients,
            table.curve_sums,
        )
        .map_err(|err| match err {
            CompileError::DecayModelUnavailable { reason, .. } => unavailable(reason),
            other => other,
        })?;

        log::info!(
            "[DecayModel] Loaded {} note curves from {:?}",
            model.note_range.count(),
            path
        );
        Ok(model)
    }

    /// Build a model from in-memory parameters
    ///
    /// # Arguments
    /// * `note_range` - Notes covered by the table
    /// * `coefficients` - `[a, b, c, d]` per note
    /// * `sums` - Four rows (1024, 2048, 4096, 8192) of one sum per note
    pub fn from_parameters(
        note_range: NoteRange,
        coefficients: Vec<[f32; 4]>,
        sums: Vec<Vec<f32>>,
    ) -> Result<Self, CompileError> {
        let unavailable = |reason: String| CompileError::DecayModelUnavailable {
            path: PathBuf::new(),
            reason,
        };
        let count = note_range.count();

        if coefficients.len() != count {
            return Err(unavailable(format!(
                "expected {} coefficient rows, found {}",
                count,
                coefficients.len()
            )));
        }
        if coefficients.iter().flatten().any(|v| !v.is_finite()) {
            return Err(unavailable("non-finite curve coefficient".to_string()));
        }

        let sums: [Vec<f32>; 4] = sums.try_into().map_err(|rows: Vec<Vec<f32>>| {
            unavailable(format!("expected 4 curve sum rows, found {}", rows.len()))
        })?;
        for (row, size) in sums.iter().zip(SUPPORTED_WINDOW_SIZES) {
            if row.len() != count {
                return Err(unavailable(format!(
                    "curve sums for window size {} have {} entries, expected {}",
                    size,
                    row.len(),
                    count
                )));
            }
            if row.iter().any(|v| !(v.is_finite() && *v > 0.0)) {
                return Err(unavailable(format!(
                    "curve sums for window size {} must be positive",
                    size
                )));
            }
        }

        Ok(Self {
            note_range,
            coefficients,
            sums,
        })
    }

    pub fn note_range(&self) -> NoteRange {
        self.note_range
    }

    fn note_index(&self, note: Note) -> Option<usize> {
        let number = note.number() as i32;
        self.note_range
            .contains(number)
            .then(|| (number - self.note_range.start) as usize)
    }

    /// Decay curve value `offset` samples after a note starts
    ///
    /// Returns 0 for negative offsets, offsets past `MAX_DECAY_OFFSET` and
    /// notes outside the table.
    pub fn decay_value(&self, note: Note, offset: i64) -> f32 {
        if !(0..=MAX_DECAY_OFFSET).contains(&offset) {
            return 0.0;
        }
        let Some(index) = self.note_index(note) else {
            return 0.0;
        };
        let [a, b, c, d] = self.coefficients[index];
        let x = offset as f32 - b;
        a * (x * x * c).exp() + d
    }

    /// Normalization constant of a note for a window size
    ///
    /// # Errors
    /// * `UnsupportedWindowSize` - window size without a precomputed sum
    /// * `DecayModelUnavailable` - note outside the table
    pub fn normalization(&self, note: Note, window_size: usize) -> Result<f32, CompileError> {
        let column = SUPPORTED_WINDOW_SIZES
            .iter()
            .position(|&size| size == window_size)
            .ok_or(CompileError::UnsupportedWindowSize { window_size })?;
        let index = self
            .note_index(note)
            .ok_or_else(|| CompileError::DecayModelUnavailable {
                path: PathBuf::new(),
                reason: format!("note {} outside {}", note, self.note_range),
            })?;
        Ok(self.sums[column][index])
    }
}
