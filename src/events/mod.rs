// Events module - Ground-truth note events
//
// Events come from CSV files (`note,start,duration[,velocity]`, sample units)
// or Standard MIDI Files (tick units converted through the tempo map). Both
// loaders return events sorted by start sample.

mod csv;
mod midi;

pub use csv::{parse_csv, read_csv, DEFAULT_VELOCITY};
pub use midi::{read_midi, MidiNote, MidiScore};

use std::path::Path;

use crate::error::CompileError;
use crate::note::Note;

/// One sounding note in sample units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Event {
    pub note: Note,
    /// Start of the event in samples
    pub start: i64,
    /// Duration of the event in samples
    pub duration: i64,
    /// MIDI velocity scaled to 0.0..=1.0
    pub velocity: f32,
}

impl Event {
    /// First sample after the event
    pub fn end(&self) -> i64 {
        self.start + self.duration
    }
}

/// Annotation formats recognized next to audio files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventFormat {
    Csv,
    Midi,
}

impl EventFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "csv" => Some(EventFormat::Csv),
            "mid" | "midi" => Some(EventFormat::Midi),
            _ => None,
        }
    }
}

/// Load events from a CSV or MIDI file, sorted by start
///
/// # Arguments
/// * `path` - Annotation file; the format follows the extension
/// * `sampling_frequency` - Used to convert MIDI time to samples
pub fn load_events(path: &Path, sampling_frequency: f64) -> Result<Vec<Event>, CompileError> {
    let mut events = match EventFormat::from_path(path) {
        Some(EventFormat::Csv) => read_csv(path)?,
        Some(EventFormat::Midi) => read_midi(path)?.to_events(sampling_frequency),
        None => {
            return Err(CompileError::MalformedEvents {
                path: path.to_path_buf(),
                line: 0,
                reason: "unrecognized annotation extension".to_string(),
            })
        }
    };
    sort_events(&mut events);
    Ok(events)
}

/// Stable sort by start sample
pub fn sort_events(events: &mut [Event]) {
    events.sort_by_key(|event| event.start);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(EventFormat::from_path(Path::new("a/b.CSV")), Some(EventFormat::Csv));
        assert_eq!(EventFormat::from_path(Path::new("a/b.mid")), Some(EventFormat::Midi));
        assert_eq!(EventFormat::from_path(Path::new("a/b.wav")), None);
        assert_eq!(EventFormat::from_path(Path::new("a/b")), None);
    }

    #[test]
    fn test_load_events_sorts_by_start() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("take.csv");
        std::fs::write(&path, "60,2000,100\n62,100,50,127\n").unwrap();

        let events = load_events(&path, 44100.0).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].start, 100);
        assert_eq!(events[0].velocity, 1.0);
        assert_eq!(events[1].note.number(), 60);
        assert_eq!(events[1].end(), 2100);
    }

    #[test]
    fn test_load_events_rejects_unknown_extension() {
        let err = load_events(Path::new("notes.txt"), 44100.0).unwrap_err();
        assert!(matches!(err, CompileError::MalformedEvents { .. }));
    }
}
