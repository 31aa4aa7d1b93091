// CSV event reader
//
// One event per line: `note,start,duration[,velocity]` with start and
// duration in samples and velocity as a MIDI velocity (0-127).

use std::fs;
use std::path::Path;

use super::Event;
use crate::error::CompileError;
use crate::note::Note;

/// Velocity assumed when the column is absent
pub const DEFAULT_VELOCITY: u8 = 63;

/// Read and parse a CSV event file
pub fn read_csv(path: &Path) -> Result<Vec<Event>, CompileError> {
    let text = fs::read_to_string(path).map_err(|err| CompileError::MalformedEvents {
        path: path.to_path_buf(),
        line: 0,
        reason: format!("failed to read: {}", err),
    })?;
    parse_csv(&text, path)
}

/// Parse CSV event text
///
/// # Arguments
/// * `text` - File contents
/// * `path` - Reported in errors
///
/// # Returns
/// Events in file order; blank lines are skipped
pub fn parse_csv(text: &str, path: &Path) -> Result<Vec<Event>, CompileError> {
    let mut events = Vec::new();

    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let malformed = |reason: String| CompileError::MalformedEvents {
            path: path.to_path_buf(),
            line: index + 1,
            reason,
        };

        let values: Vec<&str> = line.split(',').map(str::trim).collect();
        if values.len() != 3 && values.len() != 4 {
            return Err(malformed(format!(
                "expected 3 or 4 columns, found {}",
                values.len()
            )));
        }

        let number: i32 = values[0]
            .parse()
            .map_err(|_| malformed(format!("invalid note '{}'", values[0])))?;
        let note = Note::from_number(number)
            .ok_or_else(|| malformed(format!("note {} outside MIDI range", number)))?;
        let start: i64 = values[1]
            .parse()
            .map_err(|_| malformed(format!("invalid start '{}'", values[1])))?;
        let duration: i64 = values[2]
            .parse()
            .map_err(|_| malformed(format!("invalid duration '{}'", values[2])))?;
        let velocity: u8 = match values.get(3) {
            Some(v) => v
                .parse::<u8>()
                .ok()
                .filter(|v| *v <= 127)
                .ok_or_else(|| malformed(format!("invalid velocity '{}'", v)))?,
            None => DEFAULT_VELOCITY,
        };

        events.push(Event {
            note,
            start,
            duration,
            velocity: velocity as f32 / 127.0,
        });
    }

    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_three_and_four_columns() {
        let events = parse_csv("60,0,4410\n\n64, 100, 200, 127\n", Path::new("t.csv")).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].note.number(), 60);
        assert!((events[0].velocity - 63.0 / 127.0).abs() < 1e-7);
        assert_eq!(events[1].start, 100);
        assert_eq!(events[1].duration, 200);
        assert_eq!(events[1].velocity, 1.0);
    }

    #[test]
    fn test_wrong_column_count_names_line() {
        let err = parse_csv("60,0,10\n61,5\n", Path::new("bad.csv")).unwrap_err();
        match err {
            CompileError::MalformedEvents { path, line, .. } => {
                assert_eq!(path, Path::new("bad.csv"));
                assert_eq!(line, 2);
            }
            other => panic!("Expected MalformedEvents, got {:?}", other),
        }
    }

    #[test]
    fn test_unparsable_value() {
        assert!(parse_csv("C4,0,10\n", Path::new("x.csv")).is_err());
        assert!(parse_csv("60,zero,10\n", Path::new("x.csv")).is_err());
        assert!(parse_csv("60,0,10,200\n", Path::new("x.csv")).is_err());
        assert!(parse_csv("128,0,10\n", Path::new("x.csv")).is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = read_csv(Path::new("/nonexistent/events.csv")).unwrap_err();
        assert!(matches!(err, CompileError::MalformedEvents { line: 0, .. }));
    }
}
