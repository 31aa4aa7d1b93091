// Onset - reference positions the tracker follows

use std::collections::BTreeMap;

use crate::events::{Event, MidiScore};
use crate::note::Note;

/// Notes that start together
#[derive(Debug, Clone, PartialEq)]
pub struct Onset {
    /// Distinct notes, ascending
    pub notes: Vec<Note>,
    /// Position in beats
    pub start: f64,
    /// Seconds from the start of the piece at its own tempo
    pub wall_time: f64,
}

impl Onset {
    pub fn new(mut notes: Vec<Note>, start: f64, wall_time: f64) -> Self {
        notes.sort();
        notes.dedup();
        Self {
            notes,
            start,
            wall_time,
        }
    }
}

/// One onset per distinct MIDI tick, in time order
pub fn onsets_from_midi(score: &MidiScore) -> Vec<Onset> {
    let mut by_tick: BTreeMap<u64, Vec<Note>> = BTreeMap::new();
    for midi_note in score.notes() {
        if let Some(note) = Note::from_number(i32::from(midi_note.key)) {
            by_tick.entry(midi_note.tick).or_default().push(note);
        }
    }

    by_tick
        .into_iter()
        .map(|(tick, notes)| Onset::new(notes, score.beats_at(tick), score.seconds_at(tick)))
        .collect()
}

/// One onset per distinct event start, in time order
///
/// Events carry no tempo, so one beat is one second.
pub fn onsets_from_events(events: &[Event], sampling_frequency: f64) -> Vec<Onset> {
    let mut by_start: BTreeMap<i64, Vec<Note>> = BTreeMap::new();
    for event in events {
        by_start.entry(event.start).or_default().push(event.note);
    }

    by_start
        .into_iter()
        .map(|(start, notes)| {
            let seconds = start as f64 / sampling_frequency;
            Onset::new(notes, seconds, seconds)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::scores::event;

    #[test]
    fn test_events_grouped_by_start() {
        let events = vec![
            event(64, 44100, 100),
            event(60, 0, 100),
            event(67, 44100, 100),
            event(60, 0, 50),
        ];
        let onsets = onsets_from_events(&events, 44100.0);
        assert_eq!(onsets.len(), 2);
        assert_eq!(onsets[0].notes, vec![Note::from_number(60).unwrap()]);
        assert_eq!(onsets[0].start, 0.0);
        assert_eq!(
            onsets[1].notes.iter().map(|n| n.number()).collect::<Vec<_>>(),
            vec![64, 67]
        );
        assert_eq!(onsets[1].wall_time, 1.0);
    }
}
