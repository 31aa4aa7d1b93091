// MIDI event reader
//
// Parses a Standard MIDI File with `midly`, pairs note-on/note-off messages
// per channel and key, and converts tick positions through the tempo map.

use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fs;
use std::path::Path;

use super::Event;
use crate::error::CompileError;
use crate::note::Note;

/// Microseconds per beat before the first tempo event (120 BPM)
const DEFAULT_TEMPO: u32 = 500_000;

/// A paired note in tick units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MidiNote {
    pub key: u8,
    pub velocity: u8,
    pub channel: u8,
    pub tick: u64,
    pub duration_ticks: u64,
}

/// Notes and timing of one MIDI file
#[derive(Debug, Clone)]
pub struct MidiScore {
    notes: Vec<MidiNote>,
    ticks_per_beat: f64,
    /// Seconds per tick for timecode files; tempo map is ignored then
    timecode_tick: Option<f64>,
    /// (tick, microseconds per beat), sorted by tick, first entry at tick 0
    tempo_map: Vec<(u64, u32)>,
}

/// Read and parse a MIDI file
pub fn read_midi(path: &Path) -> Result<MidiScore, CompileError> {
    let bytes = fs::read(path).map_err(|err| CompileError::MalformedEvents {
        path: path.to_path_buf(),
        line: 0,
        reason: format!("failed to read: {}", err),
    })?;
    MidiScore::parse(&bytes).map_err(|reason| CompileError::MalformedEvents {
        path: path.to_path_buf(),
        line: 0,
        reason,
    })
}

impl MidiScore {
    /// Parse MIDI file bytes
    pub fn parse(bytes: &[u8]) -> Result<Self, String> {
        let smf = Smf::parse(bytes).map_err(|err| format!("invalid MIDI file: {}", err))?;

        let (ticks_per_beat, timecode_tick) = match smf.header.timing {
            Timing::Metrical(ppq) => (ppq.as_int().max(1) as f64, None),
            Timing::Timecode(fps, subframes) => {
                let ticks_per_second = fps.as_f32() as f64 * subframes.max(1) as f64;
                // Beats are reported at the default tempo
                (ticks_per_second * DEFAULT_TEMPO as f64 / 1e6, Some(1.0 / ticks_per_second))
            }
        };

        let mut tempo_changes: BTreeMap<u64, u32> = BTreeMap::new();
        let mut notes = Vec::new();

        for track in &smf.tracks {
            let mut tick: u64 = 0;
            let mut pending: HashMap<(u8, u8), VecDeque<(u64, u8)>> = HashMap::new();

            for event in track {
                tick += event.delta.as_int() as u64;
                match event.kind {
                    TrackEventKind::Meta(MetaMessage::Tempo(tempo)) => {
                        tempo_changes.insert(tick, tempo.as_int());
                    }
                    TrackEventKind::Midi { channel, message } => {
                        let channel = channel.as_int();
                        match message {
                            MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                                pending
                                    .entry((channel, key.as_int()))
                                    .or_default()
                                    .push_back((tick, vel.as_int()));
                            }
                            MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                                let key = key.as_int();
                                if let Some((start, velocity)) = pending
                                    .get_mut(&(channel, key))
                                    .and_then(VecDeque::pop_front)
                                {
                                    notes.push(MidiNote {
                                        key,
                                        velocity,
                                        channel,
                                        tick: start,
                                        duration_ticks: tick - start,
                                    });
                                }
                            }
                            _ => {}
                        }
                    }
                    _ => {}
                }
            }

            // Notes still sounding at the end of the track end there
            for ((channel, key), starts) in pending {
                for (start, velocity) in starts {
                    notes.push(MidiNote {
                        key,
                        velocity,
                        channel,
                        tick: start,
                        duration_ticks: tick - start,
                    });
                }
            }
        }

        notes.sort_by_key(|n| (n.tick, n.key));

        let mut tempo_map: Vec<(u64, u32)> = tempo_changes.into_iter().collect();
        if tempo_map.first().map(|(t, _)| *t) != Some(0) {
            tempo_map.insert(0, (0, DEFAULT_TEMPO));
        }

        Ok(Self {
            notes,
            ticks_per_beat,
            timecode_tick,
            tempo_map,
        })
    }

    /// Paired notes sorted by tick
    pub fn notes(&self) -> &[MidiNote] {
        &self.notes
    }

    /// Position of a tick in beats
    pub fn beats_at(&self, tick: u64) -> f64 {
        tick as f64 / self.ticks_per_beat
    }

    /// Wall-clock time of a tick in seconds
    pub fn seconds_at(&self, tick: u64) -> f64 {
        if let Some(seconds_per_tick) = self.timecode_tick {
            return tick as f64 * seconds_per_tick;
        }

        let mut seconds = 0.0;
        for (i, &(change_tick, tempo)) in self.tempo_map.iter().enumerate() {
            if change_tick >= tick {
                break;
            }
            let segment_end = self
                .tempo_map
                .get(i + 1)
                .map(|(next, _)| (*next).min(tick))
                .unwrap_or(tick);
            let seconds_per_tick = tempo as f64 / 1e6 / self.ticks_per_beat;
            seconds += (segment_end - change_tick) as f64 * seconds_per_tick;
        }
        seconds
    }

    /// Convert notes to sample-unit events
    pub fn to_events(&self, sampling_frequency: f64) -> Vec<Event> {
        self.notes
            .iter()
            .filter_map(|n| {
                let note = Note::from_number(n.key as i32)?;
                let start = (self.seconds_at(n.tick) * sampling_frequency) as i64;
                let end = (self.seconds_at(n.tick + n.duration_ticks) * sampling_frequency) as i64;
                Some(Event {
                    note,
                    start,
                    duration: end - start,
                    velocity: n.velocity as f32 / 127.0,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use midly::{Format, Header, TrackEvent};

    fn note_on(delta: u32, key: u8, vel: u8) -> TrackEvent<'static> {
        TrackEvent {
            delta: delta.into(),
            kind: TrackEventKind::Midi {
                channel: 0.into(),
                message: MidiMessage::NoteOn {
                    key: key.into(),
                    vel: vel.into(),
                },
            },
        }
    }

    fn note_off(delta: u32, key: u8) -> TrackEvent<'static> {
        TrackEvent {
            delta: delta.into(),
            kind: TrackEventKind::Midi {
                channel: 0.into(),
                message: MidiMessage::NoteOff {
                    key: key.into(),
                    vel: 0.into(),
                },
            },
        }
    }

    fn tempo(delta: u32, micros: u32) -> TrackEvent<'static> {
        TrackEvent {
            delta: delta.into(),
            kind: TrackEventKind::Meta(MetaMessage::Tempo(micros.into())),
        }
    }

    fn end_of_track() -> TrackEvent<'static> {
        TrackEvent {
            delta: 0.into(),
            kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
        }
    }

    fn write(track: Vec<TrackEvent<'static>>) -> Vec<u8> {
        let mut smf = Smf::new(Header::new(Format::SingleTrack, Timing::Metrical(480.into())));
        smf.tracks.push(track);
        let mut bytes = Vec::new();
        smf.write(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_pairs_note_on_and_off() {
        let bytes = write(vec![
            note_on(0, 60, 100),
            note_on(0, 64, 80),
            note_off(480, 60),
            // velocity-zero note-on acts as note-off
            note_on(480, 64, 0),
            end_of_track(),
        ]);
        let score = MidiScore::parse(&bytes).unwrap();
        let notes = score.notes();
        assert_eq!(notes.len(), 2);
        assert_eq!((notes[0].key, notes[0].duration_ticks), (60, 480));
        assert_eq!((notes[1].key, notes[1].duration_ticks), (64, 960));
        assert_eq!(notes[1].velocity, 80);
    }

    #[test]
    fn test_default_tempo_to_samples() {
        let bytes = write(vec![note_on(480, 69, 127), note_off(480, 69), end_of_track()]);
        let score = MidiScore::parse(&bytes).unwrap();
        let events = score.to_events(44100.0);

        // 120 BPM: one beat is half a second
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].start, 22050);
        assert_eq!(events[0].duration, 22050);
        assert_eq!(events[0].velocity, 1.0);
        assert_eq!(score.beats_at(480), 1.0);
    }

    #[test]
    fn test_tempo_change_mid_file() {
        let bytes = write(vec![
            tempo(0, 500_000),
            tempo(480, 1_000_000),
            note_on(480, 60, 90),
            note_off(480, 60),
            end_of_track(),
        ]);
        let score = MidiScore::parse(&bytes).unwrap();
        assert!((score.seconds_at(480) - 0.5).abs() < 1e-12);
        assert!((score.seconds_at(960) - 1.5).abs() < 1e-12);
        assert!((score.seconds_at(1440) - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_unterminated_note_ends_with_track() {
        let bytes = write(vec![note_on(0, 60, 90), tempo(240, 500_000), end_of_track()]);
        let score = MidiScore::parse(&bytes).unwrap();
        assert_eq!(score.notes().len(), 1);
        assert_eq!(score.notes()[0].duration_ticks, 240);
    }

    #[test]
    fn test_invalid_bytes() {
        assert!(MidiScore::parse(b"not a midi file").is_err());
    }
}
