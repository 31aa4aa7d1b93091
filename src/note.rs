// Note module - MIDI note numbers, names and frequencies

use std::fmt;

const NAMES: [&str; 12] = [
    "C", "C♯", "D", "D♯", "E", "F", "F♯", "G", "G♯", "A", "A♯", "B",
];

/// MIDI note number in 0..=127
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Note(u8);

impl Note {
    /// Create a note from a MIDI note number
    ///
    /// # Returns
    /// `None` if the number is outside 0..=127
    pub fn from_number(number: i32) -> Option<Self> {
        if (0..=127).contains(&number) {
            Some(Self(number as u8))
        } else {
            None
        }
    }

    pub fn number(&self) -> u8 {
        self.0
    }

    /// Octave in scientific pitch notation (MIDI 60 is C4)
    pub fn octave(&self) -> i32 {
        self.0 as i32 / 12 - 1
    }

    pub fn is_sharp(&self) -> bool {
        NAMES[(self.0 % 12) as usize].ends_with('♯')
    }

    /// Equal-tempered frequency in Hz
    pub fn frequency(&self) -> f64 {
        note_to_freq(self.0 as f64)
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", NAMES[(self.0 % 12) as usize], self.octave())
    }
}

/// Frequency in Hz of a fractional MIDI note (A4 = 69 = 440 Hz)
pub fn note_to_freq(note: f64) -> f64 {
    440.0 * ((note - 69.0) / 12.0).exp2()
}

/// Fractional MIDI note of a frequency in Hz
pub fn freq_to_note(freq: f64) -> f64 {
    12.0 * (freq / 440.0).log2() + 69.0
}
