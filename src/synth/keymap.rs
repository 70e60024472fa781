use std::collections::HashMap;

use crate::io::converter::{midi_note_to_freq, parse_note};

/// Resolves the opaque keys passed to `Synth::note_on` into frequencies.
///
/// Explicit bindings win; otherwise the key is read as a note name ("C4",
/// "F#3") or MIDI number ("60") and shifted by `transpose` semitones.
#[derive(Debug, Clone, Default)]
pub struct KeyMap {
    bindings: HashMap<String, f32>,
    transpose: i8,
}

impl KeyMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `key` to a fixed frequency (e.g. a computer-keyboard letter).
    pub fn bind(&mut self, key: impl Into<String>, frequency: f32) {
        self.bindings.insert(key.into(), frequency);
    }

    pub fn unbind(&mut self, key: &str) -> Option<f32> {
        self.bindings.remove(key)
    }

    pub fn transpose(&self) -> i8 {
        self.transpose
    }

    pub fn set_transpose(&mut self, semitones: i8) {
        self.transpose = semitones;
    }

    pub fn frequency(&self, key: &str) -> Option<f32> {
        if let Some(&frequency) = self.bindings.get(key) {
            return Some(frequency);
        }
        let note = parse_note(key)? as i16 + self.transpose as i16;
        u8::try_from(note)
            .ok()
            .filter(|&n| n <= 127)
            .map(midi_note_to_freq)
    }
}
