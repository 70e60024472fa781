// Purpose - external interfaces, format conversions

pub mod converter;

pub use converter::{midi_note_to_freq, note_name, parse_note};
