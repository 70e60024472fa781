/*
Note Names and Pitch
====================

Notes can be named the way musicians write them or by MIDI number:

  "C4"   middle C            (MIDI 60)
  "F#3"  F sharp, octave 3   (MIDI 54)
  "Bb2"  B flat, octave 2    (MIDI 46)
  "69"   MIDI number         (A4, 440 Hz)

The MIDI formula: note_number = 12 * (octave + 1) + semitone
Where semitone: C=0, C#=1, D=2, D#=3, E=4, F=5, F#=6, G=7, G#=8, A=9, A#=10, B=11

Octaves run from -1 ("C-1" = MIDI 0) to 9. Anything outside 0..=127 is
rejected rather than wrapped.
*/

/// Equal-tempered frequency of a MIDI note. A4 = 440 Hz = MIDI note 69.
pub fn midi_note_to_freq(note: u8) -> f32 {
    440.0 * 2.0_f32.powf((note as f32 - 69.0) / 12.0)
}

/// Nearest MIDI note for a frequency, if it lies in the MIDI range.
pub fn freq_to_midi_note(frequency: f32) -> Option<u8> {
    if !(frequency.is_finite() && frequency > 0.0) {
        return None;
    }
    let note = (69.0 + 12.0 * (frequency / 440.0).log2()).round();
    (0.0..=127.0).contains(&note).then_some(note as u8)
}

/// Parse `"C4"`, `"F#3"`, `"Bb2"`, `"Cs4"` or `"60"` into a MIDI note.
pub fn parse_note(name: &str) -> Option<u8> {
    let name = name.trim();
    if let Ok(number) = name.parse::<u8>() {
        return (number <= 127).then_some(number);
    }

    let mut chars = name.chars();
    let semitone: i32 = match chars.next()?.to_ascii_uppercase() {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };

    let rest = chars.as_str();
    let (accidental, octave) = match rest.chars().next() {
        Some('#') | Some('s') => (1, &rest[1..]),
        Some('b') => (-1, &rest[1..]),
        _ => (0, rest),
    };

    let octave: i32 = octave.parse().ok()?;
    if !(-1..=9).contains(&octave) {
        return None;
    }
    let note = 12 * (octave + 1) + semitone + accidental;
    u8::try_from(note).ok().filter(|&n| n <= 127)
}

/// `60` → `"C4"`. Accidentals are spelled as sharps.
pub fn note_name(note: u8) -> String {
    const NAMES: [&str; 12] = [
        "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
    ];
    let octave = note as i32 / 12 - 1;
    format!("{}{}", NAMES[note as usize % 12], octave)
}
