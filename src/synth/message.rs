#[cfg(feature = "rtrb")]
use rtrb::{Consumer, Producer};

use std::collections::VecDeque;

#[cfg(feature = "rtrb")]
use log::warn;

/// Note events queued for the thread that owns the [`Synth`](super::Synth).
///
/// MIDI notes use their number as voice key ("60"), so they address the same
/// voices as `Synth::note_on("60")`. Frequency voices use `"freq:{id}"`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum SynthMessage {
    NoteOn { note: u8, velocity: u8 },
    NoteOff { note: u8 },
    PlayFrequency { id: u32, frequency: f32, velocity: f32 },
    StopFrequency { id: u32 },
    AllNotesOff,
    Panic,
}

impl SynthMessage {
    pub fn note_key(note: u8) -> String {
        note.to_string()
    }

    pub fn frequency_key(id: u32) -> String {
        format!("freq:{id}")
    }
}

pub trait MessageReceiver {
    fn pop(&mut self) -> Option<SynthMessage>;
}

#[cfg(feature = "rtrb")]
impl MessageReceiver for Consumer<SynthMessage> {
    fn pop(&mut self) -> Option<SynthMessage> {
        Consumer::pop(self).ok()
    }
}

impl MessageReceiver for VecDeque<SynthMessage> {
    fn pop(&mut self) -> Option<SynthMessage> {
        self.pop_front()
    }
}

/// Sending half of a synth's message queue. Cheap to move to another thread.
#[cfg(feature = "rtrb")]
pub struct SynthHandle {
    tx: Producer<SynthMessage>,
}

#[cfg(feature = "rtrb")]
impl SynthHandle {
    pub(crate) fn new(tx: Producer<SynthMessage>) -> Self {
        Self { tx }
    }

    /// Queue `message`. Returns false, and drops the message, when the queue
    /// is full.
    pub fn send(&mut self, message: SynthMessage) -> bool {
        match self.tx.push(message) {
            Ok(()) => true,
            Err(_) => {
                warn!("synth message queue full, dropped {message:?}");
                false
            }
        }
    }

    pub fn note_on(&mut self, note: u8, velocity: u8) -> bool {
        self.send(SynthMessage::NoteOn { note, velocity })
    }

    pub fn note_off(&mut self, note: u8) -> bool {
        self.send(SynthMessage::NoteOff { note })
    }

    pub fn play_frequency(&mut self, id: u32, frequency: f32, velocity: f32) -> bool {
        self.send(SynthMessage::PlayFrequency {
            id,
            frequency,
            velocity,
        })
    }

    pub fn stop_frequency(&mut self, id: u32) -> bool {
        self.send(SynthMessage::StopFrequency { id })
    }

    pub fn all_notes_off(&mut self) -> bool {
        self.send(SynthMessage::AllNotesOff)
    }

    pub fn panic(&mut self) -> bool {
        self.send(SynthMessage::Panic)
    }

    /// Free slots left in the queue.
    pub fn slots(&self) -> usize {
        self.tx.slots()
    }
}
