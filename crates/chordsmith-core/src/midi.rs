//! MIDI event types exchanged at the block boundary

use crate::theory::KEY_NAMES;

/// Channel used for pass-through and live-triggered chords
pub const LIVE_CHANNEL: u8 = 1;
/// Channel used for notes coming out of the progression queue
pub const QUEUE_CHANNEL: u8 = 2;

/// Message payload. Channels are 1-based throughout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MidiMessage {
    NoteOn { pitch: u8, velocity: u8 },
    NoteOff { pitch: u8 },
    ControlChange { controller: u8, value: u8 },
    Clock,
}

/// A MIDI event positioned inside the current processing block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MidiEvent {
    pub channel: u8,
    /// Position within the block, in samples
    pub sample_offset: u32,
    pub message: MidiMessage,
}

impl MidiEvent {
    pub fn new(channel: u8, sample_offset: u32, message: MidiMessage) -> Self {
        Self { channel, sample_offset, message }
    }

    pub fn note_on(channel: u8, pitch: u8, velocity: u8, sample_offset: u32) -> Self {
        Self::new(channel, sample_offset, MidiMessage::NoteOn { pitch, velocity })
    }

    pub fn note_off(channel: u8, pitch: u8, sample_offset: u32) -> Self {
        Self::new(channel, sample_offset, MidiMessage::NoteOff { pitch })
    }

    /// A NoteOn with velocity 0 counts as a note-off, as on the wire.
    pub fn is_note_on(&self) -> bool {
        matches!(self.message, MidiMessage::NoteOn { velocity, .. } if velocity > 0)
    }

    pub fn pitch(&self) -> Option<u8> {
        match self.message {
            MidiMessage::NoteOn { pitch, .. } | MidiMessage::NoteOff { pitch } => Some(pitch),
            _ => None,
        }
    }
}

// ============================================================================
// Note naming
// ============================================================================

/// Name with sharps and octave, middle C (60) = "C4".
pub fn note_name(pitch: u8) -> String {
    let octave = pitch as i32 / 12 - 1;
    format!("{}{}", KEY_NAMES[(pitch % 12) as usize], octave)
}

/// Space-separated note names, e.g. "C4 E4 G4".
pub fn notes_to_string(notes: &[u8]) -> String {
    notes.iter().map(|&n| note_name(n)).collect::<Vec<_>>().join(" ")
}

/// Bracketed chord groups joined by pipes, e.g. "[C4 E4 G4] | [G3 B3 D4]".
pub fn sequence_to_string(chords: &[Vec<u8>]) -> String {
    chords
        .iter()
        .map(|chord| format!("[{}]", notes_to_string(chord)))
        .collect::<Vec<_>>()
        .join(" | ")
}
