//! Standard MIDI File output for exported progressions

use std::path::Path;

use chordsmith_core::{ExportEventKind, ExportSequence, GeneratorSettings};
use midly::{
    Format, Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind,
    num::{u4, u7, u15, u24, u28},
};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("MIDI encoding failed: {0}")]
    Encode(String),
}

const U24_MAX: u32 = (1 << 24) - 1;
const U28_MAX: u32 = (1 << 28) - 1;

/// Single-track SMF holding the sequence at its own resolution. Tempo and
/// deltas that don't fit their SMF fields are rejected rather than masked.
pub fn sequence_to_smf(sequence: &ExportSequence) -> Result<Smf<'static>, ExportError> {
    if sequence.tempo_us_per_quarter == 0 || sequence.tempo_us_per_quarter > U24_MAX {
        return Err(ExportError::Encode(format!(
            "tempo of {} us per quarter does not fit a tempo event",
            sequence.tempo_us_per_quarter
        )));
    }

    let mut smf = Smf::new(Header::new(
        Format::SingleTrack,
        Timing::Metrical(u15::new(sequence.ticks_per_quarter)),
    ));

    let mut track: Track<'static> = Vec::with_capacity(sequence.events.len() + 3);
    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::TrackName(b"Chordsmith")),
    });
    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::new(sequence.tempo_us_per_quarter))),
    });

    let mut last_tick = 0u32;
    for event in &sequence.events {
        let delta = event.tick.saturating_sub(last_tick);
        if delta > U28_MAX {
            return Err(ExportError::Encode(format!("delta of {delta} ticks is too long")));
        }
        let channel = u4::new(event.channel.clamp(1, 16) - 1);
        let key = u7::new(event.pitch.min(127));
        let message = match event.kind {
            ExportEventKind::NoteOn { velocity } => MidiMessage::NoteOn { key, vel: u7::new(velocity.min(127)) },
            ExportEventKind::NoteOff => MidiMessage::NoteOff { key, vel: u7::new(0) },
        };
        track.push(TrackEvent {
            delta: u28::new(delta),
            kind: TrackEventKind::Midi { channel, message },
        });
        last_tick = event.tick;
    }

    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });
    smf.tracks.push(track);
    Ok(smf)
}

/// Encode to SMF bytes.
pub fn encode_sequence(sequence: &ExportSequence) -> Result<Vec<u8>, ExportError> {
    let mut buf = Vec::new();
    sequence_to_smf(sequence)?
        .write(&mut buf)
        .map_err(|e| ExportError::Encode(e.to_string()))?;
    Ok(buf)
}

/// Encode fully in memory, then write `path` in one go.
pub fn write_midi_file(sequence: &ExportSequence, path: &Path) -> Result<(), ExportError> {
    let bytes = encode_sequence(sequence)?;
    std::fs::write(path, &bytes)?;
    info!("Exported {} events to {}", sequence.events.len(), path.display());
    Ok(())
}

/// Render `settings` at `bpm` and write it to `path`.
pub fn export_progression(settings: &GeneratorSettings, bpm: f64, path: &Path) -> Result<(), ExportError> {
    let sequence = chordsmith_core::export_sequence(settings, bpm);
    write_midi_file(&sequence, path)
}
