//! Deterministic, non-realtime rendering of a progression

use crate::midi::LIVE_CHANNEL;
use crate::settings::GeneratorSettings;

/// Resolution of exported sequences
pub const TICKS_PER_QUARTER: u16 = 960;

/// Tempo assumed when the host doesn't report one
pub const DEFAULT_EXPORT_BPM: f64 = 120.0;

/// Slowest tempo whose microseconds per quarter fit the 24-bit SMF field
pub const MIN_EXPORT_BPM: f64 = 4.0;
pub const MAX_EXPORT_BPM: f64 = 1000.0;

/// Tempo actually used for export: clamped into range, default when not finite.
pub fn export_bpm(bpm: f64) -> f64 {
    if bpm.is_finite() {
        bpm.clamp(MIN_EXPORT_BPM, MAX_EXPORT_BPM)
    } else {
        DEFAULT_EXPORT_BPM
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportEventKind {
    NoteOn { velocity: u8 },
    NoteOff,
}

/// A note event at an absolute tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExportEvent {
    pub tick: u32,
    pub channel: u8,
    pub pitch: u8,
    pub kind: ExportEventKind,
}

/// Flat, tick-ordered rendering of a progression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSequence {
    pub ticks_per_quarter: u16,
    /// Tempo the tick grid was computed at, in microseconds per quarter note
    pub tempo_us_per_quarter: u32,
    pub events: Vec<ExportEvent>,
}

impl ExportSequence {
    /// Tick where the last event sits.
    pub fn end_tick(&self) -> u32 {
        self.events.last().map(|e| e.tick).unwrap_or(0)
    }
}

/// Length of one chord in ticks at `bpm`.
pub fn chord_length_ticks(note_length_ms: u32, bpm: f64) -> u32 {
    let quarter_ms = 60_000.0 / export_bpm(bpm);
    (note_length_ms as f64 / quarter_ms * TICKS_PER_QUARTER as f64).round() as u32
}

/// Render `settings` at the fixed velocity with no humanization.
///
/// Each chord's note-ons are followed by its note-offs, which share a tick
/// with the next chord's note-ons, so the result is ordered as built.
pub fn export_sequence(settings: &GeneratorSettings, bpm: f64) -> ExportSequence {
    let chord_len = chord_length_ticks(settings.note_length_ms, bpm);
    let mut events = Vec::new();
    let mut tick = 0u32;

    for chord in settings.chords() {
        events.extend(chord.iter().map(|&pitch| ExportEvent {
            tick,
            channel: LIVE_CHANNEL,
            pitch,
            kind: ExportEventKind::NoteOn { velocity: settings.velocity },
        }));
        events.extend(chord.iter().map(|&pitch| ExportEvent {
            tick: tick.saturating_add(chord_len),
            channel: LIVE_CHANNEL,
            pitch,
            kind: ExportEventKind::NoteOff,
        }));
        tick = tick.saturating_add(chord_len);
    }

    ExportSequence {
        ticks_per_quarter: TICKS_PER_QUARTER,
        tempo_us_per_quarter: (60_000_000.0 / export_bpm(bpm)).round() as u32,
        events,
    }
}
