//! chordsmith-core: Diatonic chord progressions and sample-accurate note scheduling

mod error;
pub mod export;
pub mod humanize;
pub mod midi;
pub mod progression;
pub mod scheduler;
mod settings;
pub mod theory;
pub mod trigger;

pub use error::{ChordsmithError, Result};
pub use export::{
    DEFAULT_EXPORT_BPM, ExportEvent, ExportEventKind, ExportSequence, MAX_EXPORT_BPM,
    MIN_EXPORT_BPM, TICKS_PER_QUARTER, export_bpm, export_sequence,
};
pub use humanize::{Humanizer, humanize_velocity, ms_to_samples};
pub use midi::{
    LIVE_CHANNEL, MidiEvent, MidiMessage, QUEUE_CHANNEL, note_name, notes_to_string,
    sequence_to_string,
};
pub use progression::{DEFAULT_DEGREES, ProgressionPreset, degrees_to_roman, parse_progression, resolve};
pub use scheduler::{EventQueue, PlaybackState, ProgressionEngine, TimedEvent};
pub use settings::GeneratorSettings;
pub use theory::{ChordQuality, ExtensionToggles, ScaleType, build_chord, degree_to_root, parse_key};
pub use trigger::{ChordTrigger, TriggerOutput, TriggerState};

/// Re-exported so callers can seed the jitter source without a direct dependency.
pub use fastrand::Rng;
