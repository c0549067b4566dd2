//! chordsmith-services: Block processing, MIDI file export and configuration

pub mod config;
pub mod midi_file;
pub mod processor;

pub use config::{AppConfig, ConfigError, EngineConfig, config_path, load_config};
pub use midi_file::{ExportError, export_progression, write_midi_file};
pub use processor::{ChordProcessor, SharedState};
