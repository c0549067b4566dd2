//! Block processor tying the progression queue and live trigger together

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chordsmith_core::{
    ChordTrigger, GeneratorSettings, MidiEvent, PlaybackState, ProgressionEngine,
    notes_to_string, sequence_to_string,
};
use fastrand::Rng;
use tracing::{debug, info, warn};

use crate::midi_file::{self, ExportError};

/// State shared between the control side and the processing thread
pub struct SharedState {
    /// One-shot: build the progression and start playing it
    pub generate_now: AtomicBool,
    /// One-shot: write the progression to a file
    pub export_midi: AtomicBool,
    settings: Mutex<GeneratorSettings>,
    /// e.g. "C4 E4 G4"
    last_chord_notes: Mutex<String>,
    /// e.g. "[C4 E4 G4] | [G3 B3 D4]"
    sequence_notes: Mutex<String>,
}

impl SharedState {
    pub fn new(settings: GeneratorSettings) -> Self {
        Self {
            generate_now: AtomicBool::new(false),
            export_midi: AtomicBool::new(false),
            settings: Mutex::new(settings.sanitized()),
            last_chord_notes: Mutex::new(String::new()),
            sequence_notes: Mutex::new(String::new()),
        }
    }

    pub fn request_generate(&self) {
        self.generate_now.store(true, Ordering::SeqCst);
    }

    pub fn request_export(&self) {
        self.export_midi.store(true, Ordering::SeqCst);
    }

    /// Consume the generate flag.
    pub fn take_generate(&self) -> bool {
        self.generate_now.swap(false, Ordering::SeqCst)
    }

    /// Consume the export flag.
    pub fn take_export(&self) -> bool {
        self.export_midi.swap(false, Ordering::SeqCst)
    }

    /// Copy of the current settings, clamped into range.
    pub fn settings(&self) -> GeneratorSettings {
        match self.settings.lock() {
            Ok(s) => s.sanitized(),
            Err(poisoned) => {
                warn!("Settings lock poisoned, using last written value");
                poisoned.into_inner().sanitized()
            }
        }
    }

    pub fn set_settings(&self, settings: GeneratorSettings) {
        let mut guard = match self.settings.lock() {
            Ok(s) => s,
            Err(poisoned) => {
                warn!("Settings lock poisoned, overwriting");
                poisoned.into_inner()
            }
        };
        *guard = settings.sanitized();
    }

    pub fn last_chord_notes(&self) -> String {
        self.last_chord_notes.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn sequence_notes(&self) -> String {
        self.sequence_notes.lock().map(|s| s.clone()).unwrap_or_default()
    }

    fn publish_last_chord(&self, notes: &[u8]) {
        if let Ok(mut s) = self.last_chord_notes.lock() {
            *s = notes_to_string(notes);
        }
    }

    fn publish_sequence(&self, chords: &[Vec<u8>]) {
        if let Ok(mut s) = self.sequence_notes.lock() {
            *s = sequence_to_string(chords);
        }
    }

    /// Run a pending export against the current settings. Returns None when
    /// no export was requested.
    pub fn export_if_requested(&self, path: &Path, bpm: f64) -> Option<Result<(), ExportError>> {
        if !self.take_export() {
            return None;
        }
        Some(midi_file::export_progression(&self.settings(), bpm, path))
    }
}

/// Processes one block at a time: queued progression playback plus live
/// chord triggering from incoming note-ons.
pub struct ChordProcessor {
    shared: Arc<SharedState>,
    engine: ProgressionEngine,
    trigger: ChordTrigger,
    rng: Rng,
}

impl ChordProcessor {
    pub fn new(sample_rate: f64, settings: GeneratorSettings, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => Rng::with_seed(seed),
            None => Rng::new(),
        };
        Self {
            shared: Arc::new(SharedState::new(settings)),
            engine: ProgressionEngine::new(sample_rate),
            trigger: ChordTrigger::new(sample_rate),
            rng,
        }
    }

    /// Get shared state for control-side access
    pub fn shared(&self) -> Arc<SharedState> {
        self.shared.clone()
    }

    pub fn engine(&self) -> &ProgressionEngine {
        &self.engine
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.engine.state()
    }

    /// Live chord notes generated but not yet delivered (mostly note-offs).
    pub fn pending_live_events(&self) -> usize {
        self.trigger.state().pending.len()
    }

    /// New sample rate; stops playback and resets the trigger.
    pub fn prepare(&mut self, sample_rate: f64) {
        self.engine.prepare(sample_rate);
        self.trigger.prepare(sample_rate);
    }

    /// Build the queue from the current settings and start it.
    pub fn generate_now(&mut self) {
        let settings = self.shared.settings();
        let chords = self.engine.build(&settings, &mut self.rng);
        self.shared.publish_sequence(&chords);
        self.engine.start_playback();
        info!(
            "Generated {} ({} chords, {} events)",
            settings.roman_label(),
            chords.len(),
            self.engine.queue().len()
        );
    }

    pub fn stop(&mut self) {
        self.engine.stop_playback();
    }

    /// Process one block. Returns the outgoing events ordered by position:
    /// queued progression notes, live chords, and pass-through events.
    pub fn process_block(&mut self, incoming: &[MidiEvent], num_samples: u32) -> Vec<MidiEvent> {
        if self.shared.take_generate() {
            self.generate_now();
        }

        let settings = self.shared.settings();
        let mut out = Vec::with_capacity(incoming.len());
        self.engine.dispatch(num_samples, &mut out);

        let live = self.trigger.process(&settings, incoming, num_samples, &mut self.rng);
        if let Some(chord) = &live.last_chord {
            self.shared.publish_last_chord(chord);
        }
        out.extend(live.events);
        out.sort_by_key(|e| e.sample_offset);

        if !out.is_empty() {
            debug!(events = out.len(), num_samples, "Block processed");
        }
        out
    }
}
