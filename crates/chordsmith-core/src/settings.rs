//! Generator settings snapshot

use serde::{Deserialize, Serialize};

use crate::progression::{self, ProgressionPreset};
use crate::theory::{self, ChordQuality, ExtensionToggles, ScaleType};

/// Every musical setting the engine reads. Owned by the parameter store;
/// the engine only ever sees copies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorSettings {
    /// Tonic as semitone above C (0..=11)
    pub key: u8,
    pub scale: ScaleType,
    pub preset: ProgressionPreset,
    /// Degree string read when `preset` is Custom
    pub custom_progression: String,
    pub quality: ChordQuality,
    /// 0..=3
    pub inversion: u8,
    /// 1..=127
    pub velocity: u8,
    /// Chord length, 10..=4000 ms
    pub note_length_ms: u32,
    /// Timing jitter, 0..=25 ms
    pub humanize_ms: u32,
    /// Velocity jitter, 0..=15
    pub humanize_velocity: u8,
    /// Base octave, 3..=6
    pub octave: u8,
    /// Stepping still runs on chord length when set
    pub follow_host: bool,
    pub extensions: ExtensionToggles,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            key: 0,
            scale: ScaleType::Major,
            preset: ProgressionPreset::OneFiveSixFour,
            custom_progression: "1-5-6-4".to_string(),
            quality: ChordQuality::Triad,
            inversion: 0,
            velocity: 96,
            note_length_ms: 600,
            humanize_ms: 0,
            humanize_velocity: 0,
            octave: 4,
            follow_host: true,
            extensions: ExtensionToggles::default(),
        }
    }
}

impl GeneratorSettings {
    /// Copy with every numeric field clamped into its valid range.
    pub fn sanitized(&self) -> Self {
        Self {
            key: self.key.min(11),
            inversion: self.inversion.min(3),
            velocity: self.velocity.clamp(1, 127),
            note_length_ms: self.note_length_ms.clamp(10, 4000),
            humanize_ms: self.humanize_ms.min(25),
            humanize_velocity: self.humanize_velocity.min(15),
            octave: self.octave.clamp(3, 6),
            ..self.clone()
        }
    }

    /// Degree sequence for the current preset, never empty.
    pub fn degrees(&self) -> Vec<u8> {
        progression::resolve(self.preset, &self.custom_progression)
    }

    /// Chord for one scale degree under these settings.
    pub fn chord_for_degree(&self, degree: u8) -> Vec<u8> {
        let root = theory::degree_to_root(degree, self.key, self.scale, self.octave);
        theory::build_chord(root, self.scale, self.quality, self.inversion, &self.extensions)
    }

    /// Every chord of the resolved progression, in order.
    pub fn chords(&self) -> Vec<Vec<u8>> {
        self.degrees().into_iter().map(|d| self.chord_for_degree(d)).collect()
    }

    /// Roman numeral label of the resolved progression.
    pub fn roman_label(&self) -> String {
        progression::degrees_to_roman(&self.degrees(), self.scale.is_minor())
    }
}
