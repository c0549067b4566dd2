//! Diatonic harmony: scale tables, degree mapping and chord stacking

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{ChordsmithError, Result};

/// Lowest pitch a voiced chord should reach after range clamping.
pub const RANGE_LOW: i32 = 48;
/// Highest pitch a voiced chord should reach after range clamping.
pub const RANGE_HIGH: i32 = 84;
/// Octave shifts attempted before a chord is accepted as-is.
const MAX_CLAMP_PASSES: usize = 8;

/// Key names indexed by semitone above C.
pub const KEY_NAMES: [&str; 12] = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];

/// Parse a key name ("C", "F#", "Bb") into a semitone 0..=11.
pub fn parse_key(name: &str) -> Result<u8> {
    let trimmed = name.trim();
    if let Some(idx) = KEY_NAMES.iter().position(|k| k.eq_ignore_ascii_case(trimmed)) {
        return Ok(idx as u8);
    }
    let flats = ["C", "Db", "D", "Eb", "E", "F", "Gb", "G", "Ab", "A", "Bb", "B"];
    flats
        .iter()
        .position(|k| k.eq_ignore_ascii_case(trimmed))
        .map(|idx| idx as u8)
        .ok_or_else(|| ChordsmithError::UnknownKey(trimmed.to_string()))
}

// ============================================================================
// Scale Table
// ============================================================================

/// Scale types available to the generator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ScaleType {
    #[default]
    Major,
    NaturalMinor,
    HarmonicMinor,
    Dorian,
    Mixolydian,
}

impl ScaleType {
    pub const ALL: [ScaleType; 5] = [
        Self::Major,
        Self::NaturalMinor,
        Self::HarmonicMinor,
        Self::Dorian,
        Self::Mixolydian,
    ];

    /// Semitone offsets from the tonic for degrees 1..=7
    pub fn intervals(self) -> [u8; 7] {
        match self {
            Self::Major => [0, 2, 4, 5, 7, 9, 11],
            Self::NaturalMinor => [0, 2, 3, 5, 7, 8, 10],
            Self::HarmonicMinor => [0, 2, 3, 5, 7, 8, 11],
            Self::Dorian => [0, 2, 3, 5, 7, 9, 10],
            Self::Mixolydian => [0, 2, 4, 5, 7, 9, 10],
        }
    }

    /// Scale from its stable index; anything unknown is Major.
    pub fn from_index(index: usize) -> Self {
        Self::ALL.get(index).copied().unwrap_or_default()
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Major => "Major",
            Self::NaturalMinor => "NaturalMinor",
            Self::HarmonicMinor => "HarmonicMinor",
            Self::Dorian => "Dorian",
            Self::Mixolydian => "Mixolydian",
        }
    }

    /// Whether the tonic triad has a minor third.
    pub fn is_minor(self) -> bool {
        self.intervals()[2] == 3
    }

    /// Semitone for a stacked degree, which may run past 7 (9th, 11th, 13th).
    /// Every wrap past the seventh adds an octave.
    pub fn degree_semitone(self, degree: u8) -> i32 {
        let steps = degree.max(1) as usize - 1;
        self.intervals()[steps % 7] as i32 + 12 * (steps / 7) as i32
    }
}

impl fmt::Display for ScaleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ScaleType {
    type Err = ChordsmithError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|scale| scale.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ChordsmithError::UnknownScale(s.to_string()))
    }
}

// ============================================================================
// Chord Types
// ============================================================================

/// How far up the stack of thirds a chord reaches
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum ChordQuality {
    #[default]
    Triad,
    Seventh,
    Ninth,
    Eleventh,
    Thirteenth,
}

impl ChordQuality {
    pub const ALL: [ChordQuality; 5] = [
        Self::Triad,
        Self::Seventh,
        Self::Ninth,
        Self::Eleventh,
        Self::Thirteenth,
    ];

    pub fn from_index(index: usize) -> Self {
        Self::ALL.get(index).copied().unwrap_or_default()
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Triad => "Triad",
            Self::Seventh => "Seventh",
            Self::Ninth => "Ninth",
            Self::Eleventh => "Eleventh",
            Self::Thirteenth => "Thirteenth",
        }
    }
}

impl fmt::Display for ChordQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ChordQuality {
    type Err = ChordsmithError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|q| q.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ChordsmithError::UnknownQuality(s.to_string()))
    }
}

/// Extra extensions layered on top of the quality level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtensionToggles {
    pub add7: bool,
    pub add9: bool,
    pub add11: bool,
    pub add13: bool,
}

impl ExtensionToggles {
    /// Stacked degrees for a quality, unioned with the toggles.
    /// Each extension is checked on its own, so add13 on a triad still
    /// only adds the 13th.
    pub fn stack(&self, quality: ChordQuality) -> Vec<u8> {
        let mut degrees = vec![1, 3, 5];
        if quality >= ChordQuality::Seventh || self.add7 {
            degrees.push(7);
        }
        if quality >= ChordQuality::Ninth || self.add9 {
            degrees.push(9);
        }
        if quality >= ChordQuality::Eleventh || self.add11 {
            degrees.push(11);
        }
        if quality >= ChordQuality::Thirteenth || self.add13 {
            degrees.push(13);
        }
        degrees
    }
}

// ============================================================================
// Chord Builder
// ============================================================================

/// Root pitch of a scale degree. Degree is clamped into 1..=7.
pub fn degree_to_root(degree: u8, key_semitone: u8, scale: ScaleType, octave_base: u8) -> i32 {
    let degree = degree.clamp(1, 7);
    octave_base as i32 * 12 + key_semitone as i32 + scale.intervals()[degree as usize - 1] as i32
}

/// Build an ascending diatonic chord on `root`.
///
/// Stacked degrees resolve against the scale's own interval table and are
/// added to `root`. Applies `inversion` by repeatedly raising
/// whichever pitch is currently lowest, then shifts the whole chord by
/// octaves toward the 48..=84 window.
pub fn build_chord(
    root: i32,
    scale: ScaleType,
    quality: ChordQuality,
    inversion: u8,
    toggles: &ExtensionToggles,
) -> Vec<u8> {
    let (notes, fits) = voice_chord(root, scale, quality, inversion, toggles);
    if !fits {
        trace!(root, ?quality, inversion, "Chord left outside the playable window");
    }
    notes.into_iter().map(|n| n.clamp(0, 127) as u8).collect()
}

/// Sorted, unclipped pitches plus whether they landed inside the window.
fn voice_chord(
    root: i32,
    scale: ScaleType,
    quality: ChordQuality,
    inversion: u8,
    toggles: &ExtensionToggles,
) -> (Vec<i32>, bool) {
    let degrees = toggles.stack(quality);
    let mut notes: Vec<i32> = degrees
        .iter()
        .map(|&d| root + scale.degree_semitone(d))
        .collect();

    // Raises the current lowest, not the next original voice
    let inversions = (inversion as usize).min(notes.len() - 1);
    for _ in 0..inversions {
        notes.sort_unstable();
        notes[0] += 12;
    }

    let fits = clamp_into_range(&mut notes);
    notes.sort_unstable();
    (notes, fits)
}

/// Shift whole octaves toward the playable window. Returns false when the
/// chord still sits outside after the last pass.
fn clamp_into_range(notes: &mut [i32]) -> bool {
    for _ in 0..MAX_CLAMP_PASSES {
        let (Some(&lo), Some(&hi)) = (notes.iter().min(), notes.iter().max()) else {
            return true;
        };
        if lo < RANGE_LOW {
            notes.iter_mut().for_each(|n| *n += 12);
        } else if hi > RANGE_HIGH {
            notes.iter_mut().for_each(|n| *n -= 12);
        } else {
            return true;
        }
    }
    let lo = notes.iter().min().copied().unwrap_or(RANGE_LOW);
    let hi = notes.iter().max().copied().unwrap_or(RANGE_HIGH);
    lo >= RANGE_LOW && hi <= RANGE_HIGH
}
