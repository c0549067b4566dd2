//! Progression presets and free-form degree parsing

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ChordsmithError, Result};

/// Sequence used whenever a progression resolves to nothing.
pub const DEFAULT_DEGREES: [u8; 4] = [1, 5, 6, 4];

/// Built-in progressions, plus a custom free-form string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProgressionPreset {
    #[default]
    #[serde(rename = "I-V-vi-IV")]
    OneFiveSixFour,
    #[serde(rename = "ii-V-I")]
    TwoFiveOne,
    #[serde(rename = "I-vi-IV-V")]
    OneSixFourFive,
    #[serde(rename = "vi-IV-I-V")]
    SixFourOneFive,
    Custom,
}

impl ProgressionPreset {
    pub const ALL: [ProgressionPreset; 5] = [
        Self::OneFiveSixFour,
        Self::TwoFiveOne,
        Self::OneSixFourFive,
        Self::SixFourOneFive,
        Self::Custom,
    ];

    pub fn from_index(index: usize) -> Self {
        Self::ALL.get(index).copied().unwrap_or_default()
    }

    /// Literal degrees of a fixed preset; `Custom` has none of its own.
    pub fn degrees(self) -> &'static [u8] {
        match self {
            Self::OneFiveSixFour => &[1, 5, 6, 4],
            Self::TwoFiveOne => &[2, 5, 1],
            Self::OneSixFourFive => &[1, 6, 4, 5],
            Self::SixFourOneFive => &[6, 4, 1, 5],
            Self::Custom => &[],
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::OneFiveSixFour => "I-V-vi-IV",
            Self::TwoFiveOne => "ii-V-I",
            Self::OneSixFourFive => "I-vi-IV-V",
            Self::SixFourOneFive => "vi-IV-I-V",
            Self::Custom => "Custom",
        }
    }
}

impl fmt::Display for ProgressionPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ProgressionPreset {
    type Err = ChordsmithError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ChordsmithError::UnknownPreset(s.to_string()))
    }
}

/// Parse "1-5-6-4", "1, 5, 6, 4" or "1 5 6 4" into degrees.
///
/// Tokens that are empty, non-numeric or outside 1..=7 are dropped.
pub fn parse_progression(text: &str) -> Vec<u8> {
    text.trim()
        .split(['-', ',', ' '])
        .filter(|token| !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit()))
        .filter_map(|token| token.parse::<u8>().ok())
        .filter(|degree| (1..=7).contains(degree))
        .collect()
}

/// Resolve a preset (or the custom string) to a non-empty degree sequence.
pub fn resolve(preset: ProgressionPreset, custom: &str) -> Vec<u8> {
    let degrees = match preset {
        ProgressionPreset::Custom => parse_progression(custom),
        fixed => fixed.degrees().to_vec(),
    };
    if degrees.is_empty() {
        return DEFAULT_DEGREES.to_vec();
    }
    degrees
}

/// Roman numeral label, e.g. "I-V-VI-IV", lowercase when `minor` is set.
pub fn degrees_to_roman(degrees: &[u8], minor: bool) -> String {
    const UPPER: [&str; 7] = ["I", "II", "III", "IV", "V", "VI", "VII"];
    const LOWER: [&str; 7] = ["i", "ii", "iii", "iv", "v", "vi", "vii"];
    let table = if minor { &LOWER } else { &UPPER };
    degrees
        .iter()
        .filter(|d| (1..=7).contains(*d))
        .map(|&d| table[d as usize - 1])
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        assert_eq!(resolve(ProgressionPreset::OneFiveSixFour, ""), vec![1, 5, 6, 4]);
        assert_eq!(resolve(ProgressionPreset::TwoFiveOne, "7-7"), vec![2, 5, 1]);
        assert_eq!(resolve(ProgressionPreset::OneSixFourFive, ""), vec![1, 6, 4, 5]);
        assert_eq!(resolve(ProgressionPreset::SixFourOneFive, ""), vec![6, 4, 1, 5]);
    }

    #[test]
    fn test_custom_separators() {
        let expected = vec![1, 5, 6, 4];
        assert_eq!(resolve(ProgressionPreset::Custom, "1-5-6-4"), expected);
        assert_eq!(resolve(ProgressionPreset::Custom, "1, 5, 6, 4"), expected);
        assert_eq!(resolve(ProgressionPreset::Custom, "1 5 6 4"), expected);
        assert_eq!(resolve(ProgressionPreset::Custom, "  2-5-1  "), vec![2, 5, 1]);
    }

    #[test]
    fn test_custom_drops_bad_tokens() {
        assert_eq!(resolve(ProgressionPreset::Custom, "1-9-6"), vec![1, 6]);
        assert_eq!(resolve(ProgressionPreset::Custom, "1-x-0-+3-6"), vec![1, 6]);
        assert_eq!(parse_progression("300-2"), vec![2]);
    }

    #[test]
    fn test_empty_falls_back_to_default() {
        assert_eq!(resolve(ProgressionPreset::Custom, ""), vec![1, 5, 6, 4]);
        assert_eq!(resolve(ProgressionPreset::Custom, "8-9-abc"), vec![1, 5, 6, 4]);
    }

    #[test]
    fn test_roman() {
        assert_eq!(degrees_to_roman(&[1, 5, 6, 4], false), "I-V-VI-IV");
        assert_eq!(degrees_to_roman(&[2, 5, 1], true), "ii-v-i");
    }

    #[test]
    fn test_preset_names() {
        assert_eq!("ii-V-I".parse::<ProgressionPreset>(), Ok(ProgressionPreset::TwoFiveOne));
        assert_eq!(ProgressionPreset::from_index(9), ProgressionPreset::OneFiveSixFour);
        assert!("I-II".parse::<ProgressionPreset>().is_err());
    }
}
