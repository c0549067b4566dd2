//! Error types for chordsmith

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChordsmithError {
    #[error("Unknown key: {0}")]
    UnknownKey(String),
    #[error("Unknown scale: {0}")]
    UnknownScale(String),
    #[error("Unknown chord quality: {0}")]
    UnknownQuality(String),
    #[error("Unknown progression preset: {0}")]
    UnknownPreset(String),
}

pub type Result<T> = std::result::Result<T, ChordsmithError>;
