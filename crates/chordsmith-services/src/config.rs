//! TOML configuration: generator settings plus engine parameters

use std::path::{Path, PathBuf};

use chordsmith_core::{DEFAULT_EXPORT_BPM, GeneratorSettings};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Cannot serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub settings: GeneratorSettings,
    #[serde(default)]
    pub engine: EngineConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub sample_rate: f64,
    /// Samples per processing block
    pub block_size: u32,
    /// Tempo assumed for export
    pub export_bpm: f64,
    /// Fixed seed for humanization; random when unset
    pub seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100.0,
            block_size: 512,
            export_bpm: DEFAULT_EXPORT_BPM,
            seed: None,
        }
    }
}

pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("chordsmith")
        .join("config.toml")
}

/// Parse config text; settings come back clamped into range.
pub fn parse_config(text: &str) -> Result<AppConfig, ConfigError> {
    let mut config: AppConfig = toml::from_str(text)?;
    config.settings = config.settings.sanitized();
    if config.engine.sample_rate <= 0.0 {
        warn!("Ignoring sample rate {}", config.engine.sample_rate);
        config.engine.sample_rate = EngineConfig::default().sample_rate;
    }
    config.engine.block_size = config.engine.block_size.max(1);
    Ok(config)
}

/// Load an explicit config file, or the default location if `path` is None.
/// A missing default file gives the defaults; a missing explicit one is an error.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let (path, explicit) = match path {
        Some(p) => (p.to_path_buf(), true),
        None => (config_path(), false),
    };

    match std::fs::read_to_string(&path) {
        Ok(text) => {
            debug!("Loaded config from {}", path.display());
            parse_config(&text)
        }
        Err(e) if !explicit && e.kind() == std::io::ErrorKind::NotFound => {
            debug!("No config at {}, using defaults", path.display());
            Ok(AppConfig::default())
        }
        Err(source) => Err(ConfigError::Io { path, source }),
    }
}

pub fn to_toml(config: &AppConfig) -> Result<String, ConfigError> {
    Ok(toml::to_string_pretty(config)?)
}
