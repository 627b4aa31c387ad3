use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tickstream::StreamOptions;
use tickstream_types::constants::{DEFAULT_BINDING_ADDRESS, DEFAULT_KEEP_ALIVE_SECS, DEFAULT_PORT};

/// Tickstream configuration file
///
/// ```toml
/// dataset = "data/countries.json"
///
/// [server]
/// host = "0.0.0.0"
/// port = 8080
///
/// [stream]
/// interval_ms = 4000
/// tag = "country"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// JSON dataset to serve; the bundled countries when absent.
    /// Relative paths are resolved against the config file's directory.
    pub dataset: Option<PathBuf>,

    pub server: ServerConfig,

    pub stream: StreamOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub keep_alive_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_BINDING_ADDRESS.to_string(),
            port: DEFAULT_PORT,
            keep_alive_secs: DEFAULT_KEEP_ALIVE_SECS,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoadConfigError {
    #[error("Config file not found at {}", .0.display())]
    FileNotFound(PathBuf),
    #[error("Failed to read {}: {}", .0.display(), .1)]
    ReadError(PathBuf, std::io::Error),
    #[error("Failed to parse {}: {}", .0.display(), .1)]
    ParseError(PathBuf, toml::de::Error),
}

impl Config {
    /// Load config from the specified file path
    pub fn load(config_file_path: &Path) -> Result<Self, LoadConfigError> {
        if !config_file_path.exists() {
            return Err(LoadConfigError::FileNotFound(
                config_file_path.to_path_buf(),
            ));
        }

        let content = fs::read_to_string(config_file_path)
            .map_err(|e| LoadConfigError::ReadError(config_file_path.to_path_buf(), e))?;

        let mut config: Config = toml::from_str(&content)
            .map_err(|e| LoadConfigError::ParseError(config_file_path.to_path_buf(), e))?;

        if let (Some(dataset), Some(dir)) = (&config.dataset, config_file_path.parent()) {
            if dataset.is_relative() {
                config.dataset = Some(dir.join(dataset));
            }
        }

        Ok(config)
    }
}
