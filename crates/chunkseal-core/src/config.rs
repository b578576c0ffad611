use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{SealError, SealResult};
use crate::types::{StreamFormat, ENC_SUFFIX};

/// Top-level CLI configuration (loaded from config.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunksealConfig {
    pub log: LogConfig,
    pub stream: StreamConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (default: warn)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Layout for newly encrypted files (default: legacy)
    pub format: StreamFormat,
    /// Chunks processed between scheduler yields (minimum 1)
    pub yield_every: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Replace an existing destination file
    pub overwrite: bool,
    /// Suffix appended on encrypt and stripped on decrypt
    pub suffix: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".into(),
            format: "text".into(),
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            format: StreamFormat::Legacy,
            yield_every: 1,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            overwrite: false,
            suffix: ENC_SUFFIX.into(),
        }
    }
}

impl ChunksealConfig {
    /// Parse a config file; a missing file yields the defaults.
    pub fn load(path: &Path) -> SealResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| SealError::Config(format!("parsing {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> SealResult<()> {
        if self.stream.yield_every == 0 {
            return Err(SealError::Config("stream.yield_every must be at least 1".into()));
        }
        if self.output.suffix.is_empty() {
            return Err(SealError::Config("output.suffix must not be empty".into()));
        }
        Ok(())
    }
}

/// Default config location: `$XDG_CONFIG_HOME/chunkseal/config.toml`,
/// falling back to `~/.config/chunkseal/config.toml`.
pub fn default_config_path() -> PathBuf {
    let base = std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))
        .unwrap_or_else(|| PathBuf::from("."));
    base.join("chunkseal").join("config.toml")
}
