//! Optional TOML configuration for the command-line tool.
//!
//! The file lives at `<config dir>/tanoak/cli.toml` unless `--config` or
//! `TANOAK_CONFIG` points somewhere else. A missing file is not an error;
//! every setting has a flag that overrides it.
//!
//! ```toml
//! [index]
//! default = "/home/me/catalog.tanoak"
//!
//! [cache]
//! blocks = 8
//! ```

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Settings resolved from the config file, if one exists.
#[derive(Debug, Default)]
pub struct CliConfig {
    data: RawConfig,
}

impl CliConfig {
    /// Reads the config file at `explicit`, or at the platform default
    /// location when no path is given. Absent files yield empty settings.
    pub fn load(explicit: Option<PathBuf>) -> Result<Self, ConfigError> {
        let path = explicit.or_else(default_config_path);
        let data = if let Some(config_path) = path.as_ref() {
            if config_path.exists() {
                read_file(config_path)?
            } else {
                RawConfig::default()
            }
        } else {
            RawConfig::default()
        };
        Ok(Self { data })
    }

    /// Index file used when a command omits its path argument.
    pub fn default_index(&self) -> Option<&PathBuf> {
        self.data.index.default_path.as_ref()
    }

    /// Node cache capacity, overridden by `--cache-blocks`.
    pub fn cache_blocks(&self) -> Option<usize> {
        self.data.cache.blocks
    }
}

fn read_file(path: &Path) -> Result<RawConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    index: IndexSection,
    #[serde(default)]
    cache: CacheSection,
}

#[derive(Debug, Default, Deserialize)]
struct IndexSection {
    #[serde(rename = "default")]
    default_path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct CacheSection {
    blocks: Option<usize>,
}

/// Failures while loading the config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("failed to read CLI config {path}: {source}")]
    Read {
        /// Path of the unreadable file.
        path: PathBuf,
        /// Underlying I/O failure.
        source: std::io::Error,
    },
    /// The file is not valid TOML or has the wrong shape.
    #[error("failed to parse CLI config {path}: {source}")]
    Parse {
        /// Path of the rejected file.
        path: PathBuf,
        /// TOML deserialization failure.
        source: toml::de::Error,
    },
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join("tanoak").join("cli.toml"))
}
