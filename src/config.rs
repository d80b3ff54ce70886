//! Configuration file
//!
//! Probe thresholds and the CLI log filter, read from TOML. Every field has
//! a default so a missing file, or a file naming only a few keys, still
//! yields a complete configuration.
//!
//! ```toml
//! log_filter = "jessi_core=debug"
//!
//! [probe]
//! min_os_major = 26
//! trollstore_markers = ["_TrollStore", "_TrollStoreLite"]
//! trollstore_paths = []
//!
//! [probe.txm_min_generation]
//! iphone = 14
//! ipad = 14
//! mac = 14
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable naming the configuration file
pub const CONFIG_ENV: &str = "JESSI_CORE_CONFIG";

/// File used when [`CONFIG_ENV`] is unset
pub const DEFAULT_CONFIG_FILE: &str = "jessi-core.toml";

/// Configuration file errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// `env_logger` filter used by the CLI when `RUST_LOG` is unset
    pub log_filter: Option<String>,
    pub probe: ProbeConfig,
}

/// Thresholds and markers the capability probes use
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// OS major version the `ios26_or_later` probe compares against
    pub min_os_major: u32,
    /// Marker files placed next to the app bundle by TrollStore
    pub trollstore_markers: Vec<String>,
    /// Absolute paths whose existence alone means TrollStore is installed
    pub trollstore_paths: Vec<PathBuf>,
    // tables serialize after plain values
    /// First hardware generation per family that runs TXM
    pub txm_min_generation: TxmGenerations,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            min_os_major: 26,
            trollstore_markers: vec!["_TrollStore".into(), "_TrollStoreLite".into()],
            trollstore_paths: Vec::new(),
            txm_min_generation: TxmGenerations::default(),
        }
    }
}

/// Model identifier generation (`iPhone14,2` is generation 14) from which
/// each family ships a TXM-capable chip (A15, M2)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TxmGenerations {
    pub iphone: u32,
    pub ipad: u32,
    pub mac: u32,
}

impl Default for TxmGenerations {
    fn default() -> Self {
        Self {
            iphone: 14,
            ipad: 14,
            mac: 14,
        }
    }
}

impl Config {
    /// Path from [`CONFIG_ENV`], else [`DEFAULT_CONFIG_FILE`]
    pub fn default_path() -> PathBuf {
        std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
    }

    /// Read `path`; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("{} not found, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        Self::from_toml(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Write `self` to `path`, creating parent directories
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let text = self.to_toml()?;
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        fs::write(path, text).map_err(io_err)?;
        debug!("wrote {}", path.display());
        Ok(())
    }
}
