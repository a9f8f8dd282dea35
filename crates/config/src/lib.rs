//! Configuration for cadence.
//!
//! Sources are layered, later ones overriding earlier ones:
//! 1. built-in defaults ([`Config::default`]),
//! 2. a configuration file (TOML, YAML or JSON, picked by extension),
//! 3. environment variables prefixed with `CADENCE_`, using `__` to reach
//!    nested keys (`CADENCE_SCAN__CONCURRENCY=4`).
//!
//! Library roots and MIME types in the configuration only *seed* the
//! preference store the first time it is used; afterwards the preference
//! store is authoritative.

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::{OptionExt, ResultExt};
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "CADENCE_";
const CONFIG_FILE_NAME: &str = "config.toml";
const DATABASE_FILE_NAME: &str = "inventory.sqlite3";
const DEFAULT_CONCURRENCY: usize = 16;

/// Audio MIME types indexed when nothing else has been configured.
pub const DEFAULT_MIME_TYPES: &[&str] = &[
    "audio/mpeg",
    "audio/flac",
    "audio/x-flac",
    "audio/ogg",
    "audio/wav",
    "audio/x-wav",
    "audio/mp4",
    "audio/m4a",
    "audio/aac",
    "audio/opus",
    "audio/x-aiff",
    "audio/x-ms-wma",
];

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub inventory: InventoryConfig,
    pub library: LibraryConfig,
    pub scan: ScanConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryConfig {
    /// SQLite database file. Defaults to the platform data directory.
    pub database: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Seed for the library roots preference.
    pub roots: Vec<PathBuf>,
    /// Seed for the MIME allow-list preference.
    pub mime_types: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Number of files fingerprinted at the same time.
    pub concurrency: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `tracing_subscriber::EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: Option<String>,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            mime_types: DEFAULT_MIME_TYPES.iter().map(|m| m.to_string()).collect(),
        }
    }
}
impl Default for ScanConfig {
    fn default() -> Self {
        Self { concurrency: DEFAULT_CONCURRENCY }
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "cadence")
}

/// Location of the configuration file used when none is given explicitly.
pub fn default_config_file() -> Result<PathBuf> {
    let dirs = project_dirs().ok_or_raise(|| ErrorKind::NoConfigDirectory)?;
    Ok(dirs.config_dir().join(CONFIG_FILE_NAME))
}

impl Config {
    /// Load configuration from the default file (if it exists) and the environment.
    pub fn load() -> Result<Self> {
        let file = default_config_file()?;
        let file = file.is_file().then_some(file);
        Self::figment(file.as_deref())?.extract().or_raise(|| ErrorKind::Load)
    }

    /// Load configuration from an explicit file (which must exist) and the environment.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            exn::bail!(ErrorKind::FileNotFound(path.to_path_buf()));
        }
        Self::figment(Some(path))?.extract().or_raise(|| ErrorKind::Load)
    }

    fn figment(file: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(file) = file {
            tracing::debug!(path = %file.display(), "loading configuration file");
            let extension = file.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase);
            figment = match extension.as_deref() {
                Some("toml") => figment.merge(Toml::file(file)),
                Some("yaml" | "yml") => figment.merge(Yaml::file(file)),
                Some("json") => figment.merge(Json::file(file)),
                _ => exn::bail!(ErrorKind::UnsupportedFormat(file.to_path_buf())),
            };
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Database file to open: configured, or `inventory.sqlite3` in the
    /// platform data directory.
    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.inventory.database {
            Some(path) => Ok(path.clone()),
            None => {
                let dirs = project_dirs().ok_or_raise(|| ErrorKind::NoConfigDirectory)?;
                Ok(dirs.data_dir().join(DATABASE_FILE_NAME))
            },
        }
    }

    /// Fingerprint worker count, never less than one.
    pub fn concurrency(&self) -> usize {
        self.scan.concurrency.max(1)
    }
}
