//! Application configuration management.
//!
//! Settings are layered with figment, later layers winning:
//!
//! 1. Built-in defaults
//! 2. A TOML file (`--config PATH`, else `config.toml` in the platform config
//!    directory)
//! 3. `MORLOCK_*` environment variables

use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::codec::Codec;
use crate::lock::{Argon2Hasher, LockError};
use crate::session::SessionSettings;

/// Prefix of environment variables that override file settings.
pub const ENV_PREFIX: &str = "MORLOCK_";

/// Keys accepted in the configuration file.
pub const KNOWN_KEYS: [&str; 8] = [
    "extensions",
    "sync_marker",
    "list_indent",
    "prompt",
    "confirm_discard",
    "kdf_memory_kib",
    "kdf_iterations",
    "kdf_parallelism",
];

/// Error type for configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Layers could not be merged or extracted.
    #[error("invalid configuration: {0}")]
    Extract(#[from] Box<figment::Error>),

    /// A value is out of range.
    #[error("invalid value for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },

    /// The platform config directory is unknown.
    #[error("failed to determine project directories")]
    NoConfigDir,
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Accepted media file extensions, without the dot.
    pub extensions: Vec<String>,
    /// Byte sequence that starts the media payload.
    pub sync_marker: String,
    /// Indentation width for `list`.
    pub list_indent: usize,
    /// Prompt label shown before each command.
    pub prompt: String,
    /// Ask before discarding unsaved changes.
    pub confirm_discard: bool,
    /// Argon2 memory cost in KiB.
    pub kdf_memory_kib: u32,
    /// Argon2 iteration count.
    pub kdf_iterations: u32,
    /// Argon2 lanes.
    pub kdf_parallelism: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            extensions: vec!["mp3".to_string()],
            sync_marker: "ID3".to_string(),
            list_indent: 4,
            prompt: "morlock".to_string(),
            confirm_discard: true,
            kdf_memory_kib: argon2::Params::DEFAULT_M_COST,
            kdf_iterations: argon2::Params::DEFAULT_T_COST,
            kdf_parallelism: argon2::Params::DEFAULT_P_COST,
        }
    }
}

impl Config {
    /// Load the configuration, falling back to defaults on any error.
    pub fn load(path: Option<&Path>) -> Self {
        match Self::try_load(path) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Failed to load config, using defaults: {}", e);
                Self::default()
            }
        }
    }

    /// Load and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a layer cannot be parsed or a value is invalid.
    pub fn try_load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => Some(path.to_path_buf()),
            None => Self::config_path().ok(),
        };

        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(file) = file.as_deref().filter(|f| f.exists()) {
            log::debug!("Reading config from {}", file.display());
            warn_unknown_keys(file);
            figment = figment.merge(Toml::file(file));
        }
        Self::extract(figment.merge(Env::prefixed(ENV_PREFIX)))
    }

    /// Extract and validate a configuration from prepared layers.
    ///
    /// # Errors
    ///
    /// Returns an error if extraction or validation fails.
    pub fn extract(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sync_marker.is_empty() {
            return Err(ConfigError::Invalid {
                key: "sync_marker",
                reason: "must not be empty".to_string(),
            });
        }
        if self.extensions.is_empty() || self.extensions.iter().any(String::is_empty) {
            return Err(ConfigError::Invalid {
                key: "extensions",
                reason: "must list at least one non-empty extension".to_string(),
            });
        }
        if self.kdf_iterations == 0 {
            return Err(ConfigError::Invalid {
                key: "kdf_iterations",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.kdf_parallelism == 0 {
            return Err(ConfigError::Invalid {
                key: "kdf_parallelism",
                reason: "must be at least 1".to_string(),
            });
        }
        self.hasher().map_err(|e| ConfigError::Invalid {
            key: "kdf_memory_kib",
            reason: e.to_string(),
        })?;
        Ok(())
    }

    /// Session settings derived from this configuration.
    #[must_use]
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            extensions: self
                .extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .collect(),
            confirm_discard: self.confirm_discard,
            list_indent: self.list_indent,
        }
    }

    /// Header codec using the configured sync marker.
    #[must_use]
    pub fn codec(&self) -> Codec {
        Codec::with_marker(self.sync_marker.as_bytes())
    }

    /// Password hasher with the configured cost.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Hash`] if the parameters are rejected.
    pub fn hasher(&self) -> Result<Argon2Hasher, LockError> {
        Argon2Hasher::with_params(
            self.kdf_memory_kib,
            self.kdf_iterations,
            self.kdf_parallelism,
        )
    }

    /// Default platform-specific configuration path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoConfigDir`] if there is no home directory.
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        let project_dirs =
            ProjectDirs::from("com", "morlock", "morlock").ok_or(ConfigError::NoConfigDir)?;
        Ok(project_dirs.config_dir().join("config.toml"))
    }
}

/// Keys of `table` that are not configuration keys, each with the closest
/// known key if one is similar enough.
#[must_use]
pub fn unknown_keys(table: &toml::Table) -> Vec<(String, Option<&'static str>)> {
    table
        .keys()
        .filter(|key| !KNOWN_KEYS.contains(&key.as_str()))
        .map(|key| (key.clone(), suggest_key(key)))
        .collect()
}

fn suggest_key(key: &str) -> Option<&'static str> {
    KNOWN_KEYS
        .iter()
        .map(|known| (*known, strsim::jaro_winkler(key, known)))
        .filter(|(_, score)| *score > 0.8)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(known, _)| known)
}

fn warn_unknown_keys(path: &Path) {
    let Ok(content) = fs::read_to_string(path) else {
        return;
    };
    let Ok(table) = content.parse::<toml::Table>() else {
        return;
    };
    for (key, suggestion) in unknown_keys(&table) {
        match suggestion {
            Some(known) => log::warn!(
                "Unknown config key `{}` in {}; did you mean `{}`?",
                key,
                path.display(),
                known
            ),
            None => log::warn!("Unknown config key `{}` in {}", key, path.display()),
        }
    }
}
