//! Configuration
//!
//! Settings come from an optional TOML file and the environment, with the
//! environment taking precedence:
//!
//! | Setting               | Environment                      | File key               |
//! |-----------------------|----------------------------------|------------------------|
//! | provider API key      | `GEMINI_API_KEY`, then `API_KEY` | `api_key`              |
//! | provider base URL     | `COMEX_GEMINI_BASE_URL`          | `base_url`             |
//! | initial mode          | `COMEX_MODE`                     | `initial_mode`         |
//! | temperature           |                                  | `temperature`          |
//! | HTTP connect timeout  |                                  | `connect_timeout_ms`   |
//! | message size limit    |                                  | `[limits]`             |
//!
//! The file is read from `COMEX_CONFIG` if set, otherwise from
//! `<config dir>/comex/config.toml`. A missing file at the default location
//! is not an error. The API key is required.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::modes::{ModeId, UnknownModeError};
use crate::security::ConductorLimits;

/// Default Gemini REST endpoint
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default sampling temperature
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Default timeout for establishing the HTTP connection
///
/// Only the connection is bounded. A reply stream may run as long as the
/// provider keeps sending.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration errors; all of them are fatal at startup
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No API key in the environment or the config file
    #[error("no API key configured (set GEMINI_API_KEY or API_KEY)")]
    MissingApiKey,

    /// The API key is blank
    #[error("API key is empty")]
    InvalidApiKey,

    /// `initial_mode` does not name a mode
    #[error(transparent)]
    UnknownMode(#[from] UnknownModeError),

    /// The config file could not be read
    #[error("failed to read config file {}: {source}", path.display())]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// The config file is not valid TOML for this schema
    #[error("failed to parse config file {}: {source}", path.display())]
    Parse {
        /// File path
        path: PathBuf,
        /// Underlying error
        source: toml::de::Error,
    },
}

/// Provider API key; never printed by `Debug`
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Wrap a key, rejecting blank values
    pub fn new(key: impl Into<String>) -> Result<Self, ConfigError> {
        let key = key.into().trim().to_string();
        if key.is_empty() {
            return Err(ConfigError::InvalidApiKey);
        }
        Ok(Self(key))
    }

    /// The raw key, for request headers
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

/// Provider connection settings
#[derive(Clone, Debug)]
pub struct BackendConfig {
    /// API key
    pub api_key: ApiKey,
    /// REST base URL, without trailing slash
    pub base_url: String,
    /// Timeout for establishing the connection
    pub connect_timeout: Duration,
}

impl BackendConfig {
    /// Settings for the public endpoint with default timeout
    pub fn new(api_key: ApiKey) -> Self {
        Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Use a different base URL
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

/// Conductor behavior settings
#[derive(Clone, Debug, PartialEq)]
pub struct ConductorConfig {
    /// Mode selected at startup
    pub initial_mode: ModeId,
    /// Sampling temperature for every session
    pub temperature: f32,
    /// Input limits
    pub limits: ConductorLimits,
}

impl Default for ConductorConfig {
    fn default() -> Self {
        Self {
            initial_mode: ModeId::General,
            temperature: DEFAULT_TEMPERATURE,
            limits: ConductorLimits::default(),
        }
    }
}

/// Full application configuration
#[derive(Clone, Debug)]
pub struct Config {
    /// Conductor settings
    pub conductor: ConductorConfig,
    /// Provider settings
    pub backend: BackendConfig,
}

/// On-disk format
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    api_key: Option<String>,
    base_url: Option<String>,
    initial_mode: Option<String>,
    temperature: Option<f32>,
    connect_timeout_ms: Option<u64>,
    limits: Option<ConductorLimits>,
}

impl Config {
    /// Load from the process environment and the config file it points to
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Load using `env` to look up environment variables
    pub fn load_with(env: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let file = match env("COMEX_CONFIG") {
            Some(path) => read_file(Path::new(&path))?,
            None => match default_config_path() {
                Some(path) if path.exists() => read_file(&path)?,
                _ => ConfigFile::default(),
            },
        };
        resolve(file, env)
    }
}

/// `<config dir>/comex/config.toml`, if the platform has a config dir
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("comex").join("config.toml"))
}

fn read_file(path: &Path) -> Result<ConfigFile, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let file = toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!(path = %path.display(), "Loaded config file");
    Ok(file)
}

fn resolve(file: ConfigFile, env: impl Fn(&str) -> Option<String>) -> Result<Config, ConfigError> {
    let key = env("GEMINI_API_KEY")
        .or_else(|| env("API_KEY"))
        .or(file.api_key)
        .ok_or(ConfigError::MissingApiKey)?;

    let mut backend = BackendConfig::new(ApiKey::new(key)?);
    if let Some(base_url) = env("COMEX_GEMINI_BASE_URL").or(file.base_url) {
        backend = backend.with_base_url(base_url);
    }
    if let Some(ms) = file.connect_timeout_ms {
        backend.connect_timeout = Duration::from_millis(ms);
    }

    let defaults = ConductorConfig::default();
    let initial_mode = match env("COMEX_MODE").or(file.initial_mode) {
        Some(mode) => mode.parse::<ModeId>()?,
        None => defaults.initial_mode,
    };

    Ok(Config {
        conductor: ConductorConfig {
            initial_mode,
            temperature: file.temperature.unwrap_or(defaults.temperature),
            limits: file.limits.unwrap_or(defaults.limits),
        },
        backend,
    })
}
