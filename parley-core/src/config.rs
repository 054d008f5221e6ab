//! Configuration management for Parley.
//!
//! Provides configuration loading from TOML files with support for
//! multiple file locations, environment variable overrides, and sensible defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;


/// Environment variable pointing at a config file.
pub const CONFIG_ENV_VAR: &str = "PARLEY_CONFIG";

/// Environment variable that overrides `completion.api_key`.
pub const API_KEY_ENV_VAR: &str = "PARLEY_API_KEY";

/// Room kept between the soft and hard chunk limits for fence markers.
pub const FENCE_HEADROOM: usize = 40;

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file '{path}': {source}")]
    IoError {
        /// Path to the configuration file that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the configuration file as TOML.
    #[error("failed to parse config file '{path}': {source}")]
    ParseError {
        /// Path to the configuration file that could not be parsed.
        path: PathBuf,
        /// The underlying TOML parse error.
        source: toml::de::Error,
    },

    /// A value parsed but is not usable.
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue {
        /// Dotted path of the offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

/// Application configuration loaded from TOML file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Config {
    /// The single identity allowed to administer the whitelist.
    ///
    /// `None` means nobody can run admin commands.
    #[serde(default)]
    pub admin_id: Option<u64>,

    /// Completion service settings.
    #[serde(default)]
    pub completion: CompletionConfig,

    /// Storage configuration. Optional; defaults apply when absent.
    #[serde(default)]
    pub storage: Option<StorageConfig>,

    /// Response formatting limits.
    #[serde(default)]
    pub format: FormatConfig,

    /// Chat pipeline behavior.
    #[serde(default)]
    pub chat: ChatConfig,

    /// File logging. When absent only stdout logging is used.
    #[serde(default)]
    pub logging: Option<LoggingConfig>,
}

/// Settings for the OpenAI-compatible completion endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    /// Bearer token. A missing key is reported per request, not at load time.
    pub api_key: Option<String>,
    /// Model identifier sent with every request.
    pub model: String,
    /// Full URL of the chat completions endpoint.
    pub endpoint: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Number of user/assistant pairs of history sent as context.
    pub history_pairs: u32,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "llama-3.1-70b-versatile".to_string(),
            endpoint: "https://api.groq.com/openai/v1/chat/completions".to_string(),
            timeout_secs: 60,
            history_pairs: 20,
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StorageConfig {
    /// Database URL (e.g. `sqlite:/path/to/parley.db`).
    #[serde(default)]
    pub database_url: Option<String>,
}

/// Chunking limits for outgoing messages.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FormatConfig {
    /// Target chunk size in characters.
    pub soft_limit: usize,
    /// Absolute per-message maximum of the transport.
    pub hard_limit: usize,
    /// Close and reopen code fences when a split lands inside one.
    pub reopen_fences: bool,
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            soft_limit: 1900,
            hard_limit: 2000,
            reopen_fences: false,
        }
    }
}

/// Chat pipeline behavior.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Process messages of the same user one at a time.
    pub serialize_per_user: bool,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            serialize_per_user: true,
        }
    }
}

/// Log file rotation policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rotation {
    /// New file every day.
    #[default]
    Daily,
    /// New file every hour.
    Hourly,
    /// Single file, never rotated.
    Never,
}

/// File logging configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory the log files are written to.
    pub directory: String,
    /// Maximum number of rotated files kept.
    pub max_files: usize,
    /// Rotation policy.
    pub rotation: Rotation,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: "logs".to_string(),
            max_files: 7,
            rotation: Rotation::Daily,
        }
    }
}

impl Config {
    /// Load configuration from file system.
    ///
    /// Priority order:
    /// 1. `path` argument (e.g. a `--config` flag)
    /// 2. PARLEY_CONFIG environment variable
    /// 3. ./config.toml (local directory)
    /// 4. ~/.config/parley/config.toml (user config)
    ///
    /// Returns default config if no config file found.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::IoError`] if a found file cannot be read.
    /// Returns [`ConfigError::ParseError`] if a found file is not valid TOML.
    /// Returns [`ConfigError::InvalidValue`] if validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::load_from(path);
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                return Self::load_from(p);
            }
        }

        let local = PathBuf::from("config.toml");
        if local.exists() {
            return Self::load_from(local);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".config/parley/config.toml");
            if user_config.exists() {
                return Self::load_from(user_config);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::IoError`] if the file cannot be read.
    /// Returns [`ConfigError::ParseError`] if the file is not valid TOML.
    /// Returns [`ConfigError::InvalidValue`] if validation fails.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::IoError {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::ParseError {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.format.soft_limit == 0 {
            return Err(ConfigError::InvalidValue {
                field: "format.soft_limit",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.format.soft_limit + FENCE_HEADROOM > self.format.hard_limit {
            return Err(ConfigError::InvalidValue {
                field: "format.soft_limit",
                reason: format!(
                    "must be at least {} below format.hard_limit ({})",
                    FENCE_HEADROOM, self.format.hard_limit
                ),
            });
        }
        if self.completion.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "completion.timeout_secs",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Resolve the API key: PARLEY_API_KEY env var, then `completion.api_key`.
    ///
    /// Empty values count as missing.
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Ok(key) = std::env::var(API_KEY_ENV_VAR)
            && !key.trim().is_empty()
        {
            return Some(key);
        }
        self.completion
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
    }

    /// Database URL from the `[storage]` section, if any.
    pub fn database_url(&self) -> Option<&str> {
        self.storage
            .as_ref()
            .and_then(|s| s.database_url.as_deref())
    }
}
