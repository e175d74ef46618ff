//! Configuration loading
//!
//! Bootstrap configuration lives in a single TOML file. The file is located
//! in priority order:
//! 1. Command-line argument (`--config`)
//! 2. Environment variable (`SAFELIGHT_CONFIG`)
//! 3. Platform config directory (`<config_dir>/safelight/safelight.toml`)
//! 4. Built-in defaults (no file)
//!
//! A missing file is not an error: a warning is logged and defaults apply.
//! A file that exists but does not parse is an error.

use crate::default_values::MAX_SIDE_LENGTH;
use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "SAFELIGHT_CONFIG";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SafelightConfig {
    /// Base URL of the build server that fronts remote devices
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Directory holding compute module executables
    #[serde(default = "default_module_dir")]
    pub module_dir: PathBuf,

    /// Side length of synthesized input buffers
    #[serde(default = "default_buffer_side_length")]
    pub default_buffer_side_length: i32,

    /// Thread count passed to `run` when the CLI does not override it
    #[serde(default = "default_num_threads")]
    pub num_threads: u32,

    /// Timeout applied to each remote device HTTP call
    #[serde(default = "default_http_timeout_ms")]
    pub http_timeout_ms: u64,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for SafelightConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            module_dir: default_module_dir(),
            default_buffer_side_length: default_buffer_side_length(),
            num_threads: default_num_threads(),
            http_timeout_ms: default_http_timeout_ms(),
            logging: LoggingConfig::default(),
        }
    }
}

fn default_server_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_module_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_buffer_side_length() -> i32 {
    64
}

fn default_num_threads() -> u32 {
    1
}

fn default_http_timeout_ms() -> u64 {
    30_000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl SafelightConfig {
    /// Parse configuration text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)
            .map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from an explicit file
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file {:?}: {}", path, e)))?;
        Self::from_toml_str(&text)
    }

    /// Resolve the config file and load it, falling back to defaults when
    /// no file exists
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        match resolve_config_path(cli_path) {
            Some(path) if path.exists() => {
                let config = Self::from_file(&path)?;
                info!("Loaded configuration from {:?}", path);
                Ok(config)
            }
            Some(path) => {
                warn!("Config file {:?} not found, using built-in defaults", path);
                Ok(Self::default())
            }
            None => {
                warn!("No config directory available, using built-in defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }

    fn validate(&self) -> Result<()> {
        if !(1..=MAX_SIDE_LENGTH).contains(&self.default_buffer_side_length) {
            return Err(Error::Config(format!(
                "default_buffer_side_length must be between 1 and {}, got {}",
                MAX_SIDE_LENGTH, self.default_buffer_side_length
            )));
        }
        if self.num_threads == 0 {
            return Err(Error::Config("num_threads must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Pick the config file path: CLI, then environment, then platform default
pub fn resolve_config_path(cli_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_path {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    default_config_path()
}

/// `<config_dir>/safelight/safelight.toml` for the current platform
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("safelight").join("safelight.toml"))
}
