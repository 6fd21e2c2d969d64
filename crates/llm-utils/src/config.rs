//! Configuration management utilities
//!
//! Settings come from a JSON file, falling back to defaults, with a couple
//! of environment overrides applied last:
//!
//! 1. the path given explicitly (must exist)
//! 2. `./llm.json` if present
//! 3. built-in defaults
//!
//! `LLM_VENDOR` and `LLM_MODEL` then override `vendor` and `model`.

use crate::logging::LogFormat;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File looked up in the working directory when no path is given
pub const DEFAULT_SETTINGS_FILE: &str = "llm.json";

/// Environment variable overriding the vendor
pub const VENDOR_ENV: &str = "LLM_VENDOR";

/// Environment variable overriding the model
pub const MODEL_ENV: &str = "LLM_MODEL";

/// Errors raised while loading settings
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read
    #[error("Failed to read settings file {path}: {source}")]
    Io {
        /// Offending path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid settings JSON
    #[error("Invalid settings file {path}: {source}")]
    Parse {
        /// Offending path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: serde_json::Error,
    },
}

/// Client settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Vendor name (e.g. "cohere")
    pub vendor: String,

    /// Default model for chat
    pub model: Option<String>,

    /// API base URL override
    pub api_base: Option<String>,

    /// Environment variable holding the API key
    pub api_key_env: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// HTTP protocol version ("http1.1" or "http2")
    pub protocol: String,

    /// Yield vendor-specific informational stream events
    pub surface_vendor_extensions: bool,

    /// Log output format
    pub log_format: LogFormat,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            vendor: "cohere".to_string(),
            model: None,
            api_base: None,
            api_key_env: "COHERE_API_KEY".to_string(),
            timeout_secs: 120,
            protocol: "http1.1".to_string(),
            surface_vendor_extensions: false,
            log_format: LogFormat::Pretty,
        }
    }
}

impl Settings {
    /// Read settings from a JSON file; missing fields take defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Resolve settings from an explicit path, `./llm.json` or defaults,
    /// then apply environment overrides
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut settings = Self::load_from(explicit, Path::new(DEFAULT_SETTINGS_FILE))?;
        settings.apply_overrides(|key| std::env::var(key).ok());
        Ok(settings)
    }

    fn load_from(explicit: Option<&Path>, fallback: &Path) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::from_file(path),
            None if fallback.is_file() => Self::from_file(fallback),
            None => Ok(Self::default()),
        }
    }

    /// Apply `LLM_VENDOR` / `LLM_MODEL` from `lookup`; blank values are ignored
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let value = |key| lookup(key).filter(|v: &String| !v.trim().is_empty());

        if let Some(vendor) = value(VENDOR_ENV) {
            tracing::debug!(%vendor, "Vendor overridden from environment");
            self.vendor = vendor;
        }
        if let Some(model) = value(MODEL_ENV) {
            tracing::debug!(%model, "Model overridden from environment");
            self.model = Some(model);
        }
    }
}
