//! Relay settings: where to send requests and how to identify ourselves.
//!
//! A TOML file (found via `RELAY_CONFIG`, the working directory or
//! `~/.config/relay/`) supplies the endpoint, key, model and identification
//! headers. `RELAY_BASE_URL` and `RELAY_MODEL` are layered on top of it.

use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

/// Default OpenAI-compatible API base URL.
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Default model identifier.
pub const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";

/// Default value of the `HTTP-Referer` identification header.
pub const DEFAULT_REFERER: &str = "https://github.com/relay-rs/relay";

/// Default value of the `X-Title` identification header.
pub const DEFAULT_TITLE: &str = "relay";

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "RELAY_CONFIG";

/// Environment variable overriding [`Config::base_url`].
pub const BASE_URL_ENV: &str = "RELAY_BASE_URL";

/// Environment variable overriding [`Config::model`].
pub const MODEL_ENV: &str = "RELAY_MODEL";

/// A relay config file was found but is unusable.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but reading it failed.
    #[error("cannot read relay config {path}: {source}")]
    IoError {
        /// Offending file.
        path: PathBuf,
        /// Read failure.
        source: std::io::Error,
    },

    /// The file is not valid TOML or has a mistyped field.
    #[error("invalid relay config {path}: {source}")]
    ParseError {
        /// Offending file.
        path: PathBuf,
        /// TOML decode failure.
        source: toml::de::Error,
    },
}

/// Endpoint, credentials and identity used by the generator.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Config {
    /// Base URL of the OpenAI-compatible API, without `/chat/completions`.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API key. The `RELAY_API_KEY` environment variable takes precedence.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model every request targets.
    #[serde(default = "default_model")]
    pub model: String,

    /// Value of the `HTTP-Referer` header.
    #[serde(default = "default_referer")]
    pub referer: String,

    /// Value of the `X-Title` header.
    #[serde(default = "default_title")]
    pub title: String,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_referer() -> String {
    DEFAULT_REFERER.to_string()
}

fn default_title() -> String {
    DEFAULT_TITLE.to_string()
}

impl Config {
    /// Read the first relay config file that exists, then layer
    /// `RELAY_BASE_URL` and `RELAY_MODEL` on top.
    ///
    /// Files are tried in this order: the path in `RELAY_CONFIG`,
    /// `./config.toml`, `~/.config/relay/config.toml`. With none present the
    /// built-in defaults are used.
    ///
    /// # Errors
    ///
    /// [`ConfigError::IoError`] or [`ConfigError::ParseError`] for the first
    /// file found; later candidates are not tried.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_file()?;
        config.apply_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    fn load_file() -> Result<Self, ConfigError> {
        // Explicit path
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            let p = PathBuf::from(&path);
            if p.exists() {
                return Self::load_from(p);
            }
            tracing::warn!(path = %path, "config: {} points to a missing file", CONFIG_PATH_ENV);
        }

        // Working directory
        let local = PathBuf::from("config.toml");
        if local.exists() {
            return Self::load_from(local);
        }

        // Per-user file
        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".config/relay/config.toml");
            if user_config.exists() {
                return Self::load_from(user_config);
            }
        }

        tracing::debug!("config: no config file found, using defaults");
        Ok(Self::default())
    }

    /// Parse the relay config at `path`. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// [`ConfigError::IoError`] when unreadable, [`ConfigError::ParseError`]
    /// when not a valid relay config.
    pub fn load_from(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "config: loading");
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::IoError {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::ParseError {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply `RELAY_BASE_URL` / `RELAY_MODEL` overrides read through `lookup`.
    ///
    /// Empty values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(base_url) = lookup(BASE_URL_ENV).filter(|v| !v.is_empty()) {
            self.base_url = base_url;
        }
        if let Some(model) = lookup(MODEL_ENV).filter(|v| !v.is_empty()) {
            self.model = model;
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            model: default_model(),
            referer: default_referer(),
            title: default_title(),
        }
    }
}
