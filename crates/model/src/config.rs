//! Client configuration via `settee.toml`
//!
//! A client is described by one small TOML file: where the server lives,
//! which static credentials to send, and how large the per-database cache
//! of detached documents may grow. Missing keys fall back to defaults, so an
//! empty file is a valid configuration.

use serde::{Deserialize, Serialize};
use settee_core::{Error, Result};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Config file name looked up by applications.
pub const CONFIG_FILE_NAME: &str = "settee.toml";

/// Default server root.
pub const DEFAULT_URL: &str = "http://localhost:5984";

/// Default bound of the cached pool in each identity registry.
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

fn default_url() -> String {
    DEFAULT_URL.to_string()
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_cache_capacity() -> usize {
    DEFAULT_CACHE_CAPACITY
}

/// Client configuration loaded from `settee.toml`.
///
/// # Example
///
/// ```toml
/// url = "http://localhost:5984"
/// username = "admin"
/// password = "secret"
/// timeout_ms = 30000
/// cache_capacity = 1024
///
/// [headers]
/// X-Couch-Full-Commit = "true"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientConfig {
    /// Server root URL.
    #[serde(default = "default_url")]
    pub url: String,
    /// Basic-auth user name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Basic-auth password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Per-request timeout in milliseconds (default: 30000).
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Maximum number of detached documents kept per database (default: 1024).
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    /// Headers sent with every request.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            username: None,
            password: None,
            timeout_ms: default_timeout_ms(),
            cache_capacity: default_cache_capacity(),
            headers: BTreeMap::new(),
        }
    }
}

impl ClientConfig {
    /// Configuration pointing at `url`, everything else default.
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Request timeout as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Static credentials, when both halves are present.
    pub fn credentials(&self) -> Option<(String, String)> {
        match (&self.username, &self.password) {
            (Some(user), Some(password)) => Some((user.clone(), password.clone())),
            _ => None,
        }
    }

    /// Check the values that cannot be checked by deserialization alone.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` for a non-HTTP url, a zero timeout, or a
    /// user name without a password (or the reverse).
    pub fn validate(&self) -> Result<()> {
        if !(self.url.starts_with("http://") || self.url.starts_with("https://")) {
            return Err(Error::config(format!(
                "url '{}' must start with http:// or https://",
                self.url
            )));
        }
        if self.timeout_ms == 0 {
            return Err(Error::config("timeout_ms must be greater than zero"));
        }
        if self.username.is_some() != self.password.is_some() {
            return Err(Error::config(
                "username and password must be given together",
            ));
        }
        Ok(())
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Settee client configuration
#
# Server root URL
url = "http://localhost:5984"

# Static basic-auth credentials (optional, both or neither)
# username = "admin"
# password = "secret"

# Per-request timeout in milliseconds
timeout_ms = 30000

# Detached documents kept per database before the oldest are dropped
cache_capacity = 1024

# Headers sent with every request
# [headers]
# X-Couch-Full-Commit = "true"
"#
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: ClientConfig = toml::from_str(&content).map_err(|e| {
            Error::config(format!(
                "failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                Error::config(format!(
                    "failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::config(format!("failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            Error::config(format!(
                "failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }
}
