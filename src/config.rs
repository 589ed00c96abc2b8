//! Configuration file parser for ~/.config/ttrss/config.toml.
//!
//! The config file is optional: a missing file yields `Config::default()`, and
//! the `TTRSS_API_URL`, `TTRSS_USERNAME` and `TTRSS_PASSWORD` environment
//! variables override whatever the file says. Unknown keys are accepted but
//! logged as warnings.
//!
//! Credential values that start with `op ` are treated as 1Password CLI
//! commands and replaced by the command's trimmed output.
use crate::api::{Credentials, DEFAULT_CACHE_CAPACITY};
use crate::util::{validate_api_url, UrlValidationError};
use secrecy::SecretString;
use serde::Deserialize;
use std::path::Path;
use std::process::Command;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error(transparent)]
    InvalidUrl(#[from] UrlValidationError),

    #[error("cache_size must be at least 1")]
    ZeroCacheSize,

    #[error("request_timeout_secs must be at least 1")]
    ZeroTimeout,

    /// A `op ...` secret reference could not be resolved.
    #[error("Failed to resolve secret for {key}: {reason}")]
    Secret { key: &'static str, reason: String },
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub ttrss: TtrssConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Maximum number of cached API responses.
    pub cache_size: usize,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            cache_size: DEFAULT_CACHE_CAPACITY,
            request_timeout_secs: 30,
        }
    }
}

/// Server connection settings.
///
/// Custom Debug impl masks `password` to prevent secret leakage in logs.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct TtrssConfig {
    pub api_url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl std::fmt::Debug for TtrssConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtrssConfig")
            .field("api_url", &self.api_url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        Self::parse(&content)
    }

    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            warn_unknown_keys(&raw);
        }

        let config: Config = toml::from_str(content)?;
        tracing::info!(cache_size = config.general.cache_size, "Loaded configuration");
        Ok(config)
    }

    /// Apply `TTRSS_*` environment overrides.
    pub fn with_env_overrides(mut self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok());
        self
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("TTRSS_API_URL") {
            self.ttrss.api_url = Some(v);
        }
        if let Some(v) = lookup("TTRSS_USERNAME") {
            self.ttrss.username = Some(v);
        }
        if let Some(v) = lookup("TTRSS_PASSWORD") {
            self.ttrss.password = Some(v);
        }
    }

    /// Resolve secrets, validate the endpoint and build the credential bundle.
    ///
    /// Also rejects a zero `cache_size` or `request_timeout_secs`, so callers can
    /// pass both straight to the client.
    pub fn credentials(&self) -> Result<Credentials, ConfigError> {
        if self.general.cache_size == 0 {
            return Err(ConfigError::ZeroCacheSize);
        }
        if self.general.request_timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }

        let api_url = resolve_value(
            "ttrss.api_url",
            self.ttrss.api_url.as_deref().ok_or(ConfigError::Missing("ttrss.api_url"))?,
        )?;
        let username = resolve_value(
            "ttrss.username",
            self.ttrss.username.as_deref().ok_or(ConfigError::Missing("ttrss.username"))?,
        )?;
        let password = resolve_value(
            "ttrss.password",
            self.ttrss.password.as_deref().ok_or(ConfigError::Missing("ttrss.password"))?,
        )?;

        let api_url = validate_api_url(&api_url)?;
        Ok(Credentials::new(api_url, username, SecretString::from(password)))
    }
}

fn warn_unknown_keys(raw: &toml::Table) {
    const SECTIONS: [(&str, &[&str]); 2] = [
        ("general", &["cache_size", "request_timeout_secs"]),
        ("ttrss", &["api_url", "username", "password"]),
    ];

    for (key, value) in raw {
        let Some((_, known)) = SECTIONS.iter().find(|(name, _)| *name == key.as_str()) else {
            tracing::warn!(key = %key, "Unknown section in config file, ignoring");
            continue;
        };
        if let Some(table) = value.as_table() {
            for sub in table.keys() {
                if !known.contains(&sub.as_str()) {
                    tracing::warn!(
                        key = %format!("{key}.{sub}"),
                        "Unknown key in config file, ignoring"
                    );
                }
            }
        }
    }
}

/// Return `value`, or the output of running it when it is an `op ...` command.
fn resolve_value(key: &'static str, value: &str) -> Result<String, ConfigError> {
    if !value.starts_with("op ") {
        return Ok(value.to_string());
    }

    tracing::debug!(key = key, "Resolving setting through 1Password CLI");
    let mut parts = value.split_whitespace();
    let program = parts.next().unwrap_or("op");
    let output = Command::new(program)
        .args(parts)
        .output()
        .map_err(|e| ConfigError::Secret {
            key,
            reason: if e.kind() == std::io::ErrorKind::NotFound {
                "'op' command not found; is the 1Password CLI installed?".to_string()
            } else {
                e.to_string()
            },
        })?;

    if !output.status.success() {
        return Err(ConfigError::Secret {
            key,
            reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

// ============================================================================
// Tests
// ============================================================================
