//! Shared configuration for the cfflash binary and embedding front ends.
//!
//! A single TOML file plus `CFFLASH_*` environment overrides, token
//! resolution (env var + plaintext), and translation to
//! `cfflash_core::ReleaseSettings`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use cfflash_core::{DEFAULT_LINK_URI, DEFAULT_RELEASE_INDEX_URL, ReleaseSettings};

/// Prefix of environment overrides, e.g. `CFFLASH_LINK_URI`.
pub const ENV_PREFIX: &str = "CFFLASH_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config struct ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Release index URL (GitHub releases API format).
    #[serde(default = "default_index_url")]
    pub release_index_url: String,

    /// Timeout for index and archive requests, in seconds.
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,

    /// Parent directory for the download cache. Platform temp dir if unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,

    /// Radio link used for cold boot.
    #[serde(default = "default_link_uri")]
    pub link_uri: String,

    /// Access token for the release host (plaintext; prefer the env var).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_token: Option<String>,

    /// Environment variable name containing the access token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_token_env: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            release_index_url: default_index_url(),
            request_timeout_secs: default_timeout(),
            cache_dir: None,
            link_uri: default_link_uri(),
            github_token: None,
            github_token_env: None,
        }
    }
}

fn default_index_url() -> String {
    DEFAULT_RELEASE_INDEX_URL.into()
}
fn default_timeout() -> u64 {
    30
}
fn default_link_uri() -> String {
    DEFAULT_LINK_URI.into()
}

impl Config {
    /// Validate and translate into core release settings.
    pub fn release_settings(&self) -> Result<ReleaseSettings, ConfigError> {
        let index_url: url::Url =
            self.release_index_url
                .parse()
                .map_err(|e: url::ParseError| ConfigError::Validation {
                    field: "release_index_url".into(),
                    reason: format!("{e}: {}", self.release_index_url),
                })?;

        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Validation {
                field: "request_timeout_secs".into(),
                reason: "must be at least 1".into(),
            });
        }

        Ok(ReleaseSettings {
            index_url,
            timeout: Duration::from_secs(self.request_timeout_secs),
            cache_parent: self.cache_dir.clone(),
            token: resolve_token(self),
        })
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "cfflash", "cfflash").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("cfflash");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` + environment. A missing file yields the defaults.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path`, creating parent
/// directories.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Token resolution ────────────────────────────────────────────────

/// Resolve the release-host token: named env var first, then plaintext.
pub fn resolve_token(cfg: &Config) -> Option<SecretString> {
    if let Some(ref env_name) = cfg.github_token_env {
        if let Ok(val) = std::env::var(env_name) {
            if !val.is_empty() {
                return Some(SecretString::from(val));
            }
        }
    }

    cfg.github_token
        .as_ref()
        .filter(|token| !token.is_empty())
        .map(|token| SecretString::from(token.clone()))
}
