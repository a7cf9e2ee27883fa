//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use cfflash_config::ConfigError;
use cfflash_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the release server at {url}")]
    #[diagnostic(
        code(cfflash::connection_failed),
        help(
            "Check your network connection and the release index URL.\n\
             Override it with --index-url or release_index_url in the config file."
        )
    )]
    ConnectionFailed {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Request timed out after {seconds}s")]
    #[diagnostic(
        code(cfflash::timeout),
        help("Increase timeout with --timeout or request_timeout_secs.")
    )]
    Timeout { seconds: u64 },

    // ── Releases ─────────────────────────────────────────────────────
    #[error("Release '{label}' not found")]
    #[diagnostic(
        code(cfflash::not_found),
        help("Run: cfflash releases to see available labels")
    )]
    NotFound { label: String },

    #[error("Release server error: {message}")]
    #[diagnostic(code(cfflash::api_error))]
    Api {
        message: String,
        status: Option<u16>,
    },

    #[error("Invalid firmware archive {path}")]
    #[diagnostic(
        code(cfflash::invalid_artifact),
        help("{reason}\nThe file is damaged or not a release archive.")
    )]
    InvalidArtifact { path: String, reason: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(cfflash::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Configuration file already exists")]
    #[diagnostic(
        code(cfflash::config_exists),
        help(
            "Found at: {path}\n\
             Use --force to overwrite it."
        )
    )]
    ConfigExists { path: String },

    #[error(transparent)]
    #[diagnostic(code(cfflash::config))]
    Config(ConfigError),

    // ── Internal / IO ────────────────────────────────────────────────
    #[error("Internal error: {0}")]
    #[diagnostic(code(cfflash::internal))]
    Internal(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::NotFound { .. }
            | Self::Api {
                status: Some(404), ..
            } => exit_code::NOT_FOUND,
            Self::Validation { .. } | Self::ConfigExists { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::Io(e) => CliError::Io(e),
            other => CliError::Config(other),
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed {
                url,
                source: reason.into(),
            },

            CoreError::Timeout { timeout_secs } => CliError::Timeout {
                seconds: timeout_secs,
            },

            CoreError::Api { message, status } => CliError::Api { message, status },

            CoreError::InvalidArtifact { path, reason } => {
                CliError::InvalidArtifact { path, reason }
            }

            CoreError::Validation { message } => CliError::Validation {
                field: "input".into(),
                reason: message,
            },

            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },

            CoreError::Io(e) => CliError::Io(e),

            CoreError::WorkerStopped => CliError::Internal("flash worker stopped".into()),

            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}
