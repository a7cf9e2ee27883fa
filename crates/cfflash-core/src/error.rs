// ── Core error types ──
//
// User-facing errors from cfflash-core. Consumers never see raw HTTP
// status codes or JSON parse failures; the `From<cfflash_api::Error>`
// impl translates transport-layer errors into domain variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Network errors ───────────────────────────────────────────────
    #[error("Cannot reach {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Release server error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Firmware errors ──────────────────────────────────────────────
    #[error("Invalid firmware archive {path}: {reason}")]
    InvalidArtifact { path: String, reason: String },

    #[error("Flash worker is not running")]
    WorkerStopped,

    // ── Input errors ─────────────────────────────────────────────────
    #[error("Validation failed: {message}")]
    Validation { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Local errors ─────────────────────────────────────────────────
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<cfflash_api::Error> for CoreError {
    fn from(err: cfflash_api::Error) -> Self {
        match err {
            cfflash_api::Error::Transport(ref e) => {
                if e.is_connect() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map_or_else(|| "<unknown>".into(), ToString::to_string),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            cfflash_api::Error::InvalidUrl(e) => CoreError::Validation {
                message: format!("Invalid URL: {e}"),
            },
            cfflash_api::Error::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            cfflash_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            cfflash_api::Error::InvalidToken(msg) => CoreError::Config {
                message: format!("invalid access token: {msg}"),
            },
            cfflash_api::Error::Http { status, url } => CoreError::Api {
                message: format!("HTTP {status} from {url}"),
                status: Some(status),
            },
            cfflash_api::Error::Deserialization { message, body: _ } => CoreError::Api {
                message: format!("unexpected release index format: {message}"),
                status: None,
            },
        }
    }
}
