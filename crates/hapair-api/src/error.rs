use thiserror::Error;

/// Top-level error type for the `hapair-api` crate.
///
/// Covers every failure mode of a single device API exchange:
/// authentication, configuration rejection, operational commands,
/// transport, and response decoding. `hapair-core` enriches these with
/// the stage and device host before surfacing them.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Key generation was refused (bad credentials, locked account) or the
    /// device rejected the API key on a later call.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── Device-reported errors ──────────────────────────────────────
    /// The device rejected a configuration `set`/`edit` payload. The message
    /// is the device text, verbatim.
    #[error("Configuration rejected: {message}")]
    ConfigRejected {
        message: String,
        code: Option<String>,
    },

    /// An operational command (or commit request) returned an error envelope.
    #[error("Command failed: {message}")]
    Command {
        message: String,
        code: Option<String>,
    },

    /// The addressed configuration object does not exist on the device.
    #[error("Object not found: {xpath}")]
    ObjectNotFound { xpath: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-success HTTP status with no decodable response envelope.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS configuration or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Request construction ────────────────────────────────────────
    /// A structural path could not be built from the given entry name.
    #[error("Invalid xpath entry name {name:?}: {reason}")]
    InvalidXPath { name: String, reason: &'static str },

    // ── Data ────────────────────────────────────────────────────────
    /// The response body was not a well-formed response envelope, or a
    /// required element was missing. Carries the raw body for debugging.
    #[error("Malformed response: {message}")]
    Malformed { message: String, body: String },
}

impl Error {
    /// Returns `true` if this is a network-level failure that a polling
    /// stage may absorb into its retry budget.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns `true` if the addressed object does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ObjectNotFound { .. })
    }

    /// The device-reported error text, if this error carries one.
    pub fn device_message(&self) -> Option<&str> {
        match self {
            Self::Authentication { message }
            | Self::ConfigRejected { message, .. }
            | Self::Command { message, .. } => Some(message),
            _ => None,
        }
    }
}
