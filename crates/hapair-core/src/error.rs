// ── Core error types ──
//
// Errors surfaced by the deployment stages. Every device-facing variant
// carries the host it came from; `hapair_api::Error` is translated at the
// call site with `CoreError::device` / `CoreError::rejected` because the
// API error alone does not know which device or payload it belongs to.

use hapair_api::JobId;
use thiserror::Error;

use crate::payload::PayloadKind;
use crate::stages::Stage;

/// Unified error type for the core crate.
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    // ── Device errors ────────────────────────────────────────────────
    #[error("Authentication failed on {host}: {message}")]
    Authentication { host: String, message: String },

    #[error("{host} rejected {payload} configuration: {message}")]
    ConfigRejected {
        host: String,
        payload: String,
        message: String,
    },

    #[error("Command failed on {host}: {message}")]
    Command { host: String, message: String },

    #[error("Cannot reach {host}: {reason}")]
    Transport { host: String, reason: String },

    // ── Session errors ───────────────────────────────────────────────
    #[error("No session for {host}; authentication has not run")]
    MissingSession { host: String },

    #[error("Session for {host} already exists")]
    DuplicateSession { host: String },

    // ── Input errors ─────────────────────────────────────────────────
    #[error("Payload {kind} is not ready: {reason}")]
    PayloadNotReady { kind: PayloadKind, reason: String },

    #[error("Invalid deployment plan: {reason}")]
    InvalidPlan { reason: String },

    // ── Role resolution ──────────────────────────────────────────────
    #[error("HA roles are not resolved: {reason}")]
    RolesUnresolved { reason: String },

    #[error("HA roles did not converge after {rounds} rounds (last seen: {last})")]
    RoleResolutionTimeout { rounds: u32, last: String },

    // ── Commit ───────────────────────────────────────────────────────
    #[error("Commit job {job_id} failed on {host}: {message}")]
    CommitFailed {
        host: String,
        job_id: JobId,
        message: String,
    },

    #[error("Commit job {job_id} on {host} did not finish after {polls} polls")]
    CommitTimeout {
        host: String,
        job_id: JobId,
        polls: u32,
    },

    // ── Run control ──────────────────────────────────────────────────
    #[error("Run deadline exceeded")]
    DeadlineExceeded,

    #[error("Run cancelled")]
    Cancelled,
}

impl CoreError {
    /// Translate an API error raised while talking to `host`.
    pub fn device(host: &str, err: hapair_api::Error) -> Self {
        let host = host.to_owned();
        match err {
            hapair_api::Error::Authentication { message } => Self::Authentication { host, message },
            hapair_api::Error::ConfigRejected { message, .. }
            | hapair_api::Error::Command { message, .. } => Self::Command { host, message },
            hapair_api::Error::ObjectNotFound { xpath } => Self::Command {
                host,
                message: format!("object not found: {xpath}"),
            },
            hapair_api::Error::Malformed { message, .. } => Self::Command {
                host,
                message: format!("malformed response: {message}"),
            },
            hapair_api::Error::InvalidXPath { name, reason } => Self::InvalidPlan {
                reason: format!("{name:?}: {reason}"),
            },
            err @ (hapair_api::Error::Transport(_)
            | hapair_api::Error::Http { .. }
            | hapair_api::Error::InvalidUrl(_)
            | hapair_api::Error::Tls(_)) => Self::Transport {
                host,
                reason: err.to_string(),
            },
        }
    }

    /// Translate an API error raised while applying `payload` to `host`.
    ///
    /// Device rejections keep the device text verbatim and name the payload.
    pub fn rejected(host: &str, payload: &str, err: hapair_api::Error) -> Self {
        match err {
            hapair_api::Error::ConfigRejected { message, .. } => Self::ConfigRejected {
                host: host.to_owned(),
                payload: payload.to_owned(),
                message,
            },
            other => Self::device(host, other),
        }
    }

    /// The device this error concerns, if any.
    pub fn host(&self) -> Option<&str> {
        match self {
            Self::Authentication { host, .. }
            | Self::ConfigRejected { host, .. }
            | Self::Command { host, .. }
            | Self::Transport { host, .. }
            | Self::MissingSession { host }
            | Self::DuplicateSession { host }
            | Self::CommitFailed { host, .. }
            | Self::CommitTimeout { host, .. } => Some(host),
            _ => None,
        }
    }
}

/// A fatal error together with the stage it halted.
#[derive(Debug, Clone, Error)]
#[error("stage {stage} failed: {error}")]
pub struct StageFailure {
    pub stage: Stage,
    #[source]
    pub error: CoreError,
}

impl StageFailure {
    pub fn new(stage: Stage, error: CoreError) -> Self {
        Self { stage, error }
    }
}
