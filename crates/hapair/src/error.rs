//! CLI error types with miette diagnostics.
//!
//! Maps stage failures and configuration errors into user-facing errors
//! with actionable help text and the process exit code contract.

use miette::Diagnostic;
use thiserror::Error;

use hapair_config::ConfigError;
use hapair_core::{CoreError, Stage, StageFailure};

/// Process exit codes.
pub mod exit_code {
    use hapair_core::Stage;

    pub const SUCCESS: i32 = 0;
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const CONFIG: i32 = 3;
    /// A stage failure exits with `STAGE_BASE + ordinal`.
    pub const STAGE_BASE: i32 = 10;
    pub const COMMITTED_UNSYNCED: i32 = 20;

    pub fn stage(stage: Stage) -> i32 {
        STAGE_BASE + i32::from(stage.ordinal())
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Deployment ───────────────────────────────────────────────────
    #[error("Stage {stage} failed")]
    #[diagnostic(code(hapair::stage_failed))]
    StageFailed {
        stage: Stage,
        #[source]
        source: CoreError,
        #[help]
        advice: Option<String>,
    },

    #[error("Configuration committed on {host} but the peer is not synchronized")]
    #[diagnostic(
        code(hapair::committed_unsynced),
        help(
            "The configuration is live on the active device (last sync state: {last_state}).\n\
             Check again with: hapair discover\n\
             Or retry with: hapair stage commit-sync"
        )
    )]
    CommittedUnsynced { host: String, last_state: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Configuration file not found")]
    #[diagnostic(
        code(hapair::no_config),
        help(
            "Create one at: {path}\n\
             Or pass one with --config / HAPAIR_CONFIG."
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(
        code(hapair::config),
        help("Inspect the resolved configuration with: hapair config show")
    )]
    Config(#[from] ConfigError),

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(hapair::validation))]
    Validation { field: String, reason: String },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render JSON: {0}")]
    #[diagnostic(code(hapair::json))]
    Json(#[from] serde_json::Error),

    #[error("Failed to render YAML: {0}")]
    #[diagnostic(code(hapair::yaml))]
    Yaml(#[from] serde_yaml::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::StageFailed { stage, .. } => exit_code::stage(*stage),
            Self::CommittedUnsynced { .. } => exit_code::COMMITTED_UNSYNCED,
            Self::NoConfig { .. } | Self::Config(_) => exit_code::CONFIG,
            Self::Validation { .. } => exit_code::USAGE,
            Self::Io(_) | Self::Json(_) | Self::Yaml(_) => exit_code::GENERAL,
        }
    }
}

// ── StageFailure → CliError mapping ──────────────────────────────────

impl From<StageFailure> for CliError {
    fn from(failure: StageFailure) -> Self {
        let advice = advice(&failure.error);
        CliError::StageFailed {
            stage: failure.stage,
            source: failure.error,
            advice,
        }
    }
}

fn advice(err: &CoreError) -> Option<String> {
    let text = match err {
        CoreError::Authentication { .. } => {
            "Verify the username and password.\n\
             The password is read from HAPAIR_PASSWORD, the keyring\n\
             (hapair config set-password), or the config file, in that order."
                .to_owned()
        }
        CoreError::Transport { host, .. } => format!(
            "Check that {host} is reachable over HTTPS.\n\
             Use --insecure (-k) for self-signed certificates, or raise --timeout."
        ),
        CoreError::ConfigRejected { payload, .. } => format!(
            "The device rejected the {payload} document.\n\
             Fix it and resume with: hapair run --from firewall-config"
        ),
        CoreError::PayloadNotReady { kind, .. } => format!(
            "Render {} into payload_dir before running firewall-config.",
            kind.file_name()
        ),
        CoreError::RoleResolutionTimeout { .. } | CoreError::RolesUnresolved { .. } => {
            "Check the HA1/HA2 cabling and the HA settings (hapair plan),\n\
             then inspect both devices with: hapair discover\n\
             Allow more time with roles.max_polls."
                .to_owned()
        }
        CoreError::CommitFailed { host, job_id, .. } => {
            format!("Inspect commit job {job_id} on {host} for validation errors.")
        }
        CoreError::CommitTimeout { .. } => {
            "The commit may still complete on the device.\n\
             Allow more time with commit.max_polls."
                .to_owned()
        }
        CoreError::DeadlineExceeded => "Raise --deadline or deadline_secs.".to_owned(),
        CoreError::InvalidPlan { .. } => "Check the [ha] section: hapair plan".to_owned(),
        CoreError::Command { .. }
        | CoreError::MissingSession { .. }
        | CoreError::DuplicateSession { .. }
        | CoreError::Cancelled => return None,
    };
    Some(text)
}
