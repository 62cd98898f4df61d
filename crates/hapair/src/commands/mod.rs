//! Command handlers.

pub mod config_cmd;
pub mod discover;
pub mod plan;
pub mod run;

use std::sync::Arc;

use hapair_config::{Config, ConfigError};
use hapair_core::{Orchestrator, Stage};

use crate::cli::StageArg;
use crate::error::CliError;

impl From<StageArg> for Stage {
    fn from(arg: StageArg) -> Self {
        match arg {
            StageArg::Authenticate => Self::Authenticate,
            StageArg::HaInterfaces => Self::HaInterfaces,
            StageArg::HaGroup => Self::HaGroup,
            StageArg::ResolveRoles => Self::ResolveRoles,
            StageArg::FirewallConfig => Self::FirewallConfig,
            StageArg::CommitSync => Self::CommitSync,
        }
    }
}

/// Build an orchestrator from a loaded config and cancel it on Ctrl-C.
pub(crate) fn orchestrator(cfg: &Config) -> Result<Orchestrator, CliError> {
    let deployment = cfg.to_deployment_config()?;
    let orchestrator = Orchestrator::new(deployment, Arc::new(cfg.payload_source())).map_err(
        |e| ConfigError::Validation {
            field: "tls".into(),
            reason: e.to_string(),
        },
    )?;

    let cancel = orchestrator.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling run");
            cancel.cancel();
        }
    });
    Ok(orchestrator)
}

/// Map a dialoguer / interactive I/O failure into CliError.
pub(crate) fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}
