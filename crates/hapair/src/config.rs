//! Command-line overrides on top of `hapair_config`.

use hapair_config::{Config, config_path, load_config};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Load the config named by `--config` (or the default location) and apply
/// `--insecure`, `--timeout`, and `--deadline`.
pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    let mut cfg = load_config(global.config.as_deref())?;

    // Nothing on disk and nothing from the environment.
    if global.config.is_none() && cfg.devices.is_empty() && !config_path().exists() {
        return Err(CliError::NoConfig {
            path: config_path().display().to_string(),
        });
    }

    if global.insecure {
        cfg.tls.insecure = true;
    }
    if let Some(timeout) = global.timeout {
        cfg.timeout = timeout;
    }
    if let Some(deadline) = global.deadline {
        cfg.deadline_secs = Some(deadline);
    }
    Ok(cfg)
}
