//! `config` subcommands.

use dialoguer::Password;
use hapair_config::{config_path, keyring_entry};

use crate::cli::{ConfigCommand, GlobalOpts, OutputFormat};
use crate::commands::prompt_err;
use crate::config;
use crate::error::CliError;
use crate::output;

pub fn handle(command: &ConfigCommand, global: &GlobalOpts) -> Result<(), CliError> {
    match command {
        ConfigCommand::Path => {
            let path = global.config.clone().unwrap_or_else(config_path);
            output::print_output(&path.display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = config::load(global)?.redacted();
            let out = match global.output {
                OutputFormat::Table => cfg.to_toml()?,
                format => output::render_single(format, &cfg, |_| String::new())?,
            };
            output::print_output(out.trim_end(), global.quiet);
            Ok(())
        }

        ConfigCommand::SetPassword { username } => {
            let username = match username {
                Some(name) => name.clone(),
                None => config::load(global)?
                    .username
                    .filter(|u| !u.is_empty())
                    .ok_or_else(|| CliError::Validation {
                        field: "username".into(),
                        reason: "pass --username or set username in the config".into(),
                    })?,
            };

            let password = Password::new()
                .with_prompt(format!("Password for {username}"))
                .with_confirmation("Confirm password", "Passwords do not match")
                .interact()
                .map_err(prompt_err)?;

            keyring_entry(&username)
                .and_then(|entry| entry.set_password(&password))
                .map_err(|e| CliError::Validation {
                    field: "keyring".into(),
                    reason: e.to_string(),
                })?;

            if !global.quiet {
                eprintln!("Password for {username} stored in the system keyring.");
            }
            Ok(())
        }
    }
}
