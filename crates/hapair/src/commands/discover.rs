//! `discover` handler: read-only HA snapshot of both devices.

use hapair_core::DeviceStatus;
use tabled::Tabled;

use crate::cli::GlobalOpts;
use crate::commands::orchestrator;
use crate::config;
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct StatusRow {
    #[tabled(rename = "Host")]
    host: String,
    #[tabled(rename = "HA")]
    ha: String,
    #[tabled(rename = "HA interfaces")]
    interfaces: String,
    #[tabled(rename = "Local")]
    local: String,
    #[tabled(rename = "Peer")]
    peer: String,
    #[tabled(rename = "Sync")]
    sync: String,
}

fn to_row(status: &DeviceStatus, color: bool) -> StatusRow {
    let interfaces = status
        .ha_interfaces
        .iter()
        .map(|(port, marked)| format!("{port}{}", if *marked { "" } else { " (unmarked)" }))
        .collect::<Vec<_>>()
        .join(", ");

    StatusRow {
        host: status.host.clone(),
        ha: output::status(
            if status.ha_enabled { "enabled" } else { "disabled" },
            Some(status.ha_enabled),
            color,
        ),
        interfaces,
        local: status.local_state.to_string(),
        peer: status.peer_state.to_string(),
        sync: status.running_sync.clone().unwrap_or_else(|| "-".into()),
    }
}

pub async fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load(global)?;
    let orchestrator = orchestrator(&cfg)?;
    let statuses = orchestrator.discover().await?;

    let color = output::should_color(global.color);
    let out = output::render_list(global.output, &statuses, |s| to_row(s, color))?;
    output::print_output(&out, global.quiet);
    Ok(())
}
