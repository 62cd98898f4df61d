//! `plan` handler: the HA settings each device will receive.
//!
//! Works entirely offline; no credentials are resolved.

use std::fmt::Write as _;

use serde::Serialize;
use tabled::Tabled;

use crate::cli::GlobalOpts;
use crate::config;
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
struct PlanView {
    group_id: u8,
    ha1_port: String,
    ha2_port: String,
    ha1_netmask: String,
    link_monitoring: Vec<String>,
    activate: bool,
    devices: Vec<PlanDevice>,
}

#[derive(Debug, Serialize, Tabled)]
struct PlanDevice {
    #[tabled(rename = "Host")]
    host: String,
    #[tabled(rename = "HA1 address")]
    ha1_ip: String,
    #[tabled(rename = "Peer")]
    peer_ip: String,
    #[tabled(rename = "Priority")]
    priority: u8,
    #[tabled(rename = "Preemptive")]
    preemptive: bool,
}

fn build(cfg: &hapair_config::Config) -> Result<PlanView, CliError> {
    let plan = cfg.ha_plan()?;
    let endpoints = cfg.endpoints()?;
    let settings = plan.settings();

    let devices = endpoints
        .iter()
        .zip(plan.summary())
        .map(|(endpoint, node)| PlanDevice {
            host: endpoint.host().to_owned(),
            ha1_ip: node.ha1_ip.to_string(),
            peer_ip: node.peer_ip.to_string(),
            priority: node.priority,
            preemptive: node.preemptive,
        })
        .collect();

    Ok(PlanView {
        group_id: settings.group_id,
        ha1_port: settings.ha1_port.clone(),
        ha2_port: settings.ha2_port.clone(),
        ha1_netmask: settings.ha1_netmask.to_string(),
        link_monitoring: settings.link_monitoring.clone(),
        activate: settings.activate,
        devices,
    })
}

fn detail(view: &PlanView) -> String {
    let mut out = output::render_table(&view.devices);
    let monitoring = if view.link_monitoring.is_empty() {
        "off".to_owned()
    } else {
        view.link_monitoring.join(", ")
    };
    let _ = write!(
        out,
        "\n\nGroup:       {}\nHA1 port:    {} ({})\nHA2 port:    {}\nMonitoring:  {monitoring}\nActivate:    {}",
        view.group_id,
        view.ha1_port,
        view.ha1_netmask,
        view.ha2_port,
        if view.activate { "yes" } else { "no" },
    );
    out
}

pub fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load(global)?;
    let view = build(&cfg)?;
    let out = output::render_single(global.output, &view, detail)?;
    output::print_output(&out, global.quiet);
    Ok(())
}
