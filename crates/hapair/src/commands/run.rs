//! `run` and `stage` handlers.

use std::fmt::Write as _;
use std::io::{self, IsTerminal};
use std::time::Duration;

use dialoguer::Confirm;
use hapair_core::{DeploymentConfig, RunOutcome, RunReport, Stage, StagePlan};
use indicatif::{ProgressBar, ProgressStyle};
use tabled::Tabled;

use crate::cli::GlobalOpts;
use crate::commands::{orchestrator, prompt_err};
use crate::config;
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct StageRow {
    #[tabled(rename = "#")]
    ordinal: u8,
    #[tabled(rename = "Stage")]
    stage: String,
    #[tabled(rename = "Status")]
    status: String,
}

pub async fn handle(from: Stage, to: Stage, global: &GlobalOpts) -> Result<(), CliError> {
    let plan = StagePlan::range(from, to).map_err(|e| CliError::Validation {
        field: "stages".into(),
        reason: e.to_string(),
    })?;

    let cfg = config::load(global)?;
    let orchestrator = orchestrator(&cfg)?;
    confirm(global, orchestrator.config(), &plan)?;

    let progress = spinner(global);
    let report = orchestrator.run(&plan).await;
    if let Some(progress) = progress {
        progress.finish_and_clear();
    }

    let color = output::should_color(global.color);
    let out = output::render_single(global.output, &report, |r| detail(r, color))?;
    output::print_output(&out, global.quiet);

    into_result(report)
}

/// Ask before touching the devices, but only when someone can answer.
fn confirm(global: &GlobalOpts, deployment: &DeploymentConfig, plan: &StagePlan) -> Result<(), CliError> {
    if global.yes || !io::stdin().is_terminal() {
        return Ok(());
    }

    let [first, second] = &deployment.devices;
    let stages: Vec<String> = plan.stages().iter().map(ToString::to_string).collect();
    let proceed = Confirm::new()
        .with_prompt(format!(
            "Run {} on {first} and {second}?",
            stages.join(", ")
        ))
        .default(false)
        .interact()
        .map_err(prompt_err)?;

    if proceed {
        Ok(())
    } else {
        Err(CliError::Validation {
            field: "confirmation".into(),
            reason: "run aborted".into(),
        })
    }
}

fn spinner(global: &GlobalOpts) -> Option<ProgressBar> {
    if global.quiet || global.verbose > 0 || !io::stderr().is_terminal() {
        return None;
    }
    let progress = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg} [{elapsed}]") {
        progress.set_style(style);
    }
    progress.set_message("deploying HA pair");
    progress.enable_steady_tick(Duration::from_millis(120));
    Some(progress)
}

fn detail(report: &RunReport, color: bool) -> String {
    let rows: Vec<StageRow> = report
        .planned
        .iter()
        .map(|&stage| {
            let (text, good) = if report.completed.contains(&stage) {
                ("done", Some(true))
            } else if report.failed_stage == Some(stage) {
                ("failed", Some(false))
            } else {
                ("not run", None)
            };
            StageRow {
                ordinal: stage.ordinal(),
                stage: stage.to_string(),
                status: output::status(text, good, color),
            }
        })
        .collect();

    let mut out = output::render_table(&rows);
    let good = match report.outcome {
        RunOutcome::Succeeded => Some(true),
        RunOutcome::Failed => Some(false),
        RunOutcome::CommittedUnsynced => None,
    };
    let _ = write!(
        out,
        "\n\nOutcome:  {}",
        output::status(&report.outcome.to_string(), good, color)
    );
    if let (Some(active), Some(passive)) = (&report.active, &report.passive) {
        let _ = write!(out, "\nActive:   {active}\nPassive:  {passive}");
    }
    if !report.payloads_applied.is_empty() {
        let kinds: Vec<String> = report
            .payloads_applied
            .iter()
            .map(ToString::to_string)
            .collect();
        let _ = write!(out, "\nApplied:  {}", kinds.join(", "));
    }
    if let Some(ref job) = report.commit_job {
        let _ = write!(out, "\nCommit:   job {} on {} ({:?})", job.job_id, job.host, job.status);
    }
    if let Some(ref sync) = report.sync {
        let state = sync.last_state.as_deref().unwrap_or("unknown");
        let _ = write!(out, "\nSync:     {state} after {} polls", sync.polls);
    }
    if let Some(ref error) = report.error {
        let _ = write!(out, "\nError:    {error}");
    }
    out
}

fn into_result(report: RunReport) -> Result<(), CliError> {
    match report.outcome {
        RunOutcome::Succeeded => Ok(()),
        RunOutcome::CommittedUnsynced => Err(CliError::CommittedUnsynced {
            host: report.active.unwrap_or_default(),
            last_state: report
                .sync
                .and_then(|s| s.last_state)
                .unwrap_or_else(|| "unknown".into()),
        }),
        RunOutcome::Failed => report.failure.map_or(Ok(()), |failure| Err(failure.into())),
    }
}
