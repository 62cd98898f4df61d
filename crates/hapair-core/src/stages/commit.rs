// Commit & sync orchestrator
//
// Commits the candidate configuration on the active device, waits for the
// job to finish, then waits for the running configuration to reach the
// passive peer. A commit that never finishes is fatal; a sync that never
// completes is reported but is not an error, since the configuration is
// already live on the active device.

use hapair_api::{JobId, JobState};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::StageEnv;
use crate::error::CoreError;
use crate::model::{CommitJob, DeviceEndpoint, DevicePair};
use crate::poll::PollBudget;

// ── Sync state ──────────────────────────────────────────────────────

/// Running-config synchronization as reported by the active device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Synchronized,
    NotSynchronized,
    InProgress,
    Unknown,
}

impl SyncState {
    pub fn from_device(state: Option<&str>) -> Self {
        match state.map(str::trim) {
            Some("synchronized") => Self::Synchronized,
            Some("not synchronized") => Self::NotSynchronized,
            Some(s) if s.contains("progress") || s == "syncing" => Self::InProgress,
            _ => Self::Unknown,
        }
    }
}

/// How synchronization ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub synchronized: bool,
    pub polls: u32,
    /// Last `running-sync` text seen, verbatim.
    pub last_state: Option<String>,
    /// Whether a sync-to-peer request was sent.
    pub requested: bool,
}

/// Outcome of the commit & sync stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitSyncReport {
    /// `None` when the device had nothing to commit.
    pub commit: Option<CommitJob>,
    pub sync: SyncReport,
}

// ── Stage ───────────────────────────────────────────────────────────

pub async fn commit_and_sync(
    env: StageEnv<'_>,
    pair: &DevicePair,
    commit_budget: PollBudget,
    sync_budget: PollBudget,
) -> Result<CommitSyncReport, CoreError> {
    let active = pair.active().ok_or_else(|| CoreError::RolesUnresolved {
        reason: "no active device to commit on".into(),
    })?;

    let commit = commit_device(env, active, commit_budget).await?;
    let sync = await_sync(env, active, sync_budget).await?;
    if !sync.synchronized {
        warn!(
            host = active.host(),
            polls = sync.polls,
            last_state = sync.last_state.as_deref().unwrap_or("unknown"),
            "committed but peer is not synchronized"
        );
    }
    Ok(CommitSyncReport { commit, sync })
}

/// Commit on one device and wait for the job.
pub(crate) async fn commit_device(
    env: StageEnv<'_>,
    endpoint: &DeviceEndpoint,
    budget: PollBudget,
) -> Result<Option<CommitJob>, CoreError> {
    let host = endpoint.host();
    let key = env.sessions.key(host)?;

    let job = env
        .run
        .guard(env.client.commit(endpoint.base_url(), key))
        .await?
        .map_err(|e| CoreError::device(host, e))?;

    let Some(job_id) = job else {
        info!(host, "nothing to commit");
        return Ok(None);
    };
    info!(host, %job_id, "commit started");
    await_job(env, endpoint, job_id, budget).await.map(Some)
}

async fn await_job(
    env: StageEnv<'_>,
    endpoint: &DeviceEndpoint,
    job_id: JobId,
    budget: PollBudget,
) -> Result<CommitJob, CoreError> {
    let host = endpoint.host();
    let key = env.sessions.key(host)?;

    for poll in 1..=budget.max_polls {
        match env
            .run
            .guard(env.client.job_status(endpoint.base_url(), key, job_id))
            .await?
        {
            Ok(status) => match status.state {
                JobState::Succeeded => {
                    info!(host, %job_id, "commit finished");
                    return Ok(CommitJob::observed(host, status));
                }
                JobState::Failed => {
                    let message = status.summary();
                    error!(host, %job_id, %message, "commit failed");
                    return Err(CoreError::CommitFailed {
                        host: host.to_owned(),
                        job_id,
                        message,
                    });
                }
                JobState::Pending | JobState::Running => {
                    debug!(host, %job_id, progress = status.progress, poll, "commit in progress");
                }
            },
            Err(e) if e.is_transient() => {
                warn!(host, %job_id, poll, error = %e, "job status unavailable");
            }
            Err(e) => return Err(CoreError::device(host, e)),
        }

        if poll < budget.max_polls {
            env.run.pause(budget.interval).await?;
        }
    }

    Err(CoreError::CommitTimeout {
        host: host.to_owned(),
        job_id,
        polls: budget.max_polls,
    })
}

async fn await_sync(
    env: StageEnv<'_>,
    endpoint: &DeviceEndpoint,
    budget: PollBudget,
) -> Result<SyncReport, CoreError> {
    let host = endpoint.host();
    let key = env.sessions.key(host)?;
    let mut requested = false;
    let mut last_state = None;

    for poll in 1..=budget.max_polls {
        match env
            .run
            .guard(env.client.ha_state(endpoint.base_url(), key))
            .await?
        {
            Ok(report) => {
                let state = SyncState::from_device(report.running_sync.as_deref());
                last_state = report.running_sync;
                debug!(host, poll, ?state, "running-config sync");

                match state {
                    SyncState::Synchronized => {
                        info!(host, poll, "peer synchronized");
                        return Ok(SyncReport {
                            synchronized: true,
                            polls: poll,
                            last_state,
                            requested,
                        });
                    }
                    SyncState::NotSynchronized if !requested => {
                        match env
                            .run
                            .guard(env.client.sync_to_peer(endpoint.base_url(), key))
                            .await?
                        {
                            Ok(()) => {
                                info!(host, "sync to peer requested");
                                requested = true;
                            }
                            Err(e) => warn!(host, error = %e, "sync request failed"),
                        }
                    }
                    _ => {}
                }
            }
            Err(e) => warn!(host, poll, error = %e, "HA state unavailable"),
        }

        if poll < budget.max_polls {
            env.run.pause(budget.interval).await?;
        }
    }

    Ok(SyncReport {
        synchronized: false,
        polls: budget.max_polls,
        last_state,
        requested,
    })
}
