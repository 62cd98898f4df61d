// ── Run orchestration ──
//
// Sequences the stages selected for this invocation, threads the session
// store and device roles between them, and folds the result into a
// `RunReport`. A stage either completes or halts the run; nothing after a
// failed stage is attempted.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use hapair_api::DeviceClient;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, info_span};

use crate::config::DeploymentConfig;
use crate::discovery::{self, DeviceStatus};
use crate::error::{CoreError, StageFailure};
use crate::model::{CommitJob, DevicePair};
use crate::payload::{PayloadKind, PayloadSource};
use crate::poll::RunContext;
use crate::session::SessionStore;
use crate::stages::authenticate::authenticate;
use crate::stages::commit::{CommitSyncReport, SyncReport, commit_and_sync};
use crate::stages::firewall::configure_firewall;
use crate::stages::ha_group::configure_ha_group;
use crate::stages::ha_interfaces::enable_ha_interfaces;
use crate::stages::roles::{ResolvedRoles, resolve_roles};
use crate::stages::{Stage, StageEnv};

// ── StagePlan ───────────────────────────────────────────────────────

/// The stages one invocation runs, in execution order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagePlan {
    stages: Vec<Stage>,
}

impl StagePlan {
    /// Every stage.
    pub fn full() -> Self {
        Self {
            stages: Stage::ALL.to_vec(),
        }
    }

    /// The contiguous range `from..=to`, plus the stages it depends on.
    ///
    /// Authentication always runs because sessions never outlive a run.
    /// Role resolution is added in front of firewall configuration or
    /// commit & sync, because roles are never carried over from an
    /// earlier run either.
    pub fn range(from: Stage, to: Stage) -> Result<Self, CoreError> {
        if from > to {
            return Err(CoreError::InvalidPlan {
                reason: format!("stage range {from}..{to} is empty"),
            });
        }

        Ok(Self {
            stages: Self::with_dependencies(|stage| stage >= from && stage <= to),
        })
    }

    fn with_dependencies(selected: impl Fn(Stage) -> bool) -> Vec<Stage> {
        let needs_roles = selected(Stage::FirewallConfig) || selected(Stage::CommitSync);
        Stage::ALL
            .into_iter()
            .filter(|&stage| {
                selected(stage)
                    || stage == Stage::Authenticate
                    || (stage == Stage::ResolveRoles && needs_roles)
            })
            .collect()
    }

    /// A single stage and its dependencies.
    pub fn only(stage: Stage) -> Self {
        Self {
            stages: Self::with_dependencies(|s| s == stage),
        }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn contains(&self, stage: Stage) -> bool {
        self.stages.contains(&stage)
    }
}

// ── RunReport ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RunOutcome {
    Succeeded,
    Failed,
    /// The commit finished on the active device but the peer did not
    /// report synchronized within the sync budget.
    CommittedUnsynced,
}

/// Structured result of a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub outcome: RunOutcome,
    /// Stages selected for this run.
    pub planned: Vec<Stage>,
    pub completed: Vec<Stage>,
    pub failed_stage: Option<Stage>,
    pub error: Option<String>,
    pub active: Option<String>,
    pub passive: Option<String>,
    pub payloads_applied: Vec<PayloadKind>,
    pub commit_job: Option<CommitJob>,
    pub sync: Option<SyncReport>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    #[serde(skip)]
    pub failure: Option<StageFailure>,
}

impl RunReport {
    /// The last stage that completed, if any.
    pub fn last_completed(&self) -> Option<Stage> {
        self.completed.last().copied()
    }

    pub fn is_success(&self) -> bool {
        self.outcome == RunOutcome::Succeeded
    }
}

// ── Orchestrator ────────────────────────────────────────────────────

/// Drives a deployment of one HA pair.
pub struct Orchestrator {
    config: DeploymentConfig,
    client: DeviceClient,
    payloads: Arc<dyn PayloadSource>,
    cancel: CancellationToken,
}

/// State carried from one stage to the next.
struct Progress {
    pair: DevicePair,
    sessions: SessionStore,
    roles: Option<ResolvedRoles>,
    applied: Vec<PayloadKind>,
    commit: Option<CommitSyncReport>,
}

impl Orchestrator {
    /// Build an orchestrator with an HTTP client from `config.transport`.
    pub fn new(
        config: DeploymentConfig,
        payloads: Arc<dyn PayloadSource>,
    ) -> Result<Self, CoreError> {
        let client =
            DeviceClient::new(&config.transport).map_err(|e| CoreError::InvalidPlan {
                reason: format!("HTTP client: {e}"),
            })?;
        Ok(Self::with_client(config, client, payloads))
    }

    pub fn with_client(
        config: DeploymentConfig,
        client: DeviceClient,
        payloads: Arc<dyn PayloadSource>,
    ) -> Self {
        Self {
            config,
            client,
            payloads,
            cancel: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &DeploymentConfig {
        &self.config
    }

    /// Token that cancels an in-flight run (e.g. on Ctrl-C).
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn pair(&self) -> Result<DevicePair, CoreError> {
        let [first, second] = self.config.devices.clone();
        DevicePair::new(first, second)
    }

    /// Run the planned stages in order and report the outcome.
    pub async fn run(&self, plan: &StagePlan) -> RunReport {
        let started_at = Utc::now();
        let run = RunContext::new(self.cancel.clone(), self.config.deadline);
        info!(stages = ?plan.stages(), "deployment started");

        let mut completed = Vec::new();
        let mut failure = None;
        let mut progress = None;

        match self.pair() {
            Ok(pair) => {
                let state = progress.insert(Progress {
                    pair,
                    sessions: SessionStore::new(),
                    roles: None,
                    applied: Vec::new(),
                    commit: None,
                });
                for &stage in plan.stages() {
                    let span = info_span!("stage", stage = %stage);
                    let result = async {
                        info!("stage started");
                        self.execute(stage, &run, state).await
                    }
                    .instrument(span)
                    .await;

                    match result {
                        Ok(()) => {
                            info!(%stage, "stage completed");
                            completed.push(stage);
                        }
                        Err(err) => {
                            error!(%stage, host = err.host().unwrap_or("-"), error = %err, "stage failed");
                            failure = Some(StageFailure::new(stage, err));
                            break;
                        }
                    }
                }
            }
            Err(err) => {
                let stage = plan.stages().first().copied().unwrap_or(Stage::Authenticate);
                failure = Some(StageFailure::new(stage, err));
            }
        }

        let (roles, applied, commit) = progress
            .map(|p| (p.roles, p.applied, p.commit))
            .unwrap_or_default();

        let outcome = match (&failure, &commit) {
            (Some(_), _) => RunOutcome::Failed,
            (None, Some(report)) if !report.sync.synchronized => RunOutcome::CommittedUnsynced,
            (None, _) => RunOutcome::Succeeded,
        };
        info!(%outcome, "deployment finished");

        RunReport {
            outcome,
            planned: plan.stages().to_vec(),
            completed,
            failed_stage: failure.as_ref().map(|f| f.stage),
            error: failure.as_ref().map(|f| f.error.to_string()),
            active: roles.as_ref().map(|r| r.active.clone()),
            passive: roles.as_ref().map(|r| r.passive.clone()),
            payloads_applied: applied,
            commit_job: commit.as_ref().and_then(|c| c.commit.clone()),
            sync: commit.map(|c| c.sync),
            started_at,
            finished_at: Utc::now(),
            failure,
        }
    }

    async fn execute(
        &self,
        stage: Stage,
        run: &RunContext,
        state: &mut Progress,
    ) -> Result<(), CoreError> {
        let config = &self.config;

        if stage == Stage::Authenticate {
            state.sessions = authenticate(&self.client, run, &state.pair, &config.credentials).await?;
            return Ok(());
        }

        let env = StageEnv {
            client: &self.client,
            run,
            sessions: &state.sessions,
        };

        match stage {
            Stage::Authenticate => {}
            Stage::HaInterfaces => {
                enable_ha_interfaces(env, &state.pair, &config.ha, config.commit).await?;
            }
            Stage::HaGroup => {
                configure_ha_group(env, &state.pair, &config.ha, config.commit).await?;
            }
            Stage::ResolveRoles => {
                state.roles = Some(resolve_roles(env, &mut state.pair, config.roles).await?);
            }
            Stage::FirewallConfig => {
                configure_firewall(env, &state.pair, self.payloads.as_ref(), &mut state.applied)
                    .await?;
            }
            Stage::CommitSync => {
                state.commit =
                    Some(commit_and_sync(env, &state.pair, config.commit, config.sync).await?);
            }
        }
        Ok(())
    }

    /// Authenticate and take a read-only snapshot of both devices.
    pub async fn discover(&self) -> Result<[DeviceStatus; 2], StageFailure> {
        let run = RunContext::new(self.cancel.clone(), self.config.deadline);
        let pair = self
            .pair()
            .map_err(|e| StageFailure::new(Stage::Authenticate, e))?;
        let sessions = authenticate(&self.client, &run, &pair, &self.config.credentials)
            .await
            .map_err(|e| StageFailure::new(Stage::Authenticate, e))?;

        let env = StageEnv {
            client: &self.client,
            run: &run,
            sessions: &sessions,
        };
        discovery::discover(env, &pair, &self.config.ha)
            .await
            .map_err(|e| StageFailure::new(Stage::HaInterfaces, e))
    }
}
