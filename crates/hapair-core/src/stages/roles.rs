// Active-role resolver
//
// Polls both devices' runtime HA state until exactly one reports active and
// the other passive. The transitions live in `RoleResolver`, which never
// touches the network or the clock; `resolve_roles` feeds it observations.

use std::fmt;

use tracing::{debug, info, warn};

use super::StageEnv;
use crate::error::CoreError;
use crate::model::{DeviceEndpoint, DevicePair, HaRoleState, PairSlot};
use crate::poll::PollBudget;

// ── State machine ───────────────────────────────────────────────────

/// Where role resolution stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RolePoll {
    Unresolved,
    Polling { round: u32 },
    Resolved { active: PairSlot, round: u32 },
    TimedOut { rounds: u32 },
}

/// Pure role-resolution state machine.
#[derive(Debug, Clone)]
pub struct RoleResolver {
    state: RolePoll,
    max_rounds: u32,
    last: Option<[HaRoleState; 2]>,
}

impl RoleResolver {
    pub fn new(max_rounds: u32) -> Self {
        Self {
            state: RolePoll::Unresolved,
            max_rounds,
            last: None,
        }
    }

    pub fn state(&self) -> RolePoll {
        self.state
    }

    /// States observed in the most recent round.
    pub fn last_observed(&self) -> Option<[HaRoleState; 2]> {
        self.last
    }

    /// Start the next round. Returns its number, or `None` once resolved,
    /// timed out, or out of rounds.
    pub fn begin_round(&mut self) -> Option<u32> {
        let next = match self.state {
            RolePoll::Unresolved => 1,
            RolePoll::Polling { round } => round + 1,
            RolePoll::Resolved { .. } | RolePoll::TimedOut { .. } => return None,
        };
        if next > self.max_rounds {
            self.state = RolePoll::TimedOut {
                rounds: self.max_rounds,
            };
            return None;
        }
        self.state = RolePoll::Polling { round: next };
        Some(next)
    }

    /// Record one round's observation, `[first, second]`.
    ///
    /// Resolves only on exactly one active and one passive device. When the
    /// last permitted round does not resolve, the resolver times out.
    pub fn observe(&mut self, observed: [HaRoleState; 2]) -> RolePoll {
        let RolePoll::Polling { round } = self.state else {
            return self.state;
        };
        self.last = Some(observed);

        self.state = match exclusive_active(observed) {
            Some(active) => RolePoll::Resolved { active, round },
            None if round >= self.max_rounds => RolePoll::TimedOut { rounds: round },
            None => RolePoll::Polling { round },
        };
        self.state
    }
}

/// The active slot when the pair is exactly one active plus one passive.
pub fn exclusive_active(observed: [HaRoleState; 2]) -> Option<PairSlot> {
    match observed {
        [HaRoleState::Active, HaRoleState::Passive] => Some(PairSlot::First),
        [HaRoleState::Passive, HaRoleState::Active] => Some(PairSlot::Second),
        _ => None,
    }
}

// ── Stage ───────────────────────────────────────────────────────────

/// The resolved pair roles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRoles {
    pub active: String,
    pub passive: String,
    pub rounds: u32,
}

impl fmt::Display for ResolvedRoles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "active={} passive={}", self.active, self.passive)
    }
}

/// Poll both devices until roles settle, then record them on `pair`.
///
/// Errors on a single round (device unreachable, command refused) count as
/// an unresolved round rather than failing the stage.
pub async fn resolve_roles(
    env: StageEnv<'_>,
    pair: &mut DevicePair,
    budget: PollBudget,
) -> Result<ResolvedRoles, CoreError> {
    let mut resolver = RoleResolver::new(budget.max_polls);

    while let Some(round) = resolver.begin_round() {
        let (first, second) = tokio::join!(
            observe(env, pair.endpoint(PairSlot::First)),
            observe(env, pair.endpoint(PairSlot::Second)),
        );
        let observed = [first?, second?];
        debug!(round, first = %observed[0], second = %observed[1], "HA roles observed");

        match resolver.observe(observed) {
            RolePoll::Resolved { active, round } => {
                pair.assign_roles(active);
                let resolved = ResolvedRoles {
                    active: pair.endpoint(active).host().to_owned(),
                    passive: pair.endpoint(active.other()).host().to_owned(),
                    rounds: round,
                };
                info!(round, %resolved, "HA roles resolved");
                return Ok(resolved);
            }
            RolePoll::TimedOut { .. } => break,
            RolePoll::Unresolved | RolePoll::Polling { .. } => {
                env.run.pause(budget.interval).await?;
            }
        }
    }

    let last = resolver.last_observed().map_or_else(
        || "nothing".to_owned(),
        |[a, b]| {
            format!(
                "{}={a}, {}={b}",
                pair.endpoint(PairSlot::First).host(),
                pair.endpoint(PairSlot::Second).host()
            )
        },
    );
    let rounds = match resolver.state() {
        RolePoll::TimedOut { rounds } => rounds,
        _ => budget.max_polls,
    };
    Err(CoreError::RoleResolutionTimeout { rounds, last })
}

/// One device's role this round. Only run-control errors propagate.
async fn observe(env: StageEnv<'_>, endpoint: &DeviceEndpoint) -> Result<HaRoleState, CoreError> {
    let host = endpoint.host();
    let key = env.sessions.key(host)?;
    match env
        .run
        .guard(env.client.ha_state(endpoint.base_url(), key))
        .await?
    {
        Ok(report) if report.enabled => Ok(HaRoleState::from_device(report.local_state.as_deref())),
        Ok(_) => {
            debug!(host, "HA not enabled yet");
            Ok(HaRoleState::Unknown)
        }
        Err(e) => {
            warn!(host, error = %e, "HA state unavailable");
            Ok(HaRoleState::Unknown)
        }
    }
}
