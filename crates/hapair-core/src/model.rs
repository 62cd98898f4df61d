// ── Device pair domain model ──
//
// The two endpoints of an HA pair, the credentials shared by both, and the
// runtime HA role each device reports once role resolution has run.

use std::fmt;

use hapair_api::{JobId, JobState, JobStatus};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::CoreError;

// ── DeviceEndpoint ──────────────────────────────────────────────────

/// A device's management address. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceEndpoint {
    host: String,
    base_url: Url,
}

impl DeviceEndpoint {
    /// Endpoint reached at `https://{host}/`.
    pub fn new(host: impl Into<String>) -> Result<Self, CoreError> {
        let host = host.into();
        let base_url = Url::parse(&format!("https://{host}/")).map_err(|e| {
            CoreError::InvalidPlan {
                reason: format!("invalid device host {host:?}: {e}"),
            }
        })?;
        Ok(Self { host, base_url })
    }

    /// Endpoint whose management API lives at `base_url` rather than the
    /// host's default HTTPS address (port forwards, lab proxies, tests).
    pub fn with_base_url(host: impl Into<String>, base_url: Url) -> Self {
        Self {
            host: host.into(),
            base_url,
        }
    }

    /// The logical host name used in logs, sessions, and reports.
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

impl fmt::Display for DeviceEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.host)
    }
}

/// Management credentials, shared by both devices of the pair.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

// ── HA roles ────────────────────────────────────────────────────────

/// Runtime HA role of one device.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum HaRoleState {
    #[default]
    Unknown,
    Active,
    Passive,
    NonFunctional,
}

impl HaRoleState {
    /// Map the device's local state string. Anything that is not a settled
    /// role (`initial`, `suspended`, missing, ...) is `Unknown`.
    pub fn from_device(state: Option<&str>) -> Self {
        match state.map(str::trim) {
            Some("active") => Self::Active,
            Some("passive") => Self::Passive,
            Some("non-functional") => Self::NonFunctional,
            _ => Self::Unknown,
        }
    }
}

/// Position of a device within the pair, in configuration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairSlot {
    First,
    Second,
}

impl PairSlot {
    pub const BOTH: [Self; 2] = [Self::First, Self::Second];

    pub fn other(self) -> Self {
        match self {
            Self::First => Self::Second,
            Self::Second => Self::First,
        }
    }

    fn index(self) -> usize {
        match self {
            Self::First => 0,
            Self::Second => 1,
        }
    }
}

// ── DevicePair ──────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct PairMember {
    endpoint: DeviceEndpoint,
    role: HaRoleState,
}

/// Exactly two devices and their resolved roles.
#[derive(Debug, Clone)]
pub struct DevicePair {
    members: [PairMember; 2],
}

impl DevicePair {
    pub fn new(first: DeviceEndpoint, second: DeviceEndpoint) -> Result<Self, CoreError> {
        if first.host() == second.host() {
            return Err(CoreError::InvalidPlan {
                reason: format!("both devices are {}", first.host()),
            });
        }
        Ok(Self {
            members: [first, second].map(|endpoint| PairMember {
                endpoint,
                role: HaRoleState::Unknown,
            }),
        })
    }

    pub fn endpoint(&self, slot: PairSlot) -> &DeviceEndpoint {
        &self.members[slot.index()].endpoint
    }

    pub fn role(&self, slot: PairSlot) -> HaRoleState {
        self.members[slot.index()].role
    }

    /// Record the outcome of role resolution.
    pub(crate) fn assign_roles(&mut self, active: PairSlot) {
        self.members[active.index()].role = HaRoleState::Active;
        self.members[active.other().index()].role = HaRoleState::Passive;
    }

    /// The active device, present only while exactly one device is active
    /// and the other passive.
    pub fn active(&self) -> Option<&DeviceEndpoint> {
        self.slot_of(HaRoleState::Active).map(|slot| self.endpoint(slot))
    }

    pub fn passive(&self) -> Option<&DeviceEndpoint> {
        self.slot_of(HaRoleState::Passive).map(|slot| self.endpoint(slot))
    }

    fn slot_of(&self, role: HaRoleState) -> Option<PairSlot> {
        let exclusive = match (self.role(PairSlot::First), self.role(PairSlot::Second)) {
            (HaRoleState::Active, HaRoleState::Passive) => Some(PairSlot::First),
            (HaRoleState::Passive, HaRoleState::Active) => Some(PairSlot::Second),
            _ => None,
        }?;
        match role {
            HaRoleState::Active => Some(exclusive),
            HaRoleState::Passive => Some(exclusive.other()),
            _ => None,
        }
    }
}

// ── CommitJob ───────────────────────────────────────────────────────

/// A commit job on one device, as last observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitJob {
    pub host: String,
    pub job_id: JobId,
    pub status: JobState,
    pub progress: u8,
    pub details: Vec<String>,
}

impl CommitJob {
    pub(crate) fn observed(host: &str, status: JobStatus) -> Self {
        Self {
            host: host.to_owned(),
            job_id: status.id,
            status: status.state,
            progress: status.progress,
            details: status.details,
        }
    }
}
