// ── Deployment stages ──
//
// One module per stage. Each stage is an async function over a `StageEnv`
// that either completes or returns the first fatal `CoreError`; sequencing
// and reporting live in the orchestrator.

pub mod authenticate;
pub mod commit;
pub mod firewall;
pub mod ha_group;
pub mod ha_interfaces;
pub mod roles;

use hapair_api::DeviceClient;
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::error::CoreError;
use crate::poll::RunContext;
use crate::session::SessionStore;

/// The fixed stage sequence, in execution order.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::AsRefStr,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Stage {
    Authenticate,
    HaInterfaces,
    HaGroup,
    ResolveRoles,
    FirewallConfig,
    CommitSync,
}

impl Stage {
    pub const ALL: [Self; 6] = [
        Self::Authenticate,
        Self::HaInterfaces,
        Self::HaGroup,
        Self::ResolveRoles,
        Self::FirewallConfig,
        Self::CommitSync,
    ];

    /// Zero-based position in the sequence.
    pub fn ordinal(self) -> u8 {
        match self {
            Self::Authenticate => 0,
            Self::HaInterfaces => 1,
            Self::HaGroup => 2,
            Self::ResolveRoles => 3,
            Self::FirewallConfig => 4,
            Self::CommitSync => 5,
        }
    }
}

/// What every post-authentication stage works with.
#[derive(Debug, Clone, Copy)]
pub struct StageEnv<'a> {
    pub client: &'a DeviceClient,
    pub run: &'a RunContext,
    pub sessions: &'a SessionStore,
}

/// Combine the results of the same step on both devices.
///
/// Both results are inspected: when both devices fail, the second failure
/// is logged and the first is returned.
pub(crate) fn both<T>(
    first: Result<T, CoreError>,
    second: Result<T, CoreError>,
) -> Result<(T, T), CoreError> {
    match (first, second) {
        (Ok(a), Ok(b)) => Ok((a, b)),
        (Err(e), Ok(_)) | (Ok(_), Err(e)) => Err(e),
        (Err(e), Err(other)) => {
            error!(error = %other, "second device also failed");
            Err(e)
        }
    }
}
