// HA interface enabler
//
// Marks the HA1 and HA2 ports as HA interfaces on both devices. A port that
// already carries the marker is left alone, so running the stage twice
// changes nothing the second time. A device whose ports were newly marked
// commits them, unless HA activation is switched off in the plan.

use tracing::{debug, info};

use super::commit::commit_device;
use super::{StageEnv, both};
use crate::error::CoreError;
use crate::ha::{self, HA_INTERFACE_MARKER, HaPlan};
use crate::model::{CommitJob, DeviceEndpoint, DevicePair, PairSlot};
use crate::poll::PollBudget;

/// Ports newly marked on one device, and the commit that made them live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceChanges {
    pub host: String,
    pub marked: Vec<String>,
    pub commit: Option<CommitJob>,
}

pub async fn enable_ha_interfaces(
    env: StageEnv<'_>,
    pair: &DevicePair,
    plan: &HaPlan,
    commit_budget: PollBudget,
) -> Result<[InterfaceChanges; 2], CoreError> {
    let (first, second) = tokio::join!(
        enable_on(env, pair.endpoint(PairSlot::First), plan, commit_budget),
        enable_on(env, pair.endpoint(PairSlot::Second), plan, commit_budget),
    );
    let (first, second) = both(first, second)?;
    Ok([first, second])
}

async fn enable_on(
    env: StageEnv<'_>,
    endpoint: &DeviceEndpoint,
    plan: &HaPlan,
    commit_budget: PollBudget,
) -> Result<InterfaceChanges, CoreError> {
    let host = endpoint.host();
    let mut marked = Vec::new();

    for port in plan.ha_ports() {
        if is_marked(env, endpoint, port).await? {
            debug!(host, port, "already an HA interface");
            continue;
        }

        let key = env.sessions.key(host)?;
        let xpath = ha::interface_xpath(port)?;
        env.run
            .guard(
                env.client
                    .set_config(endpoint.base_url(), key, &xpath, HA_INTERFACE_MARKER),
            )
            .await?
            .map_err(|e| CoreError::rejected(host, "ha-interface", e))?;
        info!(host, port, "marked as HA interface");
        marked.push(port.to_owned());
    }

    let commit = if marked.is_empty() || !plan.settings().activate {
        None
    } else {
        commit_device(env, endpoint, commit_budget).await?
    };

    Ok(InterfaceChanges {
        host: host.to_owned(),
        marked,
        commit,
    })
}

/// Whether `port` already carries the HA marker. A port with no
/// configuration entry yet is unmarked.
pub(crate) async fn is_marked(
    env: StageEnv<'_>,
    endpoint: &DeviceEndpoint,
    port: &str,
) -> Result<bool, CoreError> {
    let host = endpoint.host();
    let key = env.sessions.key(host)?;
    let xpath = ha::interface_xpath(port)?;

    match env
        .run
        .guard(env.client.get_config(endpoint.base_url(), key, &xpath))
        .await?
    {
        Ok(resp) => resp
            .contains("ha")
            .map_err(|e| CoreError::device(host, e)),
        Err(e) if e.is_not_found() => Ok(false),
        Err(e) => Err(CoreError::device(host, e)),
    }
}
