// HA group configurator
//
// Pushes the HA enable flag, the active-passive group definition, and the
// HA1/HA2 link settings to both devices, then commits on both so the pair
// starts electing. Every element is a `set` merge, so re-applying the same
// plan leaves the candidate configuration unchanged.

use hapair_api::XPath;
use tracing::{debug, info};

use super::commit::commit_device;
use super::{StageEnv, both};
use crate::error::CoreError;
use crate::ha::{self, HA_ENABLED_ELEMENT, HaPlan};
use crate::model::{CommitJob, DeviceEndpoint, DevicePair, PairSlot};
use crate::poll::PollBudget;

/// Configure and (optionally) activate HA on both devices.
///
/// Returns the activation commit jobs, `None` where a device had nothing
/// to commit or activation is disabled.
pub async fn configure_ha_group(
    env: StageEnv<'_>,
    pair: &DevicePair,
    plan: &HaPlan,
    commit_budget: PollBudget,
) -> Result<[Option<CommitJob>; 2], CoreError> {
    let (first, second) = tokio::join!(
        push(env, pair.endpoint(PairSlot::First), plan, PairSlot::First),
        push(env, pair.endpoint(PairSlot::Second), plan, PairSlot::Second),
    );
    both(first, second)?;

    if !plan.settings().activate {
        info!("HA configuration pushed; activation commit disabled");
        return Ok([None, None]);
    }

    info!("activating HA configuration on both devices");
    let (first, second) = tokio::join!(
        commit_device(env, pair.endpoint(PairSlot::First), commit_budget),
        commit_device(env, pair.endpoint(PairSlot::Second), commit_budget),
    );
    let (first, second) = both(first, second)?;
    Ok([first, second])
}

async fn push(
    env: StageEnv<'_>,
    endpoint: &DeviceEndpoint,
    plan: &HaPlan,
    slot: PairSlot,
) -> Result<(), CoreError> {
    set(env, endpoint, &ha::ha_root_xpath(), HA_ENABLED_ELEMENT, "ha-enable").await?;
    set(
        env,
        endpoint,
        &ha::ha_group_xpath(),
        &plan.group_element(slot),
        "ha-group",
    )
    .await?;
    set(
        env,
        endpoint,
        &ha::ha_interface_xpath(),
        &plan.interface_element(slot),
        "ha-links",
    )
    .await?;

    let node = plan.node(slot);
    info!(
        host = endpoint.host(),
        ha1_ip = %node.ha1_ip,
        peer_ip = %plan.peer_ip(slot),
        priority = node.priority,
        "HA group configured"
    );
    Ok(())
}

async fn set(
    env: StageEnv<'_>,
    endpoint: &DeviceEndpoint,
    xpath: &XPath,
    element: &str,
    label: &str,
) -> Result<(), CoreError> {
    let host = endpoint.host();
    let key = env.sessions.key(host)?;
    debug!(host, payload = label, "set");
    env.run
        .guard(env.client.set_config(endpoint.base_url(), key, xpath, element))
        .await?
        .map_err(|e| CoreError::rejected(host, label, e))?;
    Ok(())
}
