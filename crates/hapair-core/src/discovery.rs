// ── Discovery ──
//
// A read-only snapshot of where each device stands: HA enabled, which HA
// ports are marked, the roles each side reports, and config sync. Nothing
// is written to the devices.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::error::CoreError;
use crate::ha::HaPlan;
use crate::model::{DeviceEndpoint, DevicePair, HaRoleState, PairSlot};
use crate::stages::ha_interfaces::is_marked;
use crate::stages::{StageEnv, both};

/// Observed state of one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceStatus {
    pub host: String,
    pub ha_enabled: bool,
    /// HA1/HA2 port name to whether it carries the HA marker.
    pub ha_interfaces: BTreeMap<String, bool>,
    pub local_state: HaRoleState,
    pub peer_state: HaRoleState,
    pub running_sync: Option<String>,
}

pub async fn discover(
    env: StageEnv<'_>,
    pair: &DevicePair,
    plan: &HaPlan,
) -> Result<[DeviceStatus; 2], CoreError> {
    let (first, second) = tokio::join!(
        status_of(env, pair.endpoint(PairSlot::First), plan),
        status_of(env, pair.endpoint(PairSlot::Second), plan),
    );
    let (first, second) = both(first, second)?;
    Ok([first, second])
}

async fn status_of(
    env: StageEnv<'_>,
    endpoint: &DeviceEndpoint,
    plan: &HaPlan,
) -> Result<DeviceStatus, CoreError> {
    let host = endpoint.host();
    let key = env.sessions.key(host)?;

    let report = env
        .run
        .guard(env.client.ha_state(endpoint.base_url(), key))
        .await?
        .map_err(|e| CoreError::device(host, e))?;

    let mut ha_interfaces = BTreeMap::new();
    for port in plan.ha_ports() {
        let marked = is_marked(env, endpoint, port).await?;
        ha_interfaces.insert(port.to_owned(), marked);
    }
    debug!(host, enabled = report.enabled, "device discovered");

    Ok(DeviceStatus {
        host: host.to_owned(),
        ha_enabled: report.enabled,
        ha_interfaces,
        local_state: HaRoleState::from_device(report.local_state.as_deref()),
        peer_state: HaRoleState::from_device(report.peer_state.as_deref()),
        running_sync: report.running_sync,
    })
}
