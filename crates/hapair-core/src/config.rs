// ── Deployment configuration ──
//
// Everything a run needs, already validated. Built by the config crate (or
// tests) and handed in; core never reads configuration files.

use std::time::Duration;

use hapair_api::TransportConfig;

use crate::ha::HaPlan;
use crate::model::{Credentials, DeviceEndpoint};
use crate::poll::PollBudget;

/// Configuration for one deployment of one pair.
#[derive(Debug, Clone)]
pub struct DeploymentConfig {
    pub devices: [DeviceEndpoint; 2],
    pub credentials: Credentials,
    pub ha: HaPlan,
    pub transport: TransportConfig,
    pub roles: PollBudget,
    pub commit: PollBudget,
    pub sync: PollBudget,
    /// Upper bound on the whole run; `None` relies on the poll budgets.
    pub deadline: Option<Duration>,
}
