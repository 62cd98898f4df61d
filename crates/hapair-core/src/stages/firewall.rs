// Firewall configurator
//
// Applies the six configuration payloads to the active device, in order.
// All payloads are loaded before the first request so a missing document
// never leaves the device half-configured. The first rejection stops the
// stage; nothing already accepted is rolled back, and `applied` keeps the
// kinds the device took so the report can name them.

use tracing::{error, info};

use super::StageEnv;
use crate::error::CoreError;
use crate::model::DevicePair;
use crate::payload::{self, PayloadKind, PayloadSource};

pub async fn configure_firewall(
    env: StageEnv<'_>,
    pair: &DevicePair,
    source: &dyn PayloadSource,
    applied: &mut Vec<PayloadKind>,
) -> Result<(), CoreError> {
    let active = pair.active().ok_or_else(|| CoreError::RolesUnresolved {
        reason: "firewall configuration requires one active and one passive device".into(),
    })?;
    let host = active.host();

    let payloads = payload::load_all(source)?;
    let key = env.sessions.key(host)?;

    for payload in &payloads {
        let kind = payload.kind();
        let xpath = kind.xpath()?;
        let result = env
            .run
            .guard(
                env.client
                    .set_config(active.base_url(), key, &xpath, payload.element()),
            )
            .await?;

        if let Err(e) = result {
            let err = CoreError::rejected(host, kind.as_ref(), e);
            error!(host, payload = %kind, error = %err, "payload rejected");
            return Err(err);
        }
        info!(host, payload = %kind, "payload applied");
        applied.push(kind);
    }

    Ok(())
}
