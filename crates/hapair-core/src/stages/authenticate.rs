// Authenticator
//
// Exchanges the shared credentials for an API key on both devices at once.
// There is no retry: bad credentials do not get better by asking again.

use hapair_api::DeviceClient;
use tracing::{debug, info};

use super::both;
use crate::error::CoreError;
use crate::model::{Credentials, DeviceEndpoint, DevicePair, PairSlot};
use crate::poll::RunContext;
use crate::session::{Session, SessionStore};

/// Issue a session for each device of the pair.
///
/// Either both devices authenticate or the stage fails.
pub async fn authenticate(
    client: &DeviceClient,
    run: &RunContext,
    pair: &DevicePair,
    credentials: &Credentials,
) -> Result<SessionStore, CoreError> {
    let (first, second) = tokio::join!(
        issue(client, run, pair.endpoint(PairSlot::First), credentials),
        issue(client, run, pair.endpoint(PairSlot::Second), credentials),
    );
    let (first, second) = both(first, second)?;

    let mut sessions = SessionStore::new();
    sessions.insert(first)?;
    sessions.insert(second)?;
    info!(devices = sessions.len(), "sessions established");
    Ok(sessions)
}

async fn issue(
    client: &DeviceClient,
    run: &RunContext,
    endpoint: &DeviceEndpoint,
    credentials: &Credentials,
) -> Result<Session, CoreError> {
    debug!(host = endpoint.host(), username = %credentials.username, "requesting API key");
    let key = run
        .guard(client.generate_key(
            endpoint.base_url(),
            &credentials.username,
            &credentials.password,
        ))
        .await?
        .map_err(|e| CoreError::device(endpoint.host(), e))?;
    Ok(Session::new(endpoint.host(), key))
}
