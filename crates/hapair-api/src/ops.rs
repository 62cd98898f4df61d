// Operational commands, commits, and job status.

use secrecy::SecretString;
use tracing::debug;
use url::Url;

use crate::client::DeviceClient;
use crate::error::Error;
use crate::models::{self, HaStateReport, JobStatus};
use crate::request::{ApiRequest, JobId, OpCommand};
use crate::response::ApiResponse;

impl DeviceClient {
    /// Run an operational command and return the raw envelope.
    pub async fn op(
        &self,
        base: &Url,
        key: &SecretString,
        command: OpCommand,
    ) -> Result<ApiResponse, Error> {
        self.send(base, Some(key), &ApiRequest::Op(command))
            .await?
            .into_result(|message, code| Error::Command { message, code })
    }

    /// `show high-availability state`, decoded.
    pub async fn ha_state(&self, base: &Url, key: &SecretString) -> Result<HaStateReport, Error> {
        let resp = self.op(base, key, OpCommand::ShowHaState).await?;
        HaStateReport::from_response(&resp)
    }

    /// Ask the device to push its running config to the HA peer.
    pub async fn sync_to_peer(&self, base: &Url, key: &SecretString) -> Result<(), Error> {
        self.op(base, key, OpCommand::SyncRunningConfigToPeer)
            .await
            .map(|_| ())
    }

    /// Enqueue a commit of the candidate configuration.
    ///
    /// Returns `None` when the device reports nothing to commit.
    pub async fn commit(&self, base: &Url, key: &SecretString) -> Result<Option<JobId>, Error> {
        let resp = self
            .send(base, Some(key), &ApiRequest::Commit)
            .await?
            .into_result(|message, code| Error::Command { message, code })?;
        let job = models::commit_job_id(&resp)?;
        match job {
            Some(id) => debug!(host = base.host_str().unwrap_or_default(), %id, "commit enqueued"),
            None => debug!(
                host = base.host_str().unwrap_or_default(),
                message = resp.message().unwrap_or_default(),
                "commit enqueued no job"
            ),
        }
        Ok(job)
    }

    /// Current status of a device job.
    pub async fn job_status(
        &self,
        base: &Url,
        key: &SecretString,
        id: JobId,
    ) -> Result<JobStatus, Error> {
        let resp = self.op(base, key, OpCommand::ShowJob(id)).await?;
        JobStatus::from_response(id, &resp)
    }
}
