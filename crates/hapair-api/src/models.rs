// Typed views over operational responses.
//
// These are deliberately thin: the device's own vocabulary is kept as
// strings where the core owns the interpretation (HA role names), and
// normalized into enums where the client can decide alone (job state).

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::request::JobId;
use crate::response::ApiResponse;

// ── HA state ─────────────────────────────────────────────────────────

/// Result of `show high-availability state`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HaStateReport {
    /// Whether HA is enabled at all.
    pub enabled: bool,
    /// Local running state: `active`, `passive`, `initial`, `non-functional`, ...
    pub local_state: Option<String>,
    /// The peer's state as seen from this device.
    pub peer_state: Option<String>,
    /// Running-config sync state: `synchronized`, `not synchronized`, ...
    pub running_sync: Option<String>,
}

impl HaStateReport {
    pub(crate) fn from_response(resp: &ApiResponse) -> Result<Self, Error> {
        let doc = resp.document()?;
        let root = doc.root_element();
        let text = |path: &str| crate::response::find_text(root, path);

        Ok(Self {
            enabled: text("result/enabled").is_some_and(|v| v == "yes"),
            local_state: text("group/local-info/state"),
            peer_state: text("group/peer-info/state"),
            running_sync: text("group/running-sync"),
        })
    }
}

// ── Jobs ─────────────────────────────────────────────────────────────

/// Normalized job lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Map the device's `status` / `result` pair.
    ///
    /// `FIN` with anything other than `OK` is a failure; `ACT` is running;
    /// `PEND` and unknown statuses are pending.
    fn from_device(status: &str, result: Option<&str>) -> Self {
        match (status, result) {
            ("FIN", Some("OK")) => Self::Succeeded,
            ("FIN", _) => Self::Failed,
            ("ACT", _) => Self::Running,
            _ => Self::Pending,
        }
    }
}

/// Result of `show jobs id <id>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatus {
    pub id: JobId,
    pub state: JobState,
    /// Completion percentage reported by the device (0-100).
    pub progress: u8,
    /// Detail lines, e.g. commit warnings or the failure reason.
    pub details: Vec<String>,
}

impl JobStatus {
    pub(crate) fn from_response(id: JobId, resp: &ApiResponse) -> Result<Self, Error> {
        let doc = resp.document()?;
        let root = doc.root_element();
        let job = crate::response::find_node(root, "job").ok_or_else(|| Error::Malformed {
            message: format!("no <job> element for job {id}"),
            body: resp.body().chars().take(200).collect(),
        })?;

        let status = crate::response::find_text(job, "status").unwrap_or_default();
        let result = crate::response::find_text(job, "result");
        let progress = crate::response::find_text(job, "progress")
            .and_then(|p| p.parse::<u8>().ok())
            .unwrap_or(0);

        let details = crate::response::find_node(job, "details")
            .map(|details| {
                details
                    .children()
                    .filter(|c| c.is_element() && c.has_tag_name("line"))
                    .filter_map(|line| {
                        let text: String = line
                            .descendants()
                            .filter(roxmltree::Node::is_text)
                            .filter_map(|n| n.text())
                            .collect();
                        let text = text.trim();
                        (!text.is_empty()).then(|| text.to_owned())
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            id,
            state: JobState::from_device(&status, result.as_deref()),
            progress,
            details,
        })
    }

    /// Detail lines joined for display, falling back to a generic message.
    pub fn summary(&self) -> String {
        if self.details.is_empty() {
            format!("job {} {:?}", self.id, self.state)
        } else {
            self.details.join("; ")
        }
    }
}

/// Extract the job id from a commit response.
///
/// Returns `None` when the device accepted the request but enqueued no job
/// (nothing to commit).
pub(crate) fn commit_job_id(resp: &ApiResponse) -> Result<Option<JobId>, Error> {
    match resp.find_text("result/job")? {
        Some(raw) => raw.parse::<u64>().map(|id| Some(JobId(id))).map_err(|_| {
            Error::Malformed {
                message: format!("non-numeric job id {raw:?}"),
                body: resp.body().chars().take(200).collect(),
            }
        }),
        None => Ok(None),
    }
}
