//! Deployment logic for a firewall HA pair.
//!
//! Takes two factory-fresh (or partially configured) devices to a
//! synchronized active-passive pair through a fixed stage sequence:
//!
//! - **[`stages::authenticate`]** issues one API key per device into a
//!   [`SessionStore`].
//! - **[`stages::ha_interfaces`]** and **[`stages::ha_group`]** push the
//!   [`HaPlan`] to both devices and activate it.
//! - **[`stages::roles`]** polls until exactly one device is active.
//! - **[`stages::firewall`]** applies the [`PayloadSource`] documents to the
//!   active device only.
//! - **[`stages::commit`]** commits and waits for the passive peer to sync.
//!
//! [`Orchestrator`] runs a [`StagePlan`] and returns a [`RunReport`]. All
//! waiting goes through [`RunContext`], so a run can be cancelled or bounded
//! by a deadline.

pub mod config;
pub mod discovery;
pub mod error;
pub mod ha;
pub mod model;
pub mod orchestrator;
pub mod payload;
pub mod poll;
pub mod session;
pub mod stages;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::DeploymentConfig;
pub use discovery::DeviceStatus;
pub use error::{CoreError, StageFailure};
pub use ha::{HaNode, HaNodeSummary, HaPlan, HaSettings};
pub use model::{CommitJob, Credentials, DeviceEndpoint, DevicePair, HaRoleState, PairSlot};
pub use orchestrator::{Orchestrator, RunOutcome, RunReport, StagePlan};
pub use payload::{ConfigPayload, PayloadDir, PayloadKind, PayloadSource};
pub use poll::{PollBudget, RunContext};
pub use session::{Session, SessionStore};
pub use stages::Stage;
pub use stages::commit::SyncReport;
