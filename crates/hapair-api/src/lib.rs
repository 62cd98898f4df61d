// hapair-api: Async Rust client for the firewall XML device-management API

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod ops;
pub mod request;
pub mod response;
pub mod transport;

pub use client::DeviceClient;
pub use error::Error;
pub use models::{HaStateReport, JobState, JobStatus};
pub use request::{ConfigAction, JobId, OpCommand, XPath};
pub use response::{ApiResponse, ResponseStatus};
pub use transport::{TlsMode, TransportConfig};
