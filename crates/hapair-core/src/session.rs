// ── Session store ──
//
// API keys issued by the authentication stage, keyed by device host.
// Written once per host, read by every later stage, dropped with the run.
// Nothing here is ever persisted.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use secrecy::SecretString;

use crate::error::CoreError;

/// An API key issued by one device.
#[derive(Debug, Clone)]
pub struct Session {
    pub host: String,
    pub api_key: SecretString,
    pub issued_at: DateTime<Utc>,
}

impl Session {
    pub fn new(host: impl Into<String>, api_key: SecretString) -> Self {
        Self {
            host: host.into(),
            api_key,
            issued_at: Utc::now(),
        }
    }
}

/// Per-host sessions for the current run.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: HashMap<String, Session>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a session. A host can be written only once.
    pub fn insert(&mut self, session: Session) -> Result<(), CoreError> {
        if self.sessions.contains_key(&session.host) {
            return Err(CoreError::DuplicateSession { host: session.host });
        }
        self.sessions.insert(session.host.clone(), session);
        Ok(())
    }

    pub fn get(&self, host: &str) -> Result<&Session, CoreError> {
        self.sessions
            .get(host)
            .ok_or_else(|| CoreError::MissingSession {
                host: host.to_owned(),
            })
    }

    /// The API key for `host`.
    pub fn key(&self, host: &str) -> Result<&SecretString, CoreError> {
        self.get(host).map(|s| &s.api_key)
    }

    pub fn contains(&self, host: &str) -> bool {
        self.sessions.contains_key(host)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
