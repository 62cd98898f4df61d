// Typed request builders
//
// Every call the client makes is described by an `ApiRequest`, which renders
// itself into the form parameters the device expects. Structural paths and
// operational commands are built from typed segments instead of formatted
// strings, so a malformed path cannot be constructed from user input.

use std::fmt;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Name of the single device entry on a standalone appliance.
const DEVICE_ENTRY: &str = "localhost.localdomain";

// ── XPath ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Node(&'static str),
    Entry { node: &'static str, name: String },
}

/// A structural path into the device configuration tree.
///
/// Node names are compile-time constants; only `entry[@name='..']`
/// selectors carry runtime values, and those are validated on insertion.
///
/// ```
/// use hapair_api::XPath;
///
/// let xpath = XPath::device()
///     .child("network")
///     .child("interface")
///     .child("ethernet")
///     .entry("entry", "ethernet1/4")
///     .unwrap();
/// assert_eq!(
///     xpath.to_string(),
///     "/config/devices/entry[@name='localhost.localdomain']/network/interface/ethernet/entry[@name='ethernet1/4']"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XPath {
    segments: Vec<Segment>,
}

impl XPath {
    /// `/config/devices/entry[@name='localhost.localdomain']`
    pub fn device() -> Self {
        Self {
            segments: vec![
                Segment::Node("config"),
                Segment::Node("devices"),
                Segment::Entry {
                    node: "entry",
                    name: DEVICE_ENTRY.into(),
                },
            ],
        }
    }

    /// The device root scoped to a virtual system, e.g. `vsys1`.
    pub fn vsys(name: &str) -> Result<Self, Error> {
        Self::device().child("vsys").entry("entry", name)
    }

    /// Append a plain node segment.
    pub fn child(mut self, node: &'static str) -> Self {
        self.segments.push(Segment::Node(node));
        self
    }

    /// Append a `node[@name='name']` selector.
    ///
    /// Names may not be empty and may not contain quotes or markup, since
    /// they are embedded in a quoted predicate.
    pub fn entry(mut self, node: &'static str, name: &str) -> Result<Self, Error> {
        validate_entry_name(name)?;
        self.segments.push(Segment::Entry {
            node,
            name: name.to_owned(),
        });
        Ok(self)
    }
}

fn validate_entry_name(name: &str) -> Result<(), Error> {
    let reason = if name.is_empty() {
        Some("name is empty")
    } else if name.contains(['\'', '"']) {
        Some("name contains a quote")
    } else if name.contains(['<', '>', '&', '[', ']']) {
        Some("name contains markup or predicate characters")
    } else if name.chars().any(char::is_control) {
        Some("name contains control characters")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(Error::InvalidXPath {
            name: name.to_owned(),
            reason,
        }),
        None => Ok(()),
    }
}

impl fmt::Display for XPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            match segment {
                Segment::Node(node) => write!(f, "/{node}")?,
                Segment::Entry { node, name } => write!(f, "/{node}[@name='{name}']")?,
            }
        }
        Ok(())
    }
}

// ── Jobs ─────────────────────────────────────────────────────────────

/// Identifier of an asynchronous device job (commit, sync, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ── Operational commands ─────────────────────────────────────────────

/// Operational commands understood by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCommand {
    /// `show high-availability state`
    ShowHaState,
    /// `show jobs id <id>`
    ShowJob(JobId),
    /// `request high-availability sync-to-remote running-config`
    SyncRunningConfigToPeer,
}

impl OpCommand {
    /// Render the command as the nested element document the device expects.
    pub fn to_xml(&self) -> String {
        match self {
            Self::ShowHaState => nest(&["show", "high-availability", "state"], None),
            Self::ShowJob(id) => nest(&["show", "jobs", "id"], Some(&id.to_string())),
            Self::SyncRunningConfigToPeer => nest(
                &[
                    "request",
                    "high-availability",
                    "sync-to-remote",
                    "running-config",
                ],
                None,
            ),
        }
    }
}

/// `["a", "b"]` + `Some("v")` → `<a><b>v</b></a>`
fn nest(path: &[&str], value: Option<&str>) -> String {
    let mut out = String::new();
    for node in path {
        out.push('<');
        out.push_str(node);
        out.push('>');
    }
    if let Some(value) = value {
        out.push_str(value);
    }
    for node in path.iter().rev() {
        out.push_str("</");
        out.push_str(node);
        out.push('>');
    }
    out
}

// ── Requests ─────────────────────────────────────────────────────────

/// Configuration actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigAction {
    /// Read the candidate configuration at an xpath.
    Get,
    /// Merge an element into the candidate configuration.
    Set,
    /// Replace the element at an xpath.
    Edit,
}

impl ConfigAction {
    fn as_str(self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Set => "set",
            Self::Edit => "edit",
        }
    }
}

/// One request against the device API.
#[derive(Debug)]
pub(crate) enum ApiRequest<'a> {
    Keygen {
        username: &'a str,
        password: &'a SecretString,
    },
    Config {
        action: ConfigAction,
        xpath: &'a XPath,
        element: Option<&'a str>,
    },
    Op(OpCommand),
    Commit,
}

impl ApiRequest<'_> {
    /// Short label for logs. Never includes secrets.
    pub(crate) fn label(&self) -> String {
        match self {
            Self::Keygen { username, .. } => format!("keygen user={username}"),
            Self::Config { action, xpath, .. } => format!("config {} {xpath}", action.as_str()),
            Self::Op(cmd) => format!("op {}", cmd.to_xml()),
            Self::Commit => "commit".into(),
        }
    }

    /// Form parameters for the request body.
    pub(crate) fn form(&self) -> Vec<(&'static str, String)> {
        match self {
            Self::Keygen { username, password } => vec![
                ("type", "keygen".into()),
                ("user", (*username).to_owned()),
                ("password", password.expose_secret().to_owned()),
            ],
            Self::Config {
                action,
                xpath,
                element,
            } => {
                let mut form = vec![
                    ("type", "config".into()),
                    ("action", action.as_str().into()),
                    ("xpath", xpath.to_string()),
                ];
                if let Some(element) = element {
                    form.push(("element", (*element).to_owned()));
                }
                form
            }
            Self::Op(cmd) => vec![("type", "op".into()), ("cmd", cmd.to_xml())],
            Self::Commit => vec![("type", "commit".into()), ("cmd", nest(&["commit"], None))],
        }
    }
}
