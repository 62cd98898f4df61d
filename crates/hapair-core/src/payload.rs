// ── Firewall configuration payloads ──
//
// Rendered XML elements for the active device, one per configuration
// domain. The templating step that fills in network values lives outside
// this crate; a `PayloadSource` only hands over its finished output.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use hapair_api::XPath;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Virtual system holding zones and rulebases.
const VSYS: &str = "vsys1";
/// Virtual router receiving interfaces and static routes.
const VIRTUAL_ROUTER: &str = "default";

// ── PayloadKind ─────────────────────────────────────────────────────

/// A configuration domain, each with a fixed location on the device.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::AsRefStr,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum PayloadKind {
    Interfaces,
    Zones,
    VirtualRouter,
    StaticRoutes,
    Nat,
    SecurityPolicy,
}

impl PayloadKind {
    /// The order payloads are applied in. Later domains reference objects
    /// created by earlier ones.
    pub const APPLY_ORDER: [Self; 6] = [
        Self::Interfaces,
        Self::Zones,
        Self::VirtualRouter,
        Self::StaticRoutes,
        Self::Nat,
        Self::SecurityPolicy,
    ];

    /// File name read by [`PayloadDir`].
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Interfaces => "interfaces.xml",
            Self::Zones => "zones.xml",
            Self::VirtualRouter => "virtual-router.xml",
            Self::StaticRoutes => "static-routes.xml",
            Self::Nat => "nat.xml",
            Self::SecurityPolicy => "security-policy.xml",
        }
    }

    /// Where the payload is `set` on the device.
    pub fn xpath(self) -> Result<XPath, CoreError> {
        let xpath = match self {
            Self::Interfaces => Ok(XPath::device()
                .child("network")
                .child("interface")
                .child("ethernet")),
            Self::Zones => XPath::vsys(VSYS).map(|p| p.child("zone")),
            Self::VirtualRouter => virtual_router(),
            Self::StaticRoutes => virtual_router().map(|p| {
                p.child("routing-table")
                    .child("ip")
                    .child("static-route")
            }),
            Self::Nat => XPath::vsys(VSYS).map(|p| p.child("rulebase").child("nat").child("rules")),
            Self::SecurityPolicy => {
                XPath::vsys(VSYS).map(|p| p.child("rulebase").child("security").child("rules"))
            }
        };
        xpath.map_err(|e| CoreError::InvalidPlan {
            reason: format!("{self} path: {e}"),
        })
    }
}

fn virtual_router() -> Result<XPath, hapair_api::Error> {
    XPath::device()
        .child("network")
        .child("virtual-router")
        .entry("entry", VIRTUAL_ROUTER)
}

// ── ConfigPayload ───────────────────────────────────────────────────

/// A rendered element, ready to send. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigPayload {
    kind: PayloadKind,
    element: String,
}

impl ConfigPayload {
    pub fn new(kind: PayloadKind, element: impl Into<String>) -> Result<Self, CoreError> {
        let element = element.into();
        let trimmed = element.trim();
        if trimmed.is_empty() {
            return Err(CoreError::PayloadNotReady {
                kind,
                reason: "document is empty".into(),
            });
        }
        Ok(Self {
            kind,
            element: trimmed.to_owned(),
        })
    }

    pub fn kind(&self) -> PayloadKind {
        self.kind
    }

    pub fn element(&self) -> &str {
        &self.element
    }
}

// ── Sources ─────────────────────────────────────────────────────────

/// Supplies rendered payloads to the firewall stage.
pub trait PayloadSource: Send + Sync {
    fn load(&self, kind: PayloadKind) -> Result<ConfigPayload, CoreError>;
}

/// Load every payload in apply order, failing on the first one not ready.
pub fn load_all(source: &dyn PayloadSource) -> Result<Vec<ConfigPayload>, CoreError> {
    PayloadKind::APPLY_ORDER
        .iter()
        .map(|kind| source.load(*kind))
        .collect()
}

/// Rendered documents in a directory, one file per [`PayloadKind`].
#[derive(Debug, Clone)]
pub struct PayloadDir {
    root: PathBuf,
}

impl PayloadDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_of(&self, kind: PayloadKind) -> PathBuf {
        self.root.join(kind.file_name())
    }
}

impl PayloadSource for PayloadDir {
    fn load(&self, kind: PayloadKind) -> Result<ConfigPayload, CoreError> {
        let path = self.path_of(kind);
        let element = std::fs::read_to_string(&path).map_err(|e| CoreError::PayloadNotReady {
            kind,
            reason: format!("{}: {e}", path.display()),
        })?;
        ConfigPayload::new(kind, element)
    }
}

impl PayloadSource for HashMap<PayloadKind, String> {
    fn load(&self, kind: PayloadKind) -> Result<ConfigPayload, CoreError> {
        let element = self.get(&kind).ok_or_else(|| CoreError::PayloadNotReady {
            kind,
            reason: "no document supplied".into(),
        })?;
        ConfigPayload::new(kind, element.as_str())
    }
}
