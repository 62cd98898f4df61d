//! Configuration for hapair.
//!
//! TOML file plus `HAPAIR_*` environment, credential resolution (env +
//! keyring + plaintext), and translation to `hapair_core::DeploymentConfig`.
//! The binary layers its command-line overrides on top before translating.

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use hapair_api::{TlsMode, TransportConfig};
use hapair_core::{
    Credentials, DeploymentConfig, DeviceEndpoint, HaNode, HaPlan, HaSettings, PayloadDir,
    PollBudget,
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const KEYRING_SERVICE: &str = "hapair";
const ENV_PREFIX: &str = "HAPAIR_";
const REDACTED: &str = "********";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no password found for user '{username}'")]
    NoCredentials { username: String },

    #[error("configuration file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// The two devices of the pair, in a fixed order.
    #[serde(default)]
    pub devices: Vec<DeviceEntry>,

    /// Management username, shared by both devices.
    pub username: Option<String>,

    /// Password (plaintext, prefer keyring or `HAPAIR_PASSWORD`).
    pub password: Option<String>,

    #[serde(default)]
    pub ha: HaSection,

    /// Directory holding the rendered firewall payload documents.
    #[serde(default = "default_payload_dir")]
    pub payload_dir: PathBuf,

    #[serde(default)]
    pub tls: TlsSection,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default = "default_roles")]
    pub roles: PollSection,

    #[serde(default = "default_commit")]
    pub commit: PollSection,

    #[serde(default = "default_sync")]
    pub sync: PollSection,

    /// Upper bound on a whole run, in seconds.
    pub deadline_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            devices: Vec::new(),
            username: None,
            password: None,
            ha: HaSection::default(),
            payload_dir: default_payload_dir(),
            tls: TlsSection::default(),
            timeout: default_timeout(),
            roles: default_roles(),
            commit: default_commit(),
            sync: default_sync(),
            deadline_secs: None,
        }
    }
}

/// One device's management address.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DeviceEntry {
    /// Host name or address; names the device in logs and reports.
    pub host: String,

    /// Explicit API base URL. Defaults to `https://{host}/`.
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HaSection {
    #[serde(default = "default_group_id")]
    pub group_id: u8,

    #[serde(default = "default_ha1_port")]
    pub ha1_port: String,

    #[serde(default = "default_ha2_port")]
    pub ha2_port: String,

    #[serde(default = "default_netmask")]
    pub ha1_netmask: Ipv4Addr,

    #[serde(default)]
    pub link_monitoring: Vec<String>,

    /// Commit the HA configuration on both devices once pushed.
    #[serde(default = "default_true")]
    pub activate_ha: bool,

    /// HA1 address and election settings, in device order.
    #[serde(default = "HaNode::default_pair")]
    pub nodes: [HaNode; 2],
}

impl Default for HaSection {
    fn default() -> Self {
        let settings = HaSettings::default();
        Self {
            group_id: settings.group_id,
            ha1_port: settings.ha1_port,
            ha2_port: settings.ha2_port,
            ha1_netmask: settings.ha1_netmask,
            link_monitoring: settings.link_monitoring,
            activate_ha: settings.activate,
            nodes: HaNode::default_pair(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TlsSection {
    /// Accept any certificate. Factory-default appliances are self-signed.
    #[serde(default)]
    pub insecure: bool,

    /// PEM file with the CA that signed the device certificates.
    pub ca_cert: Option<PathBuf>,
}

/// A polling budget: wait `interval_secs` between at most `max_polls` polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct PollSection {
    pub interval_secs: u64,
    pub max_polls: u32,
}

impl From<PollBudget> for PollSection {
    fn from(budget: PollBudget) -> Self {
        Self {
            interval_secs: budget.interval.as_secs(),
            max_polls: budget.max_polls,
        }
    }
}

fn default_payload_dir() -> PathBuf {
    PathBuf::from("payloads")
}
fn default_timeout() -> u64 {
    30
}
fn default_roles() -> PollSection {
    PollBudget::roles().into()
}
fn default_commit() -> PollSection {
    PollBudget::commit().into()
}
fn default_sync() -> PollSection {
    PollBudget::sync().into()
}
fn default_group_id() -> u8 {
    HaSettings::default().group_id
}
fn default_ha1_port() -> String {
    HaSettings::default().ha1_port
}
fn default_ha2_port() -> String {
    HaSettings::default().ha2_port
}
fn default_netmask() -> Ipv4Addr {
    HaSettings::default().ha1_netmask
}
fn default_true() -> bool {
    true
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "hapair", "hapair").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("hapair");
    p
}

/// The system keyring entry holding `username`'s password.
pub fn keyring_entry(username: &str) -> keyring::Result<keyring::Entry> {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{username}/password"))
}

// ── Config loading ──────────────────────────────────────────────────

/// Layered provider: defaults, then the TOML file, then `HAPAIR_*`.
///
/// Nested keys use a double underscore (`HAPAIR_ROLES__MAX_POLLS`). The
/// password is never read through here; see [`Config::resolve_credentials`].
pub fn provider(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).ignore(&["password"]).split("__"))
}

/// Load the config from `path`, or from [`config_path`] when `None`.
///
/// An explicitly named file must exist. The default location may be
/// absent, in which case defaults and the environment apply.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = match path {
        Some(path) if !path.exists() => {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }
        Some(path) => path.to_path_buf(),
        None => config_path(),
    };

    let config: Config = provider(&path).extract()?;
    Ok(config)
}

// ── Translation ─────────────────────────────────────────────────────

impl Config {
    /// Check everything that does not need a secret.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let [first, second] = self.device_entries()?;
        if first.host == second.host {
            return Err(invalid(
                "devices",
                format!("both entries name {}", first.host),
            ));
        }
        for entry in [first, second] {
            endpoint(entry)?;
        }

        if self.username.as_deref().is_none_or(str::is_empty) {
            return Err(invalid("username", "a management username is required"));
        }
        if self.timeout == 0 {
            return Err(invalid("timeout", "must be at least 1 second"));
        }
        if self.deadline_secs == Some(0) {
            return Err(invalid("deadline_secs", "must be at least 1 second"));
        }
        for (field, section) in [
            ("roles", &self.roles),
            ("commit", &self.commit),
            ("sync", &self.sync),
        ] {
            if section.max_polls == 0 {
                return Err(invalid(field, "max_polls must be at least 1"));
            }
        }

        self.ha_plan()?;
        Ok(())
    }

    fn device_entries(&self) -> Result<[&DeviceEntry; 2], ConfigError> {
        match self.devices.as_slice() {
            [first, second] => Ok([first, second]),
            other => Err(invalid(
                "devices",
                format!("expected exactly 2 devices, found {}", other.len()),
            )),
        }
    }

    /// Build the HA plan from the `[ha]` section.
    pub fn ha_plan(&self) -> Result<HaPlan, ConfigError> {
        let ha = &self.ha;
        let settings = HaSettings {
            group_id: ha.group_id,
            ha1_port: ha.ha1_port.clone(),
            ha2_port: ha.ha2_port.clone(),
            ha1_netmask: ha.ha1_netmask,
            link_monitoring: ha.link_monitoring.clone(),
            activate: ha.activate_ha,
        };
        let [first, second] = ha.nodes;
        HaPlan::new(settings, first, second).map_err(|e| invalid("ha", e.to_string()))
    }

    /// The two device endpoints, in configured order.
    pub fn endpoints(&self) -> Result<[DeviceEndpoint; 2], ConfigError> {
        let [first, second] = self.device_entries()?;
        Ok([endpoint(first)?, endpoint(second)?])
    }

    pub fn transport(&self) -> TransportConfig {
        let tls = if self.tls.insecure {
            TlsMode::DangerAcceptInvalid
        } else if let Some(ref ca_path) = self.tls.ca_cert {
            TlsMode::CustomCa(ca_path.clone())
        } else {
            TlsMode::DangerAcceptInvalid // factory-default appliances are self-signed
        };

        TransportConfig {
            tls,
            timeout: Duration::from_secs(self.timeout),
        }
    }

    pub fn payload_source(&self) -> PayloadDir {
        PayloadDir::new(&self.payload_dir)
    }

    /// Resolve the management password.
    ///
    /// Order: `HAPAIR_PASSWORD`, the system keyring entry
    /// `hapair` / `{username}/password`, then `password` in the file.
    pub fn resolve_credentials(&self) -> Result<Credentials, ConfigError> {
        let username = self
            .username
            .clone()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| invalid("username", "a management username is required"))?;

        // 1. Env var
        if let Ok(pw) = std::env::var("HAPAIR_PASSWORD") {
            return Ok(Credentials {
                username,
                password: SecretString::from(pw),
            });
        }

        // 2. Keyring
        if let Ok(entry) = keyring_entry(&username) {
            if let Ok(pw) = entry.get_password() {
                return Ok(Credentials {
                    username,
                    password: SecretString::from(pw),
                });
            }
        }

        // 3. Plaintext in config
        if let Some(ref pw) = self.password {
            return Ok(Credentials {
                username,
                password: SecretString::from(pw.clone()),
            });
        }

        Err(ConfigError::NoCredentials { username })
    }

    /// Validate, resolve credentials, and build the core configuration.
    pub fn to_deployment_config(&self) -> Result<DeploymentConfig, ConfigError> {
        self.validate()?;

        Ok(DeploymentConfig {
            devices: self.endpoints()?,
            credentials: self.resolve_credentials()?,
            ha: self.ha_plan()?,
            transport: self.transport(),
            roles: budget(self.roles),
            commit: budget(self.commit),
            sync: budget(self.sync),
            deadline: self.deadline_secs.map(Duration::from_secs),
        })
    }

    /// A copy safe to print: the plaintext password is masked.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.password.is_some() {
            copy.password = Some(REDACTED.into());
        }
        copy
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

fn endpoint(entry: &DeviceEntry) -> Result<DeviceEndpoint, ConfigError> {
    match entry.url {
        Some(ref raw) => {
            let url: url::Url = raw
                .parse()
                .map_err(|_| invalid("devices.url", format!("invalid URL: {raw}")))?;
            Ok(DeviceEndpoint::with_base_url(entry.host.clone(), url))
        }
        None => DeviceEndpoint::new(entry.host.clone())
            .map_err(|e| invalid("devices.host", e.to_string())),
    }
}

fn budget(section: PollSection) -> PollBudget {
    PollBudget::new(Duration::from_secs(section.interval_secs), section.max_polls)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io::Write;

    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    use super::*;

    const MINIMAL: &str = r#"
username = "admin"
password = "from-file"

[[devices]]
host = "10.0.0.1"

[[devices]]
host = "10.0.0.2"
url = "https://10.0.0.2:8443/"
"#;

    fn write(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn parse(contents: &str) -> Config {
        let file = write(contents);
        load_config(Some(file.path())).unwrap()
    }

    #[test]
    fn defaults_fill_unset_sections() {
        let config = parse(MINIMAL);
        assert_eq!(config.timeout, 30);
        assert_eq!(config.roles, PollSection { interval_secs: 10, max_polls: 30 });
        assert_eq!(config.commit, PollSection { interval_secs: 15, max_polls: 40 });
        assert_eq!(config.sync, PollSection { interval_secs: 15, max_polls: 8 });
        assert_eq!(config.ha.ha1_port, "ethernet1/4");
        assert!(config.ha.activate_ha);
        assert_eq!(config.payload_dir, PathBuf::from("payloads"));
        assert_eq!(config.deadline_secs, None);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let err = load_config(Some(Path::new("/nonexistent/hapair.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
    }

    #[test]
    fn device_urls_default_to_https_host() {
        let [first, second] = parse(MINIMAL).endpoints().unwrap();
        assert_eq!(first.base_url().as_str(), "https://10.0.0.1/");
        assert_eq!(second.base_url().as_str(), "https://10.0.0.2:8443/");
        assert_eq!(second.host(), "10.0.0.2");
    }

    #[test]
    fn ha_section_overrides_plan() {
        let config = parse(&format!(
            "{MINIMAL}
[ha]
group_id = 7
ha1_port = \"ethernet1/6\"
ha2_port = \"ethernet1/7\"
activate_ha = false
nodes = [
  {{ ha1_ip = \"10.10.10.1\", priority = 50, preemptive = true }},
  {{ ha1_ip = \"10.10.10.2\", priority = 60, preemptive = false }},
]
"
        ));
        let plan = config.ha_plan().unwrap();
        assert_eq!(plan.settings().group_id, 7);
        assert_eq!(plan.ha_ports(), ["ethernet1/6", "ethernet1/7"]);
        assert!(!plan.settings().activate);
        assert_eq!(plan.peer_ip(hapair_core::PairSlot::First).to_string(), "10.10.10.2");
    }

    #[test]
    fn one_device_is_rejected() {
        let config = parse(
            r#"
username = "admin"
[[devices]]
host = "10.0.0.1"
"#,
        );
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "devices"));
    }

    #[test]
    fn duplicate_hosts_are_rejected() {
        let mut config = parse(MINIMAL);
        config.devices[1].host = "10.0.0.1".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_poll_budget_is_rejected() {
        let mut config = parse(MINIMAL);
        config.sync.max_polls = 0;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "sync"));
    }

    #[test]
    fn inconsistent_ha_plan_is_a_validation_error() {
        let mut config = parse(MINIMAL);
        config.ha.ha2_port = config.ha.ha1_port.clone();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "ha"));
    }

    #[test]
    fn missing_username_is_rejected() {
        let mut config = parse(MINIMAL);
        config.username = None;
        assert!(config.validate().is_err());
    }

    #[test]
    fn redaction_masks_password_only() {
        let config = parse(MINIMAL).redacted();
        assert_eq!(config.password.as_deref(), Some(REDACTED));
        assert_eq!(config.username.as_deref(), Some("admin"));
        assert!(!config.to_toml().unwrap().contains("from-file"));
    }

    #[test]
    fn deployment_config_carries_budgets_and_deadline() {
        let mut config = parse(MINIMAL);
        config.deadline_secs = Some(600);
        config.roles = PollSection { interval_secs: 2, max_polls: 5 };
        config.tls.insecure = true;

        // The password may come from the environment or keyring on a
        // developer machine; only its presence matters here.
        let deployment = config.to_deployment_config().unwrap();
        assert_eq!(deployment.deadline, Some(Duration::from_secs(600)));
        assert_eq!(deployment.roles, PollBudget::new(Duration::from_secs(2), 5));
        assert_eq!(deployment.transport.tls, TlsMode::DangerAcceptInvalid);
        assert_eq!(deployment.credentials.username, "admin");
        assert!(!deployment.credentials.password.expose_secret().is_empty());
    }

    #[test]
    fn custom_ca_is_used_when_not_insecure() {
        let mut config = parse(MINIMAL);
        config.tls.ca_cert = Some(PathBuf::from("/etc/hapair/ca.pem"));
        assert_eq!(
            config.transport().tls,
            TlsMode::CustomCa(PathBuf::from("/etc/hapair/ca.pem"))
        );
    }
}
