// Shared fixtures for the two-device deployment tests.
#![allow(clippy::unwrap_used, dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use hapair_api::TransportConfig;
use hapair_core::{
    Credentials, DeploymentConfig, DeviceEndpoint, HaNode, HaPlan, HaSettings, Orchestrator,
    PayloadKind, PollBudget,
};
use secrecy::SecretString;
use url::Url;
use wiremock::matchers::method;
use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

pub const FIRST: &str = "10.0.0.1";
pub const SECOND: &str = "10.0.0.2";

pub const SHOW_HA_STATE: &str = "<show><high-availability><state></state></high-availability></show>";
pub const SYNC_TO_PEER: &str = "<request><high-availability><sync-to-remote><running-config>\
                                </running-config></sync-to-remote></high-availability></request>";

// ── Matchers ────────────────────────────────────────────────────────

/// Matches a single `key=value` pair in a form-encoded request body.
pub struct FormParam(&'static str, String);

impl Match for FormParam {
    fn matches(&self, request: &Request) -> bool {
        param(request, self.0).is_some_and(|v| v == self.1)
    }
}

pub fn form(key: &'static str, value: impl Into<String>) -> FormParam {
    FormParam(key, value.into())
}

pub fn param(request: &Request, key: &str) -> Option<String> {
    url::form_urlencoded::parse(&request.body)
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

// ── Devices ─────────────────────────────────────────────────────────

pub struct Devices {
    pub first: MockServer,
    pub second: MockServer,
}

impl Devices {
    pub async fn start() -> Self {
        Self {
            first: MockServer::start().await,
            second: MockServer::start().await,
        }
    }

    pub fn server(&self, host: &str) -> &MockServer {
        if host == FIRST { &self.first } else { &self.second }
    }

    pub fn config(&self) -> DeploymentConfig {
        let [a, b] = HaNode::default_pair();
        DeploymentConfig {
            devices: [
                DeviceEndpoint::with_base_url(FIRST, Url::parse(&self.first.uri()).unwrap()),
                DeviceEndpoint::with_base_url(SECOND, Url::parse(&self.second.uri()).unwrap()),
            ],
            credentials: Credentials {
                username: "admin".into(),
                password: SecretString::from("s3cret".to_string()),
            },
            ha: HaPlan::new(HaSettings::default(), a, b).unwrap(),
            transport: TransportConfig {
                timeout: Duration::from_secs(5),
                ..TransportConfig::default()
            },
            roles: PollBudget::new(Duration::from_millis(10), 5),
            commit: PollBudget::new(Duration::from_millis(10), 5),
            sync: PollBudget::new(Duration::from_millis(10), 3),
            deadline: None,
        }
    }
}

pub fn orchestrator(config: DeploymentConfig) -> Orchestrator {
    Orchestrator::new(config, Arc::new(payloads())).unwrap()
}

pub fn payloads() -> HashMap<PayloadKind, String> {
    PayloadKind::APPLY_ORDER
        .iter()
        .map(|kind| (*kind, format!("<entry name=\"{kind}\"/>")))
        .collect()
}

// ── Response bodies ─────────────────────────────────────────────────

pub fn ok() -> ResponseTemplate {
    xml(r#"<response status="success" code="20"><msg>command succeeded</msg></response>"#)
}

pub fn xml(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_string(body.to_owned())
}

pub fn ha_state(local: &str, peer: &str, sync: &str) -> ResponseTemplate {
    xml(&format!(
        r#"<response status="success"><result>
             <enabled>yes</enabled>
             <group>
               <mode>Active-Passive</mode>
               <local-info><state>{local}</state></local-info>
               <peer-info><state>{peer}</state></peer-info>
               <running-sync>{sync}</running-sync>
             </group>
           </result></response>"#
    ))
}

pub fn job(id: u64, status: &str, result: &str, detail: &str) -> ResponseTemplate {
    xml(&format!(
        r#"<response status="success"><result><job>
             <id>{id}</id><type>Commit</type><status>{status}</status><result>{result}</result>
             <progress>100</progress>
             <details><line>{detail}</line></details>
           </job></result></response>"#
    ))
}

pub fn rejected(text: &str) -> ResponseTemplate {
    xml(&format!(
        r#"<response status="error" code="12"><msg><line>{text}</line></msg></response>"#
    ))
}

// ── Mount helpers ───────────────────────────────────────────────────

pub async fn mount_keygen(server: &MockServer, key: &str) {
    Mock::given(method("POST"))
        .and(form("type", "keygen"))
        .respond_with(xml(&format!(
            r#"<response status="success"><result><key>{key}</key></result></response>"#
        )))
        .mount(server)
        .await;
}

/// No interface entries exist yet: every config get is "object missing".
pub async fn mount_get_missing(server: &MockServer) {
    Mock::given(method("POST"))
        .and(form("type", "config"))
        .and(form("action", "get"))
        .respond_with(xml(
            r#"<response status="error" code="7"><msg>Object doesn't exist</msg></response>"#,
        ))
        .mount(server)
        .await;
}

/// Both HA ports already carry the HA marker.
pub async fn mount_get_marked(server: &MockServer) {
    Mock::given(method("POST"))
        .and(form("type", "config"))
        .and(form("action", "get"))
        .respond_with(xml(
            r#"<response status="success" code="19"><result total-count="1" count="1">
                 <entry name="ethernet1/4"><ha/></entry>
               </result></response>"#,
        ))
        .mount(server)
        .await;
}

pub async fn mount_set_ok(server: &MockServer) {
    Mock::given(method("POST"))
        .and(form("type", "config"))
        .and(form("action", "set"))
        .respond_with(ok())
        .mount(server)
        .await;
}

/// A commit that enqueues `id` and finishes successfully.
pub async fn mount_commit_ok(server: &MockServer, id: u64) {
    Mock::given(method("POST"))
        .and(form("type", "commit"))
        .respond_with(xml(&format!(
            r#"<response status="success" code="19"><result><msg><line>Commit job enqueued with jobid {id}</line></msg><job>{id}</job></result></response>"#
        )))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(form("cmd", format!("<show><jobs><id>{id}</id></jobs></show>")))
        .respond_with(job(id, "FIN", "OK", "Configuration committed successfully"))
        .mount(server)
        .await;
}

pub async fn mount_ha_state(server: &MockServer, local: &str, peer: &str, sync: &str) {
    Mock::given(method("POST"))
        .and(form("cmd", SHOW_HA_STATE))
        .respond_with(ha_state(local, peer, sync))
        .mount(server)
        .await;
}

pub async fn mount_sync_request(server: &MockServer) {
    Mock::given(method("POST"))
        .and(form("cmd", SYNC_TO_PEER))
        .respond_with(xml(r#"<response status="success"><result>sync started</result></response>"#))
        .mount(server)
        .await;
}

/// Everything a device needs for the HA stages: keys, empty interfaces,
/// accepted sets, and an activation commit.
pub async fn mount_fresh_device(server: &MockServer, key: &str, job_id: u64) {
    mount_keygen(server, key).await;
    mount_get_missing(server).await;
    mount_set_ok(server).await;
    mount_commit_ok(server, job_id).await;
}

// ── Inspection ──────────────────────────────────────────────────────

/// Xpaths of every `set` the server received, in order.
pub async fn set_xpaths(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| param(r, "action").as_deref() == Some("set"))
        .filter_map(|r| param(r, "xpath"))
        .collect()
}

/// `(xpath, element)` of every `set` the server received, in order.
pub async fn set_requests(server: &MockServer) -> Vec<(String, String)> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| param(r, "action").as_deref() == Some("set"))
        .filter_map(|r| Some((param(r, "xpath")?, param(r, "element")?)))
        .collect()
}

/// Number of commits the server received.
pub async fn commit_count(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| param(r, "type").as_deref() == Some("commit"))
        .count()
}

pub fn payload_xpath(kind: PayloadKind) -> String {
    kind.xpath().unwrap().to_string()
}

pub fn payload_xpaths() -> Vec<String> {
    PayloadKind::APPLY_ORDER
        .iter()
        .map(|kind| payload_xpath(*kind))
        .collect()
}
