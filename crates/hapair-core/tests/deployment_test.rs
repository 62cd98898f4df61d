#![allow(clippy::unwrap_used)]
// End-to-end deployment runs against two mock devices using wiremock.

mod common;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use common::*;
use hapair_api::{DeviceClient, TransportConfig};
use hapair_core::stages::StageEnv;
use hapair_core::stages::firewall::configure_firewall;
use hapair_core::{
    CoreError, DeviceEndpoint, DevicePair, HaRoleState, Orchestrator, PairSlot, PayloadKind,
    PollBudget, RunContext, RunOutcome, SessionStore, Stage, StagePlan,
};
use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::method;
use wiremock::{Mock, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

/// Both devices fresh, `FIRST` elected active, running config in `sync`.
async fn setup_pair(sync: &str) -> Devices {
    let devices = Devices::start().await;
    mount_fresh_device(&devices.first, "KEY-A", 11).await;
    mount_fresh_device(&devices.second, "KEY-B", 21).await;
    mount_ha_state(&devices.first, "active", "passive", sync).await;
    mount_ha_state(&devices.second, "passive", "active", sync).await;
    devices
}

fn payload_sets(sets: &[String]) -> Vec<String> {
    let payloads = payload_xpaths();
    sets.iter()
        .filter(|xpath| payloads.contains(xpath))
        .cloned()
        .collect()
}

// ── Full runs ───────────────────────────────────────────────────────

#[tokio::test]
async fn full_run_configures_active_device_only() {
    let devices = setup_pair("synchronized").await;
    let report = orchestrator(devices.config()).run(&StagePlan::full()).await;

    assert_eq!(report.outcome, RunOutcome::Succeeded, "{:?}", report.error);
    assert_eq!(report.completed, Stage::ALL);
    assert_eq!(report.failed_stage, None);
    assert_eq!(report.active.as_deref(), Some(FIRST));
    assert_eq!(report.passive.as_deref(), Some(SECOND));
    assert_eq!(report.payloads_applied, PayloadKind::APPLY_ORDER);
    assert_eq!(report.commit_job.as_ref().map(|j| j.job_id.0), Some(11));
    assert!(report.sync.as_ref().is_some_and(|s| s.synchronized));

    let first_sets = set_xpaths(&devices.first).await;
    assert_eq!(payload_sets(&first_sets), payload_xpaths());
    let second_sets = set_xpaths(&devices.second).await;
    assert!(payload_sets(&second_sets).is_empty(), "{second_sets:?}");
    // 2 HA ports + enable + group + links
    assert_eq!(second_sets.len(), 5);
}

#[tokio::test]
async fn keys_are_sent_to_the_device_that_issued_them() {
    let devices = setup_pair("synchronized").await;
    let plan = StagePlan::range(Stage::Authenticate, Stage::HaInterfaces).unwrap();
    let report = orchestrator(devices.config()).run(&plan).await;
    assert!(report.is_success());

    for (server, key) in [(&devices.first, "KEY-A"), (&devices.second, "KEY-B")] {
        let requests = server.received_requests().await.unwrap();
        let keyed: Vec<_> = requests
            .iter()
            .filter(|r| param(r, "type").as_deref() != Some("keygen"))
            .collect();
        assert!(!keyed.is_empty());
        for request in keyed {
            assert_eq!(
                request.headers.get("X-PAN-KEY").and_then(|v| v.to_str().ok()),
                Some(key)
            );
        }
    }
}

#[tokio::test]
async fn unsynced_peer_is_reported_after_commit() {
    let devices = setup_pair("not synchronized").await;
    Mock::given(method("POST"))
        .and(form("cmd", SYNC_TO_PEER))
        .respond_with(xml(r#"<response status="success"><result>sync started</result></response>"#))
        .expect(1)
        .mount(&devices.first)
        .await;

    let report = orchestrator(devices.config()).run(&StagePlan::full()).await;

    assert_eq!(report.outcome, RunOutcome::CommittedUnsynced);
    assert_eq!(report.completed, Stage::ALL);
    assert!(report.commit_job.is_some());

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["outcome"], "committed_unsynced");
    assert_eq!(json["active"], FIRST);
    assert!(json.get("failure").is_none());

    let sync = report.sync.unwrap();
    assert!(!sync.synchronized);
    assert!(sync.requested);
    assert_eq!(sync.polls, 3);
    assert_eq!(sync.last_state.as_deref(), Some("not synchronized"));
}

// ── Role resolution ─────────────────────────────────────────────────

#[tokio::test]
async fn split_brain_times_out_after_round_cap() {
    let devices = Devices::start().await;
    mount_fresh_device(&devices.first, "KEY-A", 11).await;
    mount_fresh_device(&devices.second, "KEY-B", 21).await;
    for server in [&devices.first, &devices.second] {
        Mock::given(method("POST"))
            .and(form("cmd", SHOW_HA_STATE))
            .respond_with(ha_state("active", "active", "not synchronized"))
            .expect(3)
            .mount(server)
            .await;
    }

    let mut config = devices.config();
    config.roles = PollBudget::new(Duration::from_millis(10), 3);
    let report = orchestrator(config).run(&StagePlan::full()).await;

    assert_eq!(report.outcome, RunOutcome::Failed);
    assert_eq!(report.failed_stage, Some(Stage::ResolveRoles));
    assert_eq!(report.last_completed(), Some(Stage::HaGroup));
    assert!(matches!(
        report.failure.as_ref().map(|f| &f.error),
        Some(CoreError::RoleResolutionTimeout { rounds: 3, .. })
    ));
    assert!(report.error.unwrap().contains("10.0.0.1=active, 10.0.0.2=active"));
    assert!(payload_sets(&set_xpaths(&devices.first).await).is_empty());
    assert!(payload_sets(&set_xpaths(&devices.second).await).is_empty());
}

#[tokio::test]
async fn roles_converging_in_third_round_stop_polling() {
    let devices = Devices::start().await;
    mount_keygen(&devices.first, "KEY-A").await;
    mount_keygen(&devices.second, "KEY-B").await;
    Mock::given(method("POST"))
        .and(form("cmd", SHOW_HA_STATE))
        .respond_with(ha_state("active", "unknown", "synchronized"))
        .expect(3)
        .mount(&devices.first)
        .await;
    Mock::given(method("POST"))
        .and(form("cmd", SHOW_HA_STATE))
        .respond_with(ha_state("initial", "unknown", "synchronized"))
        .up_to_n_times(2)
        .expect(2)
        .mount(&devices.second)
        .await;
    Mock::given(method("POST"))
        .and(form("cmd", SHOW_HA_STATE))
        .respond_with(ha_state("passive", "active", "synchronized"))
        .expect(1)
        .mount(&devices.second)
        .await;

    let report = orchestrator(devices.config())
        .run(&StagePlan::only(Stage::ResolveRoles))
        .await;

    assert!(report.is_success(), "{:?}", report.error);
    assert_eq!(report.completed, [Stage::Authenticate, Stage::ResolveRoles]);
    assert_eq!(report.active.as_deref(), Some(FIRST));
    assert_eq!(report.passive.as_deref(), Some(SECOND));
}

#[tokio::test]
async fn second_device_can_be_elected_active() {
    let devices = Devices::start().await;
    mount_keygen(&devices.first, "KEY-A").await;
    mount_keygen(&devices.second, "KEY-B").await;
    mount_ha_state(&devices.first, "passive", "active", "synchronized").await;
    mount_ha_state(&devices.second, "active", "passive", "synchronized").await;

    let report = orchestrator(devices.config())
        .run(&StagePlan::only(Stage::ResolveRoles))
        .await;

    assert_eq!(report.active.as_deref(), Some(SECOND));
    assert_eq!(report.passive.as_deref(), Some(FIRST));
}

// ── Firewall configuration ──────────────────────────────────────────

#[tokio::test]
async fn rejected_payload_halts_remaining_payloads() {
    let devices = Devices::start().await;
    mount_keygen(&devices.first, "KEY-A").await;
    mount_keygen(&devices.second, "KEY-B").await;
    mount_ha_state(&devices.first, "active", "passive", "synchronized").await;
    mount_ha_state(&devices.second, "passive", "active", "synchronized").await;
    Mock::given(method("POST"))
        .and(form("xpath", payload_xpath(PayloadKind::Nat)))
        .respond_with(rejected("rules -> nat-out  is an invalid ipv4/v6 address"))
        .expect(1)
        .mount(&devices.first)
        .await;
    Mock::given(method("POST"))
        .and(form("xpath", payload_xpath(PayloadKind::SecurityPolicy)))
        .respond_with(ok())
        .expect(0)
        .mount(&devices.first)
        .await;
    mount_set_ok(&devices.first).await;

    let report = orchestrator(devices.config())
        .run(&StagePlan::only(Stage::FirewallConfig))
        .await;

    assert_eq!(report.outcome, RunOutcome::Failed);
    assert_eq!(report.failed_stage, Some(Stage::FirewallConfig));
    assert_eq!(
        report.payloads_applied,
        [
            PayloadKind::Interfaces,
            PayloadKind::Zones,
            PayloadKind::VirtualRouter,
            PayloadKind::StaticRoutes,
        ]
    );
    let error = report.error.unwrap();
    assert!(error.contains("10.0.0.1 rejected nat configuration"), "{error}");
    assert!(error.contains("is an invalid ipv4/v6 address"), "{error}");
    assert!(matches!(
        report.failure.map(|f| f.error),
        Some(CoreError::ConfigRejected { .. })
    ));

    let sent = payload_sets(&set_xpaths(&devices.first).await);
    assert_eq!(sent, payload_xpaths()[..=4].to_vec());
}

#[tokio::test]
async fn missing_payload_sends_nothing() {
    let devices = Devices::start().await;
    mount_keygen(&devices.first, "KEY-A").await;
    mount_keygen(&devices.second, "KEY-B").await;
    mount_ha_state(&devices.first, "active", "passive", "synchronized").await;
    mount_ha_state(&devices.second, "passive", "active", "synchronized").await;
    mount_set_ok(&devices.first).await;

    let mut documents = payloads();
    documents.remove(&PayloadKind::SecurityPolicy);
    let orchestrator = Orchestrator::new(devices.config(), Arc::new(documents)).unwrap();
    let report = orchestrator.run(&StagePlan::only(Stage::FirewallConfig)).await;

    assert_eq!(report.failed_stage, Some(Stage::FirewallConfig));
    assert!(matches!(
        report.failure.map(|f| f.error),
        Some(CoreError::PayloadNotReady {
            kind: PayloadKind::SecurityPolicy,
            ..
        })
    ));
    assert!(set_xpaths(&devices.first).await.is_empty());
}

#[tokio::test]
async fn firewall_stage_requires_resolved_roles() {
    let pair = DevicePair::new(
        DeviceEndpoint::new(FIRST).unwrap(),
        DeviceEndpoint::new(SECOND).unwrap(),
    )
    .unwrap();
    let client = DeviceClient::new(&TransportConfig::default()).unwrap();
    let run = RunContext::new(CancellationToken::new(), None);
    let sessions = SessionStore::new();
    let env = StageEnv {
        client: &client,
        run: &run,
        sessions: &sessions,
    };

    let documents: HashMap<PayloadKind, String> = payloads();
    let mut applied = Vec::new();
    let err = configure_firewall(env, &pair, &documents, &mut applied)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::RolesUnresolved { .. }), "{err}");
    assert!(applied.is_empty());
    assert_eq!(pair.role(PairSlot::First), HaRoleState::Unknown);
}

// ── HA stages ───────────────────────────────────────────────────────

#[tokio::test]
async fn reapplying_ha_configuration_sends_identical_requests() {
    let devices = Devices::start().await;
    for (server, key, job_id) in [(&devices.first, "KEY-A", 11), (&devices.second, "KEY-B", 21)] {
        mount_keygen(server, key).await;
        mount_get_marked(server).await;
        mount_set_ok(server).await;
        mount_commit_ok(server, job_id).await;
    }

    let plan = StagePlan::range(Stage::HaInterfaces, Stage::HaGroup).unwrap();
    let orchestrator = orchestrator(devices.config());
    assert!(orchestrator.run(&plan).await.is_success());
    assert!(orchestrator.run(&plan).await.is_success());

    for server in [&devices.first, &devices.second] {
        let sets = set_requests(server).await;
        // enable + group + links per run; marked ports are skipped
        assert_eq!(sets.len(), 6);
        assert_eq!(sets[..3], sets[3..]);
        assert!(sets.iter().all(|(xpath, _)| !xpath.contains("network/interface")));
    }

    let first_group = &set_requests(&devices.first).await[1].1;
    let second_group = &set_requests(&devices.second).await[1].1;
    assert!(first_group.contains("<device-priority>100</device-priority>"), "{first_group}");
    assert!(second_group.contains("<device-priority>110</device-priority>"), "{second_group}");
}

#[tokio::test]
async fn unmarked_ports_are_marked_on_both_devices() {
    let devices = setup_pair("synchronized").await;
    let plan = StagePlan::only(Stage::HaInterfaces);
    assert!(orchestrator(devices.config()).run(&plan).await.is_success());

    for server in [&devices.first, &devices.second] {
        let sets = set_requests(server).await;
        assert_eq!(sets.len(), 2);
        assert!(sets[0].0.ends_with("entry[@name='ethernet1/4']"), "{}", sets[0].0);
        assert!(sets[1].0.ends_with("entry[@name='ethernet1/5']"), "{}", sets[1].0);
        assert!(sets.iter().all(|(_, element)| element == "<ha/>"));
        assert_eq!(commit_count(server).await, 1);
    }
}

#[tokio::test]
async fn marked_ports_are_not_committed_again() {
    let devices = Devices::start().await;
    for (server, key, job_id) in [(&devices.first, "KEY-A", 11), (&devices.second, "KEY-B", 21)] {
        mount_keygen(server, key).await;
        mount_get_marked(server).await;
        mount_commit_ok(server, job_id).await;
    }

    let plan = StagePlan::only(Stage::HaInterfaces);
    assert!(orchestrator(devices.config()).run(&plan).await.is_success());

    for server in [&devices.first, &devices.second] {
        assert!(set_xpaths(server).await.is_empty());
        assert_eq!(commit_count(server).await, 0);
    }
}

#[tokio::test]
async fn one_device_rejecting_an_ha_port_fails_the_stage() {
    let devices = Devices::start().await;
    mount_fresh_device(&devices.first, "KEY-A", 11).await;
    mount_keygen(&devices.second, "KEY-B").await;
    mount_get_missing(&devices.second).await;
    Mock::given(method("POST"))
        .and(form("action", "set"))
        .and(form(
            "xpath",
            hapair_core::ha::interface_xpath("ethernet1/5").unwrap().to_string(),
        ))
        .respond_with(rejected("ethernet1/5 is already in use"))
        .mount(&devices.second)
        .await;
    mount_set_ok(&devices.second).await;

    let report = orchestrator(devices.config())
        .run(&StagePlan::full())
        .await;

    assert_eq!(report.outcome, RunOutcome::Failed);
    assert_eq!(report.completed, [Stage::Authenticate]);
    assert_eq!(report.failed_stage, Some(Stage::HaInterfaces));
    match report.failure.map(|f| f.error) {
        Some(CoreError::ConfigRejected { host, message, .. }) => {
            assert_eq!(host, SECOND);
            assert!(message.contains("already in use"), "{message}");
        }
        other => panic!("expected ConfigRejected, got {other:?}"),
    }
    // the first device accepted both ports; no later stage touched either device
    assert_eq!(set_xpaths(&devices.first).await.len(), 2);
    assert_eq!(set_xpaths(&devices.second).await.len(), 2);
    assert_eq!(commit_count(&devices.second).await, 0);
}

#[tokio::test]
async fn activation_commit_failure_fails_ha_group() {
    let devices = Devices::start().await;
    for (server, key) in [(&devices.first, "KEY-A"), (&devices.second, "KEY-B")] {
        mount_keygen(server, key).await;
        mount_get_marked(server).await;
        mount_set_ok(server).await;
    }
    mount_commit_ok(&devices.first, 11).await;
    Mock::given(method("POST"))
        .and(form("type", "commit"))
        .respond_with(xml(
            r#"<response status="success" code="19"><result><job>22</job></result></response>"#,
        ))
        .mount(&devices.second)
        .await;
    Mock::given(method("POST"))
        .and(form("cmd", "<show><jobs><id>22</id></jobs></show>"))
        .respond_with(job(22, "FIN", "FAIL", "HA1 peer IP address conflicts with local"))
        .mount(&devices.second)
        .await;

    let report = orchestrator(devices.config())
        .run(&StagePlan::range(Stage::Authenticate, Stage::HaGroup).unwrap())
        .await;

    assert_eq!(report.failed_stage, Some(Stage::HaGroup));
    match report.failure.map(|f| f.error) {
        Some(CoreError::CommitFailed { host, job_id, message }) => {
            assert_eq!(host, SECOND);
            assert_eq!(job_id.0, 22);
            assert_eq!(message, "HA1 peer IP address conflicts with local");
        }
        other => panic!("expected CommitFailed, got {other:?}"),
    }
}

// ── Commit & sync ───────────────────────────────────────────────────

#[tokio::test]
async fn failed_commit_job_fails_the_run() {
    let devices = Devices::start().await;
    mount_keygen(&devices.first, "KEY-A").await;
    mount_keygen(&devices.second, "KEY-B").await;
    mount_ha_state(&devices.first, "active", "passive", "synchronized").await;
    mount_ha_state(&devices.second, "passive", "active", "synchronized").await;
    Mock::given(method("POST"))
        .and(form("type", "commit"))
        .respond_with(xml(
            r#"<response status="success" code="19"><result><job>40</job></result></response>"#,
        ))
        .expect(1)
        .mount(&devices.first)
        .await;
    Mock::given(method("POST"))
        .and(form("cmd", "<show><jobs><id>40</id></jobs></show>"))
        .respond_with(job(40, "FIN", "FAIL", "Validation Error: zone trust is not defined"))
        .mount(&devices.first)
        .await;
    Mock::given(method("POST"))
        .and(form("type", "commit"))
        .respond_with(ok())
        .expect(0)
        .mount(&devices.second)
        .await;

    let report = orchestrator(devices.config())
        .run(&StagePlan::only(Stage::CommitSync))
        .await;

    assert_eq!(report.outcome, RunOutcome::Failed);
    assert_eq!(report.failed_stage, Some(Stage::CommitSync));
    assert!(report.error.unwrap().contains("zone trust is not defined"));
    assert!(matches!(
        report.failure.map(|f| f.error),
        Some(CoreError::CommitFailed { .. })
    ));
}

#[tokio::test]
async fn running_commit_job_times_out() {
    let devices = Devices::start().await;
    mount_keygen(&devices.first, "KEY-A").await;
    mount_keygen(&devices.second, "KEY-B").await;
    mount_ha_state(&devices.first, "active", "passive", "synchronized").await;
    mount_ha_state(&devices.second, "passive", "active", "synchronized").await;
    Mock::given(method("POST"))
        .and(form("type", "commit"))
        .respond_with(xml(
            r#"<response status="success" code="19"><result><job>41</job></result></response>"#,
        ))
        .mount(&devices.first)
        .await;
    Mock::given(method("POST"))
        .and(form("cmd", "<show><jobs><id>41</id></jobs></show>"))
        .respond_with(job(41, "ACT", "PEND", "commit in progress"))
        .expect(5)
        .mount(&devices.first)
        .await;

    let report = orchestrator(devices.config())
        .run(&StagePlan::only(Stage::CommitSync))
        .await;

    assert!(matches!(
        report.failure.map(|f| f.error),
        Some(CoreError::CommitTimeout { polls: 5, .. })
    ));
}

// ── Failures before any change ──────────────────────────────────────

#[tokio::test]
async fn bad_credentials_on_one_device_stop_the_run() {
    let devices = Devices::start().await;
    mount_keygen(&devices.first, "KEY-A").await;
    Mock::given(method("POST"))
        .and(form("type", "keygen"))
        .respond_with(ResponseTemplate::new(403).set_body_string(
            r#"<response status="error"><result><msg>Invalid Credential</msg></result></response>"#,
        ))
        .mount(&devices.second)
        .await;

    let report = orchestrator(devices.config()).run(&StagePlan::full()).await;

    assert_eq!(report.outcome, RunOutcome::Failed);
    assert_eq!(report.failed_stage, Some(Stage::Authenticate));
    assert!(report.completed.is_empty());
    match report.failure.map(|f| f.error) {
        Some(CoreError::Authentication { host, .. }) => assert_eq!(host, SECOND),
        other => panic!("expected Authentication, got {other:?}"),
    }
    assert!(set_xpaths(&devices.first).await.is_empty());
}

#[tokio::test]
async fn deadline_interrupts_role_polling() {
    let devices = Devices::start().await;
    mount_keygen(&devices.first, "KEY-A").await;
    mount_keygen(&devices.second, "KEY-B").await;
    mount_ha_state(&devices.first, "initial", "unknown", "unknown").await;
    mount_ha_state(&devices.second, "initial", "unknown", "unknown").await;

    let mut config = devices.config();
    config.roles = PollBudget::new(Duration::from_millis(50), 1_000);
    config.deadline = Some(Duration::from_millis(300));
    let started = std::time::Instant::now();
    let report = orchestrator(config)
        .run(&StagePlan::only(Stage::ResolveRoles))
        .await;

    assert_eq!(report.failed_stage, Some(Stage::ResolveRoles));
    assert!(matches!(
        report.failure.map(|f| f.error),
        Some(CoreError::DeadlineExceeded)
    ));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn cancelled_run_makes_no_requests() {
    let devices = Devices::start().await;
    let orchestrator = orchestrator(devices.config());
    orchestrator.cancel_token().cancel();

    let report = orchestrator.run(&StagePlan::full()).await;

    assert_eq!(report.failed_stage, Some(Stage::Authenticate));
    assert!(matches!(
        report.failure.map(|f| f.error),
        Some(CoreError::Cancelled)
    ));
    assert!(devices.first.received_requests().await.unwrap().is_empty());
}

// ── Discovery ───────────────────────────────────────────────────────

#[tokio::test]
async fn discovery_reports_without_writing() {
    let devices = Devices::start().await;
    for (server, key) in [(&devices.first, "KEY-A"), (&devices.second, "KEY-B")] {
        mount_keygen(server, key).await;
        Mock::given(method("POST"))
            .and(form("action", "get"))
            .and(form(
                "xpath",
                hapair_core::ha::interface_xpath("ethernet1/4").unwrap().to_string(),
            ))
            .respond_with(xml(
                r#"<response status="success"><result><entry name="ethernet1/4"><ha/></entry></result></response>"#,
            ))
            .mount(server)
            .await;
        mount_get_missing(server).await;
    }
    mount_ha_state(&devices.first, "active", "passive", "synchronized").await;
    mount_ha_state(&devices.second, "passive", "active", "synchronized").await;

    let [first, second] = orchestrator(devices.config()).discover().await.unwrap();

    assert_eq!(first.host, FIRST);
    assert!(first.ha_enabled);
    assert_eq!(first.local_state, HaRoleState::Active);
    assert_eq!(first.peer_state, HaRoleState::Passive);
    assert_eq!(first.running_sync.as_deref(), Some("synchronized"));
    assert_eq!(first.ha_interfaces.get("ethernet1/4"), Some(&true));
    assert_eq!(first.ha_interfaces.get("ethernet1/5"), Some(&false));
    assert_eq!(second.local_state, HaRoleState::Passive);

    assert!(set_xpaths(&devices.first).await.is_empty());
    assert!(set_xpaths(&devices.second).await.is_empty());
}
