//! Deploy orchestration tests

use std::sync::Arc;

use coreos_deploy::command::CommandError;
use coreos_deploy::deploy::cycle::{CycleKeys, NOOP_UNIT};
use coreos_deploy::deploy::orchestrator::{
    Orchestrator, MSG_APPLY_KEYS, MSG_DESTROY_TEMPLATE, MSG_FLIP, MSG_INVALID_REQUEST,
    MSG_SUBMIT_TEMPLATE, MSG_SUCCESS, MSG_WRITE_TEMPLATE,
};
use coreos_deploy::deploylog::memory::MemoryDeployLog;
use coreos_deploy::deploylog::DeployLogStore;
use coreos_deploy::filesys::dir::Dir;
use coreos_deploy::fleet::ctl::FleetCtl;
use coreos_deploy::kv::memory::MemoryKv;
use coreos_deploy::kv::KeyValueClient;
use coreos_deploy::models::deploy::DeployStatus;

use crate::support::{deploy_request, FailingSetKv, ScriptedRunner};

struct Harness {
    runner: Arc<ScriptedRunner>,
    log: Arc<MemoryDeployLog>,
    orchestrator: Orchestrator,
    _tmp: tempfile::TempDir,
}

fn harness(kv: Arc<dyn KeyValueClient>) -> Harness {
    let tmp = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner::new();
    let log = Arc::new(MemoryDeployLog::new());
    let orchestrator = Orchestrator::new(
        kv,
        log.clone(),
        FleetCtl::new("fleetctl", runner.clone()),
        Dir::new(tmp.path()),
    );
    Harness {
        runner,
        log,
        orchestrator,
        _tmp: tmp,
    }
}

fn cycle_state(kv: &MemoryKv) -> (String, String, String) {
    let keys = CycleKeys::new("example.com", "web");
    (
        kv.value(&keys.cycle).unwrap_or_default(),
        kv.value(&keys.unit).unwrap_or_default(),
        kv.value(&keys.count).unwrap_or_default(),
    )
}

#[tokio::test]
async fn test_first_deploy_starts_cycle_a() {
    let kv = Arc::new(MemoryKv::new());
    let h = harness(kv.clone());
    let request = deploy_request("d-1", "1.2.0", 2, "ab12cd34");

    let outcome = h.orchestrator.deploy(&request).await;

    assert_eq!(outcome.status, DeployStatus::Success);
    assert_eq!(outcome.message, MSG_SUCCESS);
    assert_eq!(
        h.runner.targets("start"),
        vec![
            "web-1.2.0-ab12cd34@A1.service".to_string(),
            "web-1.2.0-ab12cd34@A2.service".to_string(),
        ]
    );
    assert!(h.runner.calls().iter().all(|c| !c.contains(NOOP_UNIT)));
    assert_eq!(
        cycle_state(&kv),
        (
            "A".to_string(),
            "web-1.2.0-ab12cd34".to_string(),
            "2".to_string()
        )
    );
    assert_eq!(
        kv.value("/example.com/apps/web/config").as_deref(),
        Some("{\"debug\":false}")
    );

    let record = h.log.query_deploy("d-1").await.unwrap();
    assert_eq!(record.status, DeployStatus::Success);
    assert_eq!(record.message, MSG_SUCCESS);
    assert_eq!(record.log, outcome.log);
    assert!(record.log.starts_with("Saving service unit code to temp file.\n"));
    assert!(record.log.ends_with("SUCCESS: Service deployed successfully.\n"));
}

#[tokio::test]
async fn test_template_is_submitted_then_removed() {
    let h = harness(Arc::new(MemoryKv::new()));
    let request = deploy_request("d-1", "1.2.0", 1, "ab12cd34");

    h.orchestrator.deploy(&request).await;

    let template = h.orchestrator.work_dir().file("web-1.2.0-ab12cd34@.service");
    assert_eq!(
        h.runner.targets("submit"),
        vec![template.path().to_string_lossy().to_string()]
    );
    assert!(!template.exists().await);

    // The old template is cleared before the new one is submitted
    let calls = h.runner.calls();
    let destroy = calls
        .iter()
        .position(|c| c == "destroy web-1.2.0-ab12cd34@.service")
        .unwrap();
    let submit = calls.iter().position(|c| c.starts_with("submit ")).unwrap();
    assert!(destroy < submit);
}

#[tokio::test]
async fn test_consecutive_deploys_alternate_cycles() {
    let kv = Arc::new(MemoryKv::new());
    let h = harness(kv.clone());

    let first = deploy_request("d-1", "1.2.0", 2, "aaaa1111");
    assert_eq!(
        h.orchestrator.deploy(&first).await.status,
        DeployStatus::Success
    );

    let second = deploy_request("d-2", "1.3.0", 3, "bbbb2222");
    assert_eq!(
        h.orchestrator.deploy(&second).await.status,
        DeployStatus::Success
    );

    let starts = h.runner.targets("start");
    assert_eq!(
        &starts[2..],
        &[
            "web-1.3.0-bbbb2222@B1.service".to_string(),
            "web-1.3.0-bbbb2222@B2.service".to_string(),
            "web-1.3.0-bbbb2222@B3.service".to_string(),
        ]
    );

    // The previous cycle is torn down along with its template
    let stops = h.runner.targets("stop");
    assert!(stops.contains(&"web-1.2.0-aaaa1111@A1.service".to_string()));
    assert!(stops.contains(&"web-1.2.0-aaaa1111@A2.service".to_string()));
    assert!(!stops.contains(&"web-1.2.0-aaaa1111@A3.service".to_string()));
    assert!(h
        .runner
        .targets("destroy")
        .contains(&"web-1.2.0-aaaa1111@.service".to_string()));

    assert_eq!(
        cycle_state(&kv),
        (
            "B".to_string(),
            "web-1.3.0-bbbb2222".to_string(),
            "3".to_string()
        )
    );

    let third = deploy_request("d-3", "1.4.0", 1, "cccc3333");
    h.orchestrator.deploy(&third).await;
    assert_eq!(cycle_state(&kv).0, "A");
}

#[tokio::test]
async fn test_missing_template_is_tolerated() {
    let h = harness(Arc::new(MemoryKv::new()));
    h.runner.respond(
        "destroy web-1.2.0-ab12cd34@.service",
        Err(CommandError::new(
            Some(1),
            "Error destroying units: unit web-1.2.0-ab12cd34@.service does not exist",
        )),
    );
    // Teardown failures of the new instances are ignored as well
    h.runner.respond(
        "stop",
        Err(CommandError::new(Some(1), "Unit not found")),
    );

    let outcome = h
        .orchestrator
        .deploy(&deploy_request("d-1", "1.2.0", 2, "ab12cd34"))
        .await;

    assert_eq!(outcome.status, DeployStatus::Success);
}

#[tokio::test]
async fn test_destroy_failure_fails_deploy() {
    let kv = Arc::new(MemoryKv::new());
    let h = harness(kv.clone());
    h.runner.respond(
        "destroy web-1.2.0-ab12cd34@.service",
        Err(CommandError::new(Some(2), "Error: fleet API unreachable")),
    );

    let outcome = h
        .orchestrator
        .deploy(&deploy_request("d-1", "1.2.0", 2, "ab12cd34"))
        .await;

    assert_eq!(outcome.status, DeployStatus::Failed);
    assert_eq!(outcome.message, MSG_DESTROY_TEMPLATE);
    assert!(outcome
        .log
        .contains("ERR: Unable to destroy previous service for new template.\nError: fleet API unreachable\n"));
    assert!(h.runner.targets("submit").is_empty());
    assert!(h.runner.targets("start").is_empty());
    assert_eq!(cycle_state(&kv).0, "");

    let record = h.log.query_deploy("d-1").await.unwrap();
    assert_eq!(record.status, DeployStatus::Failed);
    assert_eq!(record.log, outcome.log);
}

#[tokio::test]
async fn test_start_failure_leaves_cycle_state() {
    let kv = Arc::new(MemoryKv::new());
    let h = harness(kv.clone());
    h.runner.respond(
        "start web-1.2.0-ab12cd34@A2.service",
        Err(CommandError::new(Some(1), "Error: job failed")),
    );

    let outcome = h
        .orchestrator
        .deploy(&deploy_request("d-1", "1.2.0", 3, "ab12cd34"))
        .await;

    assert_eq!(outcome.status, DeployStatus::Failed);
    assert_eq!(outcome.message, MSG_FLIP);
    // The first instance stays up, nothing after the failure is started
    assert_eq!(
        h.runner.targets("start"),
        vec![
            "web-1.2.0-ab12cd34@A1.service".to_string(),
            "web-1.2.0-ab12cd34@A2.service".to_string(),
        ]
    );
    assert_eq!(
        cycle_state(&kv),
        ("B".to_string(), NOOP_UNIT.to_string(), "0".to_string())
    );
}

#[tokio::test]
async fn test_commit_failure_fails_after_instances_started() {
    let keys = CycleKeys::new("example.com", "web");
    let kv = Arc::new(FailingSetKv {
        inner: MemoryKv::new(),
        fail_key: keys.cycle.clone(),
    });
    let h = harness(kv.clone());

    let outcome = h
        .orchestrator
        .deploy(&deploy_request("d-1", "1.2.0", 2, "ab12cd34"))
        .await;

    assert_eq!(outcome.status, DeployStatus::Failed);
    assert_eq!(outcome.message, MSG_FLIP);
    assert_eq!(h.runner.targets("start").len(), 2);
    assert_eq!(kv.inner.value(&keys.cycle).as_deref(), Some("B"));

    let record = h.log.query_deploy("d-1").await.unwrap();
    assert_eq!(record.status, DeployStatus::Failed);
}

#[tokio::test]
async fn test_zero_instances() {
    let kv = Arc::new(MemoryKv::new());
    let h = harness(kv.clone());

    let outcome = h
        .orchestrator
        .deploy(&deploy_request("d-1", "1.2.0", 0, "ab12cd34"))
        .await;

    assert_eq!(outcome.status, DeployStatus::Success);
    assert!(h.runner.targets("start").is_empty());
    assert_eq!(cycle_state(&kv).2, "0");
}

#[tokio::test]
async fn test_corrupt_count_fails_before_teardown() {
    let kv = Arc::new(MemoryKv::new());
    let keys = CycleKeys::new("example.com", "web");
    kv.set(&keys.pairs("A", "web-1.1.0-olderabc", "two"))
        .await
        .unwrap();
    let h = harness(kv.clone());

    let outcome = h
        .orchestrator
        .deploy(&deploy_request("d-1", "1.2.0", 1, "ab12cd34"))
        .await;

    assert_eq!(outcome.status, DeployStatus::Failed);
    assert_eq!(outcome.message, MSG_FLIP);
    assert_eq!(
        h.runner.targets("start"),
        vec!["web-1.2.0-ab12cd34@B1.service".to_string()]
    );
    assert!(h
        .runner
        .calls()
        .iter()
        .all(|c| !c.contains("web-1.1.0-olderabc")));
    assert_eq!(cycle_state(&kv).1, "web-1.1.0-olderabc");
}

#[tokio::test]
async fn test_unknown_cycle_flips_to_a() {
    let kv = Arc::new(MemoryKv::new());
    let keys = CycleKeys::new("example.com", "web");
    kv.set(&keys.pairs("blue", NOOP_UNIT, "0")).await.unwrap();
    let h = harness(kv.clone());

    h.orchestrator
        .deploy(&deploy_request("d-1", "1.2.0", 1, "ab12cd34"))
        .await;

    assert_eq!(
        h.runner.targets("start"),
        vec!["web-1.2.0-ab12cd34@A1.service".to_string()]
    );
}

#[tokio::test]
async fn test_unwritable_work_dir_fails_deploy() {
    let tmp = tempfile::tempdir().unwrap();
    let blocker = tmp.path().join("not-a-dir");
    std::fs::write(&blocker, "file").unwrap();

    let runner = ScriptedRunner::new();
    let log = Arc::new(MemoryDeployLog::new());
    let orchestrator = Orchestrator::new(
        Arc::new(MemoryKv::new()),
        log.clone(),
        FleetCtl::new("fleetctl", runner.clone()),
        Dir::new(blocker.join("units")),
    );

    let outcome = orchestrator
        .deploy(&deploy_request("d-1", "1.2.0", 1, "ab12cd34"))
        .await;

    assert_eq!(outcome.status, DeployStatus::Failed);
    assert_eq!(outcome.message, MSG_WRITE_TEMPLATE);
    assert!(runner.calls().is_empty());
    assert_eq!(
        log.query_deploy("d-1").await.unwrap().status,
        DeployStatus::Failed
    );
}

#[tokio::test]
async fn test_key_update_failure_fails_deploy() {
    let kv = Arc::new(FailingSetKv {
        inner: MemoryKv::new(),
        fail_key: "/example.com/apps/web/config".to_string(),
    });
    let h = harness(kv.clone());

    let outcome = h
        .orchestrator
        .deploy(&deploy_request("d-1", "1.2.0", 2, "ab12cd34"))
        .await;

    assert_eq!(outcome.status, DeployStatus::Failed);
    assert_eq!(outcome.message, MSG_APPLY_KEYS);
    assert!(outcome.log.contains("ERR: Unable to apply etcd2 key changes.\n"));
    assert!(h.runner.calls().is_empty());
    assert_eq!(
        h.log.query_deploy("d-1").await.unwrap().message,
        MSG_APPLY_KEYS
    );
}

#[tokio::test]
async fn test_submit_failure_fails_deploy() {
    let kv = Arc::new(MemoryKv::new());
    let h = harness(kv.clone());
    h.runner.respond(
        "submit",
        Err(CommandError::new(Some(1), "Error creating units: invalid unit")),
    );

    let outcome = h
        .orchestrator
        .deploy(&deploy_request("d-1", "1.2.0", 2, "ab12cd34"))
        .await;

    assert_eq!(outcome.status, DeployStatus::Failed);
    assert_eq!(outcome.message, MSG_SUBMIT_TEMPLATE);
    assert_eq!(h.runner.targets("submit").len(), 1);
    assert!(h.runner.targets("start").is_empty());
    assert_eq!(cycle_state(&kv).0, "");
}

#[tokio::test]
async fn test_previous_cycle_teardown_failures_are_ignored() {
    let kv = Arc::new(MemoryKv::new());
    let h = harness(kv.clone());
    let first = deploy_request("d-1", "1.2.0", 2, "aaaa1111");
    assert_eq!(
        h.orchestrator.deploy(&first).await.status,
        DeployStatus::Success
    );

    let fleet_down = || Err(CommandError::new(Some(2), "Error: fleet API unreachable"));
    for unit in [
        "web-1.2.0-aaaa1111@A1.service",
        "web-1.2.0-aaaa1111@A2.service",
    ] {
        h.runner.respond(&format!("stop {}", unit), fleet_down());
        h.runner.respond(&format!("destroy {}", unit), fleet_down());
    }
    h.runner
        .respond("destroy web-1.2.0-aaaa1111@.service", fleet_down());

    let outcome = h
        .orchestrator
        .deploy(&deploy_request("d-2", "1.3.0", 1, "bbbb2222"))
        .await;

    assert_eq!(outcome.status, DeployStatus::Success);
    assert!(h
        .runner
        .targets("stop")
        .contains(&"web-1.2.0-aaaa1111@A2.service".to_string()));
    assert!(h
        .runner
        .targets("destroy")
        .contains(&"web-1.2.0-aaaa1111@.service".to_string()));
    assert_eq!(
        cycle_state(&kv),
        (
            "B".to_string(),
            "web-1.3.0-bbbb2222".to_string(),
            "1".to_string()
        )
    );
}

#[tokio::test]
async fn test_concurrent_deploys_do_not_interleave() {
    let kv = Arc::new(MemoryKv::new());
    let h = harness(kv.clone());
    let first = deploy_request("d-1", "1.2.0", 2, "aaaa1111");
    let second = deploy_request("d-2", "1.3.0", 2, "bbbb2222");

    let (a, b) = tokio::join!(
        h.orchestrator.deploy(&first),
        h.orchestrator.deploy(&second)
    );
    assert_eq!(a.status, DeployStatus::Success);
    assert_eq!(b.status, DeployStatus::Success);

    // The second deploy saw the committed cycle of the first
    assert_eq!(
        h.runner.targets("start"),
        vec![
            "web-1.2.0-aaaa1111@A1.service".to_string(),
            "web-1.2.0-aaaa1111@A2.service".to_string(),
            "web-1.3.0-bbbb2222@B1.service".to_string(),
            "web-1.3.0-bbbb2222@B2.service".to_string(),
        ]
    );

    let calls = h.runner.calls();
    let second_begins = calls.iter().position(|c| c.contains("bbbb2222")).unwrap();
    let first_ends = calls
        .iter()
        .rposition(|c| {
            c.contains("aaaa1111") && (c.starts_with("start ") || c.starts_with("submit "))
        })
        .unwrap();
    assert!(first_ends < second_begins);
    assert_eq!(cycle_state(&kv).1, "web-1.3.0-bbbb2222");
}

#[tokio::test]
async fn test_path_like_names_are_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let work_dir = tmp.path().join("units");
    let runner = ScriptedRunner::new();
    let kv = Arc::new(MemoryKv::new());
    let orchestrator = Orchestrator::new(
        kv.clone(),
        Arc::new(MemoryDeployLog::new()),
        FleetCtl::new("fleetctl", runner.clone()),
        Dir::new(work_dir.clone()),
    );

    let mut request = deploy_request("d-1", "1", 1, "ab12cd34");
    request.service_name = "../outside/evil".to_string();
    let outcome = orchestrator.deploy(&request).await;

    assert_eq!(outcome.status, DeployStatus::Failed);
    assert_eq!(outcome.message, MSG_INVALID_REQUEST);
    assert!(!tmp.path().join("outside").exists());
    assert!(!work_dir.exists());
    assert!(runner.calls().is_empty());
    assert!(kv.value("/example.com/apps/web/config").is_none());
}
