#![allow(deprecated)]
use assert_cmd::Command;
use guardlink_core::types::Region;
use guardlink_engine::FleetState;
use predicates::prelude::*;
use tempfile::TempDir;

fn guardlink(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("guardlink").unwrap();
    cmd.current_dir(dir.path());
    cmd
}

fn init_fleet(dir: &TempDir) {
    guardlink(dir).args(["fleet", "init"]).assert().success();
}

fn converge(dir: &TempDir) {
    // create, invite, accept
    for _ in 0..3 {
        guardlink(dir).arg("run").assert().success();
    }
}

// ---------------------------------------------------------------------------
// guardlink fleet init / show
// ---------------------------------------------------------------------------

#[test]
fn fleet_init_writes_a_starter_file() {
    let dir = TempDir::new().unwrap();
    guardlink(&dir)
        .args(["fleet", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("wrote starter fleet"));
    assert!(dir.path().join("fleet.yaml").exists());
}

#[test]
fn fleet_init_refuses_to_overwrite() {
    let dir = TempDir::new().unwrap();
    init_fleet(&dir);
    guardlink(&dir)
        .args(["fleet", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn fleet_init_leaves_an_existing_file_untouched() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("fleet.yaml"), "admin_account: 'custom'\n").unwrap();

    guardlink(&dir).args(["fleet", "init"]).assert().failure();

    assert_eq!(
        std::fs::read_to_string(dir.path().join("fleet.yaml")).unwrap(),
        "admin_account: 'custom'\n"
    );
}

#[test]
fn fleet_init_force_overwrites() {
    let dir = TempDir::new().unwrap();
    init_fleet(&dir);
    guardlink(&dir).arg("run").assert().success();
    guardlink(&dir)
        .args(["fleet", "init", "--force"])
        .assert()
        .success();

    let state = FleetState::load(&dir.path().join("fleet.yaml")).unwrap();
    assert!(state.memberships.is_empty());
}

#[test]
fn fleet_show_lists_the_fleet() {
    let dir = TempDir::new().unwrap();
    init_fleet(&dir);
    guardlink(&dir)
        .args(["fleet", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("administrator: 111111111111"))
        .stdout(predicate::str::contains("us-east-1"))
        .stdout(predicate::str::contains("registered accounts: 3"));
}

// ---------------------------------------------------------------------------
// guardlink run
// ---------------------------------------------------------------------------

#[test]
fn run_converges_in_three_passes() {
    let dir = TempDir::new().unwrap();
    init_fleet(&dir);

    guardlink(&dir)
        .arg("run")
        .assert()
        .success()
        .stdout(predicate::str::contains("6 created"));
    guardlink(&dir)
        .arg("run")
        .assert()
        .success()
        .stdout(predicate::str::contains("6 invited"));
    guardlink(&dir)
        .arg("run")
        .assert()
        .success()
        .stdout(predicate::str::contains("6 accepted"));
    guardlink(&dir)
        .arg("run")
        .assert()
        .success()
        .stdout(predicate::str::contains("fleet is converged; nothing to do"));
}

#[test]
fn run_persists_state_between_invocations() {
    let dir = TempDir::new().unwrap();
    init_fleet(&dir);
    guardlink(&dir).arg("run").assert().success();

    let state = FleetState::load(&dir.path().join("fleet.yaml")).unwrap();
    let members = state.memberships.get(&Region::from("us-east-1")).unwrap();
    assert_eq!(members.len(), 3);
    assert!(members.values().all(|relationship| relationship == "CREATED"));
}

#[test]
fn run_json_emits_a_machine_readable_summary() {
    let dir = TempDir::new().unwrap();
    init_fleet(&dir);

    let output = guardlink(&dir)
        .args(["run", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let json: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(json["eligible"], 3);
    assert_eq!(json["regions"].as_array().unwrap().len(), 2);
    assert!(json.get("issues").is_some());
}

#[test]
fn run_debug_logs_name_the_configured_registry() {
    let dir = TempDir::new().unwrap();
    init_fleet(&dir);

    guardlink(&dir)
        .arg("run")
        .env("RUST_LOG", "guardlink_engine=debug")
        .env("GUARDLINK_REGISTRY_TABLE", "team-registry")
        .env("GUARDLINK_HOME_REGION", "eu-central-1")
        .assert()
        .success()
        .stdout(predicate::str::contains("team-registry"))
        .stdout(predicate::str::contains("eu-central-1"));
}

// ---------------------------------------------------------------------------
// guardlink plan
// ---------------------------------------------------------------------------

#[test]
fn plan_never_writes_the_fleet_file() {
    let dir = TempDir::new().unwrap();
    init_fleet(&dir);
    let before = std::fs::read_to_string(dir.path().join("fleet.yaml")).unwrap();

    guardlink(&dir)
        .arg("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains("create member 222222222222"));

    let after = std::fs::read_to_string(dir.path().join("fleet.yaml")).unwrap();
    assert_eq!(before, after);
}

#[test]
fn plan_reports_a_converged_fleet() {
    let dir = TempDir::new().unwrap();
    init_fleet(&dir);
    converge(&dir);

    guardlink(&dir)
        .arg("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains("nothing pending; fleet is converged"));
}

// ---------------------------------------------------------------------------
// guardlink teardown
// ---------------------------------------------------------------------------

#[test]
fn teardown_removes_a_member() {
    let dir = TempDir::new().unwrap();
    init_fleet(&dir);
    converge(&dir);

    guardlink(&dir)
        .args(["teardown", "222222222222"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 account(s) targeted"));

    let state = FleetState::load(&dir.path().join("fleet.yaml")).unwrap();
    for region in [Region::from("us-east-1"), Region::from("eu-west-1")] {
        let members = state.memberships.get(&region).unwrap();
        assert!(!members.keys().any(|account| account.as_str() == "222222222222"));
        assert!(members.keys().any(|account| account.as_str() == "333333333333"));
    }
}

#[test]
fn teardown_unknown_account_is_reported() {
    let dir = TempDir::new().unwrap();
    init_fleet(&dir);

    guardlink(&dir)
        .args(["teardown", "999999999999"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no registered role"));
}

// ---------------------------------------------------------------------------
// error handling
// ---------------------------------------------------------------------------

#[test]
fn missing_fleet_file_is_a_clean_error() {
    let dir = TempDir::new().unwrap();
    guardlink(&dir)
        .arg("run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot load fleet file"));
}
