#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use std::process::{Child, Stdio};
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn warden(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("warden").unwrap();
    cmd.current_dir(dir.path())
        .env("WARDEN_ROOT", dir.path())
        .env_remove("WARDEN_BRIDGE_URL")
        .env_remove("OLLAMA_BASE_URL");
    cmd
}

fn write_config(dir: &TempDir, yaml: &str) {
    std::fs::write(dir.path().join("warden.yaml"), yaml).unwrap();
}

fn write_plan(dir: &TempDir, name: &str, yaml: &str) {
    let plans = dir.path().join("plans");
    std::fs::create_dir_all(&plans).unwrap();
    std::fs::write(plans.join(format!("{name}.yaml")), yaml).unwrap();
}

/// Kills the spawned bridge when the test ends.
struct Bridge {
    child: Child,
    url: String,
}

impl Drop for Bridge {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn start_bridge(dir: &TempDir) -> Bridge {
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let child = std::process::Command::new(assert_cmd::cargo::cargo_bin("warden"))
        .args(["serve", "--port", &port.to_string()])
        .env("WARDEN_ROOT", dir.path())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();
    let bridge = Bridge {
        child,
        url: format!("http://127.0.0.1:{port}"),
    };

    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        let ok = warden(dir)
            .args(["pending", "--bridge", &bridge.url])
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false);
        if ok {
            return bridge;
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    panic!("bridge did not come up on {}", bridge.url);
}

// ---------------------------------------------------------------------------
// warden init / tiers / ram
// ---------------------------------------------------------------------------

#[test]
fn init_writes_default_config() {
    let dir = TempDir::new().unwrap();
    warden(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("warden.yaml"));
    let yaml = std::fs::read_to_string(dir.path().join("warden.yaml")).unwrap();
    assert!(yaml.contains("gemma3:1b"));
}

#[test]
fn init_refuses_to_overwrite() {
    let dir = TempDir::new().unwrap();
    warden(&dir).arg("init").assert().success();
    warden(&dir)
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
    warden(&dir).args(["init", "--force"]).assert().success();
}

#[test]
fn tiers_lists_default_chain() {
    let dir = TempDir::new().unwrap();
    warden(&dir)
        .arg("tiers")
        .assert()
        .success()
        .stdout(predicate::str::contains("content → content-large → router"));
}

#[test]
fn tiers_json_has_all_tiers() {
    let dir = TempDir::new().unwrap();
    let out = warden(&dir).args(["tiers", "--json"]).output().unwrap();
    assert!(out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    let names: Vec<_> = v
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["router", "analysis", "content", "content-large"]);
}

#[test]
fn broken_tier_chain_is_reported() {
    let dir = TempDir::new().unwrap();
    write_config(
        &dir,
        r#"
tiers:
  - name: a
    model: m-a
    required_gb: 1.0
    keep_alive_secs: 30
    fallback: b
  - name: b
    model: m-b
    required_gb: 0.5
    keep_alive_secs: 30
    fallback: a
"#,
    );
    warden(&dir)
        .arg("tiers")
        .assert()
        .failure()
        .stderr(predicate::str::contains("cycle"));
}

#[test]
fn ram_json_reports_free_memory() {
    let dir = TempDir::new().unwrap();
    let out = warden(&dir).args(["ram", "--json"]).output().unwrap();
    assert!(out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert!(v["free_gb"].as_f64().unwrap() > 0.0);
    assert_eq!(v["tiers"].as_array().unwrap().len(), 4);
}

// ---------------------------------------------------------------------------
// warden run
// ---------------------------------------------------------------------------

#[test]
fn run_completes_plan_of_skip_listed_actions() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, "gate:\n  skip_types: [scroll]\n");
    write_plan(
        &dir,
        "browse",
        r#"
name: browse
steps:
  - step: action
    action_type: scroll
    description: Scroll the results
    confidence: 0.5
"#,
    );
    warden(&dir)
        .args(["run", "browse", "--no-bridge", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"status\": \"completed\""))
        .stdout(predicate::str::contains("\"outcome\": \"skipped\""));
}

#[test]
fn run_fails_when_runtime_is_unreachable() {
    let dir = TempDir::new().unwrap();
    write_config(
        &dir,
        "ollama:\n  base_url: http://127.0.0.1:9\n  request_timeout_secs: 2\nscheduler:\n  unload_settle_ms: 0\n",
    );
    write_plan(
        &dir,
        "draft",
        r#"
name: draft
steps:
  - step: generate
    tier: router
    prompt: hello
"#,
    );
    warden(&dir)
        .args(["run", "draft", "--no-bridge"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed at step 0"));
}

#[test]
fn run_with_missing_plan_fails() {
    let dir = TempDir::new().unwrap();
    warden(&dir)
        .args(["run", "nope", "--no-bridge"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load plan"));
}

// ---------------------------------------------------------------------------
// Approver commands against a live bridge
// ---------------------------------------------------------------------------

#[test]
fn approver_commands_fail_cleanly_without_bridge() {
    let dir = TempDir::new().unwrap();
    warden(&dir)
        .args(["pending", "--bridge", "http://127.0.0.1:9"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot reach bridge"));
}

#[test]
fn override_window_round_trip_through_live_bridge() {
    let dir = TempDir::new().unwrap();
    let bridge = start_bridge(&dir);

    warden(&dir)
        .args(["allow-all", "--minutes", "30", "--bridge", &bridge.url])
        .assert()
        .success()
        .stdout(predicate::str::contains("Auto-approving"));

    let out = warden(&dir)
        .args(["allow-all-status", "--json", "--bridge", &bridge.url])
        .output()
        .unwrap();
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(v["active"], true);

    warden(&dir)
        .args([
            "request",
            "--action-type",
            "click",
            "--description",
            "Click Apply",
            "--bridge",
            &bridge.url,
        ])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("allow"));

    warden(&dir)
        .args(["allow-all", "--minutes", "0", "--bridge", &bridge.url])
        .assert()
        .success()
        .stdout(predicate::str::contains("revoked"));
}

#[test]
fn unanswered_request_times_out_to_stop() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, "gate:\n  poll_interval_ms: 50\n");
    let bridge = start_bridge(&dir);

    warden(&dir)
        .args([
            "request",
            "--action-type",
            "submit",
            "--timeout",
            "1",
            "--bridge",
            &bridge.url,
        ])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("stop"));

    let out = warden(&dir)
        .args(["pending", "--json", "--bridge", &bridge.url])
        .output()
        .unwrap();
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(v, serde_json::json!([]));
}

#[test]
fn half_a_target_is_rejected_by_bridge() {
    let dir = TempDir::new().unwrap();
    let bridge = start_bridge(&dir);
    warden(&dir)
        .args([
            "request",
            "--action-type",
            "click",
            "--x",
            "10",
            "--bridge",
            &bridge.url,
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("400"));
}

#[test]
fn decide_unknown_id_is_reported() {
    let dir = TempDir::new().unwrap();
    let bridge = start_bridge(&dir);
    warden(&dir)
        .args(["decide", "perm-ghost", "allow", "--bridge", &bridge.url])
        .assert()
        .failure()
        .stderr(predicate::str::contains("404"));
}
