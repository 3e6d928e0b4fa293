//! CLI and basic command tests

mod common;

use std::fs;

use common::*;
use predicates::prelude::*;

fn cmd() -> assert_cmd::Command {
    let mut cmd = cabletrace();
    cmd.env_remove("CABLETRACE_CONFIG");
    cmd
}

// ============================================================================
// CLI Basic Tests
// ============================================================================

#[test]
fn test_help_displays() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Trace cable paths"));
}

#[test]
fn test_version_displays() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("cabletrace"));
}

#[test]
fn test_unknown_command_fails() {
    cmd()
        .arg("unknown-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_completions_bash() {
    cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("cabletrace"));
}

#[test]
fn test_profiles_lists_catalog() {
    cmd()
        .arg("profiles")
        .assert()
        .success()
        .stdout(predicate::str::contains("trunk-2c4p-shuffle"))
        .stdout(predicate::str::contains("breakout-1c4p-4c1p"));
}

#[test]
fn test_profiles_filter() {
    cmd()
        .args(["profiles", "breakout", "-f", "csv"])
        .assert()
        .success()
        .stdout(predicate::str::contains("breakout-1c6p-6c1p"))
        .stdout(predicate::str::contains("single-1c1p").not());
}

// ============================================================================
// Trace
// ============================================================================

#[test]
fn test_trace_direct_cable() {
    let (_tmp, topo) = write_topology(DIRECT);
    cmd()
        .arg("trace")
        .arg(&topo)
        .arg("interface:1")
        .assert()
        .success()
        .stdout(predicate::str::contains("interface:2 (eth1)"))
        .stdout(predicate::str::contains("✓ complete"))
        .stdout(predicate::str::contains("Length: 3.00 m"));
}

#[test]
fn test_trace_by_name_as_json() {
    let (_tmp, topo) = write_topology(DIRECT);
    let output = cmd()
        .args(["trace", "-f", "json"])
        .arg(&topo)
        .arg("eth0")
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["is_complete"], true);
    assert_eq!(json["path"][2][0], "interface:2");
    assert_eq!(json["total_length_m"], 3.0);
}

#[test]
fn test_trace_unlinked_origin() {
    let (_tmp, topo) = write_topology(
        r#"
terminations:
  - { kind: interface, id: 1 }
"#,
    );
    cmd()
        .arg("trace")
        .arg(&topo)
        .arg("interface:1")
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing attached"));
}

#[test]
fn test_trace_unknown_origin_fails() {
    let (_tmp, topo) = write_topology(DIRECT);
    cmd()
        .arg("trace")
        .arg(&topo)
        .arg("interface:9")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown node"));
}

#[test]
fn test_trace_csv_lists_every_hop() {
    let (_tmp, topo) = write_topology(&passthrough("connected"));
    cmd()
        .args(["trace", "-f", "csv"])
        .arg(&topo)
        .arg("interface:1")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("hop,node,kind,id,label"))
        .stdout(predicate::str::contains("9,interface:2,interface,2,interface:2"));
}

// ============================================================================
// Sync and stored paths
// ============================================================================

#[test]
fn test_sync_then_list_and_show() {
    let (tmp, topo) = write_topology(&passthrough("connected"));
    let db = tmp.path().join("paths.db");

    cmd()
        .arg("sync")
        .arg(&topo)
        .arg("--db")
        .arg(&db)
        .assert()
        .success()
        .stdout(predicate::str::contains("Synced 2 path(s)"));

    cmd()
        .args(["paths", "list", "--count", "--db"])
        .arg(&db)
        .assert()
        .success()
        .stdout("2\n");

    cmd()
        .args(["paths", "list", "--through", "cable:3", "--db"])
        .arg(&db)
        .assert()
        .success()
        .stdout(predicate::str::contains("interface:1"))
        .stdout(predicate::str::contains("2 path(s)"));

    cmd()
        .args(["paths", "show", "interface:2", "--db"])
        .arg(&db)
        .arg("--topology")
        .arg(&topo)
        .assert()
        .success()
        .stdout(predicate::str::contains("rearport:1"));
}

#[test]
fn test_sync_skips_unchanged_topology() {
    let (tmp, topo) = write_topology(DIRECT);

    cmd().arg("sync").arg(&topo).assert().success();
    assert!(tmp.path().join(".cabletrace.db").exists());

    cmd()
        .arg("sync")
        .arg(&topo)
        .assert()
        .success()
        .stdout(predicate::str::contains("up to date"));

    cmd()
        .args(["sync", "--force"])
        .arg(&topo)
        .assert()
        .success()
        .stdout(predicate::str::contains("Synced 2 path(s)"));
}

#[test]
fn test_paths_show_missing_origin_fails() {
    let (tmp, topo) = write_topology(DIRECT);
    let db = tmp.path().join("paths.db");
    cmd().arg("sync").arg(&topo).arg("--db").arg(&db).assert().success();

    cmd()
        .args(["paths", "show", "interface:7", "--db"])
        .arg(&db)
        .assert()
        .failure()
        .stderr(predicate::str::contains("No stored path originates at interface:7"));
}

#[test]
fn test_paths_list_needs_db() {
    cmd()
        .args(["paths", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No path database given"));
}

#[test]
fn test_store_path_from_config() {
    let (tmp, topo) = write_topology(DIRECT);
    let db = tmp.path().join("configured.db");
    let config = tmp.path().join("config.yaml");
    fs::write(
        &config,
        format!("store:\n  path: {}\noutput:\n  color: false\n", db.display()),
    )
    .unwrap();

    cmd()
        .arg("sync")
        .arg(&topo)
        .env("CABLETRACE_CONFIG", &config)
        .assert()
        .success();
    assert!(db.exists());

    cmd()
        .args(["paths", "list", "--count"])
        .env("CABLETRACE_CONFIG", &config)
        .assert()
        .success()
        .stdout("2\n");
}

// ============================================================================
// Apply
// ============================================================================

#[test]
fn test_apply_changes_updates_store() {
    let (tmp, topo) = write_topology(&passthrough("connected"));
    let db = tmp.path().join("paths.db");
    let changes = tmp.path().join("changes.yaml");
    fs::write(&changes, "- action: delete_cable\n  id: 3\n").unwrap();

    cmd().arg("sync").arg(&topo).arg("--db").arg(&db).assert().success();

    cmd()
        .arg("apply")
        .arg(&topo)
        .arg(&changes)
        .arg("--db")
        .arg(&db)
        .assert()
        .success()
        .stdout(predicate::str::contains("delete cable:3"))
        .stdout(predicate::str::contains("Applied 1 change(s)"));

    cmd()
        .args(["paths", "list", "--incomplete", "--count", "--db"])
        .arg(&db)
        .assert()
        .success()
        .stdout("2\n");

    // The topology file was not written, so the next sync rebuilds
    cmd()
        .arg("sync")
        .arg(&topo)
        .arg("--db")
        .arg(&db)
        .assert()
        .success()
        .stdout(predicate::str::contains("Synced 2 path(s)"));
}

#[test]
fn test_apply_write_updates_topology_file() {
    let (tmp, topo) = write_topology(DIRECT);
    let changes = tmp.path().join("changes.yaml");
    fs::write(
        &changes,
        "- action: save_cable\n  id: 1\n  profile: single-1c1p\n  status: planned\n  a_terminations: [\"interface:1\"]\n  b_terminations: [\"interface:2\"]\n",
    )
    .unwrap();

    cmd()
        .arg("apply")
        .arg(&topo)
        .arg(&changes)
        .arg("--write")
        .assert()
        .success()
        .stdout(predicate::str::contains("2 deactivated"));

    let written = fs::read_to_string(&topo).unwrap();
    assert!(written.contains("planned"));

    cmd()
        .arg("sync")
        .arg(&topo)
        .assert()
        .success()
        .stdout(predicate::str::contains("up to date"));
}

#[test]
fn test_apply_invalid_change_fails() {
    let (tmp, topo) = write_topology(DIRECT);
    let changes = tmp.path().join("changes.yaml");
    fs::write(&changes, "- action: delete_cable\n  id: 42\n").unwrap();

    cmd()
        .arg("apply")
        .arg(&topo)
        .arg(&changes)
        .assert()
        .failure()
        .stderr(predicate::str::contains("cable:42"));
}

// ============================================================================
// Validate
// ============================================================================

#[test]
fn test_validate_valid_topology() {
    let (_tmp, topo) = write_topology(BREAKOUT_1X4);
    cmd()
        .arg("validate")
        .arg(&topo)
        .assert()
        .success()
        .stdout(predicate::str::contains("is valid"));
}

#[test]
fn test_validate_reports_every_problem() {
    let (_tmp, topo) = write_topology(
        r#"
terminations:
  - { kind: interface, id: 1 }
  - { kind: interface, id: 2 }
  - { kind: powerport, id: 3 }
cables:
  - { id: 1, a_terminations: ["interface:1"], b_terminations: ["powerport:3"] }
  - { id: 2, a_terminations: ["interface:2"], b_terminations: ["interface:9"] }
"#,
    );
    cmd()
        .arg("validate")
        .arg(&topo)
        .assert()
        .failure()
        .stderr(predicate::str::contains("incompatible kinds"))
        .stderr(predicate::str::contains("2 problem(s) found"));
}
