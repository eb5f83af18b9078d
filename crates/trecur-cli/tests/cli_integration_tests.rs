//! Black-box tests for the `trecur` binary: hook protocol, maintenance
//! commands and exit codes.

use chrono::{TimeZone, Utc};
use predicates::prelude::*;
use trecur_core::models::{Task, TaskStatus};
use trecur_core::store::{SqliteStore, TaskFilter, TaskStore};
use uuid::Uuid;

mod helpers;
use helpers::{fixtures, CliTestHarness};

#[test]
fn test_cli_help_and_version() {
    let harness = CliTestHarness::new();

    harness
        .run_success(&["--help"])
        .stdout(predicate::str::contains("on-add"))
        .stdout(predicate::str::contains("regenerate-children"));

    harness
        .run_success(&["--version"])
        .stdout(predicate::str::contains("trecur"));

    harness
        .run_failure(&["invalid-command"])
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_on_add_passes_unrelated_tasks_through_unchanged() {
    let harness = CliTestHarness::new();
    let line = r#"{"description":"Buy milk","entry":"20370702T194712Z","status":"pending","tags":["errand"],"uuid":"9b4d8a4c-1a3e-4c55-8a47-6f1d0f2b3c11"}"#;

    assert_eq!(harness.on_add(line), format!("{}\n", line));
}

#[test]
fn test_on_add_requires_due() {
    let harness = CliTestHarness::new();

    harness
        .command()
        .args(["on-add", "command:add"])
        .write_stdin(r#"{"description":"No due","r":"3d","rtype":"chained","status":"pending"}"#)
        .assert()
        .failure()
        .stdout(predicate::str::contains("You need to specify the r and due parameters"));
}

#[test]
fn test_on_add_rejects_malformed_input() {
    let harness = CliTestHarness::new();

    harness
        .command()
        .args(["on-add", "command:add"])
        .write_stdin("{not json")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn test_on_add_links_the_first_instance() {
    let harness = CliTestHarness::new();
    let output = harness.on_add(&fixtures::chained_parent());

    assert_eq!(output.lines().count(), 1);
    let parent = Task::from_json(output.trim()).unwrap();
    assert_eq!(parent.uuid, Some(fixtures::PARENT_UUID.parse().unwrap()));
    assert_eq!(parent.recur.as_deref(), Some("3d"));
    assert!(parent.rlastinstance.is_some());
    assert_eq!(parent.extra["tags"], serde_json::json!(["garden"]));
}

#[test]
fn test_on_exit_ignores_other_commands() {
    let harness = CliTestHarness::new();

    harness
        .on_exit("modify", &fixtures::chained_parent())
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_on_exit_never_fails_taskwarrior() {
    let harness = CliTestHarness::new();
    let orphan = r#"{"uuid":"5c4c1d84-35c9-4bb0-9f61-0c2a3cf8d7aa","description":"Orphan","due":"20370708T010000Z","end":"20370709T010000Z","r":"3d","rparent":"11111111-2222-4333-8444-555555555555","status":"completed"}"#;

    harness.on_exit("done", orphan).success();
    harness.on_exit("done", "{broken").success();
}

#[tokio::test]
async fn test_completing_an_instance_chains_the_next() {
    let harness = CliTestHarness::new();
    let parent_line = harness.on_add(&fixtures::chained_parent());
    harness
        .import(&parent_line)
        .stdout(predicate::str::contains("Imported 1 tasks"));

    let parent_uuid: Uuid = fixtures::PARENT_UUID.parse().unwrap();
    let first = {
        let store = SqliteStore::open(harness.db_path()).await.unwrap();
        let parent = store.get(parent_uuid).await.unwrap();
        let mut first = store.get(parent.rlastinstance.unwrap()).await.unwrap();
        first.status = TaskStatus::Completed;
        first.end = Some(Utc.with_ymd_and_hms(2037, 7, 9, 12, 0, 0).unwrap());
        store.save(&mut first).await.unwrap();
        store.pool().close().await;
        first
    };

    harness
        .on_exit("done", &format!("{}\n", first.to_json().unwrap()))
        .success();

    let store = SqliteStore::open(harness.db_path()).await.unwrap();
    let parent = store.get(parent_uuid).await.unwrap();
    let children = store.find(&[TaskFilter::Parent(parent_uuid)]).await.unwrap();
    assert_eq!(children.len(), 2);

    let next = store.get(parent.rlastinstance.unwrap()).await.unwrap();
    assert_ne!(next.uuid, first.uuid);
    assert_eq!(next.status, TaskStatus::Pending);
    assert_eq!(next.due, Some(Utc.with_ymd_and_hms(2037, 7, 12, 12, 0, 0).unwrap()));
    assert_eq!(next.description.as_deref(), Some("Water the plants"));
}

#[test]
fn test_regenerate_links_repoints_parents() {
    let harness = CliTestHarness::new();
    let records = format!(
        "{}\n{}\n",
        fixtures::chained_parent(),
        format!(
            r#"{{"uuid":"0e8d7c2b-6a5f-4e3d-9c1b-a0f9e8d7c6b5","description":"Water the plants","due":"20370708T010000Z","r":"3d","rparent":"{}","status":"pending"}}"#,
            fixtures::PARENT_UUID
        )
    );
    harness
        .import(&records)
        .stdout(predicate::str::contains("Imported 2 tasks"));

    harness
        .run_success(&["regenerate-links"])
        .stdout(predicate::str::contains(format!(
            "Regenerating rlastinstance of {}",
            fixtures::PARENT_UUID
        )));

    harness
        .run_success(&["regenerate-links"])
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_regenerate_children_with_nothing_to_do() {
    let harness = CliTestHarness::new();
    harness.on_add(&fixtures::chained_parent());

    harness
        .run_success(&["regenerate-children"])
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_import_reads_a_file() {
    let harness = CliTestHarness::new();
    let export = harness.temp_path().join("export.json");
    std::fs::write(
        &export,
        r#"[{"description":"one"},{"description":"two","status":"completed"}]"#,
    )
    .unwrap();

    harness
        .run_success(&["import", export.to_str().unwrap()])
        .stdout(predicate::str::contains("Imported 2 tasks"));

    harness
        .run_failure(&["import", "/nonexistent/export.json"])
        .stderr(predicate::str::contains("cannot read"));
}

#[test]
fn test_unknown_timezone_is_reported() {
    let harness = CliTestHarness::new();

    harness
        .command()
        .arg("--timezone")
        .arg("Mars/Olympus_Mons")
        .arg("regenerate-links")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Mars/Olympus_Mons"));
}

#[cfg(unix)]
#[test]
fn test_dispatch_on_hook_file_name() {
    let harness = CliTestHarness::new();
    let hook = harness.temp_path().join("on-add-recurrence");
    std::os::unix::fs::symlink(assert_cmd::cargo::cargo_bin("trecur"), &hook).unwrap();

    let output = harness
        .command_at(&hook)
        .args(["api:2", "command:add"])
        .write_stdin(fixtures::chained_parent())
        .output()
        .unwrap();

    assert!(output.status.success());
    let parent = Task::from_json(String::from_utf8_lossy(&output.stdout).trim()).unwrap();
    assert!(parent.rlastinstance.is_some());
}
