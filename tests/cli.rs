use std::fs;
use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use chrono::DateTime;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::{TempDir, tempdir};

// 10:00 AM on 2025-09-17 at +05:30.
const DAY_BEFORE: &str = "2025-09-17T04:30:00Z";
const DAY_AFTER: &str = "2025-09-19T04:30:00Z";

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self {
            dir: tempdir().expect("tempdir"),
        }
    }

    fn store(&self) -> std::path::PathBuf {
        self.dir.path().join("reminders.json")
    }

    fn outbox(&self) -> std::path::PathBuf {
        self.dir.path().join("notifications.json")
    }

    fn cmd(&self, now: &str) -> assert_cmd::Command {
        let mut cmd = cargo_bin_cmd!("petminder");
        cmd.arg("--store")
            .arg(self.store())
            .arg("--outbox")
            .arg(self.outbox())
            .arg("--now")
            .arg(now);
        cmd
    }

    fn add_feed(&self) {
        self.cmd(DAY_BEFORE)
            .args(["add", "--title", "Feed", "--date", "2025-09-18", "--time", "10:00 AM"])
            .assert()
            .success()
            .stdout(predicate::str::contains("4 notifications scheduled"));
    }

    fn reminders(&self) -> Vec<Value> {
        read_json(&self.store())["reminders"]
            .as_array()
            .cloned()
            .unwrap_or_default()
    }

    fn pending(&self) -> Vec<Value> {
        read_json(&self.outbox())["notifications"]
            .as_array()
            .cloned()
            .unwrap_or_default()
    }
}

fn read_json(path: &Path) -> Value {
    let text = fs::read_to_string(path).expect("read json");
    serde_json::from_str(&text).expect("parse json")
}

fn handles(values: &[Value], key: &str) -> Vec<String> {
    values
        .iter()
        .map(|value| value[key].as_str().expect("handle string").to_string())
        .collect()
}

#[test]
fn add_schedules_every_advance_warning() {
    let ws = Workspace::new();
    ws.add_feed();

    let reminders = ws.reminders();
    assert_eq!(reminders.len(), 1);
    assert_eq!(reminders[0]["title"], "Feed");
    assert_eq!(reminders[0]["triggers"].as_array().expect("triggers").len(), 4);
    assert_eq!(reminders[0]["triggers"][0]["offsetKind"], "oneHourBefore");

    let fire_times: Vec<String> = ws
        .pending()
        .iter()
        .map(|pending| {
            DateTime::parse_from_rfc3339(pending["fireAt"].as_str().expect("fireAt"))
                .expect("rfc3339")
                .to_rfc3339()
        })
        .collect();
    assert_eq!(
        fire_times,
        vec![
            "2025-09-18T03:30:00+00:00",
            "2025-09-18T04:00:00+00:00",
            "2025-09-18T04:20:00+00:00",
            "2025-09-18T04:30:00+00:00",
        ]
    );
}

#[test]
fn past_reminder_is_rejected_without_side_effects() {
    let ws = Workspace::new();
    ws.cmd(DAY_AFTER)
        .args(["add", "--title", "Feed", "--date", "2025-09-18", "--time", "10:00 AM"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("is in the past"));

    assert!(!ws.store().exists());
    assert!(!ws.outbox().exists());
}

#[test]
fn malformed_time_is_rejected_with_clear_error() {
    let ws = Workspace::new();
    ws.cmd(DAY_BEFORE)
        .args(["add", "--title", "Walk", "--date", "2025-09-18", "--time", "25:99"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid time '25:99'"));
}

#[test]
fn edit_replaces_old_notifications() {
    let ws = Workspace::new();
    ws.add_feed();
    let id = ws.reminders()[0]["id"].as_str().expect("id").to_string();
    let old_handles = handles(&ws.pending(), "handle");

    ws.cmd(DAY_BEFORE)
        .args(["edit", "--id", &id, "--title", "Feed Milo"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Feed Milo"));

    let pending = ws.pending();
    assert_eq!(pending.len(), 4);
    let new_handles = handles(&pending, "handle");
    assert!(new_handles.iter().all(|handle| !old_handles.contains(handle)));
    assert!(pending.iter().all(|p| p["content"]["title"] == "Feed Milo"));

    let reminders = ws.reminders();
    assert_eq!(reminders.len(), 1);
    assert_eq!(reminders[0]["id"], id.as_str());
    let stored = reminders[0]["triggers"].as_array().expect("triggers").clone();
    assert_eq!(handles(&stored, "handle"), new_handles);
}

#[test]
fn delete_cancels_notifications_and_removes_record() {
    let ws = Workspace::new();
    ws.add_feed();
    let id = ws.reminders()[0]["id"].as_str().expect("id").to_string();

    ws.cmd(DAY_BEFORE)
        .args(["delete", "--id", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("deleted reminder"));

    assert!(ws.reminders().is_empty());
    assert!(ws.pending().is_empty());
}

#[test]
fn unknown_id_fails() {
    let ws = Workspace::new();
    ws.cmd(DAY_BEFORE)
        .args(["delete", "--id", "missing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("reminder 'missing' not found"));
}

#[test]
fn list_sweeps_lapsed_and_malformed_reminders() {
    let ws = Workspace::new();
    ws.add_feed();
    ws.cmd(DAY_BEFORE)
        .args(["add", "--title", "Vet visit", "--date", "2025-09-25", "--time", "4:15 PM"])
        .assert()
        .success();

    let mut store = read_json(&ws.store());
    store["reminders"]
        .as_array_mut()
        .expect("reminders")
        .push(serde_json::json!({
            "id": "broken",
            "title": "Bath",
            "date": "2025-09-30",
            "time": "25:99"
        }));
    fs::write(ws.store(), store.to_string()).expect("write store");

    ws.cmd(DAY_AFTER)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("Vet visit"))
        .stdout(predicate::str::contains("[vet]"))
        .stdout(predicate::str::contains("Feed").not())
        .stdout(predicate::str::contains("1 total, 0 upcoming"));

    let reminders = ws.reminders();
    assert_eq!(reminders.len(), 1);
    assert_eq!(reminders[0]["title"], "Vet visit");
    assert_eq!(ws.pending().len(), 4);
}

#[test]
fn list_flags_upcoming_and_filters_by_title() {
    let ws = Workspace::new();
    ws.add_feed();
    ws.cmd(DAY_BEFORE)
        .args(["add", "--title", "Evening walk", "--date", "2025-09-20", "--time", "6:00 PM"])
        .assert()
        .success();

    ws.cmd(DAY_BEFORE)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("URGENT"))
        .stdout(predicate::str::contains("2 total, 1 upcoming"));

    ws.cmd(DAY_BEFORE)
        .args(["list", "--search", "WALK"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Evening walk"))
        .stdout(predicate::str::contains("1 total, 0 upcoming"));
}

#[test]
fn offset_override_shifts_every_trigger() {
    let ws = Workspace::new();
    ws.cmd("2025-09-17T00:00:00Z")
        .args(["--utc-offset", "+00:00"])
        .args(["add", "--title", "Feed", "--date", "2025-09-18", "--time", "10:00 AM"])
        .assert()
        .success();

    let last = ws.pending().last().cloned().expect("exact trigger");
    let fire_at = DateTime::parse_from_rfc3339(last["fireAt"].as_str().expect("fireAt"))
        .expect("rfc3339");
    assert_eq!(fire_at.to_rfc3339(), "2025-09-18T10:00:00+00:00");
}

#[test]
fn malformed_store_fails_with_clear_error() {
    let ws = Workspace::new();
    fs::write(ws.store(), "{ not-valid-json ").expect("write invalid json");

    ws.cmd(DAY_BEFORE)
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid JSON"));
}

#[test]
fn invalid_now_is_reported() {
    let ws = Workspace::new();
    ws.cmd("yesterday")
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid --now"));
}
