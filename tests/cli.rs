use std::fs;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::tempdir;

fn gap_schedule_json() -> &'static str {
    r##"
[
  {
    "name": "Morning",
    "time": "06h00 – 07h00",
    "start": 360,
    "end": 420,
    "color": "bg-gray-300",
    "hexColor": "#d1d5db",
    "description": "Only the morning is covered"
  }
]
"##
}

#[test]
fn status_with_missing_file_uses_default_schedule() {
    let dir = tempdir().expect("tempdir");
    let quarts = dir.path().join("quarts.json");

    let mut cmd = cargo_bin_cmd!("quartclock");
    cmd.arg("--status")
        .arg("--at")
        .arg("07:15")
        .arg("--quarts")
        .arg(&quarts)
        .assert()
        .success()
        .stdout(predicate::str::contains("Quart Alpha"))
        .stdout(predicate::str::contains("Progress: 50.00%"));

    assert!(!quarts.exists(), "status must not write the fallback");
}

#[test]
fn status_reports_progress_across_midnight() {
    let dir = tempdir().expect("tempdir");

    let mut cmd = cargo_bin_cmd!("quartclock");
    cmd.arg("--status")
        .arg("--at")
        .arg("23:30")
        .arg("--quarts")
        .arg(dir.path().join("quarts.json"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Quart Silence"))
        .stdout(predicate::str::contains("Progress: 7.14%"));
}

#[test]
fn malformed_schedule_falls_back_to_defaults() {
    let dir = tempdir().expect("tempdir");
    let quarts = dir.path().join("quarts.json");
    fs::write(&quarts, "{ not-valid-json ").expect("write invalid json");

    let mut cmd = cargo_bin_cmd!("quartclock");
    cmd.arg("--status")
        .arg("--at")
        .arg("12:30")
        .arg("--quarts")
        .arg(&quarts)
        .assert()
        .success()
        .stdout(predicate::str::contains("Quart Charlie"));

    let untouched = fs::read_to_string(&quarts).expect("read back");
    assert_eq!(untouched, "{ not-valid-json ");
}

#[test]
fn uncovered_minute_reports_no_active_quart() {
    let dir = tempdir().expect("tempdir");
    let quarts = dir.path().join("quarts.json");
    fs::write(&quarts, gap_schedule_json()).expect("write json");

    let mut cmd = cargo_bin_cmd!("quartclock");
    cmd.arg("--status")
        .arg("--at")
        .arg("12:00")
        .arg("--quarts")
        .arg(&quarts)
        .assert()
        .success()
        .stdout(predicate::str::contains("No active quart"))
        .stdout(predicate::str::contains("Progress:").not());
}

#[test]
fn invalid_fixed_time_fails_with_clear_error() {
    let mut cmd = cargo_bin_cmd!("quartclock");
    cmd.arg("--status")
        .arg("--at")
        .arg("25:00")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid --at value"));
}

#[test]
fn zero_tick_period_is_rejected() {
    let mut cmd = cargo_bin_cmd!("quartclock");
    cmd.arg("--status")
        .arg("--tick-secs")
        .arg("0")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--tick-secs must be greater than zero"));
}
