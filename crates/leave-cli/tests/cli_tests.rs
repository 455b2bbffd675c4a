//! Integration tests for the `leaveplan` CLI binary.
//!
//! These tests use `assert_cmd` and `predicates` to run every subcommand through
//! the actual binary, including stdin/stdout piping, file I/O and error exits.

// `Command::cargo_bin` was deprecated in assert_cmd 2.1.2 in favor of
// `cargo::cargo_bin_cmd!`. Allow it until we migrate.
#![allow(deprecated)]

use assert_cmd::Command;
use predicates::prelude::*;

/// Helper: path to the fy2025.json fixture.
fn plan_path() -> &'static str {
    concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/fy2025.json")
}

/// Helper: path to the invalid.json fixture.
fn invalid_path() -> &'static str {
    concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/invalid.json")
}

/// Helper: read the fy2025.json fixture as a string.
fn plan_json() -> String {
    std::fs::read_to_string(plan_path()).expect("fy2025.json fixture must exist")
}

fn leaveplan() -> Command {
    Command::cargo_bin("leaveplan").unwrap()
}

fn stdout_json(output: &std::process::Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).expect("stdout must be JSON")
}

// ---------------------------------------------------------------------------
// long-weekends
// ---------------------------------------------------------------------------

#[test]
fn long_weekends_from_file() {
    let output = leaveplan()
        .args(["long-weekends", "-i", plan_path()])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report = stdout_json(&output);
    let asha = &report["results"]["asha"];
    assert_eq!(asha["count"], 7);
    assert_eq!(asha["subgroups"]["VACATION #005"]["start"], "2025-05-01");
    assert_eq!(asha["subgroups"]["VACATION #005"]["duration"], 4);
    assert_eq!(asha["subgroups"]["VACATION #005"]["values"]["Paid Leave"], 1.0);
    assert_eq!(asha["subgroups"]["VACATION #003"]["values"], serde_json::Value::Null);
    assert_eq!(asha["remaining"]["Paid Leave"], 17.0);
    assert!(report.get("failures").is_none());
}

#[test]
fn long_weekends_from_stdin() {
    leaveplan()
        .arg("long-weekends")
        .write_stdin(plan_json())
        .assert()
        .success()
        .stdout(predicate::str::contains("VACATION #045"));
}

#[test]
fn long_weekends_honours_query_flags() {
    let output = leaveplan()
        .args(["long-weekends", "-i", plan_path(), "--tolerance", "0", "--min-count", "3"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert_eq!(stdout_json(&output)["results"]["asha"]["count"], 3);
}

#[test]
fn long_weekends_rejects_negative_tolerance() {
    leaveplan()
        .args(["long-weekends", "-i", plan_path(), "--tolerance", "-1"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("tolerance"));
}

#[test]
fn long_weekends_to_output_file() {
    let dir = std::env::temp_dir().join(format!("leaveplan-test-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let out = dir.join("report.json");

    leaveplan()
        .args(["long-weekends", "-i", plan_path(), "-o", out.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(written["results"]["asha"]["count"], 7);
    std::fs::remove_dir_all(&dir).ok();
}

// ---------------------------------------------------------------------------
// paid-holidays
// ---------------------------------------------------------------------------

#[test]
fn paid_holidays_reports_total_and_ratio() {
    let output = leaveplan()
        .args(["paid-holidays", "-i", plan_path()])
        .output()
        .unwrap();
    assert!(output.status.success());
    let report = stdout_json(&output);
    assert_eq!(report["results"]["asha"]["total"], 10);
    assert_eq!(report["results"]["asha"]["ratio"], 0.02747);
}

// ---------------------------------------------------------------------------
// calendar
// ---------------------------------------------------------------------------

#[test]
fn calendar_lists_every_off_day() {
    let output = leaveplan()
        .args(["calendar", "-i", plan_path(), "--person", "asha"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let text = String::from_utf8(output.stdout).unwrap();
    assert_eq!(text.lines().count(), 114);
    assert_eq!(text.lines().next(), Some("2025-04-05 weekly_off"));
    assert!(text.contains("2025-04-18 holiday Good Friday\n"));
}

#[test]
fn calendar_unknown_person_fails() {
    leaveplan()
        .args(["calendar", "-i", plan_path(), "--person", "nobody"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown person: 'nobody'"));
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

#[test]
fn validate_accepts_a_good_plan() {
    leaveplan()
        .args(["validate", "-i", plan_path()])
        .assert()
        .success()
        .stdout("ok\n");
}

#[test]
fn validate_lists_field_errors() {
    leaveplan()
        .args(["validate", "-i", invalid_path()])
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains(
            "persons[0].custom_leaves[0].carry_forward_balance",
        ))
        .stderr(predicate::str::contains("1 validation error(s)"));
}

#[test]
fn malformed_input_fails_with_context() {
    leaveplan()
        .arg("paid-holidays")
        .write_stdin("{ not json")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error: Failed to parse plan document"));
}

#[test]
fn missing_file_fails() {
    leaveplan()
        .args(["paid-holidays", "-i", "/nonexistent/plan.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read file"));
}

#[test]
fn verbose_logs_go_to_stderr() {
    let output = leaveplan()
        .args(["-v", "long-weekends", "-i", plan_path()])
        .env_remove("RUST_LOG")
        .output()
        .unwrap();
    assert!(output.status.success());
    // stdout stays valid JSON even with logging enabled
    stdout_json(&output);
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("long weekends planned"));
}
