use std::fs;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::tempdir;

// Nothing listens on the discard port, so every request fails fast.
const UNREACHABLE_DEVICE: &str = "http://127.0.0.1:9";

#[test]
fn watch_keeps_ticking_from_midnight_when_device_is_unreachable() {
    let mut cmd = cargo_bin_cmd!("pandapanel");
    cmd.arg("watch")
        .arg("--ticks")
        .arg("2")
        .arg("--tick-ms")
        .arg("50")
        .arg("--timeout-ms")
        .arg("300")
        .arg("--device")
        .arg(UNREACHABLE_DEVICE)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("00:00:0"))
        .stdout(predicate::str::contains("alarm 07:00 (off)"));
}

#[test]
fn watch_honours_initial_view_fragment() {
    let mut cmd = cargo_bin_cmd!("pandapanel");
    cmd.arg("watch")
        .arg("--ticks")
        .arg("1")
        .arg("--view")
        .arg("#ALARM")
        .arg("--timeout-ms")
        .arg("300")
        .arg("--device")
        .arg(UNREACHABLE_DEVICE)
        .assert()
        .success()
        .stdout(predicate::str::contains("| ALARM |"));
}

#[test]
fn status_fails_when_device_is_unreachable() {
    let mut cmd = cargo_bin_cmd!("pandapanel");
    cmd.arg("status")
        .arg("--timeout-ms")
        .arg("300")
        .arg("--device")
        .arg(UNREACHABLE_DEVICE)
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to fetch device settings"));
}

#[test]
fn malformed_config_fails_with_clear_error() {
    let dir = tempdir().expect("tempdir");
    let config = dir.path().join("panel.json");
    fs::write(&config, "{ not-valid-json ").expect("write invalid json");

    let mut cmd = cargo_bin_cmd!("pandapanel");
    cmd.arg("watch")
        .arg("--ticks")
        .arg("1")
        .arg("--config")
        .arg(config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid JSON"));
}

#[test]
fn unsupported_config_version_is_rejected() {
    let dir = tempdir().expect("tempdir");
    let config = dir.path().join("panel.json");
    fs::write(&config, r#"{ "version": 7 }"#).expect("write json");

    let mut cmd = cargo_bin_cmd!("pandapanel");
    cmd.arg("status")
        .arg("--config")
        .arg(config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsupported panel config version 7"));
}

#[test]
fn config_file_supplies_device_url() {
    let dir = tempdir().expect("tempdir");
    let config = dir.path().join("panel.json");
    fs::write(
        &config,
        format!(
            r#"{{ "version": 1, "device_url": "{UNREACHABLE_DEVICE}", "request_timeout_ms": 300, "tick_interval_ms": 50 }}"#
        ),
    )
    .expect("write json");

    let mut cmd = cargo_bin_cmd!("pandapanel");
    cmd.arg("watch")
        .arg("--ticks")
        .arg("1")
        .arg("--config")
        .arg(config)
        .assert()
        .success()
        .stdout(predicate::str::contains("00:00:0"));
}

#[test]
fn zero_length_timer_is_rejected_before_contacting_device() {
    let mut cmd = cargo_bin_cmd!("pandapanel");
    cmd.arg("timer")
        .arg("--minutes")
        .arg("0")
        .arg("--device")
        .arg(UNREACHABLE_DEVICE)
        .assert()
        .failure()
        .stderr(predicate::str::contains("at least one minute"));
}

#[test]
fn twelve_hour_form_rejects_hour_thirteen() {
    let mut cmd = cargo_bin_cmd!("pandapanel");
    cmd.arg("alarm")
        .arg("--hour")
        .arg("13")
        .arg("--minute")
        .arg("0")
        .arg("--meridiem")
        .arg("PM")
        .arg("--device")
        .arg(UNREACHABLE_DEVICE)
        .assert()
        .failure()
        .stderr(predicate::str::contains("12-hour clock"));
}
