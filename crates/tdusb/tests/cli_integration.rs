//! Integration tests for the `td-usb` binary.
//!
//! These tests exercise the CLI binary via `assert_cmd`. Commands that would
//! talk to hardware are only run down paths that fail or finish before a
//! device is opened, and every run points `--config` at a temp file so the
//! user's real configuration is never read.

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

fn cli() -> assert_cmd::Command {
    cargo_bin_cmd!("td-usb")
}

/// `td-usb --config <dir>/config.toml ...`
fn cli_with_config(dir: &Path) -> assert_cmd::Command {
    let mut cmd = cli();
    cmd.arg("--config").arg(dir.join("config.toml"));
    cmd
}

#[test]
fn cli_help_succeeds() {
    cli()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("td-usb"));
}

#[test]
fn cli_version_prints_version() {
    cli()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn cli_models_lists_supported_devices() {
    cli()
        .arg("models")
        .assert()
        .success()
        .stdout(predicate::str::contains("IWT120").and(predicate::str::contains("TDDEV2")));
}

#[test]
fn cli_models_json_is_array() {
    let output = cli()
        .args(["--json", "models"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json: serde_json::Value =
        serde_json::from_slice(&output).expect("models --json should produce valid JSON");
    let models = json.as_array().expect("array of models");
    assert!(models.iter().any(|m| m["name"] == "IWT120"));
    assert!(models.iter().any(|m| m["protocol"] == "register"));
}

#[test]
fn cli_config_json_produces_valid_json() {
    let dir = tempfile::tempdir().unwrap();
    let output = cli_with_config(dir.path())
        .args(["--json", "config"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let json: serde_json::Value =
        serde_json::from_slice(&output).expect("config --json should produce valid JSON");
    assert!(
        json["settings"].is_object(),
        "JSON output should contain 'settings' object"
    );
    assert_eq!(json["config_file_exists"], false);
    assert_eq!(json["settings"]["soft_deadline_ms"], 1000);
}

#[test]
fn cli_config_reads_custom_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("config.toml"),
        "default_model = \"TDDEV2\"\nmax_retries = 5\n",
    )
    .unwrap();
    cli_with_config(dir.path())
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("(loaded)").and(predicate::str::contains("TDDEV2")));
}

#[test]
fn cli_config_reports_problems() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("config.toml"), "max_retries = 0\n").unwrap();
    cli_with_config(dir.path())
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("max_retries must be at least 1"));
}

// ── --verbose flag ──

#[test]
fn cli_verbose_flag_accepted() {
    let dir = tempfile::tempdir().unwrap();
    cli_with_config(dir.path())
        .args(["-v", "config"])
        .assert()
        .success();
}

#[test]
fn cli_verbose_long_flag_accepted() {
    let dir = tempfile::tempdir().unwrap();
    cli_with_config(dir.path())
        .args(["--verbose", "config"])
        .assert()
        .success();
}

// ── Exit codes ──

#[test]
fn cli_unknown_model_is_invalid_option() {
    cli()
        .args(["get", "IWT999"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Unknown model: IWT999"));
}

#[test]
fn cli_bad_register_address_is_invalid_option() {
    cli().args(["read-reg", "TDDEV2", "0x10000"]).assert().code(2);
}

#[test]
fn cli_save_on_feature_report_model_is_invalid_option() {
    let dir = tempfile::tempdir().unwrap();
    cli_with_config(dir.path())
        .args(["save", "IWT120"])
        .assert()
        .code(2)
        .stderr(predicate::str::starts_with("Error: Invalid option"));
}

#[test]
fn cli_init_without_device_or_default_is_invalid_option() {
    let dir = tempfile::tempdir().unwrap();
    cli_with_config(dir.path())
        .arg("init")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("default_model"));
}

#[test]
fn cli_invalid_config_is_runtime_error() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("config.toml"),
        "listen_timeout_ms = 2000\nsoft_deadline_ms = 1000\n",
    )
    .unwrap();
    cli_with_config(dir.path())
        .args(["get", "IWT120"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Config error"));
}

#[test]
fn cli_destroy_declined_is_noop() {
    let dir = tempfile::tempdir().unwrap();
    cli_with_config(dir.path())
        .args(["destroy", "TDDEV2"])
        .write_stdin("n\n")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Continue? [y/N]").and(predicate::str::contains("abort.")),
        );
}

// ── Subcommand help ──
// Device-requiring commands tested via --help to avoid platform-dependent errors.

#[test]
fn cli_set_help_succeeds() {
    cli()
        .args(["set", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("MODEL[:SERIAL]"));
}

#[test]
fn cli_get_help_succeeds() {
    cli()
        .args(["get", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Read a device value"));
}

#[test]
fn cli_destroy_help_mentions_yes() {
    cli()
        .args(["destroy", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--yes"));
}

#[test]
fn cli_write_reg_help_succeeds() {
    cli()
        .args(["write-reg", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Register address"));
}
