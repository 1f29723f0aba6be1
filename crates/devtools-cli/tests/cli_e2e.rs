//! End-to-end CLI tests using `assert_cmd`
#![cfg_attr(
    test,
    allow(
        dead_code,
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::missing_panics_doc,
        clippy::missing_errors_doc,
        clippy::print_stdout,
        clippy::print_stderr,
        clippy::tests_outside_test_module,
        reason = "Test allows"
    )
)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Binary with `HOME` pointed at `home` so no real config is touched.
fn cargo_bin(home: &Path) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_devtools"));
    command.env("HOME", home).env("RUST_LOG", "off");
    command
}

fn temp_dir() -> TempDir {
    TempDir::new().unwrap_or_else(|err| panic!("Failed to create temp dir: {err}"))
}

#[test]
fn test_cli_help() {
    let home = temp_dir();
    cargo_bin(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage"));
}

#[test]
fn test_missing_file_is_error_envelope() {
    let home = temp_dir();
    cargo_bin(home.path())
        .args(["lint", "does/not/exist.py"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("\"error\": \"Path not found: does/not/exist.py\""));
}

#[test]
fn test_unmapped_extension_reports_no_linter() {
    let home = temp_dir();
    let workspace = temp_dir();
    let notes = workspace.path().join("notes.txt");
    fs::write(&notes, "hello").unwrap();

    cargo_bin(home.path())
        .arg("lint")
        .arg(&notes)
        .assert()
        .failure()
        .stdout(predicate::str::contains("No linter available"));
}

#[test]
fn test_call_rejects_unknown_operation() {
    let home = temp_dir();
    cargo_bin(home.path())
        .args(["call", "deploy", "--args", "{\"path\": \".\"}"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Unknown operation: deploy"));
}

#[test]
fn test_call_requires_object_arguments() {
    let home = temp_dir();
    cargo_bin(home.path())
        .args(["call", "run_linter", "--args", "[1, 2]"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--args must be a JSON object"));
}

#[test]
fn test_config_creates_default_file() {
    let home = temp_dir();
    cargo_bin(home.path())
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"test_seconds\": 120"))
        .stdout(predicate::str::contains("\"default_test_framework\": \"pytest\""));

    let written = fs::read_to_string(home.path().join(".devtools/config.toml")).unwrap();
    assert!(written.contains("lint_seconds = 30"));
}

#[test]
fn test_explicit_config_file_is_used() {
    let home = temp_dir();
    let config = home.path().join("custom.toml");
    fs::write(&config, "[timeouts]\nlint_seconds = 7\n").unwrap();

    cargo_bin(home.path())
        .arg("--config")
        .arg(&config)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"lint_seconds\": 7"))
        .stdout(predicate::str::contains("\"format_seconds\": 30"));
}

#[cfg(unix)]
#[test]
fn test_format_with_script_override() {
    let home = temp_dir();
    let workspace = temp_dir();
    let target = workspace.path().join("main.go");
    fs::write(&target, "package main").unwrap();
    let script = workspace.path().join("fmt.sh");
    fs::write(&script, "printf 'package main\\n' > \"$1\"\n").unwrap();

    cargo_bin(home.path())
        .arg("format")
        .arg(&target)
        .args(["--tool", "sh", "--extra-arg"])
        .arg(&script)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"formatter\": \"sh\""))
        .stdout(predicate::str::contains("\"changed\": true"))
        .stdout(predicate::str::contains("\"detection\": \"explicit_override\""));

    assert_eq!(fs::read_to_string(&target).unwrap(), "package main\n");
    assert!(!workspace.path().join("main.go.bak").exists());
}
