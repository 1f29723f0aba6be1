//! End-to-end dispatch against real child processes.
//!
//! Fake tools are small shell scripts run as `sh <script> <target>` through
//! an explicit `sh` override, so each test controls exactly what the tool
//! does to the file.

#![cfg(unix)]
#![cfg_attr(
    test,
    allow(
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::missing_panics_doc,
        clippy::tests_outside_test_module,
        reason = "Test allows"
    )
)]

use core::time::Duration;
use std::fs;
use std::path::{Path, PathBuf};

use devtools_core::{DetectionMethod, OperationReport, ResultEnvelope, ToolingConfig};
use devtools_tooling::{Dispatcher, backup_path_for};
use serde_json::{Map, Value, json};
use tempfile::TempDir;
use tokio::time::{sleep, timeout};

/// Write a fake tool script next to the workspace files.
fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, body).expect("write script");
    path
}

fn arguments(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

fn with_script(path_key: &str, tool_key: &str, target: &Path, script: &Path) -> Map<String, Value> {
    arguments(json!({
        path_key: target.to_string_lossy(),
        tool_key: "sh",
        "extra_args": [script.to_string_lossy()],
    }))
}

fn short_format_budget() -> ToolingConfig {
    let mut config = ToolingConfig::default();
    config.timeouts.format_seconds = 1;
    config.timeouts.lint_seconds = 1;
    config
}

#[tokio::test]
async fn test_format_script_rewrites_file() {
    let workspace = TempDir::new().expect("create temp dir");
    let target = workspace.path().join("app.ts");
    fs::write(&target, "const a=[1,2,3]").expect("write target");
    let tool = script(
        workspace.path(),
        "fmt.sh",
        "printf 'const a = [1, 2, 3];\\n' > \"$1\"\necho formatted\n",
    );

    let dispatcher = Dispatcher::with_default_runner(ToolingConfig::default());
    let envelope = dispatcher
        .dispatch("format_code", &with_script("file_path", "formatter", &target, &tool))
        .await;

    let Some(OperationReport::Format(report)) = envelope.report() else {
        panic!("expected format report, got {envelope:?}");
    };
    assert!(report.changed);
    assert_eq!(report.exit_code, 0);
    assert_eq!(report.stdout, "formatted\n");
    assert_eq!(report.detection, DetectionMethod::ExplicitOverride);
    assert_eq!(
        fs::read_to_string(&target).expect("read target"),
        "const a = [1, 2, 3];\n"
    );
    assert!(!backup_path_for(&target).exists());
}

#[tokio::test]
async fn test_crashing_formatter_leaves_file_untouched() {
    let workspace = TempDir::new().expect("create temp dir");
    let target = workspace.path().join("app.ts");
    let original = "const a=[1,2,3]\n\tlet b = 'x'\r\n";
    fs::write(&target, original).expect("write target");
    let tool = script(
        workspace.path(),
        "crash.sh",
        "printf 'const a = [' > \"$1\"\nkill -9 $$\n",
    );

    let dispatcher = Dispatcher::with_default_runner(ToolingConfig::default());
    let envelope = dispatcher
        .dispatch("format_code", &with_script("file_path", "formatter", &target, &tool))
        .await;

    assert_eq!(envelope.error_message(), Some("sh terminated abnormally"));
    assert_eq!(fs::read(&target).expect("read target"), original.as_bytes());
    assert!(!backup_path_for(&target).exists());
}

#[tokio::test]
async fn test_hanging_formatter_is_killed_and_rolled_back() {
    let workspace = TempDir::new().expect("create temp dir");
    let target = workspace.path().join("script.py");
    fs::write(&target, "x=1\n").expect("write target");
    let tool = script(
        workspace.path(),
        "hang.sh",
        "printf 'x = ' > \"$1\"\nsleep 10\n",
    );

    let dispatcher = Dispatcher::with_default_runner(short_format_budget());
    let envelope = dispatcher
        .dispatch("format_code", &with_script("file_path", "formatter", &target, &tool))
        .await;

    assert_eq!(
        envelope.error_message(),
        Some("sh execution timed out after 1s")
    );
    assert_eq!(fs::read_to_string(&target).expect("read target"), "x=1\n");
    assert!(!backup_path_for(&target).exists());
}

#[tokio::test]
async fn test_timed_out_formatter_cannot_write_after_rollback() {
    let workspace = TempDir::new().expect("create temp dir");
    let target = workspace.path().join("script.py");
    fs::write(&target, "x=1\n").expect("write target");
    let tool = script(
        workspace.path(),
        "detach.sh",
        "printf 'x = ' > \"$1\"\n(sleep 2; printf 'LATE WRITE' > \"$1\") &\nsleep 10\n",
    );

    let dispatcher = Dispatcher::with_default_runner(short_format_budget());
    let envelope = dispatcher
        .dispatch("format_code", &with_script("file_path", "formatter", &target, &tool))
        .await;

    assert_eq!(
        envelope.error_message(),
        Some("sh execution timed out after 1s")
    );
    assert_eq!(fs::read_to_string(&target).expect("read target"), "x=1\n");

    sleep(Duration::from_secs(3)).await;
    assert_eq!(fs::read_to_string(&target).expect("read target"), "x=1\n");
    assert!(!backup_path_for(&target).exists());
}

#[tokio::test]
async fn test_formatter_background_job_is_stopped_after_exit() {
    let workspace = TempDir::new().expect("create temp dir");
    let target = workspace.path().join("script.py");
    fs::write(&target, "x=1\n").expect("write target");
    let tool = script(
        workspace.path(),
        "straggler.sh",
        "printf 'x = 1\\n' > \"$1\"\n(sleep 1; printf 'LATE WRITE' > \"$1\") &\nexit 0\n",
    );

    let dispatcher = Dispatcher::with_default_runner(ToolingConfig::default());
    let envelope = dispatcher
        .dispatch("format_code", &with_script("file_path", "formatter", &target, &tool))
        .await;

    let Some(OperationReport::Format(report)) = envelope.report() else {
        panic!("expected format report, got {envelope:?}");
    };
    assert!(report.changed);

    sleep(Duration::from_secs(2)).await;
    assert_eq!(fs::read_to_string(&target).expect("read target"), "x = 1\n");
    assert!(!backup_path_for(&target).exists());
}

#[tokio::test]
async fn test_dropped_format_call_restores_file_and_stops_tool() {
    let workspace = TempDir::new().expect("create temp dir");
    let target = workspace.path().join("script.py");
    fs::write(&target, "x=1\n").expect("write target");
    let tool = script(
        workspace.path(),
        "slow.sh",
        "printf 'x = ' > \"$1\"\n(sleep 2; printf 'LATE WRITE' > \"$1\") &\nsleep 10\n",
    );

    let dispatcher = Dispatcher::with_default_runner(ToolingConfig::default());
    let arguments = with_script("file_path", "formatter", &target, &tool);
    let cancelled = timeout(
        Duration::from_millis(500),
        dispatcher.dispatch("format_code", &arguments),
    )
    .await;

    assert!(cancelled.is_err(), "format finished early: {cancelled:?}");
    assert_eq!(fs::read_to_string(&target).expect("read target"), "x=1\n");
    assert!(!backup_path_for(&target).exists());

    sleep(Duration::from_secs(3)).await;
    assert_eq!(fs::read_to_string(&target).expect("read target"), "x=1\n");
    assert!(!backup_path_for(&target).exists());
}

#[tokio::test]
async fn test_failing_linter_is_a_diagnostic() {
    let workspace = TempDir::new().expect("create temp dir");
    let target = workspace.path().join("module.py");
    fs::write(&target, "import os\n").expect("write target");
    let tool = script(
        workspace.path(),
        "lint.sh",
        "echo \"$1:1:0: W0611 unused import\" >&2\nexit 1\n",
    );

    let dispatcher = Dispatcher::with_default_runner(ToolingConfig::default());
    let envelope = dispatcher
        .dispatch("run_linter", &with_script("file_path", "linter_type", &target, &tool))
        .await;

    let Some(OperationReport::Lint(report)) = envelope.report() else {
        panic!("expected lint report, got {envelope:?}");
    };
    assert_eq!(report.exit_code, 1);
    assert!(!report.passed);
    assert!(report.stderr.contains("W0611 unused import"));
    assert_eq!(fs::read_to_string(&target).expect("read target"), "import os\n");
}

#[tokio::test]
async fn test_test_runner_starts_in_target_directory() {
    let workspace = TempDir::new().expect("create temp dir");
    let tests = workspace.path().join("tests");
    fs::create_dir(&tests).expect("create tests dir");
    fs::write(tests.join("test_math.py"), "def test_add():\n    assert 1 + 1 == 2\n")
        .expect("write test file");
    let tool = script(workspace.path(), "runner.sh", "pwd\nls\n");

    let dispatcher = Dispatcher::with_default_runner(ToolingConfig::default());
    let envelope = dispatcher
        .dispatch("run_tests", &with_script("test_path", "test_framework", &tests, &tool))
        .await;

    let Some(OperationReport::Test(report)) = envelope.report() else {
        panic!("expected test report, got {envelope:?}");
    };
    assert!(report.passed);
    let canonical = fs::canonicalize(&tests).expect("canonicalize");
    assert!(report.stdout.starts_with(&format!("{}\n", canonical.display())));
    assert!(report.stdout.contains("test_math.py"));
}

#[tokio::test]
async fn test_envelope_serializes_for_the_protocol_layer() {
    let workspace = TempDir::new().expect("create temp dir");
    let target = workspace.path().join("notes.md");
    fs::write(&target, "# notes").expect("write target");

    let dispatcher = Dispatcher::with_default_runner(ToolingConfig::default());
    let envelope = dispatcher
        .dispatch("format_code", &arguments(json!({"file_path": target.to_string_lossy()})))
        .await;

    assert!(matches!(envelope, ResultEnvelope::Error { .. }));
    assert_eq!(
        envelope.to_json().expect("serialize"),
        json!({"error": "No formatter available: no tool available for .md files"})
    );
}
