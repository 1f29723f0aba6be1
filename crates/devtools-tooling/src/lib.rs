//! Tool resolution and safe execution for lint, format and test operations.
//!
//! The [`Dispatcher`] is the entry point. It resolves a tool with the
//! [`ToolResolver`], runs it through a [`ProcessRunner`] with a time budget,
//! and wraps formatting in [`mutate_with_rollback`] so a failed run never
//! leaves a half-rewritten file behind.
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
        reason = "Allow for tests"
    )
)]

/// Command templates for known tools.
pub mod catalog;
/// Operation dispatch and envelope conversion.
pub mod dispatcher;
/// External process execution.
pub mod executor;
/// Per-path mutation locks.
pub mod locks;
/// Backup and restore around in-place rewrites.
pub mod mutator;
mod process_group;
/// Extension and directory based tool detection.
pub mod resolver;

pub use catalog::{CATALOG, CommandLine, Launcher, ToolDefinition, build_command, find_tool};
pub use dispatcher::Dispatcher;
pub use executor::{Invocation, ProcessExecutor, ProcessRunner};
pub use locks::{PathLockGuard, PathLocks};
pub use mutator::{BACKUP_SUFFIX, FileBackup, MutationOutcome, backup_path_for, mutate_with_rollback};
pub use resolver::{DetectionRule, ToolResolver, rules_for};
