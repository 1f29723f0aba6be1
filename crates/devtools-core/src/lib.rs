//! Core types for the development tooling dispatcher.
//!
//! This crate provides the data model shared by the resolver, executor and
//! dispatcher: operation requests, tool selections, process outcomes, the
//! uniform result envelope, error handling and configuration.
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
        reason = "Allow for tests"
    )
)]

/// Tool configuration loaded from TOML.
pub mod config;
/// Success-or-error result envelope.
pub mod envelope;
/// Error types and result definitions.
pub mod error;
/// Requests, selections and process outcomes.
pub mod types;

pub use config::{DetectionConfig, LauncherConfig, TimeoutConfig, ToolingConfig};
pub use envelope::{FormatReport, LintReport, OperationReport, ResultEnvelope, TestReport};
pub use error::{Error, Result};
pub use types::{
    AUTO_TOOL, DetectionMethod, EXTRA_ARGS_ARGUMENT, OperationKind, OperationRequest,
    ProcessOutcome, ProcessStatus, ToolSelection,
};
