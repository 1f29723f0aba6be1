//! Uniform success-or-error value returned by every dispatch call.

use serde::{Deserialize, Serialize};
use serde_json::{to_string_pretty, to_value, Value};

use crate::error::{Error, Result};
use crate::types::{DetectionMethod, ProcessOutcome, ToolSelection};

/// Report for a lint run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LintReport {
    /// Linter that ran.
    pub linter: String,
    /// How the linter was selected.
    pub detection: DetectionMethod,
    /// Process exit code (`-1` if terminated by a signal).
    pub exit_code: i32,
    /// Whether the linter exited cleanly.
    pub passed: bool,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Linted file.
    pub file: String,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

/// Report for a format run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatReport {
    /// Formatter that ran.
    pub formatter: String,
    /// How the formatter was selected.
    pub detection: DetectionMethod,
    /// Process exit code.
    pub exit_code: i32,
    /// Whether the file content differs from before the run.
    pub changed: bool,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Formatted file.
    pub file: String,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

/// Report for a test run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestReport {
    /// Test framework that ran.
    pub framework: String,
    /// How the framework was selected.
    pub detection: DetectionMethod,
    /// Process exit code (`-1` if terminated by a signal).
    pub exit_code: i32,
    /// Whether the test run exited cleanly.
    pub passed: bool,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// File or directory the tests ran against.
    pub test_path: String,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

impl LintReport {
    /// Build from a selection and the linter's outcome.
    pub fn new(selection: ToolSelection, file: String, outcome: ProcessOutcome) -> Self {
        Self {
            linter: selection.tool,
            detection: selection.method,
            exit_code: outcome.exit_code(),
            passed: outcome.success(),
            duration_ms: outcome.duration_ms(),
            stdout: outcome.stdout,
            stderr: outcome.stderr,
            file,
        }
    }
}

impl TestReport {
    /// Build from a selection and the test runner's outcome.
    pub fn new(selection: ToolSelection, test_path: String, outcome: ProcessOutcome) -> Self {
        Self {
            framework: selection.tool,
            detection: selection.method,
            exit_code: outcome.exit_code(),
            passed: outcome.success(),
            duration_ms: outcome.duration_ms(),
            stdout: outcome.stdout,
            stderr: outcome.stderr,
            test_path,
        }
    }
}

/// Operation-specific success payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OperationReport {
    /// Lint result.
    Lint(LintReport),
    /// Format result.
    Format(FormatReport),
    /// Test result.
    Test(TestReport),
}

impl OperationReport {
    /// Exit code of the tool that produced this report.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Lint(report) => report.exit_code,
            Self::Format(report) => report.exit_code,
            Self::Test(report) => report.exit_code,
        }
    }

    /// Tool that produced this report.
    pub fn tool(&self) -> &str {
        match self {
            Self::Lint(report) => &report.linter,
            Self::Format(report) => &report.formatter,
            Self::Test(report) => &report.framework,
        }
    }

    /// How the tool was selected.
    pub fn detection(&self) -> DetectionMethod {
        match self {
            Self::Lint(report) => report.detection,
            Self::Format(report) => report.detection,
            Self::Test(report) => report.detection,
        }
    }
}

/// Exactly one of a success payload or an error message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResultEnvelope {
    /// The operation ran; the payload carries the tool's diagnostics.
    Success(OperationReport),
    /// The operation could not be carried out.
    Error {
        /// Single descriptive message.
        error: String,
    },
}

impl ResultEnvelope {
    /// Create an error envelope.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
        }
    }

    /// Whether this is a success envelope.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Success payload, if any.
    pub fn report(&self) -> Option<&OperationReport> {
        match self {
            Self::Success(report) => Some(report),
            Self::Error { .. } => None,
        }
    }

    /// Error message, if any.
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Success(_) => None,
            Self::Error { error } => Some(error.as_str()),
        }
    }

    /// Structured value for the protocol layer.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<Value> {
        Ok(to_value(self)?)
    }

    /// Pretty-printed JSON text.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn to_json_string(&self) -> Result<String> {
        Ok(to_string_pretty(self)?)
    }
}

impl From<Result<OperationReport>> for ResultEnvelope {
    fn from(result: Result<OperationReport>) -> Self {
        match result {
            Ok(report) => Self::Success(report),
            Err(error) => Self::from(error),
        }
    }
}

impl From<Error> for ResultEnvelope {
    fn from(error: Error) -> Self {
        Self::error(error.to_string())
    }
}
