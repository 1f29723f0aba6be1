//! Request, selection and outcome types shared by the resolver, executor and dispatcher.

use core::fmt;
use core::str::FromStr;
use core::time::Duration;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Override value that means "detect the tool for me".
pub const AUTO_TOOL: &str = "auto";

/// Named argument holding extra command-line arguments for the tool.
pub const EXTRA_ARGS_ARGUMENT: &str = "extra_args";

/// Generic target path argument accepted by every operation.
const GENERIC_PATH_ARGUMENT: &str = "path";

/// Generic tool override argument accepted by every operation.
const GENERIC_TOOL_ARGUMENT: &str = "tool";

/// One of the supported development operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Run a linter over a file.
    Lint,
    /// Rewrite a file in place with a formatter.
    Format,
    /// Run a test suite for a file or directory.
    Test,
}

impl OperationKind {
    /// All operation kinds in a fixed order.
    pub const ALL: [Self; 3] = [Self::Lint, Self::Format, Self::Test];

    /// Canonical operation name used by the protocol layer.
    pub fn name(self) -> &'static str {
        match self {
            Self::Lint => "run_linter",
            Self::Format => "format_code",
            Self::Test => "run_tests",
        }
    }

    /// Short alias accepted alongside [`Self::name`].
    pub fn alias(self) -> &'static str {
        match self {
            Self::Lint => "lint",
            Self::Format => "format",
            Self::Test => "test",
        }
    }

    /// Argument key holding the target path.
    pub fn path_argument(self) -> &'static str {
        match self {
            Self::Lint | Self::Format => "file_path",
            Self::Test => "test_path",
        }
    }

    /// Argument key holding the explicit tool override.
    pub fn tool_argument(self) -> &'static str {
        match self {
            Self::Lint => "linter_type",
            Self::Format => "formatter",
            Self::Test => "test_framework",
        }
    }

    /// What the resolved tool is called in messages.
    pub fn tool_noun(self) -> &'static str {
        match self {
            Self::Lint => "linter",
            Self::Format => "formatter",
            Self::Test => "test framework",
        }
    }

    /// Whether the operation rewrites the target in place.
    pub fn is_mutating(self) -> bool {
        matches!(self, Self::Format)
    }
}

impl FromStr for OperationKind {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == name || kind.alias() == name)
            .ok_or_else(|| Error::UnknownOperation(name.to_owned()))
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.name())
    }
}

/// A single validated request for one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationRequest {
    /// Operation to run.
    pub kind: OperationKind,
    /// File or directory the tool runs against.
    pub target: PathBuf,
    /// Tool named explicitly by the caller, bypassing detection.
    pub tool_override: Option<String>,
    /// Extra arguments placed before the target path.
    pub extra_args: Vec<String>,
}

impl OperationRequest {
    /// Create a request with no override and no extra arguments.
    pub fn new(kind: OperationKind, target: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            target: target.into(),
            tool_override: None,
            extra_args: Vec::new(),
        }
    }

    /// Set the explicit tool override. `""` and `auto` clear it; anything else
    /// is kept exactly as given.
    #[must_use]
    pub fn with_tool_override(mut self, tool: Option<impl Into<String>>) -> Self {
        self.tool_override = tool
            .map(Into::into)
            .filter(|tool: &String| !tool.is_empty() && tool != AUTO_TOOL);
        self
    }

    /// Set extra arguments passed to the tool.
    #[must_use]
    pub fn with_extra_args(mut self, extra_args: Vec<String>) -> Self {
        self.extra_args = extra_args;
        self
    }

    /// Build a request from the protocol layer's named arguments.
    ///
    /// # Errors
    /// Returns an error if the target path is missing or empty, or if
    /// `extra_args` is not an array of strings.
    pub fn from_arguments(kind: OperationKind, arguments: &Map<String, Value>) -> Result<Self> {
        let target = string_argument(arguments, kind.path_argument())
            .or_else(|| string_argument(arguments, GENERIC_PATH_ARGUMENT))
            .filter(|path| !path.trim().is_empty())
            .ok_or(Error::MissingArgument(kind.path_argument()))?;

        let tool = string_argument(arguments, kind.tool_argument())
            .or_else(|| string_argument(arguments, GENERIC_TOOL_ARGUMENT));

        let extra_args = match arguments.get(EXTRA_ARGS_ARGUMENT) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(values)) => values
                .iter()
                .map(|value| {
                    value
                        .as_str()
                        .map(str::to_owned)
                        .ok_or_else(|| Error::InvalidArgument {
                            name: EXTRA_ARGS_ARGUMENT,
                            reason: format!("expected a string, got {value}"),
                        })
                })
                .collect::<Result<Vec<_>>>()?,
            Some(other) => {
                return Err(Error::InvalidArgument {
                    name: EXTRA_ARGS_ARGUMENT,
                    reason: format!("expected an array of strings, got {other}"),
                });
            }
        };

        Ok(Self::new(kind, target)
            .with_tool_override(tool)
            .with_extra_args(extra_args))
    }
}

fn string_argument<'args>(arguments: &'args Map<String, Value>, key: &str) -> Option<&'args str> {
    arguments.get(key).and_then(Value::as_str)
}

/// How the resolver arrived at a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    /// The caller named the tool.
    ExplicitOverride,
    /// The file extension matched a rule.
    ExtensionMatch,
    /// A configuration file or file-name pattern was found in the directory.
    DirectoryProbe,
    /// Nothing matched and the configured default was used.
    DefaultFallback,
}

impl DetectionMethod {
    /// Whether the selection is a guess rather than a confident match.
    pub fn is_fallback(self) -> bool {
        matches!(self, Self::DefaultFallback)
    }
}

/// A resolved tool and how it was found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSelection {
    /// Tool identifier, either a catalog id or a verbatim override.
    pub tool: String,
    /// Detection method used.
    pub method: DetectionMethod,
}

impl ToolSelection {
    /// Create a selection.
    pub fn new(tool: impl Into<String>, method: DetectionMethod) -> Self {
        Self {
            tool: tool.into(),
            method,
        }
    }
}

/// How an external process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessStatus {
    /// The process exited on its own with this code.
    Exited(i32),
    /// The process was killed by a signal without an exit code.
    Terminated,
    /// The time budget elapsed and the process was killed.
    TimedOut,
    /// The process could not be started.
    LaunchFailed(String),
}

/// Captured result of one external process run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutcome {
    /// How the process ended.
    pub status: ProcessStatus,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Wall-clock time from launch to exit or kill.
    pub duration: Duration,
}

impl ProcessOutcome {
    /// Outcome for a process that never started.
    pub fn launch_failed(reason: impl Into<String>) -> Self {
        Self {
            status: ProcessStatus::LaunchFailed(reason.into()),
            stdout: String::new(),
            stderr: String::new(),
            duration: Duration::ZERO,
        }
    }

    /// Exit code, or `-1` when the process did not exit normally.
    pub fn exit_code(&self) -> i32 {
        match self.status {
            ProcessStatus::Exited(code) => code,
            ProcessStatus::Terminated | ProcessStatus::TimedOut | ProcessStatus::LaunchFailed(_) => {
                -1
            }
        }
    }

    /// Whether the process exited with code zero.
    pub fn success(&self) -> bool {
        self.status == ProcessStatus::Exited(0)
    }

    /// Duration in whole milliseconds.
    pub fn duration_ms(&self) -> u64 {
        self.duration.as_millis() as u64
    }
}
