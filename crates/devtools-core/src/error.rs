use core::result::Result as CoreResult;
use std::io::Error as IoError;
use std::path::PathBuf;

use serde_json::Error as SerdeJsonError;
use thiserror::Error;
use toml::de::Error as TomlError;

use crate::types::OperationKind;

/// Result type for dev-tool operations.
pub type Result<T> = CoreResult<T, Error>;

/// Errors that abort a single dispatch call.
///
/// A tool exiting with a nonzero code is deliberately absent: that is a
/// diagnostic result, not a failure.
#[derive(Debug, Error)]
pub enum Error {
    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// The target path does not exist.
    #[error("Path not found: {}", .0.display())]
    NotFound(PathBuf),

    /// A required named argument was missing or empty.
    #[error("Missing required argument: {0}")]
    MissingArgument(&'static str),

    /// A named argument had the wrong shape.
    #[error("Invalid argument `{name}`: {reason}")]
    InvalidArgument {
        /// Argument name.
        name: &'static str,
        /// What was wrong with it.
        reason: String,
    },

    /// The operation name is not one of the supported operations.
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    /// No override, rule or probe produced a tool.
    #[error("No {} available: {reason}", .kind.tool_noun())]
    UnresolvableTool {
        /// Operation that was being resolved.
        kind: OperationKind,
        /// Why resolution failed.
        reason: String,
    },

    /// The external program could not be started.
    #[error("Failed to launch `{program}`: {reason}")]
    LaunchFailure {
        /// Program that was being launched.
        program: String,
        /// Underlying OS reason.
        reason: String,
    },

    /// The tool exceeded its time budget and was killed.
    #[error("{tool} execution timed out after {seconds}s")]
    Timeout {
        /// Tool identifier.
        tool: String,
        /// Budget that was exceeded.
        seconds: u64,
    },

    /// The tool was terminated by a signal before exiting.
    #[error("{tool} terminated abnormally")]
    AbnormalTermination {
        /// Tool identifier.
        tool: String,
    },

    /// Backup, restore or re-read failed while mutating a file.
    #[error("Mutation failed: {0}")]
    Mutation(String),

    /// The backup slot for a file is already occupied.
    #[error("Backup file already exists: {}", .0.display())]
    BackupExists(PathBuf),

    /// Configuration is invalid or could not be loaded.
    #[error("Configuration error: {0}")]
    Config(String),

    /// TOML deserialization failed.
    #[error("TOML deserialization error: {0}")]
    Toml(#[from] TomlError),

    /// JSON serialization or deserialization failed.
    #[error("JSON serialization error: {0}")]
    Json(#[from] SerdeJsonError),
}

impl Error {
    /// Whether the failure happened before any external process was launched.
    pub fn is_pre_launch(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_)
                | Self::MissingArgument(_)
                | Self::InvalidArgument { .. }
                | Self::UnknownOperation(_)
                | Self::UnresolvableTool { .. }
                | Self::BackupExists(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_error_display() {
        let error1 = Error::MissingArgument("file_path");
        assert_eq!(error1.to_string(), "Missing required argument: file_path");

        let error2 = Error::UnresolvableTool {
            kind: OperationKind::Lint,
            reason: "no tool available for `.txt` files".to_owned(),
        };
        assert_eq!(
            error2.to_string(),
            "No linter available: no tool available for `.txt` files"
        );

        let error3 = Error::Timeout {
            tool: "pytest".to_owned(),
            seconds: 120,
        };
        assert_eq!(error3.to_string(), "pytest execution timed out after 120s");
    }

    #[test]
    fn test_error_is_pre_launch() {
        assert!(Error::NotFound(PathBuf::from("missing.py")).is_pre_launch());
        assert!(Error::UnknownOperation("deploy".to_owned()).is_pre_launch());

        let launch = Error::LaunchFailure {
            program: "nope".to_owned(),
            reason: "No such file or directory".to_owned(),
        };
        assert!(!launch.is_pre_launch());
        assert!(!Error::Mutation("restore failed".to_owned()).is_pre_launch());
    }

    #[test]
    fn test_error_from_io() {
        let io_error = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        let error: Error = io_error.into();
        assert!(matches!(error, Error::Io(_)));
    }
}
