//! Rule-chain tool detection.
//!
//! Each operation has an ordered list of [`DetectionRule`]s evaluated until
//! one matches. Adding an extension or a probe is a table change.

use std::ffi::OsStr;
use std::io::Error as IoError;
use std::path::{Path, PathBuf};

use devtools_core::{
    DetectionMethod, Error, OperationKind, Result, ToolSelection, ToolingConfig,
};
use glob::{Pattern, glob};
use tokio::fs::metadata;
use tokio::task::spawn_blocking;
use tracing::{debug, warn};

/// A single detection rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionRule {
    /// The file's extension is one of `extensions` (case-insensitive).
    Extension {
        /// Extensions without the leading dot
        extensions: &'static [&'static str],
        /// Tool selected on match
        tool: &'static str,
    },
    /// The directory contains `file_name` at its root.
    ConfigFile {
        /// File name to look for
        file_name: &'static str,
        /// Tool selected on match
        tool: &'static str,
    },
    /// Some file at the directory root matches the glob `pattern`.
    NamePattern {
        /// Glob relative to the directory
        pattern: &'static str,
        /// Tool selected on match
        tool: &'static str,
    },
}

/// Lint rules for single files.
pub const LINT_RULES: &[DetectionRule] = &[
    DetectionRule::Extension {
        extensions: &["py"],
        tool: "pylint",
    },
    DetectionRule::Extension {
        extensions: &["js", "ts"],
        tool: "eslint",
    },
    DetectionRule::Extension {
        extensions: &["go"],
        tool: "golint",
    },
];

/// Format rules for single files.
pub const FORMAT_RULES: &[DetectionRule] = &[
    DetectionRule::Extension {
        extensions: &["py"],
        tool: "black",
    },
    DetectionRule::Extension {
        extensions: &["js", "ts"],
        tool: "prettier",
    },
    DetectionRule::Extension {
        extensions: &["go"],
        tool: "gofmt",
    },
];

/// Test rules for single files.
pub const TEST_FILE_RULES: &[DetectionRule] = &[
    DetectionRule::Extension {
        extensions: &["py"],
        tool: "pytest",
    },
    DetectionRule::Extension {
        extensions: &["js", "ts"],
        tool: "jest",
    },
];

/// Test rules for directories: configuration files first, then naming conventions.
pub const TEST_DIRECTORY_RULES: &[DetectionRule] = &[
    DetectionRule::ConfigFile {
        file_name: "pytest.ini",
        tool: "pytest",
    },
    DetectionRule::ConfigFile {
        file_name: "conftest.py",
        tool: "pytest",
    },
    DetectionRule::ConfigFile {
        file_name: "jest.config.js",
        tool: "jest",
    },
    DetectionRule::ConfigFile {
        file_name: "jest.config.ts",
        tool: "jest",
    },
    DetectionRule::NamePattern {
        pattern: "test_*.py",
        tool: "pytest",
    },
    DetectionRule::NamePattern {
        pattern: "*_test.py",
        tool: "pytest",
    },
    DetectionRule::NamePattern {
        pattern: "*.test.js",
        tool: "jest",
    },
    DetectionRule::NamePattern {
        pattern: "*.test.ts",
        tool: "jest",
    },
];

impl DetectionRule {
    /// Tool selected when this rule matches.
    pub fn tool(&self) -> &'static str {
        match *self {
            Self::Extension { tool, .. }
            | Self::ConfigFile { tool, .. }
            | Self::NamePattern { tool, .. } => tool,
        }
    }

    /// Detection method reported when this rule matches.
    pub fn method(&self) -> DetectionMethod {
        match self {
            Self::Extension { .. } => DetectionMethod::ExtensionMatch,
            Self::ConfigFile { .. } | Self::NamePattern { .. } => DetectionMethod::DirectoryProbe,
        }
    }

    /// Whether the rule matches `target`.
    ///
    /// Directory rules touch the filesystem, so call this from a blocking
    /// context.
    pub fn matches(&self, target: &Path) -> bool {
        match *self {
            Self::Extension { extensions, .. } => {
                extension_of(target).is_some_and(|extension| {
                    extensions
                        .iter()
                        .any(|candidate| candidate.eq_ignore_ascii_case(extension))
                })
            }
            Self::ConfigFile { file_name, .. } => target.join(file_name).is_file(),
            Self::NamePattern { pattern, .. } => any_file_matches(target, pattern),
        }
    }
}

fn extension_of(target: &Path) -> Option<&str> {
    target.extension().and_then(OsStr::to_str)
}

fn any_file_matches(directory: &Path, pattern: &str) -> bool {
    let escaped = PathBuf::from(Pattern::escape(&directory.to_string_lossy())).join(pattern);
    match glob(&escaped.to_string_lossy()) {
        Ok(mut paths) => paths.any(|entry| entry.is_ok_and(|path| path.is_file())),
        Err(error) => {
            debug!("Invalid probe pattern {escaped:?}: {error}");
            false
        }
    }
}

/// Rules evaluated for an operation on a file or directory.
pub fn rules_for(kind: OperationKind, is_directory: bool) -> &'static [DetectionRule] {
    match (kind, is_directory) {
        (OperationKind::Lint | OperationKind::Format, true) => &[],
        (OperationKind::Lint, false) => LINT_RULES,
        (OperationKind::Format, false) => FORMAT_RULES,
        (OperationKind::Test, false) => TEST_FILE_RULES,
        (OperationKind::Test, true) => TEST_DIRECTORY_RULES,
    }
}

/// Maps an operation and target to a concrete tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolResolver {
    default_test_framework: String,
}

impl ToolResolver {
    /// Create a resolver with the given fallback test framework.
    pub fn new(default_test_framework: impl Into<String>) -> Self {
        Self {
            default_test_framework: default_test_framework.into(),
        }
    }

    /// Create a resolver from configuration.
    pub fn from_config(config: &ToolingConfig) -> Self {
        Self::new(config.detection.default_test_framework.clone())
    }

    /// Resolve the tool for `kind` on `target`.
    ///
    /// Order: explicit override, then the operation's rule chain, then (for
    /// tests on a directory only) the default framework. The override is used
    /// exactly as given; only an empty string counts as absent.
    ///
    /// # Errors
    /// Returns `UnresolvableTool` if nothing applies, or `Io` if the probe
    /// task could not run.
    pub async fn resolve(
        &self,
        kind: OperationKind,
        target: &Path,
        tool_override: Option<&str>,
    ) -> Result<ToolSelection> {
        if let Some(tool) = tool_override.filter(|tool| !tool.is_empty()) {
            debug!("Using explicit {} override `{tool}`", kind.tool_noun());
            return Ok(ToolSelection::new(tool, DetectionMethod::ExplicitOverride));
        }

        let is_directory = metadata(target).await.is_ok_and(|meta| meta.is_dir());
        let rules = rules_for(kind, is_directory);
        let probed = target.to_path_buf();
        let matched = spawn_blocking(move || {
            rules.iter().find(|rule| rule.matches(&probed)).copied()
        })
        .await
        .map_err(IoError::other)?;

        if let Some(rule) = matched {
            debug!("Detected {} `{}` for {target:?}", kind.tool_noun(), rule.tool());
            return Ok(ToolSelection::new(rule.tool(), rule.method()));
        }

        if kind == OperationKind::Test && is_directory {
            warn!(
                "No test configuration or test files found in {target:?}, falling back to `{}`",
                self.default_test_framework
            );
            return Ok(ToolSelection::new(
                self.default_test_framework.clone(),
                DetectionMethod::DefaultFallback,
            ));
        }

        let reason = if is_directory {
            format!("{} is a directory", target.display())
        } else {
            match extension_of(target) {
                Some(extension) => format!("no tool available for .{extension} files"),
                None => format!("{} has no file extension", target.display()),
            }
        };
        Err(Error::UnresolvableTool { kind, reason })
    }
}

impl Default for ToolResolver {
    fn default() -> Self {
        Self::from_config(&ToolingConfig::default())
    }
}
