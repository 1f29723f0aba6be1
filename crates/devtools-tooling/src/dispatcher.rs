//! Public entry point: operation name plus named arguments in, envelope out.
//!
//! Every failure is turned into [`ResultEnvelope::Error`] here, so callers
//! always get a value back. A tool exiting nonzero is a success envelope
//! carrying the tool's diagnostics.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use devtools_core::{
    Error, FormatReport, LintReport, OperationKind, OperationReport, OperationRequest,
    ProcessOutcome, ProcessStatus, Result, ResultEnvelope, TestReport, ToolSelection,
    ToolingConfig,
};
use serde_json::{Map, Value};
use tokio::fs::{canonicalize, metadata, try_exists};
use tracing::{debug, info, warn};

use crate::catalog::build_command;
use crate::executor::{Invocation, ProcessExecutor, ProcessRunner};
use crate::locks::PathLocks;
use crate::mutator::mutate_with_rollback;
use crate::resolver::ToolResolver;

/// Runs lint, format and test operations against the local workspace.
pub struct Dispatcher {
    config: ToolingConfig,
    resolver: ToolResolver,
    runner: Arc<dyn ProcessRunner>,
    locks: Arc<PathLocks>,
}

impl Dispatcher {
    /// Create a dispatcher that launches processes through `runner`.
    pub fn new(config: ToolingConfig, runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            resolver: ToolResolver::from_config(&config),
            config,
            runner,
            locks: PathLocks::new(),
        }
    }

    /// Create a dispatcher backed by real child processes.
    pub fn with_default_runner(config: ToolingConfig) -> Self {
        Self::new(config, Arc::new(ProcessExecutor))
    }

    /// Active configuration.
    pub fn config(&self) -> &ToolingConfig {
        &self.config
    }

    /// Run the named operation with protocol-style arguments.
    pub async fn dispatch(&self, operation: &str, arguments: &Map<String, Value>) -> ResultEnvelope {
        let request = operation
            .parse::<OperationKind>()
            .and_then(|kind| OperationRequest::from_arguments(kind, arguments));
        let result = match request {
            Ok(request) => self.run(request).await,
            Err(error) => Err(error),
        };

        match &result {
            Err(error) if error.is_pre_launch() => info!("{operation} rejected: {error}"),
            Err(error) => warn!("{operation} failed: {error}"),
            Ok(_) => {}
        }
        ResultEnvelope::from(result)
    }

    /// Run an already validated request.
    ///
    /// # Errors
    /// Returns an error for a missing target, an unresolvable tool, a launch
    /// failure, a timeout, or (for format) any failure that forced a rollback.
    pub async fn run(&self, request: OperationRequest) -> Result<OperationReport> {
        let kind = request.kind;
        info!("Running {kind} on {:?}", request.target);

        if !try_exists(&request.target).await? {
            return Err(Error::NotFound(request.target));
        }
        let target = canonicalize(&request.target).await?;
        let is_directory = metadata(&target).await?.is_dir();

        if kind.is_mutating() && is_directory {
            return Err(Error::InvalidArgument {
                name: kind.path_argument(),
                reason: format!("{} is a directory", request.target.display()),
            });
        }

        let selection = self
            .resolver
            .resolve(kind, &target, request.tool_override.as_deref())
            .await?;
        if selection.method.is_fallback() {
            debug!("{kind} on {target:?} uses fallback `{}`", selection.tool);
        }

        let invocation = self.invocation(kind, &selection, &target, is_directory, &request.extra_args);
        let display_path = request.target.display().to_string();

        let report = match kind {
            OperationKind::Lint => {
                let outcome = self.launch(&invocation).await?;
                OperationReport::Lint(LintReport::new(selection, display_path, outcome))
            }
            OperationKind::Test => {
                let outcome = self.launch(&invocation).await?;
                OperationReport::Test(TestReport::new(selection, display_path, outcome))
            }
            OperationKind::Format => {
                OperationReport::Format(self.format(selection, &target, &invocation, display_path).await?)
            }
        };

        info!(
            "{kind} with {} finished: exit code {}",
            report.tool(),
            report.exit_code()
        );
        Ok(report)
    }

    fn invocation(
        &self,
        kind: OperationKind,
        selection: &ToolSelection,
        target: &Path,
        is_directory: bool,
        extra_args: &[String],
    ) -> Invocation {
        let command = build_command(&selection.tool, &self.config.launchers, target, extra_args);
        let working_dir = if is_directory {
            target.to_path_buf()
        } else {
            target.parent().map_or_else(PathBuf::new, Path::to_path_buf)
        };

        Invocation {
            tool: selection.tool.clone(),
            program: command.program,
            args: command.args,
            working_dir,
            timeout: self.config.timeout_for(kind),
        }
    }

    /// Run the formatter inside the backup/restore protocol.
    async fn format(
        &self,
        selection: ToolSelection,
        target: &Path,
        invocation: &Invocation,
        file: String,
    ) -> Result<FormatReport> {
        let _lock = self.locks.lock(target).await;

        let mutation = mutate_with_rollback(target, || async {
            let outcome = self.launch(invocation).await?;
            if outcome.status == ProcessStatus::Terminated {
                return Err(Error::AbnormalTermination {
                    tool: invocation.tool.clone(),
                });
            }
            Ok(outcome)
        })
        .await?;

        let outcome = mutation.value;
        Ok(FormatReport {
            formatter: selection.tool,
            detection: selection.method,
            exit_code: outcome.exit_code(),
            changed: mutation.changed,
            duration_ms: outcome.duration_ms(),
            stdout: outcome.stdout,
            stderr: outcome.stderr,
            file,
        })
    }

    /// Run an invocation, treating launch failures and timeouts as errors.
    async fn launch(&self, invocation: &Invocation) -> Result<ProcessOutcome> {
        let outcome = self.runner.run(invocation).await;
        match &outcome.status {
            ProcessStatus::LaunchFailed(reason) => Err(Error::LaunchFailure {
                program: invocation.program.clone(),
                reason: reason.clone(),
            }),
            ProcessStatus::TimedOut => Err(Error::Timeout {
                tool: invocation.tool.clone(),
                seconds: invocation.timeout.as_secs(),
            }),
            ProcessStatus::Exited(_) | ProcessStatus::Terminated => Ok(outcome),
        }
    }
}
