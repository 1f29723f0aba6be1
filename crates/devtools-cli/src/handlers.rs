use std::io::stderr;
use std::path::Path;

use anyhow::{Context as _, Result};
use devtools_core::{EXTRA_ARGS_ARGUMENT, OperationKind, ResultEnvelope, ToolingConfig};
use devtools_tooling::Dispatcher;
use serde_json::{Map, Value, from_str, to_string_pretty};
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Registry, fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _,
};

use crate::cli::TargetArgs;

/// Route logs to stderr so stdout carries only the result.
pub fn init_logging() {
    Registry::default()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "devtools_tooling=info,devtools_cli=info".into()),
        )
        .with(
            fmt::layer()
                .with_writer(stderr)
                .with_ansi(false)
                .with_target(true)
                .with_level(true),
        )
        .init();
}

/// Load configuration from `path`, or from `~/.devtools/config.toml`.
///
/// Falls back to defaults when the file cannot be loaded.
pub fn load_config(path: Option<&Path>) -> ToolingConfig {
    let loaded = match path {
        Some(path) => ToolingConfig::load_from_file(path),
        None => ToolingConfig::load_or_create(),
    };
    loaded.unwrap_or_else(|error| {
        warn!("Failed to load configuration: {error}");
        warn!("Using default configuration");
        ToolingConfig::default()
    })
}

/// Turn subcommand arguments into the named-argument map the dispatcher takes.
pub fn operation_arguments(kind: OperationKind, target: &TargetArgs) -> Map<String, Value> {
    let mut arguments = Map::new();
    arguments.insert(
        kind.path_argument().to_owned(),
        Value::String(target.path.to_string_lossy().into_owned()),
    );
    if let Some(tool) = &target.tool {
        arguments.insert(kind.tool_argument().to_owned(), Value::String(tool.clone()));
    }
    if !target.extra_args.is_empty() {
        arguments.insert(
            EXTRA_ARGS_ARGUMENT.to_owned(),
            Value::Array(target.extra_args.iter().cloned().map(Value::String).collect()),
        );
    }
    arguments
}

/// Handle `lint`, `format` and `test`.
///
/// # Errors
/// Returns an error if the envelope cannot be printed.
pub async fn handle_operation(
    config: ToolingConfig,
    kind: OperationKind,
    target: &TargetArgs,
) -> Result<bool> {
    let arguments = operation_arguments(kind, target);
    handle_dispatch(config, kind.name(), &arguments).await
}

/// Handle `call <operation> --args <json>`.
///
/// # Errors
/// Returns an error if `args` is not a JSON object or the envelope cannot be
/// printed.
pub async fn handle_call(config: ToolingConfig, operation: &str, args: &str) -> Result<bool> {
    let arguments: Map<String, Value> =
        from_str(args).context("--args must be a JSON object")?;
    handle_dispatch(config, operation, &arguments).await
}

async fn handle_dispatch(
    config: ToolingConfig,
    operation: &str,
    arguments: &Map<String, Value>,
) -> Result<bool> {
    let dispatcher = Dispatcher::with_default_runner(config);
    let envelope = dispatcher.dispatch(operation, arguments).await;
    if let Some(report) = envelope.report() {
        info!("{operation} used {} ({:?})", report.tool(), report.detection());
    }
    print_envelope(&envelope)?;
    Ok(envelope.is_success())
}

fn print_envelope(envelope: &ResultEnvelope) -> Result<()> {
    let text = envelope
        .to_json_string()
        .context("Failed to serialize result")?;
    #[allow(clippy::print_stdout, reason = "Result output")]
    {
        println!("{text}");
    }
    Ok(())
}

/// Handle `config`.
///
/// # Errors
/// Returns an error if the configuration cannot be serialized.
pub fn handle_config(config: &ToolingConfig) -> Result<()> {
    let text = to_string_pretty(config).context("Failed to serialize configuration")?;
    #[allow(clippy::print_stdout, reason = "Configuration output")]
    {
        println!("{text}");
    }
    Ok(())
}
