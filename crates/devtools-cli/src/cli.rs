use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "devtools")]
#[command(about = "Run linters, formatters and test suites with automatic tool detection", long_about = None)]
pub struct Cli {
    #[arg(long, global = true, help = "Configuration file (defaults to ~/.devtools/config.toml)")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Target and tool selection shared by the operation subcommands.
#[derive(Args, Debug)]
pub struct TargetArgs {
    #[arg(help = "File or directory to run against")]
    pub path: PathBuf,

    #[arg(short, long, help = "Tool to use instead of detecting one")]
    pub tool: Option<String>,

    #[arg(long = "extra-arg", allow_hyphen_values = true, help = "Extra argument passed to the tool (repeatable)")]
    pub extra_args: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(about = "Lint a source file")]
    Lint(TargetArgs),

    #[command(about = "Format a source file in place")]
    Format(TargetArgs),

    #[command(about = "Run tests for a file or directory")]
    Test(TargetArgs),

    #[command(about = "Dispatch an operation by name with JSON arguments")]
    Call {
        #[arg(help = "Operation name (run_linter, format_code, run_tests)")]
        operation: String,

        #[arg(long, default_value = "{}", help = "Arguments as a JSON object")]
        args: String,
    },

    #[command(about = "Show the active configuration")]
    Config,
}
