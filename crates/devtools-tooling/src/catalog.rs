//! Static command templates for the known tools.

use std::path::Path;

use devtools_core::LauncherConfig;

/// How a tool's program is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Launcher {
    /// Run through the configured Python interpreter (`python -m <module>`).
    Python,
    /// Run through the configured node package runner (`npx <tool>`).
    Node,
    /// Run the named executable directly.
    Direct(&'static str),
}

/// Command template for one tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolDefinition {
    /// Identifier reported in results and accepted as an override.
    pub id: &'static str,
    /// Program selection.
    pub launcher: Launcher,
    /// Arguments placed before the target path.
    pub leading_args: &'static [&'static str],
    /// Arguments placed after the target path.
    pub trailing_args: &'static [&'static str],
}

/// Every tool the resolver can select on its own.
pub const CATALOG: &[ToolDefinition] = &[
    ToolDefinition {
        id: "pylint",
        launcher: Launcher::Python,
        leading_args: &["-m", "pylint"],
        trailing_args: &[],
    },
    ToolDefinition {
        id: "eslint",
        launcher: Launcher::Node,
        leading_args: &["eslint"],
        trailing_args: &[],
    },
    ToolDefinition {
        id: "golint",
        launcher: Launcher::Direct("golint"),
        leading_args: &[],
        trailing_args: &[],
    },
    ToolDefinition {
        id: "black",
        launcher: Launcher::Python,
        leading_args: &["-m", "black"],
        trailing_args: &[],
    },
    ToolDefinition {
        id: "prettier",
        launcher: Launcher::Node,
        leading_args: &["prettier", "--write"],
        trailing_args: &[],
    },
    ToolDefinition {
        id: "gofmt",
        launcher: Launcher::Direct("gofmt"),
        leading_args: &["-w"],
        trailing_args: &[],
    },
    ToolDefinition {
        id: "pytest",
        launcher: Launcher::Python,
        leading_args: &["-m", "pytest"],
        trailing_args: &["-v", "--tb=short"],
    },
    ToolDefinition {
        id: "jest",
        launcher: Launcher::Node,
        leading_args: &["jest"],
        trailing_args: &[],
    },
];

/// Look up a catalog entry by id.
pub fn find_tool(id: &str) -> Option<&'static ToolDefinition> {
    CATALOG.iter().find(|definition| definition.id == id)
}

/// Program plus arguments ready to launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    /// Program to launch
    pub program: String,
    /// Arguments in order
    pub args: Vec<String>,
}

/// Build the command for `tool` against `target`.
///
/// Ids outside the catalog are launched verbatim as `<tool> [extra] <target>`.
pub fn build_command(
    tool: &str,
    launchers: &LauncherConfig,
    target: &Path,
    extra_args: &[String],
) -> CommandLine {
    let target_arg = target.to_string_lossy().into_owned();

    let Some(definition) = find_tool(tool) else {
        let mut args = extra_args.to_vec();
        args.push(target_arg);
        return CommandLine {
            program: tool.to_owned(),
            args,
        };
    };

    let program = match definition.launcher {
        Launcher::Python => launchers.python.clone(),
        Launcher::Node => launchers.node.clone(),
        Launcher::Direct(program) => program.to_owned(),
    };

    let args = definition
        .leading_args
        .iter()
        .map(|arg| (*arg).to_owned())
        .chain(extra_args.iter().cloned())
        .chain([target_arg])
        .chain(definition.trailing_args.iter().map(|arg| (*arg).to_owned()))
        .collect();

    CommandLine { program, args }
}
