//! Dockbox CLI - drive sandbox containers from a terminal
//!
//! Runs the same tool calls the MCP server exposes, against the local engine.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use colored::Colorize;
use tokio::io::AsyncReadExt;

use dockbox_orchestrator::config::AppConfig;
use dockbox_orchestrator::init_dispatcher;
use dockbox_orchestrator::logging::init_logging;
use dockbox_orchestrator::mcp::get_mcp_tools;
use dockbox_orchestrator::mcp::tools::{
    AddDependenciesArgs, CleanupContainerArgs, CreateContainerArgs, ExecuteCodeArgs,
    ExecuteScriptArgs, ListContainersArgs, ToolCall,
};

/// Dockbox CLI - throwaway Docker sandboxes
#[derive(Parser)]
#[command(name = "dockbox")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Create, use and remove sandbox containers", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace); default is the configured level
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create and start a container
    Create {
        /// Image to run, e.g. python:3.9-slim
        image: String,

        /// Container name (default: sandbox-<random>)
        #[arg(short, long)]
        name: Option<String>,

        /// Space-separated dependencies to install
        #[arg(short, long, default_value = "")]
        deps: String,
    },

    /// Run a command inside a container
    Exec {
        /// Container name
        container: String,

        /// Command line, e.g. "python -c print(1+1)"
        command: String,
    },

    /// Copy a Python script into a container and run it
    Script {
        /// Container name
        container: String,

        /// Script file, or "-" to read stdin
        file: PathBuf,

        /// Arguments passed to the script
        #[arg(short, long, default_value = "")]
        args: String,
    },

    /// Install dependencies in a running container
    AddDeps {
        /// Container name
        container: String,

        /// Space-separated dependencies
        deps: String,
    },

    /// List containers
    List {
        /// Only running containers
        #[arg(short, long)]
        running: bool,
    },

    /// Stop and remove a container
    Cleanup {
        /// Container name
        container: String,
    },

    /// Print the MCP tool catalogue as JSON
    Tools,
}

fn generated_name() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("sandbox-{}", &id[..8])
}

/// Level requested by `-v` flags; without any the configured level stays
fn log_level(verbose: u8) -> Option<&'static str> {
    match verbose {
        0 => None,
        1 => Some("info"),
        2 => Some("debug"),
        _ => Some("trace"),
    }
}

async fn read_script(file: &Path) -> Result<String> {
    if file.as_os_str() == "-" {
        let mut body = String::new();
        tokio::io::stdin()
            .read_to_string(&mut body)
            .await
            .context("Failed to read script from stdin")?;
        Ok(body)
    } else {
        tokio::fs::read_to_string(file)
            .await
            .with_context(|| format!("Failed to read script file: {}", file.display()))
    }
}

async fn tool_call(command: Commands) -> Result<ToolCall> {
    let call = match command {
        Commands::Create { image, name, deps } => ToolCall::CreateContainer(CreateContainerArgs {
            image,
            container_name: name.unwrap_or_else(generated_name),
            dependencies: deps,
        }),
        Commands::Exec { container, command } => ToolCall::ExecuteCode(ExecuteCodeArgs {
            container_name: container,
            command,
        }),
        Commands::Script {
            container,
            file,
            args,
        } => ToolCall::ExecutePythonScript(ExecuteScriptArgs {
            container_name: container,
            script_content: read_script(&file).await?,
            script_args: args,
        }),
        Commands::AddDeps { container, deps } => ToolCall::AddDependencies(AddDependenciesArgs {
            container_name: container,
            dependencies: deps,
        }),
        Commands::List { running } => ToolCall::ListContainers(ListContainersArgs {
            show_all: !running,
        }),
        Commands::Cleanup { container } => ToolCall::CleanupContainer(CleanupContainerArgs {
            container_name: container,
        }),
        Commands::Tools => anyhow::bail!("tools is not a container operation"),
    };
    Ok(call)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    if let Commands::Tools = cli.command {
        println!("{}", serde_json::to_string_pretty(&get_mcp_tools())?);
        return Ok(ExitCode::SUCCESS);
    }

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(level) = log_level(cli.verbose) {
        config.logging.level = level.to_string();
    }
    init_logging(&config.logging)?;

    let (dispatcher, _engine) = init_dispatcher(&config).await?;
    let call = tool_call(cli.command).await?;
    let reply = dispatcher.dispatch(call).await;

    if reply.is_error {
        eprintln!("{}", reply.text.red());
        Ok(ExitCode::FAILURE)
    } else {
        println!("{}", reply.text.green());
        Ok(ExitCode::SUCCESS)
    }
}
