//! Tool dispatch: typed tool calls in, text replies out

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info};

use crate::container::ContainerManager;
use crate::error::Operation;
use crate::models::{CleanupOutcome, ContainerListing, CreateOutcome};

const LIST_USAGE_HINT: &str =
    "\nYou can use these container names with other tools like add_dependencies, execute_code, etc.";

const LIST_ALL_NOTE: &str =
    "\nNote: Only containers with 'Up' in their Status are currently running and can be interacted with.";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreateContainerArgs {
    pub image: String,
    pub container_name: String,
    #[serde(default)]
    pub dependencies: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExecuteCodeArgs {
    pub container_name: String,
    pub command: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExecuteScriptArgs {
    pub container_name: String,
    pub script_content: String,
    #[serde(default)]
    pub script_args: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AddDependenciesArgs {
    pub container_name: String,
    pub dependencies: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ListContainersArgs {
    #[serde(default = "default_show_all")]
    pub show_all: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CleanupContainerArgs {
    pub container_name: String,
}

fn default_show_all() -> bool {
    true
}

/// A parsed tool invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCall {
    CreateContainer(CreateContainerArgs),
    ExecuteCode(ExecuteCodeArgs),
    ExecutePythonScript(ExecuteScriptArgs),
    AddDependencies(AddDependenciesArgs),
    ListContainers(ListContainersArgs),
    CleanupContainer(CleanupContainerArgs),
}

/// Why a tool call could not be dispatched
#[derive(Debug, Error)]
pub enum ToolCallError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments for {tool}: {source}")]
    InvalidArguments {
        tool: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ToolCall {
    /// Parse `tools/call` name and arguments; missing arguments mean `{}`
    pub fn parse(name: &str, arguments: Value) -> Result<Self, ToolCallError> {
        let arguments = if arguments.is_null() {
            Value::Object(Default::default())
        } else {
            arguments
        };

        match name {
            "create_container" => args(name, arguments).map(ToolCall::CreateContainer),
            "execute_code" => args(name, arguments).map(ToolCall::ExecuteCode),
            "execute_python_script" => args(name, arguments).map(ToolCall::ExecutePythonScript),
            "add_dependencies" => args(name, arguments).map(ToolCall::AddDependencies),
            "list_containers" => args(name, arguments).map(ToolCall::ListContainers),
            "cleanup_container" => args(name, arguments).map(ToolCall::CleanupContainer),
            _ => Err(ToolCallError::UnknownTool(name.to_string())),
        }
    }
}

fn args<T: DeserializeOwned>(tool: &str, arguments: Value) -> Result<T, ToolCallError> {
    serde_json::from_value(arguments).map_err(|source| ToolCallError::InvalidArguments {
        tool: tool.to_string(),
        source,
    })
}

/// Text reply of a tool call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolReply {
    pub text: String,
    pub is_error: bool,
}

impl ToolReply {
    fn ok(text: String) -> Self {
        Self {
            text,
            is_error: false,
        }
    }

    fn failed(text: String) -> Self {
        error!(reply = %text, "Tool call failed");
        Self {
            text,
            is_error: true,
        }
    }
}

/// Routes tool calls to the container manager and renders the replies.
///
/// Every failure becomes reply text; nothing here returns an error.
pub struct ToolDispatcher {
    manager: Arc<ContainerManager>,
}

impl ToolDispatcher {
    pub fn new(manager: Arc<ContainerManager>) -> Self {
        Self { manager }
    }

    pub async fn dispatch(&self, call: ToolCall) -> ToolReply {
        match call {
            ToolCall::CreateContainer(a) => {
                match self
                    .manager
                    .create_container(&a.image, &a.container_name, &a.dependencies)
                    .await
                {
                    Ok(outcome) => render_create(outcome),
                    Err(e) => ToolReply::failed(e.render(Operation::CreateContainer)),
                }
            }
            ToolCall::ExecuteCode(a) => {
                match self.manager.execute_command(&a.container_name, &a.command).await {
                    Ok(stdout) => ToolReply::ok(format!("Command output: {}", stdout)),
                    Err(e) => ToolReply::failed(e.render(Operation::ExecuteCommand)),
                }
            }
            ToolCall::ExecutePythonScript(a) => {
                match self
                    .manager
                    .execute_script(&a.container_name, &a.script_content, &a.script_args)
                    .await
                {
                    Ok(stdout) => ToolReply::ok(format!("Command output: {}", stdout)),
                    Err(e) => ToolReply::failed(e.render(Operation::ExecuteScript)),
                }
            }
            ToolCall::AddDependencies(a) => {
                match self
                    .manager
                    .add_dependencies(&a.container_name, &a.dependencies)
                    .await
                {
                    Ok(report) => ToolReply::ok(format!(
                        "Dependencies installed in container '{}': {}",
                        a.container_name, report.dependencies
                    )),
                    Err(e) => ToolReply::failed(e.render(Operation::InstallDependencies)),
                }
            }
            ToolCall::ListContainers(a) => match self.manager.list_containers(a.show_all).await {
                Ok(listing) => render_listing(listing),
                Err(e) => ToolReply::failed(e.render(Operation::ListContainers)),
            },
            ToolCall::CleanupContainer(a) => {
                match self.manager.cleanup_container(&a.container_name).await {
                    Ok(CleanupOutcome::Removed) => ToolReply::ok(format!(
                        "Container '{}' has been stopped and removed.",
                        a.container_name
                    )),
                    Ok(CleanupOutcome::ForceRemoved) => ToolReply::ok(format!(
                        "Container '{}' has been forcibly removed.",
                        a.container_name
                    )),
                    Err(e) => ToolReply::failed(e.render(Operation::CleanupContainer)),
                }
            }
        }
    }
}

fn render_create(outcome: CreateOutcome) -> ToolReply {
    let created = format!("Container created with ID: {}", outcome.container_id);
    match outcome.dependencies {
        None => ToolReply::ok(created),
        Some(Ok(report)) => {
            info!(manager = %report.manager, "Dependencies installed at creation");
            ToolReply::ok(format!(
                "{}\nDependencies installed: {}",
                created, report.dependencies
            ))
        }
        Some(Err(e)) => ToolReply::failed(format!(
            "{}\n{}",
            created,
            e.render(Operation::InstallDependencies)
        )),
    }
}

fn render_listing(listing: ContainerListing) -> ToolReply {
    let Some(table) = listing.table else {
        let scope = if listing.show_all { "existing" } else { "running" };
        return ToolReply::ok(format!("No {} containers found.", scope));
    };

    let mut text = table;
    text.push_str(LIST_USAGE_HINT);
    if listing.show_all {
        text.push_str(LIST_ALL_NOTE);
    }
    ToolReply::ok(text)
}
