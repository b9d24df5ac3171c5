//! Dockbox orchestrator library
//!
//! Throwaway Docker sandboxes for LLM agents: a container lifecycle manager
//! driven through the engine CLI, exposed as MCP tools.

use std::sync::Arc;

use anyhow::{Context, Result};

pub mod api;
pub mod config;
pub mod container;
pub mod error;
pub mod logging;
pub mod mcp;
pub mod models;
pub mod packages;
pub mod process;

use crate::container::ContainerManager;
use crate::mcp::tools::ToolDispatcher;
use crate::process::DockerCli;

/// Application state shared across all handlers
pub struct AppState {
    pub dispatcher: Arc<ToolDispatcher>,
    pub engine: DockerCli,
}

/// Detect the container engine and wire the tool dispatcher on top of it.
///
/// Fails when the engine does not answer, which callers treat as fatal.
pub async fn init_dispatcher(config: &config::AppConfig) -> Result<(Arc<ToolDispatcher>, DockerCli)> {
    let (engine, _version) = DockerCli::detect(&config.engine)
        .await
        .context("Docker is not available. Please make sure Docker is installed and running.")?;

    let manager = ContainerManager::new(
        Arc::new(engine.clone()),
        config.timeouts.clone(),
        config.script.clone(),
    );

    Ok((Arc::new(ToolDispatcher::new(Arc::new(manager))), engine))
}
