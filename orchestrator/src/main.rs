//! Dockbox MCP server
//!
//! Serves the sandbox container tools over stdio (default) or WebSocket.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use dockbox_orchestrator::config::{AppConfig, Transport};
use dockbox_orchestrator::logging::init_logging;
use dockbox_orchestrator::mcp::stdio::serve_stdio;
use dockbox_orchestrator::{api, init_dispatcher, AppState};

/// Docker sandbox MCP server
#[derive(Parser, Debug)]
#[command(name = "dockbox-mcp", version, about, long_about = None)]
struct Args {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(short, long, env = "DOCKBOX_CONFIG")]
    config: Option<PathBuf>,

    /// Transport to serve MCP on
    #[arg(short, long, value_enum)]
    transport: Option<Transport>,

    /// Bind host for the WebSocket transport
    #[arg(long)]
    host: Option<String>,

    /// Bind port for the WebSocket transport
    #[arg(short, long)]
    port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,
}

impl Args {
    fn apply(self, config: &mut AppConfig) {
        if let Some(transport) = self.transport {
            config.server.transport = transport;
        }
        if let Some(host) = self.host {
            config.server.host = host;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = AppConfig::load(args.config.as_deref())?;
    args.apply(&mut config);
    config.validate()?;

    init_logging(&config.logging)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        transport = ?config.server.transport,
        "Starting Dockbox MCP server"
    );

    let (dispatcher, engine) = match init_dispatcher(&config).await {
        Ok(parts) => parts,
        Err(e) => {
            error!("{:#}", e);
            return Err(e);
        }
    };

    match config.server.transport {
        Transport::Stdio => serve_stdio(dispatcher)
            .await
            .context("stdio transport failed")?,
        Transport::Ws => {
            let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
                .parse()
                .context("Invalid server address")?;
            let state = Arc::new(AppState {
                dispatcher,
                engine,
            });
            api::serve(state, addr).await?;
        }
    }

    Ok(())
}
