//! Configuration module for Dockbox
//!
//! Supports configuration via:
//! - TOML/YAML/JSON config files (`config/dockbox.*`, `/etc/dockbox/config`, `--config`)
//! - Environment variables (`DOCKBOX__SECTION__KEY`, `.env` honoured)
//! - Command line flags of the server binary

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Container engine settings
    #[serde(default)]
    pub engine: EngineConfig,

    /// Per-operation wall-clock budgets
    #[serde(default)]
    pub timeouts: TimeoutConfig,

    /// Script execution settings
    #[serde(default)]
    pub script: ScriptConfig,

    /// MCP server transport settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Container engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Engine CLI binary, looked up on PATH
    #[serde(default = "default_runtime")]
    pub runtime: String,
}

/// Operation timeouts, in seconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_create")]
    pub create: u64,
    #[serde(default = "default_exec")]
    pub exec: u64,
    /// Writing a script into the container
    #[serde(default = "default_script_write")]
    pub script_write: u64,
    /// Running a written script
    #[serde(default = "default_script_run")]
    pub script_run: u64,
    #[serde(default = "default_install")]
    pub install: u64,
    /// Each package-manager `--version` probe
    #[serde(default = "default_probe")]
    pub probe: u64,
    /// Running-state inspection
    #[serde(default = "default_inspect")]
    pub inspect: u64,
    #[serde(default = "default_list")]
    pub list: u64,
    #[serde(default = "default_stop")]
    pub stop: u64,
    /// Grace period passed to `stop --time`
    #[serde(default = "default_stop_grace")]
    pub stop_grace: u64,
    #[serde(default = "default_remove")]
    pub remove: u64,
    #[serde(default = "default_kill")]
    pub kill: u64,
    #[serde(default = "default_force_remove")]
    pub force_remove: u64,
}

/// Script execution configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptConfig {
    /// In-container path scripts are written to
    #[serde(default = "default_script_path")]
    pub path: String,

    /// Interpreter the script is run with
    #[serde(default = "default_interpreter")]
    pub interpreter: String,
}

/// MCP transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// Newline-delimited JSON-RPC on stdin/stdout
    Stdio,
    /// JSON-RPC over WebSocket at `/mcp`
    Ws,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_transport")]
    pub transport: Transport,

    /// Host to bind to (WebSocket transport only)
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on (WebSocket transport only)
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Optional JSON log file, appended to
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

// Default value functions
fn default_runtime() -> String {
    "docker".to_string()
}

fn default_create() -> u64 {
    30
}

fn default_exec() -> u64 {
    30
}

fn default_script_write() -> u64 {
    30
}

fn default_script_run() -> u64 {
    60
}

fn default_install() -> u64 {
    180
}

fn default_probe() -> u64 {
    5
}

fn default_inspect() -> u64 {
    10
}

fn default_list() -> u64 {
    15
}

fn default_stop() -> u64 {
    10
}

fn default_stop_grace() -> u64 {
    5
}

fn default_remove() -> u64 {
    10
}

fn default_kill() -> u64 {
    5
}

fn default_force_remove() -> u64 {
    5
}

fn default_script_path() -> String {
    "/tmp/script.py".to_string()
}

fn default_interpreter() -> String {
    "python".to_string()
}

fn default_transport() -> Transport {
    Transport::Stdio
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            runtime: default_runtime(),
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            create: default_create(),
            exec: default_exec(),
            script_write: default_script_write(),
            script_run: default_script_run(),
            install: default_install(),
            probe: default_probe(),
            inspect: default_inspect(),
            list: default_list(),
            stop: default_stop(),
            stop_grace: default_stop_grace(),
            remove: default_remove(),
            kill: default_kill(),
            force_remove: default_force_remove(),
        }
    }
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            path: default_script_path(),
            interpreter: default_interpreter(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: default_transport(),
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_file: None,
        }
    }
}

impl TimeoutConfig {
    fn named(&self) -> [(&'static str, u64); 13] {
        [
            ("create", self.create),
            ("exec", self.exec),
            ("script_write", self.script_write),
            ("script_run", self.script_run),
            ("install", self.install),
            ("probe", self.probe),
            ("inspect", self.inspect),
            ("list", self.list),
            ("stop", self.stop),
            ("stop_grace", self.stop_grace),
            ("remove", self.remove),
            ("kill", self.kill),
            ("force_remove", self.force_remove),
        ]
    }
}

impl AppConfig {
    /// Load configuration from files and environment variables.
    ///
    /// `explicit` is a file given on the command line; unlike the default
    /// locations it must exist.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        // Try to load .env file if present
        let _ = dotenvy::dotenv();

        let mut builder = config::Config::builder()
            // Start with defaults
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config/dockbox").required(false))
            .add_source(config::File::with_name("/etc/dockbox/config").required(false));

        if let Some(path) = explicit {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        // Override with environment variables (DOCKBOX__ prefix)
        let config = builder
            .add_source(
                config::Environment::with_prefix("DOCKBOX")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let app_config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        app_config.validate()?;

        Ok(app_config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.engine.runtime.trim().is_empty() {
            anyhow::bail!("Engine runtime cannot be empty");
        }

        if let Some((name, _)) = self.timeouts.named().iter().find(|(_, secs)| *secs == 0) {
            anyhow::bail!("Timeout '{}' cannot be 0", name);
        }

        if !self.script.path.starts_with('/') {
            anyhow::bail!("Script path must be absolute, got '{}'", self.script.path);
        }

        if self.script.interpreter.trim().is_empty() {
            anyhow::bail!("Script interpreter cannot be empty");
        }

        if self.server.transport == Transport::Ws && self.server.port == 0 {
            anyhow::bail!("Port cannot be 0");
        }

        Ok(())
    }
}
