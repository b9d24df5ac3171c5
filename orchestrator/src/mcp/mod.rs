//! Model Context Protocol (MCP) implementation for Dockbox
//!
//! Provides a JSON-RPC 2.0 interface over stdio or WebSocket exposing the
//! container lifecycle as MCP tools.

pub mod handler;
pub mod stdio;
pub mod tools;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// MCP protocol revision this server speaks
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Server name reported on `initialize`
pub const SERVER_NAME: &str = "DockerManager";

/// MCP JSON-RPC 2.0 Request (a notification when `id` is absent)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MCPRequest {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// MCP JSON-RPC 2.0 Response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MCPResponse {
    pub jsonrpc: String,
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<MCPError>,
}

/// MCP Error object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MCPError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl MCPResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Option<Value>, code: i32, message: String) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(MCPError {
                code,
                message,
                data: None,
            }),
        }
    }
}

/// MCP Tool definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MCPTool {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// JSON-RPC error codes
pub mod codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const NOT_INITIALIZED: i32 = -32002;
}

/// MCP method names
pub mod methods {
    pub const INITIALIZE: &str = "initialize";
    pub const INITIALIZED: &str = "notifications/initialized";
    pub const PING: &str = "ping";
    pub const LIST_TOOLS: &str = "tools/list";
    pub const CALL_TOOL: &str = "tools/call";
}

/// Get list of MCP tools exposed by Dockbox
pub fn get_mcp_tools() -> Vec<MCPTool> {
    vec![
        MCPTool {
            name: "create_container".to_string(),
            description: "Create and start a Docker container with optional dependencies. \
                The container runs `sleep infinity` so it stays available for later commands. \
                The package manager (npm, pip, apt-get, apk) is detected from the image name, \
                or by probing the container when the image is not recognized."
                .to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "image": {
                        "type": "string",
                        "description": "Docker image to use, e.g. \"ubuntu:latest\", \"node:16\", \"python:3.9-slim\""
                    },
                    "container_name": {
                        "type": "string",
                        "description": "A unique name for the container"
                    },
                    "dependencies": {
                        "type": "string",
                        "description": "Space-separated packages to install, e.g. \"numpy pandas\"",
                        "default": ""
                    }
                },
                "required": ["image", "container_name"]
            }),
        },
        MCPTool {
            name: "execute_code".to_string(),
            description: "Execute a command inside a running Docker container and return its output. \
                For `python -c <code>` everything after `-c` is passed as a single argument; \
                one pair of quotes wrapping the whole code is removed, so \
                `python -c \"print('x')\"` runs `print('x')`."
                .to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "container_name": {
                        "type": "string",
                        "description": "Name of the target container"
                    },
                    "command": {
                        "type": "string",
                        "description": "Command to execute inside the container"
                    }
                },
                "required": ["container_name", "command"]
            }),
        },
        MCPTool {
            name: "execute_python_script".to_string(),
            description: "Write a Python script into a running container and execute it.".to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "container_name": {
                        "type": "string",
                        "description": "Name of the target container"
                    },
                    "script_content": {
                        "type": "string",
                        "description": "Full Python script content"
                    },
                    "script_args": {
                        "type": "string",
                        "description": "Arguments passed to the script",
                        "default": ""
                    }
                },
                "required": ["container_name", "script_content"]
            }),
        },
        MCPTool {
            name: "add_dependencies".to_string(),
            description: "Install additional dependencies in a running container, using the \
                first available of npm, pip, apt-get and apk."
                .to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "container_name": {
                        "type": "string",
                        "description": "Name of the target container"
                    },
                    "dependencies": {
                        "type": "string",
                        "description": "Space-separated packages to install"
                    }
                },
                "required": ["container_name", "dependencies"]
            }),
        },
        MCPTool {
            name: "list_containers".to_string(),
            description: "List Docker containers with ID, name, status, image and age.".to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "show_all": {
                        "type": "boolean",
                        "description": "Include stopped containers",
                        "default": true
                    }
                }
            }),
        },
        MCPTool {
            name: "cleanup_container".to_string(),
            description: "Stop and remove a Docker container, forcing removal if a graceful stop fails."
                .to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "container_name": {
                        "type": "string",
                        "description": "Name of the container to remove"
                    }
                },
                "required": ["container_name"]
            }),
        },
    ]
}
