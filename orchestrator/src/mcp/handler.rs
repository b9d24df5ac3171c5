//! MCP request handling and WebSocket transport

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use crate::AppState;

use super::tools::{ToolCall, ToolCallError, ToolDispatcher};
use super::{codes, methods, MCPRequest, MCPResponse, PROTOCOL_VERSION, SERVER_NAME};

/// Per-connection protocol state
pub struct McpSession {
    dispatcher: Arc<ToolDispatcher>,
    initialized: bool,
}

impl McpSession {
    pub fn new(dispatcher: Arc<ToolDispatcher>) -> Self {
        Self {
            dispatcher,
            initialized: false,
        }
    }

    /// Handle one raw JSON-RPC message. Notifications produce no reply.
    pub async fn handle_text(&mut self, text: &str) -> Option<MCPResponse> {
        debug!("MCP message received: {}", text);

        match serde_json::from_str::<MCPRequest>(text) {
            Ok(request) => self.handle_request(request).await,
            Err(e) => {
                warn!("Unparseable MCP message: {}", e);
                Some(MCPResponse::error(
                    None,
                    codes::PARSE_ERROR,
                    format!("Parse error: {}", e),
                ))
            }
        }
    }

    pub async fn handle_request(&mut self, request: MCPRequest) -> Option<MCPResponse> {
        let Some(id) = request.id.clone() else {
            if request.method == methods::INITIALIZED {
                debug!("Client finished initialization");
            } else {
                debug!(method = %request.method, "Ignoring notification");
            }
            return None;
        };
        let id = Some(id);

        if request.jsonrpc != "2.0" {
            return Some(MCPResponse::error(
                id,
                codes::INVALID_REQUEST,
                format!("Unsupported jsonrpc version: {}", request.jsonrpc),
            ));
        }

        let response = match request.method.as_str() {
            methods::INITIALIZE => {
                self.initialized = true;
                info!("MCP session initialized");

                MCPResponse::success(
                    id,
                    json!({
                        "protocolVersion": PROTOCOL_VERSION,
                        "capabilities": {
                            "tools": {}
                        },
                        "serverInfo": {
                            "name": SERVER_NAME,
                            "version": env!("CARGO_PKG_VERSION")
                        }
                    }),
                )
            }

            methods::PING => MCPResponse::success(id, json!({})),

            methods::LIST_TOOLS => {
                if !self.initialized {
                    return Some(not_initialized(id));
                }

                let tools = super::get_mcp_tools();
                MCPResponse::success(id, json!({ "tools": tools }))
            }

            methods::CALL_TOOL => {
                if !self.initialized {
                    return Some(not_initialized(id));
                }

                self.handle_tool_call(id, request.params).await
            }

            _ => MCPResponse::error(
                id,
                codes::METHOD_NOT_FOUND,
                format!("Method not found: {}", request.method),
            ),
        };

        Some(response)
    }

    async fn handle_tool_call(&self, id: Option<Value>, params: Option<Value>) -> MCPResponse {
        let params = params.unwrap_or(Value::Null);
        let Some(name) = params.get("name").and_then(|v| v.as_str()) else {
            return MCPResponse::error(id, codes::INVALID_PARAMS, "Missing tool name".to_string());
        };
        let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);

        let call = match ToolCall::parse(name, arguments) {
            Ok(call) => call,
            Err(e @ ToolCallError::UnknownTool(_)) => {
                return MCPResponse::error(id, codes::METHOD_NOT_FOUND, e.to_string())
            }
            Err(e @ ToolCallError::InvalidArguments { .. }) => {
                return MCPResponse::error(id, codes::INVALID_PARAMS, e.to_string())
            }
        };

        info!(tool = %name, "Tool call");
        let reply = self.dispatcher.dispatch(call).await;

        MCPResponse::success(
            id,
            json!({
                "content": [{
                    "type": "text",
                    "text": reply.text
                }],
                "isError": reply.is_error
            }),
        )
    }
}

fn not_initialized(id: Option<Value>) -> MCPResponse {
    MCPResponse::error(id, codes::NOT_INITIALIZED, "Not initialized".to_string())
}

/// Serialize a response, falling back to a bare internal error
pub(crate) fn encode(response: &MCPResponse) -> String {
    serde_json::to_string(response).unwrap_or_else(|_| {
        r#"{"jsonrpc":"2.0","id":null,"error":{"code":-32603,"message":"Internal error"}}"#
            .to_string()
    })
}

/// Handle MCP WebSocket upgrade
pub async fn mcp_websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(|socket| handle_mcp_socket(socket, state))
}

/// Handle MCP WebSocket connection
async fn handle_mcp_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut session = McpSession::new(state.dispatcher.clone());

    info!("MCP WebSocket connection established");

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                let Some(response) = session.handle_text(&text).await else {
                    continue;
                };

                if sender.send(Message::Text(encode(&response))).await.is_err() {
                    break;
                }
            }
            Ok(Message::Close(_)) => {
                info!("MCP WebSocket connection closed");
                break;
            }
            Ok(Message::Ping(data)) => {
                if sender.send(Message::Pong(data)).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                error!("WebSocket error: {}", e);
                break;
            }
            _ => {}
        }
    }
}
