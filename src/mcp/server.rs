//! MCP Server Implementation
//!
//! Line-delimited JSON-RPC over an async reader/writer pair, with message
//! routing to registered tool handlers.

use crate::mcp::protocol::*;
use crate::{RagError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// MCP Server state and configuration
pub struct McpServer {
    /// Server implementation information
    pub server_info: Implementation,
    /// Server capabilities
    pub capabilities: ServerCapabilities,
    /// Registered tools
    pub tools: Arc<RwLock<HashMap<String, Tool>>>,
    /// Tool handlers
    pub tool_handlers: Arc<RwLock<HashMap<String, Box<dyn ToolHandler>>>>,
    /// Connection state
    pub connection_state: Arc<RwLock<ConnectionState>>,
}

/// Connection state tracking
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Uninitialized,
    Initializing,
    Ready,
    Closed,
}

/// Tool handler trait for implementing tool execution
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn handle(&self, params: CallToolParams) -> Result<CallToolResult>;
}

/// Message handler for processing incoming messages
pub struct MessageHandler {
    server: Arc<McpServer>,
}

impl McpServer {
    /// Create a new MCP server
    #[inline]
    pub fn new(name: String, version: String) -> Self {
        let server_info = Implementation { name, version };

        let capabilities = ServerCapabilities {
            experimental: None,
            tools: Some(ToolsCapability {
                list_changed: Some(false),
            }),
        };

        Self {
            server_info,
            capabilities,
            tools: Arc::new(RwLock::new(HashMap::new())),
            tool_handlers: Arc::new(RwLock::new(HashMap::new())),
            connection_state: Arc::new(RwLock::new(ConnectionState::Uninitialized)),
        }
    }

    /// Register a tool with the server
    #[inline]
    pub async fn register_tool<H>(&self, tool: Tool, handler: H)
    where
        H: ToolHandler + 'static,
    {
        let tool_name = tool.name.clone();

        {
            let mut tools = self.tools.write().await;
            tools.insert(tool_name.clone(), tool);
        }

        {
            let mut handlers = self.tool_handlers.write().await;
            handlers.insert(tool_name.clone(), Box::new(handler));
        }

        debug!("Registered tool: {}", tool_name);
    }

    /// Start the server using stdio transport
    #[inline]
    pub async fn serve_stdio(self: Arc<Self>) -> Result<()> {
        info!("Starting MCP server with stdio transport");
        let reader = BufReader::new(io::stdin());
        let mut stdout = io::stdout();
        self.serve(reader, &mut stdout).await
    }

    /// Process line-delimited messages from `reader` until EOF
    #[inline]
    pub async fn serve<R, W>(self: Arc<Self>, mut reader: R, writer: &mut W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWriteExt + Unpin,
    {
        let mut line = String::new();
        loop {
            line.clear();
            match reader.read_line(&mut line).await {
                Ok(0) => {
                    info!("EOF reached, closing connection");
                    break;
                }
                Ok(_) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }

                    // First parse as raw JSON
                    let raw_value: Value = match serde_json::from_str(line) {
                        Ok(value) => value,
                        Err(e) => {
                            error!("Failed to parse JSON: {}", e);
                            let error_response =
                                JsonRpcErrorResponse::new(JsonRpcError::parse_error(), None);
                            self.send_message(
                                writer,
                                &JsonRpcMessage::ErrorResponse(error_response),
                            )
                            .await?;
                            continue;
                        }
                    };

                    match parse_message(raw_value) {
                        Some(message) => {
                            let handler = MessageHandler::new(Arc::clone(&self));
                            if let Err(e) = handler.process_message(message, writer).await {
                                error!("Error processing message: {}", e);
                            }
                        }
                        None => {
                            error!("Received message that is not valid JSON-RPC 2.0");
                            let error_response =
                                JsonRpcErrorResponse::new(JsonRpcError::invalid_request(), None);
                            self.send_message(
                                writer,
                                &JsonRpcMessage::ErrorResponse(error_response),
                            )
                            .await?;
                        }
                    }
                }
                Err(e) => {
                    error!("Error reading from input: {}", e);
                    break;
                }
            }
        }

        {
            let mut state = self.connection_state.write().await;
            *state = ConnectionState::Closed;
        }

        info!("MCP server stopped");
        Ok(())
    }

    /// Send a message to the client
    async fn send_message<W>(&self, writer: &mut W, message: &JsonRpcMessage) -> Result<()>
    where
        W: AsyncWriteExt + Unpin,
    {
        let json = serde_json::to_string(message)?;
        writer.write_all(json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        Ok(())
    }

    /// Get current connection state
    #[inline]
    pub async fn connection_state(&self) -> ConnectionState {
        self.connection_state.read().await.clone()
    }
}

/// Interpret a JSON value as a JSON-RPC 2.0 message
fn parse_message(raw_value: Value) -> Option<JsonRpcMessage> {
    let message: JsonRpcMessage = serde_json::from_value(raw_value).ok()?;
    (message.jsonrpc() == JSONRPC_VERSION).then_some(message)
}

impl MessageHandler {
    /// Create a new message handler
    #[inline]
    pub fn new(server: Arc<McpServer>) -> Self {
        Self { server }
    }

    /// Process an incoming message
    #[inline]
    pub async fn process_message<W>(&self, message: JsonRpcMessage, writer: &mut W) -> Result<()>
    where
        W: AsyncWriteExt + Unpin,
    {
        match message {
            JsonRpcMessage::Request(request) => self.handle_request(request, writer).await,
            JsonRpcMessage::Notification(notification) => {
                self.handle_notification(notification).await;
                Ok(())
            }
            JsonRpcMessage::Response(_) | JsonRpcMessage::ErrorResponse(_) => {
                warn!("Received unexpected response message from client");
                Ok(())
            }
        }
    }

    /// Handle a JSON-RPC request
    async fn handle_request<W>(&self, request: JsonRpcRequest, writer: &mut W) -> Result<()>
    where
        W: AsyncWriteExt + Unpin,
    {
        let response = match request.method.as_str() {
            "initialize" => self.handle_initialize(request.params).await,
            "tools/list" => self.handle_list_tools().await,
            "tools/call" => self.handle_call_tool(request.params).await,
            "ping" => Ok(serde_json::json!({})),
            _ => {
                let error = JsonRpcError::method_not_found();
                return self
                    .send_error_response(writer, error, Some(request.id))
                    .await;
            }
        };

        match response {
            Ok(result) => {
                let response = JsonRpcResponse::new(result, request.id);
                self.server
                    .send_message(writer, &JsonRpcMessage::Response(response))
                    .await
            }
            Err(e) => {
                error!("Error handling request {}: {}", request.method, e);
                let error = match e {
                    RagError::Mcp(message) => JsonRpcError::invalid_params(Some(message)),
                    RagError::Json(e) => JsonRpcError::invalid_params(Some(e.to_string())),
                    other => JsonRpcError::internal_error(Some(other.to_string())),
                };
                self.send_error_response(writer, error, Some(request.id))
                    .await
            }
        }
    }

    /// Handle a JSON-RPC notification
    async fn handle_notification(&self, notification: JsonRpcNotification) {
        match notification.method.as_str() {
            "initialized" | "notifications/initialized" => self.handle_initialized().await,
            "notifications/cancelled" => {
                debug!("Received cancellation notification");
            }
            _ => {
                warn!("Unknown notification method: {}", notification.method);
            }
        }
    }

    /// Handle initialize request
    #[inline]
    pub async fn handle_initialize(&self, params: Option<Value>) -> Result<Value> {
        let params: InitializeParams = match params {
            Some(p) => serde_json::from_value(p)?,
            None => {
                return Err(RagError::Mcp(
                    "Initialize request missing parameters".to_string(),
                ));
            }
        };

        if !SUPPORTED_PROTOCOL_VERSIONS.contains(&params.protocol_version.as_str()) {
            return Err(RagError::Mcp(format!(
                "Unsupported protocol version: {}. Supported: {}",
                params.protocol_version,
                SUPPORTED_PROTOCOL_VERSIONS.join(", ")
            )));
        }

        {
            let mut state = self.server.connection_state.write().await;
            *state = ConnectionState::Initializing;
        }

        let result = InitializeResult {
            protocol_version: MCP_VERSION.to_string(),
            capabilities: self.server.capabilities.clone(),
            server_info: self.server.server_info.clone(),
            instructions: Some(
                "Search the indexed corpus for passages relevant to a question".to_string(),
            ),
        };

        info!("Client initialized: {}", params.client_info.name);
        Ok(serde_json::to_value(result)?)
    }

    /// Handle initialized notification
    async fn handle_initialized(&self) {
        {
            let mut state = self.server.connection_state.write().await;
            *state = ConnectionState::Ready;
        }

        info!("Server ready to handle requests");
    }

    /// Handle list tools request
    #[inline]
    pub async fn handle_list_tools(&self) -> Result<Value> {
        let tools = self.server.tools.read().await;
        let mut tools_vec: Vec<Tool> = tools.values().cloned().collect();
        tools_vec.sort_by(|a, b| a.name.cmp(&b.name));

        let result = ListToolsResult { tools: tools_vec };
        Ok(serde_json::to_value(result)?)
    }

    /// Handle call tool request
    #[inline]
    pub async fn handle_call_tool(&self, params: Option<Value>) -> Result<Value> {
        let params: CallToolParams = match params {
            Some(p) => serde_json::from_value(p)?,
            None => {
                return Err(RagError::Mcp(
                    "Tool call request missing parameters".to_string(),
                ));
            }
        };

        let handlers = self.server.tool_handlers.read().await;
        let handler = handlers
            .get(&params.name)
            .ok_or_else(|| RagError::Mcp(format!("Tool not found: {}", params.name)))?;

        let result = handler.handle(params).await?;
        Ok(serde_json::to_value(result)?)
    }

    /// Send an error response
    async fn send_error_response<W>(
        &self,
        writer: &mut W,
        error: JsonRpcError,
        id: Option<RequestId>,
    ) -> Result<()>
    where
        W: AsyncWriteExt + Unpin,
    {
        let error_response = JsonRpcErrorResponse::new(error, id);
        let message = JsonRpcMessage::ErrorResponse(error_response);
        self.server.send_message(writer, &message).await
    }
}
