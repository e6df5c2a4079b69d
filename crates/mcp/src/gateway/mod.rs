//! Gateway module for exposing a tool handler over an MCP transport

use crate::core::constants::{codes, methods, PROTOCOL_VERSION};
use crate::core::error::{Error, Result};
use crate::core::types::*;
use crate::transport::stdio::StdioTransport;
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tokio::io::{AsyncRead, AsyncWrite};

/// Implemented by whatever serves the tools
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Descriptors returned from `tools/list`
    fn tools(&self) -> Vec<ToolDescriptor>;

    /// Run one tool. [`Error::ToolNotFound`] becomes an invalid-params error;
    /// tool-level failures should be returned as [`CallToolResult::error_text`].
    async fn call_tool(&self, name: &str, arguments: Map<String, Value>) -> Result<CallToolResult>;
}

/// Routes JSON-RPC requests to a [`ToolHandler`]
pub struct Gateway<H> {
    handler: H,
    server_info: ServerInfo,
}

impl<H: ToolHandler> Gateway<H> {
    /// Create a new gateway
    pub fn new(handler: H, server_info: ServerInfo) -> Self {
        Self {
            handler,
            server_info,
        }
    }

    /// Serve the process's stdin/stdout until the client closes stdin
    pub async fn start(&self) -> Result<()> {
        let mut transport = StdioTransport::stdio();
        self.serve(&mut transport).await
    }

    /// Handle messages one at a time until end of input
    pub async fn serve<R, W>(&self, transport: &mut StdioTransport<R, W>) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        tracing::info!("MCP gateway serving {} tools", self.handler.tools().len());

        loop {
            let line = match transport.next_message().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e @ (Error::InvalidMessage(_) | Error::Encoding(_))) => {
                    tracing::warn!("Rejected inbound message: {}", e);
                    transport
                        .send(&JsonRpcResponse::failure(Value::Null, (&e).into()))
                        .await?;
                    continue;
                }
                Err(e) => return Err(e),
            };

            if let Some(response) = self.handle_line(&line).await {
                transport.send(&response).await?;
            }
        }

        tracing::info!("Input closed, gateway stopping");
        Ok(())
    }

    /// Process one raw message; notifications yield no response
    pub async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        let value: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                return Some(JsonRpcResponse::failure(
                    Value::Null,
                    JsonRpcError {
                        code: codes::PARSE_ERROR,
                        message: format!("Parse error: {}", e),
                        data: None,
                    },
                ));
            }
        };

        let id = value.get("id").cloned();
        let request: JsonRpcRequest = match serde_json::from_value(value) {
            Ok(request) => request,
            Err(e) => {
                let err = Error::InvalidMessage(e.to_string());
                return Some(JsonRpcResponse::failure(id.unwrap_or(Value::Null), (&err).into()));
            }
        };

        self.handle_request(request).await
    }

    /// Process one parsed request
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        if request.is_notification() {
            tracing::debug!("Notification: {}", request.method);
            return None;
        }

        let id = request.id.clone().unwrap_or(Value::Null);
        match self.dispatch(request).await {
            Ok(result) => Some(JsonRpcResponse::success(id, result)),
            Err(e) => {
                tracing::warn!("Request failed: {}", e);
                Some(JsonRpcResponse::failure(id, (&e).into()))
            }
        }
    }

    async fn dispatch(&self, request: JsonRpcRequest) -> Result<Value> {
        match request.method.as_str() {
            methods::INITIALIZE => Ok(json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": { "tools": {} },
                "serverInfo": self.server_info,
            })),
            methods::PING => Ok(json!({})),
            methods::TOOLS_LIST => Ok(json!({ "tools": self.handler.tools() })),
            methods::TOOLS_CALL => {
                let params: CallToolParams = serde_json::from_value(
                    request.params.unwrap_or(Value::Null),
                )
                .map_err(|e| Error::InvalidParams(e.to_string()))?;

                tracing::info!("Tool call: {}", params.name);
                let result = self
                    .handler
                    .call_tool(&params.name, params.arguments.unwrap_or_default())
                    .await?;
                Ok(serde_json::to_value(result)?)
            }
            other => Err(Error::MethodNotFound(other.to_string())),
        }
    }
}
