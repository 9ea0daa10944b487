//! MCP server over newline-delimited JSON-RPC 2.0 on stdio.
//!
//! Each request line is handled on its own task so slow embedding calls do
//! not hold up other callers; responses funnel through a single writer task.
//! Notifications (requests without an id) never get a response.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::tools::{ToolSurface, tool_definitions};

pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";
pub const SERVER_NAME: &str = "qdrant-mcp";

const METHOD_INITIALIZE: &str = "initialize";
const METHOD_INITIALIZED: &str = "notifications/initialized";
const METHOD_PING: &str = "ping";
const METHOD_TOOLS_LIST: &str = "tools/list";
const METHOD_TOOLS_CALL: &str = "tools/call";

const PARSE_ERROR: i64 = -32700;
const INVALID_REQUEST: i64 = -32600;
const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_PARAMS: i64 = -32602;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("writer task failed: {0}")]
    Writer(String),
}

#[derive(Debug, Deserialize)]
struct JsonRpcRequest {
    #[serde(default)]
    jsonrpc: Option<String>,
    #[serde(default)]
    id: Option<Value>,
    method: String,
    #[serde(default)]
    params: Option<Value>,
}

#[derive(Debug, Serialize)]
struct JsonRpcError {
    code: i64,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

#[derive(Debug, Serialize)]
struct JsonRpcResponse {
    jsonrpc: &'static str,
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id: id.unwrap_or(Value::Null),
            result: Some(result),
            error: None,
        }
    }

    fn failure(id: Option<Value>, code: i64, message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id: id.unwrap_or(Value::Null),
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data,
            }),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct InitializeParams {
    #[serde(default, rename = "protocolVersion")]
    protocol_version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CallToolParams {
    #[serde(alias = "toolName")]
    name: String,
    #[serde(default)]
    arguments: Value,
}

/// JSON-RPC front end for the [`ToolSurface`].
#[derive(Clone)]
pub struct McpServer {
    tools: ToolSurface,
}

impl McpServer {
    pub fn new(tools: ToolSurface) -> Self {
        Self { tools }
    }

    /// Serve stdin/stdout until stdin closes.
    pub async fn run_stdio(&self) -> Result<(), ServerError> {
        info!("Server running on stdio");
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await
    }

    /// Serve one connection until the reader reaches EOF.
    ///
    /// A line that is not valid JSON (including invalid UTF-8) gets a parse
    /// error and the session continues. Requests still in flight when input
    /// ends are awaited and their responses written before this returns.
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> Result<(), ServerError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel::<String>();
        let writer_task = tokio::spawn(write_responses(writer, rx));

        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        let mut in_flight = JoinSet::new();
        let read_result = loop {
            while let Some(joined) = in_flight.try_join_next() {
                log_join(joined);
            }

            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break Ok(()),
                Ok(_) => {}
                Err(e) => {
                    error!(error = %e, "Failed to read from input");
                    break Err(e);
                }
            }
            if buf.trim_ascii().is_empty() {
                continue;
            }

            let line = std::mem::take(&mut buf);
            let server = self.clone();
            let tx = tx.clone();
            in_flight.spawn(async move {
                let Some(response) = server.handle_line(&line).await else {
                    return;
                };
                match serde_json::to_string(&response) {
                    Ok(text) => {
                        if tx.send(text).is_err() {
                            warn!("Response dropped, writer has stopped");
                        }
                    }
                    Err(e) => error!(error = %e, "Failed to serialize response"),
                }
            });
        };

        debug!(pending = in_flight.len(), "Input closed, draining requests");
        while let Some(joined) = in_flight.join_next().await {
            log_join(joined);
        }
        drop(tx);

        let written = writer_task
            .await
            .map_err(|e| ServerError::Writer(e.to_string()))?;
        read_result?;
        written?;
        info!("Server shut down");
        Ok(())
    }

    async fn handle_line(&self, line: &[u8]) -> Option<JsonRpcResponse> {
        let value: Value = match serde_json::from_slice(line) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "Malformed JSON-RPC message");
                return Some(JsonRpcResponse::failure(
                    None,
                    PARSE_ERROR,
                    "Parse error",
                    Some(json!({"message": e.to_string()})),
                ));
            }
        };
        let id = value.get("id").cloned();

        let req: JsonRpcRequest = match serde_json::from_value(value) {
            Ok(r) => r,
            Err(e) => {
                return Some(JsonRpcResponse::failure(
                    id,
                    INVALID_REQUEST,
                    "Invalid Request",
                    Some(json!({"message": e.to_string()})),
                ));
            }
        };
        if req.jsonrpc.as_deref().is_some_and(|v| v != "2.0") {
            return Some(JsonRpcResponse::failure(
                req.id,
                INVALID_REQUEST,
                "Invalid Request",
                Some(json!({"message": "jsonrpc must be \"2.0\""})),
            ));
        }

        if req.id.is_none() {
            debug!(method = %req.method, "Notification received");
            return None;
        }
        Some(self.handle_request(req).await)
    }

    async fn handle_request(&self, req: JsonRpcRequest) -> JsonRpcResponse {
        debug!(method = %req.method, "Handling JSON-RPC request");
        match req.method.as_str() {
            METHOD_INITIALIZE => self.handle_initialize(req),
            METHOD_PING => JsonRpcResponse::success(req.id, json!({})),
            METHOD_TOOLS_LIST => JsonRpcResponse::success(req.id, json!({"tools": tool_definitions()})),
            METHOD_TOOLS_CALL => self.handle_tools_call(req).await,
            METHOD_INITIALIZED => JsonRpcResponse::success(req.id, json!({})),
            other => {
                warn!(method = %other, "Unknown method");
                JsonRpcResponse::failure(req.id, METHOD_NOT_FOUND, "Method not found", None)
            }
        }
    }

    fn handle_initialize(&self, req: JsonRpcRequest) -> JsonRpcResponse {
        let params: InitializeParams = match parse_params(req.params) {
            Ok(p) => p,
            Err(e) => return invalid_params(req.id, e),
        };
        let protocol_version = params
            .protocol_version
            .unwrap_or_else(|| MCP_PROTOCOL_VERSION.to_string());
        info!(protocol_version = %protocol_version, "Client initialized");

        JsonRpcResponse::success(
            req.id,
            json!({
                "protocolVersion": protocol_version,
                "capabilities": {"tools": {"listChanged": false}},
                "serverInfo": {
                    "name": SERVER_NAME,
                    "version": env!("CARGO_PKG_VERSION")
                }
            }),
        )
    }

    async fn handle_tools_call(&self, req: JsonRpcRequest) -> JsonRpcResponse {
        let params: CallToolParams = match parse_params(req.params) {
            Ok(p) => p,
            Err(e) => return invalid_params(req.id, e),
        };
        if !ToolSurface::is_known(&params.name) {
            return invalid_params(req.id, format!("Unknown tool: {}", params.name));
        }

        match self.tools.call(&params.name, params.arguments).await {
            Ok(text) => JsonRpcResponse::success(req.id, tool_result(text, false)),
            Err(e) => {
                warn!(tool = %params.name, code = e.code(), error = %e, "Tool call failed");
                let text = format!("Error [{}]: {}", e.code(), e);
                JsonRpcResponse::success(req.id, tool_result(text, true))
            }
        }
    }
}

fn log_join(joined: Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        error!(error = %e, "Request task failed");
    }
}

fn tool_result(text: String, is_error: bool) -> Value {
    json!({
        "content": [{"type": "text", "text": text}],
        "isError": is_error
    })
}

fn parse_params<T: for<'de> Deserialize<'de>>(v: Option<Value>) -> Result<T, String> {
    let value = match v {
        None | Some(Value::Null) => json!({}),
        Some(other) => other,
    };
    serde_json::from_value(value).map_err(|e| e.to_string())
}

fn invalid_params(id: Option<Value>, msg: String) -> JsonRpcResponse {
    JsonRpcResponse::failure(
        id,
        INVALID_PARAMS,
        "Invalid params",
        Some(json!({"code": "E_VALIDATION", "message": msg})),
    )
}

async fn write_responses<W>(mut writer: W, mut rx: mpsc::UnboundedReceiver<String>) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(line) = rx.recv().await {
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }
    writer.shutdown().await
}
