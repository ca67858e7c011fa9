//! Tool-protocol server over newline-delimited JSON-RPC.
//!
//! Requests are read line by line and each one is served on its own task, so
//! a long `tools/call` never blocks `ping`, `notifications/cancelled` or other
//! calls. All output goes through a single writer task.

use dashmap::DashMap;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use sandbox_mcp_core::{Error, ResourceProvider, Result, ToolContext};

use crate::jsonrpc::{
    CallToolParams, CancelledParams, ErrorObject, IncomingMessage, ReadResourceParams,
    RequestId, Response, INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND,
    PARSE_ERROR,
};
use crate::registry::ToolRegistry;
use crate::transport::{write_loop, ClientNotifier, Outbound};

const PROTOCOL_VERSION: &str = "2024-11-05";

/// Name and version reported by `initialize`.
#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            name: "code-sandbox-mcp".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Serves tools and resources to one client.
pub struct McpServer {
    info: ServerInfo,
    tools: ToolRegistry,
    resources: Vec<Arc<dyn ResourceProvider>>,
    in_flight: DashMap<RequestId, CancellationToken>,
}

type MethodResult = std::result::Result<Value, ErrorObject>;

impl McpServer {
    pub fn new(tools: ToolRegistry) -> Self {
        Self {
            info: ServerInfo::default(),
            tools,
            resources: Vec::new(),
            in_flight: DashMap::new(),
        }
    }

    pub fn with_resource(mut self, resource: Arc<dyn ResourceProvider>) -> Self {
        self.resources.push(resource);
        self
    }

    /// Serve on the process's stdin and stdout.
    pub async fn serve_stdio(self: Arc<Self>) -> Result<()> {
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await
    }

    /// Serve until `reader` reaches end of input.
    ///
    /// On end of input every in-flight call is cancelled and awaited, so
    /// containers started on behalf of a departed client are torn down.
    pub async fn serve<R, W>(self: Arc<Self>, reader: R, writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (out, rx) = Outbound::channel();
        let writer_task = tokio::spawn(write_loop(writer, rx));
        let mut tasks = JoinSet::new();
        let mut lines = BufReader::new(reader).lines();

        tracing::info!(server = %self.info.name, "Serving tool protocol");
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to read from input");
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            self.dispatch(&line, &out, &mut tasks);
            while tasks.try_join_next().is_some() {}
        }

        tracing::info!(
            in_flight = self.in_flight.len(),
            "Input closed, shutting down"
        );
        for entry in self.in_flight.iter() {
            entry.value().cancel();
        }
        while tasks.join_next().await.is_some() {}

        drop(out);
        writer_task
            .await
            .map_err(|e| Error::internal(format!("writer task failed: {}", e)))?
    }

    fn dispatch(self: &Arc<Self>, line: &str, out: &Outbound, tasks: &mut JoinSet<()>) {
        let value: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to parse message");
                reply(
                    out,
                    Response::failure(None, ErrorObject::new(PARSE_ERROR, format!("Parse error: {}", e))),
                );
                return;
            }
        };
        if value.get("method").is_none() {
            tracing::debug!("Ignoring message without a method");
            return;
        }

        let message: IncomingMessage = match serde_json::from_value(value) {
            Ok(message) => message,
            Err(e) => {
                reply(
                    out,
                    Response::failure(
                        None,
                        ErrorObject::new(INVALID_REQUEST, format!("Invalid request: {}", e)),
                    ),
                );
                return;
            }
        };

        let Some(id) = message.id else {
            self.handle_notification(&message.method, message.params);
            return;
        };

        // Registered before spawning so a cancellation on the very next line
        // finds the call.
        let cancel = CancellationToken::new();
        if message.method == "tools/call" {
            self.in_flight.insert(id.clone(), cancel.clone());
        }

        let server = Arc::clone(self);
        let out = out.clone();
        tasks.spawn(async move {
            let outcome = server
                .handle_request(&message.method, message.params, &out, cancel)
                .await;
            server.in_flight.remove(&id);
            let response = match outcome {
                Ok(result) => Response::success(id, result),
                Err(error) => Response::failure(Some(id), error),
            };
            reply(&out, response);
        });
    }

    async fn handle_request(
        &self,
        method: &str,
        params: Value,
        out: &Outbound,
        cancel: CancellationToken,
    ) -> MethodResult {
        match method {
            "initialize" => Ok(self.initialize(&params)),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(json!({ "tools": self.tools.definitions() })),
            "tools/call" => self.call_tool(params, out, cancel).await,
            "resources/list" => Ok(json!({ "resources": [] })),
            "resources/templates/list" => Ok(self.resource_templates()),
            "resources/read" => self.read_resource(params).await,
            _ => Err(ErrorObject::new(
                METHOD_NOT_FOUND,
                format!("Method not found: {}", method),
            )),
        }
    }

    fn handle_notification(&self, method: &str, params: Value) {
        match method {
            "notifications/initialized" => tracing::info!("Client initialized"),
            "notifications/cancelled" => match serde_json::from_value::<CancelledParams>(params) {
                Ok(cancelled) => match self.in_flight.get(&cancelled.request_id) {
                    Some(token) => {
                        tracing::info!(request_id = ?cancelled.request_id, reason = ?cancelled.reason, "Cancelling request");
                        token.cancel();
                    }
                    None => {
                        tracing::debug!(request_id = ?cancelled.request_id, "Cancellation for unknown request")
                    }
                },
                Err(e) => tracing::warn!(error = %e, "Malformed cancellation"),
            },
            _ => tracing::debug!(method = %method, "Ignoring notification"),
        }
    }

    fn initialize(&self, params: &Value) -> Value {
        let version = params
            .get("protocolVersion")
            .and_then(|v| v.as_str())
            .unwrap_or(PROTOCOL_VERSION);
        json!({
            "protocolVersion": version,
            "capabilities": {
                "tools": { "listChanged": false },
                "resources": { "subscribe": false, "listChanged": false }
            },
            "serverInfo": {
                "name": self.info.name,
                "version": self.info.version
            }
        })
    }

    async fn call_tool(&self, params: Value, out: &Outbound, cancel: CancellationToken) -> MethodResult {
        let params: CallToolParams = serde_json::from_value(params)
            .map_err(|e| ErrorObject::new(INVALID_PARAMS, format!("Invalid params: {}", e)))?;
        let tool = self.tools.get(&params.name).ok_or_else(|| {
            ErrorObject::new(INVALID_PARAMS, format!("Unknown tool: {}", params.name))
        })?;

        let arguments = if params.arguments.is_null() {
            json!({})
        } else {
            params.arguments
        };
        let ctx = ToolContext::new(Arc::new(ClientNotifier::new(out.clone())))
            .with_progress_token(params.meta.and_then(|m| m.progress_token))
            .with_cancel(cancel);

        tracing::info!(tool = %params.name, "Calling tool");
        let (text, is_error) = match tool.execute(arguments, ctx).await {
            Ok(output) => (output.content, !output.success),
            Err(e) => {
                tracing::warn!(tool = %params.name, error = %e, "Tool call rejected");
                (e.to_string(), true)
            }
        };

        Ok(json!({
            "content": [{ "type": "text", "text": text }],
            "isError": is_error
        }))
    }

    fn resource_templates(&self) -> Value {
        let templates: Vec<Value> = self
            .resources
            .iter()
            .map(|r| {
                json!({
                    "uriTemplate": r.uri_template(),
                    "name": r.name(),
                    "description": r.description(),
                    "mimeType": r.mime_type()
                })
            })
            .collect();
        json!({ "resourceTemplates": templates })
    }

    async fn read_resource(&self, params: Value) -> MethodResult {
        let params: ReadResourceParams = serde_json::from_value(params)
            .map_err(|e| ErrorObject::new(INVALID_PARAMS, format!("Invalid params: {}", e)))?;

        for resource in &self.resources {
            match resource.read(&params.uri).await {
                Ok(Some(text)) => {
                    return Ok(json!({
                        "contents": [{
                            "uri": params.uri,
                            "mimeType": resource.mime_type(),
                            "text": text
                        }]
                    }))
                }
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(uri = %params.uri, error = %e, "Failed to read resource");
                    return Err(ErrorObject::new(INTERNAL_ERROR, e.to_string()));
                }
            }
        }

        Err(ErrorObject::new(
            INVALID_PARAMS,
            format!("Unknown resource: {}", params.uri),
        ))
    }
}

fn reply(out: &Outbound, response: Response) {
    if let Err(e) = out.send(&response) {
        tracing::debug!(error = %e, "Dropping response");
    }
}
