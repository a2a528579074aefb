//! MCP session server.
//!
//! Serves one streaming session over any [`Transport`]. `tools/call` requests
//! run on their own tasks so overlapping calls do not wait on each other;
//! replies are correlated by request id.

use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::gateway::{DispatchRouter, ResponseEnvelope};
use crate::mcp::protocol::*;
use crate::mcp::transport::{Message, Transport};
use crate::VERSION;

/// MCP server.
#[derive(Clone)]
pub struct McpServer {
    router: Arc<DispatchRouter>,
    name: String,
    version: String,
    /// Token used for calls that carry no `auth_token` argument.
    fallback_token: Option<String>,
}

impl McpServer {
    /// Create a new MCP server.
    pub fn new(router: Arc<DispatchRouter>, name: impl Into<String>) -> Self {
        Self {
            router,
            name: name.into(),
            version: VERSION.to_string(),
            fallback_token: None,
        }
    }

    /// Use `token` for calls in this session that do not supply their own.
    pub fn with_fallback_token(mut self, token: Option<String>) -> Self {
        self.fallback_token = token;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the server with the given transport until the peer goes away.
    ///
    /// In-flight calls are awaited before returning so their replies are
    /// still handed to the transport.
    pub async fn run<T: Transport>(&self, mut transport: T) -> Result<()> {
        info!("Starting MCP session: {} v{}", self.name, self.version);

        let (mut incoming, outgoing) = transport.start().await?;
        let mut in_flight = JoinSet::new();

        while let Some(msg) = incoming.recv().await {
            while let Some(joined) = in_flight.try_join_next() {
                if let Err(e) = joined {
                    error!("Tool call task failed: {}", e);
                }
            }

            match msg {
                Message::Request(req) if req.method == "tools/call" => {
                    let server = self.clone();
                    let outgoing = outgoing.clone();
                    in_flight.spawn(async move {
                        let response = server.handle_request(req).await;
                        send_response(&outgoing, response).await;
                    });
                }
                Message::Request(req) => {
                    let response = self.handle_request(req).await;
                    if !send_response(&outgoing, response).await {
                        break;
                    }
                }
                Message::Notification(notif) => {
                    self.handle_notification(notif);
                }
                Message::Response(_) => {
                    warn!("Received unexpected response");
                }
            }
        }

        while let Some(joined) = in_flight.join_next().await {
            if let Err(e) = joined {
                error!("Tool call task failed: {}", e);
            }
        }

        drop(outgoing);
        transport.stop().await?;
        info!("MCP session stopped");
        Ok(())
    }

    /// Handle a JSON-RPC request.
    pub async fn handle_request(&self, req: JsonRpcRequest) -> JsonRpcResponse {
        debug!("Handling request: {} (id: {:?})", req.method, req.id);

        let result = match req.method.as_str() {
            "initialize" => self.handle_initialize(),
            "ping" => Ok(serde_json::json!({})),
            "tools/list" => self.handle_list_tools(),
            "tools/call" => self.handle_call_tool(req.params).await,
            _ => Err((
                error_codes::METHOD_NOT_FOUND,
                format!("Method not found: {}", req.method),
            )),
        };

        match result {
            Ok(value) => JsonRpcResponse::success(req.id, value),
            Err((code, message)) => JsonRpcResponse::failure(req.id, code, message),
        }
    }

    /// Handle a notification.
    pub fn handle_notification(&self, notif: JsonRpcNotification) {
        debug!("Handling notification: {}", notif.method);

        match notif.method.as_str() {
            "notifications/initialized" => {
                info!("Client initialized");
            }
            "notifications/cancelled" => {
                // In-flight calls always run to completion.
                debug!("Ignoring cancellation: {:?}", notif.params);
            }
            _ => {
                debug!("Unknown notification: {}", notif.method);
            }
        }
    }

    fn handle_initialize(&self) -> std::result::Result<Value, (i32, String)> {
        let result = InitializeResult {
            protocol_version: MCP_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: false,
                }),
            },
            server_info: ServerInfo {
                name: self.name.clone(),
                version: self.version.clone(),
            },
        };
        to_json(&result)
    }

    fn handle_list_tools(&self) -> std::result::Result<Value, (i32, String)> {
        let tools = self.router.catalog().list_tools().to_vec();
        to_json(&ListToolsResult { tools })
    }

    async fn handle_call_tool(
        &self,
        params: Option<Value>,
    ) -> std::result::Result<Value, (i32, String)> {
        let params: CallToolParams = params
            .ok_or_else(|| "Missing params".to_string())
            .and_then(|v| serde_json::from_value(v).map_err(|e| e.to_string()))
            .map_err(|e| (error_codes::INVALID_PARAMS, format!("Invalid params: {}", e)))?;

        let envelope = self
            .router
            .dispatch_with_fallback(&params.name, params.arguments, self.fallback_token.clone())
            .await;
        to_json(&tool_result(&envelope))
    }
}

/// Render an envelope as MCP tool-call content.
pub fn tool_result(envelope: &ResponseEnvelope) -> ToolResult {
    let (document, is_error) = match envelope {
        ResponseEnvelope::Success { result, .. } => (result.clone(), false),
        ResponseEnvelope::Failure { .. } => (envelope.failure_document().unwrap_or_default(), true),
    };
    let text = serde_json::to_string_pretty(&document).unwrap_or_else(|_| document.to_string());
    ToolResult {
        content: vec![ContentBlock::Text { text }],
        is_error,
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> std::result::Result<Value, (i32, String)> {
    serde_json::to_value(value).map_err(|e| (error_codes::INTERNAL_ERROR, e.to_string()))
}

async fn send_response(outgoing: &mpsc::Sender<Message>, response: JsonRpcResponse) -> bool {
    if outgoing.send(Message::Response(response)).await.is_err() {
        // Peer is gone; the result is dropped.
        warn!("Failed to send response");
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{context, Arguments, HandlerRegistry, ToolCatalog, ToolDescriptor};
    use crate::mcp::transport::ChannelTransport;
    use serde_json::json;
    use std::time::Duration;

    fn router() -> Arc<DispatchRouter> {
        let catalog = ToolCatalog::new(vec![
            ToolDescriptor::new("slow_whoami", "Sleep then report the token", json!({"type": "object"})),
            ToolDescriptor::new("fail", "Always fails", json!({"type": "object"})),
        ])
        .unwrap();
        let mut registry = HandlerRegistry::new();
        registry
            .register_fn("slow_whoami", |args: Arguments| async move {
                let delay = args.get("delay_ms").and_then(Value::as_u64).unwrap_or(0);
                tokio::time::sleep(Duration::from_millis(delay)).await;
                Ok::<_, crate::error::Error>(json!({ "token": context::current_token() }))
            })
            .unwrap();
        registry
            .register_fn("fail", |_args: Arguments| async move {
                Err::<Value, _>(crate::error::Error::tool("Twilio unavailable"))
            })
            .unwrap();
        Arc::new(DispatchRouter::new(catalog, registry).unwrap())
    }

    fn request(id: i64, method: &str, params: Value) -> JsonRpcRequest {
        JsonRpcRequest {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: RequestId::Number(id),
            method: method.to_string(),
            params: Some(params),
        }
    }

    fn text_of(result: &Value) -> Value {
        let text = result["content"][0]["text"].as_str().unwrap();
        serde_json::from_str(text).unwrap()
    }

    #[tokio::test]
    async fn test_initialize_and_list() {
        let server = McpServer::new(router(), "twilio-mcp-server");

        let init = server.handle_request(request(1, "initialize", json!({}))).await;
        let result = init.result.unwrap();
        assert_eq!(result["serverInfo"]["name"], "twilio-mcp-server");
        assert_eq!(result["protocolVersion"], MCP_VERSION);

        let list = server.handle_request(request(2, "tools/list", json!({}))).await;
        let tools = list.result.unwrap()["tools"].clone();
        let names: Vec<_> = tools
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["slow_whoami", "fail"]);
        assert!(tools[0]["inputSchema"].is_object());
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let server = McpServer::new(router(), "test");
        let response = server.handle_request(request(1, "resources/list", json!({}))).await;
        let error = response.error.unwrap();
        assert_eq!(error.code, error_codes::METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_call_success_and_failure_content() {
        let server = McpServer::new(router(), "test");

        let ok = server
            .handle_request(request(
                1,
                "tools/call",
                json!({"name": "slow_whoami", "arguments": {"auth_token": "tokA"}}),
            ))
            .await;
        let result = ok.result.unwrap();
        assert_eq!(result["isError"], false);
        assert_eq!(text_of(&result), json!({"token": "tokA"}));

        let failed = server
            .handle_request(request(
                2,
                "tools/call",
                json!({"name": "fail", "arguments": {"auth_token": "secret", "to": "+1"}}),
            ))
            .await;
        let result = failed.result.unwrap();
        assert_eq!(result["isError"], true);
        assert_eq!(
            text_of(&result),
            json!({"error": "Twilio unavailable", "tool": "fail", "arguments": {"to": "+1"}})
        );
    }

    #[tokio::test]
    async fn test_unknown_tool_is_tool_error_not_rpc_error() {
        let server = McpServer::new(router(), "test");
        let response = server
            .handle_request(request(
                1,
                "tools/call",
                json!({"name": "nonexistent_tool", "arguments": {}}),
            ))
            .await;
        assert!(response.error.is_none());
        let result = response.result.unwrap();
        assert_eq!(result["isError"], true);
        assert_eq!(text_of(&result)["error"], "Unknown tool: nonexistent_tool");
    }

    #[tokio::test]
    async fn test_missing_params_is_invalid_params() {
        let server = McpServer::new(router(), "test");
        let mut req = request(1, "tools/call", json!({}));
        req.params = None;
        let response = server.handle_request(req).await;
        assert_eq!(response.error.unwrap().code, error_codes::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_session_fallback_token() {
        let server =
            McpServer::new(router(), "test").with_fallback_token(Some("header-token".to_string()));
        let response = server
            .handle_request(request(1, "tools/call", json!({"name": "slow_whoami"})))
            .await;
        assert_eq!(text_of(&response.result.unwrap()), json!({"token": "header-token"}));
    }

    #[tokio::test]
    async fn test_run_serves_calls_concurrently() {
        let server = McpServer::new(router(), "test");
        let (in_tx, in_rx) = mpsc::channel(16);
        let (out_tx, mut out_rx) = mpsc::channel(16);

        let session = tokio::spawn(async move {
            server.run(ChannelTransport::new(in_rx, out_tx)).await
        });

        in_tx
            .send(Message::Request(request(
                1,
                "tools/call",
                json!({"name": "slow_whoami", "arguments": {"auth_token": "tokA", "delay_ms": 200}}),
            )))
            .await
            .unwrap();
        in_tx
            .send(Message::Request(request(
                2,
                "tools/call",
                json!({"name": "slow_whoami", "arguments": {"auth_token": "tokB"}}),
            )))
            .await
            .unwrap();
        drop(in_tx);

        let mut replies = Vec::new();
        while let Some(Message::Response(res)) = out_rx.recv().await {
            replies.push(res);
        }
        session.await.unwrap().unwrap();

        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0].id, RequestId::Number(2));
        assert_eq!(text_of(replies[0].result.as_ref().unwrap()), json!({"token": "tokB"}));
        assert_eq!(replies[1].id, RequestId::Number(1));
        assert_eq!(text_of(replies[1].result.as_ref().unwrap()), json!({"token": "tokA"}));
    }

    #[tokio::test]
    async fn test_finished_calls_are_reaped_between_messages() {
        let server = McpServer::new(router(), "test");
        let (in_tx, in_rx) = mpsc::channel(16);
        let (out_tx, mut out_rx) = mpsc::channel(16);

        let session = tokio::spawn(async move {
            server.run(ChannelTransport::new(in_rx, out_tx)).await
        });

        for id in 1..=3 {
            in_tx
                .send(Message::Request(request(
                    id,
                    "tools/call",
                    json!({"name": "fail", "arguments": {}}),
                )))
                .await
                .unwrap();
            match out_rx.recv().await {
                Some(Message::Response(res)) => {
                    assert_eq!(res.id, RequestId::Number(id));
                    assert_eq!(res.result.unwrap()["isError"], true);
                }
                other => panic!("expected response, got {:?}", other),
            }
        }

        // The next message drains the finished call tasks before it is handled.
        in_tx
            .send(Message::Request(request(4, "ping", json!({}))))
            .await
            .unwrap();
        match out_rx.recv().await {
            Some(Message::Response(res)) => assert_eq!(res.result, Some(json!({}))),
            other => panic!("expected response, got {:?}", other),
        }

        drop(in_tx);
        session.await.unwrap().unwrap();
    }
}
