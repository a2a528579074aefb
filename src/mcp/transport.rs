//! MCP transport layer implementations.
//!
//! `StdioTransport` speaks newline-delimited JSON-RPC on stdin/stdout.
//! `ChannelTransport` wraps a pair of in-process channels and backs the SSE
//! sessions served by the HTTP module.

use async_trait::async_trait;
use serde::Serialize;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, trace};

use crate::error::{Error, Result};
use crate::mcp::protocol::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};

/// Capacity of the per-transport message channels.
pub const CHANNEL_CAPACITY: usize = 100;

/// A message that can be sent or received.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Message {
    Request(JsonRpcRequest),
    Response(JsonRpcResponse),
    Notification(JsonRpcNotification),
}

impl Message {
    /// Parse one JSON-RPC message: request first, then notification, then response.
    pub fn parse(text: &str) -> Result<Self> {
        if let Ok(req) = serde_json::from_str::<JsonRpcRequest>(text) {
            return Ok(Self::Request(req));
        }
        if let Ok(notif) = serde_json::from_str::<JsonRpcNotification>(text) {
            return Ok(Self::Notification(notif));
        }
        match serde_json::from_str::<JsonRpcResponse>(text) {
            Ok(res) => Ok(Self::Response(res)),
            Err(e) => Err(Error::McpProtocol(format!("Invalid JSON-RPC message: {}", e))),
        }
    }
}

/// Transport trait for MCP communication.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Start the transport, returning channels for messages.
    async fn start(&mut self) -> Result<(mpsc::Receiver<Message>, mpsc::Sender<Message>)>;

    /// Stop the transport.
    async fn stop(&mut self) -> Result<()>;
}

/// Stdio transport for MCP.
pub struct StdioTransport {
    running: bool,
    writer: Option<JoinHandle<()>>,
}

impl StdioTransport {
    /// Create a new stdio transport.
    pub fn new() -> Self {
        Self {
            running: false,
            writer: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }
}

impl Default for StdioTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn start(&mut self) -> Result<(mpsc::Receiver<Message>, mpsc::Sender<Message>)> {
        self.running = true;

        // Channel for incoming messages (from stdin)
        let (incoming_tx, incoming_rx) = mpsc::channel::<Message>(CHANNEL_CAPACITY);
        // Channel for outgoing messages (to stdout)
        let (outgoing_tx, mut outgoing_rx) = mpsc::channel::<Message>(CHANNEL_CAPACITY);

        // Spawn stdin reader task
        tokio::spawn(async move {
            let stdin = tokio::io::stdin();
            let mut reader = BufReader::new(stdin);
            let mut line = String::new();

            loop {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) => {
                        debug!("EOF on stdin, stopping transport");
                        break;
                    }
                    Ok(_) => {
                        let trimmed = line.trim();
                        if trimmed.is_empty() {
                            continue;
                        }

                        trace!("Received: {}", trimmed);

                        match Message::parse(trimmed) {
                            Ok(msg) => {
                                if incoming_tx.send(msg).await.is_err() {
                                    break;
                                }
                            }
                            Err(e) => error!("Failed to parse message: {}", e),
                        }
                    }
                    Err(e) => {
                        error!("Error reading stdin: {}", e);
                        break;
                    }
                }
            }
        });

        // Spawn stdout writer task
        self.writer = Some(tokio::spawn(async move {
            let mut stdout = tokio::io::stdout();

            while let Some(msg) = outgoing_rx.recv().await {
                match serde_json::to_string(&msg) {
                    Ok(s) => {
                        trace!("Sending: {}", s);
                        if let Err(e) = stdout.write_all(s.as_bytes()).await {
                            error!("Error writing to stdout: {}", e);
                            break;
                        }
                        if let Err(e) = stdout.write_all(b"\n").await {
                            error!("Error writing newline: {}", e);
                            break;
                        }
                        if let Err(e) = stdout.flush().await {
                            error!("Error flushing stdout: {}", e);
                            break;
                        }
                    }
                    Err(e) => {
                        error!("Error serializing message: {}", e);
                    }
                }
            }
        }));

        Ok((incoming_rx, outgoing_tx))
    }

    /// Waits for queued output to be written once every sender is dropped.
    async fn stop(&mut self) -> Result<()> {
        self.running = false;
        if let Some(writer) = self.writer.take() {
            writer
                .await
                .map_err(|e| Error::Transport(format!("stdout writer failed: {}", e)))?;
        }
        Ok(())
    }
}

/// Transport over caller-supplied channels.
pub struct ChannelTransport {
    incoming: Option<mpsc::Receiver<Message>>,
    outgoing: Option<mpsc::Sender<Message>>,
}

impl ChannelTransport {
    pub fn new(incoming: mpsc::Receiver<Message>, outgoing: mpsc::Sender<Message>) -> Self {
        Self {
            incoming: Some(incoming),
            outgoing: Some(outgoing),
        }
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn start(&mut self) -> Result<(mpsc::Receiver<Message>, mpsc::Sender<Message>)> {
        match (self.incoming.take(), self.outgoing.take()) {
            (Some(incoming), Some(outgoing)) => Ok((incoming, outgoing)),
            _ => Err(Error::Transport("channel transport already started".to_string())),
        }
    }

    async fn stop(&mut self) -> Result<()> {
        Ok(())
    }
}
