//! Dispatch router shared by every transport.

use futures::FutureExt;
use serde::Serialize;
use serde_json::Value;
use std::any::Any;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::gateway::catalog::ToolCatalog;
use crate::gateway::context;
use crate::gateway::registry::{Arguments, HandlerRegistry};
use crate::metrics::{GatewayMetrics, Timer};

/// Reserved argument carrying the caller's bearer token.
pub const AUTH_TOKEN_ARG: &str = "auth_token";

/// Uniform outcome of a dispatched call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ResponseEnvelope {
    Success {
        tool: String,
        result: Value,
    },
    Failure {
        tool: String,
        arguments: Arguments,
        error: String,
    },
}

impl ResponseEnvelope {
    pub fn tool_name(&self) -> &str {
        match self {
            Self::Success { tool, .. } | Self::Failure { tool, .. } => tool,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// The handler's value, or the failure message.
    pub fn into_result(self) -> std::result::Result<Value, String> {
        match self {
            Self::Success { result, .. } => Ok(result),
            Self::Failure { error, .. } => Err(error),
        }
    }

    /// Failure as the `{"error", "tool", "arguments"}` document sent to
    /// session clients.
    pub fn failure_document(&self) -> Option<Value> {
        match self {
            Self::Success { .. } => None,
            Self::Failure {
                tool,
                arguments,
                error,
            } => Some(serde_json::json!({
                "error": error,
                "tool": tool,
                "arguments": arguments,
            })),
        }
    }
}

/// Resolves handlers, scopes the call context and normalizes outcomes.
pub struct DispatchRouter {
    catalog: ToolCatalog,
    registry: HandlerRegistry,
    metrics: Arc<GatewayMetrics>,
}

impl DispatchRouter {
    /// Create a router, verifying that catalog and registry name the same tools.
    pub fn new(catalog: ToolCatalog, registry: HandlerRegistry) -> Result<Self> {
        verify_lockstep(&catalog, &registry)?;
        Ok(Self {
            catalog,
            registry,
            metrics: GatewayMetrics::new(),
        })
    }

    /// Share an externally owned metrics collector.
    pub fn with_metrics(mut self, metrics: Arc<GatewayMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }

    pub fn metrics(&self) -> &Arc<GatewayMetrics> {
        &self.metrics
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.registry.contains(name)
    }

    /// Dispatch a call whose only token source is its own `auth_token` argument.
    pub async fn dispatch(&self, tool_name: &str, arguments: Arguments) -> ResponseEnvelope {
        self.dispatch_with_fallback(tool_name, arguments, None).await
    }

    /// Dispatch a call, using `fallback_token` when the arguments carry none.
    ///
    /// Transports use the fallback for tokens taken from request headers.
    pub async fn dispatch_with_fallback(
        &self,
        tool_name: &str,
        mut arguments: Arguments,
        fallback_token: Option<String>,
    ) -> ResponseEnvelope {
        let token = extract_token(&mut arguments).or(fallback_token);
        self.metrics.inc_tool_calls();

        let Some(handler) = self.registry.resolve(tool_name) else {
            warn!("Unknown tool requested: {}", tool_name);
            self.metrics.inc_unknown_tool();
            return ResponseEnvelope::Failure {
                tool: tool_name.to_string(),
                arguments,
                error: Error::UnknownTool(tool_name.to_string()).to_string(),
            };
        };

        debug!("Calling tool: {} with arguments: {:?}", tool_name, arguments);
        let timer = Timer::start();

        let call = context::with_token(token, handler.call(arguments.clone()));
        let outcome = match AssertUnwindSafe(call).catch_unwind().await {
            Ok(result) => result.map_err(|e| e.to_string()),
            Err(payload) => Err(panic_message(payload.as_ref())),
        };

        match outcome {
            Ok(result) => {
                debug!("Tool {} completed in {}ms", tool_name, timer.elapsed_ms());
                self.metrics.inc_success();
                ResponseEnvelope::Success {
                    tool: tool_name.to_string(),
                    result,
                }
            }
            Err(error) => {
                warn!("Tool {} failed after {}ms: {}", tool_name, timer.elapsed_ms(), error);
                self.metrics.inc_failed();
                ResponseEnvelope::Failure {
                    tool: tool_name.to_string(),
                    arguments,
                    error,
                }
            }
        }
    }
}

/// Remove the reserved token argument. Non-string values count as absent.
fn extract_token(arguments: &mut Arguments) -> Option<String> {
    match arguments.remove(AUTH_TOKEN_ARG)? {
        Value::String(token) => Some(token),
        Value::Null => None,
        other => {
            warn!("Ignoring non-string {} argument: {}", AUTH_TOKEN_ARG, other);
            None
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("handler panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("handler panicked: {}", s)
    } else {
        "handler panicked".to_string()
    }
}

fn verify_lockstep(catalog: &ToolCatalog, registry: &HandlerRegistry) -> Result<()> {
    let listed: HashSet<&str> = catalog.names().collect();
    let registered: HashSet<&str> = registry.names().collect();

    let mut missing_handlers: Vec<&str> = listed.difference(&registered).copied().collect();
    let mut missing_descriptors: Vec<&str> = registered.difference(&listed).copied().collect();
    if missing_handlers.is_empty() && missing_descriptors.is_empty() {
        return Ok(());
    }

    missing_handlers.sort_unstable();
    missing_descriptors.sort_unstable();
    Err(Error::CatalogMismatch(format!(
        "no handler for [{}]; no descriptor for [{}]",
        missing_handlers.join(", "),
        missing_descriptors.join(", ")
    )))
}
