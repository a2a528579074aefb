//! Stateless request/response transport.
//!
//! `POST` bodies are `{"method": ..., "params": {...}}`; each request is
//! answered in full without any session state.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::{header_token, AppState, HttpError};
use crate::error::Error;
use crate::gateway::ResponseEnvelope;
use crate::mcp::protocol::CallToolParams;
use crate::{SERVER_NAME, VERSION};

#[derive(Debug, Deserialize)]
struct StatelessRequest {
    method: String,
    #[serde(default)]
    params: Option<Value>,
}

/// Liveness and identity document.
pub(super) async fn identity(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "server": SERVER_NAME,
        "version": VERSION,
        "status": "ok",
        "transport": "stateless",
        "endpoints": {
            "stateless": "/mcp",
            "sse": "/sse",
            "messages": "/messages/",
            "health": "/health",
            "metrics": "/metrics"
        },
        "tools": state.router.catalog().len(),
    }))
}

pub(super) async fn call(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, HttpError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(HttpError::bad_request("Empty request body"));
    }

    let value: Value = serde_json::from_slice(&body)
        .map_err(|e| Error::MalformedRequest(format!("Invalid JSON: {}", e)))?;
    let request: StatelessRequest = serde_json::from_value(value)
        .map_err(|e| Error::MalformedRequest(format!("Invalid request: {}", e)))?;
    debug!("Stateless request: {}", request.method);

    match request.method.as_str() {
        "tools/list" => Ok(Json(json!({ "tools": state.router.catalog().summaries() }))
            .into_response()),
        "tools/call" => {
            let params = request
                .params
                .ok_or_else(|| Error::MalformedRequest("Missing params for tools/call".into()))?;
            let params: CallToolParams = serde_json::from_value(params)
                .map_err(|e| Error::MalformedRequest(format!("Invalid params: {}", e)))?;

            if !state.router.has_tool(&params.name) {
                state.router.metrics().inc_unknown_tool();
                return Err(Error::UnknownTool(params.name).into());
            }

            // Detached from the request future so a client hanging up does
            // not cancel the handler.
            let router = state.router.clone();
            let token = header_token(&headers);
            let envelope = tokio::spawn(async move {
                router
                    .dispatch_with_fallback(&params.name, params.arguments, token)
                    .await
            })
            .await
            .map_err(|e| Error::Internal(format!("Tool call task failed: {}", e)))?;

            Ok(match envelope {
                ResponseEnvelope::Success { result, .. } => {
                    (StatusCode::OK, Json(json!({ "result": result }))).into_response()
                }
                ResponseEnvelope::Failure { error, .. } => {
                    HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, error).into_response()
                }
            })
        }
        other => Err(HttpError::bad_request(format!("Unknown method: {}", other))),
    }
}
