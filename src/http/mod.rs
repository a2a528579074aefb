//! HTTP server: stateless tool endpoint plus MCP over SSE.
//!
//! Routes:
//! - `GET|POST /` and `/mcp` - stateless request/response transport
//! - `GET /sse`, `POST /messages/` - streaming session transport
//! - `GET /health`, `GET /metrics` - operational endpoints

mod sse;
mod stateless;

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use dashmap::DashMap;
use std::any::Any;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any as AnyOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::gateway::DispatchRouter;
use crate::mcp::McpServer;
use crate::{SERVER_NAME, VERSION};

use sse::SessionHandle;

/// Header carrying a caller's bearer token.
pub const AUTH_TOKEN_HEADER: &str = "x-auth-token";

/// Shared state for all routes.
#[derive(Clone)]
pub struct AppState {
    router: Arc<DispatchRouter>,
    server: McpServer,
    sessions: Arc<DashMap<String, SessionHandle>>,
    json_response: bool,
}

impl AppState {
    pub fn new(router: Arc<DispatchRouter>, json_response: bool) -> Self {
        let server = McpServer::new(router.clone(), SERVER_NAME);
        Self {
            router,
            server,
            sessions: Arc::new(DashMap::new()),
            json_response,
        }
    }

    /// Number of open SSE sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

/// JSON `{"error": ...}` response with a status code.
#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    message: String,
}

impl HttpError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl From<Error> for HttpError {
    fn from(err: Error) -> Self {
        let status = if err.is_bad_request() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}

/// Build the application router.
pub fn app(state: AppState) -> Router {
    let stateless = get(stateless::identity)
        .post(stateless::call)
        .fallback(method_not_allowed);

    Router::new()
        .route("/", stateless.clone())
        .route("/mcp", stateless)
        .route("/sse", get(sse::open_session))
        .route("/messages", post(sse::post_message))
        .route("/messages/", post(sse::post_message))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(CorsLayer::new().allow_origin(AnyOrigin).allow_methods(AnyOrigin).allow_headers(AnyOrigin))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server.
pub async fn start_server(config: &Config, router: Arc<DispatchRouter>) -> Result<()> {
    let state = AppState::new(router, config.json_response);

    let addr = config.bind_addr();
    info!("Starting HTTP server on {}", addr);
    info!("  stateless endpoint: http://{}/mcp", addr);
    info!("  SSE endpoint:       http://{}/sse", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Bearer token from the request headers, if any.
pub(crate) fn header_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTH_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
}

/// Health check endpoint.
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": VERSION
    }))
}

/// Prometheus metrics endpoint.
async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.router.metrics().to_prometheus(),
    )
}

async fn method_not_allowed() -> HttpError {
    HttpError::new(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
}

fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = payload
        .downcast_ref::<String>()
        .cloned()
        .or_else(|| payload.downcast_ref::<&str>().map(|s| s.to_string()))
        .unwrap_or_else(|| "unknown panic".to_string());
    error!("Request handler panicked: {}", detail);
    HttpError::new(
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("Internal server error: {}", detail),
    )
    .into_response()
}
