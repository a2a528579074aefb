//! MCP session transport over Server-Sent Events.
//!
//! `GET /sse` opens a session and announces where to post messages; replies
//! flow back as `message` events. Each session runs its own [`McpServer`]
//! loop over a [`ChannelTransport`].

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use dashmap::DashMap;
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{header_token, AppState, HttpError};
use crate::error::Error;
use crate::mcp::transport::CHANNEL_CAPACITY;
use crate::mcp::{ChannelTransport, McpServer, Message};
use crate::metrics::GatewayMetrics;

/// Handle on an open session.
#[derive(Clone)]
pub struct SessionHandle {
    incoming: mpsc::Sender<Message>,
    server: McpServer,
}

#[derive(Debug, Deserialize)]
pub(super) struct SessionQuery {
    session_id: String,
}

/// Removes the session when its event stream is dropped.
struct SessionGuard {
    id: String,
    sessions: Arc<DashMap<String, SessionHandle>>,
    metrics: Arc<GatewayMetrics>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.sessions.remove(&self.id);
        self.metrics.session_closed();
        info!("SSE session {} closed", self.id);
    }
}

/// Open a session and stream its replies.
pub(super) async fn open_session(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let id = Uuid::new_v4().simple().to_string();
    let server = state.server.clone().with_fallback_token(header_token(&headers));

    let (incoming_tx, incoming_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (outgoing_tx, outgoing_rx) = mpsc::channel(CHANNEL_CAPACITY);

    state.sessions.insert(
        id.clone(),
        SessionHandle {
            incoming: incoming_tx,
            server: server.clone(),
        },
    );
    let metrics = state.router.metrics().clone();
    metrics.session_opened();
    info!("SSE session {} opened", id);

    let session_id = id.clone();
    tokio::spawn(async move {
        if let Err(e) = server.run(ChannelTransport::new(incoming_rx, outgoing_tx)).await {
            error!("SSE session {} failed: {}", session_id, e);
        }
    });

    let endpoint = Event::default()
        .event("endpoint")
        .data(format!("/messages/?session_id={}", id));

    let guard = SessionGuard {
        id,
        sessions: state.sessions.clone(),
        metrics,
    };

    let replies = ReceiverStream::new(outgoing_rx).filter_map(|msg| async move {
        match Event::default().event("message").json_data(&msg) {
            Ok(event) => Some(event),
            Err(e) => {
                error!("Failed to encode SSE message: {}", e);
                None
            }
        }
    });

    let events = stream::once(async move { endpoint })
        .chain(replies)
        .map(move |event| {
            let _session = &guard;
            Ok(event)
        });

    Sse::new(events).keep_alive(KeepAlive::default())
}

/// Accept a JSON-RPC message for a session.
pub(super) async fn post_message(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
    body: Bytes,
) -> Result<Response, HttpError> {
    let session = state
        .sessions
        .get(&query.session_id)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| HttpError::new(StatusCode::NOT_FOUND, "Could not find session"))?;

    let text = std::str::from_utf8(&body)
        .map_err(|_| Error::MalformedRequest("Request body is not UTF-8".into()))?;
    let msg = Message::parse(text).map_err(|e| Error::MalformedRequest(e.to_string()))?;
    debug!("Message for session {}: {:?}", query.session_id, msg);

    if state.json_response {
        return Ok(match msg {
            Message::Request(req) => {
                // Runs on its own task so a dropped connection does not cancel it.
                let server = session.server.clone();
                let response = tokio::spawn(async move { server.handle_request(req).await })
                    .await
                    .map_err(|e| Error::Internal(format!("Request task failed: {}", e)))?;
                Json(response).into_response()
            }
            Message::Notification(notif) => {
                session.server.handle_notification(notif);
                StatusCode::ACCEPTED.into_response()
            }
            Message::Response(_) => {
                warn!("Ignoring response posted by client");
                StatusCode::ACCEPTED.into_response()
            }
        });
    }

    session
        .incoming
        .send(msg)
        .await
        .map_err(|_| HttpError::new(StatusCode::NOT_FOUND, "Could not find session"))?;
    Ok((StatusCode::ACCEPTED, "Accepted").into_response())
}
