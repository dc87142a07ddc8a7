//! Route handlers.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, KeepAliveStream, Sse};
use axum::Json;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::error::ApiError;
use crate::error::RelayError;
use crate::service::{ChatRequest, ElicitationCancel, ElicitationReply, Relay};

type EventStream = BoxStream<'static, Result<Event, Infallible>>;

/// `POST /chat`: one chat turn as server-sent events.
///
/// Every `data:` line is one outbound frame; the last is `[DONE]`. A failed
/// session ends with a single `error` event instead.
pub async fn chat(
    State(relay): State<Relay>,
    Json(request): Json<ChatRequest>,
) -> Result<Sse<KeepAliveStream<EventStream>>, ApiError> {
    if request.messages.is_empty() {
        return Err(RelayError::InvalidArgument("messages must not be empty".into()).into());
    }
    info!(messages = request.messages.len(), "chat request");

    let frames = relay.stream_frames(request.into_messages());
    let events = frames
        .map(|frame| {
            let event = match frame {
                Ok(frame) => Event::default().data(frame),
                Err(err) => {
                    warn!(error = %err, "chat session failed");
                    Event::default()
                        .event("error")
                        .data(json!({ "error": err.to_string() }).to_string())
                }
            };
            Ok::<_, Infallible>(event)
        })
        .boxed();

    Ok(Sse::new(events).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}

/// `POST /elicitation/respond`
pub async fn respond(
    State(relay): State<Relay>,
    Json(reply): Json<ElicitationReply>,
) -> Result<Json<Value>, ApiError> {
    relay.respond(&reply.elicitation_id, reply.response)?;
    Ok(Json(json!({ "status": "ok" })))
}

/// `POST /elicitation/cancel`
pub async fn cancel(
    State(relay): State<Relay>,
    Json(body): Json<ElicitationCancel>,
) -> Result<Json<Value>, ApiError> {
    relay.cancel_elicitation(&body.elicitation_id)?;
    Ok(Json(json!({ "status": "cancelled" })))
}

/// `GET /elicitations`
pub async fn pending(State(relay): State<Relay>) -> Json<Value> {
    Json(json!({ "pending": relay.pending_elicitations() }))
}

/// `GET /tools`
pub async fn tools(State(relay): State<Relay>) -> Json<Value> {
    Json(json!({ "tools": relay.tool_definitions().await }))
}

/// `GET /health`
pub async fn health(State(relay): State<Relay>) -> Json<Value> {
    let status = if relay.is_healthy().await { "ok" } else { "degraded" };
    Json(json!({
        "status": status,
        "executor": relay.executor_name(),
    }))
}
