//! WebSocket JSON-RPC gateway
//!
//! One connection runs one frame loop: parse, authenticate, dispatch,
//! respond. Handler failures answer the frame and keep the connection;
//! transport failures evict it. `chat.send_stream` interleaves
//! server-initiated events (`chat.start`, `chat.delta`*, `chat.end`) before
//! the RPC result; a client disconnect mid-stream cancels the agent turn and
//! suppresses `chat.end`.

use crate::auth::TokenAuth;
use crate::rpc::{codes, RpcFrame, RpcRequest};
use crate::state::{AppState, SERVER_VERSION};
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use selkie_agent::{AgentEvent, TerminationReason};
use selkie_core::metrics::Metrics;
use selkie_core::{Error, GATEWAY_CLOSE_CODE_OVERLOADED, GATEWAY_FRAME_SIZE_BYTES_MAX,
    GATEWAY_TEXT_LENGTH_CHARS_MAX};
use selkie_session::SessionKey;
use serde_json::{json, Value};
use tokio::sync::watch;
use tower_http::trace::TraceLayer;

/// Default session for requests that omit `session_key`
const SESSION_KEY_DEFAULT: &str = "agent:main:main";

/// Build the gateway router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_http))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Plain HTTP health endpoint for load balancers
async fn health_http() -> impl IntoResponse {
    Json(health_payload())
}

fn health_payload() -> Value {
    json!({
        "status": "ok",
        "version": SERVER_VERSION,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    })
}

/// Upgrade handler: claims a connection slot, then runs the frame loop
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let header_token = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(TokenAuth::from_header)
        .map(String::from);

    let ws = ws.max_message_size(GATEWAY_FRAME_SIZE_BYTES_MAX);

    ws.on_upgrade(move |socket| async move {
        if !state.try_connect() {
            Metrics::incr(&state.metrics.gateway_overloaded_total);
            tracing::warn!("connection limit reached, refusing client");
            close_overloaded(socket).await;
            return;
        }

        handle_socket(socket, state.clone(), header_token).await;
        state.disconnect();
    })
}

/// Close a surplus connection with status 1013 (try again later)
async fn close_overloaded(mut socket: WebSocket) {
    let _ = socket
        .send(Message::Close(Some(CloseFrame {
            code: GATEWAY_CLOSE_CODE_OVERLOADED,
            reason: "server overloaded".into(),
        })))
        .await;
}

/// The per-connection frame loop
async fn handle_socket(mut socket: WebSocket, state: AppState, header_token: Option<String>) {
    tracing::debug!(connections = state.connection_count(), "client connected");

    loop {
        let message = match socket.recv().await {
            Some(Ok(message)) => message,
            Some(Err(e)) => {
                tracing::debug!(error = %e, "transport error, evicting connection");
                break;
            }
            None => break,
        };

        match message {
            Message::Text(frame) => {
                Metrics::incr(&state.metrics.gateway_frames_total);
                if dispatch_frame(&mut socket, &state, header_token.as_deref(), &frame)
                    .await
                    .is_err()
                {
                    break;
                }
            }
            Message::Binary(_) => {
                let frame = RpcFrame::error(
                    &Value::Null,
                    codes::INVALID_REQUEST,
                    "binary frames are not supported",
                );
                if socket.send(Message::Text(frame.to_text())).await.is_err() {
                    break;
                }
            }
            Message::Close(_) => break,
            // Ping/pong are answered by axum
            _ => {}
        }
    }

    tracing::debug!("client disconnected");
}

/// Send one frame; Err means the transport is gone
async fn send_frame(socket: &mut WebSocket, frame: RpcFrame) -> Result<(), ()> {
    socket
        .send(Message::Text(frame.to_text()))
        .await
        .map_err(|_| ())
}

/// Parse, authenticate and dispatch one text frame
///
/// Ok means the connection should continue (even after handler errors);
/// Err means the client is gone.
async fn dispatch_frame(
    socket: &mut WebSocket,
    state: &AppState,
    header_token: Option<&str>,
    frame: &str,
) -> Result<(), ()> {
    let request = match RpcRequest::parse(frame) {
        Ok(request) => request,
        Err(e) => {
            tracing::info!(error = %e, "rejecting malformed frame");
            return send_frame(socket, RpcFrame::from_error(&Value::Null, &e)).await;
        }
    };

    if let Err(e) = state
        .auth
        .check(&request.method, header_token, request.param_str("token"))
    {
        Metrics::incr(&state.metrics.gateway_unauthorized_total);
        return send_frame(socket, RpcFrame::from_error(&request.id, &e)).await;
    }

    match request.method.as_str() {
        "health" => {
            send_frame(socket, RpcFrame::result(&request.id, health_payload())).await
        }
        "chat.send" => handle_chat_send(socket, state, &request).await,
        "chat.send_stream" => handle_chat_send_stream(socket, state, &request).await,
        "chat.history" => handle_chat_history(socket, state, &request).await,
        "sessions.list" => handle_sessions_list(socket, state, &request).await,
        "sessions.delete" => handle_sessions_delete(socket, state, &request).await,
        "metrics.snapshot" => handle_metrics_snapshot(socket, state, &request).await,
        other => {
            let error = Error::UnknownMethod {
                method: other.to_string(),
            };
            send_frame(socket, RpcFrame::from_error(&request.id, &error)).await
        }
    }
}

/// Validate and extract the `(text, session_key)` pair of a chat request
fn chat_params(request: &RpcRequest) -> Result<(String, SessionKey), Error> {
    let text = request
        .param_str("text")
        .ok_or_else(|| Error::invalid_params("missing field: text"))?;
    if text.is_empty() {
        return Err(Error::invalid_params("text must not be empty"));
    }
    if text.chars().count() > GATEWAY_TEXT_LENGTH_CHARS_MAX {
        return Err(Error::invalid_params(format!(
            "text exceeds {} characters",
            GATEWAY_TEXT_LENGTH_CHARS_MAX
        )));
    }

    let raw_key = request.param_str("session_key").unwrap_or(SESSION_KEY_DEFAULT);
    let key = SessionKey::parse(raw_key)?;
    Ok((text.to_string(), key))
}

/// `chat.send`: one blocking request/response turn
async fn handle_chat_send(
    socket: &mut WebSocket,
    state: &AppState,
    request: &RpcRequest,
) -> Result<(), ()> {
    let (text, key) = match chat_params(request) {
        Ok(parsed) => parsed,
        Err(e) => return send_frame(socket, RpcFrame::from_error(&request.id, &e)).await,
    };

    let message_id = uuid::Uuid::new_v4().to_string();
    let (_cancel_tx, cancel_rx) = watch::channel(false);
    let mut events = state.agent.handle(key.clone(), text, cancel_rx);

    let mut reply = String::new();
    let mut needs_input = false;
    while let Some(event) = events.recv().await {
        match event {
            AgentEvent::Delta(delta) => reply.push_str(&delta),
            AgentEvent::NeedsInput { prompt } => {
                reply = prompt;
                needs_input = true;
            }
            AgentEvent::Done { .. } => break,
        }
    }

    let mut result = json!({
        "message_id": message_id,
        "text": reply,
        "session_key": key.canonical(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });
    if needs_input {
        result["needs_input"] = json!(true);
    }
    send_frame(socket, RpcFrame::result(&request.id, result)).await
}

/// `chat.send_stream`: events first, result after `chat.end`
async fn handle_chat_send_stream(
    socket: &mut WebSocket,
    state: &AppState,
    request: &RpcRequest,
) -> Result<(), ()> {
    let (text, key) = match chat_params(request) {
        Ok(parsed) => parsed,
        Err(e) => return send_frame(socket, RpcFrame::from_error(&request.id, &e)).await,
    };

    let message_id = uuid::Uuid::new_v4().to_string();
    let (cancel_tx, cancel_rx) = watch::channel(false);
    let mut events = state.agent.handle(key.clone(), text, cancel_rx);

    let start = RpcFrame::event("chat.start", json!({"message_id": message_id}));
    if send_frame(socket, start).await.is_err() {
        let _ = cancel_tx.send(true);
        return Err(());
    }

    let mut terminal_reason = TerminationReason::Error;
    while let Some(event) = events.recv().await {
        let frame = match event {
            AgentEvent::Delta(delta) => Some(RpcFrame::event(
                "chat.delta",
                json!({"message_id": message_id, "delta": delta}),
            )),
            AgentEvent::NeedsInput { prompt } => Some(RpcFrame::event(
                "needs_input",
                json!({"message_id": message_id, "prompt": prompt}),
            )),
            AgentEvent::Done { reason } => {
                terminal_reason = reason;
                None
            }
        };

        if let Some(frame) = frame {
            if send_frame(socket, frame).await.is_err() {
                // Client gone mid-stream: cancel the turn, no chat.end
                let _ = cancel_tx.send(true);
                return Err(());
            }
        }
    }

    if terminal_reason == TerminationReason::Cancelled {
        return Err(());
    }

    let end = RpcFrame::event("chat.end", json!({"message_id": message_id}));
    send_frame(socket, end).await?;

    let result = json!({"message_id": message_id, "stream": true});
    send_frame(socket, RpcFrame::result(&request.id, result)).await
}

/// `chat.history`: transcript tail; unknown session yields an empty list
async fn handle_chat_history(
    socket: &mut WebSocket,
    state: &AppState,
    request: &RpcRequest,
) -> Result<(), ()> {
    let Some(raw_key) = request.param_str("session_key") else {
        let e = Error::invalid_params("missing field: session_key");
        return send_frame(socket, RpcFrame::from_error(&request.id, &e)).await;
    };
    let key = match SessionKey::parse(raw_key) {
        Ok(key) => key,
        Err(e) => return send_frame(socket, RpcFrame::from_error(&request.id, &e)).await,
    };
    let limit = request.param_u64("limit").unwrap_or(50) as usize;

    match state.sessions.history(&key, limit).await {
        Ok(messages) => {
            let result = json!({"messages": messages});
            send_frame(socket, RpcFrame::result(&request.id, result)).await
        }
        Err(e) => send_frame(socket, RpcFrame::from_error(&request.id, &e)).await,
    }
}

/// `sessions.list`
async fn handle_sessions_list(
    socket: &mut WebSocket,
    state: &AppState,
    request: &RpcRequest,
) -> Result<(), ()> {
    let agent_id = request.param_str("agent_id");
    let sessions = state.sessions.list_sessions(agent_id).await;
    let result = json!({"sessions": sessions});
    send_frame(socket, RpcFrame::result(&request.id, result)).await
}

/// `sessions.delete`: idempotent hard delete
async fn handle_sessions_delete(
    socket: &mut WebSocket,
    state: &AppState,
    request: &RpcRequest,
) -> Result<(), ()> {
    let Some(raw_key) = request.param_str("session_key") else {
        let e = Error::invalid_params("missing field: session_key");
        return send_frame(socket, RpcFrame::from_error(&request.id, &e)).await;
    };
    let key = match SessionKey::parse(raw_key) {
        Ok(key) => key,
        Err(e) => return send_frame(socket, RpcFrame::from_error(&request.id, &e)).await,
    };

    match state.sessions.delete(&key).await {
        Ok(_) => send_frame(
            socket,
            RpcFrame::result(&request.id, json!({"deleted": true})),
        )
        .await,
        Err(e) => send_frame(socket, RpcFrame::from_error(&request.id, &e)).await,
    }
}

/// `metrics.snapshot`: process and agent counters
async fn handle_metrics_snapshot(
    socket: &mut WebSocket,
    state: &AppState,
    request: &RpcRequest,
) -> Result<(), ()> {
    let result = json!({
        "process": state.metrics.snapshot(),
        "agent": state.agent.metrics.snapshot(),
        "memory": state.memory.stats(),
    });
    send_frame(socket, RpcFrame::result(&request.id, result)).await
}
