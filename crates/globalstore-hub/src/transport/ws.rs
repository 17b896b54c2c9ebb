//! WebSocket hub endpoint.
//!
//! Responsibilities:
//! - Take the parent origin from the `Origin` header
//! - Run the hub startup check *before* upgrading (403 on refusal)
//! - Send the readiness sentinel, then answer request frames one at a time
//! - Lifecycle: ping + idle timeout
//!
//! Frames are JSON text, identical to the in-process channel payloads. Binary
//! and undecodable frames are ignored, like any other malformed message.

use axum::{
    extract::{ws::Message, ws::WebSocket, ws::WebSocketUpgrade, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::time::{Duration, Instant};

use globalstore_core::error::{GlobalStoreError, Result};
use globalstore_core::protocol::READY_SENTINEL;

use crate::app_state::AppState;
use crate::dispatch::HubHandler;

// --------------------
// Entry
// --------------------
pub async fn ws_upgrade(
    State(app): State<AppState>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let origin = headers
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let handler = match app.hub().start(origin.as_deref()) {
        Ok(h) => h,
        Err(e) => {
            tracing::warn!(origin = ?origin, error = %e, "hub refused parent");
            return (StatusCode::FORBIDDEN, e.to_string()).into_response();
        }
    };

    ws.on_upgrade(move |socket| async move {
        if let Err(e) = run_session(app, handler, origin, socket).await {
            tracing::debug!(error = %e, "hub session ended with error");
        }
    })
}

// --------------------
// Session loop
// --------------------
async fn run_session(
    app: AppState,
    handler: HubHandler,
    origin: Option<String>,
    socket: WebSocket,
) -> Result<()> {
    let (mut ws_tx, mut ws_rx) = socket.split();

    ws_tx
        .send(Message::Text(Value::String(READY_SENTINEL.into()).to_string()))
        .await
        .map_err(|e| GlobalStoreError::Transport(format!("send ready failed: {e}")))?;

    let (ping_every, idle_timeout) = app.cfg().server.keepalive();

    let mut ping_tick = tokio::time::interval(ping_every);
    ping_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut last_activity = Instant::now();

    loop {
        tokio::select! {
            incoming = ws_rx.next() => {
                let Some(Ok(msg)) = incoming else { break; };
                last_activity = Instant::now();

                match msg {
                    Message::Text(s) => {
                        let Ok(data) = serde_json::from_str::<Value>(&s) else {
                            tracing::debug!(origin = ?origin, "ignoring non-json frame");
                            continue;
                        };
                        let Some(reply) = handler.handle_async(origin.clone(), data).await else { continue; };
                        let out = serde_json::to_string(&reply)
                            .map_err(|e| GlobalStoreError::Internal(format!("reply encode failed: {e}")))?;
                        if ws_tx.send(Message::Text(out)).await.is_err() {
                            break;
                        }
                    }
                    Message::Ping(payload) => {
                        if ws_tx.send(Message::Pong(payload)).await.is_err() {
                            break;
                        }
                    }
                    Message::Binary(_) | Message::Pong(_) => {}
                    Message::Close(_) => break,
                }
            }

            _ = ping_tick.tick() => {
                if ws_tx.send(Message::Ping(Vec::new())).await.is_err() {
                    break;
                }
            }

            _ = tokio::time::sleep(Duration::from_millis(250)) => {
                if last_activity.elapsed() >= idle_timeout {
                    tracing::debug!(origin = ?origin, "hub session idle timeout");
                    break;
                }
            }
        }
    }

    Ok(())
}
