//! WebSocket upgrade handler and per-connection event loop.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tokio::time;

use crate::AppState;

use super::events::{ClientEvent, EventName, GatewayMessage};
use super::fanout::BroadcastPayload;
use super::registry::ConnectionId;
use super::session::GatewaySession;
use super::transport::dispatch;

/// Close code for a connection that went silent (4000-range is application-level).
const CLOSE_SESSION_TIMEOUT: u16 = 4009;

pub fn router() -> Router<AppState> {
    Router::new().route("/gateway", get(ws_upgrade))
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

async fn handle_connection(socket: WebSocket, state: AppState) {
    let (mut ws_tx, ws_rx) = socket.split();

    let connection_id = ConnectionId::generate();
    let outbox = state.connections.register(connection_id.clone());
    state.hub.connect(connection_id.clone());
    // Subscribe before hello so no project event published after the
    // client learns its id is missed.
    let broadcast_rx = state.broadcast.subscribe();

    tracing::info!(connection_id = %connection_id, "gateway connection opened");

    let hello = GatewayMessage::hello(connection_id.as_str(), state.config.heartbeat_interval_ms);
    if ws_tx.send(Message::Text(hello.to_json().into())).await.is_ok() {
        let session = GatewaySession::new(connection_id.clone());
        run_session(&state, session, ws_tx, ws_rx, outbox, broadcast_rx).await;
    }

    let deliveries = state.hub.disconnect(&connection_id);
    state.connections.unregister(&connection_id);
    dispatch(state.connections.as_ref(), deliveries);

    tracing::info!(connection_id = %connection_id, "gateway connection closed");
}

/// Main event loop: read client frames, drain the outbox, forward project
/// broadcasts and enforce liveness.
async fn run_session(
    state: &AppState,
    mut session: GatewaySession,
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut ws_rx: SplitStream<WebSocket>,
    mut outbox: mpsc::Receiver<Message>,
    mut broadcast_rx: broadcast::Receiver<Arc<BroadcastPayload>>,
) {
    let mut heartbeat_timer = time::interval(Duration::from_millis(state.config.heartbeat_interval_ms));
    heartbeat_timer.tick().await; // First tick fires immediately; skip it.
    let mut got_activity = true;

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        got_activity = true;
                        let event = match ClientEvent::decode(text.as_str()) {
                            Ok(event) => event,
                            Err(e) => {
                                tracing::debug!(connection_id = %session.connection_id, error = %e, "dropped client frame");
                                continue;
                            }
                        };
                        if let Some(reply) = handle_event(state, &mut session, event) {
                            if ws_tx.send(Message::Text(reply.to_json().into())).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                        got_activity = true;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(?e, connection_id = %session.connection_id, "ws read error");
                        break;
                    }
                    _ => continue,
                }
            }

            // Messages other connections addressed to this one.
            queued = outbox.recv() => {
                let Some(msg) = queued else { break };
                if ws_tx.send(msg).await.is_err() {
                    break;
                }
            }

            result = broadcast_rx.recv() => {
                match result {
                    Ok(payload) => {
                        if !session.wants(&payload) {
                            continue;
                        }
                        let msg = payload.to_message();
                        if ws_tx.send(Message::Text(msg.to_json().into())).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(
                            connection_id = %session.connection_id,
                            skipped = n,
                            "gateway connection lagged behind project broadcast"
                        );
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }

            _ = heartbeat_timer.tick() => {
                if !got_activity {
                    tracing::debug!(
                        connection_id = %session.connection_id,
                        "heartbeat timeout, closing connection"
                    );
                    let _ = send_close(&mut ws_tx, CLOSE_SESSION_TIMEOUT, "Heartbeat timeout").await;
                    break;
                }
                got_activity = false;
                if ws_tx.send(Message::Ping(Bytes::new())).await.is_err() {
                    break;
                }
            }
        }
    }
}

/// Apply one decoded event. Heartbeats and project events are answered by the
/// session itself; everything else goes through the hub. Returns a frame to
/// send straight back to this client, if any.
fn handle_event(state: &AppState, session: &mut GatewaySession, event: ClientEvent) -> Option<GatewayMessage> {
    let connection_id = session.connection_id.clone();
    match event {
        ClientEvent::Heartbeat { seq } => Some(GatewayMessage::heartbeat_ack(seq)),
        ClientEvent::ProjectSubscribe { project_id } => {
            if session.subscribe(&project_id) {
                tracing::debug!(connection_id = %connection_id, project_id = %project_id, "subscribed to project");
            }
            None
        }
        ClientEvent::ProjectUnsubscribe { project_id } => {
            session.unsubscribe(&project_id);
            None
        }
        ClientEvent::ProjectMessage { project_id, message } => {
            if !session.is_subscribed(&project_id) {
                tracing::debug!(connection_id = %connection_id, project_id = %project_id, "project message from non-subscriber dropped");
                return None;
            }
            let data = serde_json::json!({
                "projectId": project_id,
                "from": connection_id,
                "message": message,
            });
            state.broadcast.publish(BroadcastPayload {
                project_id,
                event_name: EventName::PROJECT_MESSAGE.to_string(),
                data,
                origin: Some(connection_id),
            });
            None
        }
        event => {
            let deliveries = state.hub.handle(&connection_id, event);
            dispatch(state.connections.as_ref(), deliveries);
            None
        }
    }
}

/// Send a WebSocket close frame with a code and reason.
async fn send_close(ws_tx: &mut SplitSink<WebSocket, Message>, code: u16, reason: &str) -> Result<(), axum::Error> {
    let close_msg = Message::Close(Some(axum::extract::ws::CloseFrame {
        code,
        reason: reason.to_string().into(),
    }));
    ws_tx.send(close_msg).await
}
