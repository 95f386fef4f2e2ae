//! `GET /api/v1/stream`: subscribes the caller to the Broadcast hub
//! (C7) and relays every `threat_detected` message as a text frame.

use crate::state::AppState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use std::sync::Arc;

pub async fn stream(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>) {
    let (subscriber_id, mut rx) = state.sentinel.broadcast_hub().subscribe();

    loop {
        tokio::select! {
            broadcast = rx.recv() => {
                match broadcast {
                    Some(payload) => {
                        if socket.send(Message::Text(payload.to_string())).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(_))) => {
                        let ping = serde_json::json!({"type": "ping", "message": "connected"});
                        if socket.send(Message::Text(ping.to_string())).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
        }
    }

    state.sentinel.broadcast_hub().unsubscribe(subscriber_id);
}
