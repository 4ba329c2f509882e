//! WebSocket status feed
//!
//! Every snapshot the controller publishes is pushed to the client as a
//! `status` frame. Text frames from the client are parsed as
//! `ControlMessage`s and answered with a `reply` frame.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use std::sync::Arc;

use crate::protocol::{ControlMessage, ControlReply, StatusSnapshot};
use crate::ui::server::AppState;

/// Frames sent to the client
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ServerMessage {
    Status { status: StatusSnapshot },
    Reply { reply: ControlReply },
    Error { message: String },
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut snapshots = state.controller.subscribe();
    tracing::debug!("Control UI client connected");

    let first = snapshots.borrow_and_update().clone();
    if send(&mut sender, &ServerMessage::Status { status: first }).await.is_err() {
        return;
    }

    loop {
        let outgoing = tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let status = snapshots.borrow_and_update().clone();
                ServerMessage::Status { status }
            }
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => handle_text(&state, &text),
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    tracing::debug!("WebSocket receive error: {}", e);
                    break;
                }
            },
        };

        if send(&mut sender, &outgoing).await.is_err() {
            break;
        }
    }

    tracing::debug!("Control UI client disconnected");
}

fn handle_text(state: &AppState, text: &str) -> ServerMessage {
    match serde_json::from_str::<ControlMessage>(text) {
        Ok(message) => {
            tracing::debug!(?message, "Control message");
            ServerMessage::Reply {
                reply: state.controller.apply(message),
            }
        }
        Err(e) => ServerMessage::Error {
            message: format!("Invalid control message: {}", e),
        },
    }
}

async fn send<S>(sender: &mut S, message: &ServerMessage) -> Result<(), ()>
where
    S: SinkExt<Message> + Unpin,
{
    let json = match serde_json::to_string(message) {
        Ok(json) => json,
        Err(e) => {
            tracing::warn!("Failed to encode frame: {}", e);
            return Ok(());
        }
    };
    sender.send(Message::Text(json)).await.map_err(|_| ())
}
