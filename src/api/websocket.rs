//! WebSocket handler for the camera stream
//!
//! Each connection is a stream subscriber. JPEG frames go out as binary
//! messages; anything the client sends is read only to notice when it leaves.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};

use super::context::AppState;

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle an individual WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let subscription = state.stream.subscribe().await;
    let id = subscription.id;
    let mut frames = subscription.frames;

    tracing::info!(subscriber = %id, "WebSocket client connected");

    let (mut sender, mut receiver) = socket.split();

    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = frames.recv().await {
            if sender.send(Message::Binary(frame.to_vec())).await.is_err() {
                break; // Client disconnected
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!("WebSocket receive error: {}", e);
                    break;
                }
            }
        }
    });

    // Wait for either side to finish (client disconnect)
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    state.stream.unsubscribe(id).await;
    tracing::info!(subscriber = %id, "WebSocket client disconnected");
}
