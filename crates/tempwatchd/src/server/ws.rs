//! WebSocket push subscriptions.
//!
//! On upgrade the connection registers with the hub, which has already
//! queued the current snapshot. A sender task forwards hub frames to the
//! socket; inbound frames are read only to notice a close.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::AppState;
use crate::hub::{HubHandle, Subscription};

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state.hub, state.cancel))
}

async fn handle_socket(socket: WebSocket, hub: HubHandle, cancel: CancellationToken) {
    let Subscription { id, mut receiver } = match hub.register().await {
        Ok(subscription) => subscription,
        Err(e) => {
            warn!(error = %e, "Cannot register push client");
            return;
        }
    };
    info!(client = %id, "Push client connected");

    let (mut sink, mut stream) = socket.split();

    let mut send_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                frame = receiver.recv() => {
                    let Some(frame) = frame else { break };
                    if sink.send(Message::Text(frame.to_string().into())).await.is_err() {
                        break;
                    }
                }
                _ = cancel.cancelled() => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = stream.next().await {
            match result {
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    debug!(error = %e, "WebSocket receive error");
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    hub.unregister(id);
    info!(client = %id, "Push client disconnected");
}
