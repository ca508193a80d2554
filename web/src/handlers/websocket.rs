//! WebSocket fan-out of a [`Broadcaster`].
//!
//! Every connected client receives every published message serialized as a
//! JSON text frame. The channel is one-way: client frames other than
//! `Close` are ignored.
//!
//! ```text
//! Publisher        Broadcaster          handle_socket         Client
//!    │                  │                     │                  │
//!    │                  │<──── subscribe() ───┤<──── upgrade ────┤
//!    ├── publish() ────>│                     │                  │
//!    │                  ├──── message ───────>│                  │
//!    │                  │                     ├──── text ───────>│
//! ```

use crate::broadcast::Broadcaster;
use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
};
use futures::{SinkExt, stream::StreamExt};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

/// Upgrade the connection and stream the hub's messages to it.
///
/// # Example
///
/// ```ignore
/// let app = Router::new()
///     .route("/ws", get(websocket::stream::<SpaceUpdate>))
///     .with_state(state); // state: FromRef -> Broadcaster<SpaceUpdate>
/// ```
#[allow(clippy::unused_async)] // Axum handler signature requires async
pub async fn stream<T>(ws: WebSocketUpgrade, State(hub): State<Broadcaster<T>>) -> Response
where
    T: Serialize + Clone + Send + Sync + 'static,
{
    debug!("WebSocket connection requested");
    ws.on_upgrade(move |socket| handle_socket(socket, hub))
}

async fn handle_socket<T>(socket: WebSocket, hub: Broadcaster<T>)
where
    T: Serialize + Clone + Send + Sync + 'static,
{
    info!(subscribers = hub.subscriber_count() + 1, "WebSocket connection established");

    let (mut sender, mut receiver) = socket.split();
    let mut rx = hub.subscribe();

    let mut send_task = tokio::spawn(async move {
        loop {
            let message = match rx.recv().await {
                Ok(message) => message,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "WebSocket subscriber lagged, skipping messages");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            let text = match serde_json::to_string(&message) {
                Ok(json) => json,
                Err(e) => {
                    error!(error = %e, "Failed to serialize broadcast message");
                    continue;
                }
            };

            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }

        debug!("WebSocket send task terminated");
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Close(_) = msg {
                debug!("Client requested close");
                break;
            }
        }

        debug!("WebSocket receive task terminated");
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    }

    info!("WebSocket connection closed");
}
