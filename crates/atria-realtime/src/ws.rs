//! Subscriber-facing WebSocket endpoint.

use crate::hub::TelemetryHub;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Commands a realtime client may send over the socket.
#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
enum ClientCommand {
    /// Join a tenant group; additive, no explicit leave exists.
    JoinTenant { tenant: String },
}

pub fn realtime_router(hub: Arc<TelemetryHub>) -> Router {
    Router::new()
        .route("/hub/telemetry", get(telemetry_ws))
        .with_state(hub)
}

async fn telemetry_ws(
    ws: WebSocketUpgrade,
    State(hub): State<Arc<TelemetryHub>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, hub))
}

async fn handle_socket(socket: WebSocket, hub: Arc<TelemetryHub>) {
    let connection_id = hub.next_connection_id();
    let (frames_tx, mut frames_rx) = mpsc::channel::<String>(hub.channel_capacity());
    let (mut sink, mut stream) = socket.split();

    debug!(connection_id, "realtime subscriber connected");

    // Outbound frames are forwarded on a separate task so a slow socket
    // never holds the hub's broadcast path.
    let send_task = tokio::spawn(async move {
        while let Some(frame) = frames_rx.recv().await {
            if sink.send(Message::Text(frame)).await.is_err() {
                break;
            }
        }
    });

    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientCommand>(&text) {
                Ok(ClientCommand::JoinTenant { tenant }) => {
                    hub.join_tenant(connection_id, &tenant, frames_tx.clone())
                        .await;
                }
                Err(e) => {
                    warn!(connection_id, error = %e, "ignoring unrecognized client frame");
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(connection_id, error = %e, "realtime socket error");
                break;
            }
        }
    }

    hub.remove_connection(connection_id).await;
    send_task.abort();
    debug!(connection_id, "realtime subscriber disconnected");
}
