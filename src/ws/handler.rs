//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::hub::{outbound_channel, ConnectionId, HubHandle, OutboundReceiver};
use crate::ws::protocol::ClientMsg;

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state.hub))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, hub: HubHandle) {
    let connection_id = Uuid::new_v4();
    let (outbound_tx, outbound_rx) = outbound_channel();

    let player = match hub.connect(connection_id, outbound_tx).await {
        Ok(player) => player,
        Err(e) => {
            error!(connection_id = %connection_id, error = %e, "Failed to register connection");
            return;
        }
    };

    info!(connection_id = %connection_id, name = %player.name, "New WebSocket connection");

    let (ws_sink, ws_stream) = socket.split();
    run_session(connection_id, &hub, ws_sink, ws_stream, outbound_rx).await;

    // Cleanup on disconnect
    if let Err(e) = hub.disconnect(connection_id).await {
        warn!(connection_id = %connection_id, error = %e, "Failed to deliver disconnect");
    }

    info!(connection_id = %connection_id, "WebSocket connection closed");
}

/// Run the WebSocket session with read/write split
async fn run_session(
    connection_id: ConnectionId,
    hub: &HubHandle,
    mut ws_sink: SplitSink<WebSocket, Message>,
    ws_stream: SplitStream<WebSocket>,
    mut outbound_rx: OutboundReceiver,
) {
    // Spawn writer task: outbound queue -> WebSocket
    let mut writer_handle = tokio::spawn(async move {
        while let Some(payload) = outbound_rx.recv().await {
            if let Err(e) = ws_sink.send(Message::Text(payload)).await {
                debug!(connection_id = %connection_id, error = %e, "WebSocket send failed");
                break;
            }
        }
    });

    // A dead writer means the socket is gone even if the reader has not noticed
    tokio::select! {
        _ = read_loop(connection_id, hub, ws_stream) => {}
        _ = &mut writer_handle => {
            debug!(connection_id = %connection_id, "Writer finished before reader");
        }
    }

    writer_handle.abort();
}

/// Reader loop: WebSocket -> hub
async fn read_loop(
    connection_id: ConnectionId,
    hub: &HubHandle,
    mut ws_stream: SplitStream<WebSocket>,
) {
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                let client_msg = match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(msg) => msg,
                    Err(e) => {
                        warn!(connection_id = %connection_id, error = %e, "Failed to parse client message");
                        continue;
                    }
                };

                if hub.client_message(connection_id, client_msg).await.is_err() {
                    debug!(connection_id = %connection_id, "Hub closed");
                    break;
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(connection_id = %connection_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) => {
                debug!(connection_id = %connection_id, "Received ping");
            }
            Ok(Message::Pong(_)) => {
                debug!(connection_id = %connection_id, "Received pong");
            }
            Ok(Message::Close(_)) => {
                info!(connection_id = %connection_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(connection_id = %connection_id, error = %e, "WebSocket error");
                break;
            }
        }
    }
}
