//! Lifecycle of a single socket, from upgrade through disconnect.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use grimoire_core::ConnectionId;
use grimoire_rpc::{EventType, Outgoing, RpcEvent};
use serde_json::json;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::connection::ClientConnection;
use super::hub::ConnectionHub;
use crate::config::ServerConfig;
use crate::relay::RelayInput;

/// Per-socket knobs taken from [`ServerConfig`].
#[derive(Clone, Copy, Debug)]
pub struct SessionOptions {
    /// Outbound queue length.
    pub send_queue_capacity: usize,
    /// Interval between Ping frames.
    pub heartbeat_interval: Duration,
    /// Disconnect after this long without a Pong.
    pub heartbeat_timeout: Duration,
}

impl From<&ServerConfig> for SessionOptions {
    fn from(config: &ServerConfig) -> Self {
        Self {
            send_queue_capacity: config.send_queue_capacity,
            heartbeat_interval: config.heartbeat_interval,
            heartbeat_timeout: config.heartbeat_timeout,
        }
    }
}

/// Extract frame text. Binary frames are accepted when they hold UTF-8.
fn frame_text(msg: &Message) -> Option<String> {
    match msg {
        Message::Text(t) => Some(t.to_string()),
        Message::Binary(data) => match std::str::from_utf8(data) {
            Ok(s) => Some(s.to_owned()),
            Err(_) => {
                info!(len = data.len(), "received non-UTF8 binary frame");
                None
            }
        },
        Message::Ping(_) | Message::Pong(_) | Message::Close(_) => None,
    }
}

/// Run one client socket.
///
/// Sends `connection.established` first, then forwards inbound text to the
/// relay and drains the connection's outbound queue until either side closes
/// or `cancel` fires. The relay is told about the disconnect on the way out.
#[instrument(skip_all, fields(connection = %connection_id))]
pub async fn run_ws_session(
    ws: WebSocket,
    connection_id: ConnectionId,
    hub: Arc<ConnectionHub>,
    relay: mpsc::Sender<RelayInput>,
    options: SessionOptions,
    cancel: CancellationToken,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();

    let established = RpcEvent::new(
        EventType::ConnectionEstablished,
        None,
        Some(json!({ "connectionId": connection_id.as_str() })),
    );
    match Outgoing::from(established).to_json() {
        Ok(json) => {
            if ws_tx.send(Message::Text(json.into())).await.is_err() {
                info!("client left before the handshake event was sent");
                return;
            }
        }
        Err(e) => warn!(error = %e, "failed to serialize connection.established"),
    }

    let (send_tx, mut send_rx) = mpsc::channel::<Arc<str>>(options.send_queue_capacity);
    let connection = Arc::new(ClientConnection::new(connection_id.clone(), send_tx));
    hub.add(Arc::clone(&connection));
    info!("client connected");

    let outbound_conn = Arc::clone(&connection);
    let mut outbound = tokio::spawn(async move {
        let mut ping_interval = tokio::time::interval(options.heartbeat_interval);
        let _ = ping_interval.tick().await;

        loop {
            tokio::select! {
                msg = send_rx.recv() => {
                    let Some(text) = msg else { break };
                    if ws_tx.send(Message::Text(text.to_string().into())).await.is_err() {
                        break;
                    }
                }
                _ = ping_interval.tick() => {
                    if !outbound_conn.check_alive()
                        && outbound_conn.last_pong_elapsed() > options.heartbeat_timeout
                    {
                        warn!(timeout = ?options.heartbeat_timeout, "client unresponsive, disconnecting");
                        break;
                    }
                    if ws_tx.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
        let _ = ws_tx.close().await;
    });

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                debug!("server shutting down, closing socket");
                break;
            }
            _ = &mut outbound => {
                debug!("writer finished");
                break;
            }
            frame = ws_rx.next() => {
                let Some(Ok(msg)) = frame else { break };
                match msg {
                    Message::Close(_) => {
                        info!("client sent close frame");
                        break;
                    }
                    Message::Ping(_) | Message::Pong(_) => connection.mark_alive(),
                    other => {
                        let Some(text) = frame_text(&other) else { continue };
                        let input = RelayInput::Frame {
                            connection: connection_id.clone(),
                            text,
                        };
                        if relay.send(input).await.is_err() {
                            warn!("relay is gone, closing socket");
                            break;
                        }
                    }
                }
            }
        }
    }

    outbound.abort();
    let _ = hub.remove(&connection_id);
    let _ = relay
        .send(RelayInput::Disconnected {
            connection: connection_id.clone(),
        })
        .await;
    info!(
        dropped = connection.drop_count(),
        duration_secs = connection.connected_at.elapsed().as_secs(),
        "client disconnected"
    );
}
