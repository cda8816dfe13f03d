//! Routes outgoing messages to connected sockets.

use std::collections::HashMap;
use std::sync::Arc;

use grimoire_core::ConnectionId;
use grimoire_rpc::{Outbound, Outgoing};
use parking_lot::RwLock;
use tracing::{debug, warn};

use super::connection::ClientConnection;

/// Every open socket, by connection id.
///
/// Sends never wait: each connection has its own bounded queue drained by its
/// writer task, which keeps per-connection order.
pub struct ConnectionHub {
    connections: RwLock<HashMap<ConnectionId, Arc<ClientConnection>>>,
}

impl ConnectionHub {
    /// Empty hub.
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Register a connection.
    pub fn add(&self, connection: Arc<ClientConnection>) {
        let _ = self
            .connections
            .write()
            .insert(connection.id.clone(), connection);
    }

    /// Unregister a connection.
    pub fn remove(&self, id: &ConnectionId) -> Option<Arc<ClientConnection>> {
        self.connections.write().remove(id)
    }

    /// Look up a connection.
    pub fn get(&self, id: &ConnectionId) -> Option<Arc<ClientConnection>> {
        self.connections.read().get(id).cloned()
    }

    /// Number of open connections.
    pub fn connection_count(&self) -> usize {
        self.connections.read().len()
    }

    /// Queue raw text for `to`.
    pub fn send_text(&self, to: &ConnectionId, text: Arc<str>) -> bool {
        let Some(conn) = self.get(to) else {
            debug!(connection = %to, "send to unknown connection");
            return false;
        };
        if conn.send(text) {
            true
        } else {
            warn!(connection = %to, dropped = conn.drop_count(), "outbound queue full or closed, message dropped");
            false
        }
    }
}

impl Default for ConnectionHub {
    fn default() -> Self {
        Self::new()
    }
}

impl Outbound for ConnectionHub {
    fn send(&self, to: &ConnectionId, message: Outgoing) -> bool {
        match message.to_json() {
            Ok(json) => self.send_text(to, Arc::from(json)),
            Err(e) => {
                warn!(connection = %to, error = %e, "failed to serialize outgoing message");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use grimoire_rpc::{EventType, RpcEvent, RpcResponse};
    use serde_json::{Value, json};
    use tokio::sync::mpsc;

    use super::*;

    fn connect(hub: &ConnectionHub, id: &str, capacity: usize) -> mpsc::Receiver<Arc<str>> {
        let (tx, rx) = mpsc::channel(capacity);
        hub.add(Arc::new(ClientConnection::new(ConnectionId::from_raw(id), tx)));
        rx
    }

    #[tokio::test]
    async fn outbound_serializes_and_routes() {
        let hub = ConnectionHub::new();
        let mut a = connect(&hub, "a", 4);
        let mut b = connect(&hub, "b", 4);

        assert!(Outbound::send(
            &hub,
            &ConnectionId::from_raw("a"),
            RpcResponse::success("r1", json!({"code": "7K9M"})).into(),
        ));
        let frame: Value = serde_json::from_str(&a.recv().await.unwrap()).unwrap();
        assert_eq!(frame["result"]["code"], "7K9M");
        assert!(b.try_recv().is_err());
    }

    #[test]
    fn unknown_connection_is_a_failed_send() {
        let hub = ConnectionHub::new();
        let ev = RpcEvent::new(EventType::SessionEnded, None, None);
        assert!(!Outbound::send(&hub, &ConnectionId::from_raw("ghost"), ev.into()));
    }

    #[test]
    fn full_queue_does_not_block() {
        let hub = ConnectionHub::new();
        let _rx = connect(&hub, "slow", 1);
        let id = ConnectionId::from_raw("slow");
        assert!(hub.send_text(&id, Arc::from("1")));
        assert!(!hub.send_text(&id, Arc::from("2")));
        assert_eq!(hub.get(&id).unwrap().drop_count(), 1);
    }

    #[test]
    fn add_remove_count() {
        let hub = ConnectionHub::new();
        let _a = connect(&hub, "a", 1);
        let _b = connect(&hub, "b", 1);
        assert_eq!(hub.connection_count(), 2);
        assert!(hub.remove(&ConnectionId::from_raw("a")).is_some());
        assert!(hub.remove(&ConnectionId::from_raw("a")).is_none());
        assert_eq!(hub.connection_count(), 1);
    }
}
