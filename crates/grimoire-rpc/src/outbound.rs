//! The port through which replies and pushed events leave the handler.

use std::sync::Arc;

use grimoire_core::ConnectionId;
use serde::Serialize;

use crate::types::{RpcEvent, RpcResponse};

/// A message addressed to one connection.
#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum Outgoing {
    /// Reply to a request.
    Response(RpcResponse),
    /// Pushed notification.
    Event(RpcEvent),
}

impl Outgoing {
    /// Serialize to the JSON text frame sent on the socket.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl From<RpcResponse> for Outgoing {
    fn from(r: RpcResponse) -> Self {
        Self::Response(r)
    }
}

impl From<RpcEvent> for Outgoing {
    fn from(e: RpcEvent) -> Self {
        Self::Event(e)
    }
}

/// Fire-and-forget delivery to a connection.
///
/// Implementations must not block. Returns `false` when the message could not
/// be queued (unknown connection, full or closed queue).
pub trait Outbound {
    /// Queue `message` for `to`.
    fn send(&self, to: &ConnectionId, message: Outgoing) -> bool;
}

impl<T: Outbound + ?Sized> Outbound for Arc<T> {
    fn send(&self, to: &ConnectionId, message: Outgoing) -> bool {
        (**self).send(to, message)
    }
}

impl<T: Outbound + ?Sized> Outbound for &T {
    fn send(&self, to: &ConnectionId, message: Outgoing) -> bool {
        (**self).send(to, message)
    }
}


#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::recording::RecordingOutbound;
    use super::*;
    use crate::events::EventType;

    #[test]
    fn outgoing_serializes_without_wrapper() {
        let resp: Outgoing = RpcResponse::success("r1", json!({})).into();
        let v: serde_json::Value = serde_json::from_str(&resp.to_json().unwrap()).unwrap();
        assert_eq!(v["id"], "r1");

        let ev: Outgoing = RpcEvent::new(EventType::SessionEnded, None, None).into();
        let v: serde_json::Value = serde_json::from_str(&ev.to_json().unwrap()).unwrap();
        assert_eq!(v["type"], "session-ended");
    }

    #[test]
    fn arc_forwards_to_inner() {
        let rec = Arc::new(RecordingOutbound::default());
        let port: Arc<RecordingOutbound> = Arc::clone(&rec);
        let to = ConnectionId::from_raw("conn_a");
        assert!(port.send(&to, RpcEvent::new(EventType::SessionEnded, None, None).into()));
        assert_eq!(rec.take_for(&to).len(), 1);
        assert!(rec.is_empty());
    }
}
