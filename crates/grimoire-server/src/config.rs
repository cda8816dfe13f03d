//! Server configuration.

use std::time::Duration;

use grimoire_settings::RelaySettings;

/// Runtime configuration for [`RelayServer`](crate::RelayServer).
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host to bind.
    pub host: String,
    /// Port to bind (`0` picks a free port).
    pub port: u16,
    /// Max WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Per-connection outbound queue length.
    pub send_queue_capacity: usize,
    /// Relay inbound queue length.
    pub inbound_queue_capacity: usize,
    /// Interval between server Ping frames.
    pub heartbeat_interval: Duration,
    /// Disconnect a client that has not ponged for this long.
    pub heartbeat_timeout: Duration,
    /// Sessions older than this are ended by the sweeper.
    pub session_max_age: Duration,
    /// How often the sweeper runs.
    pub sweep_interval: Duration,
    /// Let `reconnect` take over a player whose socket is still open.
    pub allow_reconnect_while_connected: bool,
}

impl From<&RelaySettings> for ServerConfig {
    fn from(s: &RelaySettings) -> Self {
        Self {
            host: s.server.host.clone(),
            port: s.server.port,
            max_message_size: s.server.max_message_size,
            send_queue_capacity: s.server.send_queue_capacity,
            inbound_queue_capacity: s.server.inbound_queue_capacity,
            heartbeat_interval: Duration::from_secs(s.server.heartbeat_interval_secs),
            heartbeat_timeout: Duration::from_secs(s.server.heartbeat_timeout_secs),
            session_max_age: s.sessions.max_age(),
            sweep_interval: s.sessions.sweep_interval(),
            allow_reconnect_while_connected: s.sessions.allow_reconnect_while_connected,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from(&RelaySettings::default())
    }
}
