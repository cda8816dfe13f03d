//! Settings types with compiled defaults.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings object.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelaySettings {
    /// Listener and transport settings.
    pub server: ServerSettings,
    /// Session lifecycle settings.
    pub sessions: SessionSettings,
    /// Log output settings.
    pub logging: LoggingSettings,
}

impl RelaySettings {
    /// Reject values that would stall the relay.
    pub fn validate(&self) -> Result<()> {
        if self.sessions.max_age_secs == 0 {
            return Err(SettingsError::InvalidValue(
                "sessions.maxAgeSecs must be positive".into(),
            ));
        }
        if self.sessions.sweep_interval_secs == 0 {
            return Err(SettingsError::InvalidValue(
                "sessions.sweepIntervalSecs must be positive".into(),
            ));
        }
        if self.server.heartbeat_interval_secs == 0 {
            return Err(SettingsError::InvalidValue(
                "server.heartbeatIntervalSecs must be positive".into(),
            ));
        }
        if self.server.heartbeat_timeout_secs < self.server.heartbeat_interval_secs {
            return Err(SettingsError::InvalidValue(
                "server.heartbeatTimeoutSecs must be at least server.heartbeatIntervalSecs".into(),
            ));
        }
        if self.server.send_queue_capacity == 0 || self.server.inbound_queue_capacity == 0 {
            return Err(SettingsError::InvalidValue(
                "queue capacities must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Listener and WebSocket transport settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Listen port.
    pub port: u16,
    /// Largest accepted WebSocket frame, in bytes.
    pub max_message_size: usize,
    /// Outbound messages buffered per connection before drops.
    pub send_queue_capacity: usize,
    /// Inbound events buffered ahead of the relay loop.
    pub inbound_queue_capacity: usize,
    /// Seconds between server Ping frames.
    pub heartbeat_interval_secs: u64,
    /// Seconds without a Pong before the connection is dropped.
    pub heartbeat_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            max_message_size: 64 * 1024,
            send_queue_capacity: 256,
            inbound_queue_capacity: 1024,
            heartbeat_interval_secs: 25,
            heartbeat_timeout_secs: 60,
        }
    }
}

/// Session lifecycle settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionSettings {
    /// Sessions older than this are ended by the sweeper.
    pub max_age_secs: u64,
    /// How often the sweeper runs.
    pub sweep_interval_secs: u64,
    /// Whether `reconnect` may take over a player whose old connection is
    /// still live. When false, only players flagged disconnected can be
    /// reclaimed.
    pub allow_reconnect_while_connected: bool,
}

impl SessionSettings {
    /// Maximum session age.
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }

    /// Sweeper period.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            max_age_secs: 12 * 60 * 60,
            sweep_interval_secs: 60 * 60,
            allow_reconnect_while_connected: true,
        }
    }
}

/// Log output settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default level when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let s = RelaySettings::default();
        assert_eq!(s.server.host, "0.0.0.0");
        assert_eq!(s.server.port, 3000);
        assert_eq!(s.server.send_queue_capacity, 256);
        assert_eq!(s.sessions.max_age(), Duration::from_secs(43_200));
        assert_eq!(s.sessions.sweep_interval(), Duration::from_secs(3_600));
        assert!(s.sessions.allow_reconnect_while_connected);
        assert_eq!(s.logging.level, "info");
        assert!(!s.logging.json);
    }

    #[test]
    fn defaults_validate() {
        assert!(RelaySettings::default().validate().is_ok());
    }

    #[test]
    fn zero_sweep_interval_rejected() {
        let mut s = RelaySettings::default();
        s.sessions.sweep_interval_secs = 0;
        let err = s.validate().unwrap_err();
        assert!(err.to_string().contains("sweepIntervalSecs"));
    }

    #[test]
    fn zero_max_age_rejected() {
        let mut s = RelaySettings::default();
        s.sessions.max_age_secs = 0;
        let err = s.validate().unwrap_err();
        assert!(err.to_string().contains("maxAgeSecs"));
    }

    #[test]
    fn heartbeat_timeout_shorter_than_interval_rejected() {
        let mut s = RelaySettings::default();
        s.server.heartbeat_interval_secs = 30;
        s.server.heartbeat_timeout_secs = 10;
        let err = s.validate().unwrap_err();
        assert!(err.to_string().contains("heartbeatTimeoutSecs"));

        s.server.heartbeat_timeout_secs = 30;
        assert!(s.validate().is_ok());
    }

    #[test]
    fn zero_queue_rejected() {
        let mut s = RelaySettings::default();
        s.server.send_queue_capacity = 0;
        assert!(s.validate().is_err());
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_value(RelaySettings::default()).unwrap();
        assert_eq!(json["server"]["maxMessageSize"], 65_536);
        assert_eq!(json["sessions"]["maxAgeSecs"], 43_200);
        assert_eq!(json["sessions"]["allowReconnectWhileConnected"], true);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let s: RelaySettings = serde_json::from_str(r#"{"server":{"port":8080}}"#).unwrap();
        assert_eq!(s.server.port, 8080);
        assert_eq!(s.server.host, "0.0.0.0");
        assert_eq!(s.sessions.max_age_secs, 43_200);
    }
}
