//! Pushed event names.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Every notification type the relay pushes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    /// First frame on every socket; carries the connection id.
    #[serde(rename = "connection.established")]
    ConnectionEstablished,
    /// To the moderator: a player joined.
    #[serde(rename = "player-joined")]
    PlayerJoined,
    /// To a player: their role.
    #[serde(rename = "role-assigned")]
    RoleAssigned,
    /// To the moderator: the role was delivered.
    #[serde(rename = "role-assigned-confirm")]
    RoleAssignedConfirm,
    /// To a player: alive flag changed.
    #[serde(rename = "status-updated")]
    StatusUpdated,
    /// To everyone: new phase and day.
    #[serde(rename = "phase-changed")]
    PhaseChanged,
    /// To everyone: free-text announcement.
    #[serde(rename = "storyteller-message")]
    StorytellerMessage,
    /// To a player: they were removed.
    #[serde(rename = "removed-from-session")]
    RemovedFromSession,
    /// To everyone: the session is gone.
    #[serde(rename = "session-ended")]
    SessionEnded,
    /// To the moderator: a player's socket dropped.
    #[serde(rename = "player-disconnected")]
    PlayerDisconnected,
    /// To the moderator: a player came back.
    #[serde(rename = "player-reconnected")]
    PlayerReconnected,
}

impl EventType {
    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ConnectionEstablished => "connection.established",
            Self::PlayerJoined => "player-joined",
            Self::RoleAssigned => "role-assigned",
            Self::RoleAssignedConfirm => "role-assigned-confirm",
            Self::StatusUpdated => "status-updated",
            Self::PhaseChanged => "phase-changed",
            Self::StorytellerMessage => "storyteller-message",
            Self::RemovedFromSession => "removed-from-session",
            Self::SessionEnded => "session-ended",
            Self::PlayerDisconnected => "player-disconnected",
            Self::PlayerReconnected => "player-reconnected",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [EventType; 11] = [
        EventType::ConnectionEstablished,
        EventType::PlayerJoined,
        EventType::RoleAssigned,
        EventType::RoleAssignedConfirm,
        EventType::StatusUpdated,
        EventType::PhaseChanged,
        EventType::StorytellerMessage,
        EventType::RemovedFromSession,
        EventType::SessionEnded,
        EventType::PlayerDisconnected,
        EventType::PlayerReconnected,
    ];

    #[test]
    fn as_str_matches_serde_name() {
        for ev in ALL {
            let json = serde_json::to_value(ev).unwrap();
            assert_eq!(json, ev.as_str(), "{ev:?}");
        }
    }
}
