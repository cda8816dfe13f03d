//! Typed commands parsed from `method` + `params`.
//!
//! Each method accepts its older `*-game` spelling as well, and a few legacy
//! methods take a bare string instead of an object.

use std::num::NonZeroU32;

use grimoire_core::{ConnectionId, Phase};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::errors::RpcError;

/// One parsed client request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Start a session and become its moderator.
    CreateSession,
    /// Take over moderation of an existing session.
    RejoinSession {
        /// Session code as typed.
        code: String,
    },
    /// Join as a player.
    JoinSession {
        /// Session code as typed.
        code: String,
        /// Requested display name.
        name: String,
    },
    /// Give a player a role.
    AssignRole {
        /// Target player.
        player_id: ConnectionId,
        /// Role name; unknown names fall back to the catalog's generic entry.
        role: String,
    },
    /// Mark a player alive or dead.
    UpdatePlayerStatus {
        /// Target player.
        player_id: ConnectionId,
        /// New alive flag.
        alive: bool,
    },
    /// Move the game clock.
    UpdatePhase {
        /// Day or night.
        phase: Phase,
        /// Day counter, from 1.
        day_number: NonZeroU32,
    },
    /// Announce a message to every member.
    BroadcastMessage {
        /// Free text.
        message: String,
    },
    /// Drop a player from the session.
    RemovePlayer {
        /// Target player.
        player_id: ConnectionId,
    },
    /// End the session for everyone.
    EndSession,
    /// Reclaim a player record by name after a dropped connection.
    Reconnect {
        /// Session code as typed.
        code: String,
        /// Player name, matched case-insensitively.
        name: String,
    },
}

impl Command {
    /// Parse a method name and its params.
    pub fn parse(method: &str, params: Option<Value>) -> Result<Self, RpcError> {
        let command = match method {
            "create-session" | "create-game" => Self::CreateSession,
            "rejoin-session" | "rejoin-game" => {
                let (CodeArg::Bare(code) | CodeArg::Object { code }) = decode(method, params)?;
                Self::RejoinSession { code }
            }
            "join-session" | "join-game" => {
                let p: CodeNameParams = decode(method, params)?;
                Self::JoinSession {
                    code: p.code,
                    name: p.name,
                }
            }
            "assign-role" => {
                let p: AssignRoleParams = decode(method, params)?;
                Self::AssignRole {
                    player_id: ConnectionId::from_raw(p.player_id),
                    role: p.role,
                }
            }
            "update-player-status" => {
                let p: StatusParams = decode(method, params)?;
                Self::UpdatePlayerStatus {
                    player_id: ConnectionId::from_raw(p.player_id),
                    alive: p.alive,
                }
            }
            "update-phase" => {
                let p: PhaseParams = decode(method, params)?;
                let day_number = u32::try_from(p.day_num)
                    .ok()
                    .and_then(NonZeroU32::new)
                    .ok_or_else(|| RpcError::InvalidParams {
                        message: format!("{method}: dayNum must be a positive integer"),
                    })?;
                Self::UpdatePhase {
                    phase: p.phase,
                    day_number,
                }
            }
            "broadcast-message" => {
                let (MessageArg::Bare(message) | MessageArg::Object { message }) =
                    decode(method, params)?;
                Self::BroadcastMessage { message }
            }
            "remove-player" => {
                let (PlayerArg::Bare(id) | PlayerArg::Object { player_id: id }) =
                    decode(method, params)?;
                Self::RemovePlayer {
                    player_id: ConnectionId::from_raw(id),
                }
            }
            "end-session" | "end-game" => Self::EndSession,
            "reconnect" | "player-reconnect" => {
                let p: CodeNameParams = decode(method, params)?;
                Self::Reconnect {
                    code: p.code,
                    name: p.name,
                }
            }
            other => {
                return Err(RpcError::MethodNotFound {
                    method: other.to_owned(),
                });
            }
        };
        Ok(command)
    }

    /// Canonical method name.
    pub fn method(&self) -> &'static str {
        match self {
            Self::CreateSession => "create-session",
            Self::RejoinSession { .. } => "rejoin-session",
            Self::JoinSession { .. } => "join-session",
            Self::AssignRole { .. } => "assign-role",
            Self::UpdatePlayerStatus { .. } => "update-player-status",
            Self::UpdatePhase { .. } => "update-phase",
            Self::BroadcastMessage { .. } => "broadcast-message",
            Self::RemovePlayer { .. } => "remove-player",
            Self::EndSession => "end-session",
            Self::Reconnect { .. } => "reconnect",
        }
    }

    /// Whether only the session's moderator may issue this.
    pub fn is_moderator_only(&self) -> bool {
        Self::is_moderator_method(self.method())
    }

    /// Whether `method` (canonical or alias) names a moderator-only command.
    pub fn is_moderator_method(method: &str) -> bool {
        matches!(
            method,
            "assign-role"
                | "update-player-status"
                | "update-phase"
                | "broadcast-message"
                | "remove-player"
                | "end-session"
                | "end-game"
        )
    }
}

fn decode<T: DeserializeOwned>(method: &str, params: Option<Value>) -> Result<T, RpcError> {
    serde_json::from_value(params.unwrap_or(Value::Null)).map_err(|e| RpcError::InvalidParams {
        message: format!("{method}: {e}"),
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CodeArg {
    Bare(String),
    Object { code: String },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MessageArg {
    Bare(String),
    Object { message: String },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PlayerArg {
    Bare(String),
    Object {
        #[serde(rename = "playerId")]
        player_id: String,
    },
}

#[derive(Deserialize)]
struct CodeNameParams {
    code: String,
    name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssignRoleParams {
    player_id: String,
    role: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusParams {
    player_id: String,
    alive: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PhaseParams {
    phase: Phase,
    #[serde(alias = "dayNumber")]
    day_num: u64,
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    fn parse(method: &str, params: Value) -> Result<Command, RpcError> {
        Command::parse(method, Some(params))
    }

    #[test]
    fn aliases_resolve_to_same_command() {
        assert_eq!(
            Command::parse("create-game", None).unwrap(),
            Command::CreateSession
        );
        assert_eq!(
            Command::parse("end-game", None).unwrap(),
            Command::EndSession
        );
        assert_eq!(
            parse("join-game", json!({"code": "7k9m", "name": "Bob"})).unwrap(),
            parse("join-session", json!({"code": "7k9m", "name": "Bob"})).unwrap()
        );
        assert_eq!(
            parse("player-reconnect", json!({"code": "7K9M", "name": "bob"}))
                .unwrap()
                .method(),
            "reconnect"
        );
    }

    #[test]
    fn rejoin_accepts_bare_code_or_object() {
        let expected = Command::RejoinSession {
            code: "7K9M".into(),
        };
        assert_eq!(parse("rejoin-game", json!("7K9M")).unwrap(), expected);
        assert_eq!(
            parse("rejoin-session", json!({"code": "7K9M"})).unwrap(),
            expected
        );
    }

    #[test]
    fn broadcast_and_remove_accept_bare_strings() {
        assert_eq!(
            parse("broadcast-message", json!("Night falls")).unwrap(),
            Command::BroadcastMessage {
                message: "Night falls".into()
            }
        );
        assert_eq!(
            parse("remove-player", json!("conn_1")).unwrap(),
            Command::RemovePlayer {
                player_id: ConnectionId::from_raw("conn_1")
            }
        );
        assert_eq!(
            parse("remove-player", json!({"playerId": "conn_1"})).unwrap(),
            Command::RemovePlayer {
                player_id: ConnectionId::from_raw("conn_1")
            }
        );
    }

    #[test]
    fn assign_role_params() {
        assert_eq!(
            parse("assign-role", json!({"playerId": "conn_1", "role": "Imp"})).unwrap(),
            Command::AssignRole {
                player_id: ConnectionId::from_raw("conn_1"),
                role: "Imp".into()
            }
        );
    }

    #[test]
    fn update_phase_accepts_day_num_or_day_number() {
        let two = NonZeroU32::new(2).unwrap();
        assert_eq!(
            parse("update-phase", json!({"phase": "night", "dayNum": 2})).unwrap(),
            Command::UpdatePhase {
                phase: Phase::Night,
                day_number: two
            }
        );
        assert_eq!(
            parse("update-phase", json!({"phase": "day", "dayNumber": 2})).unwrap(),
            Command::UpdatePhase {
                phase: Phase::Day,
                day_number: two
            }
        );
    }

    #[test]
    fn update_phase_rejects_zero_or_bad_phase() {
        assert_matches!(
            parse("update-phase", json!({"phase": "night", "dayNum": 0})),
            Err(RpcError::InvalidParams { .. })
        );
        assert_matches!(
            parse("update-phase", json!({"phase": "dusk", "dayNum": 1})),
            Err(RpcError::InvalidParams { .. })
        );
        assert_matches!(
            parse("update-phase", json!({"phase": "day", "dayNum": -1})),
            Err(RpcError::InvalidParams { .. })
        );
    }

    #[test]
    fn missing_params_are_invalid() {
        assert_matches!(
            Command::parse("join-session", None),
            Err(RpcError::InvalidParams { message }) if message.starts_with("join-session")
        );
        assert_matches!(
            parse("update-player-status", json!({"playerId": "conn_1"})),
            Err(RpcError::InvalidParams { .. })
        );
    }

    #[test]
    fn unknown_method() {
        assert_matches!(
            Command::parse("summon-demon", None),
            Err(RpcError::MethodNotFound { method }) if method == "summon-demon"
        );
    }

    #[test]
    fn moderator_only_classification() {
        assert!(Command::EndSession.is_moderator_only());
        assert!(
            Command::BroadcastMessage {
                message: String::new()
            }
            .is_moderator_only()
        );
        assert!(!Command::CreateSession.is_moderator_only());
        assert!(Command::is_moderator_method("end-game"));
        assert!(!Command::is_moderator_method("join-game"));
        assert!(
            !Command::Reconnect {
                code: String::new(),
                name: String::new()
            }
            .is_moderator_only()
        );
    }
}
