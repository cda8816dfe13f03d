//! Domain errors surfaced to the requesting client.

use thiserror::Error;

/// Session does not exist.
pub const SESSION_NOT_FOUND: &str = "SESSION_NOT_FOUND";
/// Another member already uses this name.
pub const NAME_TAKEN: &str = "NAME_TAKEN";
/// Name is empty or too long.
pub const INVALID_NAME: &str = "INVALID_NAME";
/// No player with that name or id.
pub const PLAYER_NOT_FOUND: &str = "PLAYER_NOT_FOUND";
/// Reconnect target is still attached to a live connection.
pub const ALREADY_CONNECTED: &str = "ALREADY_CONNECTED";
/// The connection already holds the other role in this session.
pub const MODERATOR_CONFLICT: &str = "MODERATOR_CONFLICT";
/// The connection is already seated as a different player.
pub const ALREADY_SEATED: &str = "ALREADY_SEATED";

/// Errors produced by registry operations.
///
/// Authorization failures are deliberately absent: a non-moderator request is
/// dropped by the caller and never becomes an error value.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Session code does not resolve.
    #[error("Session not found. Check the code and try again.")]
    SessionNotFound {
        /// The normalized code that was looked up.
        code: String,
    },
    /// Case-insensitive duplicate name on join.
    #[error("That name is already taken. Please choose another.")]
    NameTaken {
        /// The requested (trimmed) name.
        name: String,
    },
    /// Name failed validation.
    #[error("{reason}")]
    InvalidName {
        /// Human-readable reason.
        reason: String,
    },
    /// Reconnect found no player with the given name.
    #[error("Player not found in session")]
    PlayerNotFound {
        /// The name that was searched for.
        name: String,
    },
    /// Reconnect onto a player whose connection is still live was refused.
    #[error("That player is still connected")]
    AlreadyConnected {
        /// Player name.
        name: String,
    },
    /// Moderator tried to join as a player, or a player tried to moderate.
    #[error("{message}")]
    ModeratorConflict {
        /// Human-readable message.
        message: String,
    },
    /// The connection already plays someone in this session.
    #[error("You are already seated in this session as {name}")]
    AlreadySeated {
        /// Name of the player already bound to the connection.
        name: String,
    },
}

impl SessionError {
    /// Machine-readable code for this variant.
    pub fn code(&self) -> &'static str {
        match self {
            Self::SessionNotFound { .. } => SESSION_NOT_FOUND,
            Self::NameTaken { .. } => NAME_TAKEN,
            Self::InvalidName { .. } => INVALID_NAME,
            Self::PlayerNotFound { .. } => PLAYER_NOT_FOUND,
            Self::AlreadyConnected { .. } => ALREADY_CONNECTED,
            Self::ModeratorConflict { .. } => MODERATOR_CONFLICT,
            Self::AlreadySeated { .. } => ALREADY_SEATED,
        }
    }

    pub(crate) fn session_not_found(code: &str) -> Self {
        Self::SessionNotFound {
            code: code.to_owned(),
        }
    }
}

/// Result alias for registry operations.
pub type Result<T> = std::result::Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_message_is_user_facing() {
        let err = SessionError::session_not_found("ABCD");
        assert_eq!(err.code(), SESSION_NOT_FOUND);
        assert!(err.to_string().contains("Check the code"));
    }

    #[test]
    fn name_taken_code() {
        let err = SessionError::NameTaken { name: "Bob".into() };
        assert_eq!(err.code(), NAME_TAKEN);
        assert!(err.to_string().contains("already taken"));
    }

    #[test]
    fn invalid_name_displays_reason() {
        let err = SessionError::InvalidName {
            reason: "Name cannot be empty".into(),
        };
        assert_eq!(err.code(), INVALID_NAME);
        assert_eq!(err.to_string(), "Name cannot be empty");
    }

    #[test]
    fn every_variant_has_distinct_code() {
        let errs = [
            SessionError::session_not_found("X"),
            SessionError::NameTaken { name: "a".into() },
            SessionError::InvalidName { reason: "r".into() },
            SessionError::PlayerNotFound { name: "a".into() },
            SessionError::AlreadyConnected { name: "a".into() },
            SessionError::ModeratorConflict { message: "m".into() },
            SessionError::AlreadySeated { name: "a".into() },
        ];
        let mut codes: Vec<_> = errs.iter().map(SessionError::code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errs.len());
    }
}
