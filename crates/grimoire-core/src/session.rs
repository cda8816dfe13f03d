//! `Session` and `Player` records.
//!
//! A session is one game table. Its members are keyed by the connection that
//! currently speaks for them, but identified by name: a player who drops and
//! comes back gets a new connection id and keeps the same record.

use std::fmt;
use std::num::NonZeroU32;
use std::time::Duration;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SessionError};
use crate::ids::ConnectionId;
use crate::roles::RoleInfo;

/// Longest accepted display name, in characters.
pub const MAX_NAME_CHARS: usize = 32;

/// Coarse game clock broadcast to every member.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Discussion and nominations.
    #[default]
    Day,
    /// Everyone's eyes are closed.
    Night,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Day => f.write_str("day"),
            Self::Night => f.write_str("night"),
        }
    }
}

/// One participant at the table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    /// Connection currently bound to this player.
    pub id: ConnectionId,
    /// Trimmed display name; unique per session ignoring case.
    pub name: String,
    /// Assigned role name, if any.
    pub role: Option<String>,
    /// Catalog text captured when the role was assigned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role_info: Option<RoleInfo>,
    /// Alive or dead, as set by the moderator.
    pub alive: bool,
    /// The connection dropped and the player has not reconnected yet.
    pub disconnected: bool,
    /// When the player first joined.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub joined_at: DateTime<Utc>,
}

impl Player {
    fn new(id: ConnectionId, name: String, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name,
            role: None,
            role_info: None,
            alive: true,
            disconnected: false,
            joined_at: now,
        }
    }

    /// Case-insensitive name comparison.
    pub fn has_name(&self, name: &str) -> bool {
        self.name.to_lowercase() == name.trim().to_lowercase()
    }
}

/// Trim and validate a requested display name.
pub fn validate_name(raw: &str) -> Result<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(SessionError::InvalidName {
            reason: "Name cannot be empty".into(),
        });
    }
    if name.chars().count() > MAX_NAME_CHARS {
        return Err(SessionError::InvalidName {
            reason: format!("Name must be at most {MAX_NAME_CHARS} characters"),
        });
    }
    Ok(name.to_owned())
}

/// One in-progress game.
#[derive(Clone, Debug)]
pub struct Session {
    code: String,
    moderator: Option<ConnectionId>,
    members: IndexMap<ConnectionId, Player>,
    phase: Phase,
    day_number: NonZeroU32,
    created_at: DateTime<Utc>,
}

impl Session {
    pub(crate) fn new(code: String, moderator: ConnectionId, now: DateTime<Utc>) -> Self {
        Self {
            code,
            moderator: Some(moderator),
            members: IndexMap::new(),
            phase: Phase::Day,
            day_number: NonZeroU32::MIN,
            created_at: now,
        }
    }

    /// Session code.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Connection authorized to moderate, if any.
    pub fn moderator(&self) -> Option<&ConnectionId> {
        self.moderator.as_ref()
    }

    /// The single authorization rule: is `connection` the current moderator?
    pub fn is_moderator(&self, connection: &ConnectionId) -> bool {
        self.moderator.as_ref() == Some(connection)
    }

    /// Last writer wins: a later `create`/`rejoin` silently displaces the
    /// previous moderator connection.
    pub(crate) fn set_moderator(&mut self, connection: ConnectionId) -> Option<ConnectionId> {
        self.moderator.replace(connection)
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Current day counter.
    pub fn day_number(&self) -> NonZeroU32 {
        self.day_number
    }

    /// Creation time, used only for expiry.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Whether the session is strictly older than `max_age` at `now`.
    pub fn is_expired(&self, max_age: Duration, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.created_at)
            .to_std()
            .is_ok_and(|age| age > max_age)
    }

    /// Members in join order.
    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.members.values()
    }

    /// Owned snapshot of the member list.
    pub fn player_list(&self) -> Vec<Player> {
        self.members.values().cloned().collect()
    }

    /// Number of players.
    pub fn player_count(&self) -> usize {
        self.members.len()
    }

    /// Player bound to `connection`.
    pub fn player(&self, connection: &ConnectionId) -> Option<&Player> {
        self.members.get(connection)
    }

    /// Player with a case-insensitively matching name.
    pub fn find_by_name(&self, name: &str) -> Option<&Player> {
        self.members.values().find(|p| p.has_name(name))
    }

    /// Everyone who should hear a session-wide notice: the moderator first,
    /// then every player.
    pub fn audience(&self) -> Vec<ConnectionId> {
        self.moderator
            .iter()
            .chain(self.members.keys())
            .cloned()
            .collect()
    }

    /// Add a new player keyed by `connection`.
    pub fn add_player(
        &mut self,
        connection: ConnectionId,
        raw_name: &str,
        now: DateTime<Utc>,
    ) -> Result<&Player> {
        let name = validate_name(raw_name)?;
        if self.is_moderator(&connection) {
            return Err(SessionError::ModeratorConflict {
                message: "The storyteller cannot join their own session as a player".into(),
            });
        }
        if let Some(seated) = self.members.get(&connection) {
            return Err(SessionError::AlreadySeated {
                name: seated.name.clone(),
            });
        }
        if self.find_by_name(&name).is_some() {
            return Err(SessionError::NameTaken { name });
        }
        let player = Player::new(connection.clone(), name, now);
        let (index, _) = self.members.insert_full(connection, player);
        Ok(&self.members[index])
    }

    /// Remove the player bound to `connection`.
    pub fn remove_player(&mut self, connection: &ConnectionId) -> Option<Player> {
        self.members.shift_remove(connection)
    }

    /// Move the player named `name` onto `connection`.
    ///
    /// Returns the previous connection id and the updated record. When
    /// `allow_if_connected` is false, a player whose old connection has not
    /// been reported as dropped is refused.
    pub fn reconnect_player(
        &mut self,
        name: &str,
        connection: ConnectionId,
        allow_if_connected: bool,
    ) -> Result<(ConnectionId, &Player)> {
        if self.is_moderator(&connection) {
            return Err(SessionError::ModeratorConflict {
                message: "The storyteller cannot reconnect as a player".into(),
            });
        }
        let not_found = || SessionError::PlayerNotFound {
            name: name.trim().to_owned(),
        };
        let existing = self.find_by_name(name).ok_or_else(not_found)?;
        let other = self.members.get(&connection).filter(|p| p.id != existing.id);
        if let Some(seated) = other {
            return Err(SessionError::AlreadySeated {
                name: seated.name.clone(),
            });
        }
        if !allow_if_connected && !existing.disconnected && existing.id != connection {
            return Err(SessionError::AlreadyConnected {
                name: existing.name.clone(),
            });
        }
        let old_id = existing.id.clone();
        let mut player = self.members.shift_remove(&old_id).ok_or_else(not_found)?;
        player.id = connection.clone();
        player.disconnected = false;
        let (index, _) = self.members.insert_full(connection, player);
        Ok((old_id, &self.members[index]))
    }

    /// Flag the player on `connection` as disconnected, keeping the record.
    pub fn mark_disconnected(&mut self, connection: &ConnectionId) -> Option<&Player> {
        let player = self.members.get_mut(connection)?;
        player.disconnected = true;
        Some(player)
    }

    /// Assign a role and snapshot its catalog text.
    pub fn assign_role(
        &mut self,
        connection: &ConnectionId,
        role: &str,
        info: RoleInfo,
    ) -> Option<&Player> {
        let player = self.members.get_mut(connection)?;
        player.role = Some(role.to_owned());
        player.role_info = Some(info);
        Some(player)
    }

    /// Set the alive flag.
    pub fn set_alive(&mut self, connection: &ConnectionId, alive: bool) -> Option<&Player> {
        let player = self.members.get_mut(connection)?;
        player.alive = alive;
        Some(player)
    }

    /// Set phase and day counter.
    pub fn set_phase(&mut self, phase: Phase, day_number: NonZeroU32) {
        self.phase = phase;
        self.day_number = day_number;
    }
}
