//! The authoritative in-memory session registry.
//!
//! The registry is a plain owned value. The server keeps exactly one behind a
//! single writer; tests build as many independent ones as they like.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, info};

use crate::code::{generate_code, normalize_code};
use crate::errors::{Result, SessionError};
use crate::ids::ConnectionId;
use crate::session::Session;

/// Process-wide mapping from session code to [`Session`].
pub struct SessionRegistry {
    sessions: HashMap<String, Session>,
    rng: StdRng,
}

impl SessionRegistry {
    /// Empty registry with an OS-seeded code generator.
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }

    /// Empty registry with a caller-supplied generator (deterministic codes).
    pub fn with_rng(rng: StdRng) -> Self {
        Self {
            sessions: HashMap::new(),
            rng,
        }
    }

    /// Allocate a session with a fresh unique code, moderated by `moderator`.
    pub fn create(&mut self, moderator: ConnectionId, now: DateTime<Utc>) -> &Session {
        let sessions = &self.sessions;
        let code = generate_code(&mut self.rng, |c| sessions.contains_key(c));
        info!(code = %code, moderator = %moderator, "session created");
        self.sessions
            .entry(code.clone())
            .or_insert_with(|| Session::new(code, moderator, now))
    }

    /// Look up by code (normalized first).
    pub fn get(&self, code: &str) -> Option<&Session> {
        self.sessions.get(&normalize_code(code))
    }

    /// Mutable lookup by code.
    pub fn get_mut(&mut self, code: &str) -> Option<&mut Session> {
        self.sessions.get_mut(&normalize_code(code))
    }

    /// Look up by code, turning a miss into [`SessionError::SessionNotFound`].
    pub fn lookup(&self, code: &str) -> Result<&Session> {
        let code = normalize_code(code);
        self.sessions
            .get(&code)
            .ok_or_else(|| SessionError::session_not_found(&code))
    }

    /// Mutable variant of [`lookup`](Self::lookup).
    pub fn lookup_mut(&mut self, code: &str) -> Result<&mut Session> {
        let code = normalize_code(code);
        self.sessions
            .get_mut(&code)
            .ok_or_else(|| SessionError::session_not_found(&code))
    }

    /// Make `connection` the moderator of an existing session.
    ///
    /// Returns the displaced moderator connection, if it was a different one.
    /// A connection that is seated as a player in this session is refused.
    pub fn rejoin(
        &mut self,
        code: &str,
        connection: ConnectionId,
    ) -> Result<(Option<ConnectionId>, &Session)> {
        let session = self.lookup_mut(code)?;
        if session.player(&connection).is_some() {
            return Err(SessionError::ModeratorConflict {
                message: "A player cannot take over as storyteller of their own session".into(),
            });
        }
        let previous = session
            .set_moderator(connection.clone())
            .filter(|prev| *prev != connection);
        if let Some(prev) = &previous {
            info!(code = session.code(), previous = %prev, moderator = %connection, "moderator displaced");
        }
        Ok((previous, &*session))
    }

    /// Remove a session. Members must already have been notified.
    pub fn delete(&mut self, code: &str) -> Option<Session> {
        let removed = self.sessions.remove(&normalize_code(code));
        if let Some(session) = &removed {
            debug!(code = session.code(), "session removed");
        }
        removed
    }

    /// Remove and return every session strictly older than `max_age`.
    pub fn sweep_expired(&mut self, max_age: Duration, now: DateTime<Utc>) -> Vec<Session> {
        let expired: Vec<String> = self
            .sessions
            .values()
            .filter(|s| s.is_expired(max_age, now))
            .map(|s| s.code().to_owned())
            .collect();

        let mut removed: Vec<Session> = expired
            .iter()
            .filter_map(|code| self.sessions.remove(code))
            .collect();
        removed.sort_by(|a, b| a.code().cmp(b.code()));
        removed
    }

    /// Whether a session with this code is live.
    pub fn contains(&self, code: &str) -> bool {
        self.sessions.contains_key(&normalize_code(code))
    }

    /// Live session codes, sorted.
    pub fn codes(&self) -> Vec<&str> {
        let mut codes: Vec<&str> = self.sessions.keys().map(String::as_str).collect();
        codes.sort_unstable();
        codes
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no sessions are live.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
