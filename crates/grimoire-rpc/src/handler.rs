//! Applies client requests and connection drops to the session registry.
//!
//! One [`ConnectionHandler`] owns the registry and is driven from a single
//! task, so every request is an atomic step with respect to session state.
//! Notifications go out through the [`Outbound`] port and never block.

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::time::Duration;

use chrono::{DateTime, Utc};
use grimoire_core::{ConnectionId, Phase, RoleCatalog, Session, SessionRegistry};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::commands::Command;
use crate::errors::{INVALID_PARAMS, RpcError};
use crate::events::EventType;
use crate::outbound::Outbound;
use crate::types::{RequestId, RpcEvent, RpcRequest, RpcResponse};

/// Behaviour switches for the handler.
#[derive(Clone, Copy, Debug)]
pub struct HandlerOptions {
    /// Let `reconnect` claim a player whose previous connection has not been
    /// reported as dropped.
    pub allow_reconnect_while_connected: bool,
}

impl Default for HandlerOptions {
    fn default() -> Self {
        Self {
            allow_reconnect_while_connected: true,
        }
    }
}

/// What a connection is to the session it last entered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Seat {
    Moderator,
    Player,
}

#[derive(Clone, Debug)]
struct Binding {
    code: String,
    seat: Seat,
}

/// Single-writer request handler.
pub struct ConnectionHandler<O> {
    registry: SessionRegistry,
    catalog: RoleCatalog,
    bindings: HashMap<ConnectionId, Binding>,
    outbound: O,
    options: HandlerOptions,
}

impl<O: Outbound> ConnectionHandler<O> {
    /// Build a handler around an existing registry.
    pub fn new(
        registry: SessionRegistry,
        catalog: RoleCatalog,
        outbound: O,
        options: HandlerOptions,
    ) -> Self {
        Self {
            registry,
            catalog,
            bindings: HashMap::new(),
            outbound,
            options,
        }
    }

    /// Read access to the registry.
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// The outbound port.
    pub fn outbound(&self) -> &O {
        &self.outbound
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.registry.len()
    }

    /// Number of connections currently bound to a session.
    pub fn bound_connections(&self) -> usize {
        self.bindings.len()
    }

    /// Session code `connection` is bound to, if any.
    pub fn session_of(&self, connection: &ConnectionId) -> Option<&str> {
        self.bindings.get(connection).map(|b| b.code.as_str())
    }

    /// Handle one text frame.
    pub fn handle_text(&mut self, connection: &ConnectionId, text: &str, now: DateTime<Utc>) {
        let value: Value = match serde_json::from_str(text) {
            Ok(v) => v,
            Err(e) => {
                warn!(connection = %connection, error = %e, "invalid JSON received");
                return;
            }
        };
        let id = value.get("id").and_then(RequestId::from_value);
        match serde_json::from_value::<RpcRequest>(value) {
            Ok(request) => self.handle_request(connection, request, now),
            Err(e) => {
                warn!(connection = %connection, error = %e, "frame is not a request");
                if let Some(id) = id {
                    let _ = self.outbound.send(
                        connection,
                        RpcResponse::error(id, INVALID_PARAMS, format!("Invalid request: {e}"))
                            .into(),
                    );
                }
            }
        }
    }

    /// Handle one decoded request.
    pub fn handle_request(
        &mut self,
        connection: &ConnectionId,
        request: RpcRequest,
        now: DateTime<Utc>,
    ) {
        let RpcRequest { id, method, params } = request;
        let command = match Command::parse(&method, params) {
            Ok(c) => c,
            Err(e) if Command::is_moderator_method(&method) => {
                warn!(connection = %connection, method, error = %e, "dropping malformed moderator command");
                return;
            }
            Err(e) => {
                warn!(connection = %connection, method, error = %e, "rejected request");
                self.reply(connection, id, Err(e));
                return;
            }
        };
        debug!(connection = %connection, method = command.method(), "dispatching");
        self.dispatch(connection, id, command, now);
    }

    /// Apply a parsed command.
    pub fn dispatch(
        &mut self,
        connection: &ConnectionId,
        id: Option<RequestId>,
        command: Command,
        now: DateTime<Utc>,
    ) {
        match command {
            Command::CreateSession => {
                let result = Ok(self.create_session(connection, now));
                self.reply(connection, id, result);
            }
            Command::RejoinSession { code } => {
                let result = self.rejoin_session(connection, &code);
                self.reply(connection, id, result);
            }
            Command::JoinSession { code, name } => {
                let result = self.join_session(connection, &code, &name, now);
                self.reply(connection, id, result);
            }
            Command::Reconnect { code, name } => {
                let result = self.reconnect(connection, &code, &name, now);
                self.reply(connection, id, result);
            }
            Command::AssignRole { player_id, role } => {
                self.assign_role(connection, &player_id, &role, now);
            }
            Command::UpdatePlayerStatus { player_id, alive } => {
                self.update_player_status(connection, &player_id, alive, now);
            }
            Command::UpdatePhase { phase, day_number } => {
                self.update_phase(connection, phase, day_number, now);
            }
            Command::BroadcastMessage { message } => {
                self.broadcast_message(connection, &message, now);
            }
            Command::RemovePlayer { player_id } => {
                self.remove_player(connection, &player_id, now);
            }
            Command::EndSession => self.end_session(connection, now),
        }
    }

    /// Transport-level disconnect.
    ///
    /// A player is flagged disconnected and the moderator told; a moderator's
    /// session is left as is so they can rejoin.
    pub fn disconnect(&mut self, connection: &ConnectionId, now: DateTime<Utc>) {
        let Some(binding) = self.bindings.remove(connection) else {
            return;
        };
        let Some(session) = self.registry.get_mut(&binding.code) else {
            return;
        };
        match binding.seat {
            Seat::Moderator => {
                info!(code = session.code(), connection = %connection, "storyteller disconnected, session kept");
            }
            Seat::Player => {
                let Some(player) = session.mark_disconnected(connection) else {
                    return;
                };
                let name = player.name.clone();
                info!(code = session.code(), player = %name, "player disconnected");
                notify_moderator(
                    &self.outbound,
                    session,
                    EventType::PlayerDisconnected,
                    json!({"id": connection, "name": name}),
                    now,
                );
            }
        }
    }

    /// End every session older than `max_age`, notifying its members.
    ///
    /// Returns how many sessions were removed.
    pub fn sweep_expired(&mut self, max_age: Duration, now: DateTime<Utc>) -> usize {
        let expired = self.registry.sweep_expired(max_age, now);
        for session in &expired {
            info!(code = session.code(), created_at = %session.created_at(), "session expired");
            announce_end(&self.outbound, session, "expired", now);
            self.unbind_session(session.code());
        }
        expired.len()
    }

    fn create_session(&mut self, connection: &ConnectionId, now: DateTime<Utc>) -> Value {
        let code = self.registry.create(connection.clone(), now).code().to_owned();
        self.bind(connection, &code, Seat::Moderator);
        json!({"code": code})
    }

    fn rejoin_session(&mut self, connection: &ConnectionId, code: &str) -> Result<Value, RpcError> {
        let (displaced, session) = self.registry.rejoin(code, connection.clone())?;
        let code = session.code().to_owned();
        let reply = json!({
            "code": code,
            "players": session.player_list(),
            "phase": session.phase(),
            "dayNum": session.day_number(),
        });
        if let Some(prev) = displaced {
            if self
                .bindings
                .get(&prev)
                .is_some_and(|b| b.code == code && b.seat == Seat::Moderator)
            {
                let _ = self.bindings.remove(&prev);
            }
        }
        info!(code, connection = %connection, "storyteller rejoined");
        self.bind(connection, &code, Seat::Moderator);
        Ok(reply)
    }

    fn join_session(
        &mut self,
        connection: &ConnectionId,
        code: &str,
        name: &str,
        now: DateTime<Utc>,
    ) -> Result<Value, RpcError> {
        let session = self.registry.lookup_mut(code)?;
        let player = session.add_player(connection.clone(), name, now)?.clone();
        let code = session.code().to_owned();
        info!(code, player = %player.name, "player joined");
        notify_moderator(
            &self.outbound,
            session,
            EventType::PlayerJoined,
            json!({
                "id": player.id,
                "name": player.name,
                "players": session.player_list(),
            }),
            now,
        );
        self.bind(connection, &code, Seat::Player);
        Ok(json!({"code": code, "player": player}))
    }

    fn reconnect(
        &mut self,
        connection: &ConnectionId,
        code: &str,
        name: &str,
        now: DateTime<Utc>,
    ) -> Result<Value, RpcError> {
        let allow = self.options.allow_reconnect_while_connected;
        let session = self.registry.lookup_mut(code)?;
        let (old_id, player) = session.reconnect_player(name, connection.clone(), allow)?;
        let player = player.clone();
        let code = session.code().to_owned();
        info!(code, player = %player.name, previous = %old_id, "player reconnected");
        notify_moderator(
            &self.outbound,
            session,
            EventType::PlayerReconnected,
            json!({"id": player.id, "name": player.name}),
            now,
        );
        if old_id != *connection
            && self
                .bindings
                .get(&old_id)
                .is_some_and(|b| b.code == code && b.seat == Seat::Player)
        {
            let _ = self.bindings.remove(&old_id);
        }
        self.bind(connection, &code, Seat::Player);
        Ok(json!({
            "code": code,
            "role": player.role,
            "roleInfo": player.role_info,
            "player": player,
        }))
    }

    fn assign_role(
        &mut self,
        connection: &ConnectionId,
        player_id: &ConnectionId,
        role: &str,
        now: DateTime<Utc>,
    ) {
        let Some(session) = moderated(&mut self.registry, &self.bindings, connection, "assign-role")
        else {
            return;
        };
        let info = self.catalog.resolve(role);
        let code = session.code().to_owned();
        let Some(player) = session.assign_role(player_id, role, info.clone()) else {
            debug!(code, player = %player_id, "assign-role for unknown player");
            return;
        };
        info!(code, player = %player.name, role, "role assigned");
        push(
            &self.outbound,
            player_id,
            event(EventType::RoleAssigned, &code, json!({"role": role, "roleInfo": info}), now),
        );
        push(
            &self.outbound,
            connection,
            event(
                EventType::RoleAssignedConfirm,
                &code,
                json!({"playerId": player_id, "role": role}),
                now,
            ),
        );
    }

    fn update_player_status(
        &mut self,
        connection: &ConnectionId,
        player_id: &ConnectionId,
        alive: bool,
        now: DateTime<Utc>,
    ) {
        let Some(session) = moderated(
            &mut self.registry,
            &self.bindings,
            connection,
            "update-player-status",
        ) else {
            return;
        };
        let code = session.code().to_owned();
        let Some(player) = session.set_alive(player_id, alive) else {
            debug!(code, player = %player_id, "status update for unknown player");
            return;
        };
        debug!(code, player = %player.name, alive, "player status updated");
        push(
            &self.outbound,
            player_id,
            event(EventType::StatusUpdated, &code, json!({"alive": alive}), now),
        );
    }

    fn update_phase(
        &mut self,
        connection: &ConnectionId,
        phase: Phase,
        day_number: NonZeroU32,
        now: DateTime<Utc>,
    ) {
        let Some(session) = moderated(&mut self.registry, &self.bindings, connection, "update-phase")
        else {
            return;
        };
        session.set_phase(phase, day_number);
        info!(code = session.code(), %phase, day = day_number.get(), "phase changed");
        let ev = event(
            EventType::PhaseChanged,
            session.code(),
            json!({"phase": phase, "dayNum": day_number}),
            now,
        );
        push_all(&self.outbound, session, &ev);
    }

    fn broadcast_message(&mut self, connection: &ConnectionId, message: &str, now: DateTime<Utc>) {
        let Some(session) =
            moderated(&mut self.registry, &self.bindings, connection, "broadcast-message")
        else {
            return;
        };
        let ev = event(
            EventType::StorytellerMessage,
            session.code(),
            json!({"message": message}),
            now,
        );
        push_all(&self.outbound, session, &ev);
    }

    fn remove_player(
        &mut self,
        connection: &ConnectionId,
        player_id: &ConnectionId,
        now: DateTime<Utc>,
    ) {
        let Some(session) = moderated(&mut self.registry, &self.bindings, connection, "remove-player")
        else {
            return;
        };
        let code = session.code().to_owned();
        let Some(player) = session.remove_player(player_id) else {
            debug!(code, player = %player_id, "remove-player for unknown player");
            return;
        };
        info!(code, player = %player.name, "player removed");
        push(
            &self.outbound,
            player_id,
            RpcEvent::at(EventType::RemovedFromSession, Some(code.clone()), None, now),
        );
        if self.bindings.get(player_id).is_some_and(|b| b.code == code) {
            let _ = self.bindings.remove(player_id);
        }
    }

    fn end_session(&mut self, connection: &ConnectionId, now: DateTime<Utc>) {
        let Some(session) = moderated(&mut self.registry, &self.bindings, connection, "end-session")
        else {
            return;
        };
        let code = session.code().to_owned();
        announce_end(&self.outbound, session, "ended", now);
        let _ = self.registry.delete(&code);
        self.unbind_session(&code);
        info!(code, "session ended by storyteller");
    }

    fn bind(&mut self, connection: &ConnectionId, code: &str, seat: Seat) {
        let previous = self.bindings.insert(
            connection.clone(),
            Binding {
                code: code.to_owned(),
                seat,
            },
        );
        if let Some(prev) = previous.filter(|p| p.code != code) {
            debug!(connection = %connection, from = prev.code, to = code, "connection moved sessions");
        }
    }

    fn unbind_session(&mut self, code: &str) {
        self.bindings.retain(|_, b| b.code != code);
    }

    fn reply(&self, connection: &ConnectionId, id: Option<RequestId>, result: Result<Value, RpcError>) {
        let Some(id) = id else {
            if let Err(e) = result {
                debug!(connection = %connection, error = %e, "dropping error for request without id");
            }
            return;
        };
        let response = match result {
            Ok(value) => RpcResponse::success(id, value),
            Err(e) => {
                debug!(connection = %connection, code = e.code(), error = %e, "request failed");
                let body = e.to_error_body();
                RpcResponse::error(id, body.code, body.message)
            }
        };
        let _ = self.outbound.send(connection, response.into());
    }
}

/// The session `connection` moderates, or `None` (logged) when it moderates
/// nothing. Non-moderators are dropped without a reply.
fn moderated<'a>(
    registry: &'a mut SessionRegistry,
    bindings: &HashMap<ConnectionId, Binding>,
    connection: &ConnectionId,
    method: &str,
) -> Option<&'a mut Session> {
    let Some(binding) = bindings.get(connection) else {
        debug!(connection = %connection, method, "not in a session, ignoring");
        return None;
    };
    let session = registry.get_mut(&binding.code)?;
    if session.is_moderator(connection) {
        Some(session)
    } else {
        debug!(connection = %connection, method, code = session.code(), "not the storyteller, ignoring");
        None
    }
}

fn event(kind: EventType, code: &str, data: Value, now: DateTime<Utc>) -> RpcEvent {
    RpcEvent::at(kind, Some(code.to_owned()), Some(data), now)
}

fn push<O: Outbound>(outbound: &O, to: &ConnectionId, ev: RpcEvent) {
    if !outbound.send(to, ev.into()) {
        debug!(connection = %to, "notification not delivered");
    }
}

fn push_all<O: Outbound>(outbound: &O, session: &Session, ev: &RpcEvent) {
    for member in session.audience() {
        push(outbound, &member, ev.clone());
    }
}

fn notify_moderator<O: Outbound>(
    outbound: &O,
    session: &Session,
    kind: EventType,
    data: Value,
    now: DateTime<Utc>,
) {
    if let Some(moderator) = session.moderator() {
        push(outbound, moderator, event(kind, session.code(), data, now));
    }
}

fn announce_end<O: Outbound>(outbound: &O, session: &Session, reason: &str, now: DateTime<Utc>) {
    let ev = event(EventType::SessionEnded, session.code(), json!({"reason": reason}), now);
    push_all(outbound, session, &ev);
}
