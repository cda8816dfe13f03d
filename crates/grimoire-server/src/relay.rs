//! The single task that owns the session registry.
//!
//! Sockets and the sweeper never touch session state directly: they enqueue a
//! [`RelayInput`] and this loop applies inputs one at a time, in arrival order.

use std::time::Duration;

use chrono::{DateTime, Utc};
use grimoire_core::ConnectionId;
use grimoire_rpc::{ConnectionHandler, Outbound};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Work item for the relay loop.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RelayInput {
    /// A text frame from a socket.
    Frame {
        /// Sending connection.
        connection: ConnectionId,
        /// Raw frame text.
        text: String,
    },
    /// A socket closed.
    Disconnected {
        /// The closed connection.
        connection: ConnectionId,
    },
    /// Time to end expired sessions.
    Sweep,
}

/// Counters published after every input, read by `/health`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RelayStats {
    /// Live sessions.
    pub sessions: usize,
    /// Connections bound to a session.
    pub bound_connections: usize,
}

/// Owns the [`ConnectionHandler`] and applies inputs to it.
pub struct Relay<O> {
    handler: ConnectionHandler<O>,
    max_age: Duration,
    stats: watch::Sender<RelayStats>,
}

impl<O: Outbound> Relay<O> {
    /// Wrap a handler; sessions older than `max_age` are ended on each sweep.
    pub fn new(handler: ConnectionHandler<O>, max_age: Duration) -> (Self, watch::Receiver<RelayStats>) {
        let (stats, rx) = watch::channel(RelayStats::default());
        let relay = Self {
            handler,
            max_age,
            stats,
        };
        relay.publish();
        (relay, rx)
    }

    /// The wrapped handler.
    pub fn handler(&self) -> &ConnectionHandler<O> {
        &self.handler
    }

    /// Apply one input as of `now`.
    pub fn apply(&mut self, input: RelayInput, now: DateTime<Utc>) {
        match input {
            RelayInput::Frame { connection, text } => {
                self.handler.handle_text(&connection, &text, now);
            }
            RelayInput::Disconnected { connection } => {
                self.handler.disconnect(&connection, now);
            }
            RelayInput::Sweep => {
                let removed = self.handler.sweep_expired(self.max_age, now);
                debug!(removed, remaining = self.handler.session_count(), "sweep complete");
            }
        }
        self.publish();
    }

    /// Drain `inputs` until it closes or `cancel` fires.
    pub async fn run(mut self, mut inputs: mpsc::Receiver<RelayInput>, cancel: CancellationToken) {
        info!("relay started");
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                input = inputs.recv() => match input {
                    Some(input) => self.apply(input, Utc::now()),
                    None => break,
                },
            }
        }
        info!(sessions = self.handler.session_count(), "relay stopped");
    }

    fn publish(&self) {
        let next = RelayStats {
            sessions: self.handler.session_count(),
            bound_connections: self.handler.bound_connections(),
        };
        let _ = self.stats.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}
