//! # grimoire-server
//!
//! Axum HTTP + `WebSocket` transport for the session relay.
//!
//! - `/ws`: one socket per client, each with its own ordered outbound queue
//! - `/health`: liveness and counters
//! - A single relay task owns the session registry; sockets and the expiry
//!   sweeper feed it through one channel
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod health;
pub mod relay;
pub mod server;
pub mod shutdown;
pub mod sweeper;
pub mod websocket;

pub use config::ServerConfig;
pub use server::RelayServer;
