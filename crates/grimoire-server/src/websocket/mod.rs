//! WebSocket connection state, the outbound hub, and the per-socket session loop.

pub mod connection;
pub mod hub;
pub mod session;
