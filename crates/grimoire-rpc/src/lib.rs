//! # grimoire-rpc
//!
//! Request/response protocol spoken over each WebSocket, and the
//! [`ConnectionHandler`] that applies requests to the session registry.
//!
//! - [`types`]: `RpcRequest`, `RpcResponse`, `RpcEvent` wire records
//! - [`events`]: pushed event names
//! - [`commands`]: typed parsing of method + params, legacy aliases included
//! - [`outbound`]: the port through which replies and events leave
//! - [`handler`]: the single-writer request handler

#![deny(unsafe_code)]

pub mod commands;
pub mod errors;
pub mod events;
pub mod handler;
pub mod outbound;
pub mod types;

pub use commands::Command;
pub use errors::RpcError;
pub use events::EventType;
pub use handler::{ConnectionHandler, HandlerOptions};
pub use outbound::{Outbound, Outgoing};
pub use types::{RequestId, RpcErrorBody, RpcEvent, RpcRequest, RpcResponse};
