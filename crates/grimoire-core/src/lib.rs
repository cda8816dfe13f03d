//! # grimoire-core
//!
//! Domain model for the grimoire session relay.
//!
//! - [`roles`]: static role catalog with fallback lookup
//! - [`code`]: short, human-typable session codes
//! - [`session`]: `Session` / `Player` records
//! - [`registry`]: the authoritative in-memory session registry
//!
//! Nothing in this crate performs I/O. Time is always passed in by the caller
//! so expiry can be tested deterministically.

#![deny(unsafe_code)]

pub mod code;
pub mod errors;
pub mod ids;
pub mod registry;
pub mod roles;
pub mod session;

pub use code::{CODE_ALPHABET, CODE_LENGTH, generate_code, is_valid_code, normalize_code};
pub use errors::{Result, SessionError};
pub use ids::ConnectionId;
pub use registry::SessionRegistry;
pub use roles::{RoleCatalog, RoleInfo, RoleType, Team};
pub use session::{Phase, Player, Session};
