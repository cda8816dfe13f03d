//! # grimoire-settings
//!
//! Configuration for the grimoire relay, loaded from three layers (in
//! priority order):
//! 1. **Compiled defaults**: [`RelaySettings::default()`]
//! 2. **Settings file**: `~/.grimoire/settings.json` or an explicit path,
//!    deep-merged over the defaults
//! 3. **Environment variables**: `PORT` and `GRIMOIRE_*` (highest priority)

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{apply_env_overrides, deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::{LoggingSettings, RelaySettings, ServerSettings, SessionSettings};
