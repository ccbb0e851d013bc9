//! # pong-settings
//!
//! Layered configuration for the Pong AI server and agent.
//!
//! Settings are resolved in three layers, later layers winning:
//!
//! 1. Compiled defaults ([`PongSettings::default()`])
//! 2. `~/.pong/settings.json` (or the file named by `$PONG_SETTINGS`), deep-merged
//! 3. `PONG_*` / `GAME_SERVICE_*` environment variables
//!
//! Loaded settings are passed explicitly to the components that need them;
//! there is no process-wide instance.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, apply_overrides, deep_merge, load_settings, load_settings_from_path,
    settings_path, validate,
};
pub use types::{
    AgentSettings, GameSettings, LoggingSettings, PolicyKind, PongSettings, ServerSettings,
};
