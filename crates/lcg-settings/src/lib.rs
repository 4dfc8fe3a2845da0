//! # lcg-settings
//!
//! Configuration for the live control gateway, loaded from three layers
//! (in priority order):
//! 1. **Compiled defaults**: [`GatewaySettings::default()`]
//! 2. **User file**: `~/.livecontrol/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `LCG_*` overrides (highest priority)
//!
//! Settings are loaded once at process start and passed by value to the
//! components that need them. There is no global instance.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::{GatewaySettings, LiveControlSettings, LoggingSettings};
