//! # tidings-settings
//!
//! Layered configuration for the gateway and delivery processes.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`TidingsSettings::default()`]
//! 2. **Settings file**: `~/.tidings/settings.json` or an explicit path (deep-merged over defaults)
//! 3. **Environment variables**: `TIDINGS_*` overrides (highest priority)
//!
//! The merged result is validated once; invalid values are a startup error.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;
