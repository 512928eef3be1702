//! Configuration system for the Tether overlay.
//!
//! Provides runtime-configurable settings that persist to disk as RON files.
//! Supports hot-reload detection and forward/backward compatible
//! serialization (unknown fields are ignored, missing fields use defaults).

mod config;
mod error;

pub use config::{Config, DebugConfig, SessionConfig, SyncConfig, default_config_dir};
pub use error::ConfigError;
