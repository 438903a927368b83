//! Configuration module for gd.
//!
//! Everything configurable comes from environment variables.

mod settings;

pub use settings::{ConfigError, EngineFlavor, Settings, DEFAULT_PORT};
