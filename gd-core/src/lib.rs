//! gd Core Library
//!
//! This crate provides the core functionality for gd, the command that
//! builds, runs and tests Go projects on Godot-family engines. It includes:
//!
//! - Configuration read from the process environment
//! - Toolchain resolution: pinned installs, `PATH` lookup and downloads
//! - Archive extraction for downloaded tool packages
//! - The engine project scaffold under `graphics/`
//! - Per-platform builders that drive the Go compiler and the engine editor

pub mod builder;
pub mod config;
pub mod project;
pub mod toolchain;

// Re-exports for convenience
pub use config::{ConfigError, EngineFlavor, Settings};
pub use project::Project;

// Re-export builders
pub use builder::{builder_for, BuildContext, BuildError, Builder, Toolchain};

// Re-export toolchain
pub use toolchain::{
    HttpDownloader, Os, Platform, ResolvedTool, Resolver, SystemRunner, ToolId, ToolchainError,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
