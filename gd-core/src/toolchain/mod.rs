//! Toolchain acquisition for gd.
//!
//! This module finds the external executables a build needs (the engine
//! editor, Go, Zig and platform packaging tools), and downloads and unpacks
//! them into `$GDPATH` when they are missing.
//!
//! # Architecture
//!
//! - `types`: Core types (Os, Arch, Platform, ToolDescriptor, ResolvedTool)
//! - `error`: The `ToolchainError` taxonomy
//! - `template`: `$(VAR)` expansion for URLs and install paths
//! - `paths`: `$GDPATH` layout
//! - `catalog`: Static tool descriptors with download URLs
//! - `runner`: Subprocess execution behind a trait
//! - `downloader`: Resumable HTTP downloads
//! - `extractor`: Archive extraction (zip, tar.gz, tar.xz)
//! - `resolver`: Lookup order from pinned path to download
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use gd_core::config::Settings;
//! use gd_core::toolchain::{catalog, HttpDownloader, Resolver, SystemRunner, ToolId};
//!
//! let settings = Settings::from_env()?;
//! let resolver = Resolver::new(&settings, Arc::new(SystemRunner), Arc::new(HttpDownloader::new()));
//!
//! let zig = catalog::get_tool_descriptor(ToolId::Zig, settings.engine);
//! let resolved = resolver.lookup(&zig).await?;
//! println!("zig at {}", resolved.executable().display());
//! ```

pub mod catalog;
pub mod downloader;
pub mod error;
pub mod extractor;
pub mod paths;
pub mod resolver;
pub mod runner;
pub mod template;
pub mod types;

// Re-export commonly used types
pub use catalog::{get_tool_descriptor, ToolId};
pub use downloader::{Downloader, HttpDownloader};
pub use error::ToolchainError;
pub use extractor::{extract_archive, make_executable};
pub use resolver::Resolver;
pub use runner::{CommandOutput, Invocation, ProcessRunner, SystemRunner};
pub use template::{expand, Expansion, TemplateVar, TemplateVars, MISSING};
pub use types::{Arch, ArchiveFormat, Os, Platform, ResolvedTool, ToolDescriptor};
