//! Per-platform build adapters.
//!
//! Every adapter exposes the same four operations. Each one is a straight
//! sequence: resolve the tools it needs, compile the Go code for the target,
//! then drive the engine editor to import, export or run the result. The
//! first failure ends the operation; nothing already built is rolled back.
//!
//! # Architecture
//!
//! - `env`: Cross-compilation variables and zig target triples
//! - `engine`: `GoTool` and `Engine` handles around resolved executables
//! - `desktop`: linux, windows and darwin (including universal binaries)
//! - `android`, `ios`, `web`: mobile and browser targets

pub mod android;
pub mod desktop;
pub mod engine;
pub mod env;
pub mod ios;
pub mod web;

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::config::{EngineFlavor, Settings};
use crate::project::Project;
use crate::toolchain::{
    get_tool_descriptor, Arch, Downloader, Os, Platform, ProcessRunner, ResolvedTool, Resolver,
    ToolDescriptor, ToolId, ToolchainError,
};

pub use android::AndroidBuilder;
pub use desktop::DesktopBuilder;
pub use engine::{Engine, GoTool};
pub use env::{cross_env, zig_target};
pub use ios::IosBuilder;
pub use web::WebBuilder;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("gd cannot build for {platform}")]
    UnsupportedPlatform { platform: Platform },

    #[error("building for {platform} requires a {required} host, this is {host}")]
    HostRequired {
        platform: Platform,
        required: Os,
        host: Platform,
    },

    #[error("{operation} is not supported for {platform}")]
    UnsupportedOperation {
        operation: &'static str,
        platform: Platform,
    },
}

// ============================================================================
// Toolchain
// ============================================================================

/// Descriptors for every tool a build may need, held for the process lifetime.
///
/// Resolutions are memoised inside the descriptors, so each tool is looked
/// up at most once per run.
pub struct Toolchain {
    engine: ToolDescriptor,
    go: ToolDescriptor,
    zig: ToolDescriptor,
    adb: ToolDescriptor,
    apksigner: ToolDescriptor,
    lipo: ToolDescriptor,
}

impl Toolchain {
    pub fn new(flavor: EngineFlavor) -> Self {
        Self::from_fn(|id| get_tool_descriptor(id, flavor))
    }

    fn from_fn(mut make: impl FnMut(ToolId) -> ToolDescriptor) -> Self {
        Self {
            engine: make(ToolId::Engine),
            go: make(ToolId::Go),
            zig: make(ToolId::Zig),
            adb: make(ToolId::Adb),
            apksigner: make(ToolId::Apksigner),
            lipo: make(ToolId::Lipo),
        }
    }

    pub fn descriptor(&self, id: ToolId) -> &ToolDescriptor {
        match id {
            ToolId::Engine => &self.engine,
            ToolId::Go => &self.go,
            ToolId::Zig => &self.zig,
            ToolId::Adb => &self.adb,
            ToolId::Apksigner => &self.apksigner,
            ToolId::Lipo => &self.lipo,
        }
    }

    /// Every tool pre-resolved to `<dir>/<tool>`, for tests.
    #[cfg(test)]
    pub(crate) fn resolved_in(dir: &std::path::Path) -> Self {
        Self::from_fn(|id| {
            let name = match id {
                ToolId::Engine => "godot",
                other => other.as_str(),
            };
            get_tool_descriptor(id, EngineFlavor::Godot).with_resolved(dir.join(name))
        })
    }
}

// ============================================================================
// Build Context
// ============================================================================

/// Everything a builder operation needs, passed explicitly.
pub struct BuildContext {
    project: Project,
    settings: Settings,
    resolver: Resolver,
    toolchain: Toolchain,
}

impl BuildContext {
    pub fn new(
        project: Project,
        settings: Settings,
        runner: Arc<dyn ProcessRunner>,
        downloader: Arc<dyn Downloader>,
    ) -> Self {
        let resolver = Resolver::new(&settings, runner, downloader);
        let toolchain = Toolchain::new(settings.engine);
        Self {
            project,
            settings,
            resolver,
            toolchain,
        }
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn host(&self) -> Platform {
        self.settings.host
    }

    pub fn runner(&self) -> Arc<dyn ProcessRunner> {
        self.resolver.runner()
    }

    /// Resolves `id`, installing it if needed.
    pub async fn resolve(&self, id: ToolId) -> Result<ResolvedTool, ToolchainError> {
        self.resolver.lookup(self.toolchain.descriptor(id)).await
    }

    /// The Go compiler with the environment for building `target`.
    pub async fn go_for(&self, target: Platform) -> Result<GoTool> {
        let go = self.resolve(ToolId::Go).await?;

        let cc = self.settings.cc.as_deref();
        let zig = if env::needs_zig(self.host(), target, cc) {
            Some(self.resolve(ToolId::Zig).await?.executable())
        } else {
            None
        };
        let envs = cross_env(self.host(), target, cc, zig.as_deref());
        debug!(%target, ?envs, "Go environment");

        Ok(GoTool::new(
            go.executable(),
            self.runner(),
            envs,
            self.project.root(),
        ))
    }

    /// The engine editor for this project's `graphics/` directory.
    pub async fn engine(&self) -> Result<Engine> {
        let engine = self.resolve(ToolId::Engine).await?;
        Ok(Engine::new(
            engine.executable(),
            self.runner(),
            self.project.graphics_dir(),
        ))
    }

    /// Writes any missing engine project files.
    pub fn scaffold(&self) -> Result<()> {
        self.project.scaffold(self.settings.engine, false)?;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn for_tests(
        root: &std::path::Path,
        target: Platform,
        runner: Arc<dyn ProcessRunner>,
    ) -> Self {
        use crate::toolchain::downloader::fake::PanickingDownloader;

        let mut settings = Settings::for_tests(root);
        settings.target = target;
        let resolver = Resolver::new(&settings, runner, Arc::new(PanickingDownloader));
        Self {
            project: Project::new(root.join("rocks")),
            settings,
            resolver,
            toolchain: Toolchain::resolved_in(&root.join("tools")),
        }
    }
}

// ============================================================================
// Builder Trait
// ============================================================================

/// The four operations of a platform adapter.
///
/// `args` are passed through to the Go compiler.
#[async_trait]
pub trait Builder: Send + Sync {
    /// Target this builder produces artifacts for.
    fn platform(&self) -> Platform;

    /// Compiles the library and exports a packaged release.
    async fn build(&self, ctx: &BuildContext, args: &[String]) -> Result<()>;

    /// Compiles the library and launches the project.
    async fn run(&self, ctx: &BuildContext, args: &[String]) -> Result<()>;

    /// Compiles the Go tests into the library and runs them in the engine.
    async fn test(&self, ctx: &BuildContext, args: &[String]) -> Result<()>;

    /// Compiles the main package as a standalone executable.
    async fn build_main(&self, ctx: &BuildContext, args: &[String]) -> Result<()>;
}

/// Returns the adapter for building `target` on `host`.
pub fn builder_for(host: Platform, target: Platform) -> Result<Box<dyn Builder>, BuildError> {
    let unsupported = BuildError::UnsupportedPlatform { platform: target };
    let builder: Box<dyn Builder> = match (target.os, target.arch) {
        (Os::Linux | Os::Windows, Arch::Amd64 | Arch::Arm64) => {
            Box::new(DesktopBuilder::new(target))
        }
        (Os::Darwin, Arch::Amd64 | Arch::Arm64 | Arch::Universal) => {
            Box::new(DesktopBuilder::new(target))
        }
        (Os::Android, Arch::Arm64) => Box::new(AndroidBuilder),
        (Os::Ios, Arch::Arm64) => {
            if host.os != Os::Darwin {
                return Err(BuildError::HostRequired {
                    platform: target,
                    required: Os::Darwin,
                    host,
                });
            }
            Box::new(IosBuilder)
        }
        (Os::Js, Arch::Wasm) => Box::new(WebBuilder),
        _ => return Err(unsupported),
    };
    Ok(builder)
}
