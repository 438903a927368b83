//! Linux, Windows and macOS builds.
//!
//! The Go package is compiled with `-buildmode=c-shared` into the engine
//! project, which the engine editor then imports and exports. A darwin
//! `universal` target builds both slices and merges them with `lipo`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::project::export_preset;
use crate::toolchain::{Arch, Invocation, Os, Platform, ToolId};

use super::{BuildContext, BuildError, Builder};

/// What a compile step produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Artifact {
    /// GDExtension library inside `graphics/`.
    Library,
    /// Standalone executable inside `releases/`.
    Executable,
}

pub struct DesktopBuilder {
    platform: Platform,
}

impl DesktopBuilder {
    pub fn new(platform: Platform) -> Self {
        Self { platform }
    }

    fn output(&self, ctx: &BuildContext, artifact: Artifact, platform: Platform) -> Result<PathBuf> {
        match artifact {
            Artifact::Library => Ok(ctx.project().library_path(platform)),
            Artifact::Executable => {
                ctx.project().ensure_releases_dir(platform)?;
                Ok(ctx.project().main_binary_path(platform))
            }
        }
    }

    async fn compile_slice(
        &self,
        ctx: &BuildContext,
        artifact: Artifact,
        platform: Platform,
        args: &[String],
    ) -> Result<PathBuf> {
        let output = self.output(ctx, artifact, platform)?;
        let go = ctx.go_for(platform).await?;
        match artifact {
            Artifact::Library => go.build_library("c-shared", &output, args).await?,
            Artifact::Executable => go.build_executable(&output, args).await?,
        }
        Ok(output)
    }

    /// Compiles `artifact` for this builder's platform.
    async fn compile(&self, ctx: &BuildContext, artifact: Artifact, args: &[String]) -> Result<PathBuf> {
        if self.platform.arch != Arch::Universal {
            return self.compile_slice(ctx, artifact, self.platform, args).await;
        }

        let mut slices = Vec::new();
        for arch in [Arch::Amd64, Arch::Arm64] {
            let slice = Platform::new(Os::Darwin, arch);
            slices.push(self.compile_slice(ctx, artifact, slice, args).await?);
        }
        let output = self.output(ctx, artifact, self.platform)?;
        merge_slices(ctx, &output, &slices).await?;
        Ok(output)
    }

    /// The platform to run on this host, or an error when the host cannot
    /// run this builder's output.
    fn runnable(&self, ctx: &BuildContext) -> Result<Platform, BuildError> {
        let host = ctx.host();
        if self.platform.os != host.os {
            return Err(BuildError::HostRequired {
                platform: self.platform,
                required: self.platform.os,
                host,
            });
        }
        if self.platform.arch == Arch::Universal {
            return Ok(host);
        }
        Ok(self.platform)
    }
}

async fn merge_slices(ctx: &BuildContext, output: &Path, slices: &[PathBuf]) -> Result<()> {
    let lipo = ctx.resolve(ToolId::Lipo).await?;
    info!(output = %output.display(), "Merging universal binary");
    let invocation = Invocation::new(lipo.executable())
        .arg("-create")
        .arg("-output")
        .arg(output)
        .args(slices);
    ctx.runner()
        .run(&invocation)
        .await
        .with_context(|| format!("Failed to create universal binary {}", output.display()))?;
    Ok(())
}

#[async_trait]
impl Builder for DesktopBuilder {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn build(&self, ctx: &BuildContext, args: &[String]) -> Result<()> {
        ctx.scaffold()?;
        self.compile(ctx, Artifact::Library, args).await?;

        let engine = ctx.engine().await?;
        engine.import().await?;
        ctx.project().ensure_releases_dir(self.platform)?;
        let output = ctx.project().export_path(self.platform);
        engine.export(&export_preset(self.platform), &output).await?;

        info!(platform = %self.platform, output = %output.display(), "Build complete");
        Ok(())
    }

    async fn run(&self, ctx: &BuildContext, args: &[String]) -> Result<()> {
        let platform = self.runnable(ctx)?;
        ctx.scaffold()?;
        DesktopBuilder::new(platform)
            .compile(ctx, Artifact::Library, args)
            .await?;

        let engine = ctx.engine().await?;
        engine.import().await?;
        engine.run().await
    }

    async fn test(&self, ctx: &BuildContext, args: &[String]) -> Result<()> {
        let platform = self.runnable(ctx)?;
        ctx.scaffold()?;
        let output = ctx.project().library_path(platform);
        ctx.go_for(platform)
            .await?
            .build_test_library(&output, args)
            .await?;

        let engine = ctx.engine().await?;
        engine.import().await?;
        engine.run_headless().await
    }

    async fn build_main(&self, ctx: &BuildContext, args: &[String]) -> Result<()> {
        let output = self.compile(ctx, Artifact::Executable, args).await?;
        info!(output = %output.display(), "Built executable");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolchain::runner::fake::FakeRunner;
    use std::sync::Arc;
    use tempfile::TempDir;

    const LINUX: Platform = Platform::new(Os::Linux, Arch::Amd64);

    fn context(root: &Path, host: Platform, runner: Arc<FakeRunner>) -> BuildContext {
        let mut ctx = BuildContext::for_tests(root, host, runner);
        ctx.settings.host = host;
        ctx
    }

    #[tokio::test]
    async fn test_build_compiles_imports_and_exports() {
        let temp_dir = TempDir::new().unwrap();
        let runner = Arc::new(FakeRunner::new());
        let ctx = context(temp_dir.path(), LINUX, runner.clone());
        let root = temp_dir.path().join("rocks");

        DesktopBuilder::new(LINUX)
            .build(&ctx, &["./cmd/rocks".to_string()])
            .await
            .unwrap();

        let graphics = root.join("graphics");
        let lines = runner.command_lines();
        assert_eq!(
            lines,
            vec![
                format!(
                    "go build -buildmode=c-shared -o {} ./cmd/rocks",
                    graphics.join("linux_amd64.so").display()
                ),
                format!("godot --headless --path {} --import", graphics.display()),
                format!(
                    "godot --headless --path {} --export-release linux/amd64 {}",
                    graphics.display(),
                    root.join("releases/linux/amd64/rocks").display()
                ),
            ]
        );
        assert!(graphics.join("library.gdextension").is_file());
        assert!(root.join("releases/linux/amd64").is_dir());

        let go_call = &runner.calls()[0];
        assert_eq!(go_call.current_dir.as_deref(), Some(root.as_path()));
        assert_eq!(go_call.env_value("CGO_ENABLED"), None);
    }

    #[tokio::test]
    async fn test_cross_build_sets_compiler() {
        let temp_dir = TempDir::new().unwrap();
        let runner = Arc::new(FakeRunner::new());
        let ctx = context(temp_dir.path(), LINUX, runner.clone());
        let windows = Platform::new(Os::Windows, Arch::Amd64);

        DesktopBuilder::new(windows).build(&ctx, &[]).await.unwrap();

        let go_call = &runner.calls()[0];
        assert_eq!(go_call.env_value("GOOS"), Some("windows"));
        assert_eq!(go_call.env_value("GOARCH"), Some("amd64"));
        assert_eq!(go_call.env_value("CGO_ENABLED"), Some("1"));
        assert!(go_call
            .env_value("CC")
            .unwrap()
            .ends_with("zig cc -target x86_64-windows-gnu"));
        assert!(runner.command_lines()[2].ends_with("rocks.exe"));
    }

    #[tokio::test]
    async fn test_universal_merges_slices() {
        let temp_dir = TempDir::new().unwrap();
        let runner = Arc::new(FakeRunner::new());
        let mac = Platform::new(Os::Darwin, Arch::Arm64);
        let ctx = context(temp_dir.path(), mac, runner.clone());
        let graphics = temp_dir.path().join("rocks/graphics");

        DesktopBuilder::new(Platform::new(Os::Darwin, Arch::Universal))
            .build(&ctx, &[])
            .await
            .unwrap();

        let lines = runner.command_lines();
        assert!(lines[0].contains("darwin_amd64.dylib"));
        assert!(lines[1].contains("darwin_arm64.dylib"));
        assert_eq!(
            lines[2],
            format!(
                "lipo -create -output {} {} {}",
                graphics.join("darwin_universal.dylib").display(),
                graphics.join("darwin_amd64.dylib").display(),
                graphics.join("darwin_arm64.dylib").display()
            )
        );
        assert!(lines[4].contains("--export-release darwin/universal"));
        assert!(lines[4].ends_with("rocks.zip"));
    }

    #[tokio::test]
    async fn test_run_requires_matching_host() {
        let temp_dir = TempDir::new().unwrap();
        let runner = Arc::new(FakeRunner::new());
        let ctx = context(temp_dir.path(), LINUX, runner.clone());

        let err = DesktopBuilder::new(Platform::new(Os::Windows, Arch::Amd64))
            .run(&ctx, &[])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("requires a windows host"));
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_test_builds_test_library_and_runs_headless() {
        let temp_dir = TempDir::new().unwrap();
        let runner = Arc::new(FakeRunner::new());
        let ctx = context(temp_dir.path(), LINUX, runner.clone());
        let graphics = temp_dir.path().join("rocks/graphics");

        DesktopBuilder::new(LINUX).test(&ctx, &[]).await.unwrap();

        assert_eq!(
            runner.command_lines(),
            vec![
                format!(
                    "go test -c -buildmode=c-shared -o {}",
                    graphics.join("linux_amd64.so").display()
                ),
                format!("godot --headless --path {} --import", graphics.display()),
                format!("godot --headless --path {}", graphics.display()),
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_compile_stops_before_engine() {
        let temp_dir = TempDir::new().unwrap();
        let runner = Arc::new(FakeRunner::new());
        runner.fail("go", 1, "undefined: Foo");
        let ctx = context(temp_dir.path(), LINUX, runner.clone());

        let err = DesktopBuilder::new(LINUX).build(&ctx, &[]).await.unwrap_err();
        assert!(format!("{:#}", err).contains("undefined: Foo"));
        assert_eq!(runner.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_build_main_writes_release_binary() {
        let temp_dir = TempDir::new().unwrap();
        let runner = Arc::new(FakeRunner::new());
        let ctx = context(temp_dir.path(), LINUX, runner.clone());

        DesktopBuilder::new(LINUX).build_main(&ctx, &[]).await.unwrap();

        assert_eq!(
            runner.command_lines(),
            vec![format!(
                "go build -o {}",
                temp_dir.path().join("rocks/releases/linux/amd64/rocks").display()
            )]
        );
    }
}
