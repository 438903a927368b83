//! Android builds: an arm64 shared library cross compiled with zig, exported
//! as a signed `.apk` and installed over `adb`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::info;

use crate::project::export_preset;
use crate::toolchain::{Arch, Invocation, Os, Platform, ToolId};

use super::{BuildContext, BuildError, Builder};

const PLATFORM: Platform = Platform::new(Os::Android, Arch::Arm64);

/// Activity the engine's Android template launches.
const ACTIVITY: &str = "com.godot.game.GodotApp";

pub struct AndroidBuilder;

#[async_trait]
impl Builder for AndroidBuilder {
    fn platform(&self) -> Platform {
        PLATFORM
    }

    async fn build(&self, ctx: &BuildContext, args: &[String]) -> Result<()> {
        ctx.scaffold()?;
        let library = ctx.project().library_path(PLATFORM);
        ctx.go_for(PLATFORM)
            .await?
            .build_library("c-shared", &library, args)
            .await?;

        let engine = ctx.engine().await?;
        engine.import().await?;
        ctx.project().ensure_releases_dir(PLATFORM)?;
        let apk = ctx.project().export_path(PLATFORM);
        engine.export(&export_preset(PLATFORM), &apk).await?;

        let apksigner = ctx.resolve(ToolId::Apksigner).await?;
        ctx.runner()
            .run(&Invocation::new(apksigner.executable()).arg("verify").arg(&apk))
            .await
            .with_context(|| format!("{} is not signed correctly", apk.display()))?;

        info!(apk = %apk.display(), "Build complete");
        Ok(())
    }

    async fn run(&self, ctx: &BuildContext, args: &[String]) -> Result<()> {
        self.build(ctx, args).await?;

        let adb = ctx.resolve(ToolId::Adb).await?.executable();
        let apk = ctx.project().export_path(PLATFORM);
        let runner = ctx.runner();

        info!(apk = %apk.display(), "Installing on device");
        runner
            .run(&Invocation::new(&adb).args(["install", "-r"]).arg(&apk))
            .await
            .context("Failed to install the app; is a device connected?")?;

        let component = format!("{}/{}", ctx.project().android_package(), ACTIVITY);
        runner
            .run(&Invocation::new(&adb).args(["shell", "am", "start", "-n"]).arg(component))
            .await
            .context("Failed to launch the app")?;
        Ok(())
    }

    async fn test(&self, _ctx: &BuildContext, _args: &[String]) -> Result<()> {
        Err(BuildError::UnsupportedOperation {
            operation: "test",
            platform: PLATFORM,
        }
        .into())
    }

    async fn build_main(&self, _ctx: &BuildContext, _args: &[String]) -> Result<()> {
        Err(BuildError::UnsupportedOperation {
            operation: "build-main",
            platform: PLATFORM,
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolchain::runner::fake::FakeRunner;
    use std::sync::Arc;
    use tempfile::TempDir;

    const LINUX: Platform = Platform::new(Os::Linux, Arch::Amd64);

    fn context(root: &std::path::Path, runner: Arc<FakeRunner>) -> BuildContext {
        let mut ctx = BuildContext::for_tests(root, PLATFORM, runner);
        ctx.settings.host = LINUX;
        ctx
    }

    #[tokio::test]
    async fn test_build_exports_and_verifies_apk() {
        let temp_dir = TempDir::new().unwrap();
        let runner = Arc::new(FakeRunner::new());
        let ctx = context(temp_dir.path(), runner.clone());
        let apk = temp_dir.path().join("rocks/releases/android/arm64/rocks.apk");

        AndroidBuilder.build(&ctx, &[]).await.unwrap();

        let calls = runner.calls();
        assert_eq!(calls[0].env_value("GOOS"), Some("android"));
        assert!(calls[0]
            .env_value("CC")
            .unwrap()
            .ends_with("cc -target aarch64-linux-android"));
        let lines = runner.command_lines();
        assert!(lines[2].contains("--export-release android/arm64"));
        assert_eq!(lines[3], format!("apksigner verify {}", apk.display()));
    }

    #[tokio::test]
    async fn test_run_installs_and_launches() {
        let temp_dir = TempDir::new().unwrap();
        let runner = Arc::new(FakeRunner::new());
        let ctx = context(temp_dir.path(), runner.clone());
        let apk = temp_dir.path().join("rocks/releases/android/arm64/rocks.apk");

        AndroidBuilder.run(&ctx, &[]).await.unwrap();

        let lines = runner.command_lines();
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[4], format!("adb install -r {}", apk.display()));
        assert_eq!(
            lines[5],
            "adb shell am start -n org.gd.rocks/com.godot.game.GodotApp"
        );
    }

    #[tokio::test]
    async fn test_unsigned_apk_fails_build() {
        let temp_dir = TempDir::new().unwrap();
        let runner = Arc::new(FakeRunner::new());
        runner.fail("apksigner", 1, "DOES NOT VERIFY");
        let ctx = context(temp_dir.path(), runner.clone());

        let err = AndroidBuilder.run(&ctx, &[]).await.unwrap_err();
        assert!(format!("{:#}", err).contains("DOES NOT VERIFY"));
        assert!(runner.command_lines().iter().all(|l| !l.starts_with("adb")));
    }

    #[tokio::test]
    async fn test_tests_are_unsupported() {
        let temp_dir = TempDir::new().unwrap();
        let runner = Arc::new(FakeRunner::new());
        let ctx = context(temp_dir.path(), runner.clone());

        let err = AndroidBuilder.test(&ctx, &[]).await.unwrap_err();
        assert_eq!(err.to_string(), "test is not supported for android/arm64");
        assert!(runner.calls().is_empty());
    }
}
