//! iOS builds. The Go package is linked statically (`c-archive`) into the
//! engine's Xcode export, so this only works on a macOS host.

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use crate::project::export_preset;
use crate::toolchain::{Arch, Os, Platform};

use super::{BuildContext, BuildError, Builder};

const PLATFORM: Platform = Platform::new(Os::Ios, Arch::Arm64);

pub struct IosBuilder;

impl IosBuilder {
    fn unsupported(operation: &'static str) -> anyhow::Error {
        BuildError::UnsupportedOperation {
            operation,
            platform: PLATFORM,
        }
        .into()
    }
}

#[async_trait]
impl Builder for IosBuilder {
    fn platform(&self) -> Platform {
        PLATFORM
    }

    async fn build(&self, ctx: &BuildContext, args: &[String]) -> Result<()> {
        ctx.scaffold()?;
        let archive = ctx.project().library_path(PLATFORM);
        ctx.go_for(PLATFORM)
            .await?
            .build_library("c-archive", &archive, args)
            .await?;

        let engine = ctx.engine().await?;
        engine.import().await?;
        ctx.project().ensure_releases_dir(PLATFORM)?;
        let output = ctx.project().export_path(PLATFORM);
        engine.export(&export_preset(PLATFORM), &output).await?;

        info!(output = %output.display(), "Build complete");
        Ok(())
    }

    async fn run(&self, _ctx: &BuildContext, _args: &[String]) -> Result<()> {
        Err(Self::unsupported("run"))
    }

    async fn test(&self, _ctx: &BuildContext, _args: &[String]) -> Result<()> {
        Err(Self::unsupported("test"))
    }

    async fn build_main(&self, _ctx: &BuildContext, _args: &[String]) -> Result<()> {
        Err(Self::unsupported("build-main"))
    }
}
