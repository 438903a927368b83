//! Browser builds: a `js/wasm` module exported as a web page, and a local
//! dev server to play it.
//!
//! Threaded engine web exports need `SharedArrayBuffer`, which browsers only
//! enable on cross-origin isolated pages, so every response carries the
//! COOP/COEP headers.

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::http::{HeaderName, HeaderValue};
use axum::Router;
use std::net::Ipv4Addr;
use std::path::Path;
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::{info, warn};

use crate::project::export_preset;
use crate::toolchain::{Arch, Os, Platform};

use super::{BuildContext, BuildError, Builder};

const PLATFORM: Platform = Platform::new(Os::Js, Arch::Wasm);

pub struct WebBuilder;

#[async_trait]
impl Builder for WebBuilder {
    fn platform(&self) -> Platform {
        PLATFORM
    }

    async fn build(&self, ctx: &BuildContext, args: &[String]) -> Result<()> {
        ctx.scaffold()?;
        let module = ctx.project().library_path(PLATFORM);
        ctx.go_for(PLATFORM)
            .await?
            .build_executable(&module, args)
            .await?;

        let engine = ctx.engine().await?;
        engine.import().await?;
        ctx.project().ensure_releases_dir(PLATFORM)?;
        let page = ctx.project().export_path(PLATFORM);
        engine.export(&export_preset(PLATFORM), &page).await?;

        info!(page = %page.display(), "Build complete");
        Ok(())
    }

    async fn run(&self, ctx: &BuildContext, args: &[String]) -> Result<()> {
        self.build(ctx, args).await?;
        serve(&ctx.project().releases_dir(PLATFORM), ctx.settings().port).await
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

// ============================================================================
// Dev Server
// ============================================================================

/// Static file router for `dir` with cross-origin isolation headers.
pub fn router(dir: &Path) -> Router {
    Router::new()
        .fallback_service(ServeDir::new(dir))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("cross-origin-opener-policy"),
            HeaderValue::from_static("same-origin"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("cross-origin-embedder-policy"),
            HeaderValue::from_static("require-corp"),
        ))
}

/// Serves `dir` on `localhost:<port>` and opens it in the browser.
///
/// Runs until the process is interrupted.
pub async fn serve(dir: &Path, port: u16) -> Result<()> {
    let listener = tokio::net::TcpListener::bind((Ipv4Addr::LOCALHOST, port))
        .await
        .with_context(|| format!("Failed to listen on port {}", port))?;

    let url = format!("http://localhost:{}/", port);
    info!(%url, dir = %dir.display(), "Serving web export");
    if let Err(e) = webbrowser::open(&url) {
        warn!("Failed to open browser: {}", e);
    }

    axum::serve(listener, router(dir))
        .await
        .context("Web server failed")?;
    Ok(())
}
