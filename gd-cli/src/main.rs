//! gd command line
//!
//! Builds, runs and tests Go projects on Godot-family engines, installing
//! the toolchains it needs on first use.

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;

use cli::{Action, Cli, Operation};
use gd_core::{builder_for, BuildContext, HttpDownloader, Project, Settings, SystemRunner};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("gd: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Logs to stderr so that stdout carries only tool output.
fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("gd={level},gd_core={level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let settings = Settings::from_env()?;
    let cwd = std::env::current_dir().context("Failed to read the current directory")?;
    let project = Project::new(cwd);
    tracing::debug!(version = gd_core::VERSION, host = %settings.host, "Starting gd");

    match cli.command.into_action()? {
        Action::Init { force } => {
            let written = project.scaffold(settings.engine, force)?;
            for path in written {
                println!("{}", path.display());
            }
        }
        Action::Which { tool } => {
            let ctx = context(project, settings);
            let resolved = ctx.resolve(tool).await?;
            println!("{}", resolved.executable().display());
        }
        Action::Build {
            target_os,
            operation,
            args,
        } => {
            let settings = match target_os {
                Some(os) => settings.with_target_os(os),
                None => settings,
            };
            let builder = builder_for(settings.host, settings.target)?;
            let ctx = context(project, settings);
            match operation {
                Operation::Build => builder.build(&ctx, &args).await?,
                Operation::Run => builder.run(&ctx, &args).await?,
                Operation::Test => builder.test(&ctx, &args).await?,
                Operation::BuildMain => builder.build_main(&ctx, &args).await?,
            }
        }
    }
    Ok(())
}

fn context(project: Project, settings: Settings) -> BuildContext {
    BuildContext::new(
        project,
        settings,
        Arc::new(SystemRunner),
        Arc::new(HttpDownloader::new()),
    )
}
