//! Handles for the two tools every build drives: the Go compiler and the
//! engine editor.
//!
//! A handle owns the resolved executable path and the runner, so builder
//! operations receive everything they need explicitly.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::toolchain::{Invocation, ProcessRunner};

// ============================================================================
// Go
// ============================================================================

/// The Go compiler, configured for one target platform.
pub struct GoTool {
    executable: PathBuf,
    runner: Arc<dyn ProcessRunner>,
    envs: Vec<(String, String)>,
    module_dir: PathBuf,
}

impl GoTool {
    pub fn new(
        executable: impl Into<PathBuf>,
        runner: Arc<dyn ProcessRunner>,
        envs: Vec<(String, String)>,
        module_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            executable: executable.into(),
            runner,
            envs,
            module_dir: module_dir.into(),
        }
    }

    /// Environment overrides applied to every invocation.
    pub fn envs(&self) -> &[(String, String)] {
        &self.envs
    }

    fn invocation(&self, subcommand: &str) -> Invocation {
        Invocation::new(&self.executable)
            .arg(subcommand)
            .envs(self.envs.iter().cloned())
            .current_dir(&self.module_dir)
    }

    /// `go build -buildmode=<mode> -o <output> [args]`.
    pub async fn build_library(&self, mode: &str, output: &Path, args: &[String]) -> Result<()> {
        info!(mode, output = %output.display(), "Building Go library");
        let invocation = self
            .invocation("build")
            .arg(format!("-buildmode={}", mode))
            .arg("-o")
            .arg(output)
            .args(args);
        self.runner
            .run(&invocation)
            .await
            .with_context(|| format!("Failed to build {}", output.display()))?;
        Ok(())
    }

    /// `go test -c -buildmode=c-shared -o <output> [args]`.
    pub async fn build_test_library(&self, output: &Path, args: &[String]) -> Result<()> {
        info!(output = %output.display(), "Building Go test library");
        let invocation = self
            .invocation("test")
            .args(["-c", "-buildmode=c-shared", "-o"])
            .arg(output)
            .args(args);
        self.runner
            .run(&invocation)
            .await
            .with_context(|| format!("Failed to build tests into {}", output.display()))?;
        Ok(())
    }

    /// `go build -o <output> [args]`.
    pub async fn build_executable(&self, output: &Path, args: &[String]) -> Result<()> {
        info!(output = %output.display(), "Building Go executable");
        let invocation = self.invocation("build").arg("-o").arg(output).args(args);
        self.runner
            .run(&invocation)
            .await
            .with_context(|| format!("Failed to build {}", output.display()))?;
        Ok(())
    }
}

// ============================================================================
// Engine
// ============================================================================

/// The engine editor, pointed at a project's `graphics/` directory.
pub struct Engine {
    executable: PathBuf,
    runner: Arc<dyn ProcessRunner>,
    project_dir: PathBuf,
}

impl Engine {
    pub fn new(
        executable: impl Into<PathBuf>,
        runner: Arc<dyn ProcessRunner>,
        project_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            executable: executable.into(),
            runner,
            project_dir: project_dir.into(),
        }
    }

    fn invocation(&self, headless: bool) -> Invocation {
        let invocation = Invocation::new(&self.executable);
        let invocation = if headless {
            invocation.arg("--headless")
        } else {
            invocation
        };
        invocation.arg("--path").arg(&self.project_dir)
    }

    /// Imports assets so that a following export sees the fresh library.
    pub async fn import(&self) -> Result<()> {
        info!(project = %self.project_dir.display(), "Importing engine project");
        self.runner
            .run(&self.invocation(true).arg("--import"))
            .await
            .context("Engine import failed")?;
        Ok(())
    }

    /// Exports `preset` from `export_presets.cfg` to `output`.
    pub async fn export(&self, preset: &str, output: &Path) -> Result<()> {
        info!(preset, output = %output.display(), "Exporting");
        let invocation = self
            .invocation(true)
            .arg("--export-release")
            .arg(preset)
            .arg(output);
        self.runner
            .run(&invocation)
            .await
            .with_context(|| format!("Engine export of preset {} failed", preset))?;
        Ok(())
    }

    /// Runs the project in a window until the user closes it.
    pub async fn run(&self) -> Result<()> {
        self.runner
            .run(&self.invocation(false))
            .await
            .context("Engine exited with an error")?;
        Ok(())
    }

    /// Runs the project without a window, for the Go test library.
    pub async fn run_headless(&self) -> Result<()> {
        self.runner
            .run(&self.invocation(true))
            .await
            .context("Tests failed")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolchain::runner::fake::FakeRunner;

    #[tokio::test]
    async fn test_go_invocations_carry_env_and_dir() {
        let runner = Arc::new(FakeRunner::new());
        let go = GoTool::new(
            "/usr/local/go/bin/go",
            runner.clone(),
            vec![("GOOS".to_string(), "windows".to_string())],
            "/src/rocks",
        );

        go.build_library("c-shared", Path::new("out.dll"), &["./cmd".to_string()])
            .await
            .unwrap();

        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].env_value("GOOS"), Some("windows"));
        assert_eq!(calls[0].current_dir, Some(PathBuf::from("/src/rocks")));
        assert_eq!(
            runner.command_lines(),
            vec!["go build -buildmode=c-shared -o out.dll ./cmd"]
        );
    }

    #[tokio::test]
    async fn test_engine_flags() {
        let runner = Arc::new(FakeRunner::new());
        let engine = Engine::new("/gd/bin/godot", runner.clone(), "/src/rocks/graphics");

        engine.import().await.unwrap();
        engine
            .export("linux/amd64", Path::new("/src/rocks/releases/linux/amd64/rocks"))
            .await
            .unwrap();
        engine.run().await.unwrap();

        assert_eq!(
            runner.command_lines(),
            vec![
                "godot --headless --path /src/rocks/graphics --import",
                "godot --headless --path /src/rocks/graphics --export-release linux/amd64 /src/rocks/releases/linux/amd64/rocks",
                "godot --path /src/rocks/graphics",
            ]
        );
    }

    #[tokio::test]
    async fn test_engine_failure_is_reported() {
        let runner = Arc::new(FakeRunner::new());
        runner.fail("godot", 1, "missing export template");
        let engine = Engine::new("/gd/bin/godot", runner.clone(), "/p/graphics");

        let err = engine.export("web", Path::new("/p/index.html")).await.unwrap_err();
        let chain = format!("{:#}", err);
        assert!(chain.contains("preset web"));
        assert!(chain.contains("missing export template"));
    }
}
