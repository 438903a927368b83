//! Subprocess execution behind a trait, so resolution and builds can be
//! exercised without spawning real tools.

use async_trait::async_trait;
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use super::error::ToolchainError;

type Result<T> = std::result::Result<T, ToolchainError>;

// ============================================================================
// Invocation
// ============================================================================

/// One fully described subprocess call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    /// Variables set on top of the inherited environment.
    pub envs: Vec<(String, String)>,
    pub current_dir: Option<PathBuf>,
    /// Capture stdout/stderr instead of inheriting the terminal.
    pub capture: bool,
}

impl Invocation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
            current_dir: None,
            capture: false,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.envs
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn capture(mut self) -> Self {
        self.capture = true;
        self
    }

    /// Short program name for messages (`go`, not `/usr/local/go/bin/go`).
    pub fn program_name(&self) -> String {
        program_name(&self.program)
    }

    /// Value of an environment override, if set.
    pub fn env_value(&self, key: &str) -> Option<&str> {
        self.envs
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Arguments as lossy UTF-8 strings.
    pub fn arg_strings(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// File name without a trailing `.exe`; version dots are kept.
fn program_name(program: &Path) -> String {
    let Some(name) = program.file_name() else {
        return program.display().to_string();
    };
    let name = name.to_string_lossy();
    let split = name.len().saturating_sub(4);
    match name.get(split..) {
        Some(ext) if split > 0 && ext.eq_ignore_ascii_case(".exe") => name[..split].to_string(),
        _ => name.into_owned(),
    }
}

/// Result of a successful subprocess call.
///
/// `stdout`/`stderr` are empty unless the invocation captured them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Trimmed stdout, or trimmed stderr when stdout is empty.
    ///
    /// Some tools print their version on stderr.
    pub fn reported(&self) -> &str {
        let stdout = self.stdout.trim();
        if stdout.is_empty() {
            self.stderr.trim()
        } else {
            stdout
        }
    }
}

// ============================================================================
// Runner Trait
// ============================================================================

/// Runs subprocesses.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Runs `invocation` to completion.
    ///
    /// A non-zero exit is an error carrying the captured stderr.
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput>;
}

/// Runs real processes with tokio.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

#[async_trait]
impl ProcessRunner for SystemRunner {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput> {
        debug!("Running {}", invocation);

        let mut command = Command::new(&invocation.program);
        command.args(&invocation.args);
        for (key, value) in &invocation.envs {
            command.env(key, value);
        }
        if let Some(dir) = &invocation.current_dir {
            command.current_dir(dir);
        }

        let spawn_err = |source: std::io::Error| ToolchainError::Spawn {
            program: invocation.program_name(),
            source,
        };

        let (status, output) = if invocation.capture {
            command.stdin(Stdio::null());
            let out = command.output().await.map_err(spawn_err)?;
            let output = CommandOutput {
                stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
            };
            (out.status, output)
        } else {
            let status = command.status().await.map_err(spawn_err)?;
            (status, CommandOutput::default())
        };

        if !status.success() {
            return Err(ToolchainError::Subprocess {
                program: invocation.program_name(),
                code: status.code(),
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(output)
    }
}

// ============================================================================
// Test Double
// ============================================================================
