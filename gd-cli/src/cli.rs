use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use gd_core::{Os, ToolId};

/// gd - build, run and test Go projects on Godot-family engines
#[derive(Parser, Debug)]
#[command(name = "gd")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "Prefix a command with a platform to cross compile, e.g. `gd android run`.\n\
Platforms: linux, windows, darwin (macos), ios, android, web (js, wasm, browser).")]
pub struct Cli {
    /// Log debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compile the Go package and export a release
    Build {
        /// Arguments passed to the Go compiler
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Compile the Go package and launch the project
    Run {
        /// Arguments passed to the Go compiler
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Run the Go tests inside the engine
    Test {
        /// Arguments passed to the Go compiler
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Compile the main package as a standalone executable
    #[command(name = "build-main")]
    BuildMain {
        /// Arguments passed to the Go compiler
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Write the engine project files under graphics/
    Init {
        /// Overwrite files that already exist
        #[arg(long)]
        force: bool,
    },

    /// Print the path of a tool, installing it if needed
    Which {
        /// engine, go, zig, adb, apksigner or lipo
        #[arg(value_name = "TOOL")]
        tool: String,
    },

    /// `<platform> <command> [args...]`
    #[command(external_subcommand)]
    Platform(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Build,
    Run,
    Test,
    BuildMain,
}

impl std::str::FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "build" => Ok(Self::Build),
            "run" => Ok(Self::Run),
            "test" => Ok(Self::Test),
            "build-main" => Ok(Self::BuildMain),
            _ => Err(format!("Unknown command: {}", s)),
        }
    }
}

/// A parsed command line, with the platform prefix applied.
#[derive(Debug, PartialEq, Eq)]
pub enum Action {
    Build {
        /// Target OS from the platform prefix; `GOOS` or the host otherwise.
        target_os: Option<Os>,
        operation: Operation,
        args: Vec<String>,
    },
    Init {
        force: bool,
    },
    Which {
        tool: ToolId,
    },
}

impl Commands {
    pub fn into_action(self) -> Result<Action> {
        let build = |operation, args| Action::Build {
            target_os: None,
            operation,
            args,
        };
        let action = match self {
            Commands::Build { args } => build(Operation::Build, args),
            Commands::Run { args } => build(Operation::Run, args),
            Commands::Test { args } => build(Operation::Test, args),
            Commands::BuildMain { args } => build(Operation::BuildMain, args),
            Commands::Init { force } => Action::Init { force },
            Commands::Which { tool } => Action::Which {
                tool: tool.parse().map_err(anyhow::Error::msg)?,
            },
            Commands::Platform(words) => {
                let mut words = words.into_iter();
                let (Some(platform), Some(command)) = (words.next(), words.next()) else {
                    bail!("usage: gd [platform] <build|run|test|build-main> [args...]");
                };
                Action::Build {
                    target_os: Some(platform.parse().map_err(anyhow::Error::msg)?),
                    operation: command.parse().map_err(anyhow::Error::msg)?,
                    args: words.collect(),
                }
            }
        };
        Ok(action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Action> {
        let cli = Cli::try_parse_from(std::iter::once("gd").chain(args.iter().copied()))?;
        cli.command.into_action()
    }

    #[test]
    fn test_plain_command_passes_args() {
        assert_eq!(
            parse(&["build", "-tags", "debug", "./cmd"]).unwrap(),
            Action::Build {
                target_os: None,
                operation: Operation::Build,
                args: vec!["-tags".into(), "debug".into(), "./cmd".into()],
            }
        );
    }

    #[test]
    fn test_platform_prefix() {
        assert_eq!(
            parse(&["android", "run"]).unwrap(),
            Action::Build {
                target_os: Some(Os::Android),
                operation: Operation::Run,
                args: vec![],
            }
        );
        assert_eq!(
            parse(&["browser", "build-main", "-race"]).unwrap(),
            Action::Build {
                target_os: Some(Os::Js),
                operation: Operation::BuildMain,
                args: vec!["-race".into()],
            }
        );
        assert!(matches!(
            parse(&["macos", "test"]).unwrap(),
            Action::Build { target_os: Some(Os::Darwin), .. }
        ));
    }

    #[test]
    fn test_platform_errors() {
        assert!(parse(&["plan9", "build"]).is_err());
        assert!(parse(&["linux", "deploy"]).is_err());
        assert!(parse(&["linux"]).is_err());
    }

    #[test]
    fn test_init_and_which() {
        assert_eq!(parse(&["init", "--force"]).unwrap(), Action::Init { force: true });
        assert_eq!(
            parse(&["which", "godot"]).unwrap(),
            Action::Which { tool: ToolId::Engine }
        );
        assert!(parse(&["which", "cargo"]).is_err());
    }

    #[test]
    fn test_verbose_is_global() {
        let cli = Cli::try_parse_from(["gd", "-v", "linux", "build"]).unwrap();
        assert!(cli.verbose);
    }
}
