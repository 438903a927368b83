//! Runtime settings for gd.
//!
//! Settings are read once from the process environment and passed by
//! reference to everything that needs them.

use std::ffi::OsString;
use std::path::PathBuf;
use thiserror::Error;

use crate::toolchain::{Arch, Os, Platform};

/// Default port for the browser dev server.
pub const DEFAULT_PORT: u16 = 8080;

// =============================================================================
// Engine Flavour
// =============================================================================

/// Which Godot-family engine drives the project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EngineFlavor {
    #[default]
    Godot,
    Redot,
    Blazium,
}

impl EngineFlavor {
    /// Get all available flavours.
    pub fn all() -> &'static [EngineFlavor] {
        &[Self::Godot, Self::Redot, Self::Blazium]
    }

    /// Executable name of the editor.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Godot => "godot",
            Self::Redot => "redot",
            Self::Blazium => "blazium",
        }
    }
}

impl std::fmt::Display for EngineFlavor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Godot => write!(f, "Godot"),
            Self::Redot => write!(f, "Redot"),
            Self::Blazium => write!(f, "Blazium"),
        }
    }
}

impl std::str::FromStr for EngineFlavor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "godot" => Ok(Self::Godot),
            "redot" => Ok(Self::Redot),
            "blazium" => Ok(Self::Blazium),
            _ => Err(format!("unknown engine {:?} (expected godot, redot or blazium)", s)),
        }
    }
}

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unsupported host platform; gd runs on linux, windows and darwin (amd64/arm64)")]
    UnsupportedHost,

    #[error("cannot determine the home directory; set HOME or GDPATH")]
    NoHome,

    #[error("invalid {var}={value:?}: {reason}")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: String,
    },
}

// =============================================================================
// Settings
// =============================================================================

/// Environment-derived settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// User home directory (`HOME`).
    pub home: Option<PathBuf>,

    /// Managed tools root (`GDPATH`, default `$HOME/gd`).
    pub gdpath: PathBuf,

    /// Platform gd itself runs on.
    pub host: Platform,

    /// Platform to build for (`GOOS`/`GOARCH`, default host).
    pub target: Platform,

    /// Never download tools (`GOTOOLCHAIN=local` or `GDTOOLCHAIN=local`).
    pub toolchain_local: bool,

    /// Executable search path (`PATH`).
    pub search_path: Option<OsString>,

    /// User-supplied C compiler (`CC`); disables the zig cross compiler.
    pub cc: Option<String>,

    /// Browser dev server port (`PORT`).
    pub port: u16,

    /// Engine flavour (`GDENGINE`).
    pub engine: EngineFlavor,
}

impl Settings {
    /// Reads settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut settings = Self::from_lookup(|key| {
            std::env::var_os(key).and_then(|v| v.into_string().ok())
        })?;
        settings.search_path = std::env::var_os("PATH");
        Ok(settings)
    }

    /// Reads settings through `lookup`, which maps a variable name to its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let host = Platform::detect().ok_or(ConfigError::UnsupportedHost)?;

        let home = var("HOME").map(PathBuf::from).or_else(dirs::home_dir);
        let gdpath = match var("GDPATH") {
            Some(path) => PathBuf::from(path),
            None => home.as_ref().ok_or(ConfigError::NoHome)?.join("gd"),
        };

        let os = match var("GOOS") {
            Some(value) => value.parse::<Os>().map_err(|reason| ConfigError::InvalidValue {
                var: "GOOS",
                value,
                reason,
            })?,
            None => host.os,
        };
        let arch = match var("GOARCH") {
            Some(value) => value.parse::<Arch>().map_err(|reason| ConfigError::InvalidValue {
                var: "GOARCH",
                value,
                reason,
            })?,
            None => default_arch(os, host.arch),
        };

        let toolchain_local = ["GOTOOLCHAIN", "GDTOOLCHAIN"]
            .into_iter()
            .any(|key| var(key).is_some_and(|v| v == "local"));

        let port = match var("PORT") {
            Some(value) => value.parse::<u16>().map_err(|e| ConfigError::InvalidValue {
                var: "PORT",
                value,
                reason: e.to_string(),
            })?,
            None => DEFAULT_PORT,
        };

        let engine = match var("GDENGINE") {
            Some(value) => value
                .parse::<EngineFlavor>()
                .map_err(|reason| ConfigError::InvalidValue {
                    var: "GDENGINE",
                    value,
                    reason,
                })?,
            None => EngineFlavor::default(),
        };

        Ok(Self {
            home,
            gdpath,
            host,
            target: Platform::new(os, arch),
            toolchain_local,
            search_path: var("PATH").map(OsString::from),
            cc: var("CC"),
            port,
            engine,
        })
    }

    /// Returns a copy targeting `os`, with that OS's default architecture
    /// unless `GOARCH` was set for the same OS.
    pub fn with_target_os(&self, os: Os) -> Self {
        let arch = if os == self.target.os {
            self.target.arch
        } else {
            default_arch(os, self.host.arch)
        };
        Self {
            target: Platform::new(os, arch),
            ..self.clone()
        }
    }

    /// True when building for a platform other than the host.
    pub fn is_cross(&self) -> bool {
        self.host != self.target
    }

    /// Settings rooted in a scratch directory, for tests.
    #[cfg(test)]
    pub(crate) fn for_tests(root: &std::path::Path) -> Self {
        let host = Platform::detect().unwrap_or(Platform::new(Os::Linux, Arch::Amd64));
        Self {
            home: Some(root.join("home")),
            gdpath: root.join("gd"),
            host,
            target: host,
            toolchain_local: false,
            search_path: Some(root.join("empty-path").into_os_string()),
            cc: None,
            port: DEFAULT_PORT,
            engine: EngineFlavor::Godot,
        }
    }
}

/// Architecture used for `os` when `GOARCH` is not set.
fn default_arch(os: Os, host_arch: Arch) -> Arch {
    match os {
        Os::Js => Arch::Wasm,
        Os::Android | Os::Ios => Arch::Arm64,
        _ => host_arch,
    }
}
