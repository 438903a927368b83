//! Project layout and the generated engine project scaffold.
//!
//! A gd project is a Go module with two directories managed by gd:
//!
//! - `graphics/`: an engine-editor project that loads the Go library as a
//!   GDExtension. Its template files are written once and never overwritten
//!   unless forced.
//! - `releases/<os>/<arch>/`: exported builds.

use anyhow::{Context, Result};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::EngineFlavor;
use crate::toolchain::{Arch, Os, Platform};

/// C symbol the engine calls to initialise the Go library.
pub const ENTRY_SYMBOL: &str = "cgo_extension_init";

/// Targets with an export preset in the scaffold.
pub const EXPORT_TARGETS: &[Platform] = &[
    Platform::new(Os::Linux, Arch::Amd64),
    Platform::new(Os::Linux, Arch::Arm64),
    Platform::new(Os::Windows, Arch::Amd64),
    Platform::new(Os::Windows, Arch::Arm64),
    Platform::new(Os::Darwin, Arch::Amd64),
    Platform::new(Os::Darwin, Arch::Arm64),
    Platform::new(Os::Darwin, Arch::Universal),
    Platform::new(Os::Android, Arch::Arm64),
    Platform::new(Os::Ios, Arch::Arm64),
    Platform::new(Os::Js, Arch::Wasm),
];

/// A gd project rooted at a Go module directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    root: PathBuf,
    name: String,
}

impl Project {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let name = root
            .file_name()
            .map(|n| sanitize_name(&n.to_string_lossy()))
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "game".to_string());
        Self { root, name }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lowercase identifier derived from the directory name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn graphics_dir(&self) -> PathBuf {
        self.root.join("graphics")
    }

    pub fn releases_dir(&self, platform: Platform) -> PathBuf {
        self.root
            .join("releases")
            .join(platform.os.as_str())
            .join(platform.arch.as_str())
    }

    /// Creates `releases/<os>/<arch>/` if needed.
    pub fn ensure_releases_dir(&self, platform: Platform) -> Result<PathBuf> {
        let dir = self.releases_dir(platform);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        Ok(dir)
    }

    /// Where the Go library for `platform` is built, inside `graphics/`.
    pub fn library_path(&self, platform: Platform) -> PathBuf {
        self.graphics_dir().join(library_file_name(platform))
    }

    /// Output file of an engine export for `platform`.
    pub fn export_path(&self, platform: Platform) -> PathBuf {
        self.releases_dir(platform).join(export_file_name(&self.name, platform))
    }

    /// Standalone executable produced by `build-main`.
    pub fn main_binary_path(&self, platform: Platform) -> PathBuf {
        self.releases_dir(platform)
            .join(format!("{}{}", self.name, platform.os.exe_suffix()))
    }

    /// Android application id.
    pub fn android_package(&self) -> String {
        format!("org.gd.{}", self.name.replace('-', "_"))
    }

    // ========================================================================
    // Scaffold
    // ========================================================================

    /// Writes the `graphics/` template files that are missing.
    ///
    /// With `force`, every template file is rewritten. Returns the files
    /// that were written.
    pub fn scaffold(&self, engine: EngineFlavor, force: bool) -> Result<Vec<PathBuf>> {
        let dir = self.graphics_dir();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;

        let files = [
            ("project.godot", project_godot(&self.name, engine)),
            ("library.gdextension", library_gdextension()),
            ("export_presets.cfg", export_presets(self)),
            (".gitignore", GITIGNORE.to_string()),
        ];

        let mut written = Vec::new();
        for (file_name, contents) in files {
            let path = dir.join(file_name);
            if path.exists() && !force {
                debug!("Keeping existing {}", path.display());
                continue;
            }
            std::fs::write(&path, contents)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            written.push(path);
        }

        if !written.is_empty() {
            info!("Wrote {} scaffold file(s) to {}", written.len(), dir.display());
        }
        Ok(written)
    }
}

fn sanitize_name(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// `<os>_<arch>.<ext>` for the Go library on `platform`.
pub fn library_file_name(platform: Platform) -> String {
    let ext = match platform.os {
        Os::Windows => "dll",
        Os::Darwin => "dylib",
        Os::Ios => "a",
        Os::Js => "wasm",
        Os::Linux | Os::Android => "so",
    };
    format!("{}_{}.{}", platform.os, platform.arch, ext)
}

fn export_file_name(name: &str, platform: Platform) -> String {
    match platform.os {
        Os::Linux => name.to_string(),
        Os::Windows => format!("{}.exe", name),
        Os::Darwin => format!("{}.zip", name),
        Os::Android => format!("{}.apk", name),
        Os::Ios => format!("{}.ipa", name),
        Os::Js => "index.html".to_string(),
    }
}

/// Name of the export preset for `platform` in `export_presets.cfg`.
pub fn export_preset(platform: Platform) -> String {
    platform.to_string()
}

/// Engine platform name and feature tag suffix for an export preset.
fn engine_platform(platform: Platform) -> (&'static str, &'static str) {
    let os = match platform.os {
        Os::Linux => "Linux",
        Os::Windows => "Windows Desktop",
        Os::Darwin => "macOS",
        Os::Android => "Android",
        Os::Ios => "iOS",
        Os::Js => "Web",
    };
    let arch = match platform.arch {
        Arch::Amd64 => "x86_64",
        Arch::Arm64 => "arm64",
        Arch::X86 => "x86_32",
        Arch::Wasm => "wasm32",
        Arch::Universal => "universal",
    };
    (os, arch)
}

/// Feature tag the engine uses for `platform` in `[libraries]`.
fn feature_tag(platform: Platform) -> String {
    let os = match platform.os {
        Os::Darwin => "macos",
        Os::Js => "web",
        other => other.as_str(),
    };
    match platform.arch {
        Arch::Universal => os.to_string(),
        _ => format!("{}.{}", os, engine_platform(platform).1),
    }
}

// ============================================================================
// Templates
// ============================================================================

const GITIGNORE: &str = "\
# Engine cache and generated imports
.godot/
.import/

# Go libraries built by gd
*.so
*.dll
*.dylib
*.a
*.h
*.wasm
";

fn project_godot(name: &str, engine: EngineFlavor) -> String {
    format!(
        "; {engine} project generated by gd. gd never overwrites this file.\n\
         \n\
         config_version=5\n\
         \n\
         [application]\n\
         \n\
         config/name=\"{name}\"\n\
         \n\
         [rendering]\n\
         \n\
         renderer/rendering_method=\"gl_compatibility\"\n\
         renderer/rendering_method.mobile=\"gl_compatibility\"\n"
    )
}

fn library_gdextension() -> String {
    let mut out = format!(
        "[configuration]\n\
         \n\
         entry_symbol = \"{}\"\n\
         compatibility_minimum = 4.2\n\
         reloadable = false\n\
         \n\
         [libraries]\n\
         \n",
        ENTRY_SYMBOL
    );
    for platform in EXPORT_TARGETS {
        let _ = writeln!(
            out,
            "{} = \"res://{}\"",
            feature_tag(*platform),
            library_file_name(*platform)
        );
    }
    out
}

fn export_presets(project: &Project) -> String {
    let mut out = String::new();
    for (index, platform) in EXPORT_TARGETS.iter().enumerate() {
        let (engine_os, engine_arch) = engine_platform(*platform);
        let export_path = format!(
            "../releases/{}/{}/{}",
            platform.os,
            platform.arch,
            export_file_name(project.name(), *platform)
        );

        let _ = write!(
            out,
            "[preset.{index}]\n\
             \n\
             name=\"{name}\"\n\
             platform=\"{engine_os}\"\n\
             runnable=true\n\
             export_filter=\"all_resources\"\n\
             include_filter=\"\"\n\
             exclude_filter=\"\"\n\
             export_path=\"{export_path}\"\n\
             \n\
             [preset.{index}.options]\n\
             \n",
            name = export_preset(*platform),
        );

        match platform.os {
            Os::Android => {
                let _ = write!(
                    out,
                    "gradle_build/use_gradle_build=false\n\
                     architectures/armeabi-v7a=false\n\
                     architectures/arm64-v8a=true\n\
                     architectures/x86=false\n\
                     architectures/x86_64=false\n\
                     package/unique_name=\"{}\"\n",
                    project.android_package()
                );
            }
            Os::Ios => {
                let _ = writeln!(
                    out,
                    "application/bundle_identifier=\"{}\"",
                    project.android_package()
                );
            }
            Os::Js => {
                out.push_str("variant/extensions_support=true\n");
                out.push_str("progressive_web_app/ensure_cross_origin_isolation_headers=true\n");
            }
            _ => {
                let _ = writeln!(out, "binary_format/architecture=\"{}\"", engine_arch);
            }
        }
        out.push('\n');
    }
    out
}
