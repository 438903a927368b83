//! Tool catalog with hardcoded descriptors.
//!
//! This module holds the descriptors for every external tool gd drives:
//! the engine editor, the Go and Zig toolchains, and the platform packaging
//! tools.

use crate::config::EngineFlavor;

use super::types::{Arch, Os, ToolDescriptor};

// ============================================================================
// Tool Identifiers
// ============================================================================

/// Every tool gd knows how to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolId {
    Engine,
    Go,
    Zig,
    Adb,
    Apksigner,
    Lipo,
}

impl ToolId {
    pub fn all() -> &'static [ToolId] {
        &[
            Self::Engine,
            Self::Go,
            Self::Zig,
            Self::Adb,
            Self::Apksigner,
            Self::Lipo,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Engine => "engine",
            Self::Go => "go",
            Self::Zig => "zig",
            Self::Adb => "adb",
            Self::Apksigner => "apksigner",
            Self::Lipo => "lipo",
        }
    }
}

impl std::fmt::Display for ToolId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ToolId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "engine" | "godot" | "redot" | "blazium" => Ok(Self::Engine),
            "go" => Ok(Self::Go),
            "zig" => Ok(Self::Zig),
            "adb" => Ok(Self::Adb),
            "apksigner" => Ok(Self::Apksigner),
            "lipo" => Ok(Self::Lipo),
            _ => Err(format!("Unknown tool: {}", s)),
        }
    }
}

/// Returns a fresh descriptor for `id`.
pub fn get_tool_descriptor(id: ToolId, engine: EngineFlavor) -> ToolDescriptor {
    match id {
        ToolId::Engine => engine_descriptor(engine),
        ToolId::Go => go_descriptor(),
        ToolId::Zig => zig_descriptor(),
        ToolId::Adb => adb_descriptor(),
        ToolId::Apksigner => apksigner_descriptor(),
        ToolId::Lipo => lipo_descriptor(),
    }
}

// ============================================================================
// Engine Editors (Godot / Redot / Blazium)
// ============================================================================

/// One upstream engine release.
struct EngineRelease {
    flavor: EngineFlavor,
    /// Prefix of `--version` output, e.g. `4.4.1.stable`.
    version: &'static str,
    /// Release download directory.
    base_url: &'static str,
    /// File name stem shared by every platform build.
    file_stem: &'static str,
    /// macOS app bundle name inside the zip.
    app_name: &'static str,
    /// Executable inside the macOS bundle.
    bundle_executable: &'static str,
}

const GODOT_RELEASE: EngineRelease = EngineRelease {
    flavor: EngineFlavor::Godot,
    version: "4.4.1.stable",
    base_url: "https://github.com/godotengine/godot-builds/releases/download/4.4.1-stable",
    file_stem: "Godot_v4.4.1-stable",
    app_name: "Godot.app",
    bundle_executable: "Contents/MacOS/Godot",
};

const REDOT_RELEASE: EngineRelease = EngineRelease {
    flavor: EngineFlavor::Redot,
    version: "4.3.stable",
    base_url: "https://github.com/Redot-Engine/redot-engine/releases/download/redot-4.3-stable",
    file_stem: "Redot_v4.3-stable",
    app_name: "Redot.app",
    bundle_executable: "Contents/MacOS/Redot",
};

const BLAZIUM_RELEASE: EngineRelease = EngineRelease {
    flavor: EngineFlavor::Blazium,
    version: "0.4.60.stable",
    base_url: "https://github.com/blazium-engine/blazium/releases/download/v0.4.60",
    file_stem: "Blazium_v0.4.60-stable",
    app_name: "Blazium.app",
    bundle_executable: "Contents/MacOS/Blazium",
};

fn engine_release(flavor: EngineFlavor) -> &'static EngineRelease {
    match flavor {
        EngineFlavor::Godot => &GODOT_RELEASE,
        EngineFlavor::Redot => &REDOT_RELEASE,
        EngineFlavor::Blazium => &BLAZIUM_RELEASE,
    }
}

fn engine_descriptor(flavor: EngineFlavor) -> ToolDescriptor {
    let release = engine_release(flavor);
    let stem = release.file_stem;
    let url = |suffix: &str| format!("{}/{}_{}.zip", release.base_url, stem, suffix);

    ToolDescriptor::new(release.flavor.as_str())
        .version_prefix(release.version)
        .label(release.version)
        .download(Os::Linux, Arch::Amd64, url("linux.x86_64"))
        .download(Os::Linux, Arch::Arm64, url("linux.arm64"))
        .download(Os::Windows, Arch::Amd64, url("win64.exe"))
        .download(Os::Darwin, Arch::Amd64, url("macos.universal"))
        .download(Os::Darwin, Arch::Arm64, url("macos.universal"))
        .download_arch(Arch::Amd64, "x86_64")
        .unzip(format!("{}_linux.$(ARCH)", stem))
        .unzip_on(Os::Windows, format!("{}_win64.exe", stem))
        .unzip_on(Os::Darwin, release.app_name)
        .bundle(release.bundle_executable)
        .required_for("exporting and running projects")
        .download_hint(format!(
            "download {} {} from {}",
            release.flavor,
            release.version.trim_end_matches(".stable"),
            release.base_url
        ))
}

// ============================================================================
// Go
// ============================================================================

fn go_descriptor() -> ToolDescriptor {
    ToolDescriptor::new("go")
        .version_prefix("go version go1.")
        .version_flag("version")
        .installation(Os::Linux, "/usr/local/go/bin")
        .installation(Os::Darwin, "/usr/local/go/bin")
        .installation(Os::Windows, "C:\\Program Files\\Go\\bin")
        .required_for("compiling Go code")
        .download_hint("install Go from https://go.dev/dl")
}

// ============================================================================
// Zig (C cross compiler)
// ============================================================================

const ZIG_VERSION: &str = "0.13.0";

fn zig_descriptor() -> ToolDescriptor {
    ToolDescriptor::new("zig")
        .version(ZIG_VERSION)
        .version_flag("version")
        .download_url("https://ziglang.org/download/$(VERSION)/zig-$(OS)-$(ARCH)-$(VERSION).$(EXT)")
        .download_os(Os::Darwin, "macos")
        .download_arch(Arch::Amd64, "x86_64")
        .download_arch(Arch::Arm64, "aarch64")
        .download_arch(Arch::X86, "x86")
        .download_ext(Os::Linux, "tar.xz")
        .download_ext(Os::Darwin, "tar.xz")
        .download_ext(Os::Windows, "zip")
        .strip_top_dir()
        .unzip("zig")
        .unzip_on(Os::Windows, "zig.exe")
        .required_for("cross-compiling")
        .download_hint("install it from https://ziglang.org/download")
}

// ============================================================================
// Android SDK Tools
// ============================================================================

fn adb_descriptor() -> ToolDescriptor {
    ToolDescriptor::new("adb")
        .installation(Os::Linux, "$(HOME)/Android/Sdk/platform-tools")
        .installation(Os::Darwin, "$(HOME)/Library/Android/sdk/platform-tools")
        .installation(Os::Windows, "$(HOME)\\AppData\\Local\\Android\\Sdk\\platform-tools")
        .download_url("https://dl.google.com/android/repository/platform-tools-latest-$(OS).zip")
        .strip_top_dir()
        .unzip("adb")
        .unzip_on(Os::Windows, "adb.exe")
        .required_for("running on Android devices")
        .download_hint(
            "install the Android SDK platform tools from \
             https://developer.android.com/tools/releases/platform-tools",
        )
}

const ANDROID_BUILD_TOOLS: &str = "35.0.0";

fn apksigner_descriptor() -> ToolDescriptor {
    let dir = |sdk: &str| format!("{}/build-tools/{}", sdk, ANDROID_BUILD_TOOLS);
    ToolDescriptor::new("apksigner")
        .installation(Os::Linux, dir("$(HOME)/Android/Sdk"))
        .installation(Os::Darwin, dir("$(HOME)/Library/Android/sdk"))
        .installation(Os::Windows, dir("$(HOME)/AppData/Local/Android/Sdk"))
        .required_for("signing Android packages")
        .download_hint(format!(
            "install Android SDK build-tools {} with sdkmanager \"build-tools;{}\"",
            ANDROID_BUILD_TOOLS, ANDROID_BUILD_TOOLS
        ))
}

// ============================================================================
// Apple Tools
// ============================================================================

fn lipo_descriptor() -> ToolDescriptor {
    ToolDescriptor::new("lipo")
        .installation(Os::Darwin, "/usr/bin")
        .required_for("building universal macOS binaries")
        .download_hint("install the Xcode command line tools with xcode-select --install")
}
