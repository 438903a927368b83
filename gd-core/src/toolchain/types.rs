//! Core types for toolchain resolution.
//!
//! This module defines the foundational types used across the toolchain
//! infrastructure: target platforms in Go's vocabulary, archive formats, tool
//! descriptors and resolved tool paths.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::OnceLock;

// ============================================================================
// Operating Systems and Architectures
// ============================================================================

/// Operating system, named the way `GOOS` names it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Os {
    Linux,
    Windows,
    Darwin,
    Android,
    Ios,
    Js,
}

impl Os {
    /// Returns the `GOOS` identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Linux => "linux",
            Self::Windows => "windows",
            Self::Darwin => "darwin",
            Self::Android => "android",
            Self::Ios => "ios",
            Self::Js => "js",
        }
    }

    /// Suffix appended to executables on this OS.
    pub fn exe_suffix(&self) -> &'static str {
        match self {
            Self::Windows => ".exe",
            _ => "",
        }
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Os {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "linux" => Ok(Self::Linux),
            "windows" | "win" => Ok(Self::Windows),
            "darwin" | "macos" | "mac" => Ok(Self::Darwin),
            "android" => Ok(Self::Android),
            "ios" => Ok(Self::Ios),
            "js" | "web" | "wasm" | "browser" => Ok(Self::Js),
            _ => Err(format!("Unknown operating system: {}", s)),
        }
    }
}

/// CPU architecture, named the way `GOARCH` names it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
    Amd64,
    Arm64,
    X86,
    Wasm,
    /// Fat binary combining amd64 and arm64 (darwin only).
    Universal,
}

impl Arch {
    /// Returns the `GOARCH` identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Amd64 => "amd64",
            Self::Arm64 => "arm64",
            Self::X86 => "386",
            Self::Wasm => "wasm",
            Self::Universal => "universal",
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Arch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "amd64" | "x86_64" | "x64" => Ok(Self::Amd64),
            "arm64" | "aarch64" => Ok(Self::Arm64),
            "386" | "x86" | "i386" => Ok(Self::X86),
            "wasm" => Ok(Self::Wasm),
            "universal" => Ok(Self::Universal),
            _ => Err(format!("Unknown architecture: {}", s)),
        }
    }
}

// ============================================================================
// Platform Detection
// ============================================================================

/// An OS/architecture pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Platform {
    pub os: Os,
    pub arch: Arch,
}

impl Platform {
    pub const fn new(os: Os, arch: Arch) -> Self {
        Self { os, arch }
    }

    /// Detects the host platform at compile time.
    ///
    /// Returns `None` if the host is not one `gd` knows how to drive.
    pub fn detect() -> Option<Self> {
        #[cfg(all(target_os = "linux", target_arch = "x86_64"))]
        {
            Some(Platform::new(Os::Linux, Arch::Amd64))
        }
        #[cfg(all(target_os = "linux", target_arch = "aarch64"))]
        {
            Some(Platform::new(Os::Linux, Arch::Arm64))
        }
        #[cfg(all(target_os = "macos", target_arch = "x86_64"))]
        {
            Some(Platform::new(Os::Darwin, Arch::Amd64))
        }
        #[cfg(all(target_os = "macos", target_arch = "aarch64"))]
        {
            Some(Platform::new(Os::Darwin, Arch::Arm64))
        }
        #[cfg(all(target_os = "windows", target_arch = "x86_64"))]
        {
            Some(Platform::new(Os::Windows, Arch::Amd64))
        }
        #[cfg(all(target_os = "windows", target_arch = "aarch64"))]
        {
            Some(Platform::new(Os::Windows, Arch::Arm64))
        }
        #[cfg(not(any(
            all(target_os = "linux", target_arch = "x86_64"),
            all(target_os = "linux", target_arch = "aarch64"),
            all(target_os = "macos", target_arch = "x86_64"),
            all(target_os = "macos", target_arch = "aarch64"),
            all(target_os = "windows", target_arch = "x86_64"),
            all(target_os = "windows", target_arch = "aarch64"),
        )))]
        {
            None
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}

// ============================================================================
// Archive Formats
// ============================================================================

/// Format of a downloaded tool package.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    /// Gzip-compressed tar archive (.tar.gz, .tgz)
    TarGz,
    /// XZ-compressed tar archive (.tar.xz, .txz)
    TarXz,
    /// ZIP archive (.zip)
    Zip,
    /// The download is the executable itself (no extraction)
    Raw,
}

impl ArchiveFormat {
    /// Infers the archive format from a URL or filename.
    ///
    /// Query strings and fragments are ignored.
    pub fn from_url(url: &str) -> Self {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        let lower = path.to_lowercase();
        if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
            Self::TarGz
        } else if lower.ends_with(".tar.xz") || lower.ends_with(".txz") {
            Self::TarXz
        } else if lower.ends_with(".zip") {
            Self::Zip
        } else {
            Self::Raw
        }
    }

    /// Returns true if the format requires extraction.
    pub fn requires_extraction(&self) -> bool {
        !matches!(self, Self::Raw)
    }
}

// ============================================================================
// Tool Descriptor
// ============================================================================

/// Declarative description of one external tool.
///
/// Built with the chained setters below. The name is fixed at construction;
/// the resolved path is memoised inside the descriptor after the first
/// successful lookup and never invalidated.
#[derive(Debug, Default)]
pub struct ToolDescriptor {
    name: String,
    version: Option<String>,
    version_prefix: Option<String>,
    label: Option<String>,
    version_flag: String,
    download_url: Option<String>,
    downloads: HashMap<Os, HashMap<Arch, String>>,
    download_os: HashMap<Os, String>,
    download_arch: HashMap<Arch, String>,
    download_ext: HashMap<Os, String>,
    installations: HashMap<Os, String>,
    unzip: Option<String>,
    unzip_on: HashMap<Os, String>,
    strip_top_dir: bool,
    sha256: Option<String>,
    bundle: Option<String>,
    required_for: String,
    download_hint: String,
    resolved: OnceLock<ResolvedTool>,
}

impl ToolDescriptor {
    /// Creates a descriptor for the executable `name` as found in `PATH`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version_flag: "--version".to_string(),
            ..Default::default()
        }
    }

    /// Requires the version output to equal `version` exactly.
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Requires the version output to start with `prefix`.
    pub fn version_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.version_prefix = Some(prefix.into());
        self
    }

    /// Release name for file names and `$(VERSION)` when only a prefix is
    /// checked.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Argument that makes the tool print its version.
    pub fn version_flag(mut self, flag: impl Into<String>) -> Self {
        self.version_flag = flag.into();
        self
    }

    pub fn download_url(mut self, template: impl Into<String>) -> Self {
        self.download_url = Some(template.into());
        self
    }

    /// Per-platform URL that takes precedence over `download_url`.
    pub fn download(mut self, os: Os, arch: Arch, template: impl Into<String>) -> Self {
        self.downloads
            .entry(os)
            .or_default()
            .insert(arch, template.into());
        self
    }

    /// Spelling of `os` in upstream release file names, for `$(OS)`.
    pub fn download_os(mut self, os: Os, name: impl Into<String>) -> Self {
        self.download_os.insert(os, name.into());
        self
    }

    /// Spelling of `arch` in upstream release file names, for `$(ARCH)`.
    pub fn download_arch(mut self, arch: Arch, name: impl Into<String>) -> Self {
        self.download_arch.insert(arch, name.into());
        self
    }

    /// Archive extension used for `os`, for `$(EXT)`.
    pub fn download_ext(mut self, os: Os, ext: impl Into<String>) -> Self {
        self.download_ext.insert(os, ext.into());
        self
    }

    /// Conventional install directory on `os` (template), checked first.
    pub fn installation(mut self, os: Os, dir: impl Into<String>) -> Self {
        self.installations.insert(os, dir.into());
        self
    }

    /// Path (template) of the binary inside the extracted archive.
    pub fn unzip(mut self, template: impl Into<String>) -> Self {
        self.unzip = Some(template.into());
        self
    }

    /// Per-OS override of [`unzip`](Self::unzip).
    pub fn unzip_on(mut self, os: Os, template: impl Into<String>) -> Self {
        self.unzip_on.insert(os, template.into());
        self
    }

    /// Strip a single bundled top-level directory when extracting.
    pub fn strip_top_dir(mut self) -> Self {
        self.strip_top_dir = true;
        self
    }

    /// Expected SHA-256 of the download (lowercase hex).
    pub fn sha256(mut self, hash: impl Into<String>) -> Self {
        self.sha256 = Some(hash.into());
        self
    }

    /// Relative path of the real executable inside a macOS `.app` bundle.
    pub fn bundle(mut self, executable: impl Into<String>) -> Self {
        self.bundle = Some(executable.into());
        self
    }

    pub fn required_for(mut self, purpose: impl Into<String>) -> Self {
        self.required_for = purpose.into();
        self
    }

    pub fn download_hint(mut self, hint: impl Into<String>) -> Self {
        self.download_hint = hint.into();
        self
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get_version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn get_version_prefix(&self) -> Option<&str> {
        self.version_prefix.as_deref()
    }

    pub fn get_version_flag(&self) -> &str {
        &self.version_flag
    }

    pub fn get_download_url(&self) -> Option<&str> {
        self.download_url.as_deref()
    }

    /// Returns the per-platform URL override, if any.
    pub fn get_download(&self, platform: Platform) -> Option<&str> {
        self.downloads
            .get(&platform.os)
            .and_then(|by_arch| by_arch.get(&platform.arch))
            .map(String::as_str)
    }

    pub fn get_download_os(&self, os: Os) -> Option<&str> {
        self.download_os.get(&os).map(String::as_str)
    }

    pub fn get_download_arch(&self, arch: Arch) -> Option<&str> {
        self.download_arch.get(&arch).map(String::as_str)
    }

    pub fn get_download_ext(&self, os: Os) -> Option<&str> {
        self.download_ext.get(&os).map(String::as_str)
    }

    pub fn get_installation(&self, os: Os) -> Option<&str> {
        self.installations.get(&os).map(String::as_str)
    }

    pub fn get_unzip(&self, os: Os) -> Option<&str> {
        self.unzip_on
            .get(&os)
            .map(String::as_str)
            .or(self.unzip.as_deref())
    }

    pub fn get_strip_top_dir(&self) -> bool {
        self.strip_top_dir
    }

    pub fn get_sha256(&self) -> Option<&str> {
        self.sha256.as_deref()
    }

    pub fn get_required_for(&self) -> &str {
        &self.required_for
    }

    pub fn get_download_hint(&self) -> &str {
        &self.download_hint
    }

    /// Version string used for `$(VERSION)` and managed file names.
    ///
    /// The exact version, else the label. A version prefix is never used.
    pub fn version_label(&self) -> Option<&str> {
        self.version.as_deref().or(self.label.as_deref())
    }

    /// Returns the bundle rule when it applies on `os`.
    pub fn bundle_for(&self, os: Os) -> Option<&str> {
        match os {
            Os::Darwin => self.bundle.as_deref(),
            _ => None,
        }
    }

    /// Checks a tool's self-reported version against this descriptor.
    ///
    /// Exact match wins over prefix match; with neither configured any
    /// version is accepted.
    pub fn matches_version(&self, reported: &str) -> bool {
        let reported = reported.trim();
        if let Some(version) = &self.version {
            return reported == version;
        }
        if let Some(prefix) = &self.version_prefix {
            return reported.starts_with(prefix.as_str());
        }
        true
    }

    /// File name of the tool inside the managed `bin` directory on `os`.
    ///
    /// `<name>[-<version>][.exe]`, or `<name>[-<version>].app` for bundled
    /// tools on macOS.
    pub fn managed_file_name(&self, os: Os) -> String {
        let mut file_name = self.name.clone();
        if let Some(version) = self.version_label() {
            file_name.push('-');
            file_name.push_str(version);
        }
        if self.bundle_for(os).is_some() {
            file_name.push_str(".app");
        } else {
            file_name.push_str(os.exe_suffix());
        }
        file_name
    }

    /// File name of the tool inside a conventional installation directory.
    pub fn installed_file_name(&self, os: Os) -> String {
        if self.bundle_for(os).is_some() {
            format!("{}.app", self.name)
        } else {
            format!("{}{}", self.name, os.exe_suffix())
        }
    }

    /// Returns the memoised resolution, if any.
    pub fn cached(&self) -> Option<&ResolvedTool> {
        self.resolved.get()
    }

    pub(crate) fn remember(&self, resolved: ResolvedTool) -> &ResolvedTool {
        self.resolved.get_or_init(|| resolved)
    }

    /// Marks the descriptor as already resolved to `path` (test fixtures).
    #[cfg(test)]
    pub(crate) fn with_resolved(self, path: impl Into<PathBuf>) -> Self {
        let _ = self.resolved.set(ResolvedTool::new(path, None));
        self
    }
}

// ============================================================================
// Resolved Tool
// ============================================================================

/// A located, usable tool installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTool {
    /// Absolute path of the binary or application bundle.
    pub path: PathBuf,
    /// Executable inside the bundle, relative to `path`.
    pub bundle_executable: Option<PathBuf>,
}

impl ResolvedTool {
    pub fn new(path: impl Into<PathBuf>, bundle_executable: Option<PathBuf>) -> Self {
        Self {
            path: path.into(),
            bundle_executable,
        }
    }

    /// Path to hand to `exec`.
    pub fn executable(&self) -> PathBuf {
        match &self.bundle_executable {
            Some(inner) => self.path.join(inner),
            None => self.path.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_os_from_str_aliases() {
        assert_eq!("linux".parse::<Os>().unwrap(), Os::Linux);
        assert_eq!("macos".parse::<Os>().unwrap(), Os::Darwin);
        assert_eq!("darwin".parse::<Os>().unwrap(), Os::Darwin);
        assert_eq!("browser".parse::<Os>().unwrap(), Os::Js);
        assert_eq!("wasm".parse::<Os>().unwrap(), Os::Js);
        assert_eq!("web".parse::<Os>().unwrap(), Os::Js);
        assert!("plan9".parse::<Os>().is_err());
    }

    #[test]
    fn test_arch_from_str_aliases() {
        assert_eq!("x86_64".parse::<Arch>().unwrap(), Arch::Amd64);
        assert_eq!("aarch64".parse::<Arch>().unwrap(), Arch::Arm64);
        assert_eq!("386".parse::<Arch>().unwrap(), Arch::X86);
        assert_eq!(Arch::X86.as_str(), "386");
    }

    #[test]
    fn test_platform_detect() {
        let platform = Platform::detect();
        #[cfg(all(target_os = "linux", target_arch = "x86_64"))]
        assert_eq!(platform, Some(Platform::new(Os::Linux, Arch::Amd64)));
        #[cfg(target_os = "macos")]
        assert_eq!(platform.map(|p| p.os), Some(Os::Darwin));
        let _ = platform;
    }

    #[test]
    fn test_archive_format_from_url() {
        assert_eq!(
            ArchiveFormat::from_url("https://example.com/tool.tar.gz"),
            ArchiveFormat::TarGz
        );
        assert_eq!(
            ArchiveFormat::from_url("https://example.com/tool.tgz"),
            ArchiveFormat::TarGz
        );
        assert_eq!(
            ArchiveFormat::from_url("https://example.com/tool.tar.xz"),
            ArchiveFormat::TarXz
        );
        assert_eq!(
            ArchiveFormat::from_url("https://example.com/tool.zip?raw=1"),
            ArchiveFormat::Zip
        );
        assert_eq!(
            ArchiveFormat::from_url("https://example.com/tool.exe"),
            ArchiveFormat::Raw
        );
        assert!(!ArchiveFormat::Raw.requires_extraction());
    }

    #[test]
    fn test_matches_version_exact_and_prefix() {
        let exact = ToolDescriptor::new("stub").version("1.2.3");
        assert!(exact.matches_version("1.2.3\n"));
        assert!(!exact.matches_version("1.2.4"));
        assert!(!exact.matches_version("1.2.3-dev"));

        let prefix = ToolDescriptor::new("go").version_prefix("go version go1.");
        assert!(prefix.matches_version("go version go1.23.2 linux/amd64"));
        assert!(!prefix.matches_version("go version go2.0"));

        let any = ToolDescriptor::new("adb");
        assert!(any.matches_version("whatever"));
    }

    #[test]
    fn test_managed_file_name() {
        let zig = ToolDescriptor::new("zig").version("0.13.0");
        assert_eq!(zig.managed_file_name(Os::Linux), "zig-0.13.0");
        assert_eq!(zig.managed_file_name(Os::Windows), "zig-0.13.0.exe");

        let godot = ToolDescriptor::new("godot")
            .version_prefix("4.4.1.stable")
            .label("4.4.1.stable")
            .bundle("Contents/MacOS/Godot");
        assert_eq!(godot.managed_file_name(Os::Darwin), "godot-4.4.1.stable.app");
        assert_eq!(godot.managed_file_name(Os::Linux), "godot-4.4.1.stable");
        assert_eq!(godot.installed_file_name(Os::Darwin), "godot.app");

        let adb = ToolDescriptor::new("adb");
        assert_eq!(adb.managed_file_name(Os::Linux), "adb");
        assert_eq!(adb.installed_file_name(Os::Windows), "adb.exe");

        let go = ToolDescriptor::new("go").version_prefix("go version go1.");
        assert_eq!(go.version_label(), None);
        assert_eq!(go.managed_file_name(Os::Linux), "go");
        assert_eq!(go.managed_file_name(Os::Windows), "go.exe");
    }

    #[test]
    fn test_download_override_lookup() {
        let desc = ToolDescriptor::new("tool")
            .download_url("https://example.com/$(VERSION)")
            .download(Os::Darwin, Arch::Arm64, "https://example.com/mac");
        assert_eq!(
            desc.get_download(Platform::new(Os::Darwin, Arch::Arm64)),
            Some("https://example.com/mac")
        );
        assert_eq!(desc.get_download(Platform::new(Os::Linux, Arch::Arm64)), None);
    }

    #[test]
    fn test_unzip_per_os_override() {
        let desc = ToolDescriptor::new("zig")
            .unzip("zig")
            .unzip_on(Os::Windows, "zig.exe");
        assert_eq!(desc.get_unzip(Os::Linux), Some("zig"));
        assert_eq!(desc.get_unzip(Os::Windows), Some("zig.exe"));
        assert_eq!(ToolDescriptor::new("adb").get_unzip(Os::Linux), None);
    }

    #[test]
    fn test_resolved_tool_bundle_executable() {
        let plain = ResolvedTool::new("/opt/gd/bin/zig-0.13.0", None);
        assert_eq!(plain.executable(), PathBuf::from("/opt/gd/bin/zig-0.13.0"));

        let bundled = ResolvedTool::new(
            "/opt/gd/bin/godot.app",
            Some(PathBuf::from("Contents/MacOS/Godot")),
        );
        assert_eq!(
            bundled.executable(),
            PathBuf::from("/opt/gd/bin/godot.app/Contents/MacOS/Godot")
        );
    }

    #[test]
    fn test_memoised_resolution_is_sticky() {
        let desc = ToolDescriptor::new("stub");
        assert!(desc.cached().is_none());
        desc.remember(ResolvedTool::new("/a", None));
        desc.remember(ResolvedTool::new("/b", None));
        assert_eq!(desc.cached().unwrap().path, PathBuf::from("/a"));
    }
}
