//! Environment for Go invocations that target another platform.

use std::path::Path;

use crate::toolchain::{Arch, Os, Platform};

/// Zig `-target` triple for a cgo target, or `None` when the target needs no
/// C cross compiler.
pub fn zig_target(platform: Platform) -> Option<&'static str> {
    let triple = match (platform.os, platform.arch) {
        (Os::Linux, Arch::Amd64) => "x86_64-linux-gnu",
        (Os::Linux, Arch::Arm64) => "aarch64-linux-gnu",
        (Os::Linux, Arch::X86) => "x86-linux-gnu",
        (Os::Windows, Arch::Amd64) => "x86_64-windows-gnu",
        (Os::Windows, Arch::Arm64) => "aarch64-windows-gnu",
        (Os::Windows, Arch::X86) => "x86-windows-gnu",
        (Os::Darwin, Arch::Amd64) => "x86_64-macos",
        (Os::Darwin, Arch::Arm64) => "aarch64-macos",
        (Os::Android, Arch::Arm64) => "aarch64-linux-android",
        (Os::Ios, Arch::Arm64) => "aarch64-ios",
        _ => return None,
    };
    Some(triple)
}

/// Variables for a Go invocation building for `target` on `host`.
///
/// `GOOS`/`GOARCH` are always set. A cgo target built on another platform
/// also gets `CGO_ENABLED=1` and a C compiler: `cc` when the user supplied
/// one, otherwise `<zig> cc -target <triple>`.
pub fn cross_env(
    host: Platform,
    target: Platform,
    cc: Option<&str>,
    zig: Option<&Path>,
) -> Vec<(String, String)> {
    let mut vars = vec![
        ("GOOS".to_string(), target.os.as_str().to_string()),
        ("GOARCH".to_string(), target.arch.as_str().to_string()),
    ];
    if host == target || target.os == Os::Js {
        return vars;
    }

    vars.push(("CGO_ENABLED".to_string(), "1".to_string()));
    let compiler = match (cc, zig, zig_target(target)) {
        (Some(cc), _, _) => Some(cc.to_string()),
        (None, Some(zig), Some(triple)) => {
            Some(format!("{} cc -target {}", zig.display(), triple))
        }
        _ => None,
    };
    if let Some(compiler) = compiler {
        vars.push(("CC".to_string(), compiler));
    }
    vars
}

/// True when building for `target` from `host` needs the zig C compiler.
pub fn needs_zig(host: Platform, target: Platform, cc: Option<&str>) -> bool {
    host != target && cc.is_none() && zig_target(target).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINUX: Platform = Platform::new(Os::Linux, Arch::Amd64);

    fn lookup<'a>(vars: &'a [(String, String)], key: &str) -> Option<&'a str> {
        vars.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_native_build_sets_only_target() {
        let vars = cross_env(LINUX, LINUX, None, None);
        assert_eq!(lookup(&vars, "GOOS"), Some("linux"));
        assert_eq!(lookup(&vars, "GOARCH"), Some("amd64"));
        assert_eq!(lookup(&vars, "CGO_ENABLED"), None);
        assert_eq!(lookup(&vars, "CC"), None);
    }

    #[test]
    fn test_cross_build_uses_zig() {
        let windows = Platform::new(Os::Windows, Arch::Amd64);
        let vars = cross_env(LINUX, windows, None, Some(Path::new("/gd/bin/zig-0.13.0")));
        assert_eq!(lookup(&vars, "GOOS"), Some("windows"));
        assert_eq!(lookup(&vars, "CGO_ENABLED"), Some("1"));
        assert_eq!(
            lookup(&vars, "CC"),
            Some("/gd/bin/zig-0.13.0 cc -target x86_64-windows-gnu")
        );
    }

    #[test]
    fn test_user_cc_wins() {
        let android = Platform::new(Os::Android, Arch::Arm64);
        let vars = cross_env(LINUX, android, Some("clang"), Some(Path::new("/zig")));
        assert_eq!(lookup(&vars, "CC"), Some("clang"));
        assert!(!needs_zig(LINUX, android, Some("clang")));
        assert!(needs_zig(LINUX, android, None));
    }

    #[test]
    fn test_web_needs_no_c_compiler() {
        let web = Platform::new(Os::Js, Arch::Wasm);
        let vars = cross_env(LINUX, web, None, None);
        assert_eq!(lookup(&vars, "GOOS"), Some("js"));
        assert_eq!(lookup(&vars, "GOARCH"), Some("wasm"));
        assert_eq!(lookup(&vars, "CGO_ENABLED"), None);
        assert!(!needs_zig(LINUX, web, None));
    }

    #[test]
    fn test_zig_targets() {
        assert_eq!(
            zig_target(Platform::new(Os::Darwin, Arch::Arm64)),
            Some("aarch64-macos")
        );
        assert_eq!(
            zig_target(Platform::new(Os::Android, Arch::Arm64)),
            Some("aarch64-linux-android")
        );
        assert_eq!(zig_target(Platform::new(Os::Darwin, Arch::Universal)), None);
    }
}
