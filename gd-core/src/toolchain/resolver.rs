//! Locates, and if necessary installs, the tools a build needs.
//!
//! Resolution order, first success wins:
//!
//! 1. the pinned install path (a conventional installation directory, then
//!    the managed `$GDPATH/bin`), accepted when the version matches
//! 2. with `GOTOOLCHAIN=local`/`GDTOOLCHAIN=local`, `PATH` without a version
//!    check, and nothing else
//! 3. `PATH`, accepted when the version matches
//! 4. a download into `$GDPATH`
//!
//! Only the final failure is reported, as a single `NotFound` error carrying
//! the tool's purpose and install hint.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::Settings;

use super::downloader::Downloader;
use super::error::ToolchainError;
use super::extractor::{extract_archive, make_executable};
use super::paths;
use super::runner::{Invocation, ProcessRunner};
use super::template::{expand, Expansion, TemplateVar, TemplateVars};
use super::types::{ArchiveFormat, ResolvedTool, ToolDescriptor};

type Result<T> = std::result::Result<T, ToolchainError>;

/// Resolves [`ToolDescriptor`]s to executables on this machine.
pub struct Resolver {
    settings: Settings,
    runner: Arc<dyn ProcessRunner>,
    downloader: Arc<dyn Downloader>,
}

impl Resolver {
    pub fn new(
        settings: &Settings,
        runner: Arc<dyn ProcessRunner>,
        downloader: Arc<dyn Downloader>,
    ) -> Self {
        Self {
            settings: settings.clone(),
            runner,
            downloader,
        }
    }

    pub fn runner(&self) -> Arc<dyn ProcessRunner> {
        Arc::clone(&self.runner)
    }

    /// Returns the executable for `tool`, installing it if needed.
    ///
    /// The first success is memoised on the descriptor; later calls return
    /// it without touching the filesystem.
    pub async fn lookup(&self, tool: &ToolDescriptor) -> Result<ResolvedTool> {
        if let Some(resolved) = tool.cached() {
            debug!("{} already resolved to {}", tool.name(), resolved.path.display());
            return Ok(resolved.clone());
        }

        let resolved = self.resolve(tool).await?;
        info!("Using {} at {}", tool.name(), resolved.executable().display());
        Ok(tool.remember(resolved).clone())
    }

    async fn resolve(&self, tool: &ToolDescriptor) -> Result<ResolvedTool> {
        let vars = self.template_vars(tool);

        for candidate in self.pinned_candidates(tool, &vars) {
            if self.accepts(tool, &candidate).await {
                return Ok(candidate);
            }
        }

        let on_path = self.find_on_path(tool);

        if self.settings.toolchain_local {
            return match on_path {
                Some(path) => {
                    debug!("Local toolchain mode, accepting {} unchecked", path.display());
                    Ok(ResolvedTool::new(path, None))
                }
                None => Err(self.not_found(
                    tool,
                    "not on PATH and downloads are disabled by GOTOOLCHAIN=local",
                )),
            };
        }

        if let Some(path) = on_path {
            let candidate = ResolvedTool::new(path, None);
            if self.accepts(tool, &candidate).await {
                return Ok(candidate);
            }
        }

        match self.download(tool, &vars).await {
            Ok(resolved) => Ok(resolved),
            Err(e) if e.is_not_found() => Err(e),
            Err(e) => Err(self.not_found(tool, e.to_string())),
        }
    }

    // ========================================================================
    // Candidates
    // ========================================================================

    fn template_vars(&self, tool: &ToolDescriptor) -> TemplateVars {
        let host = self.settings.host;
        let mut vars = TemplateVars::new();
        vars.set(
            TemplateVar::Os,
            tool.get_download_os(host.os).unwrap_or(host.os.as_str()),
        )
        .set(
            TemplateVar::Arch,
            tool.get_download_arch(host.arch).unwrap_or(host.arch.as_str()),
        )
        .set(TemplateVar::Goos, host.os.as_str())
        .set(TemplateVar::Goarch, host.arch.as_str())
        .set(
            TemplateVar::Gdpath,
            self.settings.gdpath.to_string_lossy(),
        );
        if let Some(version) = tool.version_label() {
            vars.set(TemplateVar::Version, version);
        }
        if let Some(home) = &self.settings.home {
            vars.set(TemplateVar::Home, home.to_string_lossy());
        }
        if let Some(ext) = tool.get_download_ext(host.os) {
            vars.set(TemplateVar::Ext, ext);
        }
        vars
    }

    fn located(&self, tool: &ToolDescriptor, path: PathBuf) -> ResolvedTool {
        let bundle = tool.bundle_for(self.settings.host.os).map(PathBuf::from);
        ResolvedTool::new(path, bundle)
    }

    /// Installation directory first, then the managed directory.
    fn pinned_candidates(&self, tool: &ToolDescriptor, vars: &TemplateVars) -> Vec<ResolvedTool> {
        let os = self.settings.host.os;
        let mut candidates = Vec::new();

        if let Some(template) = tool.get_installation(os) {
            match expand(template, vars) {
                Expansion::Resolved(dir) => {
                    let path = PathBuf::from(dir).join(tool.installed_file_name(os));
                    candidates.push(self.located(tool, path));
                }
                Expansion::Unresolved { missing, .. } => {
                    debug!(
                        "Skipping installation dir {} for {}: no value for {:?}",
                        template,
                        tool.name(),
                        missing
                    );
                }
            }
        }

        let managed = paths::bin_dir(&self.settings.gdpath).join(tool.managed_file_name(os));
        candidates.push(self.located(tool, managed));
        candidates
    }

    fn find_on_path(&self, tool: &ToolDescriptor) -> Option<PathBuf> {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        match which::which_in(tool.name(), self.settings.search_path.as_ref(), cwd) {
            Ok(path) => Some(path),
            Err(e) => {
                debug!("{} not on PATH: {}", tool.name(), e);
                None
            }
        }
    }

    /// Runs the candidate's version flag and checks the answer.
    async fn accepts(&self, tool: &ToolDescriptor, candidate: &ResolvedTool) -> bool {
        let executable = candidate.executable();
        if !executable.is_file() {
            return false;
        }
        if tool.get_version().is_none() && tool.get_version_prefix().is_none() {
            return true;
        }

        let invocation = Invocation::new(&executable)
            .arg(tool.get_version_flag())
            .capture();
        match self.runner.run(&invocation).await {
            Ok(output) => {
                let reported = output.reported();
                let ok = tool.matches_version(reported);
                if !ok {
                    debug!(
                        "{} reports {:?}, want {}",
                        executable.display(),
                        reported,
                        tool.get_version().or(tool.get_version_prefix()).unwrap_or_default()
                    );
                }
                ok
            }
            Err(e) => {
                debug!("Version check of {} failed: {}", executable.display(), e);
                false
            }
        }
    }

    // ========================================================================
    // Download
    // ========================================================================

    async fn download(&self, tool: &ToolDescriptor, vars: &TemplateVars) -> Result<ResolvedTool> {
        let host = self.settings.host;
        let template = tool
            .get_download(host)
            .or(tool.get_download_url())
            .ok_or_else(|| self.not_found(tool, format!("no download available for {}", host)))?;
        let url = expand(template, vars).into_result(template)?;

        let gdpath = &self.settings.gdpath;
        paths::ensure_dirs_exist(gdpath)?;
        let bin = paths::bin_dir(gdpath);
        let archive = paths::download_path(gdpath, &url);

        info!("Installing {} from {}", tool.name(), url);
        self.downloader
            .fetch(&url, &archive, tool.get_sha256())
            .await?;

        let final_path = bin.join(tool.managed_file_name(host.os));
        let format = ArchiveFormat::from_url(&url);

        if format.requires_extraction() {
            extract_archive(&archive, &bin, format, tool.get_strip_top_dir())?;

            let extracted = match tool.get_unzip(host.os) {
                Some(template) => bin.join(expand(template, vars).into_result(template)?),
                None => bin.join(tool.installed_file_name(host.os)),
            };
            relocate(&extracted, &final_path).await?;

            if let Err(e) = tokio::fs::remove_file(&archive).await {
                warn!("Failed to clean up archive {}: {}", archive.display(), e);
            }
        } else {
            relocate(&archive, &final_path).await?;
        }

        let resolved = self.located(tool, final_path);
        make_executable(&resolved.executable())?;
        info!("{} installed to {}", tool.name(), resolved.path.display());
        Ok(resolved)
    }

    fn not_found(&self, tool: &ToolDescriptor, reason: impl Into<String>) -> ToolchainError {
        ToolchainError::NotFound {
            name: tool.name().to_string(),
            required_for: tool.get_required_for().to_string(),
            hint: tool.get_download_hint().to_string(),
            reason: reason.into(),
        }
    }
}

/// Moves `from` to `to`, replacing whatever is at `to`.
async fn relocate(from: &Path, to: &Path) -> Result<()> {
    if from == to {
        return Ok(());
    }
    if !from.exists() {
        return Err(ToolchainError::archive(
            from,
            "expected file is missing after extraction",
        ));
    }
    if let Ok(meta) = tokio::fs::symlink_metadata(to).await {
        let removed = if meta.is_dir() {
            tokio::fs::remove_dir_all(to).await
        } else {
            tokio::fs::remove_file(to).await
        };
        removed.map_err(|e| ToolchainError::io(format!("failed to replace {}", to.display()), e))?;
    }
    tokio::fs::rename(from, to).await.map_err(|e| {
        ToolchainError::io(
            format!("failed to move {} to {}", from.display(), to.display()),
            e,
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolchain::downloader::fake::PanickingDownloader;
    use crate::toolchain::downloader::HttpDownloader;
    use crate::toolchain::runner::fake::FakeRunner;
    use crate::toolchain::runner::SystemRunner;
    use std::fs;
    use std::io::Write;
    use tempfile::TempDir;

    fn offline_resolver(settings: &Settings, runner: Arc<FakeRunner>) -> Resolver {
        Resolver::new(settings, runner, Arc::new(PanickingDownloader))
    }

    fn install_managed(settings: &Settings, tool: &ToolDescriptor) -> PathBuf {
        let bin = paths::bin_dir(&settings.gdpath);
        fs::create_dir_all(&bin).unwrap();
        let path = bin.join(tool.managed_file_name(settings.host.os));
        fs::write(&path, b"#!/bin/sh\n").unwrap();
        path
    }

    #[cfg(unix)]
    fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        fs::create_dir_all(dir).unwrap();
        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[tokio::test]
    async fn test_pinned_version_resolves_without_network() {
        let temp_dir = TempDir::new().unwrap();
        let settings = Settings::for_tests(temp_dir.path());
        let tool = ToolDescriptor::new("stub").version("1.2.3");
        let installed = install_managed(&settings, &tool);

        let runner = Arc::new(FakeRunner::new());
        runner.reply("stub-1.2.3", "1.2.3\n");

        let resolved = offline_resolver(&settings, runner.clone())
            .lookup(&tool)
            .await
            .unwrap();

        assert_eq!(resolved.path, installed);
        assert_eq!(runner.command_lines(), vec!["stub-1.2.3 --version"]);
    }

    #[tokio::test]
    async fn test_lookup_is_memoised() {
        let temp_dir = TempDir::new().unwrap();
        let settings = Settings::for_tests(temp_dir.path());
        let tool = ToolDescriptor::new("stub").version("1.2.3");
        let installed = install_managed(&settings, &tool);

        let runner = Arc::new(FakeRunner::new());
        runner.reply("stub-1.2.3", "1.2.3");
        let resolver = offline_resolver(&settings, runner.clone());

        let first = resolver.lookup(&tool).await.unwrap();
        fs::remove_file(&installed).unwrap();
        let second = resolver.lookup(&tool).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(runner.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_installation_dir_is_checked_first() {
        let temp_dir = TempDir::new().unwrap();
        let settings = Settings::for_tests(temp_dir.path());
        let os = settings.host.os;
        let tool = ToolDescriptor::new("adb").installation(os, "$(HOME)/Android/Sdk/platform-tools");

        let sdk = temp_dir.path().join("home/Android/Sdk/platform-tools");
        fs::create_dir_all(&sdk).unwrap();
        let adb = sdk.join(tool.installed_file_name(os));
        fs::write(&adb, b"").unwrap();

        let runner = Arc::new(FakeRunner::new());
        let resolved = offline_resolver(&settings, runner.clone())
            .lookup(&tool)
            .await
            .unwrap();

        assert_eq!(resolved.path, adb);
        // No version requirement, so nothing is run.
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_local_mode_failure_names_tool_and_hint() {
        let temp_dir = TempDir::new().unwrap();
        let mut settings = Settings::for_tests(temp_dir.path());
        settings.toolchain_local = true;
        let tool = ToolDescriptor::new("zig")
            .version("0.13.0")
            .download_url("https://ziglang.org/download/$(VERSION)/zig.tar.xz")
            .required_for("cross-compiling")
            .download_hint("install it from https://ziglang.org/download");

        let err = offline_resolver(&settings, Arc::new(FakeRunner::new()))
            .lookup(&tool)
            .await
            .unwrap_err();

        assert!(err.is_not_found());
        let msg = err.to_string();
        assert!(msg.contains("zig"), "{msg}");
        assert!(msg.contains("install it from https://ziglang.org/download"), "{msg}");
        assert!(tool.cached().is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_local_mode_accepts_any_version_on_path() {
        let temp_dir = TempDir::new().unwrap();
        let path_dir = temp_dir.path().join("path");
        let stub = write_script(&path_dir, "stub", "echo 9.9.9");

        let mut settings = Settings::for_tests(temp_dir.path());
        settings.toolchain_local = true;
        settings.search_path = Some(path_dir.into_os_string());
        let tool = ToolDescriptor::new("stub").version("1.2.3");

        let runner = Arc::new(FakeRunner::new());
        let resolved = offline_resolver(&settings, runner.clone())
            .lookup(&tool)
            .await
            .unwrap();

        assert_eq!(resolved.path, stub);
        assert!(runner.calls().is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_path_stub_version_match_and_mismatch() {
        let temp_dir = TempDir::new().unwrap();
        let path_dir = temp_dir.path().join("path");
        let stub = write_script(&path_dir, "stub", "echo 1.2.3");

        let mut settings = Settings::for_tests(temp_dir.path());
        settings.search_path = Some(path_dir.clone().into_os_string());
        let resolver = Resolver::new(&settings, Arc::new(SystemRunner), Arc::new(PanickingDownloader));

        let tool = ToolDescriptor::new("stub").version("1.2.3");
        assert_eq!(resolver.lookup(&tool).await.unwrap().path, stub);

        write_script(&path_dir, "stub", "echo 1.2.4");
        let fresh = ToolDescriptor::new("stub").version("1.2.3");
        let err = resolver.lookup(&fresh).await.unwrap_err();

        assert!(err.is_not_found(), "{err}");
        assert!(err.to_string().contains("no download available"), "{err}");
    }

    #[tokio::test]
    async fn test_unresolved_url_template_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let settings = Settings::for_tests(temp_dir.path());
        let tool = ToolDescriptor::new("tool")
            .download_url("https://example.com/$(NOPE)/tool.zip")
            .download_hint("see example.com");

        let err = offline_resolver(&settings, Arc::new(FakeRunner::new()))
            .lookup(&tool)
            .await
            .unwrap_err();

        let msg = err.to_string();
        assert!(err.is_not_found());
        assert!(msg.contains("$(NOPE)"), "{msg}");
        assert!(msg.ends_with("see example.com"), "{msg}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_download_extracts_and_relocates() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let mut zip_bytes = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut zip_bytes));
            let options = zip::write::SimpleFileOptions::default()
                .compression_method(zip::CompressionMethod::Stored)
                .unix_permissions(0o755);
            zip.start_file("stub-1.0/bin/stub", options).unwrap();
            zip.write_all(b"#!/bin/sh\necho 1.0\n").unwrap();
            zip.start_file("stub-1.0/LICENSE", options).unwrap();
            zip.write_all(b"MIT").unwrap();
            zip.finish().unwrap();
        }

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/stub-1.0.zip"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(zip_bytes))
            .expect(1)
            .mount(&server)
            .await;

        let temp_dir = TempDir::new().unwrap();
        let settings = Settings::for_tests(temp_dir.path());
        let tool = ToolDescriptor::new("stub")
            .version("1.0")
            .download_url(format!("{}/stub-$(VERSION).zip", server.uri()))
            .strip_top_dir()
            .unzip("bin/stub");

        let resolver = Resolver::new(
            &settings,
            Arc::new(FakeRunner::new()),
            Arc::new(HttpDownloader::new()),
        );
        let resolved = resolver.lookup(&tool).await.unwrap();

        let bin = paths::bin_dir(&settings.gdpath);
        assert_eq!(resolved.path, bin.join("stub-1.0"));
        assert_eq!(fs::read(&resolved.path).unwrap(), b"#!/bin/sh\necho 1.0\n");
        assert!(bin.join("LICENSE").exists());
        assert!(!bin.join("bin/stub").exists());
        assert!(!paths::download_path(&settings.gdpath, "stub-1.0.zip").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_download_resumes_partial_raw_binary() {
        use std::os::unix::fs::PermissionsExt;
        use wiremock::matchers::{header, method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/stub"))
            .and(header("range", "bytes=10-"))
            .respond_with(
                ResponseTemplate::new(206)
                    .insert_header("content-range", "bytes 10-19/20")
                    .set_body_bytes(b"echo 2.0\n\n".to_vec()),
            )
            .expect(1)
            .mount(&server)
            .await;

        let temp_dir = TempDir::new().unwrap();
        let settings = Settings::for_tests(temp_dir.path());
        let url = format!("{}/stub", server.uri());
        let partial = paths::download_path(&settings.gdpath, &url);
        fs::create_dir_all(partial.parent().unwrap()).unwrap();
        fs::write(&partial, b"#!/bin/sh\n").unwrap();

        let tool = ToolDescriptor::new("stub").version("2.0").download_url(url);
        let resolver = Resolver::new(
            &settings,
            Arc::new(FakeRunner::new()),
            Arc::new(HttpDownloader::new()),
        );
        let resolved = resolver.lookup(&tool).await.unwrap();

        assert_eq!(fs::read(&resolved.path).unwrap(), b"#!/bin/sh\necho 2.0\n\n");
        let mode = fs::metadata(&resolved.path).unwrap().permissions().mode();
        assert_ne!(mode & 0o111, 0);
        assert!(!partial.exists());
    }

    #[tokio::test]
    async fn test_download_failure_is_reported_as_not_found() {
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let temp_dir = TempDir::new().unwrap();
        let settings = Settings::for_tests(temp_dir.path());
        let tool = ToolDescriptor::new("tool")
            .download_url(format!("{}/tool.zip", server.uri()))
            .required_for("testing");

        let resolver = Resolver::new(
            &settings,
            Arc::new(FakeRunner::new()),
            Arc::new(HttpDownloader::new()),
        );
        let err = resolver.lookup(&tool).await.unwrap_err();

        assert!(err.is_not_found());
        let msg = err.to_string();
        assert!(msg.starts_with("tool is required for testing"), "{msg}");
        assert!(msg.contains("404"), "{msg}");
    }
}
