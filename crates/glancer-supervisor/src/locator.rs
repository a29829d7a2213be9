//! Locating the Ollama executable.
//!
//! Search order is fixed: next to the running executable (packaged bundle),
//! then `bin/` under the install directory (development checkout), then the
//! system `PATH` only when explicitly allowed. Bundled binaries are trusted
//! over ambient system state, since an attacker-controlled `PATH` could
//! substitute a different program.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::debug;

/// Platform file name of the Ollama executable.
pub fn binary_name() -> &'static str {
    if cfg!(target_os = "windows") {
        "ollama.exe"
    } else {
        "ollama"
    }
}

/// Default install directory: the workspace root of the checkout this crate
/// was compiled from.
///
/// The path is fixed at build time, so for a binary installed elsewhere it
/// points at a directory that may no longer exist. Packaged deployments rely
/// on the directory next to the executable or `GLANCER_INSTALL_DIR` instead.
pub fn default_install_dir() -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    manifest_dir
        .ancestors()
        .nth(2)
        .unwrap_or(manifest_dir)
        .to_path_buf()
}

/// Where a candidate comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentContext {
    /// Shipped alongside the gateway executable.
    Packaged,
    /// `bin/` directory of a development checkout.
    Development,
    /// An entry of the `PATH` environment variable.
    SystemPath,
}

/// A path that may hold the executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutableCandidate {
    pub path: PathBuf,
    pub context: DeploymentContext,
}

impl ExecutableCandidate {
    /// Whether the candidate exists, is a regular file and, on Unix, has an
    /// execute bit set.
    pub fn is_usable(&self) -> bool {
        match self.path.metadata() {
            Ok(metadata) => metadata.is_file() && is_executable(&metadata),
            Err(_) => false,
        }
    }
}

#[cfg(unix)]
fn is_executable(metadata: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_metadata: &std::fs::Metadata) -> bool {
    true
}

/// Ordered search for the Ollama executable.
#[derive(Debug, Clone)]
pub struct ExecutableLocator {
    packaged_dir: Option<PathBuf>,
    install_dir: Option<PathBuf>,
    allow_system_path: bool,
    search_path: Option<OsString>,
    binary_name: String,
}

impl ExecutableLocator {
    /// A locator with no search locations configured.
    pub fn new() -> Self {
        Self {
            packaged_dir: None,
            install_dir: None,
            allow_system_path: false,
            search_path: None,
            binary_name: binary_name().to_string(),
        }
    }

    /// A locator for the running process: the packaged directory is the
    /// parent of the current executable.
    pub fn for_current_exe(install_dir: impl Into<PathBuf>) -> Self {
        let packaged_dir = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf));

        Self {
            packaged_dir,
            install_dir: Some(install_dir.into()),
            ..Self::new()
        }
    }

    pub fn with_packaged_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.packaged_dir = Some(dir.into());
        self
    }

    pub fn with_install_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.install_dir = Some(dir.into());
        self
    }

    /// Also consider `PATH`. Off by default.
    pub fn allow_system_path(mut self, allow: bool) -> Self {
        self.allow_system_path = allow;
        self
    }

    /// Use `path` instead of the `PATH` environment variable.
    pub fn with_search_path(mut self, path: impl Into<OsString>) -> Self {
        self.search_path = Some(path.into());
        self
    }

    pub fn with_binary_name(mut self, name: impl Into<String>) -> Self {
        self.binary_name = name.into();
        self
    }

    /// All candidate paths, highest priority first.
    pub fn candidates(&self) -> Vec<ExecutableCandidate> {
        let mut candidates = Vec::new();

        if let Some(dir) = &self.packaged_dir {
            candidates.push(ExecutableCandidate {
                path: dir.join(&self.binary_name),
                context: DeploymentContext::Packaged,
            });
        }

        if let Some(dir) = &self.install_dir {
            candidates.push(ExecutableCandidate {
                path: dir.join("bin").join(&self.binary_name),
                context: DeploymentContext::Development,
            });
        }

        if self.allow_system_path {
            let search_path = self
                .search_path
                .clone()
                .or_else(|| std::env::var_os("PATH"))
                .unwrap_or_default();
            candidates.extend(std::env::split_paths(&search_path).map(|dir| {
                ExecutableCandidate {
                    path: dir.join(&self.binary_name),
                    context: DeploymentContext::SystemPath,
                }
            }));
        }

        candidates
    }

    /// First usable candidate, if any.
    pub fn locate(&self) -> Option<PathBuf> {
        let found = self.candidates().into_iter().find(|c| c.is_usable())?;
        debug!(
            "Found {:?} ollama executable: {}",
            found.context,
            found.path.display()
        );
        Some(found.path)
    }
}

impl Default for ExecutableLocator {
    fn default() -> Self {
        Self::for_current_exe(default_install_dir())
    }
}
