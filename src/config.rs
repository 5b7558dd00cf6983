use crate::platform::Platform;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub const PYINSTALLER_VERSION: &str = "6.12.0";
pub const PYINSTALLER_URL: &str = "https://files.pythonhosted.org/packages/99/6e/d7d76d4d15f6351f1f942256633b795eec3d6c691d985869df1bf319cd9d/pyinstaller-6.12.0-py3-none-win_amd64.whl";
pub const DEFAULT_LOG_FILE: &str = "app_converter.log";

/// A tool the converter needs on disk before it can run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyRecord {
    pub name: String,
    pub version: String,
    pub source_url: String,
    pub install_path: PathBuf,
    /// Expected SHA-256 of the downloaded archive, lowercase hex.
    pub sha256: Option<String>,
}

impl DependencyRecord {
    pub fn new(name: &str, version: &str, source_url: &str, deps_dir: &Path) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            source_url: source_url.to_string(),
            install_path: deps_dir.join(format!("{name}-{version}")),
            sha256: None,
        }
    }

    pub fn with_sha256(mut self, digest: Option<String>) -> Self {
        self.sha256 = digest.map(|d| d.trim().to_ascii_lowercase());
        self
    }

    pub fn is_installed(&self) -> bool {
        self.install_path.exists()
    }
}

/// Settings gathered from the command line and environment.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub base_dir: Option<PathBuf>,
    pub deps_dir: Option<PathBuf>,
    pub python: Option<PathBuf>,
    pub pyinstaller_url: Option<String>,
    pub pyinstaller_sha256: Option<String>,
}

/// Explicit context handed to every component instead of process-wide globals.
#[derive(Debug, Clone)]
pub struct AppContext {
    pub platform: Platform,
    pub base_dir: PathBuf,
    pub python: PathBuf,
    pub dependencies: Vec<DependencyRecord>,
}

impl AppContext {
    pub fn resolve(settings: Settings) -> Result<Self> {
        let platform = Platform::current();
        let base_dir = match settings.base_dir {
            Some(dir) => dir,
            None => executable_dir()?,
        };
        let deps_dir = settings
            .deps_dir
            .unwrap_or_else(|| base_dir.join("dependencies"));

        std::fs::create_dir_all(&deps_dir).with_context(|| {
            format!("Failed to create dependencies directory {}", deps_dir.display())
        })?;
        log::debug!("Dependencies directory: {}", deps_dir.display());

        let pyinstaller = pyinstaller_dependency(
            platform,
            settings.pyinstaller_url,
            settings.pyinstaller_sha256,
            &deps_dir,
        );
        if pyinstaller.is_none() {
            log::debug!("No PyInstaller download for {platform:?}, using the interpreter's own");
        }

        Ok(Self {
            platform,
            python: settings
                .python
                .unwrap_or_else(|| PathBuf::from(platform.default_python())),
            base_dir,
            dependencies: pyinstaller.into_iter().collect(),
        })
    }

    pub fn default_source_dir(&self) -> PathBuf {
        self.base_dir.join("source")
    }

    pub fn default_output_dir(&self) -> PathBuf {
        self.base_dir.join("output")
    }

    /// Directories the bundler's interpreter must be able to import from.
    pub fn search_paths(&self) -> Vec<PathBuf> {
        self.dependencies
            .iter()
            .map(|dep| dep.install_path.clone())
            .collect()
    }
}

/// The PyInstaller download for `platform`. Only the Windows wheel is a
/// default; other hosts rely on the interpreter's PyInstaller unless a URL is
/// configured.
fn pyinstaller_dependency(
    platform: Platform,
    url: Option<String>,
    sha256: Option<String>,
    deps_dir: &Path,
) -> Option<DependencyRecord> {
    let url = match (url, platform) {
        (Some(url), _) => url,
        (None, Platform::Windows) => PYINSTALLER_URL.to_string(),
        (None, _) => return None,
    };
    Some(DependencyRecord::new("pyinstaller", PYINSTALLER_VERSION, &url, deps_dir).with_sha256(sha256))
}

fn executable_dir() -> Result<PathBuf> {
    let exe = std::env::current_exe().context("Failed to locate the running executable")?;
    let dir = exe
        .parent()
        .map(Path::to_path_buf)
        .context("Running executable has no parent directory")?;
    log::debug!("Running as executable from {}", dir.display());
    Ok(dir)
}
