use std::env;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Linux,
    Macos,
    Windows,
    Other,
}

impl Platform {
    pub fn current() -> Self {
        match env::consts::OS {
            "linux" => Platform::Linux,
            "macos" => Platform::Macos,
            "windows" => Platform::Windows,
            _ => Platform::Other,
        }
    }

    pub fn is_windows(&self) -> bool {
        matches!(self, Platform::Windows)
    }

    /// Interpreter used to run the bundler when none is configured.
    pub fn default_python(&self) -> &'static str {
        if self.is_windows() {
            "python"
        } else {
            "python3"
        }
    }

    /// Separator between source and destination in a PyInstaller `--add-data` value.
    pub fn data_separator(&self) -> char {
        if self.is_windows() {
            ';'
        } else {
            ':'
        }
    }

    /// File name PyInstaller gives a one-file build called `name`.
    pub fn artifact_file_name(&self, name: &str) -> String {
        if self.is_windows() {
            format!("{name}.exe")
        } else {
            name.to_string()
        }
    }

    pub fn artifact_path(&self, dist_dir: &Path, name: &str) -> PathBuf {
        dist_dir.join(self.artifact_file_name(name))
    }
}
