#![allow(dead_code)]

use anyhow::Result;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

pub const PYINSTALLER_DIR: &str = "pyinstaller-6.12.0";

/// A scratch layout for one conversion: base dir, source folder, output
/// folder and dependencies folder.
pub struct Workspace {
    temp_dir: TempDir,
}

impl Workspace {
    pub fn new() -> Result<Self> {
        let workspace = Self {
            temp_dir: TempDir::new()?,
        };
        fs::create_dir_all(workspace.source())?;
        fs::create_dir_all(workspace.deps())?;
        Ok(workspace)
    }

    /// Pretend PyInstaller was installed by an earlier run.
    pub fn with_installed_dependencies(self) -> Result<Self> {
        fs::create_dir_all(self.deps().join(PYINSTALLER_DIR))?;
        Ok(self)
    }

    pub fn with_source_file(self, name: &str, content: &str) -> Result<Self> {
        fs::write(self.source().join(name), content)?;
        Ok(self)
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn source(&self) -> PathBuf {
        self.root().join("source")
    }

    pub fn output(&self) -> PathBuf {
        self.root().join("output")
    }

    pub fn deps(&self) -> PathBuf {
        self.root().join("deps")
    }

    pub fn log_file(&self) -> PathBuf {
        self.root().join("app_converter.log")
    }

    /// `folderpack convert` wired to this workspace, emitting JSON events.
    pub fn convert_command(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_folderpack"));
        cmd.args(["convert", "--format", "json", "--no-prompt"])
            .arg("--source")
            .arg(self.source())
            .arg("--output")
            .arg(self.output())
            .arg("--base-dir")
            .arg(self.root())
            .arg("--deps-dir")
            .arg(self.deps())
            .current_dir(self.root())
            .env_remove("FOLDERPACK_PYINSTALLER_URL")
            .env_remove("FOLDERPACK_PYTHON")
            .env_remove("FOLDERPACK_LOG_FILE");
        cmd
    }

    /// Write a stand-in for `python` that understands `--version` and
    /// `-m PyInstaller ...`, recording its arguments in `args.txt`.
    #[cfg(unix)]
    pub fn fake_python(&self, exit_code: i32) -> Result<PathBuf> {
        use std::os::unix::fs::PermissionsExt;

        let script = format!(
            r##"#!/bin/sh
if [ "$1" = "--version" ]; then
    echo "Python 3.12.0"
    exit 0
fi
printf '%s\n' "$@" > "{args}"
if [ {exit_code} -ne 0 ]; then
    echo "fake PyInstaller failure" >&2
    exit {exit_code}
fi
while [ $# -gt 0 ]; do
    case "$1" in
        --distpath) dist="$2"; shift ;;
        --workpath) work="$2"; shift ;;
        --specpath) spec="$2"; shift ;;
        --name) name="$2"; shift ;;
    esac
    shift
done
mkdir -p "$work/$name"
echo "# generated" > "$spec/$name.spec"
echo "binary" > "$dist/$name"
echo "INFO: Building EXE from EXE-00.toc completed successfully." >&2
exit 0
"##,
            args = self.recorded_args_path().display(),
        );

        let path = self.root().join("fake-python");
        fs::write(&path, script)?;
        let mut perms = fs::metadata(&path)?.permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&path, perms)?;
        Ok(path)
    }

    pub fn recorded_args_path(&self) -> PathBuf {
        self.root().join("args.txt")
    }

    pub fn recorded_args(&self) -> Result<Vec<String>> {
        Ok(fs::read_to_string(self.recorded_args_path())?
            .lines()
            .map(str::to_string)
            .collect())
    }
}

/// Relay events printed by `--format json`, one per stdout line.
pub fn events(output: &Output) -> Vec<Value> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .filter_map(|line| serde_json::from_str(line).ok())
        .collect()
}

pub fn kinds(events: &[Value]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| e["kind"].as_str().map(str::to_string))
        .collect()
}

pub fn progress(events: &[Value]) -> Vec<u64> {
    events
        .iter()
        .filter(|e| e["kind"] == "progress")
        .filter_map(|e| e["payload"].as_u64())
        .collect()
}

pub fn payloads(events: &[Value], kind: &str) -> Vec<String> {
    events
        .iter()
        .filter(|e| e["kind"] == kind)
        .filter_map(|e| e["payload"].as_str().map(str::to_string))
        .collect()
}

pub fn dump(output: &Output) {
    println!("stdout: {}", String::from_utf8_lossy(&output.stdout));
    println!("stderr: {}", String::from_utf8_lossy(&output.stderr));
}
