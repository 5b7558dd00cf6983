use crate::scanner::{DiscoveredTarget, TargetKind};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const TARGET_PLACEHOLDER: &str = "{{TARGET_NAME}}";

/// File name of the generated stub. PyInstaller derives nothing from it
/// because the artifact name is always passed explicitly.
pub const STUB_FILE_NAME: &str = "launcher.py";

/// Embedded launcher templates
pub struct LauncherTemplate {
    pub script: &'static str,
    pub executable: &'static str,
}

impl LauncherTemplate {
    pub fn new() -> Self {
        Self {
            script: include_str!("../template/launch_script.py"),
            executable: include_str!("../template/launch_executable.py"),
        }
    }

    /// Stub source for `target`, with its basename baked in.
    pub fn render(&self, target: &DiscoveredTarget) -> String {
        let template = match target.kind {
            TargetKind::Script => self.script,
            TargetKind::Executable => self.executable,
        };
        template.replace(TARGET_PLACEHOLDER, &python_string_literal(&target.file_name()))
    }

    /// Write the stub for `target` into `dir` and return its path.
    pub fn write_to_dir(&self, target: &DiscoveredTarget, dir: &Path) -> io::Result<PathBuf> {
        let stub_path = dir.join(STUB_FILE_NAME);
        fs::write(&stub_path, self.render(target))?;
        Ok(stub_path)
    }
}

impl Default for LauncherTemplate {
    fn default() -> Self {
        Self::new()
    }
}

fn python_string_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
