use crate::error::{ConvertError, ConvertResult};
use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};

pub const EXECUTABLE_SUFFIX: &str = ".exe";
pub const SCRIPT_SUFFIX: &str = ".py";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Executable,
    Script,
}

impl std::fmt::Display for TargetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Executable => write!(f, "EXE"),
            Self::Script => write!(f, "Python"),
        }
    }
}

/// The file inside the source folder that the launcher will start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredTarget {
    pub path: PathBuf,
    pub kind: TargetKind,
}

impl DiscoveredTarget {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn file_stem(&self) -> String {
        self.path
            .file_stem()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "app".to_string())
    }
}

/// Find the entry point of `source_dir`.
///
/// Files are considered in lexicographic order of their names. An executable
/// always wins over a script; among files of the same kind the first one wins
/// and the rest are reported as ignored.
pub fn scan(source_dir: &Path) -> ConvertResult<DiscoveredTarget> {
    if !source_dir.is_dir() {
        return Err(ConvertError::SourceMissing(source_dir.to_path_buf()));
    }

    let mut names: Vec<String> = fs::read_dir(source_dir)
        .map_err(|_| ConvertError::SourceMissing(source_dir.to_path_buf()))?
        .flatten()
        .filter(|entry| entry.path().is_file())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .collect();
    names.sort();
    debug!("Source directory entries: {names:?}");

    let executables: Vec<&String> = names
        .iter()
        .filter(|n| n.ends_with(EXECUTABLE_SUFFIX))
        .collect();
    let scripts: Vec<&String> = names.iter().filter(|n| n.ends_with(SCRIPT_SUFFIX)).collect();

    let (chosen, kind, ignored) = match (executables.split_first(), scripts.split_first()) {
        (Some((first, rest)), _) => {
            let mut ignored: Vec<&String> = rest.to_vec();
            ignored.extend(scripts.iter().copied());
            (*first, TargetKind::Executable, ignored)
        }
        (None, Some((first, rest))) => (*first, TargetKind::Script, rest.to_vec()),
        (None, None) => return Err(ConvertError::NotFound(source_dir.to_path_buf())),
    };

    if !ignored.is_empty() {
        warn!("Multiple candidates in {}; using {chosen}, ignoring {ignored:?}", source_dir.display());
    }

    Ok(DiscoveredTarget {
        path: source_dir.join(chosen),
        kind,
    })
}
