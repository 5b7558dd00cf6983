use std::path::PathBuf;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Everything that can abort a conversion.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("Please select source and output folders")]
    MissingPaths,

    #[error("Source folder does not exist: {}", .0.display())]
    SourceMissing(PathBuf),

    #[error("No EXE or Python files found in source folder")]
    NotFound(PathBuf),

    #[error("Could not create output directory {}: {source}", path.display())]
    OutputDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to install {name}: {source}")]
    Provision {
        name: String,
        #[source]
        source: BoxError,
    },

    #[error("Failed to create launcher script {}: {source}", path.display())]
    Stub {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("PyInstaller failed: {0}")]
    Bundler(String),
}

/// Coarse classification used when reporting a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Provision,
    Bundler,
    Io,
}

impl ConvertError {
    pub fn provision(name: &str, err: anyhow::Error) -> Self {
        ConvertError::Provision {
            name: name.to_string(),
            source: err.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ConvertError::MissingPaths
            | ConvertError::SourceMissing(_)
            | ConvertError::NotFound(_)
            | ConvertError::OutputDirectory { .. } => ErrorKind::Validation,
            ConvertError::Provision { .. } => ErrorKind::Provision,
            ConvertError::Bundler(_) => ErrorKind::Bundler,
            ConvertError::Stub { .. } => ErrorKind::Io,
        }
    }
}

pub type ConvertResult<T> = std::result::Result<T, ConvertError>;
