use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors surfaced to callers. Parse failures never appear here: they select
/// the fallback strategy instead.
#[derive(Debug, Error)]
pub enum InstrumentError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to print {path}: {source}")]
    Emit {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to walk {path}: {message}")]
    Walk { path: PathBuf, message: String },

    #[error("invalid config {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("no matching declaration for `{component}` in {path}")]
    NoMatch { path: PathBuf, component: String },
}

impl InstrumentError {
    pub fn read(path: &Path, source: std::io::Error) -> Self {
        InstrumentError::Read { path: path.to_path_buf(), source }
    }

    pub fn write(path: &Path, source: std::io::Error) -> Self {
        InstrumentError::Write { path: path.to_path_buf(), source }
    }

    /// Path of the file the error concerns.
    pub fn path(&self) -> &Path {
        match self {
            InstrumentError::Read { path, .. }
            | InstrumentError::Write { path, .. }
            | InstrumentError::Emit { path, .. }
            | InstrumentError::Walk { path, .. }
            | InstrumentError::Config { path, .. }
            | InstrumentError::NoMatch { path, .. } => path,
        }
    }
}

pub type Result<T, E = InstrumentError> = std::result::Result<T, E>;
