use std::path::PathBuf;

use aquaguard_core::LeakError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("{file}: missing column {column}")]
    MissingColumn { file: String, column: String },

    #[error("{file}:{line}: {message}")]
    Parse {
        file: String,
        line: usize,
        message: String,
    },

    #[error("{file}:{line}: invalid timestamp {raw:?}")]
    Timestamp {
        file: String,
        line: usize,
        raw: String,
    },

    #[error("Time index mismatch: {0}")]
    IndexMismatch(String),

    #[error(transparent)]
    Series(#[from] LeakError),
}

impl IngestError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn parse(file: &str, line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            file: file.to_string(),
            line,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;
