use std::path::PathBuf;
use thiserror::Error;
use xword_core::PuzzleError;

#[derive(Error, Debug)]
pub enum ExternalError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot access {}: {source}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Not a {0} file")]
    FileType(&'static str),

    #[error("Unsupported version: {0}")]
    UnsupportedVersion(String),

    #[error("Malformed file: {0}")]
    Malformed(String),

    #[error("Missing {tag} at line {line}")]
    MissingTag { tag: String, line: usize },

    #[error("Cannot convert puzzle: {0}")]
    Conversion(String),

    #[error("No handler for file type {0:?}")]
    MissingHandler(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Puzzle(#[from] PuzzleError),
}

impl ExternalError {
    pub(crate) fn file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ExternalError::File {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        ExternalError::Malformed(message.into())
    }
}

pub type Result<T> = std::result::Result<T, ExternalError>;
