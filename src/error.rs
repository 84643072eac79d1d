//! Centralized error types for mbox2pdf.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the mbox2pdf library.
#[derive(Error, Debug)]
pub enum ConvertError {
    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The input archive does not exist.
    #[error("MBOX file not found: {0}")]
    FileNotFound(PathBuf),

    /// The message could not be parsed as a MIME entity.
    #[error("MIME parsing error: {0}")]
    Mime(String),

    /// Building or writing a PDF document failed.
    #[error("Document rendering error: {0}")]
    Render(String),
}

/// Convenience alias for `Result<T, ConvertError>`.
pub type Result<T> = std::result::Result<T, ConvertError>;

impl ConvertError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
