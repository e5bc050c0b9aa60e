//! Error types for the Los Libros reader core

use thiserror::Error;

use crate::epub::EpubError;
use crate::layout::LayoutError;

/// Crate-wide result type
pub type Result<T> = std::result::Result<T, ReaderError>;

/// Reader error type
///
/// Everything that can end a load or a layout pass folds into this enum.
/// Per-chapter problems never reach it; they are logged and skipped.
#[derive(Error, Debug)]
pub enum ReaderError {
    #[error(transparent)]
    Epub(#[from] EpubError),

    #[error(transparent)]
    Layout(#[from] LayoutError),

    #[error("Loading timed out after {0} seconds")]
    LoadTimeout(u64),

    #[error("Could not fetch book: {0}")]
    Source(String),

    #[error("No book is open")]
    NoBookOpen,

    #[error("Capability disabled: {0}")]
    CapabilityDisabled(&'static str),

    #[error("Background task failed: {0}")]
    Task(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ReaderError {
    /// Stable machine-readable kind, used in status events and CLI output
    pub fn kind(&self) -> &'static str {
        match self {
            ReaderError::Epub(e) => e.kind(),
            ReaderError::Layout(_) => "layout_failure",
            ReaderError::LoadTimeout(_) => "load_timeout",
            ReaderError::Source(_) => "source_error",
            ReaderError::NoBookOpen => "no_book_open",
            ReaderError::CapabilityDisabled(_) => "capability_disabled",
            ReaderError::Task(_) => "task_error",
            ReaderError::Io(_) => "io_error",
            ReaderError::Json(_) => "json_error",
        }
    }
}

impl From<tokio::task::JoinError> for ReaderError {
    fn from(err: tokio::task::JoinError) -> Self {
        ReaderError::Task(err.to_string())
    }
}
