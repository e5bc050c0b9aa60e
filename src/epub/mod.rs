//! EPUB ingestion
//!
//! Archive -> container -> package document -> chapters. Everything here is
//! synchronous; the session runs it on a blocking thread.

pub mod archive;
pub mod chapters;
pub mod package;
pub mod types;

use thiserror::Error;

pub use archive::RawArchive;
pub use chapters::extract_chapters;
pub use package::{resolve_container, resolve_package};
pub use types::*;

/// Errors raised while reading an EPUB
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EpubError {
    #[error("Archive is corrupt: {0}")]
    ArchiveCorrupt(String),

    #[error("Entry not found: {0}")]
    EntryNotFound(String),

    #[error("Invalid container: {0}")]
    InvalidContainer(String),

    #[error("Invalid package: {0}")]
    InvalidPackage(String),

    #[error("No readable chapters: {0}")]
    NoReadableChapters(String),
}

impl EpubError {
    pub fn kind(&self) -> &'static str {
        match self {
            EpubError::ArchiveCorrupt(_) => "archive_corrupt",
            EpubError::EntryNotFound(_) => "entry_not_found",
            EpubError::InvalidContainer(_) => "invalid_container",
            EpubError::InvalidPackage(_) => "invalid_package",
            EpubError::NoReadableChapters(_) => "no_readable_chapters",
        }
    }
}

/// Run the full ingestion pipeline over raw EPUB bytes
pub fn load_book(bytes: Vec<u8>) -> Result<ParsedBook, EpubError> {
    let archive = RawArchive::open(bytes)?;
    let package_path = resolve_container(&archive)?;
    let package = resolve_package(&archive, &package_path)?;
    let chapters = extract_chapters(&archive, &package)?;

    let mut warnings = package.warnings;
    let skipped = package.spine.len() - chapters.len();
    if skipped > 0 {
        warnings.push(format!("{} spine items could not be read", skipped));
    }

    tracing::info!(
        "Loaded \"{}\" by {}: {} chapters",
        package.metadata.title,
        package.metadata.author,
        chapters.len()
    );

    Ok(ParsedBook {
        metadata: package.metadata,
        chapters,
        warnings,
    })
}
