//! Los Libros Reader
//!
//! EPUB ingestion, pagination and reading sessions for the Los Libros
//! reading client.
//!
//! # Modules
//!
//! - `epub`: archive, container, package document and chapter extraction
//! - `html`: chapter markup outline, sanitising and text extraction
//! - `layout`: layout settings, measurement and pagination
//! - `session`: the reading session state machine and its collaborators
//! - `config`: environment configuration

pub mod config;
pub mod epub;
pub mod error;
pub mod html;
pub mod layout;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use config::Config;
pub use epub::{load_book, BookMetadata, Chapter, EpubError, ParsedBook};
pub use error::{ReaderError, Result};
pub use layout::{paginate, GlyphMetrics, LayoutConfig, LayoutError, Measurer, Page, Theme, Viewport};
pub use session::{
    BookRecord, ByteSource, LoadStatus, OpenOutcome, ProgressSink, ProgressSnapshot,
    ReadingSession, SessionEvent, SessionSettings,
};
