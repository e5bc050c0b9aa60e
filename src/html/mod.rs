//! HTML processing for chapter content
//!
//! - `outline`: tolerant element tree with byte offsets
//! - `blocks`: block decomposition used by the paginator
//! - `sanitize`: lol_html removal of non-content elements
//! - `text`: plain-text extraction

pub mod blocks;
pub mod outline;
pub mod sanitize;
pub mod text;

pub use blocks::{decompose, Block, BlockKind};
pub use sanitize::{sanitize_html, SanitizeError};
pub use text::{normalize_text, plain_text};
