//! EPUB data types

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Title used when the package has none
pub const DEFAULT_TITLE: &str = "Untitled";
/// Author used when the package has none
pub const DEFAULT_AUTHOR: &str = "Unknown Author";
/// Language used when the package has none
pub const DEFAULT_LANGUAGE: &str = "en";

/// Book metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BookMetadata {
    pub title: String,
    pub author: String,
    pub language: String,
    pub identifier: Option<String>,
    pub publisher: Option<String>,
    pub description: Option<String>,
    pub cover_href: Option<String>,
}

impl Default for BookMetadata {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            author: DEFAULT_AUTHOR.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
            identifier: None,
            publisher: None,
            description: None,
            cover_href: None,
        }
    }
}

/// Manifest item from the package document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    pub href: String,
    pub media_type: String,
    pub properties: Option<String>,
}

/// Resolved spine item (reading order entry)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SpineEntry {
    /// Manifest id the itemref pointed at
    pub idref: String,
    /// Absolute archive path of the content document
    pub path: String,
    pub media_type: String,
    pub linear: bool,
}

/// Parsed package document
#[derive(Debug, Clone)]
pub struct PackageDescriptor {
    /// Archive path of the package document
    pub package_path: String,
    /// Directory every manifest href is relative to
    pub base_dir: String,
    pub metadata: BookMetadata,
    pub manifest: HashMap<String, ManifestEntry>,
    pub spine: Vec<SpineEntry>,
    /// Non-fatal problems found while resolving the spine
    pub warnings: Vec<String>,
}

/// A content document ready for pagination
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Chapter {
    pub id: String,
    pub title: String,
    /// Sanitised inner HTML of the body
    pub content: String,
    pub source_path: String,
    pub spine_index: usize,
}

/// Result of the full ingestion pipeline
#[derive(Debug, Clone)]
pub struct ParsedBook {
    pub metadata: BookMetadata,
    pub chapters: Vec<Chapter>,
    pub warnings: Vec<String>,
}
