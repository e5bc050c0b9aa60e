//! Chapter extraction
//!
//! Turns each spine entry into a `Chapter`: sanitised body markup plus a
//! display title. A chapter that cannot be read is logged and skipped.

use thiserror::Error;

use super::archive::RawArchive;
use super::types::{Chapter, PackageDescriptor, SpineEntry};
use super::EpubError;
use crate::html::outline::{self, ElementSpan};
use crate::html::{plain_text, sanitize_html, SanitizeError};

/// Elements that can name a chapter, in document order
const TITLE_ELEMENTS: &[&str] = &["title", "h1", "h2"];

#[derive(Debug, Error)]
enum ChapterSkip {
    #[error(transparent)]
    Read(#[from] EpubError),
    #[error(transparent)]
    Sanitize(#[from] SanitizeError),
}

/// Extract every readable chapter in spine order
pub fn extract_chapters(
    archive: &RawArchive,
    package: &PackageDescriptor,
) -> Result<Vec<Chapter>, EpubError> {
    let mut chapters = Vec::with_capacity(package.spine.len());

    for (index, entry) in package.spine.iter().enumerate() {
        match extract_chapter(archive, entry, index) {
            Ok(chapter) => chapters.push(chapter),
            Err(e) => {
                tracing::warn!(
                    "Skipping spine item {} ({}): {}",
                    index + 1,
                    entry.path,
                    e
                );
            }
        }
    }

    if chapters.is_empty() {
        return Err(EpubError::NoReadableChapters(format!(
            "none of the {} spine items could be read",
            package.spine.len()
        )));
    }

    Ok(chapters)
}

fn extract_chapter(
    archive: &RawArchive,
    entry: &SpineEntry,
    index: usize,
) -> Result<Chapter, ChapterSkip> {
    let document = archive.read_entry(&entry.path)?;
    let spans = outline::parse(&document);

    let title = find_title(&spans, &document).unwrap_or_else(|| format!("Chapter {}", index + 1));

    let body = match outline::find(&spans, "body") {
        Some(body) => body.inner(&document),
        None => document.as_str(),
    };
    let content = sanitize_html(body)?.trim().to_string();

    let id = if entry.idref.is_empty() {
        format!("chapter-{}", index + 1)
    } else {
        entry.idref.clone()
    };

    Ok(Chapter {
        id,
        title,
        content,
        source_path: entry.path.clone(),
        spine_index: index,
    })
}

/// First `title`, `h1` or `h2` in document order with visible text
fn find_title(spans: &[ElementSpan], src: &str) -> Option<String> {
    spans.iter().find_map(|span| {
        if TITLE_ELEMENTS.contains(&span.name.as_str()) {
            let text = plain_text(span.inner(src));
            if !text.is_empty() {
                return Some(text);
            }
        }
        find_title(&span.children, src)
    })
}
