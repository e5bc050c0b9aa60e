//! Greedy block-accumulation pagination

use serde::Serialize;

use super::config::{page_height_budget, LayoutConfig, SurfaceStyle, Viewport};
use super::measure::Measurer;
use super::LayoutError;
use crate::epub::Chapter;
use crate::html::decompose;

/// One screenful of chapter content
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    /// Sequence number within one pagination run
    pub id: usize,
    /// Concatenated block markup
    pub content: String,
    pub chapter_id: String,
    /// Index into the chapter list that was paginated
    pub chapter_index: usize,
    pub chapter_title: String,
    /// 1-based ordinal within the chapter
    pub page_in_chapter: usize,
}

/// Split chapters into pages that fit the viewport
///
/// Blocks are appended to the current page until the measured height
/// exceeds the page budget, at which point the page is closed and the
/// block starts the next one. A block that is too tall on its own still
/// gets a page. Chapters with no content produce no pages.
pub fn paginate(
    chapters: &[Chapter],
    layout: &LayoutConfig,
    viewport: &Viewport,
    measurer: &dyn Measurer,
) -> Result<Vec<Page>, LayoutError> {
    let budget = page_height_budget(viewport);
    let style = SurfaceStyle::new(layout, viewport);
    let mut surface = measurer.open_surface(&style)?;

    let mut pages: Vec<Page> = Vec::new();

    for (chapter_index, chapter) in chapters.iter().enumerate() {
        let mut accumulator = String::new();
        let mut ordinal = 1;

        for block in decompose(&chapter.content) {
            let previous_len = accumulator.len();
            accumulator.push_str(block.markup);

            if previous_len > 0 && surface.measure(&accumulator) > budget {
                let overflow = accumulator.split_off(previous_len);
                let content = std::mem::replace(&mut accumulator, overflow);
                pages.push(new_page(pages.len(), content, chapter, chapter_index, ordinal));
                ordinal += 1;
            }
        }

        if !accumulator.is_empty() {
            pages.push(new_page(pages.len(), accumulator, chapter, chapter_index, ordinal));
        }
    }

    tracing::debug!(
        "Paginated {} chapters into {} pages (budget {:.0}px, width {:.0}px)",
        chapters.len(),
        pages.len(),
        budget,
        style.width
    );

    Ok(pages)
}

fn new_page(
    id: usize,
    content: String,
    chapter: &Chapter,
    chapter_index: usize,
    page_in_chapter: usize,
) -> Page {
    Page {
        id,
        content,
        chapter_id: chapter.id.clone(),
        chapter_index,
        chapter_title: chapter.title.clone(),
        page_in_chapter,
    }
}
