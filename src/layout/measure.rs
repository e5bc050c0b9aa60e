//! Measurement surfaces
//!
//! Pagination asks a surface how tall a piece of markup renders at the
//! current typography. A real layout engine can sit behind `Measurer`; the
//! built-in `GlyphMetrics` estimates heights from average glyph widths.

use super::config::SurfaceStyle;
use super::LayoutError;
use crate::html::{decompose, plain_text, Block, BlockKind};

/// Factory for measurement surfaces
pub trait Measurer: Send + Sync {
    /// Open a surface for one pagination run
    ///
    /// The surface is released when the returned box is dropped.
    fn open_surface(&self, style: &SurfaceStyle) -> Result<Box<dyn MeasureSurface>, LayoutError>;
}

/// A surface configured with fixed typography
pub trait MeasureSurface {
    /// Rendered height of `html` in px
    fn measure(&mut self, html: &str) -> f32;
}

/// Vertical space between blocks, in ems of the block's font
const BLOCK_SPACING_EM: f32 = 1.0;
/// Height reserved for each image
const IMAGE_ALLOWANCE: f32 = 240.0;
/// Indent of quotes and list items, in ems
const INDENT_EM: f32 = 2.0;

/// Deterministic glyph-metrics estimator
///
/// Approximates a layout engine: average glyph width per font family class,
/// greedy word wrap, line count times line height, heading scale factors,
/// per-block spacing and a fixed allowance per image. Good enough to give
/// stable page counts that respond to every layout setting.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlyphMetrics;

impl Measurer for GlyphMetrics {
    fn open_surface(&self, style: &SurfaceStyle) -> Result<Box<dyn MeasureSurface>, LayoutError> {
        if !(style.width > 0.0 && style.font_size > 0.0 && style.line_height > 0.0) {
            return Err(LayoutError::SurfaceUnavailable(format!(
                "degenerate surface {}px wide at {}px/{}",
                style.width, style.font_size, style.line_height
            )));
        }

        Ok(Box::new(GlyphSurface {
            glyph_ratio: glyph_ratio(&style.font_family),
            style: style.clone(),
        }))
    }
}

struct GlyphSurface {
    style: SurfaceStyle,
    glyph_ratio: f32,
}

impl MeasureSurface for GlyphSurface {
    fn measure(&mut self, html: &str) -> f32 {
        decompose(html)
            .iter()
            .map(|block| self.block_height(block))
            .sum()
    }
}

impl GlyphSurface {
    fn block_height(&self, block: &Block) -> f32 {
        let font = self.style.font_size * heading_scale(block.kind);
        let line = font * self.style.line_height;

        let indent = match block.kind {
            BlockKind::Blockquote | BlockKind::ListItem => font * INDENT_EM,
            _ => 0.0,
        };
        let width = (self.style.width - indent).max(font);
        let chars_per_line = ((width / (font * self.glyph_ratio)).floor() as usize).max(1);

        let lines = if block.kind == BlockKind::Preformatted {
            // Preformatted text keeps its own line breaks
            block
                .markup
                .lines()
                .map(|l| wrapped_lines(&plain_text(l), chars_per_line).max(1))
                .sum()
        } else {
            wrapped_lines(&plain_text(block.markup), chars_per_line)
        };
        let images = count_images(block.markup);
        let rules = block.markup.matches("<hr").count();

        if lines == 0 && images == 0 && rules == 0 {
            return 0.0;
        }

        let spacing = if block.kind == BlockKind::Loose {
            0.0
        } else {
            font * BLOCK_SPACING_EM
        };

        (lines + rules) as f32 * line + images as f32 * IMAGE_ALLOWANCE + spacing
    }
}

/// Average glyph width as a fraction of the font size
fn glyph_ratio(family: &str) -> f32 {
    let family = family.to_lowercase();
    if family.contains("mono") || family.contains("courier") {
        0.6
    } else if family.contains("sans") || family.contains("arial") || family.contains("helvetica") {
        0.52
    } else {
        0.5
    }
}

fn heading_scale(kind: BlockKind) -> f32 {
    match kind {
        BlockKind::Heading(1) => 2.0,
        BlockKind::Heading(2) => 1.5,
        BlockKind::Heading(3) => 1.17,
        BlockKind::Heading(5) => 0.83,
        BlockKind::Heading(6) => 0.67,
        _ => 1.0,
    }
}

/// Lines needed to wrap `text` greedily at `width` characters
fn wrapped_lines(text: &str, width: usize) -> usize {
    let mut lines = 0;
    let mut current = 0;

    for word in text.split_whitespace() {
        let len = word.chars().count();
        if len > width {
            // Overlong words break across lines
            if current > 0 {
                lines += 1;
            }
            lines += len / width;
            current = len % width;
            continue;
        }
        if current == 0 {
            current = len;
        } else if current + 1 + len <= width {
            current += 1 + len;
        } else {
            lines += 1;
            current = len;
        }
    }

    if current > 0 {
        lines += 1;
    }
    lines
}

fn count_images(markup: &str) -> usize {
    let lower = markup.to_lowercase();
    lower.matches("<img").count() + lower.matches("<svg").count()
}
