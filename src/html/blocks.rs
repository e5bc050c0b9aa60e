//! Block decomposition for pagination
//!
//! A chapter is split into the block-level elements a page can hold. Generic
//! containers are looked through when they hold further blocks, and any
//! inline content found between blocks is kept as a loose block, so that
//! joining every block's markup never loses visible content.

use super::outline::{self, ElementSpan};
use super::text::plain_text;

/// What kind of block a markup slice is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Paragraph,
    /// Heading level 1-6
    Heading(u8),
    Blockquote,
    Preformatted,
    ListItem,
    /// Tables, figures, rules and containers without nested blocks
    Generic,
    /// Inline content sitting between blocks
    Loose,
}

/// A block-level slice of chapter markup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block<'a> {
    pub kind: BlockKind,
    pub markup: &'a str,
}

enum Role {
    Block(BlockKind),
    Container,
    Inline,
}

fn role(name: &str) -> Role {
    match name {
        "p" => Role::Block(BlockKind::Paragraph),
        "blockquote" => Role::Block(BlockKind::Blockquote),
        "pre" => Role::Block(BlockKind::Preformatted),
        "li" => Role::Block(BlockKind::ListItem),
        "table" | "figure" | "hr" | "dl" | "address" | "center" | "fieldset" | "form" => {
            Role::Block(BlockKind::Generic)
        }
        "div" | "section" | "article" | "aside" | "header" | "footer" | "main" | "nav"
        | "ul" | "ol" | "body" | "html" => Role::Container,
        _ => match heading_level(name) {
            Some(level) => Role::Block(BlockKind::Heading(level)),
            None => Role::Inline,
        },
    }
}

fn heading_level(name: &str) -> Option<u8> {
    name.strip_prefix('h')
        .and_then(|digit| digit.parse::<u8>().ok())
        .filter(|level| (1..=6).contains(level))
}

/// Split chapter markup into blocks in document order
///
/// Markup with no recognisable structure comes back as a single block;
/// whitespace-only markup yields no blocks at all.
pub fn decompose(html: &str) -> Vec<Block<'_>> {
    let roots = outline::parse(html);
    let mut blocks = Vec::new();
    walk(html, &roots, 0, html.len(), &mut blocks);

    if blocks.is_empty() && !html.trim().is_empty() {
        blocks.push(Block {
            kind: BlockKind::Loose,
            markup: html,
        });
    }
    blocks
}

/// Inline content accumulated since the last block
struct Run {
    start: usize,
    has_element: bool,
}

impl Run {
    fn at(start: usize) -> Self {
        Self {
            start,
            has_element: false,
        }
    }

    fn flush<'a>(&self, src: &'a str, end: usize, out: &mut Vec<Block<'a>>) {
        if self.start >= end {
            return;
        }
        let markup = &src[self.start..end];
        if self.has_element || !plain_text(markup).is_empty() {
            out.push(Block {
                kind: BlockKind::Loose,
                markup,
            });
        }
    }
}

fn walk<'a>(src: &'a str, nodes: &[ElementSpan], from: usize, to: usize, out: &mut Vec<Block<'a>>) {
    let mut run = Run::at(from);

    for node in nodes {
        match role(&node.name) {
            Role::Inline => run.has_element = true,
            Role::Block(kind) => {
                run.flush(src, node.start, out);
                out.push(Block {
                    kind,
                    markup: node.outer(src),
                });
                run = Run::at(node.end);
            }
            Role::Container if has_structure(node) => {
                run.flush(src, node.start, out);
                walk(src, &node.children, node.inner_start, node.inner_end, out);
                run = Run::at(node.end);
            }
            Role::Container => {
                run.flush(src, node.start, out);
                out.push(Block {
                    kind: BlockKind::Generic,
                    markup: node.outer(src),
                });
                run = Run::at(node.end);
            }
        }
    }

    run.flush(src, to, out);
}

fn has_structure(node: &ElementSpan) -> bool {
    node.children
        .iter()
        .any(|child| !matches!(role(&child.name), Role::Inline))
}
