//! Tolerant element outline with byte offsets
//!
//! Uses quick_xml as a SAX-style tokenizer and rebuilds the element tree
//! by hand so that HTML habits (void elements, unclosed tags, stray end
//! tags) do not abort the walk. Every span indexes into the source string.

use quick_xml::events::Event;
use quick_xml::reader::Reader;

/// HTML elements that never have an end tag
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

/// One element and the byte ranges it covers
#[derive(Debug, Clone, PartialEq)]
pub struct ElementSpan {
    /// Lowercased local name
    pub name: String,
    /// Offset of the start tag's `<`
    pub start: usize,
    /// Offset just past the start tag
    pub inner_start: usize,
    /// Offset of the end tag's `<` (equal to `end` when there is none)
    pub inner_end: usize,
    /// Offset just past the end tag
    pub end: usize,
    pub children: Vec<ElementSpan>,
}

impl ElementSpan {
    fn open(name: String, start: usize, inner_start: usize) -> Self {
        Self {
            name,
            start,
            inner_start,
            inner_end: inner_start,
            end: inner_start,
            children: Vec::new(),
        }
    }

    /// Markup between the start and end tags
    pub fn inner<'a>(&self, src: &'a str) -> &'a str {
        &src[self.inner_start..self.inner_end]
    }

    /// Markup including the element's own tags
    pub fn outer<'a>(&self, src: &'a str) -> &'a str {
        &src[self.start..self.end]
    }

    /// Depth-first search for the first element with this name
    pub fn find(&self, name: &str) -> Option<&ElementSpan> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(name))
    }
}

/// Parse the top-level elements of a document or fragment
///
/// Parsing stops quietly at the first hard tokenizer error; whatever was
/// open at that point is closed at the end of the input.
pub fn parse(src: &str) -> Vec<ElementSpan> {
    let mut reader = Reader::from_str(src);
    {
        let config = reader.config_mut();
        config.trim_text(false);
        config.check_end_names = false;
        config.expand_empty_elements = false;
        config.allow_unmatched_ends = true;
    }

    let mut stack: Vec<ElementSpan> = Vec::new();
    let mut roots: Vec<ElementSpan> = Vec::new();

    loop {
        let before = reader.buffer_position() as usize;
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(e) => {
                tracing::debug!("Outline stopped at byte {}: {}", before, e);
                break;
            }
        };
        let after = reader.buffer_position() as usize;

        match event {
            Event::Start(e) => {
                let name = lowercase_name(e.local_name().as_ref());
                let void = VOID_ELEMENTS.contains(&name.as_str());
                let span = ElementSpan::open(name, before, after);
                if void {
                    attach(&mut stack, &mut roots, span);
                } else {
                    stack.push(span);
                }
            }
            Event::Empty(e) => {
                let name = lowercase_name(e.local_name().as_ref());
                attach(&mut stack, &mut roots, ElementSpan::open(name, before, after));
            }
            Event::End(e) => {
                let name = lowercase_name(e.local_name().as_ref());
                // Stray end tags with no matching open element are ignored
                if let Some(pos) = stack.iter().rposition(|s| s.name == name) {
                    while stack.len() > pos + 1 {
                        if let Some(mut unclosed) = stack.pop() {
                            unclosed.inner_end = before;
                            unclosed.end = before;
                            attach(&mut stack, &mut roots, unclosed);
                        }
                    }
                    if let Some(mut span) = stack.pop() {
                        span.inner_end = before;
                        span.end = after;
                        attach(&mut stack, &mut roots, span);
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    while let Some(mut unclosed) = stack.pop() {
        unclosed.inner_end = src.len();
        unclosed.end = src.len();
        attach(&mut stack, &mut roots, unclosed);
    }

    roots
}

/// Find the first element with this name anywhere in the outline
pub fn find<'a>(roots: &'a [ElementSpan], name: &str) -> Option<&'a ElementSpan> {
    roots.iter().find_map(|r| r.find(name))
}

fn attach(stack: &mut [ElementSpan], roots: &mut Vec<ElementSpan>, span: ElementSpan) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(span),
        None => roots.push(span),
    }
}

fn lowercase_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets_cover_markup() {
        let src = r#"<p class="a">Hello <em>you</em></p><p>Two</p>"#;
        let roots = parse(src);

        assert_eq!(roots.len(), 2);
        assert_eq!(roots[0].outer(src), r#"<p class="a">Hello <em>you</em></p>"#);
        assert_eq!(roots[0].inner(src), "Hello <em>you</em>");
        assert_eq!(roots[0].children[0].name, "em");
        assert_eq!(roots[1].outer(src), "<p>Two</p>");
    }

    #[test]
    fn test_void_and_self_closing_elements() {
        let src = "<p>a<br>b<br/>c<img src=\"x.png\"></p>";
        let roots = parse(src);

        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].outer(src), src);
        let names: Vec<&str> = roots[0].children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["br", "br", "img"]);
    }

    #[test]
    fn test_unclosed_elements_are_closed() {
        let src = "<div><p>one<p>two</div><p>tail";
        let roots = parse(src);

        assert_eq!(roots.len(), 2);
        assert_eq!(roots[0].name, "div");
        assert_eq!(roots[0].outer(src), "<div><p>one<p>two</div>");
        assert_eq!(roots[1].outer(src), "<p>tail");
    }

    #[test]
    fn test_find_body() {
        let src = "<?xml version=\"1.0\"?><!DOCTYPE html><html><head><title>T</title></head>\
                   <body class=\"x\"><p>Hi</p></body></html>";
        let roots = parse(src);
        let body = find(&roots, "body").unwrap();
        assert_eq!(body.inner(src), "<p>Hi</p>");
        assert_eq!(find(&roots, "title").unwrap().inner(src), "T");
    }

    #[test]
    fn test_uppercase_tags_are_normalised() {
        let src = "<P>Shout</P>";
        let roots = parse(src);
        assert_eq!(roots[0].name, "p");
        assert_eq!(roots[0].outer(src), src);
    }

    #[test]
    fn test_stray_end_tag_at_top_level() {
        let src = "<p>a</p></div><p>b</p><p>c</p>";
        let roots = parse(src);

        let names: Vec<&str> = roots.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["p", "p", "p"]);
        assert_eq!(roots[2].outer(src), "<p>c</p>");
    }
}
