//! Content sanitising with lol_html
//!
//! Chapters are rendered by a presentation layer that does not execute
//! scripts or honour per-document styling, so both are removed up front.

use std::borrow::Cow;
use std::sync::LazyLock;

use lol_html::{element, rewrite_str, RewriteStrSettings};
use regex::Regex;

/// XHTML self-closing `script`/`style`; an HTML tokenizer reads these as
/// unclosed raw-text elements running to the end of input
static SELF_CLOSING_RAW_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<(script|style)\b([^>]*?)/>").unwrap());

/// Errors during sanitising
#[derive(Debug, thiserror::Error)]
pub enum SanitizeError {
    #[error("HTML rewrite failed: {0}")]
    Rewrite(String),
}

/// Remove non-content elements and script hooks from chapter markup
///
/// Drops `script`, `style`, `meta` and `link` elements, inline event
/// handler attributes and `javascript:` URLs. Everything else passes
/// through byte for byte.
pub fn sanitize_html(html: &str) -> Result<String, SanitizeError> {
    let html = expand_self_closing(html);
    rewrite_str(
        &html,
        RewriteStrSettings {
            element_content_handlers: vec![
                element!("script", |el| {
                    el.remove();
                    Ok(())
                }),
                element!("style", |el| {
                    el.remove();
                    Ok(())
                }),
                element!("meta", |el| {
                    el.remove();
                    Ok(())
                }),
                element!("link", |el| {
                    el.remove();
                    Ok(())
                }),
                element!("*", |el| {
                    let handlers: Vec<String> = el
                        .attributes()
                        .iter()
                        .map(|attr| attr.name())
                        .filter(|name| name.starts_with("on"))
                        .collect();
                    for name in handlers {
                        el.remove_attribute(&name);
                    }

                    for attr in ["href", "src"] {
                        if let Some(value) = el.get_attribute(attr) {
                            if value.trim().to_lowercase().starts_with("javascript:") {
                                el.remove_attribute(attr);
                            }
                        }
                    }
                    Ok(())
                }),
            ],
            ..RewriteStrSettings::default()
        },
    )
    .map_err(|e| SanitizeError::Rewrite(e.to_string()))
}

fn expand_self_closing(html: &str) -> Cow<'_, str> {
    SELF_CLOSING_RAW_TEXT.replace_all(html, "<${1}${2}></${1}>")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_removes_non_content_elements() {
        let html = r#"<style>p { color: red }</style><p>Keep</p><script>alert(1)</script><link rel="stylesheet" href="a.css"/><meta charset="utf-8"/>"#;
        let result = sanitize_html(html).unwrap();

        assert_eq!(result, "<p>Keep</p>");
    }

    #[test]
    fn test_strips_event_handlers_and_js_urls() {
        let html = r#"<a href="javascript:void(0)" onclick="x()">Link</a><img src="a.png" onerror="y()">"#;
        let result = sanitize_html(html).unwrap();

        assert!(!result.contains("onclick"));
        assert!(!result.contains("onerror"));
        assert!(!result.contains("javascript:"));
        assert!(result.contains(r#"src="a.png""#));
        assert!(result.contains("Link"));
    }

    #[test]
    fn test_plain_markup_is_untouched() {
        let html = "<h1>Title</h1><p class=\"x\">Body <em>text</em><br/></p>";
        assert_eq!(sanitize_html(html).unwrap(), html);
    }

    #[test]
    fn test_self_closing_script_keeps_following_content() {
        let html = r#"<script type="text/javascript" src="x.js"/><p>One</p><STYLE media="print" /><p>Two</p>"#;
        assert_eq!(sanitize_html(html).unwrap(), "<p>One</p><p>Two</p>");
    }
}
