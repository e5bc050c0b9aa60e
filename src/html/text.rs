//! Plain-text extraction from chapter markup

use std::sync::LazyLock;

use regex::Regex;

static SCRIPT_OR_STYLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|style)\b[^>]*/>|<(script|style)\b[^>]*>.*?</(script|style)\s*>")
        .unwrap()
});
static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());

/// Normalize whitespace in text content
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Visible text of an HTML fragment, entity-decoded and whitespace-collapsed
pub fn plain_text(html: &str) -> String {
    let no_script = SCRIPT_OR_STYLE.replace_all(html, "");
    let no_tags = TAG.replace_all(&no_script, " ");
    let decoded = html_escape::decode_html_entities(&no_tags);
    normalize_text(&decoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text() {
        let html = "<p>Hello&nbsp;<b>bold</b>\n  &amp; <i>brave</i></p><script>var a = 1;</script>";
        assert_eq!(plain_text(html), "Hello bold & brave");
    }

    #[test]
    fn test_numeric_entities() {
        assert_eq!(plain_text("<h1>Caf&#233; &#x2014; Bar</h1>"), "Café — Bar");
    }

    #[test]
    fn test_markup_without_text() {
        assert_eq!(plain_text("<img src=\"a.png\"/><br/>"), "");
    }

    #[test]
    fn test_self_closing_script_hides_nothing() {
        let html = r#"<script src="x.js"/><p>Kept</p><script>drop()</script><p>Too</p>"#;
        assert_eq!(plain_text(html), "Kept Too");
    }
}
