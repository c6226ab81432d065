//! Text normalization: turns an extracted body into wrapped plain text.

use std::sync::LazyLock;

use html2text::render::text_renderer::TrivialDecorator;
use regex::Regex;

/// Default wrap column for normalized text.
pub const DEFAULT_WRAP_WIDTH: usize = 130;

/// Tags of elements that actually occur in mail HTML. Anything else in angle
/// brackets (`<stop>`, `<name>`) is treated as prose.
static MARKUP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)<(?:!--|!doctype\b|/?(?:html|head|body|meta|title|style|div|span|p|br|hr|a|b|i|u|s|em|strong|small|big|font|center|blockquote|pre|code|h[1-6]|ul|ol|li|dl|dt|dd|table|thead|tbody|tfoot|tr|td|th|img|section|article|header|footer|nav|main|sup|sub)\b[^<>]*>)",
    )
    .unwrap()
});

static IMAGE_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<img\b[^>]*>").unwrap());

static ANY_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());

/// Upper bound on re-rendering when decoded entities still read as markup.
const MAX_RENDER_PASSES: usize = 4;

/// Normalize a raw body into plain text wrapped at `width` columns.
///
/// HTML is rendered without decorations and with images removed; line
/// breaks typed into the source text survive. Input without markup only has
/// trailing whitespace trimmed and over-long lines wrapped. Returns `None`
/// when nothing readable remains.
pub fn normalize(raw: &str, width: usize) -> Option<String> {
    if raw.trim().is_empty() {
        return None;
    }

    let width = width.max(1);
    let text = if looks_like_markup(raw) {
        // Entities such as `&lt;b&gt;` decode to tag-like text. Render until
        // the output no longer reads as HTML so a second pass is a no-op.
        let mut text = render_html(raw, width);
        let mut passes = 1;
        while passes < MAX_RENDER_PASSES && looks_like_markup(&text) {
            text = render_html(&text, width);
            passes += 1;
        }
        collapse_blank_runs(&wrap_plain(&text, width))
    } else {
        wrap_plain(raw, width)
    };

    let text = text.trim_matches('\n');
    if text.trim().is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// Whether the text contains a tag of a known HTML element.
pub fn looks_like_markup(text: &str) -> bool {
    MARKUP.is_match(text)
}

fn render_html(html: &str, width: usize) -> String {
    let without_images = IMAGE_TAG.replace_all(html, "");
    let prepared = preserve_source_newlines(&without_images);
    html2text::from_read_with_decorator(prepared.as_bytes(), width, TrivialDecorator::new())
}

/// Turn newlines inside text content into `<br>` so the renderer keeps them.
/// Whitespace that only separates tags is left alone.
fn preserve_source_newlines(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut last = 0;
    for tag in ANY_TAG.find_iter(html) {
        out.push_str(&break_text_lines(&html[last..tag.start()]));
        out.push_str(tag.as_str());
        last = tag.end();
    }
    out.push_str(&break_text_lines(&html[last..]));
    out
}

fn break_text_lines(text: &str) -> String {
    let body = text.trim();
    if !body.contains('\n') {
        return text.to_string();
    }
    let start = text.len() - text.trim_start().len();
    let end = start + body.len();
    let joined = body.lines().map(str::trim).collect::<Vec<_>>().join("<br>");
    format!("{}{}{}", &text[..start], joined, &text[end..])
}

/// Greedy word wrap for lines longer than `width`.
///
/// Lines that already fit are kept verbatim (minus trailing whitespace).
/// A single word longer than `width` stays on its own line.
fn wrap_plain(text: &str, width: usize) -> String {
    let mut lines: Vec<String> = Vec::new();

    for line in text.lines() {
        let line = line.trim_end();
        if line.chars().count() <= width {
            lines.push(line.to_string());
            continue;
        }

        let mut current = String::new();
        let mut current_len = 0;
        for word in line.split_whitespace() {
            let word_len = word.chars().count();
            if current_len > 0 && current_len + 1 + word_len > width {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            }
            if current_len > 0 {
                current.push(' ');
                current_len += 1;
            }
            current.push_str(word);
            current_len += word_len;
        }
        if !current.is_empty() {
            lines.push(current);
        }
    }

    lines.join("\n")
}

/// Collapse runs of blank lines left behind by block markup.
fn collapse_blank_runs(text: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    for line in text.lines() {
        if line.is_empty() && out.last().is_some_and(|l| l.is_empty()) {
            continue;
        }
        out.push(line);
    }
    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(raw: &str) -> Option<String> {
        normalize(raw, DEFAULT_WRAP_WIDTH)
    }

    #[test]
    fn html_tags_removed_and_images_dropped() {
        let out = norm(r#"<p>Hello <b>world</b></p><img src="x"><br>Next line"#).unwrap();
        let lines: Vec<&str> = out.lines().map(str::trim).collect();
        assert!(lines.contains(&"Hello world"), "got: {out:?}");
        assert!(lines.contains(&"Next line"), "got: {out:?}");
        assert!(!out.contains('['));
        assert!(!out.contains("img"));
        assert!(!out.contains('<'));
    }

    #[test]
    fn image_alt_text_is_not_rendered() {
        let out = norm(r#"<div>Before<img src="a.png" alt="Company logo">After</div>"#).unwrap();
        assert!(!out.contains("Company logo"));
        assert!(out.contains("Before"));
        assert!(out.contains("After"));
    }

    #[test]
    fn simple_paragraph() {
        assert_eq!(norm("<p>Hi</p>").as_deref(), Some("Hi"));
    }

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(norm("Hello\nWorld").as_deref(), Some("Hello\nWorld"));
    }

    #[test]
    fn plain_text_keeps_blank_lines_and_indentation() {
        let input = "Dear reader,\n\n  Item one\n  Item two\n\nBye";
        assert_eq!(norm(input).as_deref(), Some(input));
    }

    #[test]
    fn plain_text_trailing_whitespace_trimmed() {
        assert_eq!(norm("Hello   \nWorld\n\n").as_deref(), Some("Hello\nWorld"));
    }

    #[test]
    fn angle_brackets_in_prose_are_not_markup() {
        assert!(!looks_like_markup("if a < b and c > d"));
        assert!(!looks_like_markup("use <3"));
        assert!(!looks_like_markup("Reply <stop> to unsubscribe"));
        assert!(!looks_like_markup("Hi <name>,"));
        assert!(looks_like_markup("<br>"));
        assert!(looks_like_markup("<a href=\"x\">y</a>"));
        assert!(looks_like_markup("<!DOCTYPE html><html></html>"));
    }

    #[test]
    fn newlines_in_html_text_are_kept() {
        assert_eq!(
            norm("<div>Line one\nLine two</div>").as_deref(),
            Some("Line one\nLine two")
        );
    }

    #[test]
    fn newlines_between_tags_do_not_split_text() {
        let out = norm("<div>\n  <p>First</p>\n  <p>Second</p>\n</div>").unwrap();
        let lines: Vec<&str> = out.lines().filter(|l| !l.trim().is_empty()).collect();
        assert_eq!(lines, vec!["First", "Second"]);
    }

    #[test]
    fn plain_text_with_tag_like_tokens_passes_through() {
        let input = "Reply <stop> to unsubscribe\nLine two";
        assert_eq!(norm(input).as_deref(), Some(input));
    }

    #[test]
    fn decoded_entity_brackets_are_stable() {
        let once = norm("<p>Wrap code in &lt;b&gt;bold&lt;/b&gt; tags</p>").unwrap();
        assert_eq!(once, "Wrap code in bold tags");
        assert_eq!(norm(&once).as_deref(), Some(once.as_str()));
    }

    #[test]
    fn long_plain_line_wraps_at_width() {
        let input = "word ".repeat(100);
        let out = normalize(&input, 40).unwrap();
        assert!(out.lines().count() > 1);
        assert!(out.lines().all(|l| l.chars().count() <= 40));
        assert_eq!(out.split_whitespace().count(), 100);
    }

    #[test]
    fn long_html_paragraph_wraps_at_default_width() {
        let input = format!("<p>{}</p>", "newsletter ".repeat(60));
        let out = norm(&input).unwrap();
        assert!(out.lines().count() > 1);
        assert!(out.lines().all(|l| l.chars().count() <= DEFAULT_WRAP_WIDTH));
    }

    #[test]
    fn overlong_word_is_not_truncated() {
        let url = format!("https://example.com/{}", "a".repeat(200));
        let out = norm(&url).unwrap();
        assert_eq!(out, url);
    }

    #[test]
    fn normalization_is_idempotent() {
        let inputs = [
            "Hello\nWorld".to_string(),
            "word ".repeat(80),
            r#"<p>Hello <b>world</b></p><img src="x"><br>Next line"#.to_string(),
            format!("<h1>Title</h1><p>{}</p><ul><li>one</li><li>two</li></ul>", "lorem ipsum ".repeat(30)),
            "<p>Wrap code in &lt;b&gt;bold&lt;/b&gt; tags</p>".to_string(),
            "<div>Line one\nLine two</div>".to_string(),
            "Reply <stop> to unsubscribe\nLine two".to_string(),
        ];
        for input in inputs {
            let once = norm(&input).unwrap();
            let twice = norm(&once).unwrap();
            assert_eq!(once, twice, "input: {input:?}");
        }
    }

    #[test]
    fn empty_input_is_absent() {
        assert_eq!(norm(""), None);
        assert_eq!(norm("   \n\t "), None);
    }

    #[test]
    fn image_only_html_is_absent() {
        assert_eq!(norm(r#"<html><body><img src="banner.png"></body></html>"#), None);
    }

    #[test]
    fn blank_line_runs_collapse_in_html() {
        let out = norm("<p>One</p><br><br><br><br><p>Two</p>").unwrap();
        assert!(!out.contains("\n\n\n"), "got: {out:?}");
    }
}
