// src/utils/text.rs

//! Text helpers: HTML flattening and log previews.

use scraper::{ElementRef, Html, Node};
use unicode_segmentation::UnicodeSegmentation;

/// Token standing in for an image inside flattened text.
pub const IMAGE_PLACEHOLDER: &str = "[图片]";

const BLOCK_TAGS: [&str; 14] = [
    "p", "div", "br", "li", "ul", "ol", "h1", "h2", "h3", "h4", "h5", "h6", "blockquote", "figure",
];

/// Flatten an HTML body into plain text, replacing each `<img>` with
/// [`IMAGE_PLACEHOLDER`] and breaking lines at block elements.
pub fn html_to_text(html: &str) -> String {
    if html.trim().is_empty() {
        return String::new();
    }
    if !html.contains('<') {
        return html.trim().to_string();
    }

    let fragment = Html::parse_fragment(html);
    let mut out = String::new();
    walk(fragment.root_element(), &mut out);

    out.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn walk(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => {
                let name = el.name();
                if name == "img" {
                    out.push_str(IMAGE_PLACEHOLDER);
                    continue;
                }
                if matches!(name, "script" | "style" | "noscript") {
                    continue;
                }
                if let Some(child_el) = ElementRef::wrap(child) {
                    walk(child_el, out);
                }
                if BLOCK_TAGS.contains(&name) {
                    out.push('\n');
                }
            }
            _ => {}
        }
    }
}

/// Truncate to at most `max` graphemes for log lines.
pub fn preview(text: &str, max: usize) -> String {
    let mut graphemes = text.graphemes(true);
    let head: String = graphemes.by_ref().take(max).collect();
    if graphemes.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}
