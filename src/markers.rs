//! Helpers for marker based extraction and text cleanup.

use scraper::Html;

use crate::ItemStatus;

/// Returns the text between `begin` and the first `end` after it.
///
/// The error tells which marker was missing.
pub fn between<'a>(text: &'a str, begin: &str, end: &str) -> Result<&'a str, ItemStatus> {
    let start = text
        .find(begin)
        .map(|pos| pos + begin.len())
        .ok_or(ItemStatus::NoBeginTag)?;
    let len = text[start..].find(end).ok_or(ItemStatus::NoEndTag)?;
    Ok(&text[start..start + len])
}

/// Every text found between `begin` and `end`, in order.
pub fn all_between<'a>(text: &'a str, begin: &str, end: &str) -> Vec<&'a str> {
    let mut found = Vec::new();
    let mut pos = 0;
    while let Some(offset) = text[pos..].find(begin) {
        let start = pos + offset + begin.len();
        let Some(len) = text[start..].find(end) else {
            break;
        };
        found.push(&text[start..start + len]);
        pos = start + len + end.len();
    }
    found
}

/// Strips markup, unescapes entities and trims surrounding whitespace.
pub fn clean_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let text: String = fragment.root_element().text().collect();
    text.trim().to_string()
}
