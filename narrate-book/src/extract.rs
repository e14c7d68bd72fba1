//! Chapter extraction: content items to plain-text chapters.

use crate::document::Document;
use crate::error::{PipelineError, Result};
use crate::text::clean_text;

/// A chapter ready for narration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    pub title: String,
    /// Plain text content, never empty
    pub text: String,
}

/// Extract chapters from a document in reading order.
///
/// Items whose text is empty after markup stripping are skipped. Untitled
/// chapters are named `Chapter N`, where `N` is the item's 1-based position
/// among all content items, skipped ones included. `on_progress` receives the
/// fraction of items processed.
pub fn extract(document: &Document, mut on_progress: impl FnMut(f32)) -> Result<Vec<Chapter>> {
    let total = document.items.len();
    let mut chapters = Vec::new();

    for (i, item) in document.items.iter().enumerate() {
        let text = html_to_text(&item.markup);

        if text.is_empty() {
            log::debug!("Skipping empty content item {}", item.id);
        } else {
            let title =
                extract_title_from_html(&item.markup).unwrap_or_else(|| format!("Chapter {}", i + 1));
            log::debug!("Chapter \"{}\" from {} ({} chars)", title, item.id, text.len());
            chapters.push(Chapter { title, text });
        }

        on_progress((i + 1) as f32 / total as f32);
    }

    if chapters.is_empty() {
        return Err(PipelineError::NoContent(document.title.clone()));
    }

    Ok(chapters)
}

/// Extract title from HTML content (h1, then h2, then the title element)
fn extract_title_from_html(html: &str) -> Option<String> {
    ["h1", "h2", "title"]
        .iter()
        .find_map(|tag| first_element_text(html, tag))
}

/// Text of the first `<tag>` element, if it is non-empty.
fn first_element_text(html: &str, tag: &str) -> Option<String> {
    let html_lower = html.to_ascii_lowercase();
    let open = format!("<{}", tag);
    let close = format!("</{}>", tag);

    let mut search_from = 0;
    while let Some(found) = html_lower[search_from..].find(&open) {
        let start = search_from + found;
        let after_name = start + open.len();
        search_from = after_name;

        // `<h1` must not match `<h10` or `<titlepage`
        match html_lower[after_name..].chars().next() {
            Some(c) if c == '>' || c.is_whitespace() || c == '/' => {}
            _ => continue,
        }

        let tag_end = html_lower[start..].find('>')?;
        let content_start = start + tag_end + 1;
        let end = html_lower[content_start..].find(&close)?;
        let title = strip_html_tags(&html[content_start..content_start + end]);
        let title = title.split_whitespace().collect::<Vec<_>>().join(" ");

        return if title.is_empty() { None } else { Some(title) };
    }

    None
}

/// Strip HTML tags from a string
fn strip_html_tags(html: &str) -> String {
    let mut result = String::new();
    let mut in_tag = false;

    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => result.push(ch),
            _ => {}
        }
    }

    result
}

/// Convert HTML to cleaned plain text
fn html_to_text(html: &str) -> String {
    let text = html2text::from_read(html.as_bytes(), 1000);
    clean_text(&join_lines(&text))
}

/// Join wrapped lines into paragraphs and drop heading markers.
fn join_lines(text: &str) -> String {
    let mut result = String::new();
    let mut prev_was_newline = false;

    for line in text.lines() {
        let trimmed = line.trim().trim_start_matches('#').trim_start();

        // Skip empty lines but preserve paragraph breaks
        if trimmed.is_empty() {
            if !prev_was_newline && !result.is_empty() {
                result.push_str("\n\n");
                prev_was_newline = true;
            }
            continue;
        }

        prev_was_newline = false;

        if !result.is_empty() && !result.ends_with('\n') {
            result.push(' ');
        }

        result.push_str(trimmed);
    }

    // Entities escaped twice in the source survive one decoding pass
    result
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::ContentItem;

    fn page(body: &str) -> String {
        format!("<html><body>{}</body></html>", body)
    }

    #[test]
    fn test_strip_html_tags() {
        assert_eq!(strip_html_tags("<p>Hello</p>"), "Hello");
        assert_eq!(strip_html_tags("<a href=\"test\">Link</a>"), "Link");
    }

    #[test]
    fn test_extract_title_h1() {
        let html = page("<h1>Chapter <em>One</em></h1><p>Content here</p>");
        assert_eq!(extract_title_from_html(&html), Some("Chapter One".to_string()));
    }

    #[test]
    fn test_extract_title_h2() {
        let html = page("<h2 class=\"sub\">Section Title</h2><p>Content</p>");
        assert_eq!(extract_title_from_html(&html), Some("Section Title".to_string()));
    }

    #[test]
    fn test_extract_title_element() {
        let html = "<html><head><title>Prologue</title></head><body><p>Text.</p></body></html>";
        assert_eq!(extract_title_from_html(html), Some("Prologue".to_string()));
    }

    #[test]
    fn test_extract_title_ignores_longer_tag_names() {
        let html = "<html><body><titlepage>x</titlepage><p>Text.</p></body></html>";
        assert_eq!(extract_title_from_html(html), None);
    }

    #[test]
    fn test_join_lines_drops_heading_markers() {
        let joined = join_lines("# The Start\n\nIt was\nlate.");
        assert_eq!(joined, "The Start\n\nIt was late.");
    }

    #[test]
    fn test_extract_preserves_order_and_skips_empty() {
        let doc = Document::new(
            "Book",
            vec![
                ContentItem::new("a", page("<h1>First</h1><p>Alpha text.</p>")),
                ContentItem::new("b", page("<p>   </p>")),
                ContentItem::new("c", page("<h1>Third</h1><p>Gamma text.</p>")),
            ],
        );

        let chapters = extract(&doc, |_| {}).unwrap();
        assert_eq!(chapters.len(), 2);
        assert_eq!(chapters[0].title, "First");
        assert!(chapters[0].text.contains("Alpha text."));
        assert_eq!(chapters[1].title, "Third");
        assert!(chapters[1].text.contains("Gamma text."));
    }

    #[test]
    fn test_fallback_title_uses_item_position() {
        let doc = Document::new(
            "Book",
            vec![
                ContentItem::new("cover", page("")),
                ContentItem::new("c1", page("<p>Untitled prose.</p>")),
            ],
        );

        let chapters = extract(&doc, |_| {}).unwrap();
        assert_eq!(chapters.len(), 1);
        assert_eq!(chapters[0].title, "Chapter 2");
    }

    #[test]
    fn test_all_empty_is_no_content() {
        let doc = Document::new(
            "Blank",
            vec![
                ContentItem::new("a", page("")),
                ContentItem::new("b", page("<p> \n\t </p>")),
            ],
        );

        let err = extract(&doc, |_| {}).unwrap_err();
        assert!(matches!(err, PipelineError::NoContent(ref t) if t == "Blank"));
        assert_eq!(err.kind(), crate::error::ErrorKind::Extraction);
    }

    #[test]
    fn test_no_items_is_no_content() {
        let doc = Document::new("Empty", Vec::new());
        assert!(extract(&doc, |_| {}).is_err());
    }

    #[test]
    fn test_progress_reaches_one() {
        let doc = Document::new(
            "Book",
            vec![
                ContentItem::new("a", page("<p>One.</p>")),
                ContentItem::new("b", page("")),
                ContentItem::new("c", page("<p>Three.</p>")),
                ContentItem::new("d", page("<p>Four.</p>")),
            ],
        );

        let mut seen = Vec::new();
        extract(&doc, |f| seen.push(f)).unwrap();
        assert_eq!(seen, vec![0.25, 0.5, 0.75, 1.0]);
    }

    #[test]
    fn test_chapter_count_bounded_by_items() {
        let items: Vec<ContentItem> = (0..6)
            .map(|i| {
                let body = if i % 2 == 0 {
                    format!("<p>Paragraph {}.</p>", i)
                } else {
                    String::new()
                };
                ContentItem::new(format!("i{}", i), page(&body))
            })
            .collect();
        let doc = Document::new("Book", items);

        let chapters = extract(&doc, |_| {}).unwrap();
        assert!(!chapters.is_empty());
        assert!(chapters.len() <= doc.items.len());
        assert_eq!(chapters.len(), 3);
    }
}
