//! HTML stripping.
//!
//! Markup is rewritten to markdown so that headings and paragraph
//! breaks survive as structural boundaries the chunker understands.

/// Strip HTML tags, keeping inner text and structure. Malformed markup
/// never fails; the rewriter emits whatever text it can recover.
pub fn html_to_markdown(html: &str) -> String {
    html2md::rewrite_html(html, false)
}
