//! Parser/chunker - turns raw document content into an ordered sequence
//! of chunks with extracted metadata.

mod chunk;
mod frontmatter;
mod html;
mod markdown;

pub use chunk::Chunk;
pub use frontmatter::parse_front_matter;
pub use html::html_to_markdown;
pub use markdown::Chunker;

use std::path::Path;

use crate::engine::ParsingRules;

/// Detected document type, by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Markdown,
    Html,
    Text,
}

impl DocumentKind {
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "md" | "mdx" | "markdown" => Self::Markdown,
            "html" | "htm" => Self::Html,
            _ => Self::Text,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::Html => "html",
            Self::Text => "text",
        }
    }
}

/// Chunk an in-memory document.
///
/// HTML is converted to markdown first when `strip_html` is set; the
/// converter never fails, malformed markup just comes out as plain
/// text. Plain-text documents go through the same structural rules as
/// markdown.
pub fn chunk_str(content: &str, kind: DocumentKind, rules: &ParsingRules) -> Vec<Chunk> {
    let converted;
    let source: &str = if kind == DocumentKind::Html && rules.strip_html {
        converted = html_to_markdown(content);
        &converted
    } else {
        content
    };

    // Reading from a byte slice cannot fail.
    Chunker::new(source.as_bytes(), rules.clone())
        .filter_map(|c| c.ok())
        .collect()
}
