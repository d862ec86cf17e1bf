use std::collections::BTreeMap;

/// A contiguous span of a document, the minimal searchable unit.
///
/// Chunks preserve source order and never overlap; concatenating the
/// `text` of a document's chunks in `seq` order reproduces the content
/// the chunker saw.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Order within the document.
    pub seq: usize,

    /// Raw text, line endings intact.
    pub text: String,

    /// Titles of the headings enclosing the chunk start, outermost first.
    pub heading_path: Vec<String>,

    /// Depth of the heading that opened this chunk (0 when none).
    pub heading_depth: u8,

    /// True when the chunk is exactly one fenced code block.
    pub is_code: bool,

    /// Flat front-matter fields; attached to the first chunk only.
    pub metadata: BTreeMap<String, String>,

    /// Length in characters.
    pub char_len: usize,
}

impl Chunk {
    /// Heading path rendered for storage and display.
    pub fn heading_path_str(&self) -> String {
        self.heading_path.join(" > ")
    }
}
