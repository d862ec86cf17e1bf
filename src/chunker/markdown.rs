//! Chunk assembly over markdown-ish line tokens.
//!
//! The chunker is an explicit state machine over `{ Accumulating,
//! CodeBlock }` driven by one token per line: heading, code fence,
//! blank, or ordinary text. Text accumulates until the configured
//! minimum chunk length, then the chunk closes at the next natural
//! boundary (heading or paragraph break) rather than mid-sentence.

use std::collections::{BTreeMap, VecDeque};
use std::io::BufRead;

use crate::engine::ParsingRules;

use super::chunk::Chunk;
use super::frontmatter::{is_front_matter_fence, parse_front_matter};

/// Per-line structural token.
#[derive(Debug, PartialEq)]
enum LineToken {
    Heading { depth: u8, title: String },
    Fence,
    Blank,
    Text,
}

fn is_fence(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("```") || trimmed.starts_with("~~~")
}

fn classify(line: &str) -> LineToken {
    if is_fence(line) {
        return LineToken::Fence;
    }
    if line.trim().is_empty() {
        return LineToken::Blank;
    }
    let depth = line.chars().take_while(|c| *c == '#').count();
    if (1..=6).contains(&depth) {
        if let Some(title) = line[depth..].strip_prefix(' ') {
            return LineToken::Heading {
                depth: depth as u8,
                title: title.trim().to_string(),
            };
        }
    }
    LineToken::Text
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
    Accumulating,
    CodeBlock,
}

/// Streaming chunker over any `BufRead` source.
///
/// Large documents are never fully materialized; memory is bounded by
/// the size of a single chunk. The iterator is lazy and finite, and
/// building a new `Chunker` over the same source restarts the sequence.
pub struct Chunker<R: BufRead> {
    reader: R,
    rules: ParsingRules,
    state: State,
    buf: String,
    buf_chars: usize,
    /// The buffer holds exactly one fenced code block so far.
    buf_is_code: bool,
    /// Minimum length reached; close at the next non-blank token.
    close_pending: bool,
    seq: usize,
    /// Open headings, shallowest first. Tracks depths beyond
    /// `max_header_depth` too, so absorbed subsections still show up in
    /// later heading paths.
    heading_stack: Vec<(u8, String)>,
    /// Heading context captured when the current chunk opened.
    open_path: Vec<String>,
    open_depth: u8,
    front_matter: Option<BTreeMap<String, String>>,
    started: bool,
    done: bool,
    out: VecDeque<Chunk>,
}

impl<R: BufRead> Chunker<R> {
    pub fn new(reader: R, rules: ParsingRules) -> Self {
        Self {
            reader,
            rules,
            state: State::Accumulating,
            buf: String::new(),
            buf_chars: 0,
            buf_is_code: false,
            close_pending: false,
            seq: 0,
            heading_stack: Vec::new(),
            open_path: Vec::new(),
            open_depth: 0,
            front_matter: None,
            started: false,
            done: false,
            out: VecDeque::new(),
        }
    }

    /// Append a raw line; an empty buffer captures the current heading
    /// context as the new chunk's.
    fn push(&mut self, line: &str) {
        if self.buf.is_empty() {
            self.open_path = self.heading_stack.iter().map(|(_, t)| t.clone()).collect();
            self.open_depth = self.heading_stack.last().map(|(d, _)| *d).unwrap_or(0);
        }
        self.buf.push_str(line);
        self.buf_chars += line.chars().count();
    }

    /// Close the current chunk, if any.
    fn close(&mut self, is_code: bool) {
        self.close_pending = false;
        if self.buf.is_empty() {
            return;
        }
        let text = std::mem::take(&mut self.buf);
        let char_len = self.buf_chars;
        self.buf_chars = 0;
        self.buf_is_code = false;

        let metadata = if self.seq == 0 {
            self.front_matter.take().unwrap_or_default()
        } else {
            BTreeMap::new()
        };

        self.out.push_back(Chunk {
            seq: self.seq,
            text,
            heading_path: self.open_path.clone(),
            heading_depth: self.open_depth,
            is_code,
            metadata,
            char_len,
        });
        self.seq += 1;
    }

    fn note_heading(&mut self, depth: u8, title: String) {
        self.heading_stack.retain(|(d, _)| *d < depth);
        self.heading_stack.push((depth, title));
    }

    fn process(&mut self, line: String) {
        match self.state {
            State::CodeBlock => {
                // Inside a fence, nothing splits: blanks and heading-like
                // lines are ordinary code text.
                let closes = is_fence(&line);
                self.push(&line);
                if closes {
                    self.state = State::Accumulating;
                    if self.buf_is_code && self.buf_chars >= self.rules.min_chunk_len {
                        self.close(true);
                    }
                }
            }
            State::Accumulating => match classify(&line) {
                LineToken::Fence if self.rules.preserve_code_blocks => {
                    // A fence opening is a natural boundary; the block
                    // becomes its own chunk unless a short run of text
                    // still needs it for minimum length.
                    if self.buf_chars >= self.rules.min_chunk_len {
                        self.close(false);
                    }
                    self.buf_is_code = self.buf.is_empty();
                    self.push(&line);
                    self.state = State::CodeBlock;
                }
                LineToken::Heading { depth, title } => {
                    if depth <= self.rules.max_header_depth
                        && self.buf_chars >= self.rules.min_chunk_len
                    {
                        self.close(false);
                    }
                    self.note_heading(depth, title);
                    self.push(&line);
                    self.buf_is_code = false;
                }
                LineToken::Blank => {
                    self.push(&line);
                    self.buf_is_code = false;
                    if self.buf_chars >= self.rules.min_chunk_len {
                        self.close_pending = true;
                    }
                }
                LineToken::Text | LineToken::Fence => {
                    if self.close_pending {
                        self.close(false);
                    }
                    self.push(&line);
                    self.buf_is_code = false;
                }
            },
        }
    }

    /// Consume a leading `---` front-matter block. Raw lines stay in the
    /// first chunk's text; parsed fields land in its metadata. A block
    /// with no closing fence degrades to plain text.
    fn consume_front_matter(&mut self, open_line: String) -> std::io::Result<()> {
        self.push(&open_line);
        let mut body = String::new();
        loop {
            let mut line = String::new();
            if self.reader.read_line(&mut line)? == 0 {
                return Ok(());
            }
            if is_front_matter_fence(&line) {
                self.push(&line);
                self.front_matter = parse_front_matter(&body);
                return Ok(());
            }
            body.push_str(&line);
            self.push(&line);
        }
    }
}

impl<R: BufRead> Iterator for Chunker<R> {
    type Item = std::io::Result<Chunk>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(chunk) = self.out.pop_front() {
                return Some(Ok(chunk));
            }
            if self.done {
                return None;
            }

            let mut line = String::new();
            match self.reader.read_line(&mut line) {
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
                Ok(0) => {
                    // Only the final chunk may fall short of the minimum.
                    self.done = true;
                    let is_code = self.buf_is_code;
                    self.close(is_code);
                    continue;
                }
                Ok(_) => {}
            }

            if !self.started {
                self.started = true;
                if self.rules.extract_metadata && is_front_matter_fence(&line) {
                    if let Err(e) = self.consume_front_matter(line) {
                        self.done = true;
                        return Some(Err(e));
                    }
                    continue;
                }
            }

            self.process(line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules(min_chunk_len: usize, max_header_depth: u8) -> ParsingRules {
        ParsingRules {
            min_chunk_len,
            max_header_depth,
            ..ParsingRules::default()
        }
    }

    fn chunk(source: &str, rules: ParsingRules) -> Vec<Chunk> {
        Chunker::new(source.as_bytes(), rules)
            .collect::<std::io::Result<Vec<_>>>()
            .unwrap()
    }

    #[test]
    fn test_empty_document_yields_no_chunks() {
        assert!(chunk("", rules(100, 6)).is_empty());
    }

    #[test]
    fn test_short_document_yields_one_chunk() {
        let source = "# Title\n\nShort text.";
        let chunks = chunk(source, rules(50, 6));

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, source);
        assert_eq!(chunks[0].heading_path, vec!["Title".to_string()]);
        assert_eq!(chunks[0].heading_depth, 1);
    }

    #[test]
    fn test_split_at_heading() {
        let para: String = "word ".repeat(40); // 200 chars
        let source = format!("{para}\n## Section\n{para}\n");
        let chunks = chunk(&source, rules(100, 2));

        assert_eq!(chunks.len(), 2);
        assert!(chunks[1].text.starts_with("## Section"));
        assert_eq!(chunks[1].heading_path, vec!["Section".to_string()]);
    }

    #[test]
    fn test_deep_heading_is_absorbed() {
        let para: String = "word ".repeat(40);
        let source = format!("{para}\n### Deep\n{para}\n");
        let chunks = chunk(&source, rules(100, 2));

        // Depth 3 exceeds max_header_depth 2, so no split there; the
        // paragraph break after the first run closes the chunk instead.
        assert!(chunks[0].text.contains(&para));
        assert!(!chunks[0].text.contains("### Deep") || chunks.len() == 1);
        let joined: String = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(joined, source);
    }

    #[test]
    fn test_round_trip_concatenation() {
        let source = "---\ntitle: Demo\n---\n# One\n\nFirst paragraph with some words.\n\n```rust\nfn main() {}\n```\n\n## Two\n\nSecond paragraph here.\n";
        for min in [10, 80, 500] {
            let chunks = chunk(source, rules(min, 6));
            let joined: String = chunks.iter().map(|c| c.text.as_str()).collect();
            assert_eq!(joined, source, "round trip failed for min={min}");
        }
    }

    #[test]
    fn test_min_length_except_final_chunk() {
        let source = "# A\n\nfirst paragraph that is long enough to pass the line\n\nsecond paragraph that is also long enough to pass\n\n# B\n\ntail";
        let chunks = chunk(source, rules(40, 6));

        assert!(chunks.len() > 1);
        for c in &chunks[..chunks.len() - 1] {
            assert!(c.char_len >= 40, "chunk {} below minimum: {:?}", c.seq, c.text);
        }
    }

    #[test]
    fn test_code_block_never_split() {
        let para: String = "text ".repeat(30); // 150 chars
        let code = "```rust\nlet a = 1;\n\nlet b = 2;\n\nlet c = a + b;\nprintln!(\"{}\", c);\nlet d = c * 2;\nassert!(d > 0);\nlet e = d;\nlet f = e;\n```\n";
        let source = format!("{para}\n\n{code}\n{para}\n");
        let chunks = chunk(&source, rules(100, 6));

        let code_chunk = chunks
            .iter()
            .find(|c| c.text.contains("let a = 1;"))
            .unwrap();
        // Blank lines inside the fence must not split it.
        assert!(code_chunk.text.contains("let c = a + b;"));
        assert!(code_chunk.is_code);

        let joined: String = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(joined, source);
    }

    #[test]
    fn test_short_code_block_absorbed() {
        let source = "intro line\n```\nx\n```\nmore text after the fence\n";
        let chunks = chunk(source, rules(100, 6));

        assert_eq!(chunks.len(), 1);
        assert!(!chunks[0].is_code);
        assert_eq!(chunks[0].text, source);
    }

    #[test]
    fn test_front_matter_extracted_and_retained() {
        let source = "---\ntitle: Guide\nversion: 2\n---\nBody text.\n";
        let chunks = chunk(source, rules(100, 6));

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].metadata.get("title").unwrap(), "Guide");
        assert_eq!(chunks[0].metadata.get("version").unwrap(), "2");
        // Raw front-matter lines stay in the text for round-tripping.
        assert_eq!(chunks[0].text, source);
    }

    #[test]
    fn test_unterminated_front_matter_degrades() {
        let source = "---\ntitle: Broken\nno closing fence here";
        let chunks = chunk(source, rules(100, 6));

        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].metadata.is_empty());
        assert_eq!(chunks[0].text, source);
    }

    #[test]
    fn test_front_matter_skipped_when_disabled() {
        let mut r = rules(100, 6);
        r.extract_metadata = false;
        let source = "---\ntitle: Guide\n---\nBody.\n";
        let chunks = chunk(source, r);

        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].metadata.is_empty());
    }

    #[test]
    fn test_restartable_sequence() {
        let source = "# H\n\nSome body text that goes on for a while.\n";
        let first = chunk(source, rules(20, 6));
        let second = chunk(source, rules(20, 6));
        assert_eq!(first, second);
    }

    #[test]
    fn test_sequence_order_and_no_overlap() {
        let para: String = "alpha beta gamma ".repeat(10);
        let source = format!("# A\n{para}\n\n# B\n{para}\n\n# C\n{para}\n");
        let chunks = chunk(&source, rules(50, 6));

        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.seq, i);
        }
        let joined: String = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(joined, source);
    }

    #[test]
    fn test_classify_tokens() {
        assert_eq!(
            classify("## Title here\n"),
            LineToken::Heading { depth: 2, title: "Title here".into() }
        );
        assert_eq!(classify("####### too deep\n"), LineToken::Text);
        assert_eq!(classify("#nospace\n"), LineToken::Text);
        assert_eq!(classify("```rust\n"), LineToken::Fence);
        assert_eq!(classify("   \n"), LineToken::Blank);
        assert_eq!(classify("plain words\n"), LineToken::Text);
    }
}
