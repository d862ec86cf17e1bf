//! Data models for the store and search surfaces.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::chunker::Chunk;

// ============================================================================
// Document Models
// ============================================================================

/// A document row from the index.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DocumentRow {
    pub id: String,
    /// Path relative to the corpus root.
    pub path: String,
    pub kind: String,
    pub content_hash: String,
    pub modified_at: String,
    pub chunk_count: i64,
    pub indexed_at: String,
}

/// Input for creating or updating a document.
#[derive(Debug, Clone)]
pub struct CreateDocument {
    pub path: String,
    pub kind: String,
    pub content_hash: String,
    pub modified_at: String,
}

// ============================================================================
// Chunk Models
// ============================================================================

/// The persisted, searchable projection of a chunk.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct IndexEntry {
    pub id: String,
    pub document_id: String,
    pub seq: i64,
    pub text: String,
    pub heading_path: String,
    pub heading_depth: i64,
    pub is_code: bool,
    /// Flat front-matter fields as a JSON object.
    pub metadata: String,
    pub char_len: i64,
}

/// Entry joined with its document, as the search engine consumes it.
#[derive(Debug, Clone, FromRow)]
pub struct EntryWithDocument {
    pub id: String,
    pub document_id: String,
    pub seq: i64,
    pub text: String,
    pub heading_path: String,
    pub heading_depth: i64,
    pub is_code: bool,
    pub metadata: String,
    pub char_len: i64,
    pub document_path: String,
    pub document_kind: String,
}

/// Input for writing a chunk; the store assigns ids.
#[derive(Debug, Clone)]
pub struct CreateChunk {
    pub seq: i64,
    pub text: String,
    pub heading_path: String,
    pub heading_depth: i64,
    pub is_code: bool,
    pub metadata: String,
    pub char_len: i64,
}

impl CreateChunk {
    pub fn from_chunk(chunk: &Chunk) -> Self {
        Self {
            seq: chunk.seq as i64,
            text: chunk.text.clone(),
            heading_path: chunk.heading_path_str(),
            heading_depth: i64::from(chunk.heading_depth),
            is_code: chunk.is_code,
            metadata: serde_json::to_string(&chunk.metadata)
                .unwrap_or_else(|_| "{}".to_string()),
            char_len: chunk.char_len as i64,
        }
    }
}

// ============================================================================
// Search Models
// ============================================================================

/// Filter for `scan` and search candidate retrieval.
#[derive(Debug, Clone, Default)]
pub struct ScanFilter {
    /// Only documents whose path starts with this prefix.
    pub path_prefix: Option<String>,
    /// Only documents of this kind (markdown, html, text).
    pub kind: Option<String>,
}

/// A search request.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchQuery {
    pub text: String,
    /// Requested result count.
    pub k: usize,
    pub path_prefix: Option<String>,
    pub kind: Option<String>,
}

/// One ranked hit.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub chunk_id: String,
    pub document_path: String,
    pub seq: i64,
    pub heading_path: String,
    pub is_code: bool,
    pub snippet: String,
    pub score: f64,
}

/// Ranked results plus the measured latency.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub hits: Vec<SearchHit>,
    pub elapsed_ms: f64,
    /// The response-time target was missed; results are still complete.
    pub budget_exceeded: bool,
}
