//! Lexical search over the chunk store.
//!
//! FTS narrows the candidate set; scoring happens here in Rust so the
//! ranking is fully deterministic and independent of SQLite internals.
//! Score per chunk: sum over matched query terms of idf(term) * tf,
//! where tf is the term's share of the chunk's tokens, plus a fixed
//! heading boost when the term appears in the chunk's heading path.
//! Ties break by lower sequence index, then lower document path.

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::time::Instant;

use tracing::debug;

use super::config::EngineConfig;
use super::db::IndexStore;
use super::error::EngineError;
use super::metrics::MetricsReport;
use super::models::{EntryWithDocument, ScanFilter, SearchHit, SearchQuery, SearchResponse};
use super::CancelToken;

/// Longest accepted query, in characters.
const MAX_QUERY_LEN: usize = 1024;

/// Snippet length in characters.
const SNIPPET_LEN: usize = 240;

/// Weight of a term appearing in the heading path.
const HEADING_BOOST: f64 = 0.5;

pub struct SearchEngine {
    index_dir: PathBuf,
    store: IndexStore,
    config: EngineConfig,
}

impl SearchEngine {
    pub fn new(index_dir: PathBuf, store: IndexStore, config: EngineConfig) -> Self {
        Self {
            index_dir,
            store,
            config,
        }
    }

    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    /// Run a query and return the ranked top-k hits.
    ///
    /// An empty query (or one with no matching chunks) yields an empty
    /// result, not an error. Latency is measured against the declared
    /// target but never cuts results off; a slow query completes and is
    /// flagged in the response. Cancellation is checked between the
    /// per-term store lookups and before scoring, so an aborted query
    /// releases its connections promptly.
    pub async fn search(
        &self,
        query: &SearchQuery,
        cancel: &CancelToken,
    ) -> Result<SearchResponse, EngineError> {
        if query.k == 0 {
            return Err(EngineError::InvalidQuery("k must be at least 1".into()));
        }
        if query.text.chars().count() > MAX_QUERY_LEN {
            return Err(EngineError::InvalidQuery(format!(
                "query longer than {MAX_QUERY_LEN} characters"
            )));
        }

        let started = Instant::now();

        let terms = tokenize(&query.text);
        if terms.is_empty() {
            return self.finish(Vec::new(), started);
        }

        let total_docs = self.store.count_documents().await?;

        let mut idf = HashMap::new();
        for term in &terms {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }
            let df = self.store.document_frequency(term).await?;
            idf.insert(
                term.clone(),
                (1.0 + total_docs as f64 / (1.0 + df as f64)).ln(),
            );
        }

        let filter = ScanFilter {
            path_prefix: query.path_prefix.clone(),
            kind: query.kind.clone(),
        };
        let candidates = self.store.search_candidates(&terms, &filter).await?;
        debug!(candidates = candidates.len(), terms = terms.len(), "scoring candidates");

        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        let mut scored: Vec<(f64, EntryWithDocument)> = candidates
            .into_iter()
            .map(|entry| (score_entry(&entry, &terms, &idf), entry))
            .filter(|(score, _)| *score > 0.0)
            .collect();

        scored.sort_by(|(sa, a), (sb, b)| {
            sb.partial_cmp(sa)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.seq.cmp(&b.seq))
                .then_with(|| a.document_path.cmp(&b.document_path))
        });
        scored.truncate(query.k);

        let hits = scored
            .into_iter()
            .map(|(score, entry)| SearchHit {
                chunk_id: entry.id,
                document_path: entry.document_path,
                seq: entry.seq,
                heading_path: entry.heading_path,
                is_code: entry.is_code,
                snippet: snippet(&entry.text),
                score,
            })
            .collect();

        self.finish(hits, started)
    }

    fn finish(
        &self,
        hits: Vec<SearchHit>,
        started: Instant,
    ) -> Result<SearchResponse, EngineError> {
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        let mut metrics = MetricsReport::load_or_default(&self.index_dir);
        metrics.record_search(elapsed_ms);
        metrics.write(&self.index_dir)?;

        Ok(SearchResponse {
            hits,
            elapsed_ms,
            budget_exceeded: elapsed_ms > self.config.targets.search_response_ms as f64,
        })
    }
}

/// Lowercase the text and split on anything non-alphanumeric; duplicate
/// terms collapse so each query term is weighted once.
fn tokenize(text: &str) -> Vec<String> {
    let unique: BTreeSet<String> = text
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(ToString::to_string)
        .collect();
    unique.into_iter().collect()
}

fn score_entry(entry: &EntryWithDocument, terms: &[String], idf: &HashMap<String, f64>) -> f64 {
    let tokens: Vec<String> = entry
        .text
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(ToString::to_string)
        .collect();
    if tokens.is_empty() {
        return 0.0;
    }

    let heading = entry.heading_path.to_lowercase();

    let mut score = 0.0;
    for term in terms {
        let weight = idf.get(term).copied().unwrap_or(0.0);

        let tf = tokens.iter().filter(|t| *t == term).count();
        if tf > 0 {
            score += weight * tf as f64 / tokens.len() as f64;
        }
        if heading.contains(term.as_str()) {
            score += HEADING_BOOST * weight;
        }
    }

    score
}

/// First `SNIPPET_LEN` characters of the trimmed chunk text, cut on a
/// character boundary.
fn snippet(text: &str) -> String {
    let trimmed = text.trim();
    let mut out: String = trimmed.chars().take(SNIPPET_LEN).collect();
    if out.len() < trimmed.len() {
        out.push('\u{2026}');
    }
    out
}
