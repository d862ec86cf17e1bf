//! Index refresh - reconciles the store with the file tree.
//!
//! A refresh discovers the corpus, hashes every file in parallel,
//! re-chunks only the documents whose content changed, and removes
//! documents whose files vanished. Each document is replaced in its
//! own transaction, so a crash or cancellation mid-refresh leaves a
//! consistent index: some documents updated, none half-written.

use std::collections::BTreeSet;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Instant;

use rayon::prelude::*;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::chunker::{chunk_str, Chunker, DocumentKind};

use super::config::EngineConfig;
use super::db::IndexStore;
use super::error::EngineError;
use super::metrics::MetricsReport;
use super::models::{CreateChunk, CreateDocument};
use super::walker::discover_files;
use super::CancelToken;

/// Drives index refreshes against a corpus root.
pub struct Indexer {
    root: PathBuf,
    index_dir: PathBuf,
    store: IndexStore,
    config: EngineConfig,
    // Held for the duration of a refresh; a second caller is rejected
    // rather than queued.
    refresh_gate: Mutex<()>,
}

/// Outcome of one refresh.
#[derive(Debug, Default, Serialize)]
pub struct RefreshSummary {
    pub scanned: usize,
    pub indexed: usize,
    pub skipped: usize,
    pub deleted: usize,
    pub chunks_written: usize,
    pub failures: Vec<FileFailure>,
    pub elapsed_ms: f64,
    /// Metrics that missed their declared target this run.
    pub over_budget: Vec<String>,
}

/// A file that could not be indexed this run. The rest of the refresh
/// proceeds; the previously indexed version of this document, if any,
/// is left in place.
#[derive(Debug, Serialize)]
pub struct FileFailure {
    pub path: String,
    pub error: String,
}

impl Indexer {
    pub fn new(root: PathBuf, index_dir: PathBuf, store: IndexStore, config: EngineConfig) -> Self {
        Self {
            root,
            index_dir,
            store,
            config,
            refresh_gate: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run a full refresh. Returns `RefreshInProgress` if another
    /// refresh holds the gate, and `Cancelled` if the token fires;
    /// documents replaced before the cancellation stay replaced.
    pub async fn refresh(&self, cancel: &CancelToken) -> Result<RefreshSummary, EngineError> {
        let _guard = self
            .refresh_gate
            .try_lock()
            .map_err(|_| EngineError::RefreshInProgress)?;

        let started = Instant::now();
        let mut summary = RefreshSummary::default();

        let files = discover_files(&self.root, &self.config.file_patterns)?;
        summary.scanned = files.len();
        debug!(files = files.len(), "discovered corpus");

        // Hashing is CPU- and IO-bound and independent per file, so it
        // runs on the rayon pool. A file that cannot be read here is
        // reported and skipped.
        let states: Vec<(PathBuf, std::io::Result<FileState>)> = files
            .par_iter()
            .map(|rel| (rel.clone(), file_state(&self.root.join(rel))))
            .collect();

        let mut seen = BTreeSet::new();

        for (rel, state) in states {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }

            let path = rel.to_string_lossy().into_owned();
            seen.insert(path.clone());

            let state = match state {
                Ok(state) => state,
                Err(e) => {
                    warn!(path, error = %e, "failed to read file");
                    summary.failures.push(FileFailure {
                        path,
                        error: e.to_string(),
                    });
                    continue;
                }
            };

            let existing = self.store.get_document_by_path(&path).await?;
            if existing.is_some_and(|d| d.content_hash == state.content_hash) {
                summary.skipped += 1;
                continue;
            }

            let kind = DocumentKind::from_path(&rel);
            let chunks = match self.chunk_file(&self.root.join(&rel), kind) {
                Ok(chunks) => chunks,
                Err(e) => {
                    warn!(path, error = %e, "failed to chunk file");
                    summary.failures.push(FileFailure {
                        path,
                        error: e.to_string(),
                    });
                    continue;
                }
            };

            let input = CreateDocument {
                path: path.clone(),
                kind: kind.as_str().to_string(),
                content_hash: state.content_hash,
                modified_at: state.modified_at,
            };

            // A failed write rolls back this document's transaction and
            // leaves its previous version in place; the refresh goes on.
            if let Err(e) = self.store.replace_document(&input, &chunks).await {
                warn!(path, error = %e, "failed to write document");
                summary.failures.push(FileFailure {
                    path,
                    error: e.to_string(),
                });
                continue;
            }
            summary.chunks_written += chunks.len();
            summary.indexed += 1;
            debug!(path, chunks = chunks.len(), "replaced document");
        }

        // Documents whose files are gone come out of the index.
        for document in self.store.list_documents().await? {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }
            if !seen.contains(&document.path) {
                self.store.delete_document(&document.path).await?;
                summary.deleted += 1;
                debug!(path = document.path, "removed vanished document");
            }
        }

        summary.elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        let mut metrics = MetricsReport::load_or_default(&self.index_dir);
        metrics.record_refresh(summary.elapsed_ms, summary.chunks_written as u64);
        metrics.write(&self.index_dir)?;
        summary.over_budget = metrics.over_budget(&self.config.targets);

        info!(
            indexed = summary.indexed,
            skipped = summary.skipped,
            deleted = summary.deleted,
            failed = summary.failures.len(),
            elapsed_ms = summary.elapsed_ms,
            "refresh complete"
        );

        Ok(summary)
    }

    fn chunk_file(&self, abs: &Path, kind: DocumentKind) -> Result<Vec<CreateChunk>, EngineError> {
        let rules = &self.config.parsing;

        let chunks = if kind == DocumentKind::Html && rules.strip_html {
            // HTML has to be rewritten as a whole before chunking.
            let content = std::fs::read_to_string(abs)?;
            chunk_str(&content, kind, rules)
        } else {
            let file = std::fs::File::open(abs)?;
            Chunker::new(BufReader::new(file), rules.clone())
                .collect::<Result<Vec<_>, _>>()?
        };

        Ok(chunks.iter().map(CreateChunk::from_chunk).collect())
    }
}

struct FileState {
    content_hash: String,
    modified_at: String,
}

/// Hash the file content and capture its mtime. Streams through the
/// hasher, never loading the file into memory.
fn file_state(path: &Path) -> std::io::Result<FileState> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;

    let modified = file.metadata()?.modified()?;
    let modified_at = chrono::DateTime::<chrono::Utc>::from(modified).to_rfc3339();

    Ok(FileState {
        content_hash: hex::encode(hasher.finalize()),
        modified_at,
    })
}
