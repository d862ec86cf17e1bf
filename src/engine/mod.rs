//! The indexing and retrieval engine.
//!
//! State lives in a `.docdex/` directory at the corpus root:
//! - `index.db` - documents and chunks, plus the full-text index
//! - `config.toml` - file patterns, parsing rules, performance targets
//! - `metrics.json` - measured timings for the external budget checker

pub mod config;
pub mod db;
pub mod error;
pub mod indexer;
pub mod metrics;
pub mod models;
pub mod search;
pub mod walker;

pub use config::{EngineConfig, FilePatterns, ParsingRules, PerformanceTargets};
pub use db::IndexStore;
pub use error::EngineError;
pub use indexer::{Indexer, RefreshSummary};
pub use metrics::MetricsReport;
pub use search::SearchEngine;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// The name of the index directory.
pub const INDEX_DIR_NAME: &str = ".docdex";

/// Database file inside the index directory.
pub const DB_FILE_NAME: &str = "index.db";

/// Find the `.docdex/` directory by walking up from the given path.
pub fn find_index_root(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        let index_dir = current.join(INDEX_DIR_NAME);
        if index_dir.is_dir() {
            return Some(index_dir);
        }
        if !current.pop() {
            return None;
        }
    }
}

/// Get the index directory for the current working directory.
pub fn get_index_dir() -> Option<PathBuf> {
    std::env::current_dir()
        .ok()
        .and_then(|cwd| find_index_root(&cwd))
}

/// Cooperative cancellation flag, checked between documents during a
/// refresh. Cloning shares the flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_index_root_walks_up() {
        let dir = tempfile::tempdir().unwrap();
        let index_dir = dir.path().join(INDEX_DIR_NAME);
        std::fs::create_dir(&index_dir).unwrap();

        let nested = dir.path().join("docs").join("guide");
        std::fs::create_dir_all(&nested).unwrap();

        let found = find_index_root(&nested).unwrap();
        assert_eq!(found, index_dir);
    }

    #[test]
    fn test_find_index_root_missing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(find_index_root(dir.path()).is_none());
    }

    #[test]
    fn test_cancel_token() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
