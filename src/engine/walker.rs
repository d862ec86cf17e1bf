//! Corpus discovery.
//!
//! Expands the configured include globs under the corpus root, drops
//! anything an exclude pattern matches, and returns a sorted,
//! deduplicated list of corpus-relative paths. Pure with respect to
//! the index: nothing here reads or writes `.docdex/`.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};
use tracing::warn;

use super::config::FilePatterns;
use super::error::EngineError;

/// Discover the files that make up the corpus. Exclude wins over
/// include; symlinked directories are not followed by the globber, so
/// cycles cannot occur.
pub fn discover_files(root: &Path, patterns: &FilePatterns) -> Result<Vec<PathBuf>, EngineError> {
    let excludes = compile_excludes(&patterns.exclude)?;

    let mut found = BTreeSet::new();

    for include in &patterns.include {
        let full = root.join(include);
        let full = full.to_string_lossy();

        let paths = glob::glob(&full)
            .map_err(|e| EngineError::Configuration(format!("bad include pattern {include}: {e}")))?;

        for entry in paths {
            let path = match entry {
                Ok(path) => path,
                Err(e) => {
                    // Unreadable directory entries are skipped, not fatal.
                    warn!("skipping unreadable entry: {e}");
                    continue;
                }
            };

            if !path.is_file() {
                continue;
            }

            let rel = match path.strip_prefix(root) {
                Ok(rel) => rel.to_path_buf(),
                Err(_) => continue,
            };

            if is_excluded(&rel, &excludes) {
                continue;
            }

            found.insert(rel);
        }
    }

    Ok(found.into_iter().collect())
}

fn compile_excludes(patterns: &[String]) -> Result<Vec<Pattern>, EngineError> {
    patterns
        .iter()
        .map(|p| {
            Pattern::new(p)
                .map_err(|e| EngineError::Configuration(format!("bad exclude pattern {p}: {e}")))
        })
        .collect()
}

fn is_excluded(rel: &Path, excludes: &[Pattern]) -> bool {
    let options = MatchOptions {
        // `**/dist/**` must also match a top-level `dist/x.md`.
        require_literal_separator: false,
        ..MatchOptions::default()
    };
    excludes
        .iter()
        .any(|p| p.matches_path_with(rel, options))
}
