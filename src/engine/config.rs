//! Engine configuration.
//!
//! Loaded from `.docdex/config.toml`. Every field carries a serde
//! default, so a partial file overrides defaults key by key (caller
//! values win) and there is no process-wide mutable config anywhere;
//! the loaded value is threaded through constructors explicitly.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::EngineError;

/// Static policy for the whole engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub file_patterns: FilePatterns,

    #[serde(default)]
    pub parsing: ParsingRules,

    #[serde(default)]
    pub targets: PerformanceTargets,
}

/// Include/exclude globs defining the corpus. Exclude wins on conflict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilePatterns {
    #[serde(default = "default_include")]
    pub include: Vec<String>,

    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,
}

fn default_include() -> Vec<String> {
    ["**/*.md", "**/*.mdx", "**/*.txt", "**/*.html"]
        .iter()
        .map(ToString::to_string)
        .collect()
}

fn default_exclude() -> Vec<String> {
    [
        "**/node_modules/**",
        "**/dist/**",
        "**/target/**",
        "**/.git/**",
        "**/.docdex/**",
    ]
    .iter()
    .map(ToString::to_string)
    .collect()
}

impl Default for FilePatterns {
    fn default() -> Self {
        Self {
            include: default_include(),
            exclude: default_exclude(),
        }
    }
}

/// Structural chunking rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsingRules {
    /// Minimum characters per chunk; only the final chunk of a document
    /// may fall short.
    #[serde(default = "default_min_chunk_len")]
    pub min_chunk_len: usize,

    /// Headings up to this depth start new chunks; deeper ones are
    /// absorbed into the enclosing chunk.
    #[serde(default = "default_max_header_depth")]
    pub max_header_depth: u8,

    /// Rewrite HTML to markdown before chunking.
    #[serde(default = "default_true")]
    pub strip_html: bool,

    /// Never split a fenced code block across chunks.
    #[serde(default = "default_true")]
    pub preserve_code_blocks: bool,

    /// Parse leading front-matter into chunk metadata.
    #[serde(default = "default_true")]
    pub extract_metadata: bool,
}

fn default_min_chunk_len() -> usize {
    100
}

fn default_max_header_depth() -> u8 {
    6
}

fn default_true() -> bool {
    true
}

impl Default for ParsingRules {
    fn default() -> Self {
        Self {
            min_chunk_len: default_min_chunk_len(),
            max_header_depth: default_max_header_depth(),
            strip_html: true,
            preserve_code_blocks: true,
            extract_metadata: true,
        }
    }
}

/// Declared performance ceilings. Read-only policy; the engine measures
/// against these and an external budget checker validates the metrics
/// artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceTargets {
    /// Search response ceiling in milliseconds.
    #[serde(default = "default_search_response_ms")]
    pub search_response_ms: u64,

    /// Full index refresh ceiling in milliseconds.
    #[serde(default = "default_index_refresh_ms")]
    pub index_refresh_ms: u64,

    /// Minimum sustained chunk processing rate, chunks per second.
    #[serde(default = "default_chunk_rate_floor")]
    pub chunk_rate_floor: f64,

    /// Peak memory ceiling in megabytes.
    #[serde(default = "default_max_memory_mb")]
    pub max_memory_mb: u64,
}

fn default_search_response_ms() -> u64 {
    10
}

fn default_index_refresh_ms() -> u64 {
    30_000
}

fn default_chunk_rate_floor() -> f64 {
    1000.0
}

fn default_max_memory_mb() -> u64 {
    512
}

impl Default for PerformanceTargets {
    fn default() -> Self {
        Self {
            search_response_ms: default_search_response_ms(),
            index_refresh_ms: default_index_refresh_ms(),
            chunk_rate_floor: default_chunk_rate_floor(),
            max_memory_mb: default_max_memory_mb(),
        }
    }
}

impl EngineConfig {
    pub const FILE_NAME: &'static str = "config.toml";

    /// Load config from the index directory; a missing file means pure
    /// defaults, a partial file overrides defaults key by key.
    pub fn load(index_dir: &Path) -> Result<Self, EngineError> {
        let path = index_dir.join(Self::FILE_NAME);
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)?;
        let config: Self =
            toml::from_str(&content).map_err(|e| EngineError::Configuration(e.to_string()))?;
        config.validate()?;

        Ok(config)
    }

    /// Write the config to the index directory.
    pub fn save(&self, index_dir: &Path) -> Result<(), EngineError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| EngineError::Configuration(e.to_string()))?;
        std::fs::write(index_dir.join(Self::FILE_NAME), content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.parsing.min_chunk_len == 0 {
            return Err(EngineError::Configuration(
                "min_chunk_len must be greater than 0".into(),
            ));
        }
        if !(1..=6).contains(&self.parsing.max_header_depth) {
            return Err(EngineError::Configuration(
                "max_header_depth must be within 1..=6".into(),
            ));
        }
        Ok(())
    }
}
