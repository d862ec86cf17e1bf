//! Measured timings, persisted for the external budget checker.
//!
//! The report is a flat name -> value map written to
//! `.docdex/metrics.json` after every refresh and search, so a CI step
//! can diff measurements against the declared targets without running
//! the engine.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::config::PerformanceTargets;
use super::error::EngineError;

pub const FILE_NAME: &str = "metrics.json";

/// The on-disk metrics artifact.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsReport {
    #[serde(flatten)]
    values: BTreeMap<String, f64>,
}

impl MetricsReport {
    /// Read the existing report, or start fresh if absent or corrupt.
    /// The artifact is advisory output; a damaged file never blocks an
    /// operation.
    pub fn load_or_default(index_dir: &Path) -> Self {
        let path = index_dir.join(FILE_NAME);
        std::fs::read_to_string(&path)
            .ok()
            .and_then(|content| serde_json::from_str(&content).ok())
            .unwrap_or_default()
    }

    pub fn set(&mut self, name: &str, value: f64) {
        self.values.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    /// Record the outcome of a full refresh.
    pub fn record_refresh(&mut self, elapsed_ms: f64, chunk_count: u64) {
        self.set("index_refresh_ms", elapsed_ms);
        self.set("chunks_indexed", chunk_count as f64);
        if elapsed_ms > 0.0 {
            self.set("chunk_processing_rate", chunk_count as f64 / (elapsed_ms / 1000.0));
        }
    }

    /// Record the latest search latency.
    pub fn record_search(&mut self, elapsed_ms: f64) {
        self.set("search_response_ms", elapsed_ms);
    }

    pub fn write(&self, index_dir: &Path) -> Result<(), EngineError> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(index_dir.join(FILE_NAME), content)?;
        Ok(())
    }

    /// Names of recorded metrics that blew their declared ceiling.
    /// Informational only; budget violations never fail the operation
    /// that produced them.
    pub fn over_budget(&self, targets: &PerformanceTargets) -> Vec<String> {
        let mut over = Vec::new();

        if let Some(ms) = self.get("search_response_ms") {
            if ms > targets.search_response_ms as f64 {
                over.push("search_response_ms".to_string());
            }
        }
        if let Some(ms) = self.get("index_refresh_ms") {
            if ms > targets.index_refresh_ms as f64 {
                over.push("index_refresh_ms".to_string());
            }
        }
        if let Some(rate) = self.get("chunk_processing_rate") {
            if rate < targets.chunk_rate_floor {
                over.push("chunk_processing_rate".to_string());
            }
        }

        over
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();

        let mut report = MetricsReport::default();
        report.record_search(3.5);
        report.record_refresh(2000.0, 5000);
        report.write(dir.path()).unwrap();

        let loaded = MetricsReport::load_or_default(dir.path());
        assert_eq!(loaded.get("search_response_ms"), Some(3.5));
        assert_eq!(loaded.get("index_refresh_ms"), Some(2000.0));
        assert_eq!(loaded.get("chunk_processing_rate"), Some(2500.0));
    }

    #[test]
    fn test_missing_or_corrupt_file_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        assert!(MetricsReport::load_or_default(dir.path()).values.is_empty());

        std::fs::write(dir.path().join(FILE_NAME), "not json").unwrap();
        assert!(MetricsReport::load_or_default(dir.path()).values.is_empty());
    }

    #[test]
    fn test_over_budget() {
        let targets = PerformanceTargets::default();

        let mut report = MetricsReport::default();
        report.record_search(3.0);
        assert!(report.over_budget(&targets).is_empty());

        report.record_search(25.0);
        report.record_refresh(40_000.0, 100);
        let over = report.over_budget(&targets);
        assert!(over.contains(&"search_response_ms".to_string()));
        assert!(over.contains(&"index_refresh_ms".to_string()));
        assert!(over.contains(&"chunk_processing_rate".to_string()));
    }
}
