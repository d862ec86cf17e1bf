//! Stats command - show index statistics.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;

use crate::engine::{self, EngineConfig, IndexStore, MetricsReport};

#[derive(Args)]
pub struct StatsCmd;

impl StatsCmd {
    pub async fn run(&self) -> Result<()> {
        let index_dir = engine::get_index_dir()
            .context("No .docdex directory found. Run `ddx init` first.")?;

        let config = EngineConfig::load(&index_dir)?;
        let store = IndexStore::open(&index_dir.join(engine::DB_FILE_NAME)).await?;

        let documents = store.count_documents().await?;
        let chunks = store.count_chunks().await?;
        let db_size = get_file_size(&index_dir.join(engine::DB_FILE_NAME));

        println!("Index: {}", index_dir.display());
        println!();
        println!("Documents:  {}", documents);
        println!("Chunks:     {}", chunks);
        println!("Database:   {}", format_size(db_size));

        let metrics = MetricsReport::load_or_default(&index_dir);
        let mut printed_header = false;
        for (name, target) in [
            ("search_response_ms", config.targets.search_response_ms as f64),
            ("index_refresh_ms", config.targets.index_refresh_ms as f64),
        ] {
            if let Some(measured) = metrics.get(name) {
                if !printed_header {
                    println!();
                    println!("Last measured:");
                    printed_header = true;
                }
                println!("  {}: {:.1} (target {:.0})", name, measured, target);
            }
        }
        if let Some(rate) = metrics.get("chunk_processing_rate") {
            println!(
                "  chunk_processing_rate: {:.0}/s (floor {:.0}/s)",
                rate, config.targets.chunk_rate_floor
            );
        }

        let over = metrics.over_budget(&config.targets);
        if !over.is_empty() {
            println!();
            println!("Over budget: {}", over.join(", "));
        }

        Ok(())
    }
}

fn get_file_size(path: &Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
