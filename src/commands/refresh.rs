//! Refresh command - re-sync the index with the document corpus.

use anyhow::{Context, Result};
use clap::Args;

use crate::engine::{self, CancelToken, EngineConfig, EngineError, IndexStore, Indexer};

#[derive(Args)]
pub struct RefreshCmd {
    /// Show per-file failures
    #[arg(long, short = 'v')]
    pub verbose: bool,
}

impl RefreshCmd {
    pub async fn run(&self) -> Result<()> {
        let index_dir = engine::get_index_dir()
            .context("No .docdex directory found. Run `ddx init` first.")?;
        let root = index_dir
            .parent()
            .context("Index directory has no parent")?
            .to_path_buf();

        let config = EngineConfig::load(&index_dir)?;
        let store = IndexStore::open(&index_dir.join(engine::DB_FILE_NAME)).await?;
        let indexer = Indexer::new(root, index_dir, store, config);

        let cancel = CancelToken::new();
        let signal_cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\nCancelling...");
                signal_cancel.cancel();
            }
        });

        let summary = match indexer.refresh(&cancel).await {
            Ok(summary) => summary,
            Err(EngineError::Cancelled) => {
                println!("Refresh cancelled; the index is consistent as of the last document.");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        println!(
            "Refreshed in {:.0}ms: {} indexed, {} unchanged, {} removed, {} failed ({} chunks)",
            summary.elapsed_ms,
            summary.indexed,
            summary.skipped,
            summary.deleted,
            summary.failures.len(),
            summary.chunks_written,
        );

        if self.verbose {
            for failure in &summary.failures {
                eprintln!("  {}: {}", failure.path, failure.error);
            }
        } else if !summary.failures.is_empty() {
            eprintln!("Run with --verbose to see failure details.");
        }

        for metric in &summary.over_budget {
            eprintln!("Warning: {metric} missed its performance target.");
        }

        Ok(())
    }
}
