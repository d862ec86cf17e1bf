//! Watch command - refresh the index whenever the corpus changes.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::engine::{self, CancelToken, EngineConfig, EngineError, IndexStore, Indexer};

#[derive(Args)]
pub struct WatchCmd {
    /// Debounce window in seconds
    #[arg(long, default_value = "2")]
    pub debounce: u64,
}

impl WatchCmd {
    pub async fn run(&self) -> Result<()> {
        let index_dir = engine::get_index_dir()
            .context("No .docdex directory found. Run `ddx init` first.")?;
        let root = index_dir
            .parent()
            .context("Index directory has no parent")?
            .to_path_buf();

        let config = EngineConfig::load(&index_dir)?;
        let store = IndexStore::open(&index_dir.join(engine::DB_FILE_NAME)).await?;
        let indexer = Indexer::new(root.clone(), index_dir.clone(), store, config);

        println!("Watching {} for changes...", root.display());
        println!("Press Ctrl+C to stop.\n");

        // Initial sync
        self.refresh(&indexer).await;

        let (tx, mut rx) = mpsc::channel(100);

        let watched_index_dir = index_dir.clone();
        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| {
                if let Ok(event) = res {
                    // The refresh itself writes under .docdex/; those
                    // events must not retrigger it.
                    if event
                        .paths
                        .iter()
                        .all(|p| p.starts_with(&watched_index_dir))
                    {
                        return;
                    }
                    let _ = tx.blocking_send(event);
                }
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&root, RecursiveMode::Recursive)?;

        let debounce = Duration::from_secs(self.debounce);
        let mut last_sync = std::time::Instant::now();

        loop {
            tokio::select! {
                Some(_event) = rx.recv() => {
                    if last_sync.elapsed() > debounce {
                        println!("\nCorpus changed, refreshing...");
                        self.refresh(&indexer).await;
                        last_sync = std::time::Instant::now();
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    println!("\nStopping watch.");
                    break;
                }
            }
        }

        Ok(())
    }

    async fn refresh(&self, indexer: &Indexer) {
        match indexer.refresh(&CancelToken::new()).await {
            Ok(summary) => {
                println!(
                    "Refreshed in {:.0}ms: {} indexed, {} unchanged, {} removed, {} failed",
                    summary.elapsed_ms,
                    summary.indexed,
                    summary.skipped,
                    summary.deleted,
                    summary.failures.len(),
                );
            }
            Err(EngineError::RefreshInProgress) => {
                eprintln!("Refresh already running, skipping.");
            }
            Err(e) => eprintln!("Refresh failed: {}", e),
        }
    }
}
