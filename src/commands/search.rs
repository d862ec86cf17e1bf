//! Search command - query indexed chunks.

use anyhow::{Context, Result};
use clap::Args;

use crate::engine::models::SearchQuery;
use crate::engine::{self, CancelToken, EngineConfig, IndexStore, SearchEngine};

#[derive(Args)]
pub struct SearchCmd {
    /// Query text
    pub query: String,

    /// Max results
    #[arg(short = 'k', long, default_value = "10")]
    pub limit: usize,

    /// Only documents under this path prefix
    #[arg(short, long)]
    pub path: Option<String>,

    /// Only documents of this kind (markdown, html, text)
    #[arg(long)]
    pub kind: Option<String>,

    /// Emit results as JSON
    #[arg(long)]
    pub json: bool,
}

impl SearchCmd {
    pub async fn run(&self) -> Result<()> {
        let index_dir = engine::get_index_dir()
            .context("No .docdex directory found. Run `ddx init` first.")?;

        let config = EngineConfig::load(&index_dir)?;
        let store = IndexStore::open(&index_dir.join(engine::DB_FILE_NAME)).await?;
        let engine = SearchEngine::new(index_dir, store, config);

        let cancel = CancelToken::new();
        let signal_cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                signal_cancel.cancel();
            }
        });

        let response = engine
            .search(
                &SearchQuery {
                    text: self.query.clone(),
                    k: self.limit,
                    path_prefix: self.path.clone(),
                    kind: self.kind.clone(),
                },
                &cancel,
            )
            .await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&response)?);
            return Ok(());
        }

        println!(
            "Found {} results in {:.1}ms\n",
            response.hits.len(),
            response.elapsed_ms
        );

        for (i, hit) in response.hits.iter().enumerate() {
            let heading = if hit.heading_path.is_empty() {
                String::new()
            } else {
                format!(" [{}]", hit.heading_path)
            };
            println!(
                "{}. {}#{}{} (score: {:.3})",
                i + 1,
                hit.document_path,
                hit.seq,
                heading,
                hit.score
            );
            for line in hit.snippet.lines().take(3) {
                println!("   {}", line);
            }
            println!();
        }

        if response.budget_exceeded {
            eprintln!("Warning: search missed its response-time target.");
        }

        Ok(())
    }
}
