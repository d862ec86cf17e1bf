//! List command - show indexed documents or chunks.

use anyhow::{Context, Result};
use clap::Args;
use futures::TryStreamExt;

use crate::engine::models::ScanFilter;
use crate::engine::{self, IndexStore};

#[derive(Args)]
pub struct ListCmd {
    /// Only documents under this path prefix
    #[arg(short, long)]
    pub path: Option<String>,

    /// Only documents of this kind (markdown, html, text)
    #[arg(long)]
    pub kind: Option<String>,

    /// List individual chunks instead of documents
    #[arg(long)]
    pub chunks: bool,
}

impl ListCmd {
    pub async fn run(&self) -> Result<()> {
        let index_dir = engine::get_index_dir()
            .context("No .docdex directory found. Run `ddx init` first.")?;
        let store = IndexStore::open(&index_dir.join(engine::DB_FILE_NAME)).await?;

        if self.chunks {
            return self.list_chunks(&store).await;
        }

        let mut shown = 0;
        for document in store.list_documents().await? {
            if let Some(prefix) = &self.path {
                if !document.path.starts_with(prefix.as_str()) {
                    continue;
                }
            }
            if let Some(kind) = &self.kind {
                if document.kind != *kind {
                    continue;
                }
            }

            println!(
                "{}  ({}, {} chunks, indexed {})",
                document.path, document.kind, document.chunk_count, document.indexed_at
            );
            shown += 1;
        }

        if shown == 0 {
            println!("No documents indexed. Run `ddx refresh`.");
        }

        Ok(())
    }

    async fn list_chunks(&self, store: &IndexStore) -> Result<()> {
        let filter = ScanFilter {
            path_prefix: self.path.clone(),
            kind: self.kind.clone(),
        };

        // The scan is lazy; one row in memory at a time.
        let mut stream = store.scan(&filter);
        let mut shown = 0;

        while let Some(entry) = stream.try_next().await? {
            let heading = if entry.heading_path.is_empty() {
                String::new()
            } else {
                format!(" [{}]", entry.heading_path)
            };
            let marker = if entry.is_code { " (code)" } else { "" };
            println!(
                "{}#{}{}{}  {} chars",
                entry.document_path, entry.seq, heading, marker, entry.char_len
            );
            shown += 1;
        }

        if shown == 0 {
            println!("No chunks matched.");
        }

        Ok(())
    }
}
