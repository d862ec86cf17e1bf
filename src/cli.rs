//! CLI argument definitions.

use clap::{Parser, Subcommand};

use crate::commands::{CleanCmd, InitCmd, ListCmd, RefreshCmd, SearchCmd, StatsCmd, WatchCmd};

#[derive(Parser)]
#[command(name = "ddx")]
#[command(about = "docdex - local document indexing and search")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create the .docdex directory and default config
    Init(InitCmd),

    /// Re-sync the index with the document corpus
    Refresh(RefreshCmd),

    /// Search indexed chunks
    Search(SearchCmd),

    /// List indexed documents
    List(ListCmd),

    /// Show index statistics
    Stats(StatsCmd),

    /// Watch the corpus and auto-refresh on changes
    Watch(WatchCmd),

    /// Delete the entire .docdex directory
    Clean(CleanCmd),
}

impl Command {
    pub async fn execute(&self) -> anyhow::Result<()> {
        match self {
            Command::Init(cmd) => cmd.run().await,
            Command::Refresh(cmd) => cmd.run().await,
            Command::Search(cmd) => cmd.run().await,
            Command::List(cmd) => cmd.run().await,
            Command::Stats(cmd) => cmd.run().await,
            Command::Watch(cmd) => cmd.run().await,
            Command::Clean(cmd) => cmd.run().await,
        }
    }
}
