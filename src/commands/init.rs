//! Init command - create the index directory and default config.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use crate::engine::{self, EngineConfig, IndexStore};

#[derive(Args)]
pub struct InitCmd {
    /// Corpus root to initialize (default: current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,
}

impl InitCmd {
    pub async fn run(&self) -> Result<()> {
        let index_dir = self.path.join(engine::INDEX_DIR_NAME);

        if index_dir.exists() {
            println!("Already initialized: {}", index_dir.display());
            return Ok(());
        }

        std::fs::create_dir_all(&index_dir).context("Failed to create .docdex directory")?;

        let config = EngineConfig::default();
        config.save(&index_dir)?;

        // Creates the database and schema up front.
        IndexStore::open(&index_dir.join(engine::DB_FILE_NAME)).await?;

        println!("Created {}", index_dir.display());
        println!("Run `ddx refresh` to build the index.");

        Ok(())
    }
}
