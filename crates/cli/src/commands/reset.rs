//! Reset command handler.

use clap::Args;
use docent_core::{config::AppConfig, AppResult};
use docent_knowledge::{EmbeddingEngine, IndexStore, ResetOutcome};

/// Delete the persisted index
#[derive(Args, Debug)]
pub struct ResetCommand {
    /// Also clear a lock file left behind by a build that is no longer running
    #[arg(long)]
    pub force: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl ResetCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing reset command");

        let store = IndexStore::new(config.index_dir.clone());
        let outcome = if self.force {
            store.force_reset().await?
        } else {
            store.reset().await?
        };
        EmbeddingEngine::global().invalidate();

        if self.json {
            return super::print_json(&serde_json::json!({
                "indexDir": config.index_dir,
                "outcome": outcome,
            }));
        }

        match outcome {
            ResetOutcome::Removed => println!("Removed index at {}", config.index_dir.display()),
            ResetOutcome::NothingToRemove => {
                println!("No index at {}, nothing to remove", config.index_dir.display())
            }
        }
        Ok(())
    }
}
