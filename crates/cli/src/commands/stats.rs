//! Stats command handler.
//!
//! Summarizes the persisted index from its manifest.

use clap::Args;
use docent_core::{config::AppConfig, AppResult};
use docent_knowledge::IndexStore;

/// Show index statistics
#[derive(Args, Debug)]
pub struct StatsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing stats command");

        let stats = IndexStore::new(config.index_dir.clone()).stats()?;

        if self.json {
            return super::print_json(&stats);
        }

        println!("Index: {}", stats.dir.display());
        println!("  State: {}", stats.state.as_str());
        if let Some(holder) = &stats.lock_holder {
            println!(
                "  Locked by pid {} since {}",
                holder.pid,
                holder.acquired_at.to_rfc3339()
            );
        }
        match &stats.manifest {
            Some(manifest) => {
                println!("  Chunks: {}", manifest.count);
                println!(
                    "  Embedding: {} / {} ({} dimensions, {})",
                    manifest.provider,
                    manifest.model_id,
                    manifest.dimensions,
                    manifest.metric.as_str()
                );
                println!("  Built: {}", manifest.created_at.to_rfc3339());
                println!("  Size: {} bytes", stats.size_bytes);
            }
            None => println!("  No index built yet. Run 'docent build'."),
        }

        Ok(())
    }
}
