//! Build command handler.
//!
//! Indexes every PDF in the documents directory.

use clap::Args;
use docent_core::{config::AppConfig, AppResult};
use docent_knowledge::{Pipeline, ProgressEvent, ProgressReporter};
use std::path::PathBuf;
use std::sync::Arc;

/// Build the vector index from a directory of PDFs
#[derive(Args, Debug)]
pub struct BuildCommand {
    /// Documents directory (default: from configuration)
    #[arg(long)]
    pub docs: Option<PathBuf>,

    /// Suppress progress lines
    #[arg(short, long)]
    pub quiet: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl BuildCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing build command");

        let docs = self
            .docs
            .clone()
            .unwrap_or_else(|| config.documents_dir.clone());

        let mut pipeline = Pipeline::from_config(config)?;
        if !self.quiet {
            pipeline = pipeline.with_progress(ProgressReporter::new(Arc::new(
                |event: ProgressEvent| eprintln!("{}", event),
            )));
        }

        let handle = pipeline.build_index(&docs).await?;
        let manifest = handle.index.manifest();

        if self.json {
            super::print_json(&serde_json::json!({
                "indexDir": handle.dir,
                "documents": handle.documents,
                "pages": handle.pages,
                "chunks": handle.chunks(),
                "model": manifest.model_id,
                "dimensions": manifest.dimensions,
            }))?;
        } else {
            println!(
                "Indexed {} chunks from {} documents ({} pages) into {}",
                handle.chunks(),
                handle.documents,
                handle.pages,
                handle.dir.display()
            );
            println!(
                "Embedding model: {} ({} dimensions)",
                manifest.model_id, manifest.dimensions
            );
        }

        Ok(())
    }
}
