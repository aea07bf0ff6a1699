//! Ask command handler.
//!
//! Answers a question from the persisted index and lists the sources used.

use clap::Args;
use docent_core::{config::AppConfig, AppResult};
use docent_knowledge::Pipeline;

/// Ask a question about the indexed documents
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: String,

    /// Number of chunks to retrieve (default: from configuration)
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Also search LLM-generated rewordings of the question
    #[arg(long)]
    pub expand: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");
        tracing::debug!("Ask command options: {:?}", self);

        let pipeline = Pipeline::from_config(config)?;
        let answer = pipeline.ask(&self.question, self.top_k, self.expand).await?;

        tracing::debug!(
            sources = answer.sources.len(),
            dropped = answer.dropped,
            "Answer generated"
        );

        if self.json {
            return super::print_json(&answer);
        }

        println!("Answer:");
        println!("{}", answer.answer);
        println!();

        if answer.sources.is_empty() {
            println!("Sources: (no sources available)");
        } else {
            println!("Sources:");
            for source in &answer.sources {
                println!("- {} ({})", source.source, source.location);
            }
        }
        if answer.dropped > 0 {
            println!(
                "({} retrieved passages did not fit the context budget)",
                answer.dropped
            );
        }

        Ok(())
    }
}
