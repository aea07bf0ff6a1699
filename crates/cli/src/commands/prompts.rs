//! Prompts command handler.
//!
//! Lists the prompt definitions in effect for the workspace.

use clap::Args;
use docent_core::{config::AppConfig, AppResult};
use docent_prompt::{list_prompts, load_prompt};

/// List available prompts, including workspace overrides
#[derive(Args, Debug)]
pub struct PromptsCommand {
    /// Print the full template of this prompt
    #[arg(long)]
    pub show: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl PromptsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing prompts command");

        if let Some(id) = &self.show {
            let prompt = load_prompt(&config.workspace, id)?;
            if self.json {
                return super::print_json(&prompt);
            }
            println!("{} ({}, v{})", prompt.id, prompt.title, prompt.api_version);
            println!("Variables: {}", prompt.variables.join(", "));
            println!();
            println!("{}", prompt.template);
            return Ok(());
        }

        let mut prompts = Vec::new();
        for id in list_prompts(&config.workspace)? {
            prompts.push(load_prompt(&config.workspace, &id)?);
        }

        if self.json {
            return super::print_json(&prompts);
        }

        for prompt in &prompts {
            println!("{:<14} {}", prompt.id, prompt.title);
        }
        Ok(())
    }
}
