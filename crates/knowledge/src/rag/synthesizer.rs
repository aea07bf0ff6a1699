//! Grounded answer generation within a prompt-size budget.

use crate::rag::types::Answer;
use crate::rag::GenerationSettings;
use crate::types::{Chunk, ScoredChunk};
use docent_core::{AppError, AppResult};
use docent_llm::LlmClient;
use docent_prompt::{build_prompt, BuiltPrompt, PromptDefinition};
use std::collections::HashMap;
use std::sync::Arc;

const CONTEXT_SEPARATOR: &str = "\n\n";

/// Builds the answer prompt from retrieved chunks and calls the LLM once.
#[derive(Clone)]
pub struct AnswerSynthesizer {
    llm: Arc<dyn LlmClient>,
    prompt: PromptDefinition,
    settings: GenerationSettings,
    /// Upper bound on the rendered prompt, in characters
    context_budget: usize,
}

impl AnswerSynthesizer {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        prompt: PromptDefinition,
        settings: GenerationSettings,
        context_budget: usize,
    ) -> Self {
        Self {
            llm,
            prompt,
            settings,
            context_budget,
        }
    }

    /// Answer `question` from `retrieved`, which must be in relevance order.
    ///
    /// Chunks are admitted in order until the next one would push the
    /// rendered prompt past the budget; that chunk and all later ones are
    /// left out.
    pub async fn answer(&self, question: &str, retrieved: Vec<ScoredChunk>) -> AppResult<Answer> {
        let total = retrieved.len();
        let (context, included) = self.fit_context(question, retrieved)?;
        let dropped = total - included.len();

        if dropped > 0 {
            tracing::info!(
                included = included.len(),
                dropped,
                budget = self.context_budget,
                "Context budget reached, dropping lower-ranked chunks"
            );
        }

        if included.is_empty() {
            tracing::info!("No chunk available to ground the answer");
            return Ok(Answer::no_information(dropped));
        }

        let built = self.render(question, context)?;
        tracing::debug!(
            prompt_chars = built.char_len(),
            chunks = included.len(),
            model = %self.settings.model,
            "Generating answer"
        );

        let response = self
            .llm
            .complete(&self.settings.request(built.user, built.system))
            .await
            .map_err(|e| match e {
                AppError::Generation(_) => e,
                other => AppError::Generation(other.to_string()),
            })?;

        Ok(Answer::new(response.content, included, dropped))
    }

    /// Select the longest relevance-ordered prefix that fits the budget.
    fn fit_context(
        &self,
        question: &str,
        retrieved: Vec<ScoredChunk>,
    ) -> AppResult<(String, Vec<ScoredChunk>)> {
        let base = self.render(question, String::new())?.char_len();

        let mut context = String::new();
        let mut context_len = 0;
        let mut included = Vec::new();

        for scored in retrieved {
            let block = format_chunk(&scored.chunk);
            let separator = if included.is_empty() { "" } else { CONTEXT_SEPARATOR };
            let added = separator.chars().count() + block.chars().count();

            if base + context_len + added > self.context_budget {
                break;
            }

            context.push_str(separator);
            context.push_str(&block);
            context_len += added;
            included.push(scored);
        }

        Ok((context, included))
    }

    fn render(&self, question: &str, context: String) -> AppResult<BuiltPrompt> {
        let mut variables = HashMap::new();
        variables.insert("question".to_string(), question.to_string());
        variables.insert("context".to_string(), context);
        build_prompt(&self.prompt, variables)
    }
}

/// Render a chunk with its citation header.
pub fn format_chunk(chunk: &Chunk) -> String {
    let pages = if chunk.page_end > chunk.page_number {
        format!("{}-{}", chunk.page_number + 1, chunk.page_end + 1)
    } else {
        (chunk.page_number + 1).to_string()
    };
    format!(
        "[Source: {} | Page: {}]\n{}",
        chunk.source_id, pages, chunk.text
    )
}
