//! LLM-driven query expansion.

use crate::rag::GenerationSettings;
use docent_core::{AppError, AppResult};
use docent_llm::LlmClient;
use docent_prompt::{build_prompt, PromptDefinition};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Asks the LLM for alternative phrasings of a question.
#[derive(Clone)]
pub struct QueryExpander {
    llm: Arc<dyn LlmClient>,
    prompt: PromptDefinition,
    settings: GenerationSettings,
}

impl QueryExpander {
    pub fn new(llm: Arc<dyn LlmClient>, prompt: PromptDefinition, settings: GenerationSettings) -> Self {
        Self {
            llm,
            prompt,
            settings,
        }
    }

    /// Up to `count` variants of `question`, never including the question itself.
    pub async fn expand(&self, question: &str, count: usize) -> AppResult<Vec<String>> {
        if count == 0 {
            return Ok(Vec::new());
        }

        let mut variables = HashMap::new();
        variables.insert("question".to_string(), question.to_string());
        variables.insert("count".to_string(), count.to_string());
        let built = build_prompt(&self.prompt, variables)?;

        let response = self
            .llm
            .complete(&self.settings.request(built.user, built.system))
            .await?;

        let variants = parse_variants(&response.content, question, count);
        tracing::debug!(
            requested = count,
            parsed = variants.len(),
            "Expanded query into {:?}",
            variants
        );

        if variants.is_empty() {
            return Err(AppError::Generation(
                "query expansion returned no usable variants".to_string(),
            ));
        }
        Ok(variants)
    }
}

/// Parse one variant per line, dropping list markers, blanks and duplicates.
pub fn parse_variants(raw: &str, original: &str, count: usize) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    seen.insert(normalize(original));

    raw.lines()
        .map(strip_marker)
        .filter(|line| !line.is_empty())
        .filter(|line| seen.insert(normalize(line)))
        .map(str::to_string)
        .take(count)
        .collect()
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Remove a leading bullet ("-", "*", "•") or ordinal ("1.", "2)") and quotes.
fn strip_marker(line: &str) -> &str {
    let line = line.trim();
    let line = line
        .strip_prefix(['-', '*', '•'])
        .unwrap_or_else(|| {
            let digits = line.len() - line.trim_start_matches(|c: char| c.is_ascii_digit()).len();
            if digits > 0 {
                line[digits..]
                    .strip_prefix(['.', ')'])
                    .unwrap_or(line)
            } else {
                line
            }
        })
        .trim();
    line.trim_matches('"').trim()
}
