//! Retrieval-augmented answering: query expansion, retrieval over the vector
//! index and grounded answer synthesis.

pub mod expander;
pub mod retriever;
pub mod synthesizer;
pub mod types;

pub use expander::QueryExpander;
pub use retriever::Retriever;
pub use synthesizer::AnswerSynthesizer;
pub use types::{Answer, SourceRef, NO_INFORMATION_ANSWER};

use docent_llm::LlmRequest;
use std::time::Duration;

/// Parameters shared by every generative call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub timeout: Duration,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            model: "llama3.2".to_string(),
            temperature: 0.1,
            max_tokens: None,
            timeout: Duration::from_secs(60),
        }
    }
}

impl GenerationSettings {
    /// Wrap a rendered prompt into a request carrying these settings.
    pub fn request(&self, prompt: String, system: Option<String>) -> LlmRequest {
        let mut request = LlmRequest::new(prompt, self.model.clone())
            .with_temperature(self.temperature)
            .with_timeout(self.timeout);
        if let Some(max_tokens) = self.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }
        if let Some(system) = system {
            request = request.with_system(system);
        }
        request
    }
}
