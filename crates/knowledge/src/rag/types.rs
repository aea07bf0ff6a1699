//! Answer types.

use crate::types::ScoredChunk;
use serde::{Deserialize, Serialize};

/// Maximum snippet length for source references, in characters.
const MAX_SNIPPET_LENGTH: usize = 150;

/// Returned when nothing relevant was retrieved or nothing fit the prompt.
pub const NO_INFORMATION_ANSWER: &str =
    "The specific information was not found in the available documents.";

/// A single source reference used to answer a question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    /// File name of the source document
    pub source: String,

    /// Human-readable location, "page 3" or "pages 3-4"
    pub location: String,

    /// Leading excerpt of the chunk
    pub snippet: String,

    /// Relevance score from retrieval
    pub score: f32,
}

impl SourceRef {
    pub fn from_scored(scored: &ScoredChunk) -> Self {
        Self {
            source: scored.chunk.source_id.clone(),
            location: scored.chunk.page_label(),
            snippet: truncate_snippet(&scored.chunk.text, MAX_SNIPPET_LENGTH),
            score: scored.score,
        }
    }
}

/// A generated answer and the chunks it was grounded on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,

    /// One entry per chunk included in the prompt, in prompt order
    pub sources: Vec<SourceRef>,

    /// The included chunks themselves
    #[serde(skip)]
    pub chunks: Vec<ScoredChunk>,

    /// Retrieved chunks left out because they did not fit the context budget
    pub dropped: usize,
}

impl Answer {
    pub fn new(answer: String, chunks: Vec<ScoredChunk>, dropped: usize) -> Self {
        Self {
            answer,
            sources: chunks.iter().map(SourceRef::from_scored).collect(),
            chunks,
            dropped,
        }
    }

    /// The fixed answer used when no chunk can ground a response.
    pub fn no_information(dropped: usize) -> Self {
        Self {
            answer: NO_INFORMATION_ANSWER.to_string(),
            sources: Vec::new(),
            chunks: Vec::new(),
            dropped,
        }
    }

    pub fn is_no_information(&self) -> bool {
        self.sources.is_empty()
    }
}

/// Cut text to at most `max_chars` characters, preferring a word boundary.
fn truncate_snippet(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    let Some((cut, _)) = text.char_indices().nth(max_chars) else {
        return text.to_string();
    };

    let truncated = &text[..cut];
    match truncated.rfind(char::is_whitespace) {
        Some(last_space) => format!("{}...", truncated[..last_space].trim_end()),
        None => format!("{}...", truncated),
    }
}
