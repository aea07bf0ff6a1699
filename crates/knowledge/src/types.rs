//! Core data model shared by the loader, chunker, index and retriever.

use serde::{Deserialize, Serialize};

/// One page of extracted text.
///
/// `page_number` is 0-based; anything shown to users adds one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// File name of the document the page came from
    pub source_id: String,

    /// 0-based page index within the document
    pub page_number: usize,

    /// Extracted text (may be empty)
    pub text: String,
}

impl Page {
    pub fn new(source_id: impl Into<String>, page_number: usize, text: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            page_number,
            text: text.into(),
        }
    }
}

/// A contiguous span of a document's concatenated page text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Deterministic id derived from source and offsets
    pub chunk_id: String,

    /// File name of the source document
    pub source_id: String,

    /// 0-based page holding the chunk's first character
    pub page_number: usize,

    /// 0-based page holding the chunk's last character
    pub page_end: usize,

    /// 0-based position of the chunk within its document
    pub position: usize,

    /// Start offset (characters) into the document text
    pub start: usize,

    /// End offset (characters, exclusive)
    pub end: usize,

    pub text: String,
}

impl Chunk {
    /// User-facing page citation: "page 3" or "pages 3-4".
    pub fn page_label(&self) -> String {
        if self.page_end > self.page_number {
            format!("pages {}-{}", self.page_number + 1, self.page_end + 1)
        } else {
            format!("page {}", self.page_number + 1)
        }
    }

    /// Length of the chunk in characters.
    pub fn char_len(&self) -> usize {
        self.end - self.start
    }
}

/// A chunk paired with its relevance score (higher is better).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}
