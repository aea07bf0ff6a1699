//! Document retrieval and answering for Docent.
//!
//! Loads PDF pages, splits them into overlapping chunks, embeds the chunks
//! into a persisted vector index and answers questions from the most
//! relevant chunks, citing file and page.
//!
//! [`Pipeline`] is the caller-facing entry point; the components it composes
//! are public for embedding in other tools.

pub mod chunker;
pub mod embeddings;
pub mod index;
pub mod loader;
pub mod pipeline;
pub mod progress;
pub mod rag;
pub mod types;

// Re-export commonly used types
pub use chunker::{chunk_pages, ChunkConfig};
pub use embeddings::{EmbeddingConfig, EmbeddingEngine, EmbeddingProvider};
pub use index::{IndexState, IndexStats, IndexStore, ResetOutcome, VectorIndex};
pub use loader::DocumentLoader;
pub use pipeline::{IndexHandle, Pipeline, PipelineConfig};
pub use progress::{BuildPhase, ProgressCallback, ProgressEvent, ProgressReporter};
pub use rag::{Answer, SourceRef};
pub use types::{Chunk, Page, ScoredChunk};

#[cfg(test)]
mod tests;
