//! Error types for Docent.
//!
//! This module defines a unified error enum that covers the whole pipeline:
//! configuration, document loading, embedding, the persisted vector index,
//! and answer generation. Each variant carries enough context (which file,
//! which provider, which stage) to render a precise user-facing message.

use std::path::PathBuf;
use thiserror::Error;

/// Unified error type for Docent.
///
/// All library functions return `Result<T, AppError>`; each variant maps to
/// a distinct process exit code through [`AppError::exit_code`].
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Caller supplied an argument outside the accepted domain
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A supported source document could not be read or parsed
    #[error("Failed to load {path:?}: {message}")]
    Load { path: PathBuf, message: String },

    /// The documents directory produced nothing to index
    #[error("Nothing to index: {0}")]
    EmptyCorpus(String),

    /// The embedding provider rejected or failed a request.
    /// Recoverable: callers may retry with backoff.
    #[error("Embedding service error ({provider}): {message}")]
    EmbeddingService { provider: String, message: String },

    /// The persisted index is missing required files or is internally inconsistent
    #[error("Index at {path:?} is corrupt: {message}")]
    IndexCorrupt { path: PathBuf, message: String },

    /// The persisted index was built with a different embedding space
    #[error("Index schema mismatch: expected {expected}, found {found}")]
    SchemaMismatch { expected: String, found: String },

    /// A query was issued before any index was built
    #[error("No index found at {0:?}. Run 'docent build' first.")]
    IndexMissing(PathBuf),

    /// Another build or reset holds the index directory
    #[error(
        "Index at {dir:?} is locked by another build or reset ({lock_file:?}); \
         if no build is running, run 'docent reset --force'"
    )]
    IndexLocked { dir: PathBuf, lock_file: PathBuf },

    /// The generative model failed on the answer path
    #[error("Generation error: {0}")]
    Generation(String),

    /// Prompt system errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AppError {
    /// Process exit code for this error, one per taxonomy entry.
    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::Config(_) | AppError::InvalidInput(_) => 2,
            AppError::Load { .. } => 3,
            AppError::EmptyCorpus(_) => 4,
            AppError::EmbeddingService { .. } => 5,
            AppError::IndexCorrupt { .. } => 6,
            AppError::SchemaMismatch { .. } => 7,
            AppError::IndexMissing(_) => 8,
            AppError::IndexLocked { .. } => 9,
            AppError::Generation(_) => 10,
            AppError::Prompt(_) | AppError::Io(_) | AppError::Serialization(_) => 1,
        }
    }

    /// Build an embedding-service error for the given provider.
    pub fn embedding(provider: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::EmbeddingService {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Build a corrupt-index error for the given directory.
    pub fn corrupt(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        AppError::IndexCorrupt {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct_per_stage() {
        let errors = vec![
            AppError::Load {
                path: PathBuf::from("a.pdf"),
                message: "bad".to_string(),
            },
            AppError::EmptyCorpus("none".to_string()),
            AppError::embedding("ollama", "down"),
            AppError::corrupt("idx", "no manifest"),
            AppError::SchemaMismatch {
                expected: "a".to_string(),
                found: "b".to_string(),
            },
            AppError::IndexMissing(PathBuf::from("idx")),
            AppError::IndexLocked {
                dir: PathBuf::from("idx"),
                lock_file: PathBuf::from(".idx.lock"),
            },
            AppError::Generation("timeout".to_string()),
        ];

        let mut codes: Vec<u8> = errors.iter().map(|e| e.exit_code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_locked_error_names_lock_file_and_remedy() {
        let err = AppError::IndexLocked {
            dir: PathBuf::from(".docent/index"),
            lock_file: PathBuf::from(".docent/.index.lock"),
        };
        let message = err.to_string();
        assert!(message.contains(".docent/.index.lock"));
        assert!(message.contains("docent reset --force"));
    }

    #[test]
    fn test_load_error_names_the_file() {
        let err = AppError::Load {
            path: PathBuf::from("docs/norma.pdf"),
            message: "truncated xref".to_string(),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("norma.pdf"));
        assert!(rendered.contains("truncated xref"));
    }
}
