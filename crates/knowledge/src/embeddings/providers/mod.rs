//! Embedding provider implementations.

pub mod gemini;
pub mod ollama;
pub mod trigram;
