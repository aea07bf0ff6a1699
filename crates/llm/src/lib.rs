//! Text generation for Docent.
//!
//! One trait, [`LlmClient`], with an Ollama chat backend (the default) and a
//! Gemini `generateContent` backend. Answer synthesis and query expansion are
//! the only callers; both make a single non-streaming request per call.
//!
//! ```no_run
//! use docent_llm::{create_client, LlmRequest};
//!
//! # async fn example() -> docent_core::AppResult<()> {
//! let client = create_client("ollama", None, None)?;
//! let reply = client
//!     .complete(&LlmRequest::new("Summarise IEC 62446-1", "llama3.2").with_temperature(0.1))
//!     .await?;
//! println!("{}", reply.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;

pub use client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
pub use factory::{create_client, LlmProvider};
pub use providers::{GeminiClient, OllamaClient};
