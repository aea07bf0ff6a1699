//! Prompt system for Docent.
//!
//! Built-in prompt definitions for answer synthesis and query expansion,
//! optional YAML overrides under `.docent/prompts/`, and Handlebars
//! rendering.

pub mod builder;
pub mod loader;
pub mod types;

pub use builder::build_prompt;
pub use loader::{builtin_prompts, list_prompts, load_prompt, ANSWER_PROMPT_ID, EXPAND_PROMPT_ID};
pub use types::{BuiltPrompt, PromptDefinition};
