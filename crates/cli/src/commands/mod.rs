//! Command handlers for the Docent CLI.
//!
//! This module organizes all CLI commands into separate submodules.

pub mod ask;
pub mod build;
pub mod prompts;
pub mod reset;
pub mod stats;

// Re-export command types for convenience
pub use ask::AskCommand;
pub use build::BuildCommand;
pub use prompts::PromptsCommand;
pub use reset::ResetCommand;
pub use stats::StatsCommand;

use docent_core::AppResult;
use serde::Serialize;

/// Print a value as pretty JSON on stdout.
pub(crate) fn print_json<T: Serialize>(value: &T) -> AppResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
