//! Docent CLI
//!
//! Main entry point for the docent command-line tool.
//! Builds a vector index over a directory of PDFs and answers questions
//! from it, citing file and page.

mod commands;

use clap::{Parser, Subcommand};
use commands::{AskCommand, BuildCommand, PromptsCommand, ResetCommand, StatsCommand};
use docent_core::config::{AppConfig, CliOverrides};
use docent_core::{logging, AppResult};
use std::path::PathBuf;
use std::process::ExitCode;

/// Docent - question answering over your PDF documents
#[derive(Parser, Debug)]
#[command(name = "docent")]
#[command(about = "Question answering over PDF documents with source attribution", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "DOCENT_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file (default: <workspace>/.docent/config.yaml)
    #[arg(short, long, global = true, env = "DOCENT_CONFIG")]
    config: Option<PathBuf>,

    /// Index directory (default: <workspace>/.docent/index)
    #[arg(long, global = true)]
    index: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Write log lines as JSON
    #[arg(long, global = true)]
    log_json: bool,

    /// LLM provider (ollama, gemini)
    #[arg(long, global = true)]
    llm_provider: Option<String>,

    /// LLM model identifier
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Embedding provider (ollama, gemini, trigram)
    #[arg(long, global = true)]
    embedding_provider: Option<String>,

    /// Embedding model identifier
    #[arg(long, global = true)]
    embedding_model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build the vector index from a directory of PDFs
    Build(BuildCommand),

    /// Ask a question about the indexed documents
    Ask(AskCommand),

    /// Delete the persisted index
    Reset(ResetCommand),

    /// Show index statistics
    Stats(StatsCommand),

    /// List available prompts
    Prompts(PromptsCommand),
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Build(_) => "build",
            Commands::Ask(_) => "ask",
            Commands::Reset(_) => "reset",
            Commands::Stats(_) => "stats",
            Commands::Prompts(_) => "prompts",
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Command failed: {}", e);
            eprintln!("Error: {}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(cli: Cli) -> AppResult<()> {
    // Defaults, then config file, then environment, then flags
    let config = AppConfig::load_from(cli.workspace.clone(), cli.config.clone())?;
    let config = config.with_overrides(CliOverrides {
        documents_dir: None,
        index_dir: cli.index.clone(),
        llm_provider: cli.llm_provider.clone(),
        llm_model: cli.model.clone(),
        embedding_provider: cli.embedding_provider.clone(),
        embedding_model: cli.embedding_model.clone(),
        log_level: cli.log_level.clone(),
        verbose: cli.verbose,
        no_color: cli.no_color,
        log_json: cli.log_json,
    });

    logging::init_from_config(&config)?;

    tracing::info!("Docent CLI starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Documents: {:?}", config.documents_dir);
    tracing::debug!("Index: {:?}", config.index_dir);

    config.ensure_docent_dir()?;

    let _span = tracing::info_span!("command", name = cli.command.name()).entered();

    let result = match &cli.command {
        Commands::Build(cmd) => cmd.execute(&config).await,
        Commands::Ask(cmd) => cmd.execute(&config).await,
        Commands::Reset(cmd) => cmd.execute(&config).await,
        Commands::Stats(cmd) => cmd.execute(&config).await,
        Commands::Prompts(cmd) => cmd.execute(&config).await,
    };

    if result.is_ok() {
        tracing::info!("Command completed successfully");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_ask_flags() {
        let cli = Cli::parse_from(["docent", "ask", "What torque?", "-k", "3", "--expand", "--json"]);
        match cli.command {
            Commands::Ask(cmd) => {
                assert_eq!(cmd.question, "What torque?");
                assert_eq!(cmd.top_k, Some(3));
                assert!(cmd.expand);
                assert!(cmd.json);
            }
            other => panic!("expected ask, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_build_with_global_flags() {
        let cli = Cli::parse_from(["docent", "build", "--docs", "manuals", "--embedding-provider", "trigram"]);
        assert_eq!(cli.embedding_provider.as_deref(), Some("trigram"));
        match cli.command {
            Commands::Build(cmd) => assert_eq!(cmd.docs, Some(PathBuf::from("manuals"))),
            other => panic!("expected build, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_reset_force() {
        let cli = Cli::parse_from(["docent", "reset", "--force"]);
        match cli.command {
            Commands::Reset(cmd) => {
                assert!(cmd.force);
                assert!(!cmd.json);
            }
            other => panic!("expected reset, got {:?}", other),
        }
    }
}
